//! Integration tests: CLI smoke tests and full capture/compare pipelines.

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use slist::prelude::*;

struct Workspace {
    tmp: tempfile::TempDir,
    home: PathBuf,
    tree: PathBuf,
    out: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path().join("home");
        let tree = tmp.path().join("tree");
        let out = tmp.path().join("out");
        for dir in [&home, &tree, &out] {
            fs::create_dir_all(dir).unwrap();
        }
        fs::create_dir_all(tree.join("docs")).unwrap();
        fs::write(tree.join("readme.txt"), b"hello\n").unwrap();
        fs::write(tree.join("docs/guide.txt"), b"guide contents").unwrap();
        Self {
            tmp,
            home,
            tree,
            out,
        }
    }

    fn archive(&self, name: &str) -> String {
        self.out.join(name).to_string_lossy().into_owned()
    }

    fn run(&self, case: &str, mode: &str, args: &[&str]) -> common::CmdResult {
        common::run_cli_case_in(case, &self.home, mode, args)
    }

    fn capture(&self, case: &str, name: &str) -> String {
        let archive = self.archive(name);
        let tree = self.tree.to_string_lossy().into_owned();
        let result = self.run(case, "human", &["write", &tree, "-o", &archive]);
        assert!(
            result.status.success(),
            "write failed; log: {}",
            result.log_path.display()
        );
        archive
    }
}

fn parse_json(result: &common::CmdResult) -> Value {
    serde_json::from_str(result.stdout.trim()).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}); log: {}",
            result.log_path.display()
        )
    })
}

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: slist [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn subcommand_help_flags_work() {
    for sub in [
        "write",
        "read",
        "diff",
        "union",
        "intersect",
        "equal",
        "dups",
        "config",
        "completions",
    ] {
        let result = common::run_cli_case(&format!("help_{sub}"), &[sub, "--help"]);
        assert!(
            result.status.success(),
            "{sub} --help failed; log: {}",
            result.log_path.display()
        );
    }
}

#[test]
fn write_then_read_reproduces_the_archive() {
    let ws = Workspace::new();
    let archive = ws.capture("write_read_capture", "a.slist");
    let saved = fs::read_to_string(&archive).unwrap();
    assert!(saved.starts_with("# SLIST VERSION 0\n"));
    assert!(saved.contains("# File list contains 4 entries"));

    let result = ws.run("write_read_read", "human", &["read", &archive]);
    assert!(
        result.status.success(),
        "read failed; log: {}",
        result.log_path.display()
    );
    assert_eq!(result.stdout, saved);
}

#[test]
fn write_to_stdout_emits_the_archive_even_in_json_mode() {
    let ws = Workspace::new();
    let tree = ws.tree.to_string_lossy().into_owned();
    let result = ws.run("write_stdout", "json", &["write", &tree]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stdout.starts_with("# SLIST VERSION 0\n"));
    assert!(result.stdout.contains("readme.txt"));
}

#[test]
fn diff_lists_files_added_since_the_earlier_capture() {
    let ws = Workspace::new();
    let before = ws.capture("diff_before", "before.slist");
    fs::write(ws.tree.join("docs/new.txt"), b"fresh").unwrap();
    let after = ws.capture("diff_after", "after.slist");

    let result = ws.run("diff_paths", "human", &["diff", &after, &before]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let expected = ws.tree.join("docs/new.txt");
    let lines: Vec<&str> = result.stdout.lines().collect();
    assert_eq!(lines, vec![expected.to_string_lossy().as_ref()]);

    let json = parse_json(&ws.run("diff_json", "json", &["diff", &after, &before]));
    assert_eq!(json["command"], "diff");
    assert_eq!(json["paths"].as_array().unwrap().len(), 1);

    let full = ws.run("diff_full", "human", &["diff", "--full", &after, &before]);
    assert!(full.stdout.starts_with("# SLIST VERSION 0\n"));
    assert!(full.stdout.contains("new.txt"));
}

#[test]
fn equal_exit_status_reflects_content() {
    let ws = Workspace::new();
    let first = ws.capture("equal_first", "first.slist");
    let second = ws.archive("second.slist");
    fs::copy(&first, &second).unwrap();

    let same = ws.run("equal_same", "human", &["equal", &first, &second]);
    assert!(same.status.success(), "log: {}", same.log_path.display());
    assert!(same.stdout.contains("equal"));

    fs::write(ws.tree.join("readme.txt"), b"changed\n").unwrap();
    let changed = ws.capture("equal_changed", "changed.slist");
    let differ = ws.run("equal_differ", "json", &["equal", &first, &changed]);
    assert_eq!(differ.status.code(), Some(1), "log: {}", differ.log_path.display());
    assert_eq!(parse_json(&differ)["equal"], false);
    assert!(!differ.stderr.contains("slist:"));
}

#[test]
fn union_and_intersect_write_reports_in_json_mode() {
    let ws = Workspace::new();
    let a = ws.capture("combine_a", "a.slist");
    fs::write(ws.tree.join("extra.txt"), b"extra").unwrap();
    let b = ws.capture("combine_b", "b.slist");

    let union_path = ws.archive("union.slist");
    let union = ws.run("combine_union", "json", &["union", &a, &b, "-o", &union_path]);
    assert!(union.status.success(), "log: {}", union.log_path.display());
    let report = parse_json(&union);
    assert_eq!(report["command"], "union");
    let union_records = report["records"].as_u64().unwrap();

    let inter = ws.run("combine_intersect", "json", &["intersect", &a, &b]);
    assert!(inter.status.success(), "log: {}", inter.log_path.display());
    assert!(inter.stdout.starts_with("# SLIST VERSION 0\n"));

    let loaded_a = Snapshot::load(Path::new(&a)).unwrap();
    let loaded_b = Snapshot::load(Path::new(&b)).unwrap();
    assert!(union_records >= loaded_a.len().max(loaded_b.len()) as u64);
    let saved = Snapshot::load(Path::new(&union_path)).unwrap();
    assert!(subset(&loaded_a, &saved));
    assert!(subset(&loaded_b, &saved));
}

#[test]
fn dups_reports_identical_files() {
    let ws = Workspace::new();
    fs::write(ws.tree.join("copy-one.bin"), vec![7u8; 2048]).unwrap();
    fs::write(ws.tree.join("docs/copy-two.bin"), vec![7u8; 2048]).unwrap();
    let archive = ws.capture("dups_capture", "dups.slist");

    let result = ws.run("dups_json", "json", &["dups", &archive, "--min-size", "1024"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let report = parse_json(&result);
    let groups = report["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["pathnames"].as_array().unwrap().len(), 2);
    assert_eq!(groups[0]["wasted_bytes"], 2048);
}

#[test]
fn missing_archive_is_a_runtime_failure() {
    let ws = Workspace::new();
    let missing = ws.archive("absent.slist");
    let other = ws.archive("also-absent.slist");
    let result = ws.run("missing_archive", "human", &["diff", &missing, &other]);
    assert_eq!(result.status.code(), Some(2), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("SLIST-3002"));
}

#[test]
fn malformed_archive_reports_line_number() {
    let ws = Workspace::new();
    let bad = ws.archive("bad.slist");
    fs::write(&bad, "# SLIST VERSION 0\nf:/x:not-a-number\n").unwrap();
    let result = ws.run("malformed_archive", "human", &["read", &bad]);
    assert_eq!(result.status.code(), Some(2), "log: {}", result.log_path.display());
    assert!(result.stderr.contains(":2:"), "stderr: {}", result.stderr);
}

#[test]
fn relative_capture_honors_absolute_exclusions() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.tree.join("skip")).unwrap();
    fs::write(ws.tree.join("skip/secret.txt"), b"hidden").unwrap();
    let excluded = ws.tree.join("skip").to_string_lossy().into_owned();

    let result = common::run_cli_case_from(
        "relative_exclude",
        &ws.home,
        Some(ws.tmp.path()),
        "human",
        &["write", "--relative", "tree", "--exclude", &excluded],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let records: Vec<&str> = result
        .stdout
        .lines()
        .filter(|line| !line.starts_with('#'))
        .collect();
    assert!(records.iter().any(|line| line.ends_with(":readme.txt")));
    assert!(
        !records
            .iter()
            .any(|line| line.ends_with(":skip") || line.ends_with(":skip/secret.txt")),
        "excluded subtree captured; log: {}",
        result.log_path.display()
    );
}

#[test]
fn write_rejects_missing_directory() {
    let ws = Workspace::new();
    let missing = ws.tree.join("nope").to_string_lossy().into_owned();
    let result = ws.run("write_missing_dir", "human", &["write", &missing]);
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
}

#[test]
fn config_validate_rejects_bad_values() {
    let ws = Workspace::new();
    let config = ws.home.join("bad.toml");
    fs::write(&config, "[walker]\nparallelism = 0\n").unwrap();
    let config = config.to_string_lossy().into_owned();

    let result = ws.run("config_bad", "json", &["--config", &config, "config", "validate"]);
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert_eq!(parse_json(&result)["valid"], false);

    let good = ws.run("config_default", "json", &["config", "validate"]);
    assert!(good.status.success(), "log: {}", good.log_path.display());
    assert_eq!(parse_json(&good)["valid"], true);
}

#[test]
fn activity_log_records_capture_when_enabled() {
    let ws = Workspace::new();
    let log = ws.home.join("activity.jsonl");
    let config = ws.home.join("log.toml");
    fs::write(
        &config,
        format!(
            "[logging]\nenabled = true\njsonl_path = {:?}\n",
            log.to_string_lossy()
        ),
    )
    .unwrap();
    let config = config.to_string_lossy().into_owned();
    let archive = ws.archive("logged.slist");
    let tree = ws.tree.to_string_lossy().into_owned();

    let result = ws.run(
        "activity_log",
        "human",
        &["--config", &config, "write", &tree, "-o", &archive],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let events: Vec<Value> = fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(events.iter().any(|e| e["event"] == "snapshot_capture"));
    assert!(events.iter().any(|e| e["event"] == "snapshot_save" && e["records"] == 4));
}

// ──── library pipeline ────

#[test]
fn library_capture_save_load_compare() {
    let ws = Workspace::new();
    let walker = TreeWalker::new(WalkerConfig::default());

    let mut first = Snapshot::new();
    let summary = walker.capture(&ws.tree, &mut first).unwrap();
    assert_eq!(summary.files, 2);
    assert_eq!(summary.directories, 2);
    assert!(summary.skipped.is_empty());

    let path = ws.out.join("lib.slist");
    first.save(&path).unwrap();
    let reloaded = Snapshot::load(&path).unwrap();
    assert_eq!(reloaded.len(), first.len());
    assert!(equal(&first, &reloaded));
    assert!(subset(&first, &reloaded) && subset(&reloaded, &first));

    fs::write(ws.tree.join("docs/guide.txt"), b"rewritten guide").unwrap();
    let mut second = Snapshot::new();
    walker.capture(&ws.tree, &mut second).unwrap();
    assert!(!equal(&first, &second));

    let changed = difference(&second, &first);
    assert!(
        changed
            .file_paths()
            .iter()
            .any(|p| p.ends_with("docs/guide.txt"))
    );
    let all = m_union(&[first.clone(), second.clone()]).unwrap();
    assert_eq!(
        all.len(),
        first.len() + second.len() - intersection(&first, &second).len()
    );
}
