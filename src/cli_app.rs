//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use slist::core::config::Config;
use slist::core::errors::SlistError;
use slist::core::paths::absolutize;
use slist::logger::ActivityLog;
use slist::scanner::walker::{SkippedEntry, TreeWalker, WalkSummary};
use slist::snapshot::algebra::{m_difference, m_equal, m_intersection, m_union};
use slist::snapshot::duplicates::{DuplicateGroup, find_duplicates};
use slist::snapshot::store::Snapshot;

/// slist: capture, compare and combine filesystem snapshots.
#[derive(Debug, Parser)]
#[command(
    name = "slist",
    author,
    version,
    about = "Filesystem snapshot lists and set algebra",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Capture one or more directory trees into a snapshot archive.
    Write(WriteArgs),
    /// Load an archive and re-emit it in canonical form.
    Read(ReadArgs),
    /// Records of the first snapshot missing from every other one.
    Diff(DiffArgs),
    /// Combine the records of every snapshot.
    Union(CombineArgs),
    /// Records present in every snapshot.
    Intersect(CombineArgs),
    /// Exit 0 when all snapshots hold the same content, 1 otherwise.
    Equal(EqualArgs),
    /// Report regular files with identical content.
    Dups(DupsArgs),
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct WriteArgs {
    /// Directories to capture (current directory when omitted).
    #[arg(value_name = "DIR")]
    dirs: Vec<PathBuf>,
    /// Output archive path, stdout if omitted.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Record pathnames relative to each root instead of absolute ones.
    #[arg(long)]
    relative: bool,
    /// Descend into symlinked directories.
    #[arg(long)]
    follow_symlinks: bool,
    /// Stay on the filesystem of each root.
    #[arg(long)]
    one_file_system: bool,
    /// Skip this path and everything below it (repeatable).
    #[arg(long, value_name = "PATH")]
    exclude: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct ReadArgs {
    /// Snapshot archive to load.
    snapshot: PathBuf,
    /// Output archive path, stdout if omitted.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct DiffArgs {
    /// Emit the full archive instead of file pathnames.
    #[arg(long)]
    full: bool,
    /// Snapshot archives; the first is compared against the rest.
    #[arg(required = true, num_args = 2.., value_name = "SNAPSHOT")]
    snapshots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CombineArgs {
    /// Snapshot archives to combine.
    #[arg(required = true, num_args = 2.., value_name = "SNAPSHOT")]
    snapshots: Vec<PathBuf>,
    /// Output archive path, stdout if omitted.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct EqualArgs {
    /// Snapshot archives to compare.
    #[arg(required = true, num_args = 2.., value_name = "SNAPSHOT")]
    snapshots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct DupsArgs {
    /// Snapshot archives to search.
    #[arg(required = true, value_name = "SNAPSHOT")]
    snapshots: Vec<PathBuf>,
    /// Ignore files smaller than this many bytes.
    #[arg(long, default_value_t = 1, value_name = "BYTES")]
    min_size: u64,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Compared snapshots differ. Carries no message.
    #[error("snapshots differ")]
    Different,
    /// JSON serialization failure.
    #[error("failed to serialize JSON output: {0}")]
    Json(#[from] serde_json::Error),
    /// IO failure while writing output.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code for this error class.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) | Self::Different => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }

    /// Whether `main` should print this error.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        !matches!(self, Self::Different)
    }
}

impl From<SlistError> for CliError {
    fn from(value: SlistError) -> Self {
        match value {
            SlistError::ChannelClosed { .. } => Self::Internal(value.to_string()),
            _ if value.is_user_error() => Self::User(value.to_string()),
            _ => Self::Runtime(value.to_string()),
        }
    }
}

/// Per-invocation state shared by the command bodies.
struct Session<'a> {
    cli: &'a Cli,
    config: Config,
    log: ActivityLog,
    mode: OutputMode,
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Config(args) => return run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            generate(args.shell, &mut command, name, &mut io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load(cli.config.as_deref())?;
    let session = Session {
        cli,
        log: ActivityLog::from_config(&config.logging),
        config,
        mode: output_mode(cli),
    };

    let result = match &cli.command {
        Command::Write(args) => run_write(&session, args),
        Command::Read(args) => run_read(&session, args),
        Command::Diff(args) => run_diff(&session, args),
        Command::Union(args) => run_combine(&session, SetCommand::Union, args),
        Command::Intersect(args) => run_combine(&session, SetCommand::Intersect, args),
        Command::Equal(args) => run_equal(&session, args),
        Command::Dups(args) => run_dups(&session, args),
        Command::Config(_) | Command::Completions(_) => Ok(()),
    };
    session.log.flush();
    result
}

// ──────────────────────── Snapshot I/O helpers ────────────────────────

fn load_snapshot(session: &Session<'_>, path: &Path) -> Result<Snapshot, CliError> {
    let started = Instant::now();
    match Snapshot::load(path) {
        Ok(snapshot) => {
            session.log.load(path, snapshot.len(), started.elapsed());
            Ok(snapshot)
        }
        Err(e) => {
            session.log.error(&e, "load");
            Err(e.into())
        }
    }
}

fn load_all(session: &Session<'_>, paths: &[PathBuf]) -> Result<Vec<Snapshot>, CliError> {
    paths.iter().map(|p| load_snapshot(session, p)).collect()
}

/// Save to `output` or dump the archive to stdout.
fn emit_snapshot(
    session: &Session<'_>,
    command: &str,
    snapshot: &Snapshot,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let Some(path) = output else {
        let stdout = io::stdout().lock();
        return snapshot.dump(io::BufWriter::new(stdout)).map_err(|e| {
            session.log.error(&e, "dump");
            e.into()
        });
    };

    let started = Instant::now();
    if let Err(e) = snapshot.save(path) {
        session.log.error(&e, "save");
        return Err(e.into());
    }
    session.log.save(path, snapshot.len(), started.elapsed());

    if session.cli.quiet {
        return Ok(());
    }
    match session.mode {
        OutputMode::Human => {
            println!(
                "{} {} records to {}",
                "Wrote".green().bold(),
                snapshot.len(),
                path.display()
            );
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "command": command,
                "output": path.to_string_lossy(),
                "records": snapshot.len(),
                "sources": snapshot.sources(),
            }))?;
        }
    }
    Ok(())
}

// ──────────────────────── write / read ────────────────────────

fn run_write(session: &Session<'_>, args: &WriteArgs) -> Result<(), CliError> {
    let mut walker_config = session.config.walker.walker_config();
    walker_config.follow_symlinks |= args.follow_symlinks;
    walker_config.relative_paths |= args.relative;
    if args.one_file_system {
        walker_config.cross_devices = false;
    }
    for excluded in &args.exclude {
        walker_config.excluded_paths.insert(absolutize(excluded)?);
    }

    let requested = if args.dirs.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.dirs.clone()
    };
    let mut roots = Vec::with_capacity(requested.len());
    for dir in &requested {
        if !dir.is_dir() {
            return Err(CliError::User(format!(
                "directory '{}' doesn't exist",
                dir.display()
            )));
        }
        roots.push(absolutize(dir)?);
    }

    let log = session.log.clone();
    let verbose = session.cli.verbose;
    let walker = TreeWalker::new(walker_config).with_skip_observer(move |entry: &SkippedEntry| {
        log.skipped(entry);
        if verbose {
            eprintln!("[SLIST-SKIP] {}: {}", entry.path.display(), entry.reason.label());
        }
    });

    let started = Instant::now();
    let captured = walker.capture_many(&roots).map_err(|e| {
        session.log.error(&e, "capture");
        CliError::from(e)
    })?;
    let elapsed = started.elapsed();

    let mut snapshot = Snapshot::new();
    let mut summaries: Vec<&WalkSummary> = Vec::with_capacity(captured.len());
    for (part, summary) in &captured {
        session.log.capture(summary, elapsed);
        snapshot.append(part).map_err(|e| {
            session.log.error(&e, "append");
            CliError::from(e)
        })?;
        summaries.push(summary);
    }

    if !session.cli.quiet && session.mode == OutputMode::Human {
        for summary in &summaries {
            let line = format!(
                "{}: {} files, {} symlinks, {} directories",
                summary.root.display(),
                summary.files,
                summary.symlinks,
                summary.directories
            );
            if summary.skipped.is_empty() {
                eprintln!("{line}");
            } else {
                eprintln!("{line}, {}", format!("{} skipped", summary.skipped.len()).yellow());
            }
        }
    }

    emit_snapshot(session, "write", &snapshot, args.output.as_deref())
}

fn run_read(session: &Session<'_>, args: &ReadArgs) -> Result<(), CliError> {
    let snapshot = load_snapshot(session, &args.snapshot)?;
    emit_snapshot(session, "read", &snapshot, args.output.as_deref())
}

// ──────────────────────── Set algebra commands ────────────────────────

fn run_diff(session: &Session<'_>, args: &DiffArgs) -> Result<(), CliError> {
    let snapshots = load_all(session, &args.snapshots)?;
    let diff = m_difference(&snapshots)?;
    session.log.set_operation("difference", snapshots.len(), diff.len());

    if args.full {
        return emit_snapshot(session, "diff", &diff, None);
    }

    match session.mode {
        OutputMode::Human => {
            let stdout = io::stdout().lock();
            diff.write_file_paths(io::BufWriter::new(stdout))?;
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "diff",
                "inputs": snapshots.len(),
                "records": diff.len(),
                "paths": diff.file_paths(),
            }))?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum SetCommand {
    Union,
    Intersect,
}

fn run_combine(session: &Session<'_>, command: SetCommand, args: &CombineArgs) -> Result<(), CliError> {
    let snapshots = load_all(session, &args.snapshots)?;
    let (name, operation, combined) = match command {
        SetCommand::Union => ("union", "union", m_union(&snapshots)?),
        SetCommand::Intersect => ("intersect", "intersection", m_intersection(&snapshots)?),
    };
    session.log.set_operation(operation, snapshots.len(), combined.len());
    emit_snapshot(session, name, &combined, args.output.as_deref())
}

fn run_equal(session: &Session<'_>, args: &EqualArgs) -> Result<(), CliError> {
    let snapshots = load_all(session, &args.snapshots)?;
    let equal = m_equal(&snapshots)?;
    session.log.set_operation("equal", snapshots.len(), usize::from(equal));

    if !session.cli.quiet {
        match session.mode {
            OutputMode::Human => {
                if equal {
                    println!("{}", "equal".green());
                } else {
                    println!("{}", "different".red());
                }
            }
            OutputMode::Json => {
                write_json_line(&json!({
                    "command": "equal",
                    "inputs": snapshots.len(),
                    "equal": equal,
                }))?;
            }
        }
    }

    if equal { Ok(()) } else { Err(CliError::Different) }
}

fn run_dups(session: &Session<'_>, args: &DupsArgs) -> Result<(), CliError> {
    let snapshots = load_all(session, &args.snapshots)?;
    let groups = find_duplicates(&snapshots, args.min_size);
    let wasted: u64 = groups.iter().map(DuplicateGroup::wasted_bytes).sum();
    session.log.set_operation("duplicates", snapshots.len(), groups.len());

    match session.mode {
        OutputMode::Human => {
            if groups.is_empty() {
                if !session.cli.quiet {
                    println!("No duplicate files found.");
                }
                return Ok(());
            }
            for group in &groups {
                println!(
                    "{} {} bytes x{} ({} wasted)",
                    group.checksum.to_hex().bold(),
                    group.size,
                    group.pathnames.len(),
                    group.wasted_bytes()
                );
                for pathname in &group.pathnames {
                    println!("  {pathname}");
                }
            }
            if !session.cli.quiet {
                println!(
                    "{} groups, {} bytes reclaimable",
                    groups.len(),
                    wasted.to_string().yellow()
                );
            }
        }
        OutputMode::Json => {
            let rendered: Vec<Value> = groups
                .iter()
                .map(|group| {
                    let mut value = serde_json::to_value(group)?;
                    value["wasted_bytes"] = json!(group.wasted_bytes());
                    Ok(value)
                })
                .collect::<Result<_, serde_json::Error>>()?;
            write_json_line(&json!({
                "command": "dups",
                "inputs": snapshots.len(),
                "groups": rendered,
                "wasted_bytes": wasted,
            }))?;
        }
    }
    Ok(())
}

// ──────────────────────── config ────────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match mode {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    }))?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;
            match mode {
                OutputMode::Human => println!("{}", config.to_toml()?),
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    }))?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                match mode {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        write_json_line(&json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        }))?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match mode {
                    OutputMode::Human => eprintln!("Configuration is {}: {e}", "INVALID".red()),
                    OutputMode::Json => {
                        write_json_line(&json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                            "code": e.code(),
                        }))?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────────── Output helpers ────────────────────────

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("SLIST_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
