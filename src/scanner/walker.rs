//! Tree walker: fingerprints every entry under a root into a snapshot.
//!
//! The walk is depth-first and deterministic (children are visited in name
//! order). Per-entry failures never abort a capture: the entry is skipped and
//! reported in the [`WalkSummary`]. Only an unreadable root, or a record that
//! collides with one already in the target snapshot, is fatal.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel as channel;
use serde::Serialize;

use crate::core::errors::{Result, SlistError};
use crate::scanner::checksum::{self, DEFAULT_BUFFER_BYTES};
use crate::snapshot::record::{
    DirectoryFingerprint, FileFingerprint, FingerprintRecord, MODE_MASK, SymlinkFingerprint,
    quote_path,
};
use crate::snapshot::store::Snapshot;

/// Walker configuration derived from the `[walker]` config section.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Descend into directories reached through symlinks.
    pub follow_symlinks: bool,
    /// Descend into directories on other filesystems than the root.
    pub cross_devices: bool,
    /// Record pathnames relative to the root instead of as given.
    pub relative_paths: bool,
    /// Subtrees that are never entered. Matched against the root joined with
    /// each entry name, so they must be spelled the way the root is.
    pub excluded_paths: HashSet<PathBuf>,
    /// Worker threads for [`TreeWalker::capture_many`].
    pub parallelism: usize,
    pub checksum_buffer_bytes: usize,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            cross_devices: true,
            relative_paths: false,
            excluded_paths: HashSet::new(),
            parallelism: 4,
            checksum_buffer_bytes: DEFAULT_BUFFER_BYTES,
        }
    }
}

/// Why an entry was left out of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "details", rename_all = "snake_case")]
pub enum SkipReason {
    /// stat, read_dir, read_link or open/read failed.
    Unreadable(String),
    /// Device node, socket or FIFO.
    SpecialFile,
    /// Pathname contains a line break and cannot be stored.
    LineBreak,
    /// Name is not valid UTF-8.
    NonUtf8Name,
    /// Record could not be encoded (e.g. a symlink target with a stray quote).
    Unencodable(String),
    /// Directory on another filesystem with `cross_devices = false`.
    CrossDevice,
    /// Listed in `excluded_paths`.
    Excluded,
    /// Directory already visited (symlink loop or bind mount).
    Revisited,
}

impl SkipReason {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Unreadable(_) => "unreadable",
            Self::SpecialFile => "special_file",
            Self::LineBreak => "line_break",
            Self::NonUtf8Name => "non_utf8_name",
            Self::Unencodable(_) => "unencodable",
            Self::CrossDevice => "cross_device",
            Self::Excluded => "excluded",
            Self::Revisited => "revisited",
        }
    }
}

/// One skipped entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Outcome of capturing one root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalkSummary {
    pub root: PathBuf,
    pub files: usize,
    pub symlinks: usize,
    pub directories: usize,
    pub skipped: Vec<SkippedEntry>,
}

impl WalkSummary {
    pub fn recorded(&self) -> usize {
        self.files + self.symlinks + self.directories
    }
}

type SkipObserver = Arc<dyn Fn(&SkippedEntry) + Send + Sync>;

/// Populates snapshots from live directory trees.
pub struct TreeWalker {
    config: WalkerConfig,
    skip_observer: Option<SkipObserver>,
}

/// Pending visit: filesystem path plus the (unquoted) pathname to record.
struct Pending {
    path: PathBuf,
    display: String,
}

/// Stat fields shared by file and directory records.
struct StatFields {
    device: u64,
    inode: u64,
    mode: u32,
    uid: u32,
    gid: u32,
    size: u64,
    mtime: i64,
    ctime: i64,
}

impl TreeWalker {
    pub fn new(config: WalkerConfig) -> Self {
        Self {
            config,
            skip_observer: None,
        }
    }

    /// Install a callback invoked for every skipped entry as it happens.
    #[must_use]
    pub fn with_skip_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&SkippedEntry) + Send + Sync + 'static,
    {
        self.skip_observer = Some(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &WalkerConfig {
        &self.config
    }

    /// Capture `root` into `snapshot` and append the root to its provenance.
    pub fn capture(&self, root: &Path, snapshot: &mut Snapshot) -> Result<WalkSummary> {
        let root_display = root.to_str().ok_or_else(|| SlistError::InvalidArgument {
            details: format!("root {} is not valid UTF-8", root.display()),
        })?;
        let root_meta = self
            .metadata(root)
            .map_err(|err| SlistError::io(root, err))?;
        let root_device = stat_fields(&root_meta).device;

        let mut summary = WalkSummary {
            root: root.to_path_buf(),
            ..WalkSummary::default()
        };
        let mut visited: HashSet<(u64, u64)> = HashSet::new();
        let mut stack = vec![Pending {
            path: root.to_path_buf(),
            display: if self.config.relative_paths {
                ".".to_string()
            } else {
                root_display.to_string()
            },
        }];

        while let Some(pending) = stack.pop() {
            let meta = if pending.path == root {
                Ok(root_meta.clone())
            } else {
                fs::symlink_metadata(&pending.path)
            };
            let meta = match meta {
                Ok(meta) => meta,
                Err(err) => {
                    self.skip(&mut summary, &pending.path, SkipReason::Unreadable(err.to_string()));
                    continue;
                }
            };
            self.visit(
                pending,
                &meta,
                root_device,
                &mut visited,
                &mut stack,
                snapshot,
                &mut summary,
            )?;
        }

        snapshot.add_source(root_display);
        Ok(summary)
    }

    /// [`capture`](Self::capture), then send a copy of the summary on `signal`.
    /// A dropped receiver is ignored.
    pub fn capture_with_signal(
        &self,
        root: &Path,
        snapshot: &mut Snapshot,
        signal: Option<&channel::Sender<WalkSummary>>,
    ) -> Result<WalkSummary> {
        let summary = self.capture(root, snapshot)?;
        if let Some(tx) = signal {
            let _ = tx.send(summary.clone());
        }
        Ok(summary)
    }

    /// Capture each root into its own snapshot on up to `parallelism` worker
    /// threads. Results come back in root order; the first failing root (in
    /// that order) fails the whole call.
    pub fn capture_many(&self, roots: &[PathBuf]) -> Result<Vec<(Snapshot, WalkSummary)>> {
        let workers = self.config.parallelism.clamp(1, roots.len().max(1));
        let (work_tx, work_rx) = channel::unbounded::<(usize, &Path)>();
        let (result_tx, result_rx) =
            channel::unbounded::<(usize, Result<(Snapshot, WalkSummary)>)>();

        for (index, root) in roots.iter().enumerate() {
            let _ = work_tx.send((index, root.as_path()));
        }
        drop(work_tx);

        thread::scope(|scope| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (index, root) in work_rx {
                        let mut snapshot = Snapshot::new();
                        let outcome = self
                            .capture(root, &mut snapshot)
                            .map(|summary| (snapshot, summary));
                        if result_tx.send((index, outcome)).is_err() {
                            return;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<Result<(Snapshot, WalkSummary)>>> =
            roots.iter().map(|_| None).collect();
        for (index, outcome) in result_rx {
            slots[index] = Some(outcome);
        }
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(SlistError::ChannelClosed {
                        component: "capture worker",
                    })
                })
            })
            .collect()
    }

    // ──────────────────────── Internals ────────────────────────

    fn metadata(&self, path: &Path) -> io::Result<fs::Metadata> {
        if self.config.follow_symlinks {
            fs::metadata(path)
        } else {
            fs::symlink_metadata(path)
        }
    }

    fn skip(&self, summary: &mut WalkSummary, path: &Path, reason: SkipReason) {
        let entry = SkippedEntry {
            path: path.to_path_buf(),
            reason,
        };
        if let Some(observer) = &self.skip_observer {
            observer(&entry);
        }
        summary.skipped.push(entry);
    }

    /// Record `snapshot.add(record)`; encoding failures become skips.
    fn record(
        &self,
        snapshot: &mut Snapshot,
        summary: &mut WalkSummary,
        path: &Path,
        record: FingerprintRecord,
    ) -> Result<bool> {
        match snapshot.add(record) {
            Ok(_) => Ok(true),
            Err(SlistError::Format { details }) => {
                self.skip(summary, path, SkipReason::Unencodable(details));
                Ok(false)
            }
            Err(other) => Err(other),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn visit(
        &self,
        pending: Pending,
        meta: &fs::Metadata,
        root_device: u64,
        visited: &mut HashSet<(u64, u64)>,
        stack: &mut Vec<Pending>,
        snapshot: &mut Snapshot,
        summary: &mut WalkSummary,
    ) -> Result<()> {
        let Pending { path, display } = pending;
        if display.contains(['\n', '\r']) {
            self.skip(summary, &path, SkipReason::LineBreak);
            return Ok(());
        }
        if self.config.excluded_paths.contains(&path) {
            self.skip(summary, &path, SkipReason::Excluded);
            return Ok(());
        }
        let pathname = quote_path(&display);
        let file_type = meta.file_type();

        if file_type.is_symlink() {
            let target = match fs::read_link(&path) {
                Ok(target) => target,
                Err(err) => {
                    self.skip(summary, &path, SkipReason::Unreadable(err.to_string()));
                    return Ok(());
                }
            };
            let Some(target) = target.to_str() else {
                self.skip(summary, &path, SkipReason::NonUtf8Name);
                return Ok(());
            };
            let record = FingerprintRecord::Symlink(SymlinkFingerprint {
                target: quote_path(target),
                pathname,
            });
            if self.record(snapshot, summary, &path, record)? {
                summary.symlinks += 1;
            }
            if self.config.follow_symlinks
                && let Ok(target_meta) = fs::metadata(&path)
                && target_meta.is_dir()
            {
                self.visit_directory(
                    path,
                    display,
                    &target_meta,
                    root_device,
                    visited,
                    stack,
                    snapshot,
                    summary,
                )?;
            }
            return Ok(());
        }

        if file_type.is_dir() {
            return self.visit_directory(
                path,
                display,
                meta,
                root_device,
                visited,
                stack,
                snapshot,
                summary,
            );
        }

        if file_type.is_file() {
            let sum = match checksum::checksum_file(&path, self.config.checksum_buffer_bytes) {
                Ok(sum) => sum,
                Err(err) => {
                    self.skip(summary, &path, SkipReason::Unreadable(err.to_string()));
                    return Ok(());
                }
            };
            let stat = stat_fields(meta);
            let record = FingerprintRecord::File(FileFingerprint {
                checksum: sum,
                device: stat.device,
                inode: stat.inode,
                mode: stat.mode,
                uid: stat.uid,
                gid: stat.gid,
                size: stat.size,
                mtime: stat.mtime,
                ctime: stat.ctime,
                pathname,
            });
            if self.record(snapshot, summary, &path, record)? {
                summary.files += 1;
            }
            return Ok(());
        }

        self.skip(summary, &path, SkipReason::SpecialFile);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_directory(
        &self,
        path: PathBuf,
        display: String,
        meta: &fs::Metadata,
        root_device: u64,
        visited: &mut HashSet<(u64, u64)>,
        stack: &mut Vec<Pending>,
        snapshot: &mut Snapshot,
        summary: &mut WalkSummary,
    ) -> Result<()> {
        let stat = stat_fields(meta);
        if !self.config.cross_devices && stat.device != root_device {
            self.skip(summary, &path, SkipReason::CrossDevice);
            return Ok(());
        }
        if !visited.insert((stat.device, stat.inode)) {
            self.skip(summary, &path, SkipReason::Revisited);
            return Ok(());
        }

        let record = FingerprintRecord::Directory(DirectoryFingerprint {
            mode: stat.mode,
            uid: stat.uid,
            gid: stat.gid,
            mtime: stat.mtime,
            ctime: stat.ctime,
            pathname: quote_path(&display),
        });
        if self.record(snapshot, summary, &path, record)? {
            summary.directories += 1;
        }

        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(err) => {
                self.skip(summary, &path, SkipReason::Unreadable(err.to_string()));
                return Ok(());
            }
        };

        let mut children: Vec<(String, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.skip(summary, &path, SkipReason::Unreadable(err.to_string()));
                    continue;
                }
            };
            let child_path = entry.path();
            match entry.file_name().into_string() {
                Ok(name) => children.push((name, child_path)),
                Err(_) => self.skip(summary, &child_path, SkipReason::NonUtf8Name),
            }
        }

        // Reverse name order on the stack so children pop in name order.
        children.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        let relative_root = self.config.relative_paths && display == ".";
        for (name, child_path) in children {
            let child_display = if relative_root {
                name
            } else if display.ends_with('/') {
                format!("{display}{name}")
            } else {
                format!("{display}/{name}")
            };
            stack.push(Pending {
                path: child_path,
                display: child_display,
            });
        }
        Ok(())
    }
}

/// Extract stat fields (Unix-specific via MetadataExt).
fn stat_fields(meta: &fs::Metadata) -> StatFields {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        StatFields {
            device: meta.dev(),
            inode: meta.ino(),
            mode: meta.mode() & MODE_MASK,
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.size(),
            mtime: meta.mtime(),
            ctime: meta.ctime(),
        }
    }
    #[cfg(not(unix))]
    {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .and_then(|d| i64::try_from(d.as_secs()).ok())
            .unwrap_or(0);
        StatFields {
            device: 0,
            inode: 0,
            mode: if meta.permissions().readonly() { 0o444 } else { 0o644 },
            uid: 0,
            gid: 0,
            size: meta.len(),
            mtime,
            ctime: mtime,
        }
    }
}
