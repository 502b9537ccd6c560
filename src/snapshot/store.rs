//! Snapshot container: fingerprint records keyed by identity, plus provenance.
//!
//! A `Snapshot` owns its records. `Clone` yields a fully independent copy.
//! Records are immutable once inserted; the only mutators are [`Snapshot::add`],
//! [`Snapshot::remove`] and [`Snapshot::append`].

#![allow(missing_docs)]

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::errors::{Result, SlistError};
use crate::snapshot::format::{
    self, COMMENT_PREFIX, FORMAT_VERSION, IdentityKey, SOURCES_PREFIX, format_sources,
    parse_sources,
};
use crate::snapshot::record::{FingerprintRecord, quote_path};

/// Initial capacity reserved by [`Snapshot::new`].
pub const DEFAULT_CAPACITY: usize = 4096;

/// An unordered set of fingerprint records plus the roots/sources it came from.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    sources: Vec<String>,
    entries: HashMap<IdentityKey, FingerprintRecord>,
}

impl Snapshot {
    /// Empty snapshot sized for a typical tree.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sources: Vec::new(),
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Insert a record. A record whose serialized form is already present is
    /// rejected with [`SlistError::HashCollision`].
    pub fn add(&mut self, record: FingerprintRecord) -> Result<IdentityKey> {
        let line = format::encode(&record)?;
        let key = format::identity_key_of_line(&line);
        if self.entries.contains_key(&key) {
            return Err(SlistError::HashCollision {
                key: key.value(),
                record: line,
            });
        }
        self.entries.insert(key, record);
        Ok(key)
    }

    /// Insert under a key already known to be absent (set-algebra results).
    pub(crate) fn insert_keyed(&mut self, key: IdentityKey, record: FingerprintRecord) {
        debug_assert!(!self.entries.contains_key(&key));
        self.entries.insert(key, record);
    }

    /// Remove the record with the same identity. Absent records are a no-op.
    pub fn remove(&mut self, record: &FingerprintRecord) -> Result<Option<FingerprintRecord>> {
        let key = format::identity_key(record)?;
        Ok(self.entries.remove(&key))
    }

    /// Stored record with the same identity as `record`.
    pub fn search(&self, record: &FingerprintRecord) -> Result<Option<&FingerprintRecord>> {
        let key = format::identity_key(record)?;
        Ok(self.entries.get(&key))
    }

    pub fn get(&self, key: IdentityKey) -> Option<&FingerprintRecord> {
        self.entries.get(&key)
    }

    pub fn contains_key(&self, key: IdentityKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records with their identity keys, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (IdentityKey, &FingerprintRecord)> {
        self.entries.iter().map(|(key, record)| (*key, record))
    }

    pub fn records(&self) -> impl Iterator<Item = &FingerprintRecord> {
        self.entries.values()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Record a root or source by its raw pathname. It is stored quoted, the
    /// same way record pathnames are.
    pub fn add_source(&mut self, source: &str) {
        self.sources.push(quote_path(source));
    }

    pub(crate) fn extend_sources(&mut self, sources: &[String]) {
        self.sources.extend_from_slice(sources);
    }

    /// Merge `other` into `self`: provenance first, then every record through
    /// [`Snapshot::add`]. On a collision `self` is left partially merged.
    pub fn append(&mut self, other: &Self) -> Result<&mut Self> {
        self.sources.extend(other.sources.iter().cloned());
        self.entries.reserve(other.len());
        for record in other.entries.values() {
            self.add(record.clone())?;
        }
        Ok(self)
    }

    /// Pathnames of regular-file records, sorted.
    pub fn file_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .entries
            .values()
            .filter(|record| record.is_file())
            .map(FingerprintRecord::pathname)
            .collect();
        paths.sort_unstable();
        paths
    }

    /// Write one regular-file pathname per line.
    pub fn write_file_paths<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        for path in self.file_paths() {
            writeln!(out, "{path}")?;
        }
        out.flush()
    }

    // ──────────────────────── Text archive I/O ────────────────────────

    /// Load a snapshot archive from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| SlistError::io(path, e))?;
        Self::read_from(BufReader::new(file), path)
    }

    /// Parse an archive from any reader. `origin` is used for error context.
    pub fn read_from<R: BufRead>(reader: R, origin: &Path) -> Result<Self> {
        let mut snapshot = Self::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| SlistError::io(origin, e))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(body) = line.strip_prefix(SOURCES_PREFIX) {
                snapshot.sources.extend(parse_sources(body));
                continue;
            }
            if line.starts_with(COMMENT_PREFIX) {
                continue;
            }

            let record = format::parse_line(line).map_err(|e| SlistError::Parse {
                path: origin.to_path_buf(),
                line: index + 1,
                details: match e {
                    SlistError::Format { details } => details,
                    other => other.to_string(),
                },
            })?;
            snapshot.add(record)?;
        }
        Ok(snapshot)
    }

    /// Write the archive: header comments, then one line per record sorted by
    /// line text so repeated saves of the same set are byte-identical.
    pub fn dump<W: Write>(&self, out: W) -> Result<()> {
        let mut lines = Vec::with_capacity(self.len());
        for record in self.entries.values() {
            lines.push(format::encode(record)?);
        }
        lines.sort_unstable();

        let mut out = BufWriter::new(out);
        let write = |out: &mut BufWriter<W>| -> std::io::Result<()> {
            writeln!(out, "{COMMENT_PREFIX} SLIST VERSION {FORMAT_VERSION}")?;
            writeln!(
                out,
                "{COMMENT_PREFIX} File list contains {} entries",
                lines.len()
            )?;
            writeln!(out, "{}", format_sources(&self.sources))?;
            for line in &lines {
                writeln!(out, "{line}")?;
            }
            out.flush()
        };
        write(&mut out).map_err(|e| SlistError::io("<dump>", e))
    }

    /// Save to `path` atomically: write a sibling temp file, then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let temp_path = temp_sibling(path);
        if let Some(parent) = temp_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| SlistError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| SlistError::io(&temp_path, e))?;

        if let Err(err) = self.dump(file) {
            let _ = fs::remove_file(&temp_path);
            return Err(match err {
                SlistError::Io { source, .. } => SlistError::io(&temp_path, source),
                other => other,
            });
        }

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            SlistError::io(path, e)
        })
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
