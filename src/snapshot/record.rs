//! Fingerprint records: one entry per filesystem object captured in a snapshot.
//!
//! Records are a sum type over the supported kinds so a field that does not
//! apply to a kind simply does not exist on that variant. Pathnames are held
//! in their *quoted* form (see [`quote_path`]), which is exactly what the text
//! format stores.

#![allow(missing_docs)]

use std::fmt;

use serde::{Serialize, Serializer};

use crate::core::errors::{Result, SlistError};

/// Width of a content checksum in bytes (128 bits).
pub const CHECKSUM_LEN: usize = 16;

/// Permission bits captured for files and directories: rwx plus setuid,
/// setgid and sticky.
pub const MODE_MASK: u32 = 0o7777;

/// 128-bit content digest of a regular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Checksum(pub [u8; CHECKSUM_LEN]);

impl Checksum {
    /// Parse a hex checksum of at most 32 digits. Shorter input is treated as
    /// zero-padded on the left, matching the fixed-width writer.
    pub fn from_hex(raw: &str) -> Result<Self> {
        if raw.is_empty()
            || raw.len() > CHECKSUM_LEN * 2
            || !raw.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(SlistError::format(format!(
                "checksum must be 1..={} hex digits, got {:?}",
                CHECKSUM_LEN * 2,
                raw
            )));
        }
        let value = u128::from_str_radix(raw, 16)
            .map_err(|e| SlistError::format(format!("checksum {raw:?}: {e}")))?;
        Ok(Self(value.to_be_bytes()))
    }

    /// Lowercase, zero-padded 32-digit hex form.
    pub fn to_hex(&self) -> String {
        format!("{:032x}", u128::from_be_bytes(self.0))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", u128::from_be_bytes(self.0))
    }
}

impl Serialize for Checksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A regular file: content checksum plus stat fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFingerprint {
    pub checksum: Checksum,
    pub device: u64,
    pub inode: u64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub mtime: i64,
    pub ctime: i64,
    pub pathname: String,
}

/// A symbolic link. Identity is path plus link text only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymlinkFingerprint {
    pub target: String,
    pub pathname: String,
}

/// A directory. No checksum, no size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryFingerprint {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub mtime: i64,
    pub ctime: i64,
    pub pathname: String,
}

/// Reserved for device nodes. Not serializable and never equal to anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFingerprint {
    pub pathname: String,
}

/// One filesystem entry at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FingerprintRecord {
    File(FileFingerprint),
    Symlink(SymlinkFingerprint),
    Directory(DirectoryFingerprint),
    Device(DeviceFingerprint),
}

/// Record kind discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    File,
    Symlink,
    Directory,
    Device,
}

impl RecordKind {
    /// Tag character used by the text format, if the kind is serializable.
    pub const fn tag(self) -> Option<char> {
        match self {
            Self::File => Some('F'),
            Self::Symlink => Some('S'),
            Self::Directory => Some('D'),
            Self::Device => None,
        }
    }

    /// Kind for a tag character.
    pub const fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'F' => Some(Self::File),
            'S' => Some(Self::Symlink),
            'D' => Some(Self::Directory),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Symlink => "symlink",
            Self::Directory => "directory",
            Self::Device => "device",
        }
    }
}

/// How two records are compared for content equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    /// Checksum and stat fields.
    All,
    /// Checksum only. Records without a checksum agree with each other.
    Checksum,
    /// Stat fields only.
    Stat,
}

impl FingerprintRecord {
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::File(_) => RecordKind::File,
            Self::Symlink(_) => RecordKind::Symlink,
            Self::Directory(_) => RecordKind::Directory,
            Self::Device(_) => RecordKind::Device,
        }
    }

    /// Quoted pathname as stored.
    pub fn pathname(&self) -> &str {
        match self {
            Self::File(f) => &f.pathname,
            Self::Symlink(s) => &s.pathname,
            Self::Directory(d) => &d.pathname,
            Self::Device(d) => &d.pathname,
        }
    }

    pub const fn checksum(&self) -> Option<&Checksum> {
        match self {
            Self::File(f) => Some(&f.checksum),
            _ => None,
        }
    }

    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// Content comparison under `mode`. Device records are never equal.
    pub fn content_equal(&self, other: &Self, mode: CompareMode) -> bool {
        if matches!(self, Self::Device(_)) || matches!(other, Self::Device(_)) {
            return false;
        }
        match mode {
            CompareMode::All => self.checksum() == other.checksum() && stat_equal(self, other),
            CompareMode::Checksum => self.checksum() == other.checksum(),
            CompareMode::Stat => stat_equal(self, other),
        }
    }
}

/// Per-kind metadata equality. Pathname only participates for symlinks.
fn stat_equal(a: &FingerprintRecord, b: &FingerprintRecord) -> bool {
    match (a, b) {
        (FingerprintRecord::File(x), FingerprintRecord::File(y)) => {
            x.mode == y.mode
                && x.uid == y.uid
                && x.gid == y.gid
                && x.size == y.size
                && x.mtime == y.mtime
                && x.ctime == y.ctime
        }
        (FingerprintRecord::Directory(x), FingerprintRecord::Directory(y)) => {
            x.mode == y.mode
                && x.uid == y.uid
                && x.gid == y.gid
                && x.mtime == y.mtime
                && x.ctime == y.ctime
        }
        (FingerprintRecord::Symlink(x), FingerprintRecord::Symlink(y)) => {
            x.pathname == y.pathname && x.target == y.target
        }
        _ => false,
    }
}

// ──────────────────────── Path quoting ────────────────────────

const QUOTE: char = '"';

fn segment_needs_quoting(segment: &str) -> bool {
    segment.contains(' ') || segment.contains(':')
}

/// Quote every `/`-separated segment that contains a space or the field
/// separator, so the stored form is unambiguous in the line format.
///
/// `a/b c/d` becomes `a/"b c"/d`.
pub fn quote_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    path.split('/')
        .map(|segment| {
            if segment_needs_quoting(segment) {
                format!("{QUOTE}{segment}{QUOTE}")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Inverse of [`quote_path`].
pub fn unquote_path(quoted: &str) -> String {
    quoted
        .split('/')
        .map(|segment| {
            let inner = segment
                .strip_prefix(QUOTE)
                .and_then(|s| s.strip_suffix(QUOTE));
            match inner {
                Some(inner) if segment.len() >= 2 && segment_needs_quoting(inner) => inner,
                _ => segment,
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
