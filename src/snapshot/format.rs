//! Line format for fingerprint records and the identity key derived from it.
//!
//! Each record is one `:`-separated line whose first character selects the
//! kind, and the kind fixes the field count:
//!
//! ```text
//! F:<checksum>:<dev>:<ino>:<mode>:<uid>:<gid>:<size>:<mtime>:<ctime>:<pathname>
//! S:<target>:<pathname>
//! D:<mode>:<uid>:<gid>:<mtime>:<ctime>:<pathname>
//! ```
//!
//! The pathname is always last and is taken verbatim, so it may contain the
//! separator. Separators inside a double-quoted segment are never split
//! points, which lets a quoted symlink target carry a `:` as well.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use crate::core::errors::{Result, SlistError};
use crate::snapshot::record::{
    Checksum, DirectoryFingerprint, FileFingerprint, FingerprintRecord, RecordKind,
    SymlinkFingerprint,
};

/// Field separator.
pub const SEPARATOR: u8 = b':';
/// Fields in a file line, kind tag included.
pub const FIELDS_FILE: usize = 11;
/// Fields in a symlink line.
pub const FIELDS_SYMLINK: usize = 3;
/// Fields in a directory line.
pub const FIELDS_DIRECTORY: usize = 7;

/// Archive format version written in the header comment.
pub const FORMAT_VERSION: u32 = 0;
/// Marker for comment/metadata lines.
pub const COMMENT_PREFIX: &str = "#";
/// Prefix of the provenance line.
pub const SOURCES_PREFIX: &str = "# Sources:";

/// 64-bit identity of a record: FNV-1a over its canonical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(pub u64);

impl IdentityKey {
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// 64-bit FNV-1a.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Identity key of an already-encoded line.
pub fn identity_key_of_line(line: &str) -> IdentityKey {
    IdentityKey(fnv1a_64(line.as_bytes()))
}

/// Identity key of a record.
pub fn identity_key(record: &FingerprintRecord) -> Result<IdentityKey> {
    encode(record).map(|line| identity_key_of_line(&line))
}

/// Encode a record as exactly one line (no trailing newline).
pub fn encode(record: &FingerprintRecord) -> Result<String> {
    check_last_field(record.pathname())?;
    let line = match record {
        FingerprintRecord::File(f) => format!(
            "F:{}:{}:{}:{:o}:{}:{}:{}:{}:{}:{}",
            f.checksum, f.device, f.inode, f.mode, f.uid, f.gid, f.size, f.mtime, f.ctime, f.pathname
        ),
        FingerprintRecord::Symlink(s) => {
            check_inner_field(&s.target, "symlink target")?;
            format!("S:{}:{}", s.target, s.pathname)
        }
        FingerprintRecord::Directory(d) => format!(
            "D:{:o}:{}:{}:{}:{}:{}",
            d.mode, d.uid, d.gid, d.mtime, d.ctime, d.pathname
        ),
        FingerprintRecord::Device(d) => {
            return Err(SlistError::UnsupportedKind {
                kind: RecordKind::Device.label(),
                pathname: d.pathname.clone(),
            });
        }
    };
    Ok(line)
}

/// Parse one record line. The line must already be trimmed.
pub fn parse_line(line: &str) -> Result<FingerprintRecord> {
    let Some(tag) = line.chars().next() else {
        return Err(SlistError::format("empty record line"));
    };
    let kind = RecordKind::from_tag(tag)
        .ok_or_else(|| SlistError::format(format!("unknown kind tag {tag:?}")))?;

    let record = match kind {
        RecordKind::File => {
            let fields = kind_fields(line, FIELDS_FILE)?;
            FingerprintRecord::File(FileFingerprint {
                checksum: Checksum::from_hex(fields[1])?,
                device: parse_decimal(fields[2], "device")?,
                inode: parse_decimal(fields[3], "inode")?,
                mode: parse_octal(fields[4], "mode")?,
                uid: parse_decimal(fields[5], "uid")?,
                gid: parse_decimal(fields[6], "gid")?,
                size: parse_decimal(fields[7], "size")?,
                mtime: parse_decimal(fields[8], "mtime")?,
                ctime: parse_decimal(fields[9], "ctime")?,
                pathname: fields[10].to_string(),
            })
        }
        RecordKind::Symlink => {
            let fields = kind_fields(line, FIELDS_SYMLINK)?;
            FingerprintRecord::Symlink(SymlinkFingerprint {
                target: fields[1].to_string(),
                pathname: fields[2].to_string(),
            })
        }
        RecordKind::Directory => {
            let fields = kind_fields(line, FIELDS_DIRECTORY)?;
            FingerprintRecord::Directory(DirectoryFingerprint {
                mode: parse_octal(fields[1], "mode")?,
                uid: parse_decimal(fields[2], "uid")?,
                gid: parse_decimal(fields[3], "gid")?,
                mtime: parse_decimal(fields[4], "mtime")?,
                ctime: parse_decimal(fields[5], "ctime")?,
                pathname: fields[6].to_string(),
            })
        }
        RecordKind::Device => {
            return Err(SlistError::format("device records have no line form"));
        }
    };
    Ok(record)
}

/// Fields of a line whose kind needs `count` of them.
fn kind_fields(line: &str, count: usize) -> Result<Vec<&str>> {
    let fields = split_fields(line, count)?;
    if fields[0].len() != 1 {
        return Err(SlistError::format(format!(
            "kind field must be a single character, got {:?}",
            fields[0]
        )));
    }
    Ok(fields)
}

/// Split into exactly `count` fields: `count - 1` separators outside quotes,
/// then the verbatim remainder.
fn split_fields(line: &str, count: usize) -> Result<Vec<&str>> {
    let bytes = line.as_bytes();
    let mut fields = Vec::with_capacity(count);
    let mut start = 0;
    let mut quoted = false;

    for pos in memchr::memchr2_iter(SEPARATOR, b'"', bytes) {
        if fields.len() == count - 1 {
            break;
        }
        if bytes[pos] == b'"' {
            quoted = !quoted;
        } else if !quoted {
            fields.push(&line[start..pos]);
            start = pos + 1;
        }
    }

    if fields.len() != count - 1 {
        return Err(SlistError::format(format!(
            "expected {count} fields, found {}",
            fields.len() + 1
        )));
    }
    fields.push(&line[start..]);
    Ok(fields)
}

fn parse_decimal<T: FromStr>(field: &str, name: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    field
        .parse::<T>()
        .map_err(|e| SlistError::format(format!("{name} {field:?}: {e}")))
}

fn parse_octal(field: &str, name: &str) -> Result<u32> {
    u32::from_str_radix(field, 8).map_err(|e| SlistError::format(format!("{name} {field:?}: {e}")))
}

fn check_last_field(value: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(SlistError::format(format!(
            "pathname {value:?} contains a line break"
        )));
    }
    Ok(())
}

/// Fields before the pathname must not contain an unquoted separator and
/// must keep quotes balanced, otherwise the split would shift.
fn check_inner_field(value: &str, name: &str) -> Result<()> {
    check_last_field(value)?;
    let mut quoted = false;
    for byte in value.bytes() {
        match byte {
            b'"' => quoted = !quoted,
            SEPARATOR if !quoted => {
                return Err(SlistError::format(format!(
                    "{name} {value:?} contains an unquoted separator"
                )));
            }
            _ => {}
        }
    }
    if quoted {
        return Err(SlistError::format(format!(
            "{name} {value:?} has an unbalanced quote"
        )));
    }
    Ok(())
}

// ──────────────────────── Provenance line ────────────────────────

/// Render provenance entries for the `# Sources:` line.
pub fn format_sources(sources: &[String]) -> String {
    let joined = sources.join(" ");
    if joined.is_empty() {
        SOURCES_PREFIX.to_string()
    } else {
        format!("{SOURCES_PREFIX} {joined}")
    }
}

/// Split the body of a `# Sources:` line on whitespace outside double quotes.
pub fn parse_sources(body: &str) -> Vec<String> {
    let mut sources = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for ch in body.chars() {
        if ch == '"' {
            quoted = !quoted;
            current.push(ch);
        } else if ch.is_whitespace() && !quoted {
            if !current.is_empty() {
                sources.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        sources.push(current);
    }
    sources
}
