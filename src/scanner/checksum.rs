//! Streamed content checksums for regular files.
//!
//! SHA-256 over the file bytes, truncated to the leading 128 bits to fit the
//! fixed-width checksum field.

#![allow(missing_docs)]

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::snapshot::record::{CHECKSUM_LEN, Checksum};

/// Default read buffer size.
pub const DEFAULT_BUFFER_BYTES: usize = 64 * 1024;

/// Smallest buffer accepted by config validation.
pub const MIN_BUFFER_BYTES: usize = 512;

/// Checksum everything `reader` yields, reading `buffer_bytes` at a time.
pub fn checksum_reader<R: Read>(mut reader: R, buffer_bytes: usize) -> io::Result<Checksum> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; buffer_bytes.max(MIN_BUFFER_BYTES)];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buffer[..read]);
    }
    Ok(truncate(&hasher.finalize()))
}

/// Checksum the file at `path`.
pub fn checksum_file(path: &Path, buffer_bytes: usize) -> io::Result<Checksum> {
    checksum_reader(File::open(path)?, buffer_bytes)
}

/// Checksum an in-memory buffer.
pub fn checksum_bytes(bytes: &[u8]) -> Checksum {
    truncate(&Sha256::digest(bytes))
}

fn truncate(digest: &[u8]) -> Checksum {
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    Checksum(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_sha256_prefix() {
        // SHA-256("") = e3b0c442 98fc1c14 9afbf4c8 996fb924 ...
        assert_eq!(
            checksum_bytes(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb924"
        );
    }

    #[test]
    fn streaming_matches_one_shot_for_any_buffer() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let expected = checksum_bytes(&data);
        for buffer in [1, 512, 4096, 1 << 20] {
            assert_eq!(checksum_reader(data.as_slice(), buffer).unwrap(), expected);
        }
    }

    #[test]
    fn file_checksum_tracks_content() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();
        let sa = checksum_file(&a, DEFAULT_BUFFER_BYTES).unwrap();
        assert_eq!(sa, checksum_file(&b, DEFAULT_BUFFER_BYTES).unwrap());
        std::fs::write(&b, b"other bytes").unwrap();
        assert_ne!(sa, checksum_file(&b, DEFAULT_BUFFER_BYTES).unwrap());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(checksum_file(Path::new("/no/such/file"), DEFAULT_BUFFER_BYTES).is_err());
    }
}
