//! Filesystem scanner: content checksums and the tree walker that turns a
//! directory tree into a snapshot.

pub mod checksum;
pub mod walker;
