#![forbid(unsafe_code)]

//! slist: flat-file snapshots of directory trees.
//!
//! A snapshot is a set of fingerprint records (regular files, symlinks and
//! directories) keyed by a hash of their canonical text line. Snapshots are
//! captured by walking a tree, saved as one record per line, and compared with
//! set algebra:
//! 1. **Capture**: [`scanner::walker::TreeWalker`] fingerprints a tree
//! 2. **Archive**: [`snapshot::store::Snapshot`] loads and saves the text format
//! 3. **Compare**: [`snapshot::algebra`] computes difference, union, intersection and equality
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use slist::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use slist::snapshot::algebra::difference;
//! use slist::scanner::walker::{TreeWalker, WalkerConfig};
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod scanner;
pub mod snapshot;
