//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use slist::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, SlistError};

// Logging
pub use crate::logger::ActivityLog;

// Scanner
pub use crate::scanner::walker::{SkipReason, SkippedEntry, TreeWalker, WalkSummary, WalkerConfig};

// Snapshot
pub use crate::snapshot::algebra::{
    RecordLookup, difference, disjoint, equal, intersection, m_difference, m_equal,
    m_intersection, m_union, subset, union,
};
pub use crate::snapshot::duplicates::{DuplicateGroup, find_duplicates};
pub use crate::snapshot::format::IdentityKey;
pub use crate::snapshot::record::{Checksum, CompareMode, FingerprintRecord, RecordKind};
pub use crate::snapshot::store::Snapshot;
