//! Duplicate-content report: regular files that share a checksum.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::snapshot::record::{Checksum, FingerprintRecord};
use crate::snapshot::store::Snapshot;

/// Pathnames whose content hashes to the same checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub checksum: Checksum,
    /// Size of one copy.
    pub size: u64,
    /// Sorted, de-duplicated quoted pathnames.
    pub pathnames: Vec<String>,
}

impl DuplicateGroup {
    /// Bytes that would be reclaimed by keeping a single copy.
    pub fn wasted_bytes(&self) -> u64 {
        let extra = u64::try_from(self.pathnames.len().saturating_sub(1)).unwrap_or(u64::MAX);
        self.size.saturating_mul(extra)
    }
}

/// Group regular files of `snapshots` by checksum. Files smaller than
/// `min_size` are ignored. A pathname seen in several snapshots counts once.
///
/// Groups are ordered by wasted bytes (largest first), then checksum.
pub fn find_duplicates(snapshots: &[Snapshot], min_size: u64) -> Vec<DuplicateGroup> {
    let mut by_checksum: BTreeMap<Checksum, (u64, BTreeSet<&str>)> = BTreeMap::new();
    for snapshot in snapshots {
        for record in snapshot.records() {
            let FingerprintRecord::File(file) = record else {
                continue;
            };
            if file.size < min_size {
                continue;
            }
            let entry = by_checksum
                .entry(file.checksum)
                .or_insert_with(|| (file.size, BTreeSet::new()));
            entry.1.insert(file.pathname.as_str());
        }
    }

    let mut groups: Vec<DuplicateGroup> = by_checksum
        .into_iter()
        .filter(|(_, (_, paths))| paths.len() > 1)
        .map(|(checksum, (size, paths))| DuplicateGroup {
            checksum,
            size,
            pathnames: paths.into_iter().map(str::to_string).collect(),
        })
        .collect();
    groups.sort_by(|a, b| {
        b.wasted_bytes()
            .cmp(&a.wasted_bytes())
            .then_with(|| a.checksum.cmp(&b.checksum))
    });
    groups
}
