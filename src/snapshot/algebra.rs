//! Set algebra over snapshots.
//!
//! Membership is decided by identity key, so a record whose metadata changed
//! is a different member. Every operation is pure: operands are borrowed and
//! results are fresh snapshots.

#![allow(missing_docs)]

use std::collections::HashMap;

use crate::core::errors::{Result, SlistError};
use crate::snapshot::format::IdentityKey;
use crate::snapshot::record::{CompareMode, FingerprintRecord, RecordKind};
use crate::snapshot::store::Snapshot;

/// Minimal view needed on the right-hand side of a membership test.
pub trait RecordLookup {
    fn len(&self) -> usize;
    fn contains_key(&self, key: IdentityKey) -> bool;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordLookup for Snapshot {
    fn len(&self) -> usize {
        Self::len(self)
    }

    fn contains_key(&self, key: IdentityKey) -> bool {
        Self::contains_key(self, key)
    }
}

/// Records of `a` with no identity match in `b`.
pub fn difference<L: RecordLookup + ?Sized>(a: &Snapshot, b: &L) -> Snapshot {
    filter_members(a, |key| !b.contains_key(key))
}

/// Records of `a` with an identity match in `b`.
pub fn intersection<L: RecordLookup + ?Sized>(a: &Snapshot, b: &L) -> Snapshot {
    filter_members(a, |key| b.contains_key(key))
}

/// `a` plus every record of `b` not already in `a`.
pub fn union(a: &Snapshot, b: &Snapshot) -> Snapshot {
    let mut out = a.clone();
    out.extend_sources(b.sources());
    for (key, record) in b.iter() {
        if !out.contains_key(key) {
            out.insert_keyed(key, record.clone());
        }
    }
    out
}

/// Every record of `a` is in `b`. Rejects on size before any lookup.
pub fn subset<L: RecordLookup + ?Sized>(a: &Snapshot, b: &L) -> bool {
    if a.len() > b.len() {
        return false;
    }
    a.iter().all(|(key, _)| b.contains_key(key))
}

/// No record of `a` is in `b`.
pub fn disjoint<L: RecordLookup + ?Sized>(a: &Snapshot, b: &L) -> bool {
    a.iter().all(|(key, _)| !b.contains_key(key))
}

/// Snapshot-level equality: same size, and the records pair up one-to-one so
/// that each pair has the same checksum.
///
/// Records with the same identity key pair with each other. The rest pair with
/// an unpaired record of the same kind at the same pathname. Metadata is not
/// compared, so this is looser than record identity.
pub fn equal(a: &Snapshot, b: &Snapshot) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut unpaired: Option<HashMap<(RecordKind, &str), Vec<&FingerprintRecord>>> = None;
    for (key, record) in a.iter() {
        if b.contains_key(key) {
            continue;
        }
        let candidates = unpaired
            .get_or_insert_with(|| unpaired_by_path(b, a))
            .get_mut(&(record.kind(), record.pathname()));
        let Some(candidates) = candidates else {
            return false;
        };
        let Some(index) = candidates
            .iter()
            .position(|other| record.content_equal(other, CompareMode::Checksum))
        else {
            return false;
        };
        candidates.swap_remove(index);
    }
    true
}

/// Records of `b` whose identity is absent from `a`, grouped by kind and path.
fn unpaired_by_path<'b>(
    b: &'b Snapshot,
    a: &Snapshot,
) -> HashMap<(RecordKind, &'b str), Vec<&'b FingerprintRecord>> {
    let mut index: HashMap<_, Vec<_>> = HashMap::new();
    for (key, record) in b.iter() {
        if !a.contains_key(key) {
            index
                .entry((record.kind(), record.pathname()))
                .or_default()
                .push(record);
        }
    }
    index
}

fn filter_members(a: &Snapshot, mut keep: impl FnMut(IdentityKey) -> bool) -> Snapshot {
    let mut out = Snapshot::with_capacity(a.len());
    out.extend_sources(a.sources());
    for (key, record) in a.iter() {
        if keep(key) {
            out.insert_keyed(key, record.clone());
        }
    }
    out
}

// ──────────────────────── N-way operations ────────────────────────

fn require_pair(snapshots: &[Snapshot], op: &str) -> Result<()> {
    if snapshots.len() < 2 {
        return Err(SlistError::InvalidArgument {
            details: format!(
                "{op} needs at least two snapshots, got {}",
                snapshots.len()
            ),
        });
    }
    Ok(())
}

fn fold(
    snapshots: &[Snapshot],
    op: &str,
    step: impl Fn(&Snapshot, &Snapshot) -> Snapshot,
) -> Result<Snapshot> {
    require_pair(snapshots, op)?;
    let (first, rest) = snapshots.split_at(1);
    let mut acc = step(&first[0], &rest[0]);
    for next in &rest[1..] {
        acc = step(&acc, next);
    }
    Ok(acc)
}

/// `((s0 - s1) - s2) - ...`
pub fn m_difference(snapshots: &[Snapshot]) -> Result<Snapshot> {
    fold(snapshots, "difference", |a, b| difference(a, b))
}

/// `((s0 ∪ s1) ∪ s2) ∪ ...`
pub fn m_union(snapshots: &[Snapshot]) -> Result<Snapshot> {
    fold(snapshots, "union", union)
}

/// `((s0 ∩ s1) ∩ s2) ∩ ...`
pub fn m_intersection(snapshots: &[Snapshot]) -> Result<Snapshot> {
    fold(snapshots, "intersection", |a, b| intersection(a, b))
}

/// Every adjacent pair is [`equal`].
pub fn m_equal(snapshots: &[Snapshot]) -> Result<bool> {
    require_pair(snapshots, "equal")?;
    Ok(snapshots.windows(2).all(|pair| equal(&pair[0], &pair[1])))
}
