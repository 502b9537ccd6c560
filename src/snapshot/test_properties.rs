//! Property-based tests for the snapshot format and set algebra.
//!
//! Uses `proptest` to check that archives survive a dump/load cycle for
//! arbitrary records (quoted segments included) and that the binary operators
//! keep their set laws on arbitrary inputs.

use std::collections::HashSet;
use std::path::Path;

use proptest::prelude::*;

use super::algebra::{difference, disjoint, intersection, subset, union};
use super::format::IdentityKey;
use super::record::{
    CHECKSUM_LEN, Checksum, DirectoryFingerprint, FileFingerprint, FingerprintRecord,
    SymlinkFingerprint, quote_path,
};
use super::store::Snapshot;

// ──────────────────── strategies ────────────────────

fn arb_path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-zA-Z0-9 ._:-]{1,8}", 1..5)
        .prop_map(|segments| quote_path(&format!("/{}", segments.join("/"))))
}

fn arb_checksum() -> impl Strategy<Value = Checksum> {
    prop::array::uniform16(any::<u8>()).prop_map(|bytes: [u8; CHECKSUM_LEN]| Checksum(bytes))
}

fn arb_record() -> impl Strategy<Value = FingerprintRecord> {
    prop_oneof![
        (
            arb_checksum(),
            any::<u64>(),
            any::<u64>(),
            0u32..0o7777,
            any::<u32>(),
            any::<u32>(),
            any::<u64>(),
            any::<i64>(),
            any::<i64>(),
            arb_path(),
        )
            .prop_map(
                |(checksum, device, inode, mode, uid, gid, size, mtime, ctime, pathname)| {
                    FingerprintRecord::File(FileFingerprint {
                        checksum,
                        device,
                        inode,
                        mode,
                        uid,
                        gid,
                        size,
                        mtime,
                        ctime,
                        pathname,
                    })
                }
            ),
        (arb_path(), arb_path()).prop_map(|(target, pathname)| {
            FingerprintRecord::Symlink(SymlinkFingerprint { target, pathname })
        }),
        (
            0u32..0o7777,
            any::<u32>(),
            any::<u32>(),
            any::<i64>(),
            any::<i64>(),
            arb_path(),
        )
            .prop_map(|(mode, uid, gid, mtime, ctime, pathname)| {
                FingerprintRecord::Directory(DirectoryFingerprint {
                    mode,
                    uid,
                    gid,
                    mtime,
                    ctime,
                    pathname,
                })
            }),
    ]
}

/// Snapshot from arbitrary records; exact duplicates are dropped.
fn build(records: Vec<FingerprintRecord>, source: &str) -> Snapshot {
    let mut snapshot = Snapshot::new();
    snapshot.add_source(source);
    for record in records {
        if snapshot.search(&record).unwrap().is_none() {
            snapshot.add(record).unwrap();
        }
    }
    snapshot
}

fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
    prop::collection::vec(arb_record(), 0..24).prop_map(|records| build(records, "/src dir"))
}

/// Two snapshots that share some records.
fn arb_overlapping_pair() -> impl Strategy<Value = (Snapshot, Snapshot)> {
    (
        prop::collection::vec(arb_record(), 0..12),
        prop::collection::vec(arb_record(), 0..12),
        prop::collection::vec(arb_record(), 0..12),
    )
        .prop_map(|(only_a, shared, only_b)| {
            let a = build(only_a.into_iter().chain(shared.clone()).collect(), "/a");
            let b = build(only_b.into_iter().chain(shared).collect(), "/b");
            (a, b)
        })
}

fn keys(snapshot: &Snapshot) -> HashSet<IdentityKey> {
    snapshot.iter().map(|(key, _)| key).collect()
}

// ──────────────────── properties ────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Dump then load yields the same records and provenance.
    #[test]
    fn archive_round_trip(snapshot in arb_snapshot()) {
        let mut bytes = Vec::new();
        snapshot.dump(&mut bytes).unwrap();
        let loaded = Snapshot::read_from(bytes.as_slice(), Path::new("mem")).unwrap();

        prop_assert_eq!(keys(&loaded), keys(&snapshot));
        prop_assert_eq!(loaded.sources(), snapshot.sources());
        for (key, record) in snapshot.iter() {
            prop_assert_eq!(loaded.get(key), Some(record));
        }
    }

    /// Dumping the same set twice is byte-identical.
    #[test]
    fn dump_is_deterministic(snapshot in arb_snapshot()) {
        let mut first = Vec::new();
        let mut second = Vec::new();
        snapshot.dump(&mut first).unwrap();
        snapshot.clone().dump(&mut second).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Union has the same key set in either order.
    #[test]
    fn union_key_set_commutes((a, b) in arb_overlapping_pair()) {
        prop_assert_eq!(keys(&union(&a, &b)), keys(&union(&b, &a)));
    }

    /// `a - b` and `a ∩ b` partition `a`.
    #[test]
    fn difference_and_intersection_partition((a, b) in arb_overlapping_pair()) {
        let diff = difference(&a, &b);
        let both = intersection(&a, &b);
        prop_assert!(disjoint(&diff, &both));
        prop_assert_eq!(diff.len() + both.len(), a.len());
        let rebuilt: HashSet<IdentityKey> = keys(&diff).union(&keys(&both)).copied().collect();
        prop_assert_eq!(rebuilt, keys(&a));
    }

    /// Both operands are subsets of their union; the intersection is a subset of each.
    #[test]
    fn subset_laws((a, b) in arb_overlapping_pair()) {
        let ab = union(&a, &b);
        prop_assert!(subset(&a, &ab));
        prop_assert!(subset(&b, &ab));
        let both = intersection(&a, &b);
        prop_assert!(subset(&both, &a));
        prop_assert!(subset(&both, &b));
        prop_assert_eq!(disjoint(&a, &b), both.is_empty());
    }
}
