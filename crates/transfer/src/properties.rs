//! Property-based tests for chunk partitioning and the part ledger.
//!
//! These tests use proptest to verify:
//! - Chunks tile the source exactly for any size and chunk size
//! - Ledger drain order and manifest verification do not depend on the
//!   order workers finish in

#![cfg(test)]

use std::io::Cursor;

use proptest::prelude::*;

use crate::{ChunkSource, FinalizeManifest, PartLedger, PartRecord, total_chunks};

fn pattern(len: u64) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn read_all(total: u64, chunk: u64) -> Vec<crate::Chunk> {
    let data = pattern(total);
    let mut src = ChunkSource::new(Cursor::new(data), total, chunk).unwrap();
    let mut out = Vec::new();
    while let Some(c) = src.next_chunk().await.unwrap() {
        out.push(c);
    }
    out
}

// =============================================================================
// Arbitrary Generators
// =============================================================================

prop_compose! {
    fn arb_sizes()(
        total in 1u64..=65_536,
        chunk in 1u64..=8_192,
    ) -> (u64, u64) {
        (total, chunk)
    }
}

fn arb_completion_order() -> impl Strategy<Value = Vec<u32>> {
    (1u32..=300).prop_flat_map(|n| Just((1..=n).collect::<Vec<u32>>()).prop_shuffle())
}

// =============================================================================
// Partitioning
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn chunks_tile_the_source((total, chunk) in arb_sizes()) {
        let expected = total.div_ceil(chunk);
        prop_assert_eq!(total_chunks(total, chunk).unwrap() as u64, expected);

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let chunks = rt.block_on(read_all(total, chunk));
        prop_assert_eq!(chunks.len() as u64, expected);

        let data = pattern(total);
        let mut offset = 0u64;
        for (i, c) in chunks.iter().enumerate() {
            prop_assert_eq!(c.index as usize, i);
            prop_assert_eq!(c.offset, offset);
            prop_assert_eq!(c.payload.len(), c.length);
            prop_assert_eq!(&c.payload[..], &data[offset as usize..c.end() as usize]);
            offset = c.end();
        }
        prop_assert_eq!(offset, total);

        let (last, rest) = chunks.split_last().unwrap();
        for c in rest {
            prop_assert_eq!(c.length as u64, chunk);
        }
        prop_assert_eq!(last.length as u64, total - (expected - 1) * chunk);
    }
}

// =============================================================================
// Ledger
// =============================================================================

proptest! {
    #[test]
    fn ledger_is_order_independent(order in arb_completion_order()) {
        let n = order.len() as u32;
        let ledger = PartLedger::new();
        for part in &order {
            ledger.record(PartRecord::new(*part, format!("tag-{part}")));
        }
        prop_assert_eq!(ledger.len(), order.len());

        let manifest = FinalizeManifest::from_ledger(&ledger);
        prop_assert!(manifest.verify(n).is_ok());

        let numbers: Vec<u32> = manifest.parts().iter().map(|r| r.part_number).collect();
        prop_assert_eq!(numbers, (1..=n).collect::<Vec<u32>>());
        for r in manifest.parts() {
            prop_assert_eq!(&r.tag, &format!("tag-{}", r.part_number));
        }
    }

    #[test]
    fn dropping_any_part_fails_verification(
        order in arb_completion_order(),
        drop_at in any::<prop::sample::Index>(),
    ) {
        let n = order.len() as u32;
        let dropped = order[drop_at.index(order.len())];
        let parts = order
            .iter()
            .filter(|&&p| p != dropped)
            .map(|&p| PartRecord::new(p, "etag"))
            .collect();

        let err = FinalizeManifest::new(parts).verify(n).unwrap_err();
        prop_assert_eq!(err.missing, vec![dropped]);
    }
}
