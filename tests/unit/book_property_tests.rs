//! Property-based tests for book invariants.

use marketfeed_rs::prelude::*;
use proptest::prelude::*;

/// Prices drawn from a narrow band so updates collide often.
fn arb_price() -> impl Strategy<Value = i64> {
    90i64..130i64
}

/// Zero removes; anything else inserts or overwrites.
fn arb_size() -> impl Strategy<Value = i64> {
    prop_oneof![1 => Just(0i64), 3 => 1i64..1_000i64]
}

fn arb_kind() -> impl Strategy<Value = SideKind> {
    prop_oneof![Just(SideKind::Bid), Just(SideKind::Ask)]
}

fn arb_updates() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec((arb_price(), arb_size()), 0..200)
}

fn arb_entry() -> impl Strategy<Value = LevelEntry> {
    prop_oneof![
        1 => Just(LevelEntry::NULL),
        4 => (arb_price(), 1i64..1_000i64, 1i64..50i64)
            .prop_map(|(price, size, count)| LevelEntry::new(price, size, count)),
    ]
}

fn arb_levels() -> impl Strategy<Value = [LevelEntry; VISIBLE_DEPTH]> {
    prop::array::uniform10(arb_entry())
}

fn apply(side: &mut BookSide, updates: &[(i64, i64)]) {
    for &(price, size) in updates {
        side.update(price, size, 1);
    }
}

#[cfg(test)]
mod side_invariants {
    use super::*;

    proptest! {
        #[test]
        fn prop_levels_stay_sorted_unique_and_bounded(
            kind in arb_kind(),
            max_levels in 1usize..20,
            updates in arb_updates(),
        ) {
            let mut side = BookSide::new(kind, max_levels);
            apply(&mut side, &updates);

            prop_assert!(side.depth() <= max_levels);
            prop_assert!(side.levels().iter().all(|level| level.size() != 0));
            for pair in side.levels().windows(2) {
                let (better, worse) = (pair[0].price(), pair[1].price());
                match kind {
                    SideKind::Bid => prop_assert!(better > worse),
                    SideKind::Ask => prop_assert!(better < worse),
                }
            }
        }

        #[test]
        fn prop_removing_an_absent_price_is_a_no_op(
            kind in arb_kind(),
            updates in arb_updates(),
            price in arb_price(),
        ) {
            let mut side = BookSide::new(kind, 16);
            apply(&mut side, &updates);
            side.update(price, 0, 0);
            let before = side.clone();

            prop_assert_eq!(side.update(price, 0, 0), SideUpdate::NotPresent);
            prop_assert_eq!(side, before);
        }

        #[test]
        fn prop_applied_index_points_at_the_level(
            kind in arb_kind(),
            updates in arb_updates(),
            price in arb_price(),
            size in 1i64..1_000i64,
        ) {
            let mut side = BookSide::new(kind, 256);
            apply(&mut side, &updates);

            match side.update(price, size, 7) {
                SideUpdate::Applied(index) => {
                    let level = side.level(index).copied();
                    prop_assert_eq!(level, Some(PriceLevel::new(price, size, 7)));
                }
                other => prop_assert!(false, "unexpected outcome {:?}", other),
            }
        }
    }
}

#[cfg(test)]
mod record_laws {
    use super::*;

    proptest! {
        #[test]
        fn prop_incremental_book_rebuilds_from_its_own_record(
            bid_updates in arb_updates(),
            ask_updates in arb_updates(),
            sequence in 0u64..1_000_000,
        ) {
            let mut book = IncrementalBook::default();
            for &(price, size) in &bid_updates {
                book.update_bid(price, size, 1);
            }
            for &(price, size) in &ask_updates {
                book.update_ask(price, size, 1);
            }
            book.set_sequence_number(sequence);

            let mut record = MarketRecord::new();
            book.write_to(&mut record);
            let mut rebuilt = IncrementalBook::default();
            rebuilt.update_from(&record);

            let mut again = MarketRecord::new();
            rebuilt.write_to(&mut again);
            prop_assert_eq!(again, record);
            prop_assert_eq!(rebuilt.sequence_number(), sequence);
        }

        #[test]
        fn prop_snapshot_book_mirrors_the_last_record(
            first_bids in arb_levels(),
            bids in arb_levels(),
            asks in arb_levels(),
        ) {
            let mut book = SnapshotBook::default();
            let mut record = MarketRecord::new();
            record.bids = first_bids;
            book.update_from(&record);

            record.bids = bids;
            record.asks = asks;
            record.sequence = 42;
            book.update_from(&record);

            let mut out = MarketRecord::new();
            book.write_to(&mut out);
            prop_assert_eq!(out.sequence, 42);
            prop_assert_eq!(out.bids, bids);
            prop_assert_eq!(out.asks, asks);
        }

        #[test]
        fn prop_reported_depth_is_the_first_change(
            before in arb_levels(),
            after in arb_levels(),
        ) {
            let mut book = SnapshotBook::default();
            let mut record = MarketRecord::new();
            record.bids = before;
            book.update_from(&record);

            record.bids = after;
            let expected = before.iter().zip(&after).position(|(old, new)| old != new);
            prop_assert_eq!(book.update_from(&record), expected);
        }
    }
}
