//! Translation of raw order-event batches into per-price-level deltas.
//!
//! Each order event contributes signed size changes at one or two prices
//! (two when an order switches sides). Deltas targeting the same price on the
//! same side are consolidated into a single entry by summing, so the book
//! applies at most one operation per price per batch.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use plb_core::types::{BookSide, EPSILON, OrderEntry, OrderEvent};
use tracing::{trace, warn};

use crate::order_index::OrderIndex;
use crate::side::BookPrice;

// ---------------------------------------------------------------------------
// Delta types
// ---------------------------------------------------------------------------

/// A signed size change at one price. Positive size arrived, negative size
/// departed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelDelta {
    pub price: f64,
    pub size: f64,
    pub time: i64,
}

/// Consolidated deltas for one batch, in natural per-side order (asks
/// ascending by price, bids descending).
#[derive(Debug, Clone, Default)]
pub struct PriceLevelDeltas {
    pub asks: Vec<LevelDelta>,
    pub bids: Vec<LevelDelta>,
}

impl PriceLevelDeltas {
    pub fn is_empty(&self) -> bool {
        self.asks.is_empty() && self.bids.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Transform a batch of raw order events into consolidated price-level
/// deltas, updating the order index along the way.
///
/// Per event, in batch order:
/// - removal without a prior entry: skipped (nothing to take back);
/// - first sighting of an order: its size arrives at its price;
/// - removal of a known order: the remembered size departs from the
///   remembered price and side, stamped with the event's time;
/// - modification of a known order: the new size arrives at the event's
///   price; when the order switched sides, the remembered size departs from
///   the old side first.
///
/// Consolidated deltas that sum to less than epsilon are discarded.
pub fn build_deltas(batch: &[OrderEvent], index: &mut OrderIndex) -> PriceLevelDeltas {
    let mut asks: BTreeMap<BookPrice, LevelDelta> = BTreeMap::new();
    let mut bids: BTreeMap<BookPrice, LevelDelta> = BTreeMap::new();

    for event in batch {
        let removal = event.is_removal();
        let prior = index.lookup(event.index);
        trace!("building delta for {event} (removal={removal}, known={})", prior.is_some());

        match (prior, removal) {
            (None, true) => {
                // Removal of an order that was never seen: nothing to do.
            }
            (None, false) => {
                let Some(side) = event.side.specified() else {
                    warn!("order event without side cannot open an order; dropped: {event}");
                    continue;
                };
                if !valid_coordinates(event) {
                    continue;
                }
                merge(side_map(&mut asks, &mut bids, side), side, event.price, event.size, event.time);
                index.upsert(OrderEntry {
                    index: event.index,
                    price: event.price,
                    size: event.size,
                    time: event.time,
                    side,
                });
            }
            (Some(prev), true) => {
                merge(
                    side_map(&mut asks, &mut bids, prev.side),
                    prev.side,
                    prev.price,
                    -prev.size,
                    event.time,
                );
                index.remove(event.index);
            }
            (Some(prev), false) => {
                // Modification events may omit the side; fall back to the
                // remembered one.
                let side = event.side.specified().unwrap_or(prev.side);
                if !valid_coordinates(event) {
                    continue;
                }
                if side != prev.side {
                    merge(
                        side_map(&mut asks, &mut bids, prev.side),
                        prev.side,
                        prev.price,
                        -prev.size,
                        event.time,
                    );
                }
                merge(side_map(&mut asks, &mut bids, side), side, event.price, event.size, event.time);
                index.upsert(OrderEntry {
                    index: event.index,
                    price: event.price,
                    size: event.size,
                    time: event.time,
                    side,
                });
            }
        }
    }

    PriceLevelDeltas { asks: finalize(asks), bids: finalize(bids) }
}

/// A non-removal event must carry a finite price and a finite positive size
/// to form a live order.
fn valid_coordinates(event: &OrderEvent) -> bool {
    if event.price.is_finite() && event.size.is_finite() && event.size > 0.0 {
        true
    } else {
        warn!("order event with unusable price/size; dropped: {event}");
        false
    }
}

fn side_map<'a>(
    asks: &'a mut BTreeMap<BookPrice, LevelDelta>,
    bids: &'a mut BTreeMap<BookPrice, LevelDelta>,
    side: BookSide,
) -> &'a mut BTreeMap<BookPrice, LevelDelta> {
    match side {
        BookSide::Ask => asks,
        BookSide::Bid => bids,
    }
}

/// Fold a signed size change into the per-side accumulator. Later events
/// touching the same price win the time stamp.
fn merge(
    map: &mut BTreeMap<BookPrice, LevelDelta>,
    side: BookSide,
    price: f64,
    size: f64,
    time: i64,
) {
    match map.entry(BookPrice::new(price, side)) {
        Entry::Occupied(mut entry) => {
            let delta = entry.get_mut();
            delta.size += size;
            delta.time = time;
        }
        Entry::Vacant(entry) => {
            entry.insert(LevelDelta { price, size, time });
        }
    }
}

/// Drop consolidated deltas that cancelled out; the map's key order is the
/// natural per-side order.
fn finalize(map: BTreeMap<BookPrice, LevelDelta>) -> Vec<LevelDelta> {
    map.into_values().filter(|d| d.size.abs() >= EPSILON).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plb_core::types::{OrderSide, event_flags};

    fn order(index: i64, price: f64, size: f64, side: OrderSide) -> OrderEvent {
        OrderEvent { index, price, size, time: 1, side, flags: 0 }
    }

    fn removal(index: i64) -> OrderEvent {
        OrderEvent {
            index,
            price: f64::NAN,
            size: f64::NAN,
            time: 2,
            side: OrderSide::Undefined,
            flags: event_flags::REMOVE_EVENT,
        }
    }

    #[test]
    fn new_order_emits_positive_delta() {
        let mut idx = OrderIndex::new();
        let deltas = build_deltas(&[order(1, 100.0, 5.0, OrderSide::Sell)], &mut idx);

        assert_eq!(deltas.asks, vec![LevelDelta { price: 100.0, size: 5.0, time: 1 }]);
        assert!(deltas.bids.is_empty());
        assert_eq!(idx.lookup(1).unwrap().size, 5.0);
    }

    #[test]
    fn removal_uses_remembered_coordinates() {
        let mut idx = OrderIndex::new();
        build_deltas(&[order(1, 100.0, 5.0, OrderSide::Sell)], &mut idx);

        // The removal event itself carries no price/size/side.
        let deltas = build_deltas(&[removal(1)], &mut idx);
        assert_eq!(deltas.asks, vec![LevelDelta { price: 100.0, size: -5.0, time: 2 }]);
        assert!(idx.lookup(1).is_none());
    }

    #[test]
    fn removal_of_unknown_order_is_skipped() {
        let mut idx = OrderIndex::new();
        let deltas = build_deltas(&[removal(42)], &mut idx);
        assert!(deltas.is_empty());
        assert!(idx.is_empty());
    }

    #[test]
    fn side_switch_compensates_old_side() {
        let mut idx = OrderIndex::new();
        build_deltas(&[order(1, 100.0, 5.0, OrderSide::Sell)], &mut idx);

        let deltas = build_deltas(&[order(1, 99.0, 4.0, OrderSide::Buy)], &mut idx);
        assert_eq!(deltas.asks, vec![LevelDelta { price: 100.0, size: -5.0, time: 1 }]);
        assert_eq!(deltas.bids, vec![LevelDelta { price: 99.0, size: 4.0, time: 1 }]);
        assert_eq!(idx.lookup(1).unwrap().side, BookSide::Bid);
    }

    #[test]
    fn same_price_deltas_consolidate() {
        let mut idx = OrderIndex::new();
        let deltas = build_deltas(
            &[
                order(1, 100.0, 5.0, OrderSide::Sell),
                order(2, 100.0, 2.0, OrderSide::Sell),
                order(3, 101.0, 1.0, OrderSide::Sell),
            ],
            &mut idx,
        );

        assert_eq!(
            deltas.asks,
            vec![
                LevelDelta { price: 100.0, size: 7.0, time: 1 },
                LevelDelta { price: 101.0, size: 1.0, time: 1 },
            ]
        );
    }

    #[test]
    fn add_and_remove_in_one_batch_cancel_out() {
        let mut idx = OrderIndex::new();
        let deltas = build_deltas(&[order(1, 100.0, 5.0, OrderSide::Sell), removal(1)], &mut idx);

        assert!(deltas.is_empty());
        assert!(idx.is_empty());
    }

    #[test]
    fn repeated_event_doubles_the_delta() {
        let mut idx = OrderIndex::new();
        let event = order(1, 100.0, 5.0, OrderSide::Sell);
        let deltas = build_deltas(&[event, event], &mut idx);

        assert_eq!(deltas.asks, vec![LevelDelta { price: 100.0, size: 10.0, time: 1 }]);
    }

    #[test]
    fn output_is_in_natural_side_order() {
        let mut idx = OrderIndex::new();
        let deltas = build_deltas(
            &[
                order(1, 102.0, 1.0, OrderSide::Sell),
                order(2, 100.0, 1.0, OrderSide::Sell),
                order(3, 97.0, 1.0, OrderSide::Buy),
                order(4, 99.0, 1.0, OrderSide::Buy),
            ],
            &mut idx,
        );

        let ask_prices: Vec<f64> = deltas.asks.iter().map(|d| d.price).collect();
        let bid_prices: Vec<f64> = deltas.bids.iter().map(|d| d.price).collect();
        assert_eq!(ask_prices, vec![100.0, 102.0]);
        assert_eq!(bid_prices, vec![99.0, 97.0]);
    }

    #[test]
    fn undefined_side_without_prior_is_dropped() {
        let mut idx = OrderIndex::new();
        let deltas = build_deltas(&[order(1, 100.0, 5.0, OrderSide::Undefined)], &mut idx);
        assert!(deltas.is_empty());
        assert!(idx.is_empty());
    }

    #[test]
    fn undefined_side_with_prior_inherits_it() {
        let mut idx = OrderIndex::new();
        build_deltas(&[order(1, 100.0, 5.0, OrderSide::Sell)], &mut idx);

        let deltas = build_deltas(&[order(1, 100.0, 6.0, OrderSide::Undefined)], &mut idx);
        assert_eq!(deltas.asks, vec![LevelDelta { price: 100.0, size: 6.0, time: 1 }]);
        assert_eq!(idx.lookup(1).unwrap().side, BookSide::Ask);
    }

    #[test]
    fn non_finite_price_is_dropped() {
        let mut idx = OrderIndex::new();
        let deltas = build_deltas(&[order(1, f64::NAN, 5.0, OrderSide::Sell)], &mut idx);
        assert!(deltas.is_empty());
        assert!(idx.is_empty());
    }

    #[test]
    fn negative_size_is_dropped() {
        let mut idx = OrderIndex::new();
        let deltas = build_deltas(&[order(1, 100.0, -5.0, OrderSide::Sell)], &mut idx);
        assert!(deltas.is_empty());
        assert!(idx.is_empty());
    }

    #[test]
    fn latest_time_wins_on_consolidation() {
        let mut idx = OrderIndex::new();
        let mut first = order(1, 100.0, 5.0, OrderSide::Sell);
        first.time = 10;
        let mut second = order(2, 100.0, 2.0, OrderSide::Sell);
        second.time = 20;

        let deltas = build_deltas(&[first, second], &mut idx);
        assert_eq!(deltas.asks[0].time, 20);
    }
}
