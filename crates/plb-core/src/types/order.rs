//! Raw order events and live-order snapshot entries.

use super::enums::{BookSide, OrderSide};

// ---------------------------------------------------------------------------
// Event flags
// ---------------------------------------------------------------------------

/// Bit flags carried on raw order events.
pub mod event_flags {
    /// The event removes the order it refers to.
    pub const REMOVE_EVENT: u32 = 0x02;
}

// ---------------------------------------------------------------------------
// OrderEvent — transient, per input record
// ---------------------------------------------------------------------------

/// A single raw order record as delivered by the feed.
///
/// Removal events routinely carry only the order `index`; price, size, and
/// side may be absent (zero / NaN / undefined). The last-known values are
/// recovered from the order index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderEvent {
    pub index: i64,
    pub price: f64,
    pub size: f64,
    pub time: i64,
    pub side: OrderSide,
    pub flags: u32,
}

impl OrderEvent {
    /// An event is a removal iff its remove flag is set, its size is zero,
    /// or its size is NaN.
    #[inline]
    pub fn is_removal(&self) -> bool {
        self.flags & event_flags::REMOVE_EVENT != 0 || self.size == 0.0 || self.size.is_nan()
    }
}

impl Default for OrderEvent {
    fn default() -> Self {
        Self {
            index: 0,
            price: f64::NAN,
            size: f64::NAN,
            time: 0,
            side: OrderSide::Undefined,
            flags: 0,
        }
    }
}

impl std::fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order(#{} {} {:.8}x{:.4} t={} flags={:#x})",
            self.index, self.side, self.price, self.size, self.time, self.flags
        )
    }
}

// ---------------------------------------------------------------------------
// OrderEntry — stored snapshot of a live order
// ---------------------------------------------------------------------------

/// Last-known state of a currently-live order.
///
/// Created on the first non-removal event for an order index, mutated when
/// the index reappears, destroyed on removal. Always has a defined side and
/// a finite positive size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderEntry {
    pub index: i64,
    pub price: f64,
    pub size: f64,
    pub time: i64,
    pub side: BookSide,
}

impl std::fmt::Display for OrderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Entry(#{} {} {:.8}x{:.4} t={})",
            self.index, self.side, self.price, self.size, self.time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_classification() {
        let base = OrderEvent {
            index: 1,
            price: 100.0,
            size: 5.0,
            time: 1,
            side: OrderSide::Sell,
            flags: 0,
        };
        assert!(!base.is_removal());

        let flagged = OrderEvent { flags: event_flags::REMOVE_EVENT, ..base };
        assert!(flagged.is_removal());

        let zero_size = OrderEvent { size: 0.0, ..base };
        assert!(zero_size.is_removal());

        let nan_size = OrderEvent { size: f64::NAN, ..base };
        assert!(nan_size.is_removal());
    }
}
