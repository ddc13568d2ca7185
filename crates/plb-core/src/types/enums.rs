//! Enumerations used throughout the PLB system.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Order side (per-event)
// ---------------------------------------------------------------------------

/// Side carried by a raw order event.
///
/// Feeds routinely omit the side on removal events, so the event-level enum
/// has an `Undefined` member. Live book state only ever holds the specified
/// sides — see [`BookSide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
    #[default]
    Undefined,
}

impl OrderSide {
    /// Resolve to a concrete book side, or `None` for `Undefined`.
    #[inline]
    pub fn specified(self) -> Option<BookSide> {
        match self {
            Self::Buy => Some(BookSide::Bid),
            Self::Sell => Some(BookSide::Ask),
            Self::Undefined => None,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
            Self::Undefined => write!(f, "undefined"),
        }
    }
}

// ---------------------------------------------------------------------------
// Book side (aggregated)
// ---------------------------------------------------------------------------

/// Side of the aggregated book: bids (buys) or asks (sells).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    Ask,
}

impl std::fmt::Display for BookSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bid => write!(f, "bid"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_resolution() {
        assert_eq!(OrderSide::Buy.specified(), Some(BookSide::Bid));
        assert_eq!(OrderSide::Sell.specified(), Some(BookSide::Ask));
        assert_eq!(OrderSide::Undefined.specified(), None);
    }
}
