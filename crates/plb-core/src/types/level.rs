//! Aggregated price levels and the notification payload types.

// ---------------------------------------------------------------------------
// Epsilon comparisons
// ---------------------------------------------------------------------------

/// Tolerance for price equality and zero-size detection.
pub const EPSILON: f64 = f64::EPSILON;

/// Two prices are considered equal iff they differ by less than [`EPSILON`].
#[inline]
pub fn price_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// A level exists iff its aggregated size is strictly beyond [`EPSILON`].
#[inline]
pub fn size_is_zero(size: f64) -> bool {
    size.abs() < EPSILON
}

// ---------------------------------------------------------------------------
// PriceLevel
// ---------------------------------------------------------------------------

/// Aggregate of all live orders at one price on one side.
///
/// Identity is the price alone; `size` and `time` are payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub size: f64,
    pub time: i64,
}

impl PriceLevel {
    pub fn new(price: f64, size: f64, time: i64) -> Self {
        Self { price, size, time }
    }

    /// A level is valid iff its price is finite. NaN marks the sentinel
    /// "invalid" level that sorts after every real price.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.price.is_finite()
    }
}

impl std::fmt::Display for PriceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.8}x{:.4}", self.price, self.size)
    }
}

// ---------------------------------------------------------------------------
// PriceLevelSet
// ---------------------------------------------------------------------------

/// A pair of level lists: asks ascending by price, bids descending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceLevelSet {
    pub asks: Vec<PriceLevel>,
    pub bids: Vec<PriceLevel>,
}

impl PriceLevelSet {
    pub fn is_empty(&self) -> bool {
        self.asks.is_empty() && self.bids.is_empty()
    }

    /// Total number of levels across both sides.
    pub fn len(&self) -> usize {
        self.asks.len() + self.bids.len()
    }
}

impl std::fmt::Display for PriceLevelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.bids.first(), self.asks.first()) {
            (Some(bid), Some(ask)) => {
                write!(f, "Book(bid={bid} ask={ask} depth={}/{})", self.bids.len(), self.asks.len())
            }
            (Some(bid), None) => write!(f, "Book(bid={bid} ask=- depth={}/0)", self.bids.len()),
            (None, Some(ask)) => write!(f, "Book(bid=- ask={ask} depth=0/{})", self.asks.len()),
            (None, None) => write!(f, "Book(empty)"),
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

/// Per-batch additions, updates, and removals within the visible window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub additions: PriceLevelSet,
    pub updates: PriceLevelSet,
    pub removals: PriceLevelSet,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.updates.is_empty() && self.removals.is_empty()
    }
}

impl std::fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Changes(+{} ~{} -{})",
            self.additions.len(),
            self.updates.len(),
            self.removals.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsilon_price_equality() {
        assert!(price_eq(100.0, 100.0));
        assert!(price_eq(100.0, 100.0 + f64::EPSILON / 2.0));
        assert!(!price_eq(100.0, 100.1));
    }

    #[test]
    fn zero_size_detection() {
        assert!(size_is_zero(0.0));
        assert!(size_is_zero(-0.0));
        assert!(size_is_zero(5.0 - 5.0));
        assert!(!size_is_zero(0.5));
    }

    #[test]
    fn level_validity() {
        assert!(PriceLevel::new(100.0, 1.0, 0).is_valid());
        assert!(!PriceLevel::new(f64::NAN, 1.0, 0).is_valid());
        assert!(!PriceLevel::new(f64::INFINITY, 1.0, 0).is_valid());
    }

    #[test]
    fn change_set_empty() {
        let mut changes = ChangeSet::default();
        assert!(changes.is_empty());

        changes.updates.asks.push(PriceLevel::new(100.0, 1.0, 0));
        assert!(!changes.is_empty());
    }
}
