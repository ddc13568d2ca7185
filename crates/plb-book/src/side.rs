//! One side of the windowed book: a sorted set of price levels plus a cursor
//! at the last visible level.
//!
//! Asks sort ascending by price, bids descending, so iteration order is
//! always best-first. The visible window is the first `depth` levels (all of
//! them when `depth == 0`). The cursor tracks the `depth`-th best level so
//! that window membership checks and boundary shifts (a hidden level becoming
//! visible or vice versa) are resolved with neighbor lookups instead of a
//! rescan.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

use plb_core::types::{BookSide, EPSILON, PriceLevel, price_eq, size_is_zero};
use tracing::warn;

use crate::delta::LevelDelta;

// ---------------------------------------------------------------------------
// BookPrice — side-ordered map key
// ---------------------------------------------------------------------------

/// Ordered price key for one side's level map.
///
/// Two keys are equal iff their prices differ by less than [`EPSILON`].
/// Otherwise asks order ascending and bids descending, so the best level is
/// always first. A NaN price is the sentinel "invalid" key and sorts after
/// every finite price on both sides.
///
/// Keys are only comparable within one side; bid and ask maps are separate.
#[derive(Debug, Clone, Copy)]
pub struct BookPrice {
    pub value: f64,
    pub side: BookSide,
}

impl BookPrice {
    pub fn new(value: f64, side: BookSide) -> Self {
        Self { value, side }
    }
}

impl Ord for BookPrice {
    fn cmp(&self, other: &Self) -> Ordering {
        debug_assert_eq!(self.side, other.side, "BookPrice compared across sides");

        match (self.value.is_nan(), other.value.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                if (self.value - other.value).abs() < EPSILON {
                    Ordering::Equal
                } else {
                    match self.side {
                        BookSide::Ask => self.value.total_cmp(&other.value),
                        BookSide::Bid => other.value.total_cmp(&self.value),
                    }
                }
            }
        }
    }
}

impl PartialOrd for BookPrice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for BookPrice {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BookPrice {}

// ---------------------------------------------------------------------------
// SideChanges — per-batch window-relevant emissions
// ---------------------------------------------------------------------------

/// Levels that entered, changed within, or left the visible window during one
/// batch, in application order.
#[derive(Debug, Clone, Default)]
pub struct SideChanges {
    pub additions: Vec<PriceLevel>,
    pub updates: Vec<PriceLevel>,
    pub removals: Vec<PriceLevel>,
}

impl SideChanges {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.updates.is_empty() && self.removals.is_empty()
    }

    /// Drop a pending addition for `price`, if one was recorded earlier in
    /// this batch. Returns `true` if something was cancelled.
    fn cancel_addition(&mut self, price: f64) -> bool {
        if let Some(i) = self.additions.iter().position(|l| price_eq(l.price, price)) {
            self.additions.remove(i);
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Classified level operations
// ---------------------------------------------------------------------------

/// Per-price operations derived from one batch of deltas, grouped in
/// application order: removals first, then additions, then updates.
#[derive(Debug, Default)]
struct ClassifiedOps {
    removals: Vec<PriceLevel>,
    additions: Vec<PriceLevel>,
    updates: Vec<PriceLevel>,
}

// ---------------------------------------------------------------------------
// SideBook
// ---------------------------------------------------------------------------

/// Sorted price levels for one side, truncated to a visible top-`depth`
/// window.
#[derive(Debug)]
pub struct SideBook {
    side: BookSide,
    /// Visible levels per side; `0` means unbounded.
    depth: usize,
    levels: BTreeMap<BookPrice, PriceLevel>,
    /// Key of the `depth`-th best level. `Some` iff `depth > 0` and the side
    /// holds at least `depth` levels; `None` is the end sentinel.
    cursor: Option<BookPrice>,
}

impl SideBook {
    pub fn new(side: BookSide, depth: usize) -> Self {
        Self { side, depth, levels: BTreeMap::new(), cursor: None }
    }

    pub fn side(&self) -> BookSide {
        self.side
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Drop all levels and reset the cursor. Invoked on a new-snapshot
    /// boundary.
    pub fn clear(&mut self) {
        self.levels.clear();
        self.cursor = None;
    }

    /// The visible window: the first `depth` levels in side order (all levels
    /// when `depth == 0`).
    pub fn visible(&self) -> Vec<PriceLevel> {
        let take = if self.depth == 0 { self.levels.len() } else { self.depth };
        self.levels.values().take(take).copied().collect()
    }

    /// Apply one batch of consolidated deltas and report the window-relevant
    /// changes.
    ///
    /// Classification runs against the pre-batch state; application then runs
    /// removals, additions, and updates in that order, maintaining the cursor
    /// through every boundary shift.
    pub fn process(&mut self, deltas: &[LevelDelta]) -> SideChanges {
        let ops = self.classify(deltas);
        let mut changes = SideChanges::default();
        for level in ops.removals {
            self.apply_removal(level, &mut changes);
        }
        for level in ops.additions {
            self.apply_addition(level, &mut changes);
        }
        for level in ops.updates {
            self.apply_update(level, &mut changes);
        }
        changes
    }

    // -- classification -----------------------------------------------------

    /// Classify each delta against the current levels, before any mutation.
    fn classify(&self, deltas: &[LevelDelta]) -> ClassifiedOps {
        let mut ops = ClassifiedOps::default();
        for delta in deltas {
            let key = self.key(delta.price);
            match self.levels.get(&key) {
                None => {
                    if delta.size > 0.0 {
                        ops.additions.push(PriceLevel::new(delta.price, delta.size, delta.time));
                    } else {
                        warn!(
                            "{} delta {:+.4} at {:.8} targets no existing level; dropped",
                            self.side, delta.size, delta.price
                        );
                    }
                }
                Some(current) => {
                    let new_size = current.size + delta.size;
                    if size_is_zero(new_size) {
                        ops.removals.push(*current);
                    } else {
                        ops.updates.push(PriceLevel::new(delta.price, new_size, delta.time));
                    }
                }
            }
        }
        ops
    }

    // -- application --------------------------------------------------------

    fn apply_removal(&mut self, level: PriceLevel, changes: &mut SideChanges) {
        let key = self.key(level.price);

        if self.depth == 0 {
            changes.removals.push(level);
            self.levels.remove(&key);
            return;
        }

        let len = self.levels.len();
        let over = len > self.depth;
        let first_hidden = if over { self.cursor.and_then(|c| self.next_key(&c)) } else { None };
        let visible = !over || first_hidden.is_none_or(|h| key < h);

        if visible {
            // A removal of a level promoted earlier in this batch cancels the
            // pending addition instead of emitting an add/remove pair.
            if !changes.cancel_addition(level.price) {
                changes.removals.push(level);
            }
            if let Some(hidden_key) = first_hidden {
                if let Some(promoted) = self.levels.get(&hidden_key).copied() {
                    changes.additions.push(promoted);
                }
            }
            // The window loses one member: the old first-hidden level (if
            // any) becomes the new last-visible, otherwise the side drops
            // below `depth` and the cursor parks at end.
            self.cursor = first_hidden;
        }

        self.levels.remove(&key);
    }

    fn apply_addition(&mut self, level: PriceLevel, changes: &mut SideChanges) {
        let key = self.key(level.price);

        if self.depth == 0 {
            changes.additions.push(level);
            self.levels.insert(key, level);
            return;
        }

        let len = self.levels.len();
        let fits = len < self.depth || self.cursor.is_none_or(|c| key < c);

        if !fits {
            // Beyond the window: the level is kept but nothing is emitted.
            self.levels.insert(key, level);
            return;
        }

        let mut demoted_key = None;
        if len >= self.depth {
            if let Some(cursor_key) = self.cursor {
                if let Some(demoted) = self.levels.get(&cursor_key).copied() {
                    // If the demoted level was itself added to the window in
                    // this batch, the two emissions cancel.
                    if !changes.cancel_addition(demoted.price) {
                        changes.removals.push(demoted);
                    }
                }
                demoted_key = Some(cursor_key);
            }
        }

        changes.additions.push(level);
        self.levels.insert(key, level);

        let new_len = len + 1;
        self.cursor = if new_len < self.depth {
            None
        } else if new_len == self.depth {
            self.last_key()
        } else {
            // The demoted level's predecessor is the new last-visible.
            demoted_key.and_then(|c| self.prev_key(&c))
        };
    }

    fn apply_update(&mut self, level: PriceLevel, changes: &mut SideChanges) {
        let key = self.key(level.price);

        let visible = self.depth == 0
            || self.levels.len() <= self.depth
            || self.cursor.is_none_or(|c| key.cmp(&c) != Ordering::Greater);
        if visible {
            changes.updates.push(level);
        }

        match self.levels.get_mut(&key) {
            Some(existing) => {
                existing.size = level.size;
                existing.time = level.time;
            }
            None => {
                warn!("{} update at {:.8} targets no existing level; dropped", self.side, level.price)
            }
        }
    }

    // -- key helpers --------------------------------------------------------

    #[inline]
    fn key(&self, price: f64) -> BookPrice {
        BookPrice::new(price, self.side)
    }

    fn next_key(&self, key: &BookPrice) -> Option<BookPrice> {
        self.levels.range((Bound::Excluded(*key), Bound::Unbounded)).next().map(|(k, _)| *k)
    }

    fn prev_key(&self, key: &BookPrice) -> Option<BookPrice> {
        self.levels.range((Bound::Unbounded, Bound::Excluded(*key))).next_back().map(|(k, _)| *k)
    }

    fn last_key(&self) -> Option<BookPrice> {
        self.levels.keys().next_back().copied()
    }
}
