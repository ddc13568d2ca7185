//! The price-level book instance: one instrument, one source, one lock.
//!
//! A [`PriceLevelBook`] attaches to an [`OrderFeed`] at construction and
//! processes each delivered batch atomically: order events are translated
//! into consolidated price-level deltas, both sides are updated with full
//! window maintenance, and only then are the registered notification
//! handlers invoked.
//!
//! # Emission contract
//!
//! - A new-snapshot batch fires `on_new_book` once with the visible window.
//! - An incremental batch fires `on_incremental_change` once with the
//!   window-relevant change-set, then `on_book_update` once with the full
//!   visible window.
//! - Unset handlers simply don't fire.
//!
//! # Handler constraints
//!
//! Handlers run on the feed thread while the instance lock is held. They must
//! be non-blocking and must not call back into the instance. A panicking
//! handler is caught and logged; book state is already fully updated by the
//! time any handler runs, so subsequent handlers and batches are unaffected.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard};

use plb_core::error::PlbError;
use plb_core::types::{BookSide, ChangeSet, OrderEvent, PriceLevelSet};
use tracing::{debug, error, trace};

use crate::delta::build_deltas;
use crate::feed::{ListenerId, OrderBatchListener, OrderFeed};
use crate::order_index::OrderIndex;
use crate::side::SideBook;

/// Handler for full-book notifications (`on_new_book`, `on_book_update`).
pub type BookHandler = Box<dyn Fn(&PriceLevelSet) + Send>;

/// Handler for incremental change-set notifications.
pub type ChangeHandler = Box<dyn Fn(&ChangeSet) + Send>;

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Live,
    Closed,
}

// ---------------------------------------------------------------------------
// Guarded state
// ---------------------------------------------------------------------------

struct BookState {
    lifecycle: Lifecycle,
    index: OrderIndex,
    asks: SideBook,
    bids: SideBook,
    on_new_book: Option<BookHandler>,
    on_book_update: Option<BookHandler>,
    on_incremental_change: Option<ChangeHandler>,
}

impl BookState {
    fn new(levels: usize) -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            index: OrderIndex::new(),
            asks: SideBook::new(BookSide::Ask, levels),
            bids: SideBook::new(BookSide::Bid, levels),
            on_new_book: None,
            on_book_update: None,
            on_incremental_change: None,
        }
    }
}

struct BookCore {
    symbol: String,
    state: Mutex<BookState>,
}

impl BookCore {
    fn lock(&self) -> MutexGuard<'_, BookState> {
        // A poisoned lock can only mean a panic outside the handler guard;
        // every mutation completes before handlers run, so the state itself
        // is consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn process_batch(&self, batch: &[OrderEvent], is_new_snapshot: bool) {
        let mut state = self.lock();
        if state.lifecycle != Lifecycle::Live {
            return;
        }

        if is_new_snapshot {
            state.index.clear();
            state.asks.clear();
            state.bids.clear();
            let _ = Self::apply_batch(&mut state, batch);
            let view = Self::view(&state);
            debug!("[{}] new book: {view}", self.symbol);
            fire(&self.symbol, "new-book", &state.on_new_book, &view);
        } else {
            let changes = Self::apply_batch(&mut state, batch);
            let view = Self::view(&state);
            trace!("[{}] {changes} -> {view}", self.symbol);
            fire(&self.symbol, "incremental-change", &state.on_incremental_change, &changes);
            fire(&self.symbol, "book-update", &state.on_book_update, &view);
        }
    }

    fn apply_batch(state: &mut BookState, batch: &[OrderEvent]) -> ChangeSet {
        let deltas = build_deltas(batch, &mut state.index);
        let ask_changes = state.asks.process(&deltas.asks);
        let bid_changes = state.bids.process(&deltas.bids);
        ChangeSet {
            additions: PriceLevelSet { asks: ask_changes.additions, bids: bid_changes.additions },
            updates: PriceLevelSet { asks: ask_changes.updates, bids: bid_changes.updates },
            removals: PriceLevelSet { asks: ask_changes.removals, bids: bid_changes.removals },
        }
    }

    fn view(state: &BookState) -> PriceLevelSet {
        PriceLevelSet { asks: state.asks.visible(), bids: state.bids.visible() }
    }
}

impl OrderBatchListener for BookCore {
    fn on_order_batch(&self, batch: &[OrderEvent], is_new_snapshot: bool) {
        self.process_batch(batch, is_new_snapshot);
    }
}

/// Invoke a handler if set, isolating panics so later handlers and batches
/// still run.
fn fire<T>(symbol: &str, label: &str, handler: &Option<Box<dyn Fn(&T) + Send>>, payload: &T) {
    if let Some(handler) = handler {
        if catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
            error!("[{symbol}] {label} handler panicked; continuing");
        }
    }
}

// ---------------------------------------------------------------------------
// PriceLevelBook
// ---------------------------------------------------------------------------

/// Aggregated price-level view of one instrument from one source, truncated
/// to the best `levels` prices per side (`0` = unbounded).
pub struct PriceLevelBook {
    symbol: String,
    source: String,
    levels: usize,
    feed: Arc<dyn OrderFeed>,
    listener_id: ListenerId,
    core: Arc<BookCore>,
}

impl PriceLevelBook {
    /// Build a book and attach it to the feed. Fails iff the feed refuses the
    /// attachment.
    pub fn create(
        feed: Arc<dyn OrderFeed>,
        symbol: &str,
        source: &str,
        levels: usize,
    ) -> Result<Self, PlbError> {
        let core = Arc::new(BookCore {
            symbol: symbol.to_string(),
            state: Mutex::new(BookState::new(levels)),
        });

        // Batches may start arriving the moment attach registers the
        // listener, so the instance goes live first.
        core.lock().lifecycle = Lifecycle::Live;
        let listener: Arc<dyn OrderBatchListener> = core.clone();
        let listener_id = feed.attach(symbol, source, listener)?;
        debug!("[{symbol}] book live (source={source}, levels={levels})");

        Ok(Self {
            symbol: symbol.to_string(),
            source: source.to_string(),
            levels,
            feed,
            listener_id,
            core,
        })
    }

    /// Replace the full-snapshot handler. Last setter wins.
    pub fn set_on_new_book(&self, handler: impl Fn(&PriceLevelSet) + Send + 'static) {
        self.core.lock().on_new_book = Some(Box::new(handler));
    }

    /// Replace the per-batch full-view handler. Last setter wins.
    pub fn set_on_book_update(&self, handler: impl Fn(&PriceLevelSet) + Send + 'static) {
        self.core.lock().on_book_update = Some(Box::new(handler));
    }

    /// Replace the per-batch change-set handler. Last setter wins.
    pub fn set_on_incremental_change(&self, handler: impl Fn(&ChangeSet) + Send + 'static) {
        self.core.lock().on_incremental_change = Some(Box::new(handler));
    }

    /// Current visible window (both sides, best-first).
    pub fn current_view(&self) -> PriceLevelSet {
        let state = self.core.lock();
        BookCore::view(&state)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn levels(&self) -> usize {
        self.levels
    }
}

impl Drop for PriceLevelBook {
    fn drop(&mut self) {
        // Detach first: once it returns, the feed delivers no further
        // callbacks for this listener.
        self.feed.detach(self.listener_id);
        self.core.lock().lifecycle = Lifecycle::Closed;
        debug!("[{}] book closed", self.symbol);
    }
}
