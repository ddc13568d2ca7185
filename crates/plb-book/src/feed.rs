//! The feed boundary — where raw order batches enter the system.
//!
//! The transport behind a feed is opaque to the book: anything that can
//! deliver batches of [`OrderEvent`] records to an attached listener works.
//! [`ManualFeed`] is the in-process implementation used by tests and
//! embedders; [`crate::replay::ReplayFeed`] reads batches from a JSONL file.

use std::sync::{Arc, Mutex};

use plb_core::error::PlbError;
use plb_core::types::OrderEvent;
use tracing::debug;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Handle identifying one attached listener, used to detach it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Receiver of raw order batches.
///
/// `is_new_snapshot` marks the start of a fresh book: all previously
/// delivered orders are obsolete and the batch (possibly empty) is the new
/// ground truth.
pub trait OrderBatchListener: Send + Sync {
    fn on_order_batch(&self, batch: &[OrderEvent], is_new_snapshot: bool);
}

/// A source of per-order events for single instruments.
///
/// `attach` is the only operation that can fail; once it returns a
/// [`ListenerId`], batches flow until `detach` is called. `detach` guarantees
/// that no further callbacks are delivered after it returns.
pub trait OrderFeed: Send + Sync {
    fn attach(
        &self,
        symbol: &str,
        source: &str,
        listener: Arc<dyn OrderBatchListener>,
    ) -> Result<ListenerId, PlbError>;

    fn detach(&self, id: ListenerId);
}

// ---------------------------------------------------------------------------
// ManualFeed
// ---------------------------------------------------------------------------

struct Registration {
    id: ListenerId,
    symbol: String,
    source: String,
    listener: Arc<dyn OrderBatchListener>,
}

#[derive(Default)]
struct ManualFeedInner {
    next_id: u64,
    registrations: Vec<Registration>,
}

/// In-process feed that delivers pushed batches synchronously on the calling
/// thread.
#[derive(Default)]
pub struct ManualFeed {
    inner: Mutex<ManualFeedInner>,
}

impl ManualFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a batch to every listener attached for `symbol` whose source
    /// matches (an empty listener source matches any).
    pub fn push_batch(&self, symbol: &str, source: &str, batch: &[OrderEvent], is_new_snapshot: bool) {
        // Snapshot the matching listeners first so delivery runs without the
        // registry lock (listeners may take their own locks).
        let targets: Vec<Arc<dyn OrderBatchListener>> = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner
                .registrations
                .iter()
                .filter(|r| r.symbol == symbol && (r.source.is_empty() || r.source == source))
                .map(|r| Arc::clone(&r.listener))
                .collect()
        };

        for listener in targets {
            listener.on_order_batch(batch, is_new_snapshot);
        }
    }

    /// Number of currently attached listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).registrations.len()
    }
}

impl OrderFeed for ManualFeed {
    fn attach(
        &self,
        symbol: &str,
        source: &str,
        listener: Arc<dyn OrderBatchListener>,
    ) -> Result<ListenerId, PlbError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.next_id += 1;
        let id = ListenerId::new(inner.next_id);
        inner.registrations.push(Registration {
            id,
            symbol: symbol.to_string(),
            source: source.to_string(),
            listener,
        });
        debug!("manual feed: attached listener {id:?} for {symbol}/{source}");
        Ok(id)
    }

    fn detach(&self, id: ListenerId) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.registrations.retain(|r| r.id != id);
        debug!("manual feed: detached listener {id:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plb_core::types::OrderSide;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        batches: AtomicUsize,
    }

    impl OrderBatchListener for CountingListener {
        fn on_order_batch(&self, _batch: &[OrderEvent], _is_new_snapshot: bool) {
            self.batches.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn event() -> OrderEvent {
        OrderEvent { index: 1, price: 100.0, size: 1.0, time: 1, side: OrderSide::Sell, flags: 0 }
    }

    #[test]
    fn delivers_to_matching_symbol_only() {
        let feed = ManualFeed::new();
        let listener = Arc::new(CountingListener { batches: AtomicUsize::new(0) });
        feed.attach("AAPL", "ntv", listener.clone()).unwrap();

        feed.push_batch("AAPL", "ntv", &[event()], false);
        feed.push_batch("MSFT", "ntv", &[event()], false);
        assert_eq!(listener.batches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_listener_source_matches_any() {
        let feed = ManualFeed::new();
        let listener = Arc::new(CountingListener { batches: AtomicUsize::new(0) });
        feed.attach("AAPL", "", listener.clone()).unwrap();

        feed.push_batch("AAPL", "ntv", &[event()], false);
        feed.push_batch("AAPL", "dex", &[event()], false);
        assert_eq!(listener.batches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn detach_stops_delivery() {
        let feed = ManualFeed::new();
        let listener = Arc::new(CountingListener { batches: AtomicUsize::new(0) });
        let id = feed.attach("AAPL", "", listener.clone()).unwrap();
        assert_eq!(feed.listener_count(), 1);

        feed.detach(id);
        assert_eq!(feed.listener_count(), 0);
        feed.push_batch("AAPL", "ntv", &[event()], false);
        assert_eq!(listener.batches.load(Ordering::SeqCst), 0);
    }
}
