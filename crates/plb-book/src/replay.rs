//! JSONL replay feed.
//!
//! Replays captured order batches from a file, one JSON object per line:
//!
//! ```json
//! {"snapshot": true, "orders": [
//!     {"index": 1, "price": "100.5", "size": "5", "time": 1700000000000, "side": "sell"},
//!     {"index": 2, "price": 100.6, "size": 2, "time": 1700000000001, "side": "sell"}
//! ]}
//! {"orders": [{"index": 1, "remove": true, "time": 1700000000002}]}
//! ```
//!
//! Numeric fields are accepted as JSON numbers or strings. Malformed lines
//! are logged and skipped. A reader task parses lines into a bounded channel;
//! a dispatch thread drains it and delivers each batch to the attached
//! listeners, optionally pausing between batches.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use plb_core::error::PlbError;
use plb_core::types::{OrderEvent, OrderSide, event_flags};
use tracing::{info, warn};

use crate::feed::{ListenerId, OrderBatchListener, OrderFeed};

/// Bounded capacity of the parse-to-dispatch channel.
const CHANNEL_CAPACITY: usize = 8192;

// ---------------------------------------------------------------------------
// Listener registry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn OrderBatchListener>)>>,
}

impl ListenerRegistry {
    fn attach(&self, listener: Arc<dyn OrderBatchListener>) -> ListenerId {
        let id = ListenerId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.listeners.lock().unwrap_or_else(|e| e.into_inner()).push((id, listener));
        id
    }

    fn detach(&self, id: ListenerId) {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner()).retain(|(lid, _)| *lid != id);
    }

    fn snapshot(&self) -> Vec<Arc<dyn OrderBatchListener>> {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// ReplayFeed
// ---------------------------------------------------------------------------

/// Feed implementation that replays order batches from a JSONL file.
pub struct ReplayFeed {
    path: PathBuf,
    batch_pause: Duration,
    registry: Arc<ListenerRegistry>,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl ReplayFeed {
    pub fn new(path: impl Into<PathBuf>, batch_pause_ms: u64) -> Self {
        Self {
            path: path.into(),
            batch_pause: Duration::from_millis(batch_pause_ms),
            registry: Arc::new(ListenerRegistry::default()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Open the replay file and start the reader and dispatch tasks.
    ///
    /// Must be called within a Tokio runtime. Attach listeners first —
    /// batches delivered before any listener is attached are dropped.
    pub fn start(&self) -> Result<(), PlbError> {
        let file = File::open(&self.path)
            .map_err(|e| PlbError::Replay(format!("{}: {e}", self.path.display())))?;

        let (tx, rx) = crossbeam_channel::bounded::<(bool, Vec<OrderEvent>)>(CHANNEL_CAPACITY);

        let label = self.path.display().to_string();
        let reader_task = tokio::task::spawn_blocking(move || {
            let reader = BufReader::new(file);
            let mut line_no = 0usize;
            for line in reader.lines() {
                line_no += 1;
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        warn!("[{label}] read error at line {line_no}: {e}");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_batch_line(&line) {
                    Some(batch) => {
                        if tx.send(batch).is_err() {
                            break;
                        }
                    }
                    None => warn!("[{label}] skipping malformed line {line_no}"),
                }
            }
            info!("[{label}] replay reader finished ({line_no} lines)");
        });

        let registry = Arc::clone(&self.registry);
        let pause = self.batch_pause;
        let dispatch_label = self.path.display().to_string();
        let dispatch_task = tokio::task::spawn_blocking(move || {
            let mut batches = 0usize;
            while let Ok((is_new_snapshot, events)) = rx.recv() {
                if !pause.is_zero() {
                    std::thread::sleep(pause);
                }
                for listener in registry.snapshot() {
                    listener.on_order_batch(&events, is_new_snapshot);
                }
                batches += 1;
            }
            info!("[{dispatch_label}] replay dispatch finished ({batches} batches)");
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.push(reader_task);
        tasks.push(dispatch_task);
        Ok(())
    }

    /// Abandon any still-running replay tasks.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("[{}] replay stopped", self.path.display());
    }
}

impl OrderFeed for ReplayFeed {
    fn attach(
        &self,
        symbol: &str,
        source: &str,
        listener: Arc<dyn OrderBatchListener>,
    ) -> Result<ListenerId, PlbError> {
        let id = self.registry.attach(listener);
        info!("[{}] attached book {symbol}/{source} ({id:?})", self.path.display());
        Ok(id)
    }

    fn detach(&self, id: ListenerId) {
        self.registry.detach(id);
    }
}

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

/// Parse one replay line into `(is_new_snapshot, events)`. Returns `None` on
/// any structural problem; field-level fallbacks (NaN price/size, undefined
/// side) are left to the book's own malformed-event handling.
pub(crate) fn parse_batch_line(line: &str) -> Option<(bool, Vec<OrderEvent>)> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let snapshot = value.get("snapshot").and_then(|s| s.as_bool()).unwrap_or(false);
    let orders = value.get("orders")?.as_array()?;

    let mut events = Vec::with_capacity(orders.len());
    for order in orders {
        events.push(parse_order(order)?);
    }
    Some((snapshot, events))
}

fn parse_order(value: &serde_json::Value) -> Option<OrderEvent> {
    let index = parse_i64(value.get("index"))?;
    let price = parse_f64(value.get("price")).unwrap_or(f64::NAN);
    let size = parse_f64(value.get("size")).unwrap_or(f64::NAN);
    let time = parse_i64(value.get("time")).unwrap_or(0);

    let side = match value.get("side").and_then(|s| s.as_str()) {
        Some("buy") => OrderSide::Buy,
        Some("sell") => OrderSide::Sell,
        _ => OrderSide::Undefined,
    };

    let mut flags = value.get("flags").and_then(|f| f.as_u64()).unwrap_or(0) as u32;
    if value.get("remove").and_then(|r| r.as_bool()).unwrap_or(false) {
        flags |= event_flags::REMOVE_EVENT;
    }

    Some(OrderEvent { index, price, size, time, side, flags })
}

/// Parse a JSON value (string or number) as `f64`.
#[inline]
fn parse_f64(value: Option<&serde_json::Value>) -> Option<f64> {
    let value = value?;
    if let Some(s) = value.as_str() { fast_float2::parse(s).ok() } else { value.as_f64() }
}

/// Parse a JSON value (string or number) as `i64`.
#[inline]
fn parse_i64(value: Option<&serde_json::Value>) -> Option<i64> {
    let value = value?;
    if let Some(s) = value.as_str() { s.parse().ok() } else { value.as_i64() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_numbers_and_strings() {
        let (snapshot, events) = parse_batch_line(
            r#"{"snapshot": true, "orders": [
                {"index": 1, "price": "100.5", "size": "5", "time": 7, "side": "sell"},
                {"index": 2, "price": 99.5, "size": 2, "time": 8, "side": "buy"}
            ]}"#,
        )
        .unwrap();

        assert!(snapshot);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].price, 100.5);
        assert_eq!(events[0].side, OrderSide::Sell);
        assert_eq!(events[1].size, 2.0);
        assert_eq!(events[1].side, OrderSide::Buy);
    }

    #[test]
    fn snapshot_defaults_to_false() {
        let (snapshot, events) =
            parse_batch_line(r#"{"orders": [{"index": 1, "price": 1.0, "size": 1.0}]}"#).unwrap();
        assert!(!snapshot);
        assert_eq!(events[0].side, OrderSide::Undefined);
    }

    #[test]
    fn remove_shorthand_sets_flag() {
        let (_, events) =
            parse_batch_line(r#"{"orders": [{"index": 1, "remove": true, "time": 9}]}"#).unwrap();
        assert!(events[0].is_removal());
        assert!(events[0].price.is_nan());
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(parse_batch_line("not json").is_none());
        assert!(parse_batch_line(r#"{"snapshot": true}"#).is_none());
        assert!(parse_batch_line(r#"{"orders": [{"price": 1.0}]}"#).is_none());
    }

    #[tokio::test]
    async fn replays_file_into_book() {
        use crate::book::PriceLevelBook;
        use std::io::Write;

        let path = std::env::temp_dir().join(format!("plb-replay-{}.jsonl", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            writeln!(
                file,
                r#"{{"snapshot": true, "orders": [{{"index": 1, "price": 100.0, "size": 5.0, "time": 1, "side": "sell"}}]}}"#
            )
            .unwrap();
            writeln!(
                file,
                r#"{{"orders": [{{"index": 2, "price": 99.0, "size": 7.0, "time": 2, "side": "buy"}}]}}"#
            )
            .unwrap();
        }

        let feed = Arc::new(ReplayFeed::new(&path, 0));
        let book = PriceLevelBook::create(feed.clone(), "AAPL", "replay", 5).unwrap();
        feed.start().unwrap();

        // Poll until both batches have been applied.
        for _ in 0..200 {
            let view = book.current_view();
            if view.asks.len() == 1 && view.bids.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let view = book.current_view();
        assert_eq!(view.asks[0].price, 100.0);
        assert_eq!(view.bids[0].price, 99.0);

        feed.stop();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_fails_start() {
        let feed = ReplayFeed::new("/nonexistent/replay.jsonl", 0);
        // start() needs a runtime only after the file opens; the open failure
        // surfaces first.
        assert!(feed.start().is_err());
    }
}
