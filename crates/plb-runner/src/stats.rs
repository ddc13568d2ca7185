//! Per-book notification statistics.
//!
//! Each book's handlers feed one [`NotificationStats`]: the change handler
//! tallies how the visible window churned (levels added, changed, removed),
//! the update handler counts the batch and samples how far the newest order
//! timestamp lagged the notification. Only running aggregates are kept, and
//! a summary line is due every [`REPORT_EVERY`] updates.

use std::time::{SystemTime, UNIX_EPOCH};

use plb_core::types::{ChangeSet, PriceLevelSet};

/// Book updates between summary reports.
pub const REPORT_EVERY: u64 = 1000;

/// Running aggregates for one book's notification stream.
#[derive(Debug)]
pub struct NotificationStats {
    updates: u64,
    added: u64,
    changed: u64,
    removed: u64,
    lag_count: u64,
    lag_sum_ms: u64,
    lag_min_ms: u64,
    lag_max_ms: u64,
}

impl NotificationStats {
    pub fn new() -> Self {
        Self {
            updates: 0,
            added: 0,
            changed: 0,
            removed: 0,
            lag_count: 0,
            lag_sum_ms: 0,
            lag_min_ms: u64::MAX,
            lag_max_ms: 0,
        }
    }

    /// Tally the window churn of one incremental change-set.
    pub fn record_changes(&mut self, changes: &ChangeSet) {
        self.added += changes.additions.len() as u64;
        self.changed += changes.updates.len() as u64;
        self.removed += changes.removals.len() as u64;
    }

    /// Count one book update and, when the view carries order timestamps,
    /// sample the event-to-notification lag.
    pub fn record_view(&mut self, view: &PriceLevelSet) {
        self.updates += 1;

        let newest_ms =
            view.asks.iter().chain(view.bids.iter()).map(|l| l.time).max().unwrap_or(0);
        if newest_ms > 0 {
            self.record_lag((now_ms() - newest_ms).max(0) as u64);
        }
    }

    fn record_lag(&mut self, lag_ms: u64) {
        self.lag_count += 1;
        self.lag_sum_ms += lag_ms;
        self.lag_min_ms = self.lag_min_ms.min(lag_ms);
        self.lag_max_ms = self.lag_max_ms.max(lag_ms);
    }

    /// True every [`REPORT_EVERY`]-th update.
    pub fn due_report(&self) -> bool {
        self.updates > 0 && self.updates % REPORT_EVERY == 0
    }
}

impl Default for NotificationStats {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NotificationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "updates={} window(+{} ~{} -{})",
            self.updates, self.added, self.changed, self.removed
        )?;
        if self.lag_count > 0 {
            write!(
                f,
                " lag_ms(min={} avg={:.1} max={})",
                self.lag_min_ms,
                self.lag_sum_ms as f64 / self.lag_count as f64,
                self.lag_max_ms
            )
        } else {
            write!(f, " lag_ms(-)")
        }
    }
}

/// Wall-clock milliseconds since the Unix epoch, in the order-time domain.
#[inline]
fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}
