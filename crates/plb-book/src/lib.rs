//! # plb-book
//!
//! Bounded price-level order book aggregation.
//!
//! ## Architecture
//!
//! A [`book::PriceLevelBook`] attaches to an [`feed::OrderFeed`] and turns
//! each delivered batch of raw order events into price-level notifications:
//!
//! ```text
//! feed callback ──► delta builder (reads+writes order index)
//!               ──► windowed sides (classify + apply, cursor maintenance)
//!               ──► notification handlers (new book / change-set / update)
//! ```
//!
//! ## Modules
//!
//! - [`order_index`] — last-known state per live order
//! - [`delta`] — order events → consolidated per-side level deltas
//! - [`side`] — sorted side containers with top-N window maintenance
//! - [`book`] — the locked instance tying it all together
//! - [`feed`] — the feed boundary traits + in-process [`feed::ManualFeed`]
//! - [`replay`] — JSONL file replay feed

pub mod book;
pub mod delta;
pub mod feed;
pub mod order_index;
pub mod replay;
pub mod side;

pub use book::PriceLevelBook;
pub use feed::{ListenerId, ManualFeed, OrderBatchListener, OrderFeed};
pub use replay::ReplayFeed;
