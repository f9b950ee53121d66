//! Record stores.
//!
//! # Data Flow
//! ```text
//! raw JSON (gateway READY, fetch responses)
//!     → Store::factory (decode into a Record, insert by id)
//!     → Arc<Record> shared with callers
//! ```
//!
//! # Design Decisions
//! - Concurrent map (`DashMap`); readers never block the gateway tasks
//! - Records are immutable and shared as `Arc`; a newer copy replaces the old one

pub mod store;

pub use store::{Record, Store};
