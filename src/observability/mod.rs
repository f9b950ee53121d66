//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Client lifecycle and collaborators produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → latency.rs (rolling heartbeat round trips, exposed as average ping)
//! ```
//!
//! # Design Decisions
//! - Structured logging (fields, not formatted strings) for machine parsing
//! - Metrics are cheap and no-ops until an exporter is installed
//! - Latency updates are silent; they only change the average ping

pub mod latency;
pub mod logging;
pub mod metrics;

pub use latency::LatencyTracker;
