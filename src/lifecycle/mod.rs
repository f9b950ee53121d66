//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (background.rs):
//!     ClientBuilder::build → validate options → BackgroundTasks::start(scheduler)
//!
//! Shutdown (background.rs, shutdown.rs):
//!     destroy(true) or failed login → BackgroundTasks::shutdown_all
//!         → PeriodicTask::shutdown → Shutdown::trigger → task loop exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → binary destroys the client
//! ```
//!
//! # Design Decisions
//! - Background tasks are declared once, when the client is built
//! - Shutdown is a broadcast; every long-running loop selects on it

pub mod background;
pub mod shutdown;
pub mod signals;

pub use background::{BackgroundTask, BackgroundTasks, PeriodicTask, Teardown};
pub use shutdown::Shutdown;
