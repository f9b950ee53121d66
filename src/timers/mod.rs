//! Timer subsystem.
//!
//! # Data Flow
//! ```text
//! Client::schedule_once / schedule_periodic
//!     → registry.rs (register handle, spawn abortable task)
//!     → callback(client) when the timer fires
//!     → one-shot timers unregister themselves
//!
//! Client::destroy / failed login
//!     → registry.rs cancel_all (abort + unregister every handle)
//! ```

pub mod registry;

pub use registry::{TimerHandle, TimerId, TimerKind, TimerRegistry};
