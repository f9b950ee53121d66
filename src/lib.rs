//! Gateway client lifecycle orchestrator.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────┐
//!                   │                     CLIENT                        │
//!   ClientBuilder   │  ┌──────────┐    ┌──────────────┐                 │
//!   ────────────────┼─▶│  config  │───▶│  background  │                 │
//!                   │  │ validate │    │  tasks start │                 │
//!                   │  └──────────┘    └──────────────┘                 │
//!                   │                                                   │
//!   login(token)    │  ┌──────────┐    ┌──────────────┐    ┌─────────┐ │
//!   ────────────────┼─▶│ resolver │───▶│  connection  │───▶│  ready  │ │
//!                   │  │ (cache)  │    │   manager    │    │  event  │ │
//!                   │  └────┬─────┘    └──────┬───────┘    └─────────┘ │
//!                   │       │                 │ signals                 │
//!                   │       ▼                 ▼                         │
//!                   │  ┌──────────┐    ┌──────────────┐                 │
//!                   │  │ request  │    │ latency, self│                 │
//!                   │  │ channel  │    │   identity   │                 │
//!                   │  └──────────┘    └──────────────┘                 │
//!                   │                                                   │
//!   destroy()       │  requests → connection → timers → background      │
//!   ────────────────┼─▶ teardown, then Idle                             │
//!                   └──────────────────────────────────────────────────┘
//! ```

// Core
pub mod client;
pub mod config;
pub mod error;
pub mod events;

// Collaborators
pub mod gateway;
pub mod transport;

// Data
pub mod models;
pub mod storage;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod timers;

pub use client::{Client, ClientBuilder, GatewaySignals, Phase, WeakClient};
pub use config::ClientOptions;
pub use error::{ClientError, ClientResult};
pub use events::{BroadcastSink, ClientEvent, EventSink};
pub use lifecycle::{BackgroundTask, PeriodicTask, Shutdown};
