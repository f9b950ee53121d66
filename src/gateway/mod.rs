//! Gateway subsystem.
//!
//! # Data Flow
//! ```text
//! login(force)
//!     → GatewayResolver::resolve
//!         cached && !force → cached address
//!         cached && force  → RequestChannel::discover_connection_address_cached
//!         nothing cached   → RequestChannel::discover_connection_address
//!     → ConnectionManager::connect (WebSocketManager by default)
//! ```
//!
//! # Design Decisions
//! - The resolver only caches; it never opens connections
//! - The bundled manager covers hello, heartbeat, identify and READY only

pub mod resolver;
pub mod websocket;

pub use resolver::GatewayResolver;
pub use websocket::WebSocketManager;
