//! Client configuration subsystem.
//!
//! # Data Flow
//! ```text
//! configuration map (serde_json) or typed ClientOptions
//!     → validation.rs (schema, ranges, cross-field checks)
//!     → schema.rs (defaults merged, deserialized)
//!     → ClientOptions (validated, immutable)
//!     → shared via Arc with the client and its collaborators
//! ```
//!
//! # Design Decisions
//! - Options are immutable once the client is built
//! - All fields have defaults so an empty map is a valid configuration
//! - Typed options are checked by the same schema as maps

pub mod schema;
pub mod validation;

pub use schema::{ClientOptions, DisableClones, TransportCompression};
pub use validation::{options_from_map, validate_client_options, validate_options, ValidationError};
