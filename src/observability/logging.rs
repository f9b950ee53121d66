//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Choose text or JSON output
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level when set
//! - Logs go to stderr so stdout stays free for command output

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gateway_client={},warn", level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
