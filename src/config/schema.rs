//! Client option schema definitions.
//!
//! This module defines the typed option set a client is built from.
//! Keys use the camelCase spelling of the dynamic configuration map, so a
//! validated map deserializes straight into [`ClientOptions`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Compression algorithms the persistent connection may negotiate.
pub const COMPRESSION_ALGORITHMS: &[&str] = &["zlib-stream"];

/// Largest-guild threshold bounds accepted by the remote service.
pub const LARGE_GUILD_THRESHOLD_MIN: u64 = 50;
pub const LARGE_GUILD_THRESHOLD_MAX: u64 = 250;

/// Validated, immutable client options.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientOptions {
    /// Disables cloning of records on update, either entirely or per record kind.
    pub disable_clones: DisableClones,

    /// Replaces everyone/here mentions with plain text.
    pub disable_everyone: bool,

    /// Fetches every guild member up front.
    pub fetch_all_members: bool,

    /// Seconds after which cached messages are invalidated (0 = never).
    pub message_cache_lifetime: u64,

    /// Seconds between message cache sweeps. Defaults to `message_cache_lifetime`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_sweep_interval: Option<u64>,

    /// Zero-based shard index. Must be smaller than `shard_count`.
    #[serde(rename = "shardID", skip_serializing_if = "Option::is_none")]
    pub shard_id: Option<u64>,

    /// Total number of shards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard_count: Option<u64>,

    /// Seconds to wait after one request before the next one starts.
    pub request_pacing_offset_seconds: f64,

    /// Transport compression of the persistent connection.
    pub transport_compression: TransportCompression,

    /// Gateway events the connection should ignore.
    pub disabled_events: Vec<String>,

    /// Member count after which a guild counts as large (50..=250).
    pub large_guild_threshold: u64,

    /// Presence sent when the persistent connection identifies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_presence: Option<Value>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            disable_clones: DisableClones::default(),
            disable_everyone: false,
            fetch_all_members: false,
            message_cache_lifetime: 0,
            message_sweep_interval: None,
            shard_id: None,
            shard_count: None,
            request_pacing_offset_seconds: 0.0,
            transport_compression: TransportCompression::default(),
            disabled_events: Vec::new(),
            large_guild_threshold: LARGE_GUILD_THRESHOLD_MAX,
            initial_presence: None,
        }
    }
}

impl ClientOptions {
    /// Effective sweep interval, falling back to the cache lifetime.
    pub fn sweep_interval(&self) -> u64 {
        self.message_sweep_interval
            .unwrap_or(self.message_cache_lifetime)
    }

    /// Shard pair sent on identify, if sharding is configured.
    ///
    /// A lone `shardID` implies a count of `shardID + 1`; `None` when that
    /// count does not fit.
    pub fn shard(&self) -> Option<[u64; 2]> {
        match (self.shard_id, self.shard_count) {
            (Some(id), Some(count)) => Some([id, count]),
            (None, Some(count)) => Some([0, count]),
            (Some(id), None) => id.checked_add(1).map(|count| [id, count]),
            (None, None) => None,
        }
    }

    /// Whether an event name is in the disabled set.
    pub fn is_event_disabled(&self, event: &str) -> bool {
        self.disabled_events.iter().any(|e| e == event)
    }
}

/// Either a global switch or a list of record kinds to skip cloning for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DisableClones {
    All(bool),
    Only(Vec<String>),
}

impl Default for DisableClones {
    fn default() -> Self {
        DisableClones::All(false)
    }
}

impl DisableClones {
    /// Whether cloning is disabled for the given record kind.
    pub fn applies_to(&self, kind: &str) -> bool {
        match self {
            DisableClones::All(flag) => *flag,
            DisableClones::Only(kinds) => kinds.iter().any(|k| k == kind),
        }
    }
}

/// Compression of the persistent connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "CompressionRepr", into = "CompressionRepr")]
pub enum TransportCompression {
    Disabled,
    ZlibStream,
}

impl Default for TransportCompression {
    fn default() -> Self {
        TransportCompression::ZlibStream
    }
}

impl TransportCompression {
    /// Query-string name of the algorithm, if compression is enabled.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            TransportCompression::Disabled => None,
            TransportCompression::ZlibStream => Some("zlib-stream"),
        }
    }
}

/// Wire representation: `true`/`false` or an algorithm name.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
enum CompressionRepr {
    Flag(bool),
    Named(String),
}

impl TryFrom<CompressionRepr> for TransportCompression {
    type Error = String;

    fn try_from(repr: CompressionRepr) -> Result<Self, Self::Error> {
        match repr {
            CompressionRepr::Flag(false) => Ok(TransportCompression::Disabled),
            CompressionRepr::Flag(true) => Ok(TransportCompression::default()),
            CompressionRepr::Named(name) if name == "zlib-stream" => {
                Ok(TransportCompression::ZlibStream)
            }
            CompressionRepr::Named(name) => Err(format!("unknown compression algorithm '{}'", name)),
        }
    }
}

impl From<TransportCompression> for CompressionRepr {
    fn from(compression: TransportCompression) -> Self {
        match compression.as_str() {
            Some(name) => CompressionRepr::Named(name.to_string()),
            None => CompressionRepr::Flag(false),
        }
    }
}
