//! Client option validation.
//!
//! # Responsibilities
//! - Check every recognised key of a configuration map against a fixed schema
//! - Check numeric ranges and enumerated values
//! - Check cross-field constraints (shard index below shard count)
//!
//! # Design Decisions
//! - Returns the first failure only, in schema order
//! - Unknown keys are ignored so newer configurations keep loading
//! - Pure function: runs before any collaborator is constructed

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::schema::{
    ClientOptions, COMPRESSION_ALGORITHMS, LARGE_GUILD_THRESHOLD_MAX, LARGE_GUILD_THRESHOLD_MIN,
};

/// A rejected client option.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("client option '{option}' {reason}")]
pub struct ValidationError {
    /// The offending key.
    pub option: String,
    /// Human-readable reason, phrased to follow the key.
    pub reason: String,
}

impl ValidationError {
    fn new(option: &str, reason: impl Into<String>) -> Self {
        Self {
            option: option.to_string(),
            reason: reason.into(),
        }
    }
}

/// Shape a single option must have.
#[derive(Debug, Clone, Copy)]
enum Rule {
    Boolean,
    BooleanOrNames,
    Integer { min: Option<i64>, max: Option<i64> },
    Number,
    BooleanOrOneOf(&'static [&'static str]),
    Names,
    Object,
}

const SCHEMA: &[(&str, Rule)] = &[
    ("disableClones", Rule::BooleanOrNames),
    ("disableEveryone", Rule::Boolean),
    ("fetchAllMembers", Rule::Boolean),
    ("messageCacheLifetime", Rule::Integer { min: Some(0), max: None }),
    ("messageSweepInterval", Rule::Integer { min: Some(0), max: None }),
    ("shardID", Rule::Integer { min: Some(0), max: None }),
    ("shardCount", Rule::Integer { min: Some(1), max: None }),
    ("requestPacingOffsetSeconds", Rule::Number),
    ("transportCompression", Rule::BooleanOrOneOf(COMPRESSION_ALGORITHMS)),
    ("disabledEvents", Rule::Names),
    (
        "largeGuildThreshold",
        Rule::Integer {
            min: Some(LARGE_GUILD_THRESHOLD_MIN as i64),
            max: Some(LARGE_GUILD_THRESHOLD_MAX as i64),
        },
    ),
    ("initialPresence", Rule::Object),
];

/// Validate a configuration map.
///
/// Keys not in the schema are skipped. Missing keys are fine; defaults fill
/// them in later.
pub fn validate_options(options: &Map<String, Value>) -> Result<(), ValidationError> {
    for (name, rule) in SCHEMA {
        if let Some(value) = options.get(*name) {
            check(name, *rule, value)?;
        }
    }

    let shard_id = options.get("shardID").and_then(Value::as_u64);
    let shard_count = options.get("shardCount").and_then(Value::as_u64);
    match (shard_id, shard_count) {
        (Some(id), Some(count)) if id >= count => {
            return Err(ValidationError::new(
                "shardID",
                format!("must be smaller than shardCount ({})", count),
            ));
        }
        (Some(u64::MAX), None) => {
            return Err(ValidationError::new(
                "shardID",
                format!("must be smaller than {} without shardCount", u64::MAX),
            ));
        }
        _ => {}
    }

    Ok(())
}

/// Validate a configuration map and merge it over the defaults.
pub fn options_from_map(options: &Map<String, Value>) -> Result<ClientOptions, ValidationError> {
    validate_options(options)?;

    serde_json::from_value(Value::Object(options.clone()))
        .map_err(|e| ValidationError::new("options", format!("could not be decoded: {}", e)))
}

/// Validate typed options through the same schema as a map.
pub fn validate_client_options(options: &ClientOptions) -> Result<(), ValidationError> {
    match serde_json::to_value(options) {
        Ok(Value::Object(map)) => validate_options(&map),
        Ok(_) => Err(ValidationError::new("options", "must be an object")),
        Err(e) => Err(ValidationError::new("options", format!("could not be encoded: {}", e))),
    }
}

fn check(name: &str, rule: Rule, value: &Value) -> Result<(), ValidationError> {
    match rule {
        Rule::Boolean => {
            if !value.is_boolean() {
                return Err(ValidationError::new(name, "must be a boolean"));
            }
        }
        Rule::BooleanOrNames => {
            if !value.is_boolean() && !is_name_list(value) {
                return Err(ValidationError::new(name, "must be a boolean or a list of names"));
            }
        }
        Rule::Integer { min, max } => {
            let number = as_integer(value)
                .ok_or_else(|| ValidationError::new(name, "must be an integer"))?;
            if let Some(min) = min {
                if number < i128::from(min) {
                    return Err(ValidationError::new(name, format!("must be at least {}", min)));
                }
            }
            if let Some(max) = max {
                if number > i128::from(max) {
                    return Err(ValidationError::new(name, format!("must be at most {}", max)));
                }
            }
        }
        Rule::Number => {
            if !value.is_number() {
                return Err(ValidationError::new(name, "must be a number"));
            }
        }
        Rule::BooleanOrOneOf(allowed) => {
            let ok = match value {
                Value::Bool(_) => true,
                Value::String(s) => allowed.contains(&s.as_str()),
                _ => false,
            };
            if !ok {
                return Err(ValidationError::new(
                    name,
                    format!("must be a boolean or one of: {}", allowed.join(", ")),
                ));
            }
        }
        Rule::Names => {
            if !is_name_list(value) {
                return Err(ValidationError::new(name, "must be a list of names"));
            }
        }
        Rule::Object => {
            if !value.is_object() {
                return Err(ValidationError::new(name, "must be an object"));
            }
        }
    }

    Ok(())
}

fn as_integer(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        _ => None,
    }
}

fn is_name_list(value: &Value) -> bool {
    value
        .as_array()
        .map(|items| items.iter().all(Value::is_string))
        .unwrap_or(false)
}
