//! Dispatcher configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TRACE_ID: &str = "intercept";
pub const DEFAULT_EVENT_CAPACITY: usize = 4096;
/// Nested dispatch bound (a handler operating on its own instance re-enters).
/// Each level costs several frames, so this stays well inside a 2 MiB thread
/// stack in debug builds.
pub const DEFAULT_MAX_DISPATCH_DEPTH: u32 = 64;
pub const DEFAULT_MAX_PROTOTYPE_CHAIN_DEPTH: u32 = 1024;

/// Whether handler results are checked against the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantPolicy {
    /// The handler's result is the operation's result.
    #[default]
    Lenient,
    /// Reject handler results that contradict the target (ES Proxy rules).
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub trace_id: String,
    pub invariant_policy: InvariantPolicy,
    pub record_events: bool,
    /// Oldest events are dropped past this many.
    pub event_capacity: usize,
    pub max_dispatch_depth: u32,
    pub max_prototype_chain_depth: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            trace_id: DEFAULT_TRACE_ID.to_string(),
            invariant_policy: InvariantPolicy::Lenient,
            record_events: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            max_dispatch_depth: DEFAULT_MAX_DISPATCH_DEPTH,
            max_prototype_chain_depth: DEFAULT_MAX_PROTOTYPE_CHAIN_DEPTH,
        }
    }
}

impl DispatchConfig {
    pub fn strict() -> Self {
        Self {
            invariant_policy: InvariantPolicy::Strict,
            ..Self::default()
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Parse and validate.  Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trace_id.trim().is_empty() {
            return Err(ConfigError::EmptyTraceId);
        }
        for (field, value) in [
            ("max_dispatch_depth", self.max_dispatch_depth),
            ("max_prototype_chain_depth", self.max_prototype_chain_depth),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroLimit { field });
            }
        }
        if self.record_events && self.event_capacity == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "event_capacity",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("config parse failure: {0}")]
    Parse(String),
    #[error("unknown trap name `{0}`")]
    UnknownTrap(String),
    #[error("empty handler name for `{trap}`")]
    EmptyHandlerName { trap: String },
    #[error("trace_id must not be empty")]
    EmptyTraceId,
    #[error("`{field}` must be greater than zero")]
    ZeroLimit { field: &'static str },
}

impl ConfigError {
    pub fn stable_code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "FE-INTERCEPT-CFG-0001",
            Self::UnknownTrap(_) => "FE-INTERCEPT-CFG-0002",
            Self::EmptyHandlerName { .. } => "FE-INTERCEPT-CFG-0003",
            Self::EmptyTraceId => "FE-INTERCEPT-CFG-0004",
            Self::ZeroLimit { .. } => "FE-INTERCEPT-CFG-0005",
        }
    }
}
