//! Node configuration, loaded from an already-read TOML string
//! ("Configuration"). The CLI/file-discovery layer that finds
//! and reads the TOML file on disk is out of scope (§1); this module only
//! parses and validates what it is handed.

use serde::Deserialize;

fn default_max_gas_per_view_transaction() -> i64 {
    100_000_000
}

fn default_dir() -> String {
    "./chain".to_string()
}

fn default_max_polling_attempts() -> u32 {
    60
}

fn default_polling_delay_millis() -> u64 {
    10
}

fn default_request_cache_size() -> usize {
    1000
}

fn default_response_cache_size() -> usize {
    1000
}

fn default_checkable_depth() -> i64 {
    -1
}

/// The multiplicative back-off factor applied to the polling delay after
/// every failed attempt ("multiplied by `1.10` each
/// attempt"). Not a TOML field: it is a fixed constant of the polling
/// algorithm, not a tunable.
pub const POLLING_DELAY_MULTIPLIER: f64 = 1.10;

/// The recognized `[node]` configuration table (§6 "Configuration"),
/// with defaults matching the literal values named there.
#[derive(Clone, Debug, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_max_gas_per_view_transaction")]
    pub max_gas_per_view_transaction: i64,
    #[serde(default = "default_dir")]
    pub dir: String,
    #[serde(default = "default_max_polling_attempts")]
    pub max_polling_attempts: u32,
    #[serde(default = "default_polling_delay_millis")]
    pub polling_delay_millis: u64,
    #[serde(default = "default_request_cache_size")]
    pub request_cache_size: usize,
    #[serde(default = "default_response_cache_size")]
    pub response_cache_size: usize,
    #[serde(default = "default_checkable_depth")]
    pub checkable_depth: i64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            max_gas_per_view_transaction: default_max_gas_per_view_transaction(),
            dir: default_dir(),
            max_polling_attempts: default_max_polling_attempts(),
            polling_delay_millis: default_polling_delay_millis(),
            request_cache_size: default_request_cache_size(),
            response_cache_size: default_response_cache_size(),
            checkable_depth: default_checkable_depth(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Malformed(#[from] toml::de::Error),
}

impl NodeConfig {
    /// Parses a TOML document already read from disk by the host.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn checkable_depth(&self) -> tessera_store::CheckableDepth {
        tessera_store::CheckableDepth::from_i64(self.checkable_depth)
    }
}
