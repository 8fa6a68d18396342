//! Gateway configuration file management.
//!
//! A single TOML record; every option has a default matching the deployed
//! gateway. The file path comes from `LIFTGATE_CONFIG` or defaults to
//! `liftgate.toml` in the working directory; a missing file means
//! defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use liftgate_creds::SelectionPolicy;

/// Complete gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Local UDP bind address.
    #[serde(default = "default_gateway_listen")]
    pub gateway_listen: String,
    /// Central dispatcher UDP endpoint.
    #[serde(default = "default_dispatcher_endpoint")]
    pub dispatcher_endpoint: String,
    /// Credential pool file, one pre-shared key per line.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: String,
    /// Credential selection: "first" | "random" | "deterministic".
    #[serde(default = "default_credential_policy")]
    pub credential_policy: String,
    /// DTLS PSK identity; also feeds the deterministic selection hash.
    #[serde(default = "default_psk_identity")]
    pub psk_identity: String,
    /// Handshake attempts before startup gives up.
    #[serde(default = "default_handshake_retries")]
    pub handshake_retries: u32,
    /// Maximum outstanding dispatcher requests.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
    /// Deadline per request attempt in milliseconds.
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,
    /// Re-sends after the first attempt times out.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Timeout sweep cadence in milliseconds.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Cabins per building group.
    #[serde(default = "default_fleet_size")]
    pub fleet_size: usize,
    /// Floors per building.
    #[serde(default = "default_n_floors")]
    pub n_floors: i32,
    /// Building served at startup. A scenario overrides it per building.
    #[serde(default = "default_building_id")]
    pub building_id: String,
    /// Scenario file to play. Empty = no synthetic traffic.
    #[serde(default)]
    pub scenario_file: String,
    /// Delay between injected scenario frames in milliseconds.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Execution journal file. Empty = counters only.
    #[serde(default)]
    pub journal_file: String,
    /// Log level: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_gateway_listen() -> String {
    "0.0.0.0:5683".to_string()
}

fn default_dispatcher_endpoint() -> String {
    "192.168.49.2:5684".to_string()
}

fn default_credentials_file() -> String {
    "credentials.psk".to_string()
}

fn default_credential_policy() -> String {
    "first".to_string()
}

fn default_psk_identity() -> String {
    "liftgate".to_string()
}

fn default_handshake_retries() -> u32 {
    3
}

fn default_max_pending() -> usize {
    32
}

fn default_request_deadline_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_sweep_interval_ms() -> u64 {
    250
}

fn default_fleet_size() -> usize {
    4
}

fn default_n_floors() -> i32 {
    14
}

fn default_building_id() -> String {
    "E1".to_string()
}

fn default_frame_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_listen: default_gateway_listen(),
            dispatcher_endpoint: default_dispatcher_endpoint(),
            credentials_file: default_credentials_file(),
            credential_policy: default_credential_policy(),
            psk_identity: default_psk_identity(),
            handshake_retries: default_handshake_retries(),
            max_pending: default_max_pending(),
            request_deadline_ms: default_request_deadline_ms(),
            max_retries: default_max_retries(),
            sweep_interval_ms: default_sweep_interval_ms(),
            fleet_size: default_fleet_size(),
            n_floors: default_n_floors(),
            building_id: default_building_id(),
            scenario_file: String::new(),
            frame_interval_ms: default_frame_interval_ms(),
            journal_file: String::new(),
            log_level: default_log_level(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the config file location.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: GatewayConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// The config file path: `LIFTGATE_CONFIG` or `liftgate.toml`.
    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("LIFTGATE_CONFIG") {
            return PathBuf::from(path);
        }
        PathBuf::from("liftgate.toml")
    }

    /// Parse the local bind address.
    pub fn gateway_listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.gateway_listen
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid gateway_listen {:?}: {e}", self.gateway_listen))
    }

    /// Parse the dispatcher endpoint address.
    pub fn dispatcher_addr(&self) -> anyhow::Result<SocketAddr> {
        self.dispatcher_endpoint.parse().map_err(|e| {
            anyhow::anyhow!(
                "invalid dispatcher_endpoint {:?}: {e}",
                self.dispatcher_endpoint
            )
        })
    }

    /// Parse the credential selection policy.
    pub fn selection_policy(&self) -> anyhow::Result<SelectionPolicy> {
        match self.credential_policy.as_str() {
            "first" => Ok(SelectionPolicy::First),
            "random" => Ok(SelectionPolicy::Random),
            "deterministic" => Ok(SelectionPolicy::Deterministic),
            other => Err(anyhow::anyhow!("invalid credential_policy {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.gateway_listen, "0.0.0.0:5683");
        assert_eq!(config.dispatcher_endpoint, "192.168.49.2:5684");
        assert_eq!(config.max_pending, 32);
        assert_eq!(config.request_deadline_ms, 5000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.fleet_size, 4);
        assert_eq!(config.n_floors, 14);
        assert_eq!(config.building_id, "E1");
        assert!(config.scenario_file.is_empty());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = GatewayConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let parsed: GatewayConfig = toml::from_str(&toml_str).expect("parse");
        assert_eq!(parsed.dispatcher_endpoint, config.dispatcher_endpoint);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: GatewayConfig =
            toml::from_str("building_id = \"E9\"\nfleet_size = 2\n").expect("parse");
        assert_eq!(parsed.building_id, "E9");
        assert_eq!(parsed.fleet_size, 2);
        assert_eq!(parsed.max_pending, 32);
    }

    #[test]
    fn test_selection_policy_parse() {
        let mut config = GatewayConfig::default();
        assert_eq!(
            config.selection_policy().expect("policy"),
            SelectionPolicy::First
        );
        config.credential_policy = "deterministic".to_string();
        assert_eq!(
            config.selection_policy().expect("policy"),
            SelectionPolicy::Deterministic
        );
        config.credential_policy = "round-robin".to_string();
        assert!(config.selection_policy().is_err());
    }

    #[test]
    fn test_address_parsing() {
        let config = GatewayConfig::default();
        assert!(config.gateway_listen_addr().is_ok());
        assert!(config.dispatcher_addr().is_ok());

        let mut bad = config;
        bad.dispatcher_endpoint = "not-an-address".to_string();
        assert!(bad.dispatcher_addr().is_err());
    }
}
