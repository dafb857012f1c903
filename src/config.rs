//! Application configuration.
//!
//! Every section has working defaults matching a stock setup: buttons on
//! BCM 17 (ON) and BCM 27 (OFF) wired to 3.3V with pull-downs, and
//! `cec-client` on the `PATH`. A JSON file can override any subset of
//! fields.

use crate::error::{RemoteError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Button wiring and sampling
    pub inputs: InputConfig,
    /// External control channel
    pub cec: CecConfig,
    /// Command gating
    pub dispatch: DispatchConfig,
    /// HTTP API
    pub web: WebConfig,
}

impl AppConfig {
    /// Load a configuration file, falling back to defaults for missing fields.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RemoteError::config_error(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: AppConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.on_pin == self.inputs.off_pin {
            return Err(RemoteError::config_error(format!(
                "ON and OFF buttons share pin {}",
                self.inputs.on_pin
            )));
        }
        if self.inputs.sample_interval_ms == 0 {
            return Err(RemoteError::config_error("sample_interval_ms must be positive"));
        }
        if self.cec.program.trim().is_empty() {
            return Err(RemoteError::config_error("cec.program is empty"));
        }
        if self.cec.timeout_ms == 0 || self.cec.oneshot_timeout_ms == 0 {
            return Err(RemoteError::config_error("command timeouts must be positive"));
        }
        self.web.socket_addr()?;
        if self.web.max_websocket_connections == 0 {
            return Err(RemoteError::config_error(
                "web.max_websocket_connections must be positive",
            ));
        }
        if self.cec.mode == ChannelMode::Persistent && self.cec.completion_markers.is_empty() {
            return Err(RemoteError::config_error(
                "persistent mode needs at least one completion marker",
            ));
        }
        Ok(())
    }
}

/// Pull resistor applied to a button line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PullMode {
    /// Internal pull-down, button wired to 3.3V
    Down,
    /// Internal pull-up, button wired to ground
    Up,
    /// No internal resistor, line is pulled externally
    Off,
}

/// Button wiring and sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Whether to monitor the buttons at all
    pub enabled: bool,
    /// BCM pin of the ON button
    pub on_pin: u8,
    /// BCM pin of the OFF button
    pub off_pin: u8,
    /// Pull resistor for both lines
    pub pull: PullMode,
    /// A pressed button reads high (true) or low (false)
    pub active_high: bool,
    /// Sampling period in milliseconds
    pub sample_interval_ms: u64,
    /// Minimum spacing between accepted presses of one button
    pub debounce_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_pin: 17,
            off_pin: 27,
            pull: PullMode::Down,
            active_high: true,
            sample_interval_ms: 20,
            debounce_ms: 300,
        }
    }
}

impl InputConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// How the control process is driven.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// One long-lived process fed one command per line
    Persistent,
    /// A fresh process per command
    Oneshot,
}

/// External control channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CecConfig {
    pub mode: ChannelMode,
    /// Control program, looked up on the `PATH`
    pub program: String,
    /// Arguments for the persistent process
    pub args: Vec<String>,
    /// Arguments for one-shot processes
    pub oneshot_args: Vec<String>,
    /// Response deadline in persistent mode
    pub timeout_ms: u64,
    /// Response deadline in one-shot mode
    pub oneshot_timeout_ms: u64,
    /// Delay after spawning before the first command is written
    pub warmup_ms: u64,
    /// Substrings that end a response
    pub completion_markers: Vec<String>,
}

impl Default for CecConfig {
    fn default() -> Self {
        Self {
            mode: ChannelMode::Persistent,
            program: "cec-client".to_string(),
            args: vec!["-d".to_string(), "1".to_string()],
            oneshot_args: vec!["-s".to_string(), "-d".to_string(), "1".to_string()],
            timeout_ms: 8_000,
            oneshot_timeout_ms: 5_000,
            warmup_ms: 2_000,
            completion_markers: vec!["CEC bus information".to_string(), "TRAFFIC:".to_string()],
        }
    }
}

impl CecConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn oneshot_timeout(&self) -> Duration {
        Duration::from_millis(self.oneshot_timeout_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    /// True if `output` contains any completion marker.
    pub fn is_complete(&self, output: &str) -> bool {
        self.completion_markers.iter().any(|m| output.contains(m.as_str()))
    }
}

/// Command gating configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Minimum spacing between accepted commands from any source
    pub cooldown_ms: u64,
    /// Also rate-limit scan and status queries
    pub gate_queries: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 2_000,
            gate_queries: false,
        }
    }
}

impl DispatchConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address, an IP literal
    pub host: String,
    pub port: u16,
    /// Allow cross-origin requests to the API
    pub enable_cors: bool,
    /// Directory holding a custom control page (`index.html`)
    pub static_path: Option<String>,
    /// Maximum number of live event connections
    pub max_websocket_connections: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            enable_cors: true,
            static_path: Some("web_gui".to_string()),
            max_websocket_connections: 16,
        }
    }
}

impl WebConfig {
    /// Address to listen on. IPv6 hosts are accepted without brackets.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.host.parse().map_err(|e| {
            RemoteError::config_error(format!("Invalid web.host {:?}: {}", self.host, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.inputs.on_pin, 17);
        assert_eq!(config.inputs.off_pin, 27);
        assert_eq!(config.cec.timeout(), Duration::from_secs(8));
        assert_eq!(config.dispatch.cooldown(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "inputs": { "pull": "up", "active_high": false }, "cec": { "mode": "oneshot" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.inputs.pull, PullMode::Up);
        assert!(!config.inputs.active_high);
        assert_eq!(config.inputs.debounce_ms, 300);
        assert_eq!(config.cec.mode, ChannelMode::Oneshot);
        assert_eq!(config.cec.program, "cec-client");
    }

    #[test]
    fn test_shared_pin_rejected() {
        let mut config = AppConfig::default();
        config.inputs.off_pin = config.inputs.on_pin;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("share pin"));
    }

    #[test]
    fn test_persistent_mode_needs_marker() {
        let mut config = AppConfig::default();
        config.cec.completion_markers.clear();
        assert!(config.validate().is_err());

        config.cec.mode = ChannelMode::Oneshot;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_marker_detection() {
        let cec = CecConfig::default();
        assert!(cec.is_complete("power status: on\n...CEC bus information...\n"));
        assert!(!cec.is_complete("power status: on\n"));
    }

    #[test]
    fn test_web_address_parsing() {
        let mut web = WebConfig::default();
        assert_eq!(web.socket_addr().unwrap().to_string(), "0.0.0.0:5000");

        web.host = "::1".to_string();
        web.port = 8080;
        assert_eq!(web.socket_addr().unwrap().to_string(), "[::1]:8080");

        web.host = "raspberrypi.local".to_string();
        assert!(matches!(web.socket_addr(), Err(RemoteError::Config(_))));
    }

    #[test]
    fn test_web_section_validated() {
        let mut config = AppConfig::default();
        config.web.max_websocket_connections = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.web.host = "not an address".to_string();
        assert!(config.validate().is_err());
    }
}
