//! Endpoint configuration.
//!
//! Precedence: explicit override > environment > default.

use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 25321;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_HOST: &str = "CGOWL_GATEWAY_HOST";
pub const ENV_PORT: &str = "CGOWL_GATEWAY_PORT";
pub const ENV_TIMEOUT_SECS: &str = "CGOWL_GATEWAY_TIMEOUT_SECS";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: `{value}` ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Applies to connect, read and write separately.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GatewayConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(host) = lookup(ENV_HOST).filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_PORT) {
            config.port = parse_port(ENV_PORT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: ENV_TIMEOUT_SECS,
                value: raw.clone(),
                reason: "expected whole seconds",
            })?;
            config.timeout = timeout_from_secs(ENV_TIMEOUT_SECS, secs)?;
        }
        Ok(config)
    }

    pub fn with_host(mut self, host: Option<String>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Result<Self, ConfigError> {
        if let Some(port) = port {
            self.port = parse_port("--port", &port.to_string())?;
        }
        Ok(self)
    }

    pub fn with_timeout_secs(mut self, secs: Option<u64>) -> Result<Self, ConfigError> {
        if let Some(secs) = secs {
            self.timeout = timeout_from_secs("--timeout-secs", secs)?;
        }
        Ok(self)
    }

    /// `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_port(key: &'static str, raw: &str) -> Result<u16, ConfigError> {
    match raw.trim().parse::<u16>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "port must be non-zero",
        }),
        Ok(port) => Ok(port),
        Err(_) => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "expected a port number",
        }),
    }
}

fn timeout_from_secs(key: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
            reason: "timeout must be positive",
        });
    }
    Ok(Duration::from_secs(secs))
}
