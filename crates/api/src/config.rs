//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::ChannelId;
use domain::{DEFAULT_LEASE, DEFAULT_ORDER_PRICE};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `ORDER_PRICE` — amount debited per placed order (default: `20`)
/// - `LEASE_DURATION_MS` — claim lease in milliseconds (default: `600000`)
/// - `INVITE_CHANNEL` — channel the `{invite}` placeholder invites into
/// - `KITCHEN_CHANNEL` — channel notified when a claim lease lapses
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub order_price: u64,
    pub lease: Duration,
    pub invite_channel: ChannelId,
    pub kitchen_channel: ChannelId,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            order_price: std::env::var("ORDER_PRICE")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_ORDER_PRICE),
            lease: std::env::var("LEASE_DURATION_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_LEASE),
            invite_channel: ChannelId::new(
                std::env::var("INVITE_CHANNEL").unwrap_or_else(|_| "invites".to_string()),
            ),
            kitchen_channel: ChannelId::new(
                std::env::var("KITCHEN_CHANNEL").unwrap_or_else(|_| "kitchen".to_string()),
            ),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            order_price: DEFAULT_ORDER_PRICE,
            lease: DEFAULT_LEASE,
            invite_channel: ChannelId::new("invites"),
            kitchen_channel: ChannelId::new("kitchen"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.order_price, 20);
        assert_eq!(config.lease, Duration::from_millis(600_000));
    }

    #[test]
    fn addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
