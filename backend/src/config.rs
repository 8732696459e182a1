//! Service configuration.
//!
//! Values come from the environment (a `.env` file is loaded by the CLI
//! before this runs) and may be overridden by command-line flags.
//!
//! | Variable                 | Default                 |
//! |--------------------------|-------------------------|
//! | `LEDGERDIFF_PORT`        | `3000`                  |
//! | `LEDGERDIFF_PUBLIC_URL`  | `http://localhost:{port}` |
//! | `LEDGERDIFF_KEY_FIELD`   | `id`                    |
//! | `LEDGERDIFF_DUPLICATES`  | `last-wins`             |
//! | `LEDGERDIFF_KEYLESS`     | `exclude`               |
//! | `LEDGERDIFF_MAX_UPLOAD_MB` | `50`                  |

use std::str::FromStr;

use crate::engine::ReconcileOptions;
use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_PORT: u16 = 3000;

/// Maximum accepted request body, in megabytes.
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

/// Runtime settings for the HTTP service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Base URL used to build report links.
    pub public_url: String,
    pub reconcile: ReconcileOptions,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            public_url: local_url(DEFAULT_PORT),
            reconcile: ReconcileOptions::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

fn local_url(port: u16) -> String {
    format!("http://localhost:{}", port)
}

impl ServerConfig {
    /// Load from process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_var(&get, "LEDGERDIFF_PORT")?.unwrap_or(DEFAULT_PORT);
        let public_url = get("LEDGERDIFF_PUBLIC_URL").unwrap_or_else(|| local_url(port));

        let mut reconcile = ReconcileOptions::default();
        if let Some(field) = get("LEDGERDIFF_KEY_FIELD") {
            reconcile.key_field = field;
        }
        if let Some(policy) = parse_var(&get, "LEDGERDIFF_DUPLICATES")? {
            reconcile.duplicates = policy;
        }
        if let Some(policy) = parse_var(&get, "LEDGERDIFF_KEYLESS")? {
            reconcile.keyless = policy;
        }

        let max_upload_mb: usize =
            parse_var(&get, "LEDGERDIFF_MAX_UPLOAD_MB")?.unwrap_or(DEFAULT_MAX_UPLOAD_MB);
        let max_upload_bytes = max_upload_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            ConfigError::Invalid {
                var: "LEDGERDIFF_MAX_UPLOAD_MB",
                message: format!("{} MB does not fit in a byte count", max_upload_mb),
            }
        })?;

        Ok(Self {
            port,
            public_url,
            reconcile,
            max_upload_bytes,
        })
    }

    /// Override the port. A public URL derived from the old port follows it.
    pub fn with_port(mut self, port: u16) -> Self {
        if self.public_url == local_url(self.port) {
            self.public_url = local_url(port);
        }
        self.port = port;
        self
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, var: &'static str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(var)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| ConfigError::Invalid { var, message: e.to_string() })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DuplicatePolicy, KeylessPolicy};
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.public_url, "http://localhost:3000");
        assert_eq!(config.reconcile.key_field, "id");
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("LEDGERDIFF_PORT", "8080"),
            ("LEDGERDIFF_KEY_FIELD", "sku"),
            ("LEDGERDIFF_DUPLICATES", "first-wins"),
            ("LEDGERDIFF_KEYLESS", "bucket"),
            ("LEDGERDIFF_MAX_UPLOAD_MB", "2"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.public_url, "http://localhost:8080");
        assert_eq!(config.reconcile.key_field, "sku");
        assert_eq!(config.reconcile.duplicates, DuplicatePolicy::FirstWins);
        assert_eq!(config.reconcile.keyless, KeylessPolicy::Bucket);
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_value() {
        let err = ServerConfig::from_lookup(lookup(&[("LEDGERDIFF_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "LEDGERDIFF_PORT", .. }));

        let err = ServerConfig::from_lookup(lookup(&[("LEDGERDIFF_KEYLESS", "drop")])).unwrap_err();
        assert!(err.to_string().contains("LEDGERDIFF_KEYLESS"));
    }

    #[test]
    fn test_oversized_upload_limit_is_invalid() {
        let huge = usize::MAX.to_string();
        let err = ServerConfig::from_lookup(lookup(&[("LEDGERDIFF_MAX_UPLOAD_MB", huge.as_str())]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "LEDGERDIFF_MAX_UPLOAD_MB", .. }));
    }

    #[test]
    fn test_with_port_moves_derived_url() {
        let config = ServerConfig::default().with_port(9000);
        assert_eq!(config.public_url, "http://localhost:9000");

        let config = ServerConfig::from_lookup(lookup(&[("LEDGERDIFF_PUBLIC_URL", "https://recon.example")]))
            .unwrap()
            .with_port(9000);
        assert_eq!(config.public_url, "https://recon.example");
    }
}
