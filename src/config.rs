use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Server settings, read from `VACANCY_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    /// WAL appends tolerated before the compactor rewrites the log.
    pub compact_threshold: u64,
    pub compact_interval: Duration,
    pub metrics_port: Option<u16>,
    pub tls: Option<TlsPaths>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("both VACANCY_TLS_CERT and VACANCY_TLS_KEY must be set, or neither")]
    PartialTls,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            password: "vacancy".into(),
            max_connections: 256,
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(30),
            metrics_port: None,
            tls: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable numbers fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let tls = match (lookup("VACANCY_TLS_CERT"), lookup("VACANCY_TLS_KEY")) {
            (None, None) => None,
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            _ => return Err(ConfigError::PartialTls),
        };

        Ok(Self {
            port: lookup("VACANCY_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.port),
            bind: lookup("VACANCY_BIND").unwrap_or(defaults.bind),
            data_dir: lookup("VACANCY_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            password: lookup("VACANCY_PASSWORD").unwrap_or(defaults.password),
            max_connections: number("VACANCY_MAX_CONNECTIONS")
                .map(|n| n as usize)
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_connections),
            compact_threshold: number("VACANCY_COMPACT_THRESHOLD").unwrap_or(defaults.compact_threshold),
            compact_interval: number("VACANCY_COMPACT_INTERVAL_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.compact_interval),
            metrics_port: lookup("VACANCY_METRICS_PORT").and_then(|v| v.trim().parse().ok()),
            tls,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("vacancy.wal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c, Config::default());
        assert_eq!(c.listen_addr(), "0.0.0.0:5433");
        assert_eq!(c.wal_path(), PathBuf::from("./data/vacancy.wal"));
    }

    #[test]
    fn variables_override_defaults() {
        let c = config(&[
            ("VACANCY_PORT", "6000"),
            ("VACANCY_BIND", "127.0.0.1"),
            ("VACANCY_DATA_DIR", "/var/lib/vacancy"),
            ("VACANCY_MAX_CONNECTIONS", "8"),
            ("VACANCY_COMPACT_THRESHOLD", "50"),
            ("VACANCY_METRICS_PORT", "9100"),
        ])
        .unwrap();
        assert_eq!(c.listen_addr(), "127.0.0.1:6000");
        assert_eq!(c.wal_path(), PathBuf::from("/var/lib/vacancy/vacancy.wal"));
        assert_eq!(c.max_connections, 8);
        assert_eq!(c.compact_threshold, 50);
        assert_eq!(c.metrics_port, Some(9100));
    }

    #[test]
    fn garbage_numbers_fall_back() {
        let c = config(&[("VACANCY_PORT", "eighty"), ("VACANCY_MAX_CONNECTIONS", "0")]).unwrap();
        assert_eq!(c.port, 5433);
        assert_eq!(c.max_connections, 256);
    }

    #[test]
    fn tls_needs_both_paths() {
        assert!(matches!(
            config(&[("VACANCY_TLS_CERT", "cert.pem")]),
            Err(ConfigError::PartialTls)
        ));
        let c = config(&[("VACANCY_TLS_CERT", "cert.pem"), ("VACANCY_TLS_KEY", "key.pem")]).unwrap();
        assert_eq!(
            c.tls,
            Some(TlsPaths { cert: "cert.pem".into(), key: "key.pem".into() })
        );
    }
}
