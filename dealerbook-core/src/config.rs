use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::approval::executor::{NotifyFailurePolicy, DEFAULT_STEP_TIMEOUT};
use crate::error::ConfigError;

/// Where approved invoice documents are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentStoreConfig {
    /// Files under a local directory, served back by the HTTP router
    Local { dir: PathBuf, public_base_url: String },

    /// Object-storage REST API
    Http {
        url: String,
        bucket: String,
        api_key: String,
    },
}

/// Application configuration read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub server_host: String,
    pub server_port: u16,
    pub documents: DocumentStoreConfig,
    /// Webhook receiving approval events; `None` disables notifications
    pub notify_webhook_url: Option<String>,
    pub notify_failure_policy: NotifyFailurePolicy,
    pub step_timeout: Duration,
}

impl AppConfig {
    /// Loads configuration from `.env` (when present) and the process environment.
    ///
    /// # Returns
    ///
    /// Returns the configuration, or a `ConfigError` naming the first missing
    /// or malformed variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let database_max_connections: u32 =
            parse_or(var("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 10)?;
        let server_host = var("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let server_port: u16 = parse_or(var("SERVER_PORT"), "SERVER_PORT", 3000)?;

        let documents = match var("DOCUMENT_STORE").as_deref().map(str::trim) {
            None | Some("local") => DocumentStoreConfig::Local {
                dir: var("DOCUMENT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./documents")),
                public_base_url: var("DOCUMENT_PUBLIC_BASE_URL")
                    .unwrap_or_else(|| format!("http://localhost:{}/documents", server_port)),
            },
            Some("http") => DocumentStoreConfig::Http {
                url: var("STORAGE_URL").ok_or(ConfigError::Missing("STORAGE_URL"))?,
                bucket: var("STORAGE_BUCKET").unwrap_or_else(|| "invoices".to_string()),
                api_key: var("STORAGE_API_KEY").ok_or(ConfigError::Missing("STORAGE_API_KEY"))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "DOCUMENT_STORE",
                    value: other.to_string(),
                })
            }
        };

        let notify_failure_policy = match var("NOTIFY_FAILURE_POLICY") {
            Some(value) => value.parse()?,
            None => NotifyFailurePolicy::default(),
        };
        let step_timeout = match var("STEP_TIMEOUT_SECONDS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(seconds) if seconds > 0 => Duration::from_secs(seconds),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "STEP_TIMEOUT_SECONDS",
                        value,
                    })
                }
            },
            None => DEFAULT_STEP_TIMEOUT,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            server_host,
            server_port,
            documents,
            notify_webhook_url: var("NOTIFY_WEBHOOK_URL"),
            notify_failure_policy,
            step_timeout,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/dealerbook")]))
            .expect("Config should load");

        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(
            config.documents,
            DocumentStoreConfig::Local {
                dir: PathBuf::from("./documents"),
                public_base_url: "http://localhost:3000/documents".to_string(),
            }
        );
        assert_eq!(config.notify_webhook_url, None);
        assert_eq!(config.notify_failure_policy, NotifyFailurePolicy::Ignore);
        assert_eq!(config.step_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_object_storage_and_notifications() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/dealerbook"),
            ("DOCUMENT_STORE", "http"),
            ("STORAGE_URL", "https://project.storage.example.com"),
            ("STORAGE_API_KEY", "service-key"),
            ("NOTIFY_WEBHOOK_URL", "https://hooks.example.com/approved"),
            ("NOTIFY_FAILURE_POLICY", "fail"),
            ("STEP_TIMEOUT_SECONDS", "5"),
        ]))
        .expect("Config should load");

        assert_eq!(
            config.documents,
            DocumentStoreConfig::Http {
                url: "https://project.storage.example.com".to_string(),
                bucket: "invoices".to_string(),
                api_key: "service-key".to_string(),
            }
        );
        assert_eq!(
            config.notify_webhook_url.as_deref(),
            Some("https://hooks.example.com/approved")
        );
        assert_eq!(config.notify_failure_policy, NotifyFailurePolicy::Fail);
        assert_eq!(config.step_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let missing = AppConfig::from_lookup(lookup(&[]));
        assert!(matches!(missing, Err(ConfigError::Missing("DATABASE_URL"))));

        let bad_port = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/dealerbook"),
            ("SERVER_PORT", "eighty"),
        ]));
        assert!(matches!(
            bad_port,
            Err(ConfigError::Invalid { key: "SERVER_PORT", .. })
        ));

        let bad_store = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/dealerbook"),
            ("DOCUMENT_STORE", "ftp"),
        ]));
        assert!(matches!(
            bad_store,
            Err(ConfigError::Invalid { key: "DOCUMENT_STORE", .. })
        ));

        let http_without_key = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/dealerbook"),
            ("DOCUMENT_STORE", "http"),
            ("STORAGE_URL", "https://project.storage.example.com"),
        ]));
        assert!(matches!(
            http_without_key,
            Err(ConfigError::Missing("STORAGE_API_KEY"))
        ));

        let zero_timeout = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/dealerbook"),
            ("STEP_TIMEOUT_SECONDS", "0"),
        ]));
        assert!(zero_timeout.is_err());
    }
}
