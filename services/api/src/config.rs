//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Connection settings for an S3-compatible object store.
#[derive(Clone, Debug)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Prefix for the URLs handed to browsers, e.g. `https://cdn.example.com/bucket`.
    pub public_url: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` runs the portal on the in-memory backend.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub base_path: String,
    pub allowed_email_domain: String,
    pub admin_emails: Vec<String>,
    pub sign_out_on_disconnect: bool,
    pub cors_origin: String,
    pub s3: Option<S3Settings>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_vars(std::env::vars().collect())
    }

    /// Builds the configuration from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let var = |name: &str| vars.get(name).filter(|v| !v.trim().is_empty()).cloned();

        // --- Load Server Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = var("DATABASE_URL");

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Load Portal Policy ---
        let base_path = var("BASE_PATH").unwrap_or_else(|| "/iMATE".to_string());
        let allowed_email_domain =
            var("ALLOWED_EMAIL_DOMAIN").unwrap_or_else(|| "slu.edu".to_string());
        let admin_emails = var("ADMIN_EMAILS")
            .map(|list| {
                list.split(',')
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let sign_out_on_disconnect = match var("SIGN_OUT_ON_DISCONNECT") {
            None => true,
            Some(value) => parse_bool(&value).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SIGN_OUT_ON_DISCONNECT".to_string(),
                    format!("'{}' is not a boolean", value),
                )
            })?,
        };

        // --- Load Object Storage Settings (optional) ---
        let s3 = match var("S3_BUCKET") {
            None => None,
            Some(bucket) => {
                let endpoint = var("S3_ENDPOINT");
                let required = |name: &str| {
                    var(name).ok_or_else(|| ConfigError::MissingVar(name.to_string()))
                };
                let access_key = required("S3_ACCESS_KEY")?;
                let secret_key = required("S3_SECRET_KEY")?;
                let region = var("S3_REGION").unwrap_or_else(|| "us-east-1".to_string());
                let public_url = match var("S3_PUBLIC_URL") {
                    Some(url) => url,
                    None => match &endpoint {
                        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
                        None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
                    },
                };
                Some(S3Settings {
                    bucket,
                    endpoint,
                    region,
                    access_key,
                    secret_key,
                    public_url: public_url.trim_end_matches('/').to_string(),
                })
            }
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            base_path,
            allowed_email_domain,
            admin_emails,
            sign_out_on_disconnect,
            cors_origin,
            s3,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let config = Config::from_vars(HashMap::new()).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.base_path, "/iMATE");
        assert_eq!(config.allowed_email_domain, "slu.edu");
        assert!(config.sign_out_on_disconnect);
        assert!(config.s3.is_none());
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn admin_list_and_flags() {
        let config = Config::from_vars(vars(&[
            ("ADMIN_EMAILS", " dean@slu.edu, ,registrar@slu.edu "),
            ("SIGN_OUT_ON_DISCONNECT", "off"),
        ]))
        .unwrap();
        assert_eq!(config.admin_emails, ["dean@slu.edu", "registrar@slu.edu"]);
        assert!(!config.sign_out_on_disconnect);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            Config::from_vars(vars(&[("BIND_ADDRESS", "nope")])),
            Err(ConfigError::InvalidValue(name, _)) if name == "BIND_ADDRESS"
        ));
        assert!(matches!(
            Config::from_vars(vars(&[("SIGN_OUT_ON_DISCONNECT", "maybe")])),
            Err(ConfigError::InvalidValue(_, _))
        ));
    }

    #[test]
    fn s3_requires_credentials() {
        assert!(matches!(
            Config::from_vars(vars(&[("S3_BUCKET", "portal")])),
            Err(ConfigError::MissingVar(name)) if name == "S3_ACCESS_KEY"
        ));
        let config = Config::from_vars(vars(&[
            ("S3_BUCKET", "portal"),
            ("S3_ENDPOINT", "http://minio:9000/"),
            ("S3_ACCESS_KEY", "k"),
            ("S3_SECRET_KEY", "s"),
        ]))
        .unwrap();
        let s3 = config.s3.unwrap();
        assert_eq!(s3.public_url, "http://minio:9000/portal");
        assert_eq!(s3.region, "us-east-1");
    }
}
