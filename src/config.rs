//! Provider configuration.
//!
//! The provider block accepts the connection settings for one OPNsense host.
//! Every attribute may instead come from an `OPNSENSE_<NAME>` environment
//! variable; an explicitly configured value always wins over the environment.

use std::time::Duration;

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{Attribute, Schema, Validator};

/// Prefix of the environment variables consulted for unset attributes.
pub const ENV_PREFIX: &str = "OPNSENSE_";

/// Maximum backoff used when none is configured.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Minimum backoff used when none is configured.
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_secs(1);

/// Retry budget used when none is configured.
pub const DEFAULT_RETRIES: u32 = 4;

// =========================================================================
// Error
// =========================================================================

/// Errors raised while resolving the provider configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is missing or out of range.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// The attribute name.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The configuration payload could not be decoded.
    #[error("failed to decode provider configuration: {0}")]
    Decode(#[from] serde_json::Error),

    /// Layered resolution failed (e.g. an environment value of the wrong type).
    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

// =========================================================================
// Raw config
// =========================================================================

/// The provider block as written, before environment fallback.
///
/// Unset values are skipped when serialised so they never shadow the
/// environment layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConfig {
    /// OPNsense base URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// API secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
    /// Skip TLS verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_insecure: Option<bool>,
    /// Maximum backoff in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_backoff: Option<i64>,
    /// Minimum backoff in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_backoff: Option<i64>,
    /// Retry budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<i64>,
}

// =========================================================================
// Resolved config
// =========================================================================

/// Fully resolved provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// OPNsense base URI, e.g. `https://192.168.1.1`.
    pub uri: String,
    /// API key.
    pub api_key: SecretString,
    /// API secret.
    pub api_secret: SecretString,
    /// Skip TLS verification.
    pub allow_insecure: bool,
    /// Maximum backoff in seconds, if configured.
    pub max_backoff: Option<i64>,
    /// Minimum backoff in seconds, if configured.
    pub min_backoff: Option<i64>,
    /// Retry budget, if configured.
    pub retries: Option<i64>,
}

/// Effective settings for whoever builds the OPNsense client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// OPNsense base URI.
    pub uri: String,
    /// API key.
    pub api_key: SecretString,
    /// API secret.
    pub api_secret: SecretString,
    /// Skip TLS verification.
    pub allow_insecure: bool,
    /// Upper bound for the retry backoff.
    pub max_backoff: Duration,
    /// Lower bound for the retry backoff.
    pub min_backoff: Duration,
    /// Number of retries before a call fails.
    pub max_retries: u32,
}

impl ProviderConfig {
    /// Resolve the configuration payload sent by the host.
    ///
    /// A null payload is treated as an empty block, leaving everything to
    /// the environment.
    pub fn from_value(config: &serde_json::Value) -> Result<Self, ConfigError> {
        let explicit = if config.is_null() {
            RawConfig::default()
        } else {
            serde_json::from_value(config.clone())?
        };
        Self::resolve(explicit)
    }

    /// Layer `explicit` over the `OPNSENSE_*` environment and validate.
    pub fn resolve(explicit: RawConfig) -> Result<Self, ConfigError> {
        let raw: RawConfig = Figment::new()
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(explicit))
            .extract()?;
        Self::try_from(raw)
    }

    /// Client settings with the documented defaults filled in.
    pub fn client_options(&self) -> ClientOptions {
        let secs = |value: Option<i64>, default: Duration| {
            value
                .and_then(|v| u64::try_from(v).ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        ClientOptions {
            uri: self.uri.clone(),
            api_key: self.api_key.clone(),
            api_secret: self.api_secret.clone(),
            allow_insecure: self.allow_insecure,
            max_backoff: secs(self.max_backoff, DEFAULT_MAX_BACKOFF),
            min_backoff: secs(self.min_backoff, DEFAULT_MIN_BACKOFF),
            max_retries: self
                .retries
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(DEFAULT_RETRIES),
        }
    }
}

impl TryFrom<RawConfig> for ProviderConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let uri = required(raw.uri, "uri")?;
        let api_key = required(raw.api_key, "api_key")?;
        let api_secret = required(raw.api_secret, "api_secret")?;

        at_least(raw.max_backoff, "max_backoff", 1)?;
        at_least(raw.min_backoff, "min_backoff", 1)?;
        if let Some(retries) = raw.retries {
            if !(1..=i64::from(i32::MAX)).contains(&retries) {
                return Err(ConfigError::validation(
                    "retries",
                    format!("must be between 1 and {}, got {retries}", i32::MAX),
                ));
            }
        }

        Ok(Self {
            uri,
            api_key: SecretString::from(api_key),
            api_secret: SecretString::from(api_secret),
            allow_insecure: raw.allow_insecure.unwrap_or(false),
            max_backoff: raw.max_backoff,
            min_backoff: raw.min_backoff,
            retries: raw.retries,
        })
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn required(value: Option<String>, field: &str) -> Result<String, ConfigError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        ConfigError::validation(
            field,
            format!(
                "must be set in the provider block or via {ENV_PREFIX}{}",
                field.to_uppercase()
            ),
        )
    })
}

fn at_least(value: Option<i64>, field: &str, min: i64) -> Result<(), ConfigError> {
    match value {
        Some(v) if v < min => Err(ConfigError::validation(
            field,
            format!("must be at least {min}, got {v}"),
        )),
        _ => Ok(()),
    }
}

// =========================================================================
// Schema
// =========================================================================

/// Schema of the provider configuration block.
///
/// Connection attributes are optional here because the environment may
/// supply them; [`ProviderConfig::resolve`] enforces their presence.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("Manage an OPNsense firewall through its REST API.")
        .with_attribute(
            "uri",
            Attribute::optional_string().with_description(
                "The URI to an OPNsense host. Alternatively, can be configured using the `OPNSENSE_URI` environment variable.",
            ),
        )
        .with_attribute(
            "api_key",
            Attribute::optional_string().sensitive().with_description(
                "The API key for a user. Alternatively, can be configured using the `OPNSENSE_API_KEY` environment variable.",
            ),
        )
        .with_attribute(
            "api_secret",
            Attribute::optional_string().sensitive().with_description(
                "The API secret for a user. Alternatively, can be configured using the `OPNSENSE_API_SECRET` environment variable.",
            ),
        )
        .with_attribute(
            "allow_insecure",
            Attribute::optional_bool().with_description(
                "Allow insecure TLS connections. Alternatively, can be configured using the `OPNSENSE_ALLOW_INSECURE` environment variable. Defaults to `false`.",
            ),
        )
        .with_attribute(
            "max_backoff",
            Attribute::optional_int64()
                .with_validator(Validator::AtLeast(1))
                .with_description(
                    "Maximum backoff period in seconds after failed API calls. Alternatively, can be configured using the `OPNSENSE_MAX_BACKOFF` environment variable.",
                ),
        )
        .with_attribute(
            "min_backoff",
            Attribute::optional_int64()
                .with_validator(Validator::AtLeast(1))
                .with_description(
                    "Minimum backoff period in seconds after failed API calls. Alternatively, can be configured using the `OPNSENSE_MIN_BACKOFF` environment variable.",
                ),
        )
        .with_attribute(
            "retries",
            Attribute::optional_int64()
                .with_validator(Validator::Between(1, i64::from(i32::MAX)))
                .with_description(
                    "Maximum number of retries to perform when an API request fails. Alternatively, can be configured using the `OPNSENSE_RETRIES` environment variable.",
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use secrecy::ExposeSecret;
    use serde_json::json;

    #[test]
    fn test_explicit_config() {
        Jail::expect_with(|_jail| {
            let config = ProviderConfig::from_value(&json!({
                "uri": "https://fw.example.com",
                "api_key": "key",
                "api_secret": "secret",
                "allow_insecure": true,
                "retries": 2
            }))
            .unwrap();

            assert_eq!(config.uri, "https://fw.example.com");
            assert_eq!(config.api_key.expose_secret(), "key");
            assert_eq!(config.api_secret.expose_secret(), "secret");
            assert!(config.allow_insecure);
            assert_eq!(config.retries, Some(2));
            Ok(())
        });
    }

    #[test]
    fn test_env_fallback() {
        Jail::expect_with(|jail| {
            jail.set_env("OPNSENSE_URI", "https://env.example.com");
            jail.set_env("OPNSENSE_API_KEY", "env-key");
            jail.set_env("OPNSENSE_API_SECRET", "env-secret");
            jail.set_env("OPNSENSE_ALLOW_INSECURE", "true");
            jail.set_env("OPNSENSE_MAX_BACKOFF", "60");

            let config = ProviderConfig::from_value(&json!(null)).unwrap();
            assert_eq!(config.uri, "https://env.example.com");
            assert_eq!(config.api_key.expose_secret(), "env-key");
            assert!(config.allow_insecure);
            assert_eq!(config.max_backoff, Some(60));
            Ok(())
        });
    }

    #[test]
    fn test_explicit_wins_over_env() {
        Jail::expect_with(|jail| {
            jail.set_env("OPNSENSE_URI", "https://env.example.com");
            jail.set_env("OPNSENSE_API_KEY", "env-key");
            jail.set_env("OPNSENSE_API_SECRET", "env-secret");

            let config = ProviderConfig::from_value(&json!({
                "uri": "https://explicit.example.com",
                "api_key": null
            }))
            .unwrap();
            assert_eq!(config.uri, "https://explicit.example.com");
            // Null leaves the attribute to the environment.
            assert_eq!(config.api_key.expose_secret(), "env-key");
            Ok(())
        });
    }

    #[test]
    fn test_missing_required() {
        Jail::expect_with(|_jail| {
            let err = ProviderConfig::from_value(&json!({
                "uri": "https://fw.example.com",
                "api_key": "key"
            }))
            .unwrap_err();
            assert_eq!(
                err.to_string(),
                "invalid api_secret: must be set in the provider block or via OPNSENSE_API_SECRET"
            );
            Ok(())
        });
    }

    #[test]
    fn test_range_checks() {
        Jail::expect_with(|_jail| {
            let base = RawConfig {
                uri: Some("https://fw".into()),
                api_key: Some("k".into()),
                api_secret: Some("s".into()),
                ..Default::default()
            };

            let err = ProviderConfig::try_from(RawConfig {
                min_backoff: Some(0),
                ..base.clone()
            })
            .unwrap_err();
            assert_eq!(err.to_string(), "invalid min_backoff: must be at least 1, got 0");

            let err = ProviderConfig::try_from(RawConfig {
                retries: Some(i64::from(i32::MAX) + 1),
                ..base.clone()
            })
            .unwrap_err();
            assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "retries"));

            assert!(ProviderConfig::try_from(RawConfig {
                retries: Some(i64::from(i32::MAX)),
                ..base
            })
            .is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_client_options_defaults() {
        let config = ProviderConfig::try_from(RawConfig {
            uri: Some("https://fw".into()),
            api_key: Some("k".into()),
            api_secret: Some("s".into()),
            min_backoff: Some(5),
            ..Default::default()
        })
        .unwrap();

        let options = config.client_options();
        assert_eq!(options.max_backoff, DEFAULT_MAX_BACKOFF);
        assert_eq!(options.min_backoff, Duration::from_secs(5));
        assert_eq!(options.max_retries, DEFAULT_RETRIES);
        assert!(!options.allow_insecure);
    }

    #[test]
    fn test_secrets_redacted_in_debug() {
        let config = ProviderConfig::try_from(RawConfig {
            uri: Some("https://fw".into()),
            api_key: Some("very-secret-key".into()),
            api_secret: Some("very-secret-secret".into()),
            ..Default::default()
        })
        .unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("very-secret-key"));
        assert!(!debug.contains("very-secret-secret"));
    }

    #[test]
    fn test_schema_marks_credentials_sensitive() {
        let schema = provider_schema();
        assert!(schema.block.attributes["api_key"].flags.sensitive);
        assert!(schema.block.attributes["api_secret"].flags.sensitive);
        assert!(!schema.block.attributes["uri"].flags.sensitive);
        assert_eq!(
            schema.block.attributes["retries"].validators,
            vec![Validator::Between(1, 2147483647)]
        );
    }
}
