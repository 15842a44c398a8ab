//! Error types for the OPNsense provider.

use thiserror::Error;

use crate::client::ClientError;
use crate::config::ConfigError;
use crate::schema::Diagnostic;

/// Summary attached to diagnostics raised by conversion and remote failures.
pub const CLIENT_ERROR_SUMMARY: &str = "Client Error";

/// Errors that can occur while serving a lifecycle call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// The incoming payload could not be decoded into a model.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The incoming payload was structurally valid but unusable.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A model could not be converted into its domain record (or back).
    #[error("Unable to parse {object}, got error: {message}")]
    Conversion {
        /// The object being converted, e.g. `ipsec vti`.
        object: String,
        /// What went wrong.
        message: String,
    },

    /// The OPNsense client reported a failure.
    #[error("Unable to {action}, got error: {source}")]
    Client {
        /// The attempted operation, e.g. `create host override`.
        action: String,
        /// The underlying client error.
        #[source]
        source: ClientError,
    },

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Wrap a client failure with the action that was being attempted.
    pub fn client(action: impl Into<String>, source: ClientError) -> Self {
        Self::Client {
            action: action.into(),
            source,
        }
    }

    /// Build a conversion error for the named object.
    pub fn conversion(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the remote object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Client { source, .. } if source.is_not_found())
    }

    /// The short summary shown to users for this error.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Client { .. } | Self::Conversion { .. } => CLIENT_ERROR_SUMMARY,
            Self::Serialization(_) | Self::InvalidRequest(_) => "Invalid Request",
            Self::Validation(_) => "Invalid Configuration",
            Self::Configuration(_) => "Provider Configuration Error",
            Self::UnknownResource(_) => "Unknown Resource Type",
            Self::Unimplemented(_) => "Unsupported Operation",
        }
    }

    /// Render this error as an error diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.summary()).with_detail(self.to_string())
    }
}

impl From<ConfigError> for ProviderError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[test]
    fn test_error_display() {
        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("opnsense_widget".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: opnsense_widget");

        let err = ProviderError::client(
            "create vti",
            ClientError::Api {
                status: 500,
                message: "boom".to_string(),
            },
        );
        assert_eq!(
            format!("{}", err),
            "Unable to create vti, got error: OPNsense API error (HTTP 500): boom"
        );
    }

    #[test]
    fn test_not_found_detection() {
        let err = ProviderError::client(
            "read host override",
            ClientError::NotFound("abc".to_string()),
        );
        assert!(err.is_not_found());

        let err = ProviderError::client("read host override", ClientError::Transport("eof".into()));
        assert!(!err.is_not_found());

        assert!(!ProviderError::InvalidRequest("missing id".into()).is_not_found());
    }

    #[test]
    fn test_client_and_conversion_errors_share_summary() {
        let client = ProviderError::client("delete vti", ClientError::Transport("reset".into()));
        let conversion = ProviderError::conversion("ipsec vti", "bad field");

        assert_eq!(client.summary(), CLIENT_ERROR_SUMMARY);
        assert_eq!(conversion.summary(), CLIENT_ERROR_SUMMARY);
    }

    #[test]
    fn test_to_diagnostic() {
        let err = ProviderError::client(
            "update host override",
            ClientError::Api {
                status: 400,
                message: "validation failed".into(),
            },
        );
        let diag = err.to_diagnostic();

        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.summary, "Client Error");
        assert_eq!(
            diag.detail.as_deref(),
            Some("Unable to update host override, got error: OPNsense API error (HTTP 400): validation failed")
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let err: ProviderError = ConfigError::Validation {
            field: "retries".into(),
            reason: "must be at least 1".into(),
        }
        .into();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: invalid retries: must be at least 1"
        );
    }
}
