use std::fmt;

/// Every failure the configuration core can surface.
///
/// Remote errors are mapped into this enum at the client boundary so callers
/// never have to inspect HTTP status codes or serde messages themselves.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// A remote metadata payload did not match the expected shape
    MetadataShape {
        resource: &'static str,
        message: String,
    },
    /// The payload about to be saved failed validation
    Validation(String),
    /// A plugin element was placed in a form but never configured
    MissingPluginConfiguration {
        field_id: String,
        display_name: String,
    },
    /// 401/403 from the remote API
    PermissionDenied { status: u16, message: String },
    /// The requested context or key does not exist (or is not visible)
    NotFound(String),
    /// Any other transport or HTTP failure
    Http { status: Option<u16>, message: String },
    Serialization(String),
    /// Local configuration problem (bad URL, unreadable config file, ...)
    Config(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ConfigError::Validation(message.into())
    }

    /// HTTP status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ConfigError::PermissionDenied { status, .. } => Some(*status),
            ConfigError::NotFound(_) => Some(404),
            ConfigError::Http { status, .. } => *status,
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MetadataShape { resource, message } => {
                write!(f, "Unexpected {resource} payload from the API: {message}")
            }
            ConfigError::Validation(msg) => write!(f, "Validation error: {msg}"),
            ConfigError::MissingPluginConfiguration { display_name, .. } => {
                write!(f, "Missing plugin configuration for plugin field: {display_name}")
            }
            ConfigError::PermissionDenied { status, message } => {
                write!(f, "Permission denied ({status}): {message}")
            }
            ConfigError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ConfigError::Http {
                status: Some(status),
                message,
            } => write!(f, "API error ({status}): {message}"),
            ConfigError::Http {
                status: None,
                message,
            } => write!(f, "Request failed: {message}"),
            ConfigError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            ConfigError::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for ConfigError {
    fn from(e: reqwest::Error) -> Self {
        ConfigError::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_exposed_for_http_variants() {
        let denied = ConfigError::PermissionDenied {
            status: 403,
            message: "forbidden".into(),
        };
        assert_eq!(denied.status(), Some(403));
        assert_eq!(ConfigError::NotFound("x".into()).status(), Some(404));
        assert_eq!(ConfigError::validation("bad").status(), None);
    }

    #[test]
    fn missing_plugin_configuration_names_the_field() {
        let err = ConfigError::MissingPluginConfiguration {
            field_id: "abc_1".into(),
            display_name: "Weight plugin".into(),
        };
        assert_eq!(
            err.to_string(),
            "Missing plugin configuration for plugin field: Weight plugin"
        );
    }

    #[test]
    fn serde_errors_convert_to_serialization() {
        let err: ConfigError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ConfigError::Serialization(_)));
    }
}
