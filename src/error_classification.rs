//! Error classification for user-facing reporting.
//!
//! Every remote failure is caught at the operation boundary and turned into
//! one of four categories plus a message suitable for an inline error or a
//! toast. Nothing here decides whether to retry; errors are terminal per
//! operation and the user retries manually.

use crate::error::ConfigError;

/// The four user-facing error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed remote payload. Fatal for that fetch.
    MetadataShape,
    /// Save-time validation. Recoverable, editing state is preserved.
    Validation,
    /// Write/create denied by the platform.
    Permission,
    /// Context id does not resolve to visible metadata.
    NotFound,
    /// Transport failures and everything else.
    Unexpected,
}

impl ErrorKind {
    /// Stable identifier, used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MetadataShape => "metadata_shape",
            ErrorKind::Validation => "validation",
            ErrorKind::Permission => "permission",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unexpected => "unexpected",
        }
    }

    /// Whether the edit session keeps its draft after this error. A context
    /// whose metadata is malformed or gone cannot be edited further.
    pub fn is_recoverable(self) -> bool {
        !matches!(self, ErrorKind::MetadataShape | ErrorKind::NotFound)
    }
}

/// Classify an error into a user-facing category.
pub fn classify(error: &ConfigError) -> ErrorKind {
    match error {
        ConfigError::MetadataShape { .. } => ErrorKind::MetadataShape,
        ConfigError::Validation(_) | ConfigError::MissingPluginConfiguration { .. } => {
            ErrorKind::Validation
        }
        ConfigError::PermissionDenied { .. } => ErrorKind::Permission,
        ConfigError::NotFound(_) => ErrorKind::NotFound,
        ConfigError::Http { status: Some(403), .. } => ErrorKind::Permission,
        ConfigError::Http { .. } | ConfigError::Serialization(_) | ConfigError::Config(_) => {
            ErrorKind::Unexpected
        }
    }
}

/// Message shown to the user when `action` (e.g. "save enrollment configuration") fails.
pub fn user_message(error: &ConfigError, action: &str) -> String {
    match classify(error) {
        ErrorKind::MetadataShape => {
            "There seems to be an unexpected error. Please refresh the app and try again.".to_string()
        }
        ErrorKind::Validation => error.to_string(),
        ErrorKind::Permission if error.status() == Some(403) => format!(
            "You do not have permission to {action}. Make sure the user role has the \
             \"Create capture datastore configuration\" authority in the users app."
        ),
        ErrorKind::Permission => format!("Failed to {action}: {error}"),
        ErrorKind::NotFound => "Could not find the program, event program or tracked entity type \
             with the provided ID. Are you sure you have access?"
            .to_string(),
        ErrorKind::Unexpected => format!("Failed to {action}: {error}"),
    }
}
