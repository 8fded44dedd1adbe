//! Error types for PersonaWorks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the PersonaWorks crates.
///
/// Validation errors are user-facing: they abort the triggering action and
/// leave state untouched. Everything else is plumbing.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum PwError {
    /// User input rejected (missing name, wrong bundle type, too few selections...)
    #[error("{0}")]
    Validation(String),

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Schema migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PwError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a JSON serialization error
    pub fn json(message: impl Into<String>) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Migration error
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for PwError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for PwError {
    fn from(err: serde_json::Error) -> Self {
        Self::json(err.to_string())
    }
}

impl From<toml::de::Error> for PwError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for PwError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<version_migrate::MigrationError> for PwError {
    fn from(err: version_migrate::MigrationError) -> Self {
        Self::Migration(err.to_string())
    }
}

/// Conversion from anyhow::Error (used at the application boundary)
impl From<anyhow::Error> for PwError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, PwError>`.
pub type Result<T> = std::result::Result<T, PwError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_displayed_verbatim() {
        let err = PwError::validation("Pick at least two characters.");
        assert_eq!(err.to_string(), "Pick at least two characters.");
        assert!(err.is_validation());
    }

    #[test]
    fn json_errors_convert() {
        let err: PwError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, PwError::Serialization { ref format, .. } if format == "JSON"));
    }
}
