//! Error types for wow-core

use thiserror::Error;

use crate::auth::AuthError;
use crate::remote::BackendError;

/// Result type alias using wow-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Which half of a note's migration failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStage {
    Note,
    Sentences,
}

/// Errors that can occur in wow-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required field was empty or malformed; nothing was written
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Row-level security excluded the row, or the row does not exist
    #[error("No permission or not found: {0}")]
    PermissionDenied(String),

    /// The operation needs a signed-in principal
    #[error("Sign-in required: {0}")]
    NotAuthenticated(String),

    /// Transport or backend failure, carrying the backend's message
    #[error("Remote error: {0}")]
    Remote(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Durable local storage could not be used
    #[error("Local storage is unavailable")]
    StorageUnavailable,

    /// Local storage failed mid-operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// A guest migration stopped partway; earlier notes stay migrated
    #[error("{}", migration_message(.stage, .title, .message))]
    Migration {
        title: String,
        stage: MigrationStage,
        message: String,
    },

    /// Auth flow error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Backend endpoints are missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn migration_message(stage: &MigrationStage, title: &str, message: &str) -> String {
    match stage {
        MigrationStage::Note => format!("Failed to migrate note \"{title}\": {message}"),
        MigrationStage::Sentences => {
            format!("Failed to migrate sentences for \"{title}\": {message}")
        }
    }
}

impl From<BackendError> for Error {
    fn from(error: BackendError) -> Self {
        Self::Remote(error.to_string())
    }
}

impl From<AuthError> for Error {
    fn from(error: AuthError) -> Self {
        Self::Auth(error.to_string())
    }
}

impl Error {
    /// True for errors caused by the backend refusing or losing the row.
    #[must_use]
    pub const fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}
