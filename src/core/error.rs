use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("Record '{id}' not found in '{collection}'")]
    RecordNotFound { collection: String, id: String },

    #[error("Record '{id}' already exists in '{collection}'")]
    DuplicateId { collection: String, id: String },

    #[error("No ids left to generate in '{0}'")]
    IdSpaceExhausted(String),

    #[error("Model '{0}' is not registered")]
    UnknownModel(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Undefined relationship: {0}")]
    UndefinedRelationship(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Model {0} has been destroyed")]
    ModelDestroyed(String),

    #[error("Model {0} has not been saved")]
    ModelNotSaved(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Coarse classification of a [`DbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised while building a schema; the schema is unusable.
    Configuration,
    /// Raised at the call site; the operation had no effect.
    Usage,
    /// A lookup by id found nothing.
    NotFound,
    Serialization,
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigError(_) => ErrorKind::Configuration,
            Self::CollectionNotFound(_) | Self::RecordNotFound { .. } => ErrorKind::NotFound,
            Self::SerializationError(_) => ErrorKind::Serialization,
            Self::DuplicateId { .. }
            | Self::IdSpaceExhausted(_)
            | Self::UnknownModel(_)
            | Self::UndefinedRelationship(_)
            | Self::TypeMismatch(_)
            | Self::ModelDestroyed(_)
            | Self::ModelNotSaved(_) => ErrorKind::Usage,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
