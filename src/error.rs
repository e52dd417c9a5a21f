//! Error types for the You Can FI client core.

use reqwest::StatusCode;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    /// Whether the remote service answered 404 (or a local lookup missed).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api(e) => e.is_not_found(),
            Self::Store(StoreError::TaskNotFound { .. })
            | Self::Store(StoreError::AssetNotFound { .. })
            | Self::Store(StoreError::LiabilityNotFound { .. })
            | Self::Store(StoreError::AccountNotFound { .. }) => true,
            _ => false,
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors talking to the remote backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("{endpoint} returned {status}: {detail}")]
    Status {
        endpoint: String,
        status: StatusCode,
        detail: String,
    },

    #[error("Failed to decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided error detail, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

/// Local cache errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Input rejected before any network call is made.
///
/// Messages match the backend's 400 details so callers can show either.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Count must be between 1 and 50")]
    Count,

    #[error("Count for '{option}' must be between 1 and 50")]
    CountFor { option: String },

    #[error("Name must be between 1 and 255 characters")]
    Name,

    #[error("{field} must be greater than or equal to 0")]
    Negative { field: &'static str },

    #[error("Interest rate must be between 0 and 100")]
    InterestRate,

    #[error("No valid update data provided")]
    EmptyUpdate,

    #[error("Unknown option '{option}' for question {question}")]
    UnknownOption { question: String, option: String },

    #[error("limit must be between 1 and {max}")]
    PageSize { max: u32 },

    #[error("start_date must not be after end_date")]
    DateRange,
}

/// Store-level state errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Task {id} not found")]
    TaskNotFound { id: String },

    #[error("Unknown question: {id}")]
    UnknownQuestion { id: String },

    #[error("Asset {id} not found")]
    AssetNotFound { id: String },

    #[error("Liability {id} not found")]
    LiabilityNotFound { id: String },

    #[error("Connected account {id} not found")]
    AccountNotFound { id: String },

    #[error("Onboarding has not been started")]
    NotStarted,
}

/// Result type alias for the client core.
pub type Result<T> = std::result::Result<T, Error>;
