use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ScoringError {
    /// Whether a batch run should skip this ticker for the current cycle
    /// rather than abort.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ScoringError::NotFound(_)
                | ScoringError::Unauthorized(_)
                | ScoringError::RateLimited(_)
                | ScoringError::ApiError(_)
        )
    }
}

impl From<serde_json::Error> for ScoringError {
    fn from(e: serde_json::Error) -> Self {
        ScoringError::SerializationError(e.to_string())
    }
}
