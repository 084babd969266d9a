/// Domain-specific error types for the hedge backtester.
/// Every kind is fatal for the run that raised it:
/// - no partial traces are returned
/// - batch drivers log the failure and move on to the next scenario
#[derive(Debug, thiserror::Error)]
pub enum HedgeError {
    #[error("configuration not found: {0}")]
    ConfigurationNotFound(String),

    #[error("insufficient historical data: {0}")]
    InsufficientHistoricalData(String),

    #[error("series misalignment: {0}")]
    SeriesMisalignment(String),

    #[error("invalid pricing parameter: {0}")]
    InvalidPricingParameter(String),

    #[error("invalid option kind: {0}")]
    InvalidOptionKind(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for HedgeError {
    fn from(e: rusqlite::Error) -> Self {
        HedgeError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for HedgeError {
    fn from(e: serde_json::Error) -> Self {
        HedgeError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for HedgeError {
    fn from(e: std::io::Error) -> Self {
        HedgeError::Io(e.to_string())
    }
}

impl From<chrono::ParseError> for HedgeError {
    fn from(e: chrono::ParseError) -> Self {
        HedgeError::Database(format!("date parse: {e}"))
    }
}

pub type HedgeResult<T> = Result<T, HedgeError>;
