use thiserror::Error;

/// Engine-level errors surfaced to the caller of [`crate::ResampleEngine`].
#[derive(Error, Debug)]
pub enum ResampleError {
    #[error("invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("telemetry source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("not authorized against telemetry source")]
    Unauthorized,

    #[error("query deadline elapsed")]
    DeadlineElapsed,

    #[error("source error: {0}")]
    Source(#[from] SourceError),
}

/// Errors produced by a [`crate::source::TelemetrySource`] adapter. Inside
/// the retrieval chain these are never fatal: a failed strategy falls
/// through to the next one.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("malformed response: {0}")]
    Format(String),

    #[error("request timed out")]
    Timeout,
}

pub type ResampleResult<T> = Result<T, ResampleError>;
