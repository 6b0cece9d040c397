use thiserror::Error;

/// Result type for graphsearch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single call to the external LLM service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    /// The attempt did not complete within the configured timeout
    #[error("LLM request timed out: {0}")]
    Timeout(String),

    /// The service refused the request because of rate limiting
    #[error("LLM service rate limited the request: {0}")]
    RateLimited(String),

    /// Transport or HTTP failure reported by the service
    #[error("LLM service error: {message}")]
    ServiceError { message: String, transient: bool },

    /// The response could not be decoded into the expected shape
    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),
}

impl InvocationError {
    /// Creates a transient service error (eligible for retry)
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::ServiceError {
            message: msg.into(),
            transient: true,
        }
    }

    /// Creates a permanent service error
    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::ServiceError {
            message: msg.into(),
            transient: false,
        }
    }

    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited(_) => true,
            Self::ServiceError { transient, .. } => *transient,
            Self::ParseError(_) => false,
        }
    }
}

/// Pipeline stage in which an orchestration failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BuildingContext,
    Mapping,
    Reducing,
    Storing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::BuildingContext => "building context",
            Self::Mapping => "mapping",
            Self::Reducing => "reducing",
            Self::Storing => "storing",
        };
        f.write_str(name)
    }
}

/// Coarse failure category exposed to front ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    UpstreamLlm,
    MissingGraphData,
    InvalidRequest,
    Cache,
    Internal,
}

/// Main error type for graphsearch operations
#[derive(Error, Debug)]
pub enum Error {
    /// LLM invocation failure
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// Backing tables for a graph are missing or unreadable
    #[error("Graph data unavailable: {0}")]
    DataUnavailable(String),

    /// Idempotency cache lookup or store failed
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The request failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A fatal error surfaced from one of the pipeline stages
    #[error("Search failed while {stage}: {source}")]
    OrchestrationFailed {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a data unavailable error
    pub fn data_unavailable(msg: impl Into<String>) -> Self {
        Self::DataUnavailable(msg.into())
    }

    /// Creates a cache unavailable error
    pub fn cache_unavailable(msg: impl Into<String>) -> Self {
        Self::CacheUnavailable(msg.into())
    }

    /// Creates an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Wraps an error raised by a pipeline stage
    pub fn orchestration(stage: Stage, source: Error) -> Self {
        Self::OrchestrationFailed {
            stage,
            source: Box::new(source),
        }
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Category used by callers to tell upstream, data and request failures apart
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Invocation(_) => ErrorCategory::UpstreamLlm,
            Self::DataUnavailable(_) => ErrorCategory::MissingGraphData,
            Self::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            Self::CacheUnavailable(_) => ErrorCategory::Cache,
            Self::OrchestrationFailed { source, .. } => source.category(),
            Self::Config(_) | Self::WithContext { .. } | Self::Other(_) => {
                ErrorCategory::Internal
            }
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(InvocationError::Timeout("slow".into()).is_retryable());
        assert!(InvocationError::RateLimited("429".into()).is_retryable());
        assert!(InvocationError::transient("503").is_retryable());
        assert!(!InvocationError::permanent("400").is_retryable());
        assert!(!InvocationError::ParseError("bad json".into()).is_retryable());
    }

    #[test]
    fn test_category_sees_through_orchestration_wrapper() {
        let err = Error::orchestration(
            Stage::Reducing,
            Error::Invocation(InvocationError::RateLimited("busy".into())),
        );
        assert_eq!(err.category(), ErrorCategory::UpstreamLlm);

        let err = Error::orchestration(
            Stage::BuildingContext,
            Error::data_unavailable("no tables for graph 'demo'"),
        );
        assert_eq!(err.category(), ErrorCategory::MissingGraphData);
        assert!(err.to_string().contains("building context"));
    }

    #[test]
    fn test_invalid_request_category() {
        assert_eq!(
            Error::invalid_request("empty query").category(),
            ErrorCategory::InvalidRequest
        );
    }
}
