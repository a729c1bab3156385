//! Error types for the filescope domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; configuration errors live in
//! the config crate.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of a single context-selection turn.
///
/// Only the negotiator path surfaces these to callers. The similarity
/// arbiter and the summarizer degrade instead of failing.
#[derive(Debug, Clone, Error)]
pub enum SelectionError {
    /// The negotiator response did not contain exactly one well-formed
    /// delimiter block.
    #[error("Malformed selection response: {0}")]
    MalformedSelectionResponse(String),

    /// The negotiator asked to include a path outside the known set.
    #[error("Selection referenced unknown file: {path}")]
    UnknownFileReference { path: String },

    /// A model call failed or timed out.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(#[from] ProviderError),

    /// The conversation summarizer failed. Degraded to a fallback string by
    /// the engine; never returned from a selection.
    #[error("Summary generation failed: {0}")]
    SummaryGenerationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn unknown_file_names_the_path() {
        let err = SelectionError::UnknownFileReference {
            path: "src/ghost.ts".into(),
        };
        assert!(err.to_string().contains("src/ghost.ts"));
    }

    #[test]
    fn provider_error_converts_to_unavailable() {
        let err: SelectionError = ProviderError::Timeout("negotiator".into()).into();
        assert!(matches!(err, SelectionError::ProviderUnavailable(_)));
        assert!(err.to_string().contains("negotiator"));
    }
}
