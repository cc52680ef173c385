use crate::provider::ProviderError;
use crate::store::StoreError;
use crate::validate::ValidationError;

/// Outcome taxonomy for every feed operation.
///
/// Each variant knows its HTTP status, its short `error` summary, and, for
/// failures, the diagnostic `details` string.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Client-caused; reported before any store access.
    #[error(transparent)]
    InvalidArgument(#[from] ValidationError),

    /// The hearts update targeted a record that does not exist.
    #[error("Image not found")]
    NotFound { id: u64 },

    /// The store or the image provider failed.
    #[error("{summary}: {details}")]
    Upstream {
        summary: &'static str,
        details: String,
    },

    /// Anything else that should never happen.
    #[error("{summary}: {details}")]
    Internal {
        summary: &'static str,
        details: String,
    },
}

impl FeedError {
    /// Translate a store failure, turning a missing record into the typed
    /// [`FeedError::NotFound`] and everything else into an opaque upstream
    /// failure labelled with `summary`.
    pub fn from_store(summary: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => FeedError::NotFound { id },
            other => FeedError::Upstream {
                summary,
                details: other.to_string(),
            },
        }
    }

    pub fn from_provider(err: ProviderError) -> Self {
        FeedError::Upstream {
            summary: "Failed to generate image",
            details: err.to_string(),
        }
    }

    pub fn internal(summary: &'static str, details: impl ToString) -> Self {
        FeedError::Internal {
            summary,
            details: details.to_string(),
        }
    }

    /// HTTP status code for this outcome.
    pub fn status(&self) -> u16 {
        match self {
            FeedError::InvalidArgument(_) => 400,
            FeedError::NotFound { .. } => 404,
            FeedError::Upstream { .. } | FeedError::Internal { .. } => 500,
        }
    }

    /// Short user-facing summary.
    pub fn summary(&self) -> String {
        match self {
            FeedError::InvalidArgument(e) => e.to_string(),
            FeedError::NotFound { .. } => "Image not found".to_string(),
            FeedError::Upstream { summary, .. } | FeedError::Internal { summary, .. } => {
                (*summary).to_string()
            }
        }
    }

    /// Diagnostic detail, present for server-side failures.
    pub fn details(&self) -> Option<&str> {
        match self {
            FeedError::Upstream { details, .. } | FeedError::Internal { details, .. } => {
                Some(details)
            }
            _ => None,
        }
    }

    /// Stable machine-checkable code.
    pub fn reason(&self) -> &'static str {
        match self {
            FeedError::InvalidArgument(e) => e.reason(),
            FeedError::NotFound { .. } => "not_found",
            FeedError::Upstream { .. } => "upstream_failure",
            FeedError::Internal { .. } => "internal_failure",
        }
    }
}
