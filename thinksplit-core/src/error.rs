use thiserror::Error;

/// Core error type for thinksplit.
/// The extractor itself never fails once built; errors come from
/// construction, configuration loading and the upstream provider seam.
#[derive(Debug, Error)]
pub enum ThinkSplitError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("upstream stream failed ({provider}): {message}")]
    Upstream { provider: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CoreResult<T> = std::result::Result<T, ThinkSplitError>;
