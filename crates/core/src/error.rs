use crate::scheduler::StepError;

/// Result alias that carries the custom [`HarnessError`] type.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Free-form failure raised by the harness itself.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration or report payload could not be (de)serialised.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// A known-issue or selection expression is not a valid regex.
    #[error("invalid property filter `{pattern}`: {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    /// A step error escaped a scheduler whose handler re-raised it.
    #[error(transparent)]
    Step(#[from] StepError),
    /// The host loop ran out of frames before the run finished.
    #[error("run did not finish within {frames} frames (stuck on `{property}`)")]
    Stalled { frames: u64, property: String },
}

impl HarnessError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for HarnessError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for HarnessError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
