/// Crate-wide result alias.
pub type SignreelResult<T> = Result<T, SignreelError>;

/// Error type shared by every engine component.
///
/// The variants follow how far a failure is allowed to travel:
///
/// - [`SignreelError::NotFound`] is absorbed by fallback (stick path) or by trying the next
///   candidate (video path).
/// - [`SignreelError::Download`] is retried, then treated like `NotFound`.
/// - [`SignreelError::Validation`] skips the offending record during load.
/// - [`SignreelError::Composition`] is the only failure a caller of the engine sees.
#[derive(thiserror::Error, Debug)]
pub enum SignreelError {
    /// Gesture, gloss or cached file is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network or extraction failure while fetching a clip.
    #[error("download error: {0}")]
    Download(String),

    /// Malformed definition or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Nothing usable was left to render.
    #[error("composition error: {0}")]
    Composition(String),

    /// JSON encoding/decoding failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error (usually IO with context).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SignreelError {
    /// Build a [`SignreelError::NotFound`] value.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Build a [`SignreelError::Download`] value.
    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    /// Build a [`SignreelError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`SignreelError::Composition`] value.
    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    /// Build a [`SignreelError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Whether this error must surface to the caller instead of being absorbed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Composition(_))
    }
}

impl From<serde_json::Error> for SignreelError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
