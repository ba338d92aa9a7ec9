/// Crate-wide result alias.
pub type DataraceResult<T> = Result<T, DataraceError>;

/// Errors surfaced by datarace.
///
/// Interpolation and rendering never produce these for data gaps (missing values, missing icons,
/// non-numeric labels); those are silent recovery paths. The variants below are the failures a
/// user is expected to see as a notification.
#[derive(thiserror::Error, Debug)]
pub enum DataraceError {
    /// Malformed dataset document or render configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Stream capture or video encoding is not available in this environment.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// The encoder session failed to initialize although capability checks passed.
    #[error("encoder start error: {0}")]
    EncoderStart(String),

    /// The dataset generation collaborator failed or returned unparsable output.
    #[error("generation error: {0}")]
    Generation(String),

    /// A running encoder session failed while writing or finalizing.
    #[error("encode error: {0}")]
    Encode(String),

    /// IO, decode and other wrapped failures.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Copyable classification of a [`DataraceError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`DataraceError::Validation`].
    Validation,
    /// See [`DataraceError::CapabilityUnavailable`].
    CapabilityUnavailable,
    /// See [`DataraceError::EncoderStart`].
    EncoderStart,
    /// See [`DataraceError::Generation`].
    Generation,
    /// See [`DataraceError::Encode`].
    Encode,
    /// See [`DataraceError::Other`].
    Other,
}

impl DataraceError {
    /// Build a [`DataraceError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`DataraceError::CapabilityUnavailable`].
    pub fn capability(msg: impl Into<String>) -> Self {
        Self::CapabilityUnavailable(msg.into())
    }

    /// Build a [`DataraceError::EncoderStart`].
    pub fn encoder_start(msg: impl Into<String>) -> Self {
        Self::EncoderStart(msg.into())
    }

    /// Build a [`DataraceError::Generation`].
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Build a [`DataraceError::Encode`].
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::CapabilityUnavailable(_) => ErrorKind::CapabilityUnavailable,
            Self::EncoderStart(_) => ErrorKind::EncoderStart,
            Self::Generation(_) => ErrorKind::Generation,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Other(_) => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
