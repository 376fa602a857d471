//! Error types for the voice mediation core

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur in the mediation pipeline.
///
/// The severity contract: `Transport` and `InternalInvariant` end the session;
/// `Decode` skips the offending message; `Codec` and `ExternalService` fail the
/// current turn only; `Auth` refuses the session before accept completes.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("state invariant violated: {0}")]
    InternalInvariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    /// True when the error must tear down the whole session rather than the
    /// current message or turn.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VoiceError::Transport(_) | VoiceError::InternalInvariant(_) | VoiceError::Io(_)
        )
    }
}
