//! Error types for the Piper voice bridge

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur in the synthesis bridge
#[derive(Error, Debug)]
pub enum VoiceError {
    /// Binary or model path missing. Raised eagerly, before any subprocess
    /// is spawned or temp file created.
    #[error("{what} not found: {}", .path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("synthesis engine error: {0}")]
    SynthesisEngine(String),

    #[error("unsupported audio format: {0}")]
    UnsupportedAudioFormat(String),

    #[error("audio decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hound::Error> for VoiceError {
    fn from(err: hound::Error) -> Self {
        VoiceError::Decode(err.to_string())
    }
}
