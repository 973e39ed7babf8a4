//! Error types for samplekit-slicer.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Analysis(#[from] samplekit_core::Error),

    #[error("Host error: {0}")]
    Host(String),

    #[error("Unknown articulation: {0}")]
    UnknownArticulation(String),

    #[error("Missing region metadata: {0}")]
    MissingMetadata(String),

    #[error("Articulation error: {0}")]
    Articulation(String),
}

impl Error {
    /// Analysis error, if this wraps one.
    pub fn as_analysis(&self) -> Option<&samplekit_core::Error> {
        match self {
            Error::Analysis(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
