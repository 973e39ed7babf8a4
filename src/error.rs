//! Centralized error type for the samplekit umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Analysis(#[from] samplekit_core::Error),

    #[error("Slicer: {0}")]
    Slicer(#[from] samplekit_slicer::Error),

    #[cfg(feature = "wav")]
    #[error("WAV: {0}")]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The analysis error underneath, if any, including one wrapped by the slicer.
    pub fn as_analysis(&self) -> Option<&samplekit_core::Error> {
        match self {
            Error::Analysis(err) => Some(err),
            Error::Slicer(err) => err.as_analysis(),
            _ => None,
        }
    }

    /// True when loop search ran but found no good enough loop.
    pub fn is_loop_not_found(&self) -> bool {
        self.as_analysis()
            .is_some_and(samplekit_core::Error::is_loop_not_found)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
