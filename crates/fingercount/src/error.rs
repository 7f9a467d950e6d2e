//! Error type shared by the pipeline and its collaborators.

use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Convenience alias for results returned by the pipeline and its collaborators' constructors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that stop the finger counter.
///
/// None of these are retried. A frame in which no hands are detected is *not* an error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The video source could not be opened. Reported before the frame loop is entered.
    #[error("cannot open video source #{index}")]
    SourceUnavailable {
        index: usize,
        #[source]
        source: BoxError,
    },

    /// Reading a frame from an already opened video source failed.
    #[error("cannot read frame")]
    FrameRead(#[source] BoxError),

    /// The hand detector could not be created (eg. a model file is missing or malformed).
    #[error("cannot load hand detector")]
    Detector(#[source] BoxError),

    /// Running the hand detector on a frame failed.
    #[error("hand detection failed")]
    Detection(#[source] BoxError),

    /// The display window could not be created or updated.
    #[error("cannot display frame")]
    Display(#[source] BoxError),
}

impl Error {
    pub(crate) fn source_unavailable(index: usize, e: impl Into<BoxError>) -> Self {
        Self::SourceUnavailable {
            index,
            source: e.into(),
        }
    }
}
