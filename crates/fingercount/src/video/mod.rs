//! Video input.

pub mod webcam;

use crate::image::Image;
use crate::timer::Timer;

/// A source of video frames.
pub trait FrameSource {
    /// Reads the next frame, blocking until one is available.
    ///
    /// An error means the source cannot deliver any more frames.
    fn read(&mut self) -> anyhow::Result<Image>;

    /// Returns the profiling timers of this source, for periodic logging.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read(&mut self) -> anyhow::Result<Image> {
        (**self).read()
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}
