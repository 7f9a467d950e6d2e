//! The hand detection capability consumed by the frame pipeline.

use std::path::{Path, PathBuf};

use crate::hand::HandObservation;
use crate::image::Image;
use crate::timer::Timer;

/// Detects hands and their landmarks in a frame.
pub trait HandDetector {
    /// Detects all hands in `image`, highest confidence first.
    ///
    /// Returning an empty list is not an error. Landmarks are normalized to the size of `image`.
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<HandObservation>>;

    /// Returns the profiling timers of this detector, for periodic logging.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<D: HandDetector + ?Sized> HandDetector for Box<D> {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<HandObservation>> {
        (**self).detect(image)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

/// How consecutive frames relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunningMode {
    /// Frames are unrelated images; palm detection runs on every frame.
    Static,
    /// Frames form a video; hand regions found in one frame are reused for the next, and palm
    /// detection only runs when fewer than the maximum number of hands are present.
    #[default]
    Continuous,
}

/// Hand detector configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorOptions {
    max_hands: usize,
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
    running_mode: RunningMode,
    palm_model: PathBuf,
    landmark_model: PathBuf,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_hands: 2,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            running_mode: RunningMode::Continuous,
            palm_model: PathBuf::from(Self::DEFAULT_PALM_MODEL),
            landmark_model: PathBuf::from(Self::DEFAULT_LANDMARK_MODEL),
        }
    }
}

impl DetectorOptions {
    pub const DEFAULT_PALM_MODEL: &'static str = "3rdparty/onnx/palm_detection_full.onnx";
    pub const DEFAULT_LANDMARK_MODEL: &'static str = "3rdparty/onnx/hand_landmark_full.onnx";

    /// Sets the maximum number of hands reported per frame.
    ///
    /// A value of 0 disables detection entirely.
    #[inline]
    pub fn max_hands(self, max_hands: usize) -> Self {
        Self { max_hands, ..self }
    }

    /// Sets the minimum palm detection score. Clamped to `[0, 1]`.
    #[inline]
    pub fn min_detection_confidence(self, confidence: f32) -> Self {
        Self {
            min_detection_confidence: confidence.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Sets the minimum landmark presence score for keeping a tracked hand. Clamped to `[0, 1]`.
    #[inline]
    pub fn min_tracking_confidence(self, confidence: f32) -> Self {
        Self {
            min_tracking_confidence: confidence.clamp(0.0, 1.0),
            ..self
        }
    }

    #[inline]
    pub fn running_mode(self, running_mode: RunningMode) -> Self {
        Self {
            running_mode,
            ..self
        }
    }

    /// Sets the path of the palm detection ONNX model.
    #[inline]
    pub fn palm_model(self, path: impl Into<PathBuf>) -> Self {
        Self {
            palm_model: path.into(),
            ..self
        }
    }

    /// Sets the path of the hand landmark ONNX model.
    #[inline]
    pub fn landmark_model(self, path: impl Into<PathBuf>) -> Self {
        Self {
            landmark_model: path.into(),
            ..self
        }
    }

    pub fn get_max_hands(&self) -> usize {
        self.max_hands
    }

    pub fn get_min_detection_confidence(&self) -> f32 {
        self.min_detection_confidence
    }

    pub fn get_min_tracking_confidence(&self) -> f32 {
        self.min_tracking_confidence
    }

    pub fn get_running_mode(&self) -> RunningMode {
        self.running_mode
    }

    pub fn palm_model_path(&self) -> &Path {
        &self.palm_model
    }

    pub fn landmark_model_path(&self) -> &Path {
        &self.landmark_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = DetectorOptions::default();
        assert_eq!(options.get_max_hands(), 2);
        assert_eq!(options.get_min_detection_confidence(), 0.5);
        assert_eq!(options.get_min_tracking_confidence(), 0.5);
        assert_eq!(options.get_running_mode(), RunningMode::Continuous);
        assert_eq!(
            options.palm_model_path(),
            Path::new("3rdparty/onnx/palm_detection_full.onnx")
        );
        assert_eq!(
            options.landmark_model_path(),
            Path::new("3rdparty/onnx/hand_landmark_full.onnx")
        );
    }

    #[test]
    fn confidences_are_clamped() {
        let options = DetectorOptions::default()
            .min_detection_confidence(1.5)
            .min_tracking_confidence(-0.1);
        assert_eq!(options.get_min_detection_confidence(), 1.0);
        assert_eq!(options.get_min_tracking_confidence(), 0.0);
    }
}
