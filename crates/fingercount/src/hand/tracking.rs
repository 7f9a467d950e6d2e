//! Combined palm detection and landmark estimation.

use std::cmp::Reverse;

use crate::detector::{DetectorOptions, HandDetector, RunningMode};
use crate::error::Error;
use crate::image::{Image, RotatedRect, Vec2f};
use crate::num::TotalF32;
use crate::timer::Timer;

use super::{
    landmark::{LandmarkNetwork, LandmarkResult},
    palm::{self, PalmDetector},
    HandObservation,
};

/// Finds hands with a [`PalmDetector`] and estimates their landmarks with a [`LandmarkNetwork`].
///
/// In [`RunningMode::Continuous`], the landmarks found in one frame determine where the landmark
/// network looks in the next frame, and the expensive palm detection only runs while fewer than
/// the maximum number of hands are in view.
pub struct HandLandmarker {
    palm_detector: PalmDetector,
    landmarks: LandmarkNetwork,
    options: DetectorOptions,
    /// Hand regions carried over from the previous frame.
    rois: Vec<RotatedRect>,
    t_landmarks: Timer,
}

impl HandLandmarker {
    /// Regions overlapping by at least this much are considered to contain the same hand.
    pub const IOU_THRESH: f32 = 0.3;

    /// Loads both networks from the model paths in `options`.
    pub fn new(options: &DetectorOptions) -> crate::Result<Self> {
        log::debug!(
            "loading palm detection model from '{}'",
            options.palm_model_path().display()
        );
        let mut palm_detector =
            PalmDetector::load(options.palm_model_path()).map_err(|e| Error::Detector(e.into()))?;
        palm_detector.set_threshold(options.get_min_detection_confidence());

        log::debug!(
            "loading hand landmark model from '{}'",
            options.landmark_model_path().display()
        );
        let landmarks = LandmarkNetwork::load(options.landmark_model_path())
            .map_err(|e| Error::Detector(e.into()))?;

        Ok(Self {
            palm_detector,
            landmarks,
            options: options.clone(),
            rois: Vec::new(),
            t_landmarks: Timer::new("landmarks"),
        })
    }

    fn presence_threshold(&self) -> f32 {
        match self.options.get_running_mode() {
            RunningMode::Static => self.options.get_min_detection_confidence(),
            RunningMode::Continuous => self.options.get_min_tracking_confidence(),
        }
    }

    /// Returns the regions that will be searched for hands, topping up the carried-over regions
    /// with fresh palm detections.
    fn regions(&mut self, image: &Image) -> anyhow::Result<Vec<RotatedRect>> {
        let max_hands = self.options.get_max_hands();
        let mut rois = match self.options.get_running_mode() {
            RunningMode::Static => Vec::new(),
            RunningMode::Continuous => std::mem::take(&mut self.rois),
        };
        rois.truncate(max_hands);

        if rois.len() < max_hands {
            let palms = self.palm_detector.detect(image)?;
            log::trace!("{} palms, {} carried-over hands", palms.len(), rois.len());
            for palm in &palms {
                if rois.len() >= max_hands {
                    break;
                }
                let roi = palm::hand_roi(palm);
                if overlaps_any(&roi, &rois) {
                    continue;
                }
                rois.push(roi);
            }
        }

        Ok(rois)
    }
}

impl HandDetector for HandLandmarker {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<HandObservation>> {
        let rois = self.regions(image)?;

        let mut results = Vec::with_capacity(rois.len());
        for roi in &rois {
            let result = self
                .t_landmarks
                .time(|| self.landmarks.estimate(image, roi))?;
            results.push(result);
        }

        let hands = distinct_hands(
            results,
            self.presence_threshold(),
            self.options.get_max_hands(),
        );
        if self.options.get_running_mode() == RunningMode::Continuous {
            self.rois = hands.iter().map(|(_, next)| *next).collect();
        }

        Ok(hands
            .iter()
            .map(|(result, _)| result.to_observation(image.resolution()))
            .collect())
    }

    fn timers(&self) -> Vec<&Timer> {
        let mut timers = self.palm_detector.timers().to_vec();
        timers.push(&self.t_landmarks);
        timers
    }
}

/// Selects up to `max_hands` distinct hands from the landmark estimates of one frame.
///
/// Estimates below `threshold` are dropped. Two regions can converge on the same hand, so an
/// estimate whose landmark region overlaps that of a more confident estimate is dropped as well.
/// Every kept estimate is returned along with the region to search for it in the next frame.
fn distinct_hands(
    mut results: Vec<LandmarkResult>,
    threshold: f32,
    max_hands: usize,
) -> Vec<(LandmarkResult, RotatedRect)> {
    results.sort_by_key(|result| Reverse(TotalF32(result.presence())));

    let mut hands: Vec<(LandmarkResult, RotatedRect)> = Vec::with_capacity(results.len());
    let mut regions = Vec::with_capacity(results.len());
    for result in results {
        if hands.len() >= max_hands {
            break;
        }
        if result.presence() < threshold {
            log::trace!("dropping hand with presence {:.2}", result.presence());
            continue;
        }
        let next = match next_roi(&result) {
            Some(next) => next,
            None => continue,
        };
        if overlaps_any(&next, &regions) {
            log::trace!("dropping duplicate hand with presence {:.2}", result.presence());
            continue;
        }
        regions.push(next);
        hands.push((result, next));
    }
    hands
}

fn overlaps_any(roi: &RotatedRect, others: &[RotatedRect]) -> bool {
    let rect = roi.bounding_rect();
    others
        .iter()
        .any(|other| other.bounding_rect().iou(&rect) >= HandLandmarker::IOU_THRESH)
}

/// Computes the region to search for a hand in the next frame from its current landmarks.
fn next_roi(result: &LandmarkResult) -> Option<RotatedRect> {
    roi_from_landmarks(result.rotation_radians(), result.positions())
}

fn roi_from_landmarks(
    radians: f32,
    positions: impl IntoIterator<Item = Vec2f>,
) -> Option<RotatedRect> {
    let bounds = RotatedRect::bounding(radians, positions)?;
    Some(
        bounds
            .shift_rel(Vec2f::new(0.0, -0.1))
            .map(|rect| rect.to_square().scale(2.0)),
    )
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::hand::landmark::NUM_LANDMARKS;
    use crate::image::Rect;

    use super::*;

    /// A hand whose landmarks form a grid covering a `size` pixel square centered at `center`.
    fn hand_at(center: Vec2f, size: f32, presence: f32) -> LandmarkResult {
        let positions: [[f32; 3]; NUM_LANDMARKS] = std::array::from_fn(|i| {
            let col = (i % 5) as f32 / 4.0 - 0.5;
            let row = (i / 5) as f32 / 4.0 - 0.5;
            [center.x + col * size, center.y + row * size, 0.0]
        });
        LandmarkResult::new(positions, presence, 0.9)
    }

    #[test]
    fn landmark_roi_is_square_and_enlarged() {
        let points = [
            Vec2f::new(40.0, 40.0),
            Vec2f::new(60.0, 40.0),
            Vec2f::new(40.0, 80.0),
            Vec2f::new(60.0, 80.0),
        ];
        let roi = roi_from_landmarks(0.0, points).unwrap();
        assert_relative_eq!(roi.rect().width(), 80.0, epsilon = 1e-4);
        assert_relative_eq!(roi.rect().height(), 80.0, epsilon = 1e-4);
        // Shifted up by a tenth of the 40 pixel tall bounding box.
        assert_relative_eq!(roi.center(), Vec2f::new(50.0, 56.0), epsilon = 1e-4);
    }

    #[test]
    fn overlap() {
        let a = RotatedRect::from(Rect::from_center(0.0, 0.0, 10.0, 10.0));
        let b = RotatedRect::from(Rect::from_center(2.0, 0.0, 10.0, 10.0));
        let far = RotatedRect::from(Rect::from_center(50.0, 0.0, 10.0, 10.0));
        assert!(overlaps_any(&a, &[far, b]));
        assert!(!overlaps_any(&a, &[far]));
        assert!(!overlaps_any(&a, &[]));
        assert!(roi_from_landmarks(0.0, []).is_none());
    }

    #[test]
    fn same_hand_is_reported_once() {
        // Two regions converging on one hand, with slightly different estimates.
        let hands = distinct_hands(
            vec![
                hand_at(Vec2f::new(100.0, 100.0), 50.0, 0.8),
                hand_at(Vec2f::new(104.0, 98.0), 50.0, 0.9),
            ],
            0.5,
            2,
        );
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].0.presence(), 0.9);
    }

    #[test]
    fn distinct_hands_are_kept() {
        let hands = distinct_hands(
            vec![
                hand_at(Vec2f::new(100.0, 100.0), 50.0, 0.7),
                hand_at(Vec2f::new(400.0, 100.0), 50.0, 0.9),
                hand_at(Vec2f::new(250.0, 300.0), 50.0, 0.3),
            ],
            0.5,
            2,
        );
        let presence: Vec<_> = hands.iter().map(|(hand, _)| hand.presence()).collect();
        assert_eq!(presence, [0.9, 0.7]);
        assert!(!overlaps_any(&hands[0].1, &[hands[1].1]));

        let one = distinct_hands(
            vec![
                hand_at(Vec2f::new(100.0, 100.0), 50.0, 0.7),
                hand_at(Vec2f::new(400.0, 100.0), 50.0, 0.9),
            ],
            0.5,
            1,
        );
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].0.presence(), 0.9);
    }

    #[test]
    fn missing_models_fail_to_load() {
        let options = DetectorOptions::default()
            .palm_model("does/not/exist.onnx")
            .landmark_model("does/not/exist.onnx");
        assert!(matches!(
            HandLandmarker::new(&options),
            Err(Error::Detector(_))
        ));
    }
}
