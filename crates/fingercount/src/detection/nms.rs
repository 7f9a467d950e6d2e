//! Non-Maximum Suppression and Averaging.
//!
//! Palm detection produces dozens of overlapping detections for a single hand. Non-Maximum
//! Suppression (NMS) filters these duplicates out, leaving a single detection per hand. Instead of
//! keeping only the most confident detection of each group, the group is replaced by its
//! confidence-weighted average, which reduces jitter between frames.

use crate::image::{Rect, Vec2f};
use crate::num::TotalF32;

use super::{Detection, Keypoint};

/// A non-maximum suppression algorithm.
pub struct NonMaxSuppression {
    iou_thresh: f32,
    avg_buf: Vec<Detection>,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    /// Creates a new non-maximum suppressor.
    ///
    /// Detections overlapping by at least [`Self::DEFAULT_IOU_THRESH`] are merged.
    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            avg_buf: Vec::new(),
        }
    }

    /// Performs non-maximum suppression on `detections`.
    ///
    /// `detections` is drained in the process. The filtered detections are returned ordered by
    /// descending confidence.
    pub fn process(&mut self, detections: &mut Vec<Detection>) -> Vec<Detection> {
        let mut out = Vec::new();

        // Sort by ascending confidence, process highest confidence first by starting at the back.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence));

        while let Some(seed) = detections.pop() {
            self.avg_buf.clear();
            self.avg_buf.push(seed.clone());
            detections.retain(|other| {
                let iou = seed.bounding_rect().iou(&other.bounding_rect());
                if iou >= self.iou_thresh {
                    self.avg_buf.push(other.clone());
                    false
                } else {
                    true
                }
            });

            out.push(weighted_average(seed.confidence(), &self.avg_buf));
        }

        self.avg_buf.clear();
        out
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the confidence-weighted average of `dets`, which all have the same keypoint count.
fn weighted_average(confidence: f32, dets: &[Detection]) -> Detection {
    let num_keypoints = dets[0].keypoints().len();
    let mut keypoints = vec![Vec2f::zeros(); num_keypoints];
    let mut center = Vec2f::zeros();
    let mut size = Vec2f::zeros();
    let mut angle = 0.0;
    let mut divisor = 0.0;

    for det in dets {
        assert_eq!(
            det.keypoints().len(),
            num_keypoints,
            "keypoint count must be constant"
        );

        let factor = det.confidence();
        divisor += factor;
        for (acc, kp) in keypoints.iter_mut().zip(det.keypoints()) {
            *acc += kp.position() * factor;
        }
        let rect = det.bounding_rect();
        center += rect.center() * factor;
        size += rect.size() * factor;
        angle += det.angle() * factor;
    }

    center /= divisor;
    size /= divisor;
    let mut acc = Detection::with_keypoints(
        confidence,
        Rect::from_center(center.x, center.y, size.x, size.y),
        keypoints
            .into_iter()
            .map(|p| Keypoint::new(p.x / divisor, p.y / divisor))
            .collect(),
    );
    acc.set_angle(angle / divisor);
    acc
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn overlapping_detections_are_merged() {
        let mut nms = NonMaxSuppression::new();

        let rect = Rect::from_center(0.0, 0.0, 1.0, 1.0);
        let a = Detection::new(0.6, rect);
        let b = Detection::new(0.55, rect.scale(1.5));
        let detections = nms.process(&mut vec![a, b]);
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        assert_eq!(d.confidence(), 0.6);
        assert_eq!(d.bounding_rect().center(), Vec2f::new(0.0, 0.0));
        assert!(d.bounding_rect().width() > 1.0);
        assert!(d.bounding_rect().width() < 1.5);
    }

    #[test]
    fn nms_ignores_nonoverlapping() {
        let mut nms = NonMaxSuppression::new();

        let a = Detection::new(0.7, Rect::from_center(0.0, 0.0, 1.0, 1.0));
        let b = Detection::new(0.9, Rect::from_center(5.0, 0.0, 1.0, 1.0));

        let detections = nms.process(&mut vec![a, b]);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence(), 0.9);
        assert_eq!(detections[1].confidence(), 0.7);
    }

    #[test]
    fn nma_averages_detections() {
        let mut nms = NonMaxSuppression::new();

        let rect = Rect::from_center(-1.0, 3.0, 1.0, 1.0);
        let mut a = Detection::with_keypoints(1.0, rect, vec![Keypoint::new(0.0, 0.0)]);
        a.set_angle(0.5);
        let b = Detection::with_keypoints(0.5, rect.scale(1.6), vec![Keypoint::new(3.0, 6.0)]);
        let detections = nms.process(&mut vec![a, b]);
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        let rect = d.bounding_rect();
        assert_eq!(d.confidence(), 1.0);
        assert_relative_eq!(rect.center(), Vec2f::new(-1.0, 3.0), epsilon = 1e-5);
        assert_relative_eq!(rect.width(), 1.2, epsilon = 1e-5);
        assert_relative_eq!(rect.height(), 1.2, epsilon = 1e-5);
        assert_relative_eq!(d.keypoints()[0].position(), Vec2f::new(1.0, 2.0), epsilon = 1e-5);
        assert_relative_eq!(d.angle(), 1.0 / 3.0, epsilon = 1e-6);
    }
}
