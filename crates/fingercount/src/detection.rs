//! Common functionality for object detection.
//!
//! [`ssd`] computes the anchors that raw network outputs are relative to, and [`nms`] merges the
//! duplicate detections such networks produce for a single object.

pub mod nms;
pub mod ssd;

use crate::image::{Rect, Vec2f};

/// A detected object.
///
/// A [`Detection`] consists of a [`Rect`] enclosing the detected object, a confidence value, a
/// clockwise rotation angle of the object, and a possibly empty set of located keypoints.
///
/// The confidence value lies between 0.0 and 1.0. It is used as the weight when performing
/// non-maximum suppression (see [`nms`]).
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the angle of the detected object, in radians, clockwise.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Sets the angle of the detected object, in radians, clockwise.
    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    /// Returns the axis-aligned bounding rectangle containing the detected object.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn set_bounding_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Applies `f` to the position of the bounding rectangle's center and to every keypoint.
    ///
    /// The size of the bounding rectangle is multiplied by `scale`.
    pub fn map_positions(&mut self, scale: f32, mut f: impl FnMut(Vec2f) -> Vec2f) {
        let center = f(self.rect.center());
        self.rect = Rect::from_center(
            center.x,
            center.y,
            self.rect.width() * scale,
            self.rect.height() * scale,
        );
        for kp in &mut self.keypoints {
            let pos = f(kp.position());
            *kp = Keypoint::new(pos.x, pos.y);
        }
    }
}

/// A 2D keypoint produced as part of a [`Detection`].
///
/// The meaning of a keypoint depends on the specific detector and on its index in the keypoint
/// list. Typically keypoints are used to crop/rotate a detected object for further processing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn position(&self) -> Vec2f {
        Vec2f::new(self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_positions_moves_everything() {
        let mut det = Detection::with_keypoints(
            0.9,
            Rect::from_center(1.0, 1.0, 2.0, 4.0),
            vec![Keypoint::new(0.0, 0.0), Keypoint::new(2.0, 3.0)],
        );
        det.map_positions(2.0, |p| p * 2.0 + Vec2f::new(10.0, 0.0));

        let rect = det.bounding_rect();
        assert_eq!(rect.center(), Vec2f::new(12.0, 2.0));
        assert_eq!(rect.width(), 4.0);
        assert_eq!(rect.height(), 8.0);
        assert_eq!(
            det.keypoints(),
            &[Keypoint::new(10.0, 0.0), Keypoint::new(14.0, 6.0)]
        );
        assert_eq!(det.confidence(), 0.9);
    }
}
