//! Hand landmark prediction.

use std::path::Path;

use crate::image::{Image, Resolution, RotatedRect, Vec2f};
use crate::nn::{Cnn, ColorMapper, NeuralNetwork};

use super::{HandObservation, Handedness};

/// Number of landmarks the network estimates per hand.
pub const NUM_LANDMARKS: usize = 21;

/// A single hand landmark.
///
/// `x` and `y` are normalized to the frame size, so `(0.0, 0.0)` is the top left and `(1.0, 1.0)`
/// the bottom right corner of the frame. Landmarks of hands that are partially outside the frame
/// can lie outside of that range. `z` is the relative depth, using roughly the same scale as `x`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    #[inline]
    #[must_use]
    pub fn with_z(self, z: f32) -> Self {
        Self { z, ..self }
    }

    /// Converts the normalized position to a pixel position in an image of size `res`.
    pub fn to_pixel(&self, res: Resolution) -> (i32, i32) {
        (
            (self.x * res.width() as f32) as i32,
            (self.y * res.height() as f32) as i32,
        )
    }
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **IP**: Interphalangeal joint, the thumb's joint between MCP and tip.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Pairs of landmarks that are connected by a bone in the hand skeleton.
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

/// Computes the clockwise rotation of a hand compared to an upright position.
///
/// A rotation of 0° means that the fingers point upwards, which is the case when the middle
/// finger's MCP is straight above the wrist.
pub fn hand_rotation(wrist: Vec2f, middle_finger_mcp: Vec2f) -> f32 {
    let rel = wrist - middle_finger_mcp;
    (-rel.x).atan2(rel.y)
}

/// Landmarks estimated by the [`LandmarkNetwork`] for a single hand region.
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    /// Positions in pixel coordinates of the full frame. `z` uses the same scale.
    positions: [[f32; 3]; NUM_LANDMARKS],
    presence: f32,
    raw_handedness: f32,
}

impl LandmarkResult {
    pub(crate) fn new(
        positions: [[f32; 3]; NUM_LANDMARKS],
        presence: f32,
        raw_handedness: f32,
    ) -> Self {
        Self {
            positions,
            presence,
            raw_handedness,
        }
    }

    /// Returns a landmark's position in the input image's pixel coordinate system.
    pub fn position(&self, idx: LandmarkIdx) -> Vec2f {
        let [x, y, _] = self.positions[idx as usize];
        Vec2f::new(x, y)
    }

    /// Returns all landmark positions in the input image's pixel coordinate system.
    pub fn positions(&self) -> impl Iterator<Item = Vec2f> + '_ {
        self.positions.iter().map(|&[x, y, _]| Vec2f::new(x, y))
    }

    /// Returns the network's confidence that the region actually contains a hand.
    #[inline]
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Returns the estimated handedness of the hand in the image.
    ///
    /// This should only be relied on when the `presence` is over some threshold.
    pub fn handedness(&self) -> Handedness {
        if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }

    /// Computes the clockwise rotation of the hand compared to an upright position.
    pub fn rotation_radians(&self) -> f32 {
        hand_rotation(
            self.position(LandmarkIdx::Wrist),
            self.position(LandmarkIdx::MiddleFingerMcp),
        )
    }

    /// Normalizes the landmarks to the size of the frame they were estimated on.
    pub fn to_observation(&self, frame: Resolution) -> HandObservation {
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let landmarks = self
            .positions
            .map(|[x, y, z]| Landmark::new(x / w, y / h).with_z(z / w));
        HandObservation::new(landmarks, self.handedness(), self.presence)
    }
}

/// Hand landmark estimation network.
///
/// Takes a hand region of interest, rotated so that the fingers point up, and estimates 21
/// landmarks, the probability that there is a hand in the region, and the handedness.
#[derive(Clone)]
pub struct LandmarkNetwork {
    cnn: Cnn,
}

impl LandmarkNetwork {
    /// Loads the network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let cnn = Cnn::new(
            NeuralNetwork::from_path(path)?,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self { cnn })
    }

    pub fn input_resolution(&self) -> Resolution {
        self.cnn.input_resolution()
    }

    /// Estimates the landmarks of the hand inside `roi`.
    pub fn estimate(&self, image: &Image, roi: &RotatedRect) -> anyhow::Result<LandmarkResult> {
        let outputs = self.cnn.estimate(image, roi)?;
        let screen_landmarks = outputs.f32_slice(0, NUM_LANDMARKS * 3)?;
        let presence = outputs.f32_slice(1, 1)?[0];
        let raw_handedness = outputs.f32_slice(2, 1)?[0];

        let input = self.input_resolution();
        let scale = Vec2f::new(
            roi.rect().width() / input.width() as f32,
            roi.rect().height() / input.height() as f32,
        );

        let mut positions = [[0.0; 3]; NUM_LANDMARKS];
        for (out, chunk) in positions.iter_mut().zip(screen_landmarks.chunks_exact(3)) {
            let local = Vec2f::new(chunk[0], chunk[1]).component_mul(&scale);
            let pos = roi.transform_out(local);
            *out = [pos.x, pos.y, chunk[2] * scale.x];
        }

        Ok(LandmarkResult::new(positions, presence, raw_handedness))
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn connectivity_covers_all_landmarks() {
        assert_eq!(CONNECTIVITY.len(), NUM_LANDMARKS);
        for idx in 0..NUM_LANDMARKS {
            assert!(CONNECTIVITY
                .iter()
                .any(|(a, b)| *a as usize == idx || *b as usize == idx));
        }
        assert_eq!(LandmarkIdx::PinkyTip as usize, NUM_LANDMARKS - 1);
    }

    #[test]
    fn rotation() {
        let wrist = Vec2f::new(0.0, 0.0);
        assert_relative_eq!(hand_rotation(wrist, Vec2f::new(0.0, -1.0)), 0.0);
        assert_relative_eq!(hand_rotation(wrist, Vec2f::new(1.0, 0.0)), FRAC_PI_2);
        assert_relative_eq!(hand_rotation(wrist, Vec2f::new(-1.0, 0.0)), -FRAC_PI_2);
        assert_relative_eq!(hand_rotation(wrist, Vec2f::new(0.0, 1.0)).abs(), PI);
        assert_eq!(hand_rotation(wrist, wrist), 0.0);
    }

    #[test]
    fn observation_is_normalized() {
        let mut positions = [[0.0; 3]; NUM_LANDMARKS];
        positions[LandmarkIdx::ThumbTip as usize] = [320.0, 120.0, -64.0];
        let result = LandmarkResult::new(positions, 0.75, 0.9);

        let obs = result.to_observation(Resolution::new(640, 480));
        assert_eq!(obs.handedness(), Handedness::Right);
        assert_eq!(obs.confidence(), 0.75);
        let tip = obs.landmark(LandmarkIdx::ThumbTip);
        assert_relative_eq!(tip.x, 0.5);
        assert_relative_eq!(tip.y, 0.25);
        assert_relative_eq!(tip.z, -0.1);
        assert_eq!(obs.landmark(LandmarkIdx::Wrist), Landmark::default());
    }

    #[test]
    fn pixel_positions() {
        let res = Resolution::new(640, 480);
        assert_eq!(Landmark::new(0.5, 0.5).to_pixel(res), (320, 240));
        assert_eq!(Landmark::new(1.0, 0.0).to_pixel(res), (640, 0));
        assert_eq!(Landmark::new(-0.25, 1.5).to_pixel(res), (-160, 720));
    }
}
