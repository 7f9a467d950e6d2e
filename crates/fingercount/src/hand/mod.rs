//! Hand detection, landmark estimation, and finger classification.
//!
//! The detector pipeline follows MediaPipe Hands: a [`palm`] detection network finds hands in the
//! full frame, a [`landmark`] network estimates 21 landmarks inside a rotated region around each
//! hand, and [`tracking::HandLandmarker`] glues both together. [`fingers`] turns the landmarks of
//! a single hand into an open finger count.

pub mod fingers;
pub mod landmark;
pub mod palm;
pub mod tracking;

use std::{fmt, str::FromStr};

use crate::image::{draw, Color, Image};

use self::fingers::FingerStates;
use self::landmark::{Landmark, LandmarkIdx, CONNECTIVITY, NUM_LANDMARKS};

/// Whether a hand is a left or a right hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Returns the label used by the detector for this handedness (`"Left"` or `"Right"`).
    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Handedness {
    type Err = ParseHandednessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Left" => Ok(Handedness::Left),
            "Right" => Ok(Handedness::Right),
            _ => Err(ParseHandednessError(s.to_string())),
        }
    }
}

/// Error returned when parsing a handedness label other than `"Left"` or `"Right"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid handedness label '{0}' (expected 'Left' or 'Right')")]
pub struct ParseHandednessError(String);

/// A single hand seen in a single frame.
///
/// Observations are produced fresh for every frame. They carry no identity, so nothing links an
/// observation to the same hand in the previous frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HandObservation {
    landmarks: [Landmark; NUM_LANDMARKS],
    handedness: Handedness,
    confidence: f32,
}

impl HandObservation {
    pub fn new(
        landmarks: [Landmark; NUM_LANDMARKS],
        handedness: Handedness,
        confidence: f32,
    ) -> Self {
        Self {
            landmarks,
            handedness,
            confidence,
        }
    }

    /// Returns all 21 landmarks, indexed by [`LandmarkIdx`].
    #[inline]
    pub fn landmarks(&self) -> &[Landmark; NUM_LANDMARKS] {
        &self.landmarks
    }

    #[inline]
    pub fn landmark(&self, idx: LandmarkIdx) -> Landmark {
        self.landmarks[idx as usize]
    }

    #[inline]
    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    /// Returns the detector's confidence that this is a hand, between 0.0 and 1.0.
    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Classifies every digit of this hand as open or closed.
    pub fn finger_states(&self) -> FingerStates {
        fingers::finger_states(&self.landmarks, self.handedness)
    }

    /// Returns the number of open fingers (0 to 5, thumb included).
    pub fn open_fingers(&self) -> u32 {
        fingers::classify(&self.landmarks, self.handedness)
    }

    /// Draws the hand skeleton onto `target`.
    ///
    /// Landmarks are scaled from normalized coordinates to the size of `target`.
    pub fn draw(&self, target: &mut Image) {
        let res = target.resolution();
        for (a, b) in CONNECTIVITY {
            let (ax, ay) = self.landmark(*a).to_pixel(res);
            let (bx, by) = self.landmark(*b).to_pixel(res);
            draw::line(target, ax, ay, bx, by)
                .color(Color::GREEN)
                .stroke_width(2);
        }
        for lm in &self.landmarks {
            let (x, y) = lm.to_pixel(res);
            draw::marker(target, x, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handedness_labels() {
        for hand in [Handedness::Left, Handedness::Right] {
            assert_eq!(hand.to_string().parse::<Handedness>(), Ok(hand));
        }
        assert_eq!("Right".parse(), Ok(Handedness::Right));
        assert!("right".parse::<Handedness>().is_err());
        assert!("".parse::<Handedness>().is_err());
    }

    #[test]
    fn draw_skeleton_in_bounds() {
        let landmarks = [Landmark::new(0.5, 0.5); NUM_LANDMARKS];
        let hand = HandObservation::new(landmarks, Handedness::Left, 0.9);
        let mut image = Image::new(20, 20);
        hand.draw(&mut image);
        assert_eq!(image.get(10, 10), Color::RED);
    }

    #[test]
    fn draw_skeleton_off_frame() {
        let landmarks = [Landmark::new(-0.2, 1.3); NUM_LANDMARKS];
        let hand = HandObservation::new(landmarks, Handedness::Right, 0.9);
        let mut image = Image::new(20, 20);
        hand.draw(&mut image);
        assert!(image.data().iter().all(|&b| b == 0));
    }
}
