//! Open/closed classification of the five digits of a hand.
//!
//! The rules only look at the 2D landmark positions in a frame where Y points down:
//!
//! - Index, middle, ring, and pinky finger are open when their tip is above their PIP joint.
//! - The thumb is open when its tip is further away from the palm horizontally than its IP joint.
//!   For a right hand this means the tip is to the left of the IP joint, for a left hand it is to
//!   the right.

use std::fmt;

use super::landmark::{Landmark, LandmarkIdx, NUM_LANDMARKS};
use super::Handedness;

/// One of the five digits of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Digit {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Digit {
    /// All digits, thumb first.
    pub const ALL: [Digit; 5] = [
        Digit::Thumb,
        Digit::Index,
        Digit::Middle,
        Digit::Ring,
        Digit::Pinky,
    ];

    /// Returns the landmark at the tip of this digit.
    pub fn tip(self) -> LandmarkIdx {
        match self {
            Digit::Thumb => LandmarkIdx::ThumbTip,
            Digit::Index => LandmarkIdx::IndexFingerTip,
            Digit::Middle => LandmarkIdx::MiddleFingerTip,
            Digit::Ring => LandmarkIdx::RingFingerTip,
            Digit::Pinky => LandmarkIdx::PinkyTip,
        }
    }

    /// Returns the joint the tip is compared against.
    ///
    /// This is the IP joint for the thumb and the PIP joint for every other digit.
    pub fn reference_joint(self) -> LandmarkIdx {
        match self {
            Digit::Thumb => LandmarkIdx::ThumbIp,
            Digit::Index => LandmarkIdx::IndexFingerPip,
            Digit::Middle => LandmarkIdx::MiddleFingerPip,
            Digit::Ring => LandmarkIdx::RingFingerPip,
            Digit::Pinky => LandmarkIdx::PinkyPip,
        }
    }

    fn is_open(self, landmarks: &[Landmark; NUM_LANDMARKS], handedness: Handedness) -> bool {
        let tip = landmarks[self.tip() as usize];
        let joint = landmarks[self.reference_joint() as usize];
        match (self, handedness) {
            (Digit::Thumb, Handedness::Right) => tip.x < joint.x,
            (Digit::Thumb, Handedness::Left) => tip.x > joint.x,
            _ => tip.y < joint.y,
        }
    }
}

/// The open/closed state of every digit of one hand.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct FingerStates {
    open: [bool; 5],
}

impl FingerStates {
    #[inline]
    pub fn is_open(&self, digit: Digit) -> bool {
        self.open[digit as usize]
    }

    #[inline]
    pub fn thumb_open(&self) -> bool {
        self.is_open(Digit::Thumb)
    }

    /// Returns the number of open digits, thumb included.
    pub fn count(&self) -> u32 {
        self.open.iter().filter(|open| **open).count() as u32
    }

    /// Returns the number of open digits, not counting the thumb.
    pub fn non_thumb_count(&self) -> u32 {
        self.count() - u32::from(self.thumb_open())
    }
}

impl fmt::Debug for FingerStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for digit in Digit::ALL {
            map.entry(&digit, &self.is_open(digit));
        }
        map.finish()
    }
}

/// Classifies every digit of a hand as open or closed.
pub fn finger_states(
    landmarks: &[Landmark; NUM_LANDMARKS],
    handedness: Handedness,
) -> FingerStates {
    FingerStates {
        open: Digit::ALL.map(|digit| digit.is_open(landmarks, handedness)),
    }
}

/// Returns the number of open digits of a hand (0 to 5).
pub fn classify(landmarks: &[Landmark; NUM_LANDMARKS], handedness: Handedness) -> u32 {
    finger_states(landmarks, handedness).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    use LandmarkIdx::*;

    fn set(landmarks: &mut [Landmark; NUM_LANDMARKS], idx: LandmarkIdx, x: f32, y: f32) {
        landmarks[idx as usize] = Landmark::new(x, y);
    }

    fn random_landmarks() -> [Landmark; NUM_LANDMARKS] {
        std::array::from_fn(|_| Landmark::new(fastrand::f32(), fastrand::f32()))
    }

    /// Index and middle raised, ring and pinky curled, thumb tucked in.
    fn peace_sign() -> [Landmark; NUM_LANDMARKS] {
        let mut lm = [Landmark::new(0.5, 0.5); NUM_LANDMARKS];
        set(&mut lm, IndexFingerTip, 0.45, 0.2);
        set(&mut lm, IndexFingerPip, 0.45, 0.4);
        set(&mut lm, MiddleFingerTip, 0.5, 0.2);
        set(&mut lm, MiddleFingerPip, 0.5, 0.4);
        set(&mut lm, RingFingerTip, 0.55, 0.6);
        set(&mut lm, RingFingerPip, 0.55, 0.4);
        set(&mut lm, PinkyTip, 0.6, 0.6);
        set(&mut lm, PinkyPip, 0.6, 0.4);
        set(&mut lm, ThumbTip, 0.50, 0.5);
        set(&mut lm, ThumbIp, 0.45, 0.5);
        lm
    }

    #[test]
    fn peace_sign_right_hand() {
        let lm = peace_sign();
        let states = finger_states(&lm, Handedness::Right);
        assert_eq!(classify(&lm, Handedness::Right), 2);
        assert!(!states.thumb_open());
        assert!(states.is_open(Digit::Index));
        assert!(states.is_open(Digit::Middle));
        assert!(!states.is_open(Digit::Ring));
        assert!(!states.is_open(Digit::Pinky));

        // Thumb tip right of the IP joint counts as open for a left hand.
        assert_eq!(classify(&lm, Handedness::Left), 3);
    }

    #[test]
    fn index_and_thumb() {
        let mut lm = [Landmark::new(0.5, 0.5); NUM_LANDMARKS];
        set(&mut lm, IndexFingerTip, 0.5, 0.3);
        set(&mut lm, IndexFingerPip, 0.5, 0.5);
        for digit in [Digit::Middle, Digit::Ring, Digit::Pinky] {
            set(&mut lm, digit.tip(), 0.5, 0.7);
        }
        set(&mut lm, ThumbTip, 0.2, 0.5);
        set(&mut lm, ThumbIp, 0.4, 0.5);

        let states = finger_states(&lm, Handedness::Right);
        assert!(states.thumb_open());
        assert!(states.is_open(Digit::Index));
        assert_eq!(classify(&lm, Handedness::Right), 2);
    }

    #[test]
    fn fist_and_open_hand() {
        let mut open = [Landmark::new(0.5, 0.5); NUM_LANDMARKS];
        let mut fist = open;
        for digit in &Digit::ALL[1..] {
            set(&mut open, digit.tip(), 0.5, 0.1);
            set(&mut fist, digit.tip(), 0.5, 0.9);
        }
        set(&mut open, ThumbTip, 0.2, 0.5);
        set(&mut fist, ThumbTip, 0.8, 0.5);

        assert_eq!(classify(&open, Handedness::Right), 5);
        assert_eq!(classify(&fist, Handedness::Right), 0);
        assert_eq!(classify(&open, Handedness::Left), 4);
        assert_eq!(classify(&fist, Handedness::Left), 1);
    }

    #[test]
    fn ties_count_as_closed() {
        let lm = [Landmark::new(0.5, 0.5); NUM_LANDMARKS];
        assert_eq!(classify(&lm, Handedness::Left), 0);
        assert_eq!(classify(&lm, Handedness::Right), 0);
    }

    #[test]
    fn random_hands() {
        for _ in 0..1000 {
            let lm = random_landmarks();
            let left = finger_states(&lm, Handedness::Left);
            let right = finger_states(&lm, Handedness::Right);

            assert!(left.count() <= 5);
            assert!(right.count() <= 5);
            assert_eq!(left.non_thumb_count(), right.non_thumb_count());
            assert_eq!(finger_states(&lm, Handedness::Left), left);

            let tip = lm[ThumbTip as usize].x;
            let ip = lm[ThumbIp as usize].x;
            if tip != ip {
                assert_ne!(left.thumb_open(), right.thumb_open());
            }
        }
    }

    #[test]
    fn only_x_matters_for_the_thumb() {
        for _ in 0..100 {
            let mut lm = random_landmarks();
            let before = finger_states(&lm, Handedness::Right).thumb_open();
            lm[ThumbTip as usize].y = fastrand::f32();
            lm[ThumbIp as usize].y = fastrand::f32();
            lm[ThumbTip as usize].z = fastrand::f32();
            assert_eq!(finger_states(&lm, Handedness::Right).thumb_open(), before);
        }
    }
}
