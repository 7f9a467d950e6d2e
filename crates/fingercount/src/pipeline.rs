//! The per-frame loop tying video input, hand detection, finger counting, and display together.

use std::{fmt, ops::ControlFlow, time::Instant};

use crate::config::Config;
use crate::detector::HandDetector;
use crate::error::Error;
use crate::gui::Frontend;
use crate::image::{draw, Color, Image};
use crate::timer::{FpsCounter, FrameRate};
use crate::video::FrameSource;

/// Hand and open finger totals of a single frame.
///
/// Displays as `Hands: <hands>  |  Fingers: <fingers>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameSummary {
    pub hands: u32,
    pub fingers: u32,
}

impl FrameSummary {
    /// Adds a hand with `open_fingers` open fingers.
    pub fn add_hand(&mut self, open_fingers: u32) {
        self.hands += 1;
        self.fingers += open_fingers;
    }
}

/// Folds per-hand open finger counts into frame totals.
impl FromIterator<u32> for FrameSummary {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut summary = Self::default();
        for open_fingers in iter {
            summary.add_hand(open_fingers);
        }
        summary
    }
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hands: {}  |  Fingers: {}", self.hands, self.fingers)
    }
}

/// Formats a frame rate for the overlay, truncating it to an integer.
pub fn fps_text(fps: f32) -> String {
    format!("FPS: {}", fps as u32)
}

/// Reads frames from a [`FrameSource`], counts fingers, and shows the annotated frames.
///
/// The pipeline owns its collaborators, so dropping it releases the video source and closes the
/// window.
pub struct Pipeline<S, D, F> {
    mirror: bool,
    source: S,
    detector: D,
    frontend: F,
    frame_rate: FrameRate,
    fps: FpsCounter,
}

impl<S: FrameSource, D: HandDetector, F: Frontend> Pipeline<S, D, F> {
    pub fn new(config: &Config, source: S, detector: D, frontend: F) -> Self {
        Self {
            mirror: config.is_mirrored(),
            source,
            detector,
            frontend,
            frame_rate: FrameRate::new(),
            fps: FpsCounter::new("fingercount"),
        }
    }

    /// Runs [`Pipeline::step`] until the user asks to exit or an error occurs.
    pub fn run(&mut self) -> crate::Result<()> {
        loop {
            if let ControlFlow::Break(()) = self.step()? {
                log::info!("exit requested");
                return Ok(());
            }
        }
    }

    /// Processes a single frame.
    ///
    /// Returns [`ControlFlow::Break`] when the user asked to exit after this frame was shown.
    pub fn step(&mut self) -> crate::Result<ControlFlow<(), FrameSummary>> {
        let mut image = self
            .source
            .read()
            .map_err(|e| Error::FrameRead(e.into()))?;
        if self.mirror {
            image.flip_horizontal_in_place();
        }

        let hands = self
            .detector
            .detect(&image)
            .map_err(|e| Error::Detection(e.into()))?;

        let mut summary = FrameSummary::default();
        for hand in &hands {
            let open_fingers = hand.open_fingers();
            log::trace!(
                "{} hand ({:.2}): {} open, {:?}",
                hand.handedness(),
                hand.confidence(),
                open_fingers,
                hand.finger_states(),
            );
            summary.add_hand(open_fingers);
            hand.draw(&mut image);
        }

        let fps = self.frame_rate.tick(Instant::now());
        draw_overlay(&mut image, &summary, fps);
        log::trace!("{}, {:.1} FPS", summary, fps);

        self.frontend
            .present(&image)
            .map_err(|e| Error::Display(e.into()))?;
        self.fps
            .tick_with(self.source.timers().into_iter().chain(self.detector.timers()));

        if self.frontend.exit_requested() {
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(summary))
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }
}

/// Draws the frame totals and the frame rate in the top left corner of `image`.
pub fn draw_overlay(image: &mut Image, summary: &FrameSummary, fps: f32) {
    let summary = summary.to_string();
    draw::text(image, 10, 30, &summary)
        .large()
        .align_left()
        .align_bottom()
        .color(Color::GREEN);

    let fps = fps_text(fps);
    draw::text(image, 10, 70, &fps)
        .large()
        .align_left()
        .align_bottom()
        .color(Color::BLUE);
}
