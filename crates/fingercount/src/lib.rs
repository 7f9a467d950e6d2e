//! Webcam hand tracking that counts how many fingers are held up.
//!
//! Every frame is passed to a [`HandDetector`], each detected hand is classified with
//! [`hand::fingers::classify`], and the per-frame totals are drawn on top of the video together
//! with a frame rate estimate.
//!
//! # Coordinates
//!
//! Landmarks produced by the detector are *normalized*: X and Y are fractions of the frame's
//! width and height, with X pointing right and Y pointing *down*. A smaller Y value means the
//! landmark is higher up in the image.
//!
//! # Environment Variables
//!
//! * `RUST_LOG`: overrides the log filter installed by [`init_logger!`].
//!
//! [`HandDetector`]: detector::HandDetector

use log::LevelFilter;

pub mod config;
pub mod detection;
pub mod detector;
mod error;
pub mod gui;
pub mod hand;
pub mod image;
pub mod nn;
pub mod num;
pub mod pipeline;
pub mod timer;
pub mod video;

pub use error::{Error, Result};

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("tract_core"), LevelFilter::Warn)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and `fingercount` will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// `tract` will always log at *warn* level.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
