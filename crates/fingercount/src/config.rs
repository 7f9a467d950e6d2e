//! Runtime configuration.

use crate::detector::DetectorOptions;

/// Settings for the finger counter, passed to the pipeline and its collaborators at construction.
///
/// Start from [`Config::default`] and adjust fields with the builder methods.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    camera_index: usize,
    mirror: bool,
    window_title: String,
    exit_key: char,
    detector: DetectorOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_index: 0,
            mirror: true,
            window_title: "Hand & Finger Counter".into(),
            exit_key: 'q',
            detector: DetectorOptions::default(),
        }
    }
}

impl Config {
    /// Selects the video capture device, counting only devices that can deliver JPEG frames.
    #[inline]
    pub fn camera_index(self, camera_index: usize) -> Self {
        Self {
            camera_index,
            ..self
        }
    }

    /// Sets whether frames are flipped horizontally before detection, so the display acts like a
    /// mirror.
    #[inline]
    pub fn mirror(self, mirror: bool) -> Self {
        Self { mirror, ..self }
    }

    #[inline]
    pub fn window_title(self, title: impl Into<String>) -> Self {
        Self {
            window_title: title.into(),
            ..self
        }
    }

    /// Sets the key that closes the window. Only ASCII letters and digits can be polled.
    #[inline]
    pub fn exit_key(self, key: char) -> Self {
        Self {
            exit_key: key,
            ..self
        }
    }

    #[inline]
    pub fn detector(self, detector: DetectorOptions) -> Self {
        Self { detector, ..self }
    }

    pub fn get_camera_index(&self) -> usize {
        self.camera_index
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirror
    }

    pub fn get_window_title(&self) -> &str {
        &self.window_title
    }

    pub fn get_exit_key(&self) -> char {
        self.exit_key
    }

    pub fn detector_options(&self) -> &DetectorOptions {
        &self.detector
    }
}

#[cfg(test)]
mod tests {
    use crate::detector::RunningMode;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.get_camera_index(), 0);
        assert!(config.is_mirrored());
        assert_eq!(config.get_window_title(), "Hand & Finger Counter");
        assert_eq!(config.get_exit_key(), 'q');
        assert_eq!(config.detector_options(), &DetectorOptions::default());
    }

    #[test]
    fn builders() {
        let config = Config::default()
            .camera_index(2)
            .mirror(false)
            .window_title("test")
            .exit_key('x')
            .detector(DetectorOptions::default().running_mode(RunningMode::Static));
        assert_eq!(config.get_camera_index(), 2);
        assert!(!config.is_mirrored());
        assert_eq!(config.get_window_title(), "test");
        assert_eq!(config.get_exit_key(), 'x');
        assert_eq!(
            config.detector_options().get_running_mode(),
            RunningMode::Static
        );
    }
}
