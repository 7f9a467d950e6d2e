//! A simple window for displaying annotated frames.

use minifb::{Key, WindowOptions};

use crate::config::Config;
use crate::image::{Image, Resolution};

/// A sink for finished frames that can also ask the frame loop to stop.
pub trait Frontend {
    /// Displays `image`, replacing the previous frame.
    fn present(&mut self, image: &Image) -> anyhow::Result<()>;

    /// Polls user input without blocking and returns whether the user asked to quit.
    fn exit_requested(&mut self) -> bool;
}

impl<F: Frontend + ?Sized> Frontend for Box<F> {
    fn present(&mut self, image: &Image) -> anyhow::Result<()> {
        (**self).present(image)
    }

    fn exit_requested(&mut self) -> bool {
        (**self).exit_requested()
    }
}

/// A desktop window showing the most recent frame.
///
/// The native window is opened on the first call to [`Frontend::present`], sized to that frame,
/// and reopened if the frame size changes. It is closed when the [`Window`] is dropped.
pub struct Window {
    title: String,
    exit_key: Option<Key>,
    win: Option<minifb::Window>,
    res: Resolution,
    buf: Vec<u32>,
}

impl Window {
    /// Input is polled at up to this rate, so a poll blocks for at most ~1 ms.
    const POLL_RATE: usize = 1000;

    pub fn new(config: &Config) -> Self {
        let exit_key = key_for_char(config.get_exit_key());
        if exit_key.is_none() {
            log::warn!(
                "exit key '{}' cannot be polled, close the window to exit",
                config.get_exit_key()
            );
        }

        Self {
            title: config.get_window_title().to_string(),
            exit_key,
            win: None,
            res: Resolution::new(0, 0),
            buf: Vec::new(),
        }
    }

    fn open(&mut self, res: Resolution) -> anyhow::Result<()> {
        let mut win = minifb::Window::new(
            &self.title,
            res.width() as usize,
            res.height() as usize,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;
        win.set_target_fps(Self::POLL_RATE);
        log::debug!("opened window '{}' at {}", self.title, res);

        self.res = res;
        self.win = Some(win);
        Ok(())
    }
}

impl Frontend for Window {
    fn present(&mut self, image: &Image) -> anyhow::Result<()> {
        let res = image.resolution();
        self.buf.clear();
        self.buf.extend(
            image
                .data()
                .chunks_exact(4)
                .map(|rgba| u32::from_be_bytes([0, rgba[0], rgba[1], rgba[2]])),
        );

        if self.win.is_none() || self.res != res {
            self.open(res)?;
        }
        if let Some(win) = &mut self.win {
            win.update_with_buffer(&self.buf, res.width() as usize, res.height() as usize)?;
        }
        Ok(())
    }

    fn exit_requested(&mut self) -> bool {
        let Some(win) = &self.win else {
            return false;
        };
        !win.is_open() || self.exit_key.map_or(false, |key| win.is_key_down(key))
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        if self.win.take().is_some() {
            log::debug!("closed window '{}'", self.title);
        }
    }
}

/// Maps an ASCII letter or digit to the key that produces it.
fn key_for_char(c: char) -> Option<Key> {
    const LETTERS: [Key; 26] = [
        Key::A,
        Key::B,
        Key::C,
        Key::D,
        Key::E,
        Key::F,
        Key::G,
        Key::H,
        Key::I,
        Key::J,
        Key::K,
        Key::L,
        Key::M,
        Key::N,
        Key::O,
        Key::P,
        Key::Q,
        Key::R,
        Key::S,
        Key::T,
        Key::U,
        Key::V,
        Key::W,
        Key::X,
        Key::Y,
        Key::Z,
    ];
    const DIGITS: [Key; 10] = [
        Key::Key0,
        Key::Key1,
        Key::Key2,
        Key::Key3,
        Key::Key4,
        Key::Key5,
        Key::Key6,
        Key::Key7,
        Key::Key8,
        Key::Key9,
    ];

    match c.to_ascii_lowercase() {
        c @ 'a'..='z' => Some(LETTERS[c as usize - 'a' as usize]),
        c @ '0'..='9' => Some(DIGITS[c as usize - '0' as usize]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_keys() {
        assert_eq!(key_for_char('q'), Some(Key::Q));
        assert_eq!(key_for_char('Q'), Some(Key::Q));
        assert_eq!(key_for_char('a'), Some(Key::A));
        assert_eq!(key_for_char('z'), Some(Key::Z));
        assert_eq!(key_for_char('7'), Some(Key::Key7));
        assert_eq!(key_for_char('%'), None);
        assert_eq!(key_for_char('ä'), None);
    }

    #[test]
    fn no_exit_before_first_frame() {
        let mut window = Window::new(&Config::default());
        assert!(!window.exit_requested());
    }
}
