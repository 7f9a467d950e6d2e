//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::cmp::Reverse;

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::error::Error;
use crate::image::{Image, Resolution};
use crate::timer::Timer;

use super::FrameSource;

/// Indicates whether to prefer a higher resolution or frame rate.
///
/// By default, [`ParamPreference::Resolution`] is used, selecting the maximum resolution at the
/// desired frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ParamPreference {
    /// Prefer increased resolution over higher frame rates.
    #[default]
    Resolution,
    /// Prefer higher frame rate over higher image resolution.
    Framerate,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Device selection and format negotiation options.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WebcamOptions {
    index: usize,
    frame: FramePrefs,
}

impl WebcamOptions {
    /// Selects the `index`-th supported webcam, counting from 0.
    ///
    /// Devices that cannot capture JPEG frames are skipped and not counted.
    #[inline]
    pub fn index(self, index: usize) -> Self {
        Self { index, ..self }
    }

    /// Sets the desired image resolution.
    ///
    /// A lower resolution might be selected if the webcam cannot deliver the desired resolution.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the desired frame rate.
    ///
    /// A lower frame rate might be selected if the webcam cannot deliver the desired frame rate.
    #[inline]
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Selects whether to prefer a higher resolution or frame rate.
    ///
    /// When the camera cannot deliver the desired frame rate or resolution, this parameter controls
    /// which one will be maintained.
    #[inline]
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }
}

#[derive(Clone, Copy)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

fn jpeg_format(device: &Device) -> anyhow::Result<Option<Pixelformat>> {
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixelformat() == Pixelformat::JPEG || format.pixelformat() == Pixelformat::MJPG {
            return Ok(Some(format.pixelformat()));
        }
    }
    Ok(None)
}

fn negotiate_format(
    device: &Device,
    pixel_format: Pixelformat,
    mut prefs: FramePrefs,
) -> anyhow::Result<(PixFormat, Fract)> {
    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                for rate in intervals {
                    formats.push(FrameFormat {
                        resolution: Resolution::new(size.width(), size.height()),
                        frame_interval: *rate.fract(),
                    });
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    loop {
        if let Some(fmt) = negotiate_format_step(&formats, prefs) {
            return Ok((
                PixFormat::new(
                    fmt.resolution.width(),
                    fmt.resolution.height(),
                    pixel_format,
                ),
                fmt.frame_interval,
            ));
        }

        log::debug!("failed to negotiate format with prefs {:?}", prefs);
        match prefs.pref {
            ParamPreference::Resolution => {
                if prefs.resolution.take().is_none() && prefs.fps.take().is_none() {
                    break;
                }
            }
            ParamPreference::Framerate => {
                if prefs.fps.take().is_none() && prefs.resolution.take().is_none() {
                    break;
                }
            }
        }
        log::debug!("retrying with new prefs {:?}", prefs);
    }

    bail!("failed to negotiate a webcam format")
}

fn negotiate_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let mut formats = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs.fps.map_or(true, |fps| {
                (1.0 / fmt.frame_interval.as_f32()).round() >= fps as f32
            })
        })
        .copied()
        .collect::<Vec<_>>();
    match prefs.pref {
        ParamPreference::Resolution => {
            formats.sort_by_key(|fmt| (fmt.resolution.num_pixels(), Reverse(fmt.frame_interval)))
        }
        ParamPreference::Framerate => {
            formats.sort_by_key(|fmt| (Reverse(fmt.frame_interval), fmt.resolution.num_pixels()))
        }
    }
    formats.last().copied()
}

/// A webcam yielding a stream of [`Image`]s.
///
/// The capture stream is released when the [`Webcam`] is dropped.
pub struct Webcam {
    stream: ReadStream,
    name: String,
    width: u32,
    height: u32,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the webcam selected by `options`.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: WebcamOptions) -> crate::Result<Self> {
        Self::open_impl(&options).map_err(|e| Error::source_unavailable(options.index, e))
    }

    fn open_impl(options: &WebcamOptions) -> anyhow::Result<Self> {
        let mut remaining = options.index;
        for res in linuxvideo::list()? {
            let dev = match res {
                Ok(dev) => dev,
                Err(e) => {
                    log::warn!("{}", e);
                    continue;
                }
            };
            match Self::probe(&dev) {
                Ok(Some(pixel_format)) if remaining == 0 => {
                    return Self::start(dev, pixel_format, options);
                }
                Ok(Some(_)) => remaining -= 1,
                Ok(None) => {}
                Err(e) => log::debug!("{}", e),
            }
        }

        bail!(
            "found only {} supported webcam device(s)",
            options.index - remaining
        )
    }

    /// Returns the JPEG pixel format if `dev` is a supported capture device.
    fn probe(dev: &Device) -> anyhow::Result<Option<Pixelformat>> {
        let caps = dev.capabilities()?;
        let cap_flags = caps.device_capabilities();
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            dev.path()?.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }
        jpeg_format(dev)
    }

    fn start(dev: Device, pixel_format: Pixelformat, options: &WebcamOptions) -> anyhow::Result<Self> {
        let caps = dev.capabilities()?;
        let path = dev.path()?;
        let (pixfmt, fract) = negotiate_format(&dev, pixel_format, options.frame)?;

        let capture = dev.video_capture(pixfmt)?;

        let format = capture.format();
        let width = format.width();
        let height = format.height();

        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {}x{} @ {:.1}Hz",
            caps.card(),
            path.display(),
            width,
            height,
            1.0 / actual.as_f32(),
        );

        let stream = capture.into_stream(2)?;

        Ok(Self {
            stream,
            name: caps.card().to_string(),
            width,
            height,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        })
    }

}

impl FrameSource for Webcam {
    /// Reads the next frame from the camera.
    ///
    /// If no frame is available, this method will block until one is. Frames with corrupted JPEG
    /// data are logged and replaced with a blank image.
    fn read(&mut self) -> anyhow::Result<Image> {
        let dequeue_guard = self.t_dequeue.start();
        let (width, height) = (self.width, self.height);
        let t_decode = &self.t_decode;
        self.stream
            .dequeue(|buf| {
                drop(dequeue_guard);
                let image = match t_decode.time(|| Image::decode_jpeg(&buf)) {
                    Ok(image) => image,
                    Err(e) => {
                        // Even good webcams produce the occasional corrupted MJPG frame. Skipping
                        // it would cause a latency spike, so hand back a blank image instead.
                        log::error!("webcam decode error: {}", e);
                        Image::new(width, height)
                    }
                };
                Ok(image)
            })
            .map_err(Into::into)
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        log::debug!("releasing webcam {}", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options() {
        let options = WebcamOptions::default()
            .index(1)
            .resolution(Resolution::new(640, 480))
            .fps(30)
            .prefer(ParamPreference::Framerate);
        assert_eq!(options.index, 1);
        assert_eq!(
            options.frame,
            FramePrefs {
                resolution: Some(Resolution::new(640, 480)),
                fps: Some(30),
                pref: ParamPreference::Framerate,
            }
        );
        assert_eq!(WebcamOptions::default().frame.pref, ParamPreference::Resolution);
    }

    #[test]
    fn nonexistent_device_index() {
        match Webcam::open(WebcamOptions::default().index(usize::MAX)) {
            Err(Error::SourceUnavailable { index, .. }) => assert_eq!(index, usize::MAX),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("opened a webcam with index usize::MAX"),
        }
    }
}
