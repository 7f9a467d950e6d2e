use fingercount::config::Config;
use fingercount::gui::Window;
use fingercount::hand::tracking::HandLandmarker;
use fingercount::pipeline::Pipeline;
use fingercount::video::webcam::{Webcam, WebcamOptions};

fn main() -> anyhow::Result<()> {
    fingercount::init_logger!();

    let config = Config::default();

    let webcam = match Webcam::open(
        WebcamOptions::default()
            .index(config.get_camera_index())
            .fps(30),
    ) {
        Ok(webcam) => webcam,
        Err(e) => {
            log::error!("{:#}", anyhow::Error::from(e));
            return Ok(());
        }
    };

    let detector = match HandLandmarker::new(config.detector_options()) {
        Ok(detector) => detector,
        Err(e) => {
            log::error!("{:#}", anyhow::Error::from(e));
            return Ok(());
        }
    };

    let window = Window::new(&config);
    let mut pipeline = Pipeline::new(&config, webcam, detector, window);
    if let Err(e) = pipeline.run() {
        log::error!("{:#}", anyhow::Error::from(e));
    }

    Ok(())
}
