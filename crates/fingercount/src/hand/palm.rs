//! Palm detection.

use std::path::Path;

use crate::detection::{
    nms::NonMaxSuppression,
    ssd::{Anchor, Anchors, LayerInfo},
    Detection, Keypoint,
};
use crate::image::{Image, Rect, Resolution, RotatedRect, Vec2f};
use crate::nn::{Cnn, ColorMapper, NeuralNetwork};
use crate::num::sigmoid;
use crate::timer::Timer;

use super::landmark::hand_rotation;

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalmKeypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;
/// Box center, box size, and 7 keypoints.
const BOX_PARAMS: usize = 4 + NUM_KEYPOINTS * 2;

/// Detects palms in full frames.
///
/// Palms are much easier to detect than entire hands, since they are rigid and roughly square.
/// The resulting [`Detection`]s are used to compute the region the landmark network looks at
/// (see [`hand_roi`]).
pub struct PalmDetector {
    cnn: Cnn,
    anchors: Anchors,
    nms: NonMaxSuppression,
    thresh: f32,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
}

impl PalmDetector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    /// Loads the palm detection network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let cnn = Cnn::new(
            NeuralNetwork::from_path(path)?,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self {
            cnn,
            anchors: Anchors::calculate(&[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)]),
            nms: NonMaxSuppression::new(),
            thresh: Self::DEFAULT_THRESHOLD,
            t_infer: Timer::new("palm"),
            t_extract: Timer::new("extract"),
            t_nms: Timer::new("nms"),
        })
    }

    pub fn input_resolution(&self) -> Resolution {
        self.cnn.input_resolution()
    }

    /// Sets the minimum detection confidence.
    #[inline]
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    /// Detects palms in `image`.
    ///
    /// The returned detections are in `image`'s pixel coordinates, ordered by descending
    /// confidence.
    pub fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<Detection>> {
        let input_res = self.input_resolution();
        let aspect = input_res.width() as f32 / input_res.height() as f32;

        // Letterbox the image so that its aspect ratio matches the network's input.
        let rect = image.rect().grow_to_fit_aspect(aspect);
        let outputs = self
            .t_infer
            .time(|| self.cnn.estimate(image, &RotatedRect::from(rect)))?;

        let mut detections = self.t_extract.time(|| self.extract(&outputs))?;
        log::trace!("{} raw palm detections", detections.len());
        let mut detections = self.t_nms.time(|| self.nms.process(&mut detections));

        // Map all coordinates from the network's input coordinate system back into the image.
        let scale = rect.width() / input_res.width() as f32;
        for det in &mut detections {
            det.map_positions(scale, |p| rect.top_left() + p * scale);
        }

        Ok(detections)
    }

    fn extract(&self, outputs: &crate::nn::Outputs) -> anyhow::Result<Vec<Detection>> {
        let num_anchors = self.anchors.anchor_count();
        let boxes = outputs.f32_slice(0, num_anchors * BOX_PARAMS)?;
        let scores = outputs.f32_slice(1, num_anchors)?;

        let input_res = self.input_resolution();
        let mut detections = Vec::new();
        for (index, &raw_score) in scores.iter().enumerate() {
            let confidence = sigmoid(raw_score);
            if confidence < self.thresh {
                continue;
            }

            let params = &boxes[index * BOX_PARAMS..][..BOX_PARAMS];
            detections.push(extract_detection(
                &self.anchors[index],
                input_res,
                params,
                confidence,
            ));
        }

        Ok(detections)
    }

    pub fn timers(&self) -> [&Timer; 3] {
        [&self.t_infer, &self.t_extract, &self.t_nms]
    }
}

fn extract_detection(
    anchor: &Anchor,
    input_res: Resolution,
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    let anchor_pos = Vec2f::new(
        anchor.x_center() * input_res.width() as f32,
        anchor.y_center() * input_res.height() as f32,
    );

    let center = anchor_pos + Vec2f::new(box_params[0], box_params[1]);
    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|xy| Keypoint::new(xy[0] + anchor_pos.x, xy[1] + anchor_pos.y))
        .collect();

    let mut det = Detection::with_keypoints(
        confidence,
        Rect::from_center(center.x, center.y, box_params[2], box_params[3]),
        keypoints,
    );
    det.set_angle(palm_rotation(&det));
    det
}

fn palm_rotation(det: &Detection) -> f32 {
    let kp = det.keypoints();
    hand_rotation(
        kp[PalmKeypoint::Wrist as usize].position(),
        kp[PalmKeypoint::MiddleFingerMcp as usize].position(),
    )
}

/// Computes the region of interest for landmark estimation from a palm detection.
///
/// The palm rectangle is rotated so that the fingers point up, moved towards the fingers, and
/// enlarged to cover the entire hand.
pub fn hand_roi(palm: &Detection) -> RotatedRect {
    RotatedRect::new(palm.bounding_rect(), palm.angle())
        .shift_rel(Vec2f::new(0.0, -0.5))
        .map(|rect| rect.to_square().scale(2.6))
}
