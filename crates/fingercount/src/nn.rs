//! Neural Network inference.

use std::{
    ops::RangeInclusive,
    path::Path,
    sync::Arc,
};

use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, Tensor, TypedFact,
    TypedOp,
};

use crate::image::{Color, Image, Resolution, RotatedRect, Vec2f};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let model_data = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("failed to read '{}': {}", path.display(), e))?;
        Self::from_onnx(&model_data)
    }

    /// Loads and optimizes a pre-trained model from an in-memory ONNX file.
    ///
    /// Returns an error if the network data is malformed, if the network data is incomplete, or if
    /// the network uses unimplemented operations.
    pub fn from_onnx(raw: &[u8]) -> anyhow::Result<Self> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*raw)?
            .into_optimized()?;
        let model = SimplePlan::new(graph)?;
        Ok(Self(Arc::new(model)))
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.0.model().inputs.len()
    }

    /// Returns the concrete shape of input `index`.
    pub fn input_shape(&self, index: usize) -> anyhow::Result<&[usize]> {
        let fact = self.0.model().input_fact(index)?;
        fact.shape
            .as_concrete()
            .ok_or_else(|| anyhow::anyhow!("network input {} has a symbolic shape", index))
    }

    /// Runs the network on a set of input tensors, returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, inputs: TVec<Tensor>) -> anyhow::Result<Outputs> {
        let inner = self.0.run(
            inputs
                .into_iter()
                .map(|t| TValue::from_const(Arc::new(t)))
                .collect(),
        )?;
        Ok(Outputs { inner })
    }
}

/// A convolutional neural network (CNN) that operates on image data in `NCHW` layout.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    color_mapper: ColorMapper,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input of shape `[1, 3, H, W]`.
    pub fn new(nn: NeuralNetwork, color_mapper: ColorMapper) -> anyhow::Result<Self> {
        if nn.num_inputs() != 1 {
            anyhow::bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                nn.num_inputs(),
            );
        }

        let (w, h) = match nn.input_shape(0)? {
            &[1, 3, h, w] => (w, h),
            shape => anyhow::bail!("invalid model input shape for NCHW CNN: {:?}", shape),
        };
        let input_res = Resolution::new(w.try_into()?, h.try_into()?);

        Ok(Self {
            nn,
            input_res,
            color_mapper,
        })
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on the part of `image` covered by `roi`.
    ///
    /// `roi` is sampled (nearest neighbor) into the network's input resolution, so it is
    /// stretched if its aspect ratio differs from the network's. Parts of `roi` outside of `image`
    /// are black.
    pub fn estimate(&self, image: &Image, roi: &RotatedRect) -> anyhow::Result<Outputs> {
        let tensor = self.sample(image, roi)?;
        self.nn.estimate(tvec![tensor])
    }

    fn sample(&self, image: &Image, roi: &RotatedRect) -> anyhow::Result<Tensor> {
        let (w, h) = (
            self.input_res.width() as usize,
            self.input_res.height() as usize,
        );
        let step = Vec2f::new(
            roi.rect().width() / w as f32,
            roi.rect().height() / h as f32,
        );

        let mut data = vec![0.0f32; 3 * w * h];
        for y in 0..h {
            for x in 0..w {
                let local = Vec2f::new((x as f32 + 0.5) * step.x, (y as f32 + 0.5) * step.y);
                let pos = roi.transform_out(local);
                let color = image.get_or_null(pos.x.floor() as i64, pos.y.floor() as i64);
                let rgb = self.color_mapper.map(color);
                for (c, value) in rgb.into_iter().enumerate() {
                    data[c * w * h + y * w + x] = value;
                }
            }
        }

        Ok(Tensor::from_shape(&[1, 3, h, w], &data)?)
    }
}

/// Maps 8-bit colors to the value range a network expects.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    target_range: RangeInclusive<f32>,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        assert!(target_range.end() > target_range.start());
        Self { target_range }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        let start = *self.target_range.start();
        let end = *self.target_range.end();

        let adjust_range = (end - start) / 255.0;
        [color.r(), color.g(), color.b()].map(|col| col as f32 * adjust_range + start)
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<TValue>,
}

impl Outputs {
    /// Returns output `index` as a flat `f32` slice, checking its element count.
    pub fn f32_slice(&self, index: usize, expected_len: usize) -> anyhow::Result<&[f32]> {
        let tensor = self
            .inner
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("network has no output {}", index))?;
        let slice = tensor.as_slice::<f32>()?;
        anyhow::ensure!(
            slice.len() == expected_len,
            "output {} has shape {:?}, expected {} elements",
            index,
            tensor.shape(),
            expected_len,
        );
        Ok(slice)
    }
}
