//! Network graph construction.
//!
//! The classifier is rebuilt layer by layer from fixed hyperparameters
//! instead of deserializing the training-time graph: the serialized form
//! embeds an input-scaling node that does not deserialize reliably across
//! environments. That node is omitted here; `preprocess` applies the
//! equivalent transform before the forward pass.
//!
//! Construction goes through `VarBuilder` namespaces (`backbone.*`,
//! `head.*`) so the same builder serves both weight-bound and
//! randomly-initialized instantiation.

use candle_core::{D, Tensor};
use candle_nn::ops::softmax;
use candle_nn::{
    BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig, Dropout, Linear, Module, ModuleT,
    VarBuilder, batch_norm, conv2d_no_bias, linear,
};
use serde::Deserialize;

/// Input edge length expected by the backbone.
pub const IMAGE_SIZE: usize = 224;

/// Channel width of the backbone's final feature map.
const FEATURE_DIM: usize = 1280;

/// BatchNorm epsilon used by the training framework.
const BN_EPS: f64 = 1e-3;

/// Inverted-residual plan: (expansion, output channels, repeats, stride).
const INVERTED_RESIDUAL_PLAN: [(usize, usize, usize, usize); 7] = [
    (1, 16, 1, 1),
    (6, 24, 2, 2),
    (6, 32, 3, 2),
    (6, 64, 4, 2),
    (6, 96, 3, 1),
    (6, 160, 3, 2),
    (6, 320, 1, 1),
];

/// Structural configuration carried inside the model bundle.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub input_size: (usize, usize),
    pub hidden_units: usize,
    pub dropout: f32,
    pub num_classes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            input_size: (IMAGE_SIZE, IMAGE_SIZE),
            hidden_units: 128,
            dropout: 0.2,
            num_classes: 4,
        }
    }
}

fn relu6(xs: &Tensor) -> candle_core::Result<Tensor> {
    xs.clamp(0f32, 6f32)
}

/// Convolution + BatchNorm, optionally followed by ReLU6.
struct ConvBn {
    conv: Conv2d,
    bn: BatchNorm,
    // Training-framework 'same' semantics: strided convs over even inputs
    // pad bottom/right only.
    asym_pad: bool,
    act: bool,
}

impl ConvBn {
    fn new(
        vb: VarBuilder,
        in_c: usize,
        out_c: usize,
        ksize: usize,
        stride: usize,
        groups: usize,
        act: bool,
    ) -> candle_core::Result<Self> {
        let asym_pad = stride > 1 && ksize > 1;
        let cfg = Conv2dConfig {
            stride,
            padding: if asym_pad { 0 } else { ksize / 2 },
            groups,
            ..Default::default()
        };
        let conv = conv2d_no_bias(in_c, out_c, ksize, cfg, vb.pp("conv"))?;
        let bn = batch_norm(
            out_c,
            BatchNormConfig {
                eps: BN_EPS,
                ..Default::default()
            },
            vb.pp("bn"),
        )?;
        Ok(Self {
            conv,
            bn,
            asym_pad,
            act,
        })
    }
}

impl Module for ConvBn {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = if self.asym_pad {
            xs.pad_with_zeros(2, 0, 1)?.pad_with_zeros(3, 0, 1)?
        } else {
            xs.clone()
        };
        let xs = self.bn.forward_t(&self.conv.forward(&xs)?, false)?;
        if self.act { relu6(&xs) } else { Ok(xs) }
    }
}

/// MobileNetV2 inverted-residual block: pointwise expand, depthwise,
/// pointwise project (linear), with a residual when shapes allow.
struct InvertedResidual {
    expand: Option<ConvBn>,
    depthwise: ConvBn,
    project: ConvBn,
    residual: bool,
}

impl InvertedResidual {
    fn new(
        vb: VarBuilder,
        in_c: usize,
        out_c: usize,
        stride: usize,
        expand_ratio: usize,
    ) -> candle_core::Result<Self> {
        let hidden = in_c * expand_ratio;
        let expand = if expand_ratio != 1 {
            Some(ConvBn::new(vb.pp("expand"), in_c, hidden, 1, 1, 1, true)?)
        } else {
            None
        };
        let depthwise = ConvBn::new(vb.pp("depthwise"), hidden, hidden, 3, stride, hidden, true)?;
        let project = ConvBn::new(vb.pp("project"), hidden, out_c, 1, 1, 1, false)?;
        Ok(Self {
            expand,
            depthwise,
            project,
            residual: stride == 1 && in_c == out_c,
        })
    }
}

impl Module for InvertedResidual {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut ys = match &self.expand {
            Some(expand) => expand.forward(xs)?,
            None => xs.clone(),
        };
        ys = self.depthwise.forward(&ys)?;
        ys = self.project.forward(&ys)?;
        if self.residual { xs + ys } else { Ok(ys) }
    }
}

/// The frozen feature extractor: stem, 17 inverted-residual blocks, and the
/// 1280-channel top convolution. Parameters are never updated here; the
/// graph exists purely for forward inference.
pub struct MobileNetV2 {
    stem: ConvBn,
    blocks: Vec<InvertedResidual>,
    top: ConvBn,
}

impl MobileNetV2 {
    pub fn new(vb: VarBuilder) -> candle_core::Result<Self> {
        let stem = ConvBn::new(vb.pp("stem"), 3, 32, 3, 2, 1, true)?;

        let mut blocks = Vec::new();
        let mut in_c = 32;
        let mut idx = 0usize;
        for &(expand_ratio, out_c, repeats, first_stride) in INVERTED_RESIDUAL_PLAN.iter() {
            for i in 0..repeats {
                let stride = if i == 0 { first_stride } else { 1 };
                blocks.push(InvertedResidual::new(
                    vb.pp(format!("block{idx}")),
                    in_c,
                    out_c,
                    stride,
                    expand_ratio,
                )?);
                in_c = out_c;
                idx += 1;
            }
        }

        let top = ConvBn::new(vb.pp("top"), in_c, FEATURE_DIM, 1, 1, 1, true)?;

        Ok(Self { stem, blocks, top })
    }
}

impl Module for MobileNetV2 {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut ys = self.stem.forward(xs)?;
        for block in &self.blocks {
            ys = block.forward(&ys)?;
        }
        self.top.forward(&ys)
    }
}

/// The full classifier: frozen backbone, global average pooling, and the
/// small trainable head (dense 128/ReLU, dropout, dense softmax).
pub struct InsectNet {
    backbone: MobileNetV2,
    fc1: Linear,
    fc2: Linear,
    dropout: Dropout,
    num_classes: usize,
}

impl InsectNet {
    /// Construct the graph. `backbone_vb` and `head_vb` are separate so the
    /// fallback path can bind the two regions from different sources.
    pub fn new(
        config: &NetworkConfig,
        backbone_vb: VarBuilder,
        head_vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        Ok(Self {
            backbone: MobileNetV2::new(backbone_vb)?,
            fc1: linear(FEATURE_DIM, config.hidden_units, head_vb.pp("fc1"))?,
            fc2: linear(config.hidden_units, config.num_classes, head_vb.pp("fc2"))?,
            dropout: Dropout::new(config.dropout),
            num_classes: config.num_classes,
        })
    }

    pub fn output_dim(&self) -> usize {
        self.num_classes
    }

    /// Forward pass: NHWC input of shape (batch, 224, 224, 3), already
    /// scaled to [-1, 1]. Returns a softmax probability distribution of
    /// shape (batch, num_classes).
    pub fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = xs.permute((0, 3, 1, 2))?.contiguous()?;
        let feats = self.backbone.forward(&xs)?;
        let pooled = feats.mean(D::Minus1)?.mean(D::Minus1)?;
        let xs = self.fc1.forward(&pooled)?.relu()?;
        // Dropout is a no-op at inference time; kept so the head mirrors the
        // trained topology.
        let xs = self.dropout.forward_t(&xs, false)?;
        let logits = self.fc2.forward(&xs)?;
        softmax(&logits, D::Minus1)
    }
}
