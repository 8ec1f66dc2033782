//! CNN Model Architecture for Image Classification
//!
//! A stack of conv stages, each halving the spatial size and doubling the width, followed
//! by global average pooling and a small dense head. With the default four stages a
//! 128×128 input reaches the head as an 8×8 map of `8 * base_filters` channels.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
    },
    tensor::{activation, backend::Backend, Tensor},
};

/// Configuration for the AnimalClassifier CNN model
#[derive(Config, Debug)]
pub struct AnimalClassifierConfig {
    /// Number of output classes (must match the labels file)
    pub num_classes: usize,

    /// Input image size (assumes square images)
    #[config(default = "128")]
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Filters of the first stage; every later stage doubles it
    #[config(default = "32")]
    pub base_filters: usize,

    /// Number of conv stages
    #[config(default = "4")]
    pub num_stages: usize,

    /// Width of the hidden dense layer
    #[config(default = "256")]
    pub hidden_units: usize,

    /// Dropout before the output layer (inactive at inference)
    #[config(default = "0.3")]
    pub dropout_rate: f64,
}

impl AnimalClassifierConfig {
    /// Channels produced by the last conv stage
    pub fn feature_width(&self) -> usize {
        self.base_filters << self.num_stages.saturating_sub(1)
    }

    /// Build a freshly initialized model
    pub fn init<B: Backend>(&self, device: &B::Device) -> AnimalClassifier<B> {
        let mut stages = Vec::with_capacity(self.num_stages);
        let mut channels = self.in_channels;
        for idx in 0..self.num_stages {
            let width = self.base_filters << idx;
            stages.push(ConvStage::new(channels, width, device));
            channels = width;
        }

        AnimalClassifier {
            stages,
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            hidden: LinearConfig::new(self.feature_width(), self.hidden_units).init(device),
            dropout: DropoutConfig::new(self.dropout_rate).init(),
            output: LinearConfig::new(self.hidden_units, self.num_classes).init(device),
        }
    }
}

/// 3×3 conv, batch norm, ReLU, 2×2 max pool
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
    pool: MaxPool2d,
}

impl<B: Backend> ConvStage<B> {
    fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new([in_channels, out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            norm: BatchNormConfig::new(out_channels).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.norm.forward(self.conv.forward(x));
        self.pool.forward(activation::relu(x))
    }
}

/// Image classifier CNN
#[derive(Module, Debug)]
pub struct AnimalClassifier<B: Backend> {
    stages: Vec<ConvStage<B>>,
    pool: AdaptiveAvgPool2d,
    hidden: Linear<B>,
    dropout: Dropout,
    output: Linear<B>,
}

impl<B: Backend> AnimalClassifier<B> {
    /// Logits of shape `[batch, num_classes]` for an NCHW input
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self
            .stages
            .iter()
            .fold(x, |x, stage| stage.forward(x));

        // [B, C, 1, 1] -> [B, C]
        let pooled: Tensor<B, 2> = self.pool.forward(features).flatten(1, 3);

        let hidden = activation::relu(self.hidden.forward(pooled));
        self.output.forward(self.dropout.forward(hidden))
    }

    /// Class probabilities, rows sum to one
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        activation::softmax(self.forward(x), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.output.weight.dims()[1]
    }

    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }
}
