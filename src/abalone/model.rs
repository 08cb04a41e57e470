use std::collections::BTreeMap;

use crate::estimator::{EvalMetricOp, MetricKind, Mode, ModelFn, ModelFnOps};
use burn::{
    nn::{
        loss::{MseLoss, Reduction::Mean},
        Linear, LinearConfig, Relu,
    },
    prelude::*,
};

/// Key of the predicted age in [ModelFnOps::predictions].
pub const AGES: &str = "ages";

#[derive(Module, Debug)]
pub struct AbaloneModel<B: Backend> {
    first_hidden_layer: Linear<B>,
    second_hidden_layer: Linear<B>,
    output_layer: Linear<B>,
    activation: Relu,
}

#[derive(Config, Debug)]
pub struct AbaloneModelConfig {
    #[config(default = 7)]
    pub num_features: usize,

    #[config(default = 10)]
    pub hidden_size: usize,
}

impl AbaloneModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AbaloneModel<B> {
        let first_hidden_layer = LinearConfig::new(self.num_features, self.hidden_size)
            .with_bias(true)
            .init(device);
        let second_hidden_layer = LinearConfig::new(self.hidden_size, self.hidden_size)
            .with_bias(true)
            .init(device);
        let output_layer = LinearConfig::new(self.hidden_size, 1)
            .with_bias(true)
            .init(device);

        AbaloneModel {
            first_hidden_layer,
            second_hidden_layer,
            output_layer,
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> AbaloneModel<B> {
    /// # Shapes
    /// - features: `[batch_size, num_features]`
    /// - output: `[batch_size]`
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 1> {
        let [batch_size, _] = features.dims();

        let x = self.first_hidden_layer.forward(features);
        let x = self.activation.forward(x);
        let x = self.second_hidden_layer.forward(x);
        let x = self.activation.forward(x);
        let x = self.output_layer.forward(x);

        x.reshape([batch_size])
    }
}

impl<B: Backend> ModelFn<B> for AbaloneModel<B> {
    fn model_fn(
        &self,
        features: Tensor<B, 2>,
        targets: Option<Tensor<B, 1>>,
        mode: Mode,
    ) -> ModelFnOps<B> {
        let predictions = self.forward(features);
        let ops = ModelFnOps::new(BTreeMap::from([(AGES, predictions.clone())]));

        let Some(targets) = targets else {
            return ops;
        };

        let loss = MseLoss::new().forward(predictions.clone(), targets.clone(), Mean);
        let ops = ops.with_loss(loss);

        match mode {
            Mode::Eval => ops.with_eval_metric_op(EvalMetricOp::new(
                "rmse",
                MetricKind::RootMeanSquaredError,
                targets,
                predictions,
            )),
            Mode::Train | Mode::Infer => ops,
        }
    }
}
