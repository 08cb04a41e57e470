use std::collections::BTreeMap;
use std::fmt;

use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use super::checkpoint;
use super::metric::{EvalMetricOp, Mean, StreamingMetric};
use crate::error::{Error, Result};

/// The phase a [ModelFn] is called in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Train,
    Eval,
    Infer,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Train => "train",
            Mode::Eval => "eval",
            Mode::Infer => "infer",
        };
        f.write_str(name)
    }
}

/// What a [ModelFn] hands back to the [Estimator].
#[derive(Debug)]
pub struct ModelFnOps<B: Backend> {
    /// Named prediction columns, one value per input row.
    pub predictions: BTreeMap<&'static str, Tensor<B, 1>>,
    /// Required in [Mode::Train] and [Mode::Eval].
    pub loss: Option<Tensor<B, 1>>,
    pub eval_metric_ops: Vec<EvalMetricOp<B>>,
}

impl<B: Backend> ModelFnOps<B> {
    pub fn new(predictions: BTreeMap<&'static str, Tensor<B, 1>>) -> Self {
        Self {
            predictions,
            loss: None,
            eval_metric_ops: Vec::new(),
        }
    }

    pub fn with_loss(mut self, loss: Tensor<B, 1>) -> Self {
        self.loss = Some(loss);
        self
    }

    pub fn with_eval_metric_op(mut self, op: EvalMetricOp<B>) -> Self {
        self.eval_metric_ops.push(op);
        self
    }
}

/// A model the [Estimator] drives through training, evaluation and inference.
///
/// `targets` is `None` in [Mode::Infer].
pub trait ModelFn<B: Backend>: Module<B> {
    fn model_fn(
        &self,
        features: Tensor<B, 2>,
        targets: Option<Tensor<B, 1>>,
        mode: Mode,
    ) -> ModelFnOps<B>;
}

/// Source of `(features, targets)` tensors for the [Estimator].
///
/// Features are `[num_rows, num_features]`, targets are `[num_rows]`.
pub trait InputFn {
    fn input<B: Backend>(&self, device: &B::Device) -> (Tensor<B, 2>, Tensor<B, 1>);
}

/// Rows held in memory, usable as an [InputFn].
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayInput {
    features: Vec<f32>,
    targets: Vec<f32>,
    num_rows: usize,
    num_features: usize,
}

impl ArrayInput {
    /// Builds an input from feature rows. Missing targets are filled with zeros.
    pub fn new(rows: Vec<Vec<f32>>, targets: Option<Vec<f32>>) -> Result<Self> {
        let num_rows = rows.len();
        let num_features = rows.first().map(Vec::len).unwrap_or(0);

        if num_rows == 0 || num_features == 0 {
            return Err(Error::InvalidConfig("input has no rows or no features".into()));
        }
        if let Some(row) = rows.iter().position(|row| row.len() != num_features) {
            return Err(Error::InvalidConfig(format!(
                "row {row} has {} features, expected {num_features}",
                rows[row].len()
            )));
        }

        let targets = targets.unwrap_or_else(|| vec![0.0; num_rows]);
        if targets.len() != num_rows {
            return Err(Error::InvalidConfig(format!(
                "{} targets for {num_rows} rows",
                targets.len()
            )));
        }

        Ok(Self {
            features: rows.into_iter().flatten().collect(),
            targets,
            num_rows,
            num_features,
        })
    }
}

impl InputFn for ArrayInput {
    fn input<B: Backend>(&self, device: &B::Device) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let features = Tensor::<B, 1>::from_floats(self.features.as_slice(), device)
            .reshape([self.num_rows, self.num_features]);
        let targets = Tensor::<B, 1>::from_floats(self.targets.as_slice(), device);

        (features, targets)
    }
}

#[derive(Config, Debug)]
pub struct EstimatorConfig {
    #[config(default = 0.001)]
    pub learning_rate: f64,
    /// Log the training loss every this many steps.
    #[config(default = 100)]
    pub log_step_count_steps: usize,
    /// Directory for checkpoints; training resumes from it when present.
    pub model_dir: Option<String>,
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.log_step_count_steps == 0 {
            return Err(Error::InvalidConfig(
                "log_step_count_steps must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EvalResult {
    /// Mean loss over the evaluation steps.
    pub loss: f64,
    pub global_step: usize,
    pub metrics: BTreeMap<String, f64>,
}

impl EvalResult {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// Predicted values for a single input row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Prediction {
    values: BTreeMap<&'static str, f32>,
}

impl Prediction {
    pub fn get(&self, key: &str) -> Option<f32> {
        self.values.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        self.values.iter().map(|(key, value)| (*key, *value))
    }
}

/// Wraps a [ModelFn] with a train / evaluate / predict lifecycle.
pub struct Estimator<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + ModelFn<B>,
    O: Optimizer<M, B>,
{
    model: M,
    optim: O,
    config: EstimatorConfig,
    device: B::Device,
    global_step: usize,
}

impl<B, M, O> Estimator<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + ModelFn<B>,
    M::InnerModule: ModelFn<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    /// Creates an estimator, resuming from the checkpoint in `model_dir` if one exists.
    pub fn new(model: M, optim: O, config: EstimatorConfig, device: B::Device) -> Result<Self> {
        config.validate()?;

        let (model, global_step) = match config.model_dir.as_deref() {
            Some(model_dir) if checkpoint::exists(model_dir) => {
                checkpoint::restore::<B, M>(model_dir, model, &device)?
            }
            _ => (model.to_device(&device), 0),
        };

        Ok(Self {
            model,
            optim,
            config,
            device,
            global_step,
        })
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Runs `steps` more optimizer steps on the batch produced by `input_fn`.
    pub fn fit<I: InputFn>(&mut self, input_fn: &I, steps: usize) -> Result<()> {
        let (features, targets) = input_fn.input::<B>(&self.device);
        let mut model = self.model.clone();
        let mut global_step = self.global_step;
        let last_step = self.global_step + steps;
        let mut last_loss = None;

        for _ in 0..steps {
            let ops = model.model_fn(features.clone(), Some(targets.clone()), Mode::Train);
            let loss = ops.loss.ok_or(Error::MissingLoss(Mode::Train))?;
            global_step += 1;

            if global_step == self.global_step + 1
                || global_step % self.config.log_step_count_steps == 0
                || global_step == last_step
            {
                let value = loss.clone().into_scalar().elem::<f64>();
                log::info!("loss = {value}, step = {global_step}");
                last_loss = Some(value);
            }

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = self.optim.step(self.config.learning_rate, model, grads);
        }

        self.model = model;
        self.global_step = global_step;

        if let Some(loss) = last_loss {
            log::info!("Loss for final step: {loss}.");
        }
        if let Some(model_dir) = self.config.model_dir.as_deref() {
            checkpoint::save::<B, M>(model_dir, &self.model, self.global_step)?;
        }

        Ok(())
    }

    /// Evaluates the model `steps` times on `input_fn`, streaming the metrics.
    pub fn evaluate<I: InputFn>(&self, input_fn: &I, steps: usize) -> Result<EvalResult> {
        if steps == 0 {
            return Err(Error::InvalidConfig("evaluation needs at least one step".into()));
        }

        let model = self.model.valid();
        let mut loss = Mean::default();
        let mut metrics: BTreeMap<String, Box<dyn StreamingMetric>> = BTreeMap::new();

        for _ in 0..steps {
            let (features, targets) = input_fn.input::<B::InnerBackend>(&self.device);
            let ops = model.model_fn(features, Some(targets), Mode::Eval);
            let step_loss = ops.loss.ok_or(Error::MissingLoss(Mode::Eval))?;
            loss.update(step_loss.into_scalar().elem::<f64>());

            for op in ops.eval_metric_ops {
                let labels = to_vec(op.labels);
                let predictions = to_vec(op.predictions);
                metrics
                    .entry(op.name.to_string())
                    .or_insert_with(|| op.kind.init())
                    .update(&labels, &predictions);
            }
        }

        let result = EvalResult {
            loss: loss.value(),
            global_step: self.global_step,
            metrics: metrics
                .into_iter()
                .map(|(name, metric)| (name, metric.value()))
                .collect(),
        };
        log::info!(
            "Saving dict for global step {}: loss = {}, {:?}",
            result.global_step,
            result.loss,
            result.metrics
        );

        Ok(result)
    }

    /// Returns one [Prediction] per input row, in input order.
    pub fn predict<I: InputFn>(&self, input_fn: &I) -> Result<Vec<Prediction>> {
        let model = self.model.valid();
        let (features, _targets) = input_fn.input::<B::InnerBackend>(&self.device);
        let [num_rows, _] = features.dims();
        let ops = model.model_fn(features, None, Mode::Infer);

        let columns: Vec<(&'static str, Vec<f32>)> = ops
            .predictions
            .into_iter()
            .map(|(key, tensor)| (key, to_vec(tensor)))
            .collect();

        let predictions = (0..num_rows)
            .map(|row| Prediction {
                values: columns
                    .iter()
                    .filter_map(|(key, values)| values.get(row).map(|value| (*key, *value)))
                    .collect(),
            })
            .collect();

        Ok(predictions)
    }
}

fn to_vec<B: Backend>(tensor: Tensor<B, 1>) -> Vec<f32> {
    tensor.into_data().iter::<f32>().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::metric::MetricKind;
    use crate::TestAutodiffBackend;
    use burn::{
        nn::{
            loss::{MseLoss, Reduction},
            Linear, LinearConfig,
        },
        optim::SgdConfig,
    };

    #[derive(Module, Debug)]
    struct LinearModel<B: Backend> {
        linear: Linear<B>,
    }

    impl<B: Backend> LinearModel<B> {
        fn new(device: &B::Device) -> Self {
            Self {
                linear: LinearConfig::new(1, 1).init(device),
            }
        }
    }

    impl<B: Backend> ModelFn<B> for LinearModel<B> {
        fn model_fn(
            &self,
            features: Tensor<B, 2>,
            targets: Option<Tensor<B, 1>>,
            mode: Mode,
        ) -> ModelFnOps<B> {
            let [num_rows, _] = features.dims();
            let predictions = self.linear.forward(features).reshape([num_rows]);
            let mut ops = ModelFnOps::new(BTreeMap::from([("y", predictions.clone())]));

            if let Some(targets) = targets {
                let loss =
                    MseLoss::new().forward(predictions.clone(), targets.clone(), Reduction::Mean);
                ops = ops.with_loss(loss);
                if mode == Mode::Eval {
                    ops = ops.with_eval_metric_op(EvalMetricOp::new(
                        "mae",
                        MetricKind::MeanAbsoluteError,
                        targets,
                        predictions,
                    ));
                }
            }
            ops
        }
    }

    /// y = 2x + 1
    fn line() -> ArrayInput {
        let xs = [0.0, 0.25, 0.5, 0.75, 1.0];
        ArrayInput::new(
            xs.iter().map(|x| vec![*x]).collect(),
            Some(xs.iter().map(|x| 2.0 * x + 1.0).collect()),
        )
        .unwrap()
    }

    fn estimator(
        config: EstimatorConfig,
    ) -> Estimator<
        TestAutodiffBackend,
        LinearModel<TestAutodiffBackend>,
        impl Optimizer<LinearModel<TestAutodiffBackend>, TestAutodiffBackend>,
    > {
        let device = Default::default();
        let model = LinearModel::new(&device);
        let optim =
            SgdConfig::new().init::<TestAutodiffBackend, LinearModel<TestAutodiffBackend>>();
        Estimator::new(model, optim, config, device).unwrap()
    }

    #[test]
    fn fit_lowers_the_evaluation_loss() {
        let mut estimator = estimator(EstimatorConfig::new().with_learning_rate(0.1));
        let before = estimator.evaluate(&line(), 1).unwrap();

        estimator.fit(&line(), 500).unwrap();
        let after = estimator.evaluate(&line(), 1).unwrap();

        assert_eq!(estimator.global_step(), 500);
        assert_eq!(after.global_step, 500);
        assert!(after.loss < before.loss);
        assert!(after.metric("mae").unwrap() < 0.1);
    }

    #[test]
    fn fit_accumulates_global_step() {
        let mut estimator = estimator(EstimatorConfig::new());

        estimator.fit(&line(), 3).unwrap();
        estimator.fit(&line(), 4).unwrap();

        assert_eq!(estimator.global_step(), 7);
    }

    #[test]
    fn evaluate_streams_metrics_across_steps() {
        let estimator = estimator(EstimatorConfig::new());

        let once = estimator.evaluate(&line(), 1).unwrap();
        let thrice = estimator.evaluate(&line(), 3).unwrap();

        assert!((once.loss - thrice.loss).abs() < 1e-6);
        assert!((once.metric("mae").unwrap() - thrice.metric("mae").unwrap()).abs() < 1e-6);
        assert_eq!(once.metric("rmse"), None);
    }

    #[test]
    fn evaluate_with_zero_steps_is_rejected() {
        let estimator = estimator(EstimatorConfig::new());

        assert!(matches!(
            estimator.evaluate(&line(), 0),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn predict_returns_one_prediction_per_row() {
        let estimator = estimator(EstimatorConfig::new());
        let input = ArrayInput::new(vec![vec![0.0], vec![1.0], vec![2.0]], None).unwrap();

        let predictions = estimator.predict(&input).unwrap();

        assert_eq!(predictions.len(), 3);
        assert!(predictions.iter().all(|p| p.get("y").is_some()));
        assert_eq!(predictions[0].get("ages"), None);
    }

    #[test]
    fn training_resumes_from_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("estimator").to_str().unwrap().to_string();
        let config = EstimatorConfig::new()
            .with_learning_rate(0.1)
            .with_model_dir(Some(model_dir.clone()));

        let mut first = estimator(config.clone());
        first.fit(&line(), 50).unwrap();
        let trained = first.evaluate(&line(), 1).unwrap();

        let resumed = estimator(config);
        let restored = resumed.evaluate(&line(), 1).unwrap();

        assert!(checkpoint::exists(&model_dir));
        assert_eq!(resumed.global_step(), 50);
        assert!((trained.loss - restored.loss).abs() < 1e-6);
    }

    #[derive(Module, Debug)]
    struct LosslessModel<B: Backend> {
        linear: Linear<B>,
    }

    impl<B: Backend> ModelFn<B> for LosslessModel<B> {
        fn model_fn(
            &self,
            features: Tensor<B, 2>,
            _targets: Option<Tensor<B, 1>>,
            _mode: Mode,
        ) -> ModelFnOps<B> {
            let [num_rows, _] = features.dims();
            let predictions = self.linear.forward(features).reshape([num_rows]);
            ModelFnOps::new(BTreeMap::from([("y", predictions)]))
        }
    }

    fn lossless_estimator() -> Estimator<
        TestAutodiffBackend,
        LosslessModel<TestAutodiffBackend>,
        impl Optimizer<LosslessModel<TestAutodiffBackend>, TestAutodiffBackend>,
    > {
        let device = Default::default();
        let model = LosslessModel {
            linear: LinearConfig::new(1, 1).init(&device),
        };
        let optim =
            SgdConfig::new().init::<TestAutodiffBackend, LosslessModel<TestAutodiffBackend>>();
        Estimator::new(model, optim, EstimatorConfig::new(), device).unwrap()
    }

    #[test]
    fn fit_without_loss_is_an_error() {
        let mut estimator = lossless_estimator();

        let result = estimator.fit(&line(), 3);

        assert!(matches!(result, Err(Error::MissingLoss(Mode::Train))));
        assert_eq!(estimator.global_step(), 0);
    }

    #[test]
    fn evaluate_without_loss_is_an_error() {
        let estimator = lossless_estimator();

        let result = estimator.evaluate(&line(), 1);

        assert!(matches!(result, Err(Error::MissingLoss(Mode::Eval))));
    }

    #[test]
    fn predict_does_not_need_a_loss() {
        let estimator = lossless_estimator();

        let predictions = estimator.predict(&line()).unwrap();

        assert_eq!(predictions.len(), 5);
    }

    #[test]
    fn zero_log_step_count_is_rejected_by_new() {
        let device = Default::default();
        let model = LinearModel::<TestAutodiffBackend>::new(&device);
        let optim =
            SgdConfig::new().init::<TestAutodiffBackend, LinearModel<TestAutodiffBackend>>();
        let config = EstimatorConfig::new().with_log_step_count_steps(0);

        let result = Estimator::new(model, optim, config, device);

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn array_input_rejects_ragged_rows() {
        let result = ArrayInput::new(vec![vec![1.0, 2.0], vec![3.0]], None);

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn invalid_learning_rate_is_rejected() {
        let config = EstimatorConfig::new().with_learning_rate(0.0);

        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
