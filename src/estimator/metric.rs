use burn::prelude::*;

/// Streaming evaluation metrics an [EvalMetricOp] can request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    RootMeanSquaredError,
    MeanAbsoluteError,
}

/// A named metric over labels and predictions, accumulated across evaluation steps.
#[derive(Clone, Debug)]
pub struct EvalMetricOp<B: Backend> {
    pub name: &'static str,
    pub kind: MetricKind,
    pub labels: Tensor<B, 1>,
    pub predictions: Tensor<B, 1>,
}

impl<B: Backend> EvalMetricOp<B> {
    pub fn new(
        name: &'static str,
        kind: MetricKind,
        labels: Tensor<B, 1>,
        predictions: Tensor<B, 1>,
    ) -> Self {
        Self {
            name,
            kind,
            labels,
            predictions,
        }
    }
}

/// A metric whose value is updated one batch at a time.
pub trait StreamingMetric: Send {
    fn update(&mut self, labels: &[f32], predictions: &[f32]);
    fn value(&self) -> f64;
}

impl MetricKind {
    pub fn init(&self) -> Box<dyn StreamingMetric> {
        match self {
            MetricKind::RootMeanSquaredError => Box::new(RootMeanSquaredError::default()),
            MetricKind::MeanAbsoluteError => Box::new(MeanAbsoluteError::default()),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RootMeanSquaredError {
    sum_squared: f64,
    count: usize,
}

impl StreamingMetric for RootMeanSquaredError {
    fn update(&mut self, labels: &[f32], predictions: &[f32]) {
        for (label, prediction) in labels.iter().zip(predictions) {
            let error = *label as f64 - *prediction as f64;
            self.sum_squared += error * error;
            self.count += 1;
        }
    }

    fn value(&self) -> f64 {
        match self.count {
            0 => 0.0,
            count => (self.sum_squared / count as f64).sqrt(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MeanAbsoluteError {
    sum_absolute: f64,
    count: usize,
}

impl StreamingMetric for MeanAbsoluteError {
    fn update(&mut self, labels: &[f32], predictions: &[f32]) {
        for (label, prediction) in labels.iter().zip(predictions) {
            self.sum_absolute += (*label as f64 - *prediction as f64).abs();
            self.count += 1;
        }
    }

    fn value(&self) -> f64 {
        match self.count {
            0 => 0.0,
            count => self.sum_absolute / count as f64,
        }
    }
}

/// Running mean of scalar values, such as per-step losses.
#[derive(Clone, Debug, Default)]
pub struct Mean {
    total: f64,
    count: usize,
}

impl Mean {
    pub fn update(&mut self, value: f64) {
        self.total += value;
        self.count += 1;
    }

    pub fn value(&self) -> f64 {
        match self.count {
            0 => 0.0,
            count => self.total / count as f64,
        }
    }
}
