//! Abalone age regression driven through the [Estimator](crate::estimator::Estimator).

pub mod dataset;
pub mod model;

pub use dataset::{AbaloneDataset, AbaloneItem};
pub use model::{AbaloneModel, AbaloneModelConfig, AGES};

use crate::error::Result;
use crate::estimator::{ArrayInput, Estimator, EstimatorConfig, Prediction};
use burn::{
    data::dataset::Dataset, optim::SgdConfig, prelude::*, tensor::backend::AutodiffBackend,
};

#[derive(Config, Debug)]
pub struct AbaloneConfig {
    #[config(default = "String::from(\"data/abalone_train.csv\")")]
    pub train_data: String,
    #[config(default = "String::from(\"data/abalone_test.csv\")")]
    pub test_data: String,
    /// Examples for which to predict abalone ages.
    #[config(default = "String::from(\"data/abalone_predict.csv\")")]
    pub predict_data: String,
    #[config(default = 5000)]
    pub train_steps: usize,
    #[config(default = 1)]
    pub eval_steps: usize,
    #[config(default = "AbaloneModelConfig::new()")]
    pub model: AbaloneModelConfig,
    #[config(default = "EstimatorConfig::new()")]
    pub estimator: EstimatorConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AbaloneReport {
    pub loss: f64,
    pub rmse: Option<f64>,
    pub predictions: Vec<Prediction>,
}

/// Fits on the training set, scores the test set and predicts the prediction set.
pub fn run<B: AutodiffBackend>(config: AbaloneConfig, device: B::Device) -> Result<AbaloneReport> {
    let training_set = AbaloneDataset::from_csv(&config.train_data)?;
    let test_set = AbaloneDataset::from_csv(&config.test_data)?;
    let prediction_set = AbaloneDataset::from_csv(&config.predict_data)?;

    let model = config.model.init::<B>(&device);
    let optim = SgdConfig::new().init::<B, AbaloneModel<B>>();
    let mut estimator = Estimator::new(model, optim, config.estimator.clone(), device)?;

    estimator.fit(&training_set, config.train_steps)?;

    let ev = estimator.evaluate(&test_set, config.eval_steps)?;
    let rmse = ev.metric("rmse");
    println!("Loss: {}", ev.loss);
    match rmse {
        Some(rmse) => println!("Root Mean Squared Error: {rmse}"),
        None => log::warn!("The model reported no rmse metric"),
    }

    // Only the features of the prediction set are used, its ages are unknown.
    let prediction_input = ArrayInput::new(
        prediction_set
            .iter()
            .map(|item| item.features().to_vec())
            .collect(),
        None,
    )?;
    let predictions = estimator.predict(&prediction_input)?;
    for (i, prediction) in predictions.iter().enumerate() {
        if let Some(ages) = prediction.get(AGES) {
            println!("Prediction {}: {}", i + 1, ages);
        }
    }

    Ok(AbaloneReport {
        loss: ev.loss,
        rmse,
        predictions,
    })
}
