use crate::birnn::data::{MnistSequenceBatcher, IMAGE_COLS, IMAGE_ROWS};
use crate::birnn::model::{accuracy, correct_predictions, BiRnnConfig};
use crate::error::{Error, Result};
use burn::{
    data::{
        dataloader::DataLoaderBuilder,
        dataset::{
            transform::PartialDataset,
            vision::{MnistDataset, MnistItem},
            Dataset,
        },
    },
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    record::CompactRecorder,
    tensor::backend::AutodiffBackend,
};

#[derive(Config, Debug)]
pub struct BiRnnTrainingConfig {
    pub model: BiRnnConfig,
    #[config(default = 0.01)]
    pub learning_rate: f64,
    /// Training stops once `step * batch_size` reaches this many samples.
    #[config(default = 400000)]
    pub max_samples: usize,
    #[config(default = 128)]
    pub batch_size: usize,
    /// Report minibatch metrics every `display_step` steps.
    #[config(default = 10)]
    pub display_step: usize,
    /// Number of test images used for the final accuracy.
    #[config(default = 10000)]
    pub test_len: usize,
    #[config(default = 1)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
}

impl BiRnnTrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        if self.display_step == 0 {
            return Err(Error::InvalidConfig("display_step must be positive".into()));
        }
        if self.max_samples == 0 {
            return Err(Error::InvalidConfig("max_samples must be positive".into()));
        }
        if self.model.n_steps != IMAGE_ROWS || self.model.n_input != IMAGE_COLS {
            return Err(Error::InvalidConfig(format!(
                "images are read as {IMAGE_ROWS} steps of {IMAGE_COLS} pixels, got {} steps of {}",
                self.model.n_steps, self.model.n_input
            )));
        }
        if self.learning_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    pub fn schedule(&self) -> StepSchedule {
        StepSchedule {
            batch_size: self.batch_size,
            max_samples: self.max_samples,
            display_step: self.display_step,
        }
    }
}

/// Which steps run and which of them report metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepSchedule {
    pub batch_size: usize,
    pub max_samples: usize,
    pub display_step: usize,
}

impl StepSchedule {
    /// Steps `1, 2, ...` while `step * batch_size < max_samples`.
    pub fn steps(&self) -> impl Iterator<Item = usize> {
        let StepSchedule {
            batch_size,
            max_samples,
            ..
        } = *self;

        (1..).take_while(move |step| step * batch_size < max_samples)
    }

    pub fn should_display(&self, step: usize) -> bool {
        step % self.display_step == 0
    }

    pub fn samples_seen(&self, step: usize) -> usize {
        step * self.batch_size
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingReport {
    pub steps: usize,
    pub samples_seen: usize,
    pub last_minibatch_loss: Option<f32>,
    pub last_minibatch_accuracy: Option<f32>,
    pub test_accuracy: f32,
}

// Create the directory to save the model and model config
fn create_artifact_dir(artifact_dir: &str) -> Result<()> {
    // Remove existing artifacts
    std::fs::remove_dir_all(artifact_dir).ok();
    std::fs::create_dir_all(artifact_dir)?;
    Ok(())
}

/// Train on the MNIST training split and report accuracy on the test split.
pub fn train<B: AutodiffBackend>(
    artifact_dir: &str,
    config: BiRnnTrainingConfig,
    device: B::Device,
) -> Result<TrainingReport> {
    train_with::<B, _, _>(
        artifact_dir,
        config,
        MnistDataset::train(),
        MnistDataset::test(),
        device,
    )
}

pub fn train_with<B, DTrain, DTest>(
    artifact_dir: &str,
    config: BiRnnTrainingConfig,
    dataset_train: DTrain,
    dataset_test: DTest,
    device: B::Device,
) -> Result<TrainingReport>
where
    B: AutodiffBackend,
    DTrain: Dataset<MnistItem> + 'static,
    DTest: Dataset<MnistItem> + 'static,
{
    config.validate()?;
    if dataset_train.is_empty() {
        return Err(Error::EmptyDataset("mnist/train".into()));
    }

    create_artifact_dir(artifact_dir)?;
    config.save(format!("{artifact_dir}/config.json"))?;
    B::seed(config.seed);

    let mut model = config.model.init::<B>(&device);
    let mut optim = AdamConfig::new().init::<B, _>();

    let dataloader_train = DataLoaderBuilder::new(MnistSequenceBatcher)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .set_device(device.clone())
        .build(dataset_train);

    let test_len = config.test_len.min(dataset_test.len());
    let dataloader_test = DataLoaderBuilder::new(MnistSequenceBatcher)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .set_device(device.clone())
        .build(PartialDataset::new(dataset_test, 0, test_len));

    let schedule = config.schedule();
    let mut report = TrainingReport::default();

    log::info!(
        "Training bidirectional LSTM on {} images ({} samples max)",
        dataloader_train.num_items(),
        config.max_samples
    );

    let mut batches = dataloader_train.iter();
    for step in schedule.steps() {
        // Restart (and reshuffle) once an epoch is exhausted.
        let batch = match batches.next() {
            Some(batch) => batch,
            None => {
                batches = dataloader_train.iter();
                batches
                    .next()
                    .ok_or_else(|| Error::EmptyDataset("mnist/train".into()))?
            }
        };

        let output = model.forward_classification(batch.clone());
        let grads = GradientsParams::from_grads(output.loss.backward(), &model);
        model = optim.step(config.learning_rate, model, grads);

        report.steps = step;
        report.samples_seen = schedule.samples_seen(step);

        if schedule.should_display(step) {
            let output = model.forward_classification(batch);
            let loss = output.loss.into_scalar().elem::<f32>();
            let acc = accuracy(output.output, output.targets);

            println!(
                "Iter{}, Minibatch Loss = {:.6}, Training Accuracy = {:.5}",
                report.samples_seen, loss, acc
            );
            report.last_minibatch_loss = Some(loss);
            report.last_minibatch_accuracy = Some(acc);
        }
    }
    println!("Optimization Finished!");

    let model_valid = model.valid();
    let mut correct = 0;
    let mut total = 0;
    for batch in dataloader_test.iter() {
        let [batch_size] = batch.targets.dims();
        let logits = model_valid.forward(batch.sequences);
        correct += correct_predictions(logits, batch.targets);
        total += batch_size;
    }
    if total == 0 {
        log::warn!("No test images, reporting an accuracy of 0");
    } else {
        report.test_accuracy = correct as f32 / total as f32;
    }
    println!("Testing Accuracy: {}", report.test_accuracy);

    let model_path = format!("{artifact_dir}/model");
    model
        .save_file(model_path.as_str(), &CompactRecorder::new())
        .map_err(|err| Error::checkpoint(model_path, err))?;

    Ok(report)
}
