use crate::birnn::data::MnistSequenceBatch;
use burn::{
    module::Initializer,
    nn::{loss::CrossEntropyLossConfig, BiLstm, BiLstmConfig, Linear, LinearConfig},
    prelude::*,
    train::ClassificationOutput,
};

#[derive(Config, Debug)]
pub struct BiRnnConfig {
    /// Size of the input at each time step (pixels per row).
    #[config(default = 28)]
    pub n_input: usize,
    /// Number of time steps (pixel rows), checked against the batcher before training.
    #[config(default = 28)]
    pub n_steps: usize,
    /// Hidden size of each LSTM direction.
    #[config(default = 256)]
    pub n_hidden: usize,
    #[config(default = 10)]
    pub n_classes: usize,
}

/// Bidirectional LSTM classifier.
///
/// The output at the last time step, forward and backward directions
/// concatenated, is projected onto the class logits.
#[derive(Module, Debug)]
pub struct BiRnn<B: Backend> {
    lstm: BiLstm<B>,
    output: Linear<B>,
    n_hidden: usize,
}

impl BiRnnConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BiRnn<B> {
        let lstm = BiLstmConfig::new(self.n_input, self.n_hidden, true).init(device);
        let output = LinearConfig::new(2 * self.n_hidden, self.n_classes)
            .with_initializer(Initializer::Normal {
                mean: 0.0,
                std: 1.0,
            })
            .init(device);

        BiRnn {
            lstm,
            output,
            n_hidden: self.n_hidden,
        }
    }
}

impl<B: Backend> BiRnn<B> {
    /// # Shapes
    /// - sequences: `[batch_size, n_steps, n_input]`
    /// - output: `[batch_size, n_classes]`
    pub fn forward(&self, sequences: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch_size, n_steps, _] = sequences.dims();
        let (outputs, _state) = self.lstm.forward(sequences, None);

        let last = outputs
            .slice([0..batch_size, n_steps - 1..n_steps, 0..2 * self.n_hidden])
            .reshape([batch_size, 2 * self.n_hidden]);

        self.output.forward(last)
    }

    pub fn forward_classification(&self, batch: MnistSequenceBatch<B>) -> ClassificationOutput<B> {
        let targets = batch.targets;
        let output = self.forward(batch.sequences);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

/// Fraction of rows whose highest logit matches the target class.
pub fn accuracy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> f32 {
    let [batch_size, _] = logits.dims();
    if batch_size == 0 {
        return 0.0;
    }

    correct_predictions(logits, targets) as f32 / batch_size as f32
}

pub(crate) fn correct_predictions<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
) -> usize {
    let [batch_size, _] = logits.dims();

    logits
        .argmax(1)
        .reshape([batch_size])
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::birnn::data::{synthetic_item, MnistSequenceBatcher};
    use crate::TestBackend;
    use burn::data::dataloader::batcher::Batcher;

    #[test]
    fn forward_produces_one_logit_row_per_image() {
        let device = Default::default();
        let model = BiRnnConfig::new()
            .with_n_hidden(8)
            .init::<TestBackend>(&device);
        let items = vec![synthetic_item(0), synthetic_item(4), synthetic_item(9)];
        let batch: MnistSequenceBatch<TestBackend> = MnistSequenceBatcher.batch(items, &device);

        let logits = model.forward(batch.sequences);

        assert_eq!(logits.dims(), [3, 10]);
    }

    #[test]
    fn logits_come_from_the_last_time_step() {
        let device = Default::default();
        let model = BiRnnConfig::new()
            .with_n_hidden(6)
            .init::<TestBackend>(&device);
        let items = vec![synthetic_item(1), synthetic_item(7)];
        let batch: MnistSequenceBatch<TestBackend> = MnistSequenceBatcher.batch(items, &device);
        let n_steps = 28;

        let (outputs, _state) = model.lstm.forward(batch.sequences.clone(), None);
        let last = outputs
            .slice([0..2, n_steps - 1..n_steps, 0..12])
            .reshape([2, 12]);
        let expected = model.output.forward(last).into_data().to_vec::<f32>().unwrap();

        let logits = model.forward(batch.sequences).into_data().to_vec::<f32>().unwrap();

        assert_eq!(logits.len(), expected.len());
        for (actual, expected) in logits.iter().zip(&expected) {
            assert!((actual - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn classification_output_carries_a_positive_loss() {
        let device = Default::default();
        let model = BiRnnConfig::new()
            .with_n_hidden(4)
            .init::<TestBackend>(&device);
        let batch: MnistSequenceBatch<TestBackend> =
            MnistSequenceBatcher.batch(vec![synthetic_item(2), synthetic_item(5)], &device);

        let output = model.forward_classification(batch);

        assert_eq!(output.output.dims(), [2, 10]);
        assert!(output.loss.into_scalar().elem::<f32>() > 0.0);
    }

    #[test]
    fn accuracy_counts_argmax_matches() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_data(
            [
                [0.0, 0.2, 0.8], // 2
                [1.0, 2.0, 0.5], // 1
                [0.4, 0.1, 0.2], // 0
                [0.6, 0.7, 0.2], // 1
            ],
            &device,
        );
        let targets = Tensor::<TestBackend, 1, Int>::from_data([2, 2, 1, 1], &device);

        assert_eq!(accuracy(logits, targets), 0.5);
    }

    #[test]
    fn accuracy_of_empty_batch_is_zero() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([0, 10], &device);
        let targets = Tensor::<TestBackend, 1, Int>::zeros([0], &device);

        assert_eq!(accuracy(logits, targets), 0.0);
    }
}
