use burn::{
    data::{dataloader::batcher::Batcher, dataset::vision::MnistItem},
    prelude::*,
};

/// Number of pixel rows in an MNIST image, read as time steps.
pub const IMAGE_ROWS: usize = 28;
/// Number of pixels per row, read as the input size of each time step.
pub const IMAGE_COLS: usize = 28;

/// Turns MNIST images into sequences: each pixel row is one time step.
#[derive(Clone, Debug, Default)]
pub struct MnistSequenceBatcher;

#[derive(Clone, Debug)]
pub struct MnistSequenceBatch<B: Backend> {
    /// `[batch_size, n_steps, n_input]`, pixels scaled to `[0, 1]`.
    pub sequences: Tensor<B, 3>,
    /// `[batch_size]` class indices.
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, MnistItem, MnistSequenceBatch<B>> for MnistSequenceBatcher {
    fn batch(&self, items: Vec<MnistItem>, device: &B::Device) -> MnistSequenceBatch<B> {
        let sequences = items
            .iter()
            .map(|item| TensorData::from(item.image).convert::<B::FloatElem>())
            .map(|data| Tensor::<B, 2>::from_data(data, device))
            .map(|tensor| tensor.reshape([1, IMAGE_ROWS, IMAGE_COLS]))
            .map(|tensor| tensor / 255)
            .collect();

        let targets = items
            .iter()
            .map(|item| {
                Tensor::<B, 1, Int>::from_data([(item.label as i64).elem::<B::IntElem>()], device)
            })
            .collect();

        let sequences = Tensor::cat(sequences, 0);
        let targets = Tensor::cat(targets, 0);

        MnistSequenceBatch { sequences, targets }
    }
}

#[cfg(test)]
pub(crate) fn synthetic_item(label: u8) -> MnistItem {
    // A bright row whose position depends on the label.
    let mut image = [[0f32; IMAGE_COLS]; IMAGE_ROWS];
    let row = (label as usize * 2) % IMAGE_ROWS;
    image[row] = [255.0; IMAGE_COLS];

    MnistItem { image, label }
}
