use std::path::Path;

use burn::{
    data::dataset::{Dataset, InMemDataset},
    prelude::*,
};

use crate::error::{Error, Result};
use crate::estimator::InputFn;

pub const NUM_FEATURES: usize = 7;

/// One abalone measured in the field.
///
/// Rows come from header-less CSV files, columns in declaration order.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AbaloneItem {
    /// Longest shell measurement
    pub length: f32,

    /// Perpendicular to length
    pub diameter: f32,

    /// With meat in shell
    pub height: f32,

    pub whole_weight: f32,

    /// Weight of meat
    pub shucked_weight: f32,

    /// Gut weight after bleeding
    pub viscera_weight: f32,

    /// After being dried
    pub shell_weight: f32,

    /// Age in years, the regression target.
    pub age: i64,
}

impl AbaloneItem {
    pub fn features(&self) -> [f32; NUM_FEATURES] {
        [
            self.length,
            self.diameter,
            self.height,
            self.whole_weight,
            self.shucked_weight,
            self.viscera_weight,
            self.shell_weight,
        ]
    }
}

pub struct AbaloneDataset {
    dataset: InMemDataset<AbaloneItem>,
}

impl AbaloneDataset {
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = csv::ReaderBuilder::new();
        let rdr = rdr.has_headers(false);

        let dataset = InMemDataset::from_csv(path, rdr).map_err(|err| Error::Dataset {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;

        if dataset.is_empty() {
            return Err(Error::EmptyDataset(path.display().to_string()));
        }
        log::info!("Loaded {} abalone rows from {}", dataset.len(), path.display());

        Ok(Self { dataset })
    }
}

impl Dataset<AbaloneItem> for AbaloneDataset {
    fn get(&self, index: usize) -> Option<AbaloneItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

/// The whole dataset as a single batch.
impl InputFn for AbaloneDataset {
    fn input<B: Backend>(&self, device: &B::Device) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let items: Vec<AbaloneItem> = self.dataset.iter().collect();

        let features: Vec<f32> = items.iter().flat_map(AbaloneItem::features).collect();
        let targets: Vec<f32> = items.iter().map(|item| item.age as f32).collect();

        let features = Tensor::<B, 1>::from_floats(features.as_slice(), device)
            .reshape([items.len(), NUM_FEATURES]);
        let targets = Tensor::<B, 1>::from_floats(targets.as_slice(), device);

        (features, targets)
    }
}
