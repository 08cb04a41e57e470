//! Bidirectional LSTM classifier for MNIST.
//!
//! Each 28x28 image is read as a sequence of 28 time steps of 28 pixels.

pub mod data;
pub mod model;
pub mod training;

pub use data::{MnistSequenceBatch, MnistSequenceBatcher};
pub use model::{accuracy, BiRnn, BiRnnConfig};
pub use training::{train, train_with, BiRnnTrainingConfig, StepSchedule, TrainingReport};
