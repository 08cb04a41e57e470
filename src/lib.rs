#![recursion_limit = "256"]

//! Two burn programs: a bidirectional LSTM classifier trained on MNIST rows
//! as time steps, and a small estimator abstraction (fit / evaluate / predict)
//! exercised on the abalone regression dataset.

pub mod abalone;
pub mod backend;
pub mod birnn;
pub mod error;
pub mod estimator;
pub mod logging;

pub use error::{Error, Result};

#[cfg(test)]
pub(crate) type TestBackend = burn::backend::NdArray<f32>;
#[cfg(test)]
pub(crate) type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;
