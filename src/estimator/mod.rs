//! A generic train / evaluate / predict lifecycle around a user supplied [ModelFn].

mod base;
pub mod checkpoint;
pub mod metric;

pub use base::*;
pub use metric::{EvalMetricOp, MetricKind};
