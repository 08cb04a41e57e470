use thiserror::Error;

use crate::estimator::Mode;

/// Errors produced while loading data, configuring or running a model.
#[derive(Debug, Error)]
pub enum Error {
    /// A dataset file could not be read or parsed.
    #[error("failed to load dataset from {path}: {reason}")]
    Dataset {
        /// Path to the dataset file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// A dataset contained no rows.
    #[error("dataset {0} is empty")]
    EmptyDataset(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The model function did not produce a loss where one is needed.
    #[error("model function returned no loss in {0} mode")]
    MissingLoss(Mode),

    /// Saving or restoring a model record failed.
    #[error("checkpoint error at {path}: {reason}")]
    Checkpoint {
        /// Path to the checkpoint.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn checkpoint(path: impl Into<String>, reason: impl core::fmt::Debug) -> Self {
        Self::Checkpoint {
            path: path.into(),
            reason: format!("{reason:?}"),
        }
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
