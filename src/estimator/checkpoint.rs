//! Checkpoint persistence for estimator models.

use std::path::Path;

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};

use crate::error::{Error, Result};

const STATE_FILE: &str = "checkpoint.json";
const MODEL_FILE: &str = "model";

/// Checkpoints are resumed from, so weights are kept at full precision.
type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Progress saved next to the model record.
#[derive(Config, Debug)]
pub struct CheckpointState {
    pub global_step: usize,
}

/// Returns `true` when `model_dir` holds a checkpoint written by [save].
pub fn exists(model_dir: &str) -> bool {
    Path::new(model_dir).join(STATE_FILE).is_file()
}

/// Saves the model record and the global step under `model_dir`.
pub fn save<B, M>(model_dir: &str, model: &M, global_step: usize) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    std::fs::create_dir_all(model_dir)?;

    let model_path = Path::new(model_dir).join(MODEL_FILE);
    model
        .clone()
        .save_file(model_path.clone(), &CheckpointRecorder::new())
        .map_err(|err| Error::checkpoint(model_path.display().to_string(), err))?;

    let state_path = Path::new(model_dir).join(STATE_FILE);
    CheckpointState::new(global_step).save(&state_path)?;

    log::info!("Saved checkpoint for step {global_step} into {model_dir}.");
    Ok(())
}

/// Loads the record saved by [save] into `model`, returning the restored global step.
pub fn restore<B, M>(model_dir: &str, model: M, device: &B::Device) -> Result<(M, usize)>
where
    B: Backend,
    M: Module<B>,
{
    let state_path = Path::new(model_dir).join(STATE_FILE);
    let state = CheckpointState::load(&state_path)
        .map_err(|err| Error::checkpoint(state_path.display().to_string(), err))?;

    let model_path = Path::new(model_dir).join(MODEL_FILE);
    let model = model
        .load_file(model_path.clone(), &CheckpointRecorder::new(), device)
        .map_err(|err| Error::checkpoint(model_path.display().to_string(), err))?;

    log::info!(
        "Restored checkpoint for step {} from {model_dir}.",
        state.global_step
    );
    Ok((model, state.global_step))
}
