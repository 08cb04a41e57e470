use bilstm_estimator::{
    backend::{select_device, TrainingBackend},
    birnn::{self, BiRnnConfig, BiRnnTrainingConfig},
    logging::install_file_logger,
};
use burn::config::Config;

const ARTIFACT_DIR: &str = "/tmp/bilstm-mnist";

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match BiRnnTrainingConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Unable to load config {path}: {err:?}");
                std::process::exit(1);
            }
        },
        None => BiRnnTrainingConfig::new(BiRnnConfig::new()),
    };

    install_file_logger(&format!("{ARTIFACT_DIR}-logs/experiment.log"));

    if let Err(err) = birnn::train::<TrainingBackend>(ARTIFACT_DIR, config, select_device()) {
        log::error!("Training failed: {err}");
        std::process::exit(1);
    }
}
