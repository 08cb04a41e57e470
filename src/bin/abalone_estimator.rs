use bilstm_estimator::{
    abalone::{self, AbaloneConfig},
    backend::{select_device, TrainingBackend},
    logging::install_file_logger,
};
use burn::config::Config;

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match AbaloneConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Unable to load config {path}: {err:?}");
                std::process::exit(1);
            }
        },
        None => AbaloneConfig::new(),
    };

    install_file_logger("/tmp/abalone-estimator/experiment.log");

    if let Err(err) = abalone::run::<TrainingBackend>(config, select_device()) {
        log::error!("{err}");
        std::process::exit(1);
    }
}
