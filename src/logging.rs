use std::path::Path;
use tracing_core::{Level, LevelFilter};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{registry, Layer};

/// If a global tracing subscriber is not already configured, log to stdout and to
/// `file_path`, and add a panic hook pointing at the log file.
///
/// Records emitted through the `log` facade are forwarded to the subscriber.
pub fn install_file_logger(file_path: &str) {
    let path = Path::new(file_path);
    let directory = path.parent().unwrap_or_else(|| Path::new("."));

    if let Err(err) = std::fs::create_dir_all(directory) {
        eprintln!("Unable to create log directory {}: {err}", directory.display());
        return;
    }

    let Some(file_name) = path.file_name() else {
        eprintln!("The path '{file_path}' does not point to a file, logging to stdout only.");
        let _ = registry().with(stdout_layer()).try_init();
        return;
    };

    let writer = tracing_appender::rolling::never(directory, file_name);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(LevelFilter::INFO)
        .with_filter(filter_fn(skip_noisy_modules));

    if registry()
        .with(file_layer)
        .with(stdout_layer())
        .try_init()
        .is_ok()
    {
        update_panic_hook(file_path);
    }
}

fn stdout_layer<S>() -> impl Layer<S>
where
    S: tracing_core::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(LevelFilter::INFO)
        .with_filter(filter_fn(skip_noisy_modules))
}

fn skip_noisy_modules(metadata: &tracing_core::Metadata<'_>) -> bool {
    match metadata.module_path() {
        // The wgpu crate is logging too much, so we skip `info` level.
        Some(path) if path.starts_with("wgpu") => *metadata.level() < Level::INFO,
        _ => true,
    }
}

fn update_panic_hook(file_path: &str) {
    let hook = std::panic::take_hook();
    let file_path = file_path.to_owned();

    std::panic::set_hook(Box::new(move |info| {
        log::error!("PANIC => {info}");
        eprintln!(
            "=== PANIC ===\nA fatal error happened, you can check the experiment logs here => \
             '{file_path}'\n============="
        );
        hook(info);
    }));
}

