//! Subscriber setup: stderr (plain or JSON) plus an optional daily-rolling
//! log file.

use augur_core::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Run `f` under a temporary stderr subscriber, for work done before the
/// configured one exists. `RUST_LOG` applies, otherwise `info`.
pub fn bootstrap<T>(f: impl FnOnce() -> T) -> T {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::with_default(subscriber, f)
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// The returned guard must be held for the life of the process or buffered
/// file output is lost.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match &config.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "augur.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let json_layer = config
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let plain_layer = (!config.json).then(|| fmt::layer().with_writer(std::io::stderr));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(plain_layer)
        .with(file_layer)
        .try_init();
    if let Err(e) = result {
        eprintln!("Logging already initialised: {}", e);
    }
    guard
}
