//! `tracing` subscriber setup.
//!
//! Console output goes to stderr, filtered by `PARTDB_LOG` (default `warn`,
//! raised by `-v`). A JSON log at `debug` rolls daily under the cache dir.

use std::path::Path;

use tracing::metadata::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use super::env_var::EnvVars;
use super::paths;

const LOG_FILE_PREFIX: &str = "partdb.log";

/// Keeps the file writer alive; drop it last.
pub struct LoggingGuard {
    _file: Option<tracing_appender::non_blocking::WorkerGuard>,
}

fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

fn console_filter(verbosity: u8, directive: Option<&str>) -> EnvFilter {
    let builder = EnvFilter::builder().with_default_directive(level_from_verbosity(verbosity).into());
    match directive {
        Some(directive) => builder.parse_lossy(directive),
        None => builder.parse_lossy(""),
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn file_layer(dir: &Path) -> std::io::Result<(BoxedLayer, tracing_appender::non_blocking::WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_filter(LevelFilter::DEBUG)
        .boxed();
    Ok((layer, guard))
}

/// Install the global subscriber. Safe to call more than once; later calls
/// leave the first subscriber in place.
pub fn init(verbosity: u8) -> LoggingGuard {
    let env = EnvVars::load();
    let console = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter(verbosity, env.log.as_deref()))
        .boxed();

    let mut layers: Vec<BoxedLayer> = vec![console];
    let mut guard = None;
    let mut file_error = None;
    if let Some(dir) = paths::log_dir() {
        match file_layer(&dir) {
            Ok((layer, g)) => {
                layers.push(layer);
                guard = Some(g);
            }
            Err(e) => file_error = Some(format!("log dir init failed for {}: {e}", dir.display())),
        }
    }

    if Registry::default().with(layers).try_init().is_ok()
        && let Some(error) = file_error
    {
        tracing::warn!("{error}");
    }

    LoggingGuard { _file: guard }
}
