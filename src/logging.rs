//! Tracing setup for the server and the batch CLI.
//!
//! Events go to stdout through a compact formatter and, when a log file can
//! be opened, to that file as well. `DOCPIPE_LOG_FILE` picks the file;
//! without it logs land in `logs/docpipe.log`. File writes go through a
//! non-blocking worker so ingestion never waits on disk.
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Keeps the non-blocking writer's worker alive until the process exits.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber.
///
/// `RUST_LOG` controls filtering and defaults to `info`. The file layer is
/// optional: when no log file can be opened, stdout logging still works and
/// the failure is reported once on stderr.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = file_writer().map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .init();
}

fn file_writer() -> Option<NonBlocking> {
    let (writer, guard) = match std::env::var("DOCPIPE_LOG_FILE") {
        Ok(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path);
            match file {
                Ok(file) => tracing_appender::non_blocking(file),
                Err(err) => {
                    eprintln!("Cannot open log file {path}: {err}");
                    return None;
                }
            }
        }
        Err(_) => {
            if let Err(err) = std::fs::create_dir_all("logs") {
                eprintln!("Cannot create the logs directory: {err}");
                return None;
            }
            let appender = tracing_appender::rolling::never("logs", "docpipe.log");
            tracing_appender::non_blocking(appender)
        }
    };

    let _ = LOG_GUARD.set(guard);
    Some(writer)
}
