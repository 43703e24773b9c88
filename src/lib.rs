use std::fs;
use std::io;
use std::path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

pub mod common;
pub mod config;
pub mod sql;

pub use common::{PlanError, PlanResult};
pub use sql::{parse_sql_to_plan, QueryPlan, SqlParser};

/// Installs stdout and daily rolling file logging.
/// Keep the returned guard alive while file logs should be flushed. If the host
/// already installed a subscriber, that one stays in place.
pub fn init_log() -> io::Result<WorkerGuard> {
    let log_path = path::Path::new(config::LOG_PATH);
    let log_dir = log_path.parent().unwrap_or_else(|| path::Path::new("."));
    let log_filename = log_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("sqlplan.log");
    fs::create_dir_all(log_dir)?;

    let stdout_log = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .with_thread_names(true)
        .with_level(true);

    let file_appender = tracing_appender::rolling::daily(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_log = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_thread_names(true)
        .with_level(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config::LOG_LEVEL));

    if let Err(err) = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_log)
        .with(file_log)
        .try_init()
    {
        tracing::debug!(error = %err, "global subscriber already installed, keeping it");
    }
    Ok(guard)
}
