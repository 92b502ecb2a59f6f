//! Tracing setup.
//!
//! Three layers share one registry:
//! - compact stdout output filtered by `RUST_LOG` (default `info`);
//! - a plain-text log file at `DOCQA_LOG_FILE`, or `logs/docqa.log`;
//! - a JSON-lines audit file at `DOCQA_AUDIT_FILE`, or `logs/audit.jsonl`, receiving only
//!   [`AUDIT_TARGET`] events (one per answered question).
//!
//! File layers write through non-blocking appenders. A file that cannot be opened is reported
//! on stderr and its layer is skipped.
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, filter::Targets, fmt, prelude::*};

/// Target of per-question audit events.
pub const AUDIT_TARGET: &str = "docqa::audit";

const LOG_FILE_ENV: &str = "DOCQA_LOG_FILE";
const AUDIT_FILE_ENV: &str = "DOCQA_AUDIT_FILE";
const DEFAULT_LOG_DIR: &str = "logs";

static LOG_GUARDS: OnceLock<Vec<WorkerGuard>> = OnceLock::new();

/// Install the stdout, log file, and audit file layers.
///
/// Only the first call installs a subscriber; later calls are no-ops.
pub fn init_tracing() {
    if LOG_GUARDS.get().is_some() {
        return;
    }
    let mut guards = Vec::new();

    let stdout_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(env_filter());

    let file_layer = open_writer(LOG_FILE_ENV, "docqa.log", &mut guards).map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact()
            .with_filter(env_filter())
    });

    let audit_layer = open_writer(AUDIT_FILE_ENV, "audit.jsonl", &mut guards).map(|writer| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(writer)
            .with_filter(Targets::new().with_target(AUDIT_TARGET, Level::INFO))
    });

    let installed = tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(audit_layer)
        .try_init()
        .is_ok();
    if installed {
        let _ = LOG_GUARDS.set(guards);
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn open_writer(
    env_key: &str,
    default_file: &str,
    guards: &mut Vec<WorkerGuard>,
) -> Option<NonBlocking> {
    let path = log_path(std::env::var(env_key).ok().as_deref(), default_file);
    match append_to(&path) {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            guards.push(guard);
            Some(writer)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}

/// Explicit path when set and non-blank, otherwise `logs/<default_file>`.
fn log_path(explicit: Option<&str>, default_file: &str) -> PathBuf {
    match explicit.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => PathBuf::from(value),
        None => Path::new(DEFAULT_LOG_DIR).join(default_file),
    }
}

fn append_to(path: &Path) -> io::Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}
