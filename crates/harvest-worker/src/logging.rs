//! Structured item logging and subscriber setup.

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

use indicatif::ProgressBar;
use tracing::{error, info, warn, Span};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Bar currently drawn on stderr, if any.
static ACTIVE_PROGRESS: Mutex<Option<ProgressBar>> = Mutex::new(None);

fn active_progress() -> MutexGuard<'static, Option<ProgressBar>> {
    ACTIVE_PROGRESS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Route log output around `bar` until [`detach_progress`].
pub fn attach_progress(bar: &ProgressBar) {
    *active_progress() = Some(bar.clone());
}

pub fn detach_progress() {
    *active_progress() = None;
}

/// Stderr writer that clears the active progress bar while a log line is
/// written and redraws it afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWriter;

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let bar = active_progress().clone();
        match bar {
            Some(bar) => bar.suspend(|| io::stderr().write(buf)),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        *self
    }
}

/// Install the global tracing subscriber.
///
/// JSON output when `LOG_FORMAT=json`, human-readable otherwise. `RUST_LOG`
/// directives are honoured on top of the `harvest=info` default.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["harvest=info", "harvest_worker=info", "harvest_media=info", "harvest_storage=info"] {
        if let Ok(d) = directive.parse() {
            env_filter = env_filter.add_directive(d);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(LogWriter))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(LogWriter)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Logger for one item's pipeline, carrying the clip id and current stage.
#[derive(Debug, Clone)]
pub struct ItemLogger {
    clip_id: String,
    run_id: String,
}

impl ItemLogger {
    pub fn new(clip_id: &str, run_id: &str) -> Self {
        Self {
            clip_id: clip_id.to_string(),
            run_id: run_id.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(clip_id = %self.clip_id, run_id = %self.run_id, "Item started: {}", message);
    }

    pub fn log_stage(&self, stage: &str, message: &str) {
        info!(clip_id = %self.clip_id, stage = %stage, "{}", message);
    }

    pub fn log_warning(&self, stage: &str, message: &str) {
        warn!(clip_id = %self.clip_id, stage = %stage, "{}", message);
    }

    pub fn log_error(&self, stage: &str, message: &str) {
        error!(clip_id = %self.clip_id, stage = %stage, "Item failed: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(clip_id = %self.clip_id, run_id = %self.run_id, "Item completed: {}", message);
    }

    pub fn clip_id(&self) -> &str {
        &self.clip_id
    }

    /// Span wrapping the whole item pipeline.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("item", clip_id = %self.clip_id, run_id = %self.run_id)
    }
}
