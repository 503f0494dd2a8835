//! Diagnostic output for chainkit.
//!
//! The data structures only emit `tracing` events; nothing here is needed
//! for them to work. `TraceConfig` builds a timestamped, level-filtered
//! subscriber that writes to stdout or appends to a file. The result is a
//! `Dispatch`, which can be installed process-wide with `init_tracing` or
//! handed to a single component (see `RingConfig::with_dispatch`).

use crate::error::TraceError;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::Dispatch;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Where and how verbosely to log.
#[derive(Clone, Debug)]
pub struct TraceConfig {
    /// Most verbose level emitted. `RUST_LOG`, when set, takes precedence
    /// unless `env_override` is off.
    pub level: LevelFilter,
    /// Honor `RUST_LOG` directives over `level`.
    pub env_override: bool,
    /// Append to this file instead of writing to stdout.
    pub file: Option<PathBuf>,
    /// Colorize output; ignored for file output.
    pub ansi: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            env_override: true,
            file: None,
            ansi: false,
        }
    }
}

impl TraceConfig {
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    pub fn with_env_override(mut self, env_override: bool) -> Self {
        self.env_override = env_override;
        self
    }

    fn filter(&self) -> Result<EnvFilter, TraceError> {
        let fixed = || EnvFilter::default().add_directive(self.level.into());
        if !self.env_override {
            return Ok(fixed());
        }
        match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(directives) if !directives.trim().is_empty() => Ok(EnvFilter::try_new(directives)?),
            _ => Ok(fixed()),
        }
    }

    /// Build the subscriber without installing it.
    ///
    /// A log file that cannot be opened falls back to stdout; the failure is
    /// reported as the first event through the returned dispatcher.
    pub fn dispatch(&self) -> Result<Dispatch, TraceError> {
        let filter = self.filter()?;
        let mut open_failure = None;
        let (writer, ansi) = match &self.file {
            Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => (BoxMakeWriter::new(Mutex::new(file)), false),
                Err(err) => {
                    open_failure = Some((path.clone(), err));
                    (BoxMakeWriter::new(std::io::stdout), self.ansi)
                }
            },
            None => (BoxMakeWriter::new(std::io::stdout), self.ansi),
        };

        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_thread_names(true);
        let dispatch = Dispatch::new(tracing_subscriber::registry().with(filter).with(layer));

        if let Some((path, err)) = open_failure {
            tracing::dispatcher::with_default(&dispatch, || {
                tracing::warn!(path = %path.display(), error = %err, "cannot open log file, logging to stdout")
            });
        }
        Ok(dispatch)
    }
}

/// Install the configured subscriber for the whole process. Fails if one is
/// already installed.
pub fn init_tracing(config: &TraceConfig) -> Result<(), TraceError> {
    let dispatch = config.dispatch()?;
    tracing::dispatcher::set_global_default(dispatch)?;
    Ok(())
}
