//! Tracing subscriber setup for the command line frontend
//!
//! The library only emits events and spans; installing a subscriber is left
//! to binaries. `log` records are bridged into the same subscriber.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output format of the subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Colored, human-readable lines
    #[default]
    Console,
    /// Plain lines without ANSI colors, for CI logs
    Compact,
    /// One JSON object per event
    #[cfg(feature = "tracing-json")]
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Verbosity level from repeated `-v` flags
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Explicit filter directives, taking precedence over `verbosity`
    pub env_filter: Option<String>,
    /// Correlates every event of one CLI run
    pub session_id: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Filter directives for the configured verbosity
    ///
    /// Dependencies stay at `warn` until the highest level.
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "warn,imgly_denoise=info",
            1 => "warn,imgly_denoise=debug",
            2 => "info,imgly_denoise=trace",
            _ => "trace",
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - Invalid filter directives
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<()> {
        let filter = match &self.env_filter {
            Some(directives) => EnvFilter::try_new(directives)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => registry
                .with(fmt::layer().with_ansi(true).with_target(false).with_level(true).compact())
                .try_init()?,
            TracingFormat::Compact => registry
                .with(fmt::layer().with_ansi(false).with_target(false).compact())
                .try_init()?,
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => registry
                .with(fmt::layer().json().with_current_span(true).with_span_list(true))
                .try_init()?,
        }

        if let Some(session_id) = &self.session_id {
            tracing::debug!(session_id = %session_id, "Denoise session started");
        }
        Ok(())
    }
}

/// Install a console subscriber with a fresh session id
///
/// # Errors
/// - Any error from [`TracingConfig::init`]
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<()> {
    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_session_id(uuid::Uuid::new_v4().to_string())
        .init()
}

/// Spans shared by the CLI commands
pub mod spans {
    use std::path::Path;
    use tracing::{Level, Span};

    pub fn file_processing(path: &Path, area: &str) -> Span {
        tracing::span!(Level::INFO, "file_processing", file = %path.display(), area = %area)
    }

    pub fn batch_processing(file_count: usize) -> Span {
        tracing::span!(Level::INFO, "batch_processing", file_count)
    }

    pub fn filtering(path: &Path, filter: &str) -> Span {
        tracing::span!(Level::INFO, "filtering", file = %path.display(), filter = %filter)
    }
}
