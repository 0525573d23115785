//! Logging and user-visible output
//!
//! [`Logger`] is the handle components carry around for messages meant for a
//! person watching a transfer. It honours the verbose/quiet switches and
//! emits through `tracing`, so the same subscriber that records the
//! structured transfer spans also prints these lines. [`init`] installs that
//! subscriber.

use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber for the process.
///
/// `RUST_LOG` takes precedence; without it the level is `debug` in verbose
/// mode and `info` otherwise. Calling this more than once is harmless.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Output handle with verbosity switches
#[derive(Debug, Clone, Default)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self { verbose, quiet: false }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            tracing::info!("{}", message);
        }
    }

    /// Success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            tracing::info!(outcome = "success", "{}", message);
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose && !self.quiet {
            tracing::debug!("{}", message);
        }
    }

    /// Warnings are shown even in quiet mode
    pub fn warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    /// Titled list, one line per item
    pub fn summary(&self, title: &str, items: &[String]) {
        if self.quiet {
            return;
        }
        tracing::info!("{}", title);
        if items.is_empty() {
            tracing::info!("  (No items to display)");
        }
        for item in items {
            tracing::info!("  • {}", item);
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs == 0 {
            format!("{}ms", duration.as_millis())
        } else if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}
