//! Component loggers.
//!
//! There is no global log level. Each component receives a [`Logger`] when it is
//! constructed and drops events below its own level before they reach `tracing`.

use tracing::level_filters::LevelFilter;
use tracing::Level;

/// Default level for library components.
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::WARN;

/// A level-gated logger bound to one component.
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    component: &'static str,
    level: LevelFilter,
}

impl Logger {
    /// Creates a logger for `component` that emits events at or above `level`.
    pub fn new(component: &'static str, level: LevelFilter) -> Self {
        Self { component, level }
    }

    /// Creates a logger that emits nothing.
    pub fn disabled(component: &'static str) -> Self {
        Self::new(component, LevelFilter::OFF)
    }

    /// Gets the component name.
    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Gets the configured level.
    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Returns a logger for another component at the same level.
    pub fn for_component(&self, component: &'static str) -> Self {
        Self::new(component, self.level)
    }

    /// Returns true if events at `level` are emitted.
    pub fn enabled(&self, level: Level) -> bool {
        self.level >= level
    }

    /// Logs at debug level.
    pub fn debug(&self, message: &str) {
        if self.enabled(Level::DEBUG) {
            tracing::debug!(component = self.component, "{}", message);
        }
    }

    /// Logs at info level.
    pub fn info(&self, message: &str) {
        if self.enabled(Level::INFO) {
            tracing::info!(component = self.component, "{}", message);
        }
    }

    /// Logs at warn level.
    pub fn warn(&self, message: &str) {
        if self.enabled(Level::WARN) {
            tracing::warn!(component = self.component, "{}", message);
        }
    }

    /// Logs at error level.
    pub fn error(&self, message: &str) {
        if self.enabled(Level::ERROR) {
            tracing::error!(component = self.component, "{}", message);
        }
    }
}

/// Replaces the value of `parameter` in a URL's query string with `***`.
pub fn redact_query_parameter(url: &str, parameter: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let prefix = format!("{}=", parameter);
    let query = query
        .split('&')
        .map(|pair| {
            if pair.starts_with(&prefix) {
                format!("{}***", prefix)
            } else {
                pair.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", base, query)
}
