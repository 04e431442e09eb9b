use log::{debug, info, warn};

/// Thin wrapper over the `log` facade; per-gate detail is emitted only when verbose.
#[derive(Debug, Clone, Copy)]
pub struct LogManager {
    verbose: bool,
}

impl LogManager {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    pub fn verbose(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn record(&self, message: &str) {
        info!("{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", message);
    }

    /// Takes a closure so the message is only formatted when it will be emitted.
    pub fn detail<F: FnOnce() -> String>(&self, message: F) {
        if self.verbose {
            debug!("{}", message());
        }
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
