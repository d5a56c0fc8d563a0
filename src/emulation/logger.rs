//! Logging collaborator for module bookkeeping.
//!
//! The manager reports its two user-visible events (a module was mapped, a module failed
//! to map) through the [`Logger`] trait rather than a global sink, so an embedding
//! emulator can route them into its own console or trace file. [`LogLogger`] is the
//! default adapter and forwards to the `log` facade.

/// Sink for user-visible emulator messages.
pub trait Logger {
    /// Reports a successful operation.
    fn info(&self, message: &str);

    /// Reports a failed operation.
    fn error(&self, message: &str);
}

/// [`Logger`] adapter that forwards to the `log` crate.
///
/// Messages are emitted under the `emustate` target; installing a backend such as
/// `env_logger` is left to the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLogger;

impl LogLogger {
    /// Target name used for every forwarded record.
    pub const TARGET: &'static str = "emustate";

    /// Creates the adapter.
    #[must_use]
    pub fn new() -> Self {
        LogLogger
    }
}

impl Logger for LogLogger {
    fn info(&self, message: &str) {
        log::info!(target: Self::TARGET, "{}", message);
    }

    fn error(&self, message: &str) {
        log::error!(target: Self::TARGET, "{}", message);
    }
}

impl<L: Logger + ?Sized> Logger for &L {
    fn info(&self, message: &str) {
        (**self).info(message);
    }

    fn error(&self, message: &str) {
        (**self).error(message);
    }
}
