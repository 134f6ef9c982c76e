//! Error type shared by every timelog entry point.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the timing and logging machinery.
///
/// None of these ever replace the result of user code wrapped by a timer:
/// the infallible entry points report them on stderr and carry on untimed.
#[derive(Debug, Error)]
pub enum TimerError {
    /// `stop` before `start`, `start` twice, or `stop` twice.
    #[error("invalid timer state: cannot {action} a {state} timer")]
    InvalidTimerState {
        action: &'static str,
        state: &'static str,
    },

    /// The call site could not be turned into a usable path.
    #[error("could not resolve call site path: {0}")]
    PathResolutionFailure(String),

    /// The log file (or its parent directory) could not be created or opened.
    #[error("failed to create log handler for {}: {source}", path.display())]
    HandlerCreationFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `fmt` or `datefmt` could not be parsed.
    #[error("invalid log format {template:?}: {reason}")]
    InvalidFormat { template: String, reason: String },
}

pub type Result<T> = std::result::Result<T, TimerError>;

/// Reports a failure of the logging machinery without propagating it.
pub(crate) fn report(context: &str, err: &dyn std::fmt::Display) {
    eprintln!("timelog: {context}: {err}");
}
