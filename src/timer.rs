//! Timer core: the stopwatch state machine, message composition and emission.

use crate::callsite::CallSite;
use crate::config::TimerConfig;
use crate::error::{self, Result, TimerError};
use crate::format::Record;
use crate::handler::Handler;
use crate::level::LogLevel;
use crate::registry::HandlerRegistry;
use chrono::Local;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// `Idle -> Running -> Stopped`. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running(Instant),
    Stopped,
}

impl TimerState {
    fn name(&self) -> &'static str {
        match self {
            TimerState::Idle => "idle",
            TimerState::Running(_) => "running",
            TimerState::Stopped => "stopped",
        }
    }
}

/// Monotonic stopwatch backing every timer.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    state: TimerState,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            state: TimerState::Idle,
        }
    }

    pub fn started() -> Self {
        Self {
            state: TimerState::Running(Instant::now()),
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn start(&mut self) -> Result<()> {
        match self.state {
            TimerState::Idle => {
                self.state = TimerState::Running(Instant::now());
                Ok(())
            }
            other => Err(TimerError::InvalidTimerState {
                action: "start",
                state: other.name(),
            }),
        }
    }

    /// Stops the watch and returns the elapsed time.
    pub fn stop(&mut self) -> Result<Duration> {
        match self.state {
            TimerState::Running(started) => {
                self.state = TimerState::Stopped;
                Ok(started.elapsed())
            }
            other => Err(TimerError::InvalidTimerState {
                action: "stop",
                state: other.name(),
            }),
        }
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

pub fn elapsed_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1_000.0
}

/// Which surface produced a record; decides the message prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `Ran {name} in ...`
    Call,
    /// `Ctx '{name}' OK in ...`, or `ERR:panic` when left by unwinding.
    Scope { panicked: bool },
    /// `Segment '{name}' in ...`
    Segment,
}

/// Builds the record text, e.g.
/// `Ran load in 12.345 ms (module=app, file=main.rs, abs=/src/app/main.rs, line=4, pid=77, thread=main)`.
pub fn compose_message(
    kind: MessageKind,
    name: &str,
    elapsed_ms: f64,
    site: &CallSite,
    extra: Option<&str>,
) -> String {
    let head = match kind {
        MessageKind::Call => format!("Ran {name}"),
        MessageKind::Scope { panicked: false } => format!("Ctx '{name}' OK"),
        MessageKind::Scope { panicked: true } => format!("Ctx '{name}' ERR:panic"),
        MessageKind::Segment => format!("Segment '{name}'"),
    };
    let mut message = format!(
        "{head} in {elapsed_ms:.3} ms (module={}, file={}, abs={}, line={}, pid={}, thread={})",
        site.module,
        site.file_name(),
        site.abs_path.display(),
        site.line_label(),
        std::process::id(),
        current_thread_name(),
    );
    if let Some(extra) = extra.filter(|e| !e.is_empty()) {
        message.push_str(" | ");
        message.push_str(extra);
    }
    message
}

fn current_thread_name() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

/// A logger bound to its handlers for one resolved configuration.
#[derive(Debug, Clone)]
pub struct Emitter {
    name: String,
    level: LogLevel,
    handlers: Vec<Arc<dyn Handler>>,
}

impl Emitter {
    /// Looks up (or creates) every handler `config` writes through.
    pub fn open(config: &TimerConfig, registry: &HandlerRegistry) -> Result<Self> {
        let handlers = config
            .handler_specs()?
            .iter()
            .map(|spec| registry.get_or_create(spec))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: config.logger_name.clone(),
            level: config.level,
            handlers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn handlers(&self) -> &[Arc<dyn Handler>] {
        &self.handlers
    }

    /// Sends `message` to every handler. Write failures are reported on
    /// stderr and never returned.
    pub fn emit(&self, message: &str) {
        if self.handlers.is_empty() {
            return;
        }
        let thread = current_thread_name();
        let record = Record {
            time: Local::now(),
            level: self.level,
            name: &self.name,
            message,
            process: std::process::id(),
            thread: &thread,
        };
        for handler in &self.handlers {
            if let Err(err) = handler.emit(&record) {
                error::report(&format!("failed to write to {:?}", handler.destination()), &err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::thread;

    fn site() -> CallSite {
        CallSite {
            module: "app".to_string(),
            function: "load".to_string(),
            file: PathBuf::from("src/main.rs"),
            abs_path: PathBuf::from("/srv/app/src/main.rs"),
            line: Some(4),
        }
    }

    #[test]
    fn test_stopwatch_lifecycle() {
        let mut watch = Stopwatch::new();
        assert_eq!(watch.state(), TimerState::Idle);
        watch.start().unwrap();
        thread::sleep(Duration::from_millis(2));
        let elapsed = watch.stop().unwrap();
        assert!(elapsed >= Duration::from_millis(2));
        assert_eq!(watch.state(), TimerState::Stopped);
    }

    #[test]
    fn test_stop_before_start_is_invalid() {
        let err = Stopwatch::new().stop().unwrap_err();
        assert!(matches!(
            err,
            TimerError::InvalidTimerState {
                action: "stop",
                state: "idle"
            }
        ));
    }

    #[test]
    fn test_double_stop_and_restart_are_invalid() {
        let mut watch = Stopwatch::started();
        watch.stop().unwrap();
        assert!(matches!(
            watch.stop(),
            Err(TimerError::InvalidTimerState { state: "stopped", .. })
        ));
        assert!(matches!(
            watch.start(),
            Err(TimerError::InvalidTimerState { action: "start", .. })
        ));
    }

    #[test]
    fn test_message_layout() {
        let message = compose_message(MessageKind::Call, "load", 1.23456, &site(), Some("batch=3"));
        assert!(message.starts_with("Ran load in 1.235 ms (module=app, file=main.rs, abs=/srv/app/src/main.rs, line=4, pid="));
        assert!(message.ends_with(") | batch=3"));

        let message = compose_message(MessageKind::Scope { panicked: true }, "stage", 0.5, &site(), None);
        assert!(message.starts_with("Ctx 'stage' ERR:panic in 0.500 ms"));

        let message = compose_message(MessageKind::Segment, "encode", 2.0, &site(), Some(""));
        assert!(message.starts_with("Segment 'encode' in 2.000 ms"));
        assert!(message.ends_with(')'));
    }

    #[test]
    fn test_elapsed_ms_conversion() {
        assert_eq!(elapsed_ms(Duration::from_micros(1500)), 1.5);
    }
}
