//! Timer configuration.
//!
//! [`Timer`] is the builder callers (and `#[timed(...)]`) fill in. Each timed
//! invocation turns it into an immutable [`TimerConfig`] by applying the
//! environment overrides and the call site.

use crate::callsite::{CallSite, Resolver};
use crate::env;
use crate::error::Result;
use crate::format::{DEFAULT_DATEFMT, DEFAULT_FMT, Formatter};
use crate::handler::{Destination, RotationPolicy};
use crate::level::LogLevel;
use crate::registry::{self, HandlerRegistry, HandlerSpec};
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_BACKUP_COUNT: u32 = 3;

static STANDARD_RESOLVER: Lazy<Arc<Resolver>> = Lazy::new(|| Arc::new(Resolver::standard()));

/// Where timing records are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
    #[default]
    File,
    Console,
    Both,
    None,
}

impl Output {
    fn wants_file(self) -> bool {
        matches!(self, Output::File | Output::Both)
    }

    fn wants_console(self) -> bool {
        matches!(self, Output::Console | Output::Both)
    }
}

/// Timer builder: the per-call or per-decoration configuration surface.
///
/// ```rust,ignore
/// let timer = Timer::new()
///     .level(LogLevel::Debug)
///     .log_dir("logs")
///     .rotate(true)
///     .max_bytes(64 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct Timer {
    pub(crate) level: LogLevel,
    pub(crate) enable: bool,
    pub(crate) output: Output,
    pub(crate) log_dir: Option<PathBuf>,
    pub(crate) log_file: Option<PathBuf>,
    pub(crate) extra_msg: Option<String>,
    pub(crate) fmt: Option<String>,
    pub(crate) datefmt: Option<String>,
    pub(crate) logger_name: Option<String>,
    pub(crate) rotate: bool,
    pub(crate) max_bytes: u64,
    pub(crate) backup_count: u32,
    pub(crate) registry: Option<Arc<HandlerRegistry>>,
    pub(crate) resolver: Option<Arc<Resolver>>,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable: true,
            output: Output::File,
            log_dir: None,
            log_file: None,
            extra_msg: None,
            fmt: None,
            datefmt: None,
            logger_name: None,
            rotate: false,
            max_bytes: DEFAULT_MAX_BYTES,
            backup_count: DEFAULT_BACKUP_COUNT,
            registry: None,
            resolver: None,
        }
    }
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn enable(mut self, enable: bool) -> Self {
        self.enable = enable;
        self
    }

    pub fn output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn log_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.log_file = Some(file.into());
        self
    }

    /// Appended to every message as ` | {extra}`.
    pub fn extra_msg(mut self, extra: impl Into<String>) -> Self {
        self.extra_msg = Some(extra.into());
        self
    }

    /// Line template, see [`crate::format`].
    pub fn fmt(mut self, template: impl Into<String>) -> Self {
        self.fmt = Some(template.into());
        self
    }

    /// strftime date format used for `{asctime}`.
    pub fn datefmt(mut self, datefmt: impl Into<String>) -> Self {
        self.datefmt = Some(datefmt.into());
        self
    }

    pub fn logger_name(mut self, name: impl Into<String>) -> Self {
        self.logger_name = Some(name.into());
        self
    }

    pub fn rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn backup_count(mut self, backup_count: u32) -> Self {
        self.backup_count = backup_count;
        self
    }

    /// Registers handlers in `registry` instead of the process-wide one.
    pub fn registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Uses a custom call-site resolver for scoped timers and segments.
    pub fn resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Whether this timer would record right now. Reads the environment.
    pub fn is_enabled(&self) -> bool {
        env::enabled(self.enable)
    }

    pub(crate) fn registry_handle(&self) -> Arc<HandlerRegistry> {
        self.registry.clone().unwrap_or_else(registry::global)
    }

    pub(crate) fn resolver_handle(&self) -> Arc<Resolver> {
        self.resolver
            .clone()
            .unwrap_or_else(|| Arc::clone(&STANDARD_RESOLVER))
    }

    /// Resolves the configuration for one invocation at `site`.
    pub fn resolve(&self, site: &CallSite) -> TimerConfig {
        TimerConfig {
            level: env::level(self.level),
            enabled: env::enabled(self.enable),
            output: self.output,
            log_path: resolve_log_path(self.log_dir.as_deref(), self.log_file.as_deref(), site),
            extra_msg: self.extra_msg.clone(),
            fmt: self.fmt.clone().unwrap_or_else(|| DEFAULT_FMT.to_string()),
            datefmt: self
                .datefmt
                .clone()
                .unwrap_or_else(|| DEFAULT_DATEFMT.to_string()),
            logger_name: self
                .logger_name
                .clone()
                .unwrap_or_else(|| site.default_logger_name()),
            rotation: self.rotate.then_some(RotationPolicy {
                max_bytes: self.max_bytes,
                backup_count: self.backup_count,
            }),
        }
    }
}

/// Configuration of a single timed invocation, with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    pub level: LogLevel,
    pub enabled: bool,
    pub output: Output,
    pub log_path: PathBuf,
    pub extra_msg: Option<String>,
    pub fmt: String,
    pub datefmt: String,
    pub logger_name: String,
    pub rotation: Option<RotationPolicy>,
}

impl TimerConfig {
    /// The handlers this configuration writes through.
    pub fn handler_specs(&self) -> Result<Vec<HandlerSpec>> {
        let formatter = Formatter::new(&self.fmt, &self.datefmt)?;
        let mut specs = Vec::with_capacity(2);
        if self.output.wants_file() {
            specs.push(HandlerSpec {
                destination: Destination::File(self.log_path.clone()),
                formatter: formatter.clone(),
                rotation: self.rotation,
            });
        }
        if self.output.wants_console() {
            specs.push(HandlerSpec {
                destination: Destination::Stderr,
                formatter,
                rotation: None,
            });
        }
        Ok(specs)
    }
}

/// Applies the log file layout rules:
///
/// - an absolute `log_file` is used verbatim;
/// - a relative `log_file` is joined onto `log_dir`, or the call site's
///   source directory;
/// - without `log_file`, `<source stem>.log` goes in `log_dir` or the source
///   directory.
pub fn resolve_log_path(log_dir: Option<&Path>, log_file: Option<&Path>, site: &CallSite) -> PathBuf {
    let base = || {
        log_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| site.source_dir())
    };
    let path = match log_file {
        Some(file) if file.is_absolute() => return file.to_path_buf(),
        Some(file) => base().join(file),
        None => base().join(format!("{}.log", site.stem())),
    };
    std::path::absolute(&path).unwrap_or(path)
}
