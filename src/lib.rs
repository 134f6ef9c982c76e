//! Execution timing that writes itself to log files.
//!
//! Four ways to time code, all sharing one configuration surface ([`Timer`]):
//!
//! - **Decorator**: `#[timed(...)]` on a sync or async fn.
//! - **Scoped guard**: [`Timer::enter`], [`Timer::scope`] and
//!   [`Timer::scope_async`], plus the [`time_log`] shorthand.
//! - **Explicit wrapper**: [`Timer::run`] / [`Timer::run_async`].
//! - **Segment**: [`start`] / [`Segment`] for sub-spans of a function body,
//!   returning the elapsed milliseconds.
//!
//! Each record names the call site (module, file, absolute path, line) plus
//! pid and thread, e.g.
//!
//! ```text
//! 2024-03-09 07:05:01.042 | INFO     | app.load:12 - Ran load in 3.127 ms (module=app, file=main.rs, abs=/srv/app/src/main.rs, line=12, pid=4242, thread=main)
//! ```
//!
//! Unless configured otherwise, records go to `<source stem>.log` next to the
//! calling source file. Every destination gets exactly one handler per
//! process, however many timers point at it.
//!
//! # Environment
//!
//! `TIME_LOG_ENABLE` / `TIMER_LOG_ENABLE` / `TIMER_ENABLE` switch timing off
//! (`0` or `false`) or on, and `TIME_LOG_LEVEL` / `TIMER_LOG_LEVEL` /
//! `TIMER_LEVEL` override the level. Both win over the configuration and are
//! read on every call.
//!
//! # Example
//!
//! ```rust,ignore
//! use timelog::{LogLevel, Timer, timed};
//!
//! #[timed(level = LogLevel::Debug, log_dir = "logs")]
//! fn load(path: &str) -> std::io::Result<String> {
//!     std::fs::read_to_string(path)
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let text = load("input.txt")?;
//!
//!     let mut parse = timelog::start("parse");
//!     let words = text.split_whitespace().count();
//!     let ms = parse.stop()?;
//!
//!     Timer::new().logger_name("report").scope(|| println!("{words} words, parsed in {ms:.3} ms"));
//!     Ok(())
//! }
//! ```

pub mod callsite;
pub mod config;
pub mod env;
pub mod error;
pub mod format;
pub mod handler;
pub mod level;
pub mod registry;
pub mod scope;
pub mod timer;

pub use callsite::{CallSite, FnSite, Resolver};
pub use config::{Output, Timer, TimerConfig};
pub use error::{Result, TimerError};
pub use level::LogLevel;
pub use registry::HandlerRegistry;
pub use scope::{Segment, TimingGuard, start, time_log};
pub use timelog_macros::timed;
