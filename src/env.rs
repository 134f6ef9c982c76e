//! Environment overrides for the enable flag and the log level.
//!
//! Every lookup goes straight to the process environment. Nothing here is
//! memoized, so exporting `TIME_LOG_ENABLE=0` into a running process (or
//! setting it from a test) takes effect on the very next timed call.

use crate::level::LogLevel;

/// Checked in order; the first alias that is set decides, even when empty.
pub const ENABLE_VARS: [&str; 3] = ["TIME_LOG_ENABLE", "TIMER_LOG_ENABLE", "TIMER_ENABLE"];

/// Checked in order; the first alias with a non-empty value decides.
pub const LEVEL_VARS: [&str; 3] = ["TIME_LOG_LEVEL", "TIMER_LOG_LEVEL", "TIMER_LEVEL"];

/// Resolves the enable flag, letting the environment override `configured`.
pub fn enabled(configured: bool) -> bool {
    enabled_with(configured, |key| std::env::var(key).ok())
}

/// Resolves the record level, letting the environment override `configured`.
pub fn level(configured: LogLevel) -> LogLevel {
    level_with(configured, |key| std::env::var(key).ok())
}

pub(crate) fn enabled_with<F>(configured: bool, lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match ENABLE_VARS.iter().find_map(|key| lookup(key)) {
        Some(value) => parse_flag(&value),
        None => configured,
    }
}

pub(crate) fn level_with<F>(configured: LogLevel, lookup: F) -> LogLevel
where
    F: Fn(&str) -> Option<String>,
{
    first_set(&LEVEL_VARS, lookup)
        .and_then(|value| value.parse().ok())
        .unwrap_or(configured)
}

fn first_set<F>(keys: &[&str], lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// `0`, `false` and blank values disable; anything else enables.
fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}
