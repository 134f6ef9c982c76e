mod common;

use common::read_lines;
use serial_test::serial;
use std::path::Path;
use tempfile::tempdir;
use timelog::env::{ENABLE_VARS, LEVEL_VARS};
use timelog::{LogLevel, Timer, timed};

/// Clears every override on creation and again on drop.
struct CleanEnv;

impl CleanEnv {
    fn new() -> Self {
        clear();
        CleanEnv
    }

    fn set(&self, key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) };
    }

    fn remove(&self, key: &str) {
        unsafe { std::env::remove_var(key) };
    }
}

impl Drop for CleanEnv {
    fn drop(&mut self) {
        clear();
    }
}

fn clear() {
    for key in ENABLE_VARS.iter().chain(LEVEL_VARS.iter()) {
        unsafe { std::env::remove_var(key) };
    }
}

#[timed(log_file = log)]
fn enabled_work(log: &Path) -> u32 {
    7
}

#[timed(enable = false, log_file = log)]
fn disabled_work(log: &Path) -> u32 {
    8
}

#[timed(level = LogLevel::Debug, log_file = log)]
fn debug_work(log: &Path) {}

#[test]
#[serial]
fn test_env_disable_beats_configuration() {
    let env = CleanEnv::new();
    env.set("TIME_LOG_ENABLE", "0");

    let dir = tempdir().unwrap();
    let log = dir.path().join("off.log");
    assert_eq!(enabled_work(&log), 7);
    assert!(!log.exists());
}

#[test]
#[serial]
fn test_blank_enable_variable_disables() {
    let env = CleanEnv::new();
    env.set("TIME_LOG_ENABLE", "");
    env.set("TIMER_LOG_ENABLE", "1");

    let dir = tempdir().unwrap();
    let log = dir.path().join("blank.log");
    assert_eq!(enabled_work(&log), 7);
    assert!(!log.exists());
}

#[test]
#[serial]
fn test_env_enable_beats_configuration() {
    let env = CleanEnv::new();
    env.set("TIMER_LOG_ENABLE", "1");

    let dir = tempdir().unwrap();
    let log = dir.path().join("on.log");
    assert_eq!(disabled_work(&log), 8);
    assert_eq!(read_lines(&log).len(), 1);
}

#[test]
#[serial]
fn test_env_is_read_on_every_call() {
    let env = CleanEnv::new();
    let dir = tempdir().unwrap();
    let log = dir.path().join("toggle.log");

    env.set("TIME_LOG_ENABLE", "false");
    enabled_work(&log);
    assert_eq!(read_lines(&log).len(), 0);

    env.remove("TIME_LOG_ENABLE");
    enabled_work(&log);
    assert_eq!(read_lines(&log).len(), 1);

    env.set("TIMER_ENABLE", "FALSE");
    enabled_work(&log);
    assert_eq!(read_lines(&log).len(), 1);

    env.set("TIME_LOG_ENABLE", "1");
    enabled_work(&log);
    assert_eq!(read_lines(&log).len(), 2);
}

#[test]
#[serial]
fn test_env_level_override() {
    let env = CleanEnv::new();
    let dir = tempdir().unwrap();
    let log = dir.path().join("level.log");

    debug_work(&log);
    env.set("TIME_LOG_LEVEL", "error");
    debug_work(&log);
    env.set("TIME_LOG_LEVEL", "loud");
    debug_work(&log);

    let lines = read_lines(&log);
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("| DEBUG    |"), "{}", lines[0]);
    assert!(lines[1].contains("| ERROR    |"), "{}", lines[1]);
    assert!(lines[2].contains("| DEBUG    |"), "{}", lines[2]);
}

#[test]
#[serial]
fn test_disabled_surfaces_stay_inert() {
    let env = CleanEnv::new();
    env.set("TIMER_ENABLE", "0");

    let guard = Timer::new().enter();
    assert!(!guard.is_active());

    let mut segment = timelog::start("quiet");
    assert!(segment.call_site().is_none());
    assert!(segment.stop().unwrap() >= 0.0);

    let default_log = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/env_override_tests.log");
    assert!(!default_log.exists());
}
