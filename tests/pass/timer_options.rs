use std::sync::Arc;
use timelog::{HandlerRegistry, LogLevel, Output, timed};

fn log_dir() -> std::path::PathBuf {
    std::env::temp_dir().join("timelog-trybuild")
}

#[timed(
    level = LogLevel::Warning,
    output = Output::Both,
    log_dir = log_dir(),
    log_file = "options.log",
    extra_msg = "nightly",
    fmt = "{asctime} {levelname:>8} {name}: {message}",
    datefmt = "%H:%M:%S",
    logger_name = "options",
    rotate = true,
    max_bytes = 4096,
    backup_count = 1,
)]
fn fully_configured() -> &'static str {
    "done"
}

#[timed(enable = false)]
fn never_logged() -> bool {
    true
}

#[timed(log_dir = log_dir(), registry = Arc::clone(registry))]
fn private_registry(registry: &Arc<HandlerRegistry>) -> usize {
    registry.len()
}

fn main() {
    assert_eq!(fully_configured(), "done");
    assert!(never_logged());

    let registry = Arc::new(HandlerRegistry::new());
    private_registry(&registry);
    assert_eq!(registry.len(), 1);
}
