use std::path::PathBuf;
use timelog::{LogLevel, Output, Timer, time_log, timed};
use tracing_subscriber::EnvFilter;

fn log_dir() -> PathBuf {
    std::env::temp_dir().join("timelog-demo")
}

/// Example function timed with the default configuration plus a log directory
#[timed(log_dir = log_dir())]
fn checksum(data: &[u8]) -> u32 {
    data.iter()
        .fold(0u32, |acc, &byte| acc.rotate_left(5) ^ u32::from(byte))
}

#[timed(log_dir = log_dir(), rotate = true, max_bytes = 16 * 1024, backup_count = 2)]
fn parse_numbers(text: &str) -> Result<Vec<u64>, std::num::ParseIntError> {
    text.split(',').map(|part| part.trim().parse()).collect()
}

struct Pipeline {
    stages: Vec<&'static str>,
}

impl Pipeline {
    #[timed(
        log_dir = log_dir(),
        level = LogLevel::Debug,
        extra_msg = format!("stages={}", self.stages.len())
    )]
    fn run(&self, input: &[u8]) -> usize {
        self.stages
            .iter()
            .filter(|stage| checksum(stage.as_bytes()) != checksum(input))
            .count()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=timelog=debug shows handler registration
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut fill = Timer::new().log_dir(log_dir()).start("fill");
    let data: Vec<u8> = (0..=255u8).cycle().take(1 << 20).collect();
    let fill_ms = fill.stop()?;

    let sum = checksum(&data);
    let numbers = parse_numbers("4, 8, 15, 16, 23, 42")?;
    if let Err(err) = parse_numbers("4, eight") {
        println!("rejected input: {err}");
    }

    let pipeline = Pipeline {
        stages: vec!["decode", "filter", "encode"],
    };
    let stages = Timer::new()
        .log_dir(log_dir())
        .logger_name("pipeline")
        .scope(|| pipeline.run(&data));

    {
        let _report = time_log("report", Timer::new().log_dir(log_dir()).output(Output::Both));
        println!("filled {} bytes in {fill_ms:.3} ms", data.len());
        println!("checksum {sum:#010x}, {} numbers, {stages} stages", numbers.len());
    }

    println!("timing records written under {}", log_dir().display());
    Ok(())
}
