#![allow(dead_code)]

use std::fs;
use std::path::Path;

/// Lines of a log file; empty when the file does not exist.
pub fn read_lines(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

/// The `... in {ms} ms` figure of a record, as written.
pub fn elapsed_text(line: &str) -> &str {
    let after = line
        .split_once(" in ")
        .map(|(_, rest)| rest)
        .unwrap_or_else(|| panic!("no elapsed time in {line:?}"));
    after
        .split_once(" ms")
        .map(|(ms, _)| ms)
        .unwrap_or_else(|| panic!("no unit in {line:?}"))
}

pub fn elapsed_ms(line: &str) -> f64 {
    elapsed_text(line).parse().unwrap()
}

/// Value of a `key=value` field inside the trailing parenthesis.
pub fn field<'a>(line: &'a str, key: &str) -> &'a str {
    let needle = format!("{key}=");
    let start = line
        .find(&needle)
        .unwrap_or_else(|| panic!("no {key} in {line:?}"))
        + needle.len();
    let rest = &line[start..];
    let end = rest.find([',', ')']).unwrap_or(rest.len());
    &rest[..end]
}
