//! Log destinations.
//!
//! A handler owns one destination (a file, optionally size-rotated, or the
//! process stderr) and serialises writes to it behind its own lock. Handlers
//! are only ever created through the [`HandlerRegistry`](crate::registry::HandlerRegistry).
//!
//! Handlers carry no level threshold. One handler is shared by every timer
//! writing the destination, and each record already carries the level its
//! own timer resolved.

use crate::error::{Result, TimerError};
use crate::format::{Formatter, Record};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Size-based rollover settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RotationPolicy {
    pub max_bytes: u64,
    pub backup_count: u32,
}

/// Where a handler writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    File(PathBuf),
    Stderr,
}

pub trait Handler: Send + Sync + std::fmt::Debug {
    fn destination(&self) -> &Destination;

    fn emit(&self, record: &Record<'_>) -> io::Result<()>;
}

#[derive(Debug)]
struct FileSink {
    file: File,
    size: u64,
}

/// Appends formatted lines to one file, rolling it over by size when a
/// [`RotationPolicy`] is set.
#[derive(Debug)]
pub struct FileHandler {
    destination: Destination,
    path: PathBuf,
    formatter: Formatter,
    rotation: Option<RotationPolicy>,
    sink: Mutex<FileSink>,
}

impl FileHandler {
    /// Opens `path` for appending, creating parent directories first.
    pub fn open(
        path: &Path,
        formatter: Formatter,
        rotation: Option<RotationPolicy>,
    ) -> Result<Self> {
        let creation_failure = |source| TimerError::HandlerCreationFailure {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(creation_failure)?;
        }
        let file = open_append(path).map_err(creation_failure)?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            destination: Destination::File(path.to_path_buf()),
            path: path.to_path_buf(),
            formatter,
            rotation,
            sink: Mutex::new(FileSink { file, size }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rotation(&self) -> Option<RotationPolicy> {
        self.rotation
    }

    fn should_roll_over(&self, sink: &FileSink, incoming: u64) -> bool {
        match self.rotation {
            Some(policy) if policy.max_bytes > 0 => {
                sink.size > 0 && sink.size + incoming >= policy.max_bytes
            }
            _ => false,
        }
    }

    fn roll_over(&self, sink: &mut FileSink) -> io::Result<()> {
        let Some(policy) = self.rotation else {
            return Ok(());
        };
        sink.file.flush()?;

        if policy.backup_count == 0 {
            sink.file = OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            sink.size = 0;
            return Ok(());
        }

        let oldest = backup_path(&self.path, policy.backup_count);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..policy.backup_count).rev() {
            let from = backup_path(&self.path, index);
            if from.exists() {
                fs::rename(&from, backup_path(&self.path, index + 1))?;
            }
        }
        if self.path.exists() {
            fs::rename(&self.path, backup_path(&self.path, 1))?;
        }

        sink.file = open_append(&self.path)?;
        sink.size = 0;
        Ok(())
    }
}

impl Handler for FileHandler {
    fn destination(&self) -> &Destination {
        &self.destination
    }

    fn emit(&self, record: &Record<'_>) -> io::Result<()> {
        let mut line = self.formatter.format(record);
        line.push('\n');

        let mut sink = self.sink.lock();
        if self.should_roll_over(&sink, line.len() as u64) {
            self.roll_over(&mut sink)?;
        }
        sink.file.write_all(line.as_bytes())?;
        sink.file.flush()?;
        sink.size += line.len() as u64;
        Ok(())
    }
}

/// Writes formatted lines to the process stderr.
#[derive(Debug)]
pub struct ConsoleHandler {
    destination: Destination,
    formatter: Formatter,
}

impl ConsoleHandler {
    pub fn new(formatter: Formatter) -> Self {
        Self {
            destination: Destination::Stderr,
            formatter,
        }
    }
}

impl Handler for ConsoleHandler {
    fn destination(&self) -> &Destination {
        &self.destination
    }

    fn emit(&self, record: &Record<'_>) -> io::Result<()> {
        let line = self.formatter.format(record);
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{line}")
    }
}

/// `app.log` → `app.log.3` for index 3.
pub fn backup_path(path: &Path, index: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
