//! Process-wide handler registry.
//!
//! The registry maps a log destination to the single handler writing it. The
//! global instance is created lazily on first use and lives until the process
//! exits; separate registries can be built for isolation and attached to a
//! [`Timer`](crate::Timer).
//!
//! A rotating and a non-rotating handler for the same path are different
//! entries. Both append to the same file and how their writes and rollovers
//! interleave is undefined.

use crate::error::{Result, TimerError};
use crate::format::Formatter;
use crate::handler::{ConsoleHandler, Destination, FileHandler, Handler, RotationPolicy};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

static GLOBAL: Lazy<Arc<HandlerRegistry>> = Lazy::new(|| Arc::new(HandlerRegistry::new()));

/// The registry used by every timer that was not given its own.
pub fn global() -> Arc<HandlerRegistry> {
    Arc::clone(&GLOBAL)
}

/// Everything needed to build a handler if the destination is new.
#[derive(Debug, Clone)]
pub struct HandlerSpec {
    pub destination: Destination,
    pub formatter: Formatter,
    pub rotation: Option<RotationPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum HandlerKey {
    File {
        path: PathBuf,
        rotation: Option<RotationPolicy>,
    },
    Stderr,
}

#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: Mutex<HashMap<HandlerKey, Arc<dyn Handler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handler for `spec.destination`, creating it on first use.
    ///
    /// An existing handler is returned unchanged, whatever format or date
    /// format the new spec asks for. The lookup and the creation happen under one lock, so racing
    /// first registrations still produce a single handler.
    pub fn get_or_create(&self, spec: &HandlerSpec) -> Result<Arc<dyn Handler>> {
        let key = match &spec.destination {
            Destination::File(path) => HandlerKey::File {
                path: prepare_path(path)?,
                rotation: spec.rotation,
            },
            Destination::Stderr => HandlerKey::Stderr,
        };

        let mut handlers = self.handlers.lock();
        if let Some(existing) = handlers.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let handler: Arc<dyn Handler> = match &key {
            HandlerKey::File { path, rotation } => Arc::new(FileHandler::open(
                path,
                spec.formatter.clone(),
                *rotation,
            )?),
            HandlerKey::Stderr => Arc::new(ConsoleHandler::new(spec.formatter.clone())),
        };
        debug!(destination = ?handler.destination(), rotation = ?spec.rotation, "registered log handler");
        handlers.insert(key, Arc::clone(&handler));
        Ok(handler)
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    /// Number of handlers (rotating or not) writing to `path`.
    pub fn count_for(&self, path: &Path) -> usize {
        let wanted = normalize(path);
        self.handlers
            .lock()
            .keys()
            .filter(|key| matches!(key, HandlerKey::File { path, .. } if *path == wanted))
            .count()
    }
}

/// Creates the parent directory and returns the key path with the parent
/// canonicalized, so aliases of one directory share a handler.
fn prepare_path(path: &Path) -> Result<PathBuf> {
    let creation_failure = |source| TimerError::HandlerCreationFailure {
        path: path.to_path_buf(),
        source,
    };
    let absolute = std::path::absolute(path).map_err(creation_failure)?;
    if let Some(parent) = absolute.parent() {
        fs::create_dir_all(parent).map_err(creation_failure)?;
    }
    Ok(normalize(&absolute))
}

fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|dir| dir.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}
