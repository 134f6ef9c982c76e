//! Call-site resolution.
//!
//! Scoped timers and segments do not know who created them, so they walk the
//! live stack with the `backtrace` crate and pick the first frame that is not
//! excluded by any [`Exclusion`] rule: timelog itself, the standard library,
//! async runtimes, and anything built from the cargo registry or a git
//! checkout. Decorated functions skip the walk entirely; the attribute
//! records a [`FnSite`] at compile time.

use crate::error::{Result, TimerError};
use std::env;
use std::panic::Location;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Placeholder used wherever a name or path could not be determined.
pub const UNKNOWN: &str = "<unknown>";

/// Maximum number of frames inspected before giving up on the walk.
const MAX_STACK_DEPTH: usize = 128;

/// Marker fn name emitted by `#[timed]`; stripped from the recorded path.
const SITE_MARKER: &str = "__timelog_site";

/// Where a timed operation was invoked from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub module: String,
    /// Function name, prefixed with the impl type for methods.
    pub function: String,
    /// The file as recorded by the compiler or debug info.
    pub file: PathBuf,
    pub abs_path: PathBuf,
    pub line: Option<u32>,
}

impl CallSite {
    /// The synthetic site used when nothing better is known.
    pub fn unknown() -> Self {
        Self {
            module: UNKNOWN.to_string(),
            function: UNKNOWN.to_string(),
            file: PathBuf::from(UNKNOWN),
            abs_path: PathBuf::from(UNKNOWN),
            line: None,
        }
    }

    /// Builds a site from a `#[track_caller]` location alone.
    pub fn from_location(location: &Location<'_>) -> Self {
        let file = PathBuf::from(location.file());
        let module = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let abs_path = absolutize(&file, None).unwrap_or_else(|err| {
            trace!(%err, "falling back to the recorded path");
            file.clone()
        });
        Self {
            module,
            function: UNKNOWN.to_string(),
            file,
            abs_path,
            line: Some(location.line()),
        }
    }

    /// Builds a site from a resolved stack frame. File and line come from
    /// `caller` when the frame carries no debug info. When the frame is in
    /// the caller's file, the caller's line wins: an async frame reports the
    /// line it is polled from, not the line the timer was created on.
    pub fn from_frame(frame: &Frame, caller: &Location<'_>) -> Self {
        let Some(path) = frame.symbol_path() else {
            return Self::from_location(caller);
        };
        let (file, line) = match &frame.file {
            Some(file) if file.ends_with(caller.file()) => (file.clone(), Some(caller.line())),
            Some(file) => (file.clone(), frame.line),
            None => (PathBuf::from(caller.file()), Some(caller.line())),
        };
        let abs_path = absolutize(&file, None).unwrap_or_else(|_| file.clone());
        Self {
            module: path.module,
            function: path.function,
            file,
            abs_path,
            line,
        }
    }

    /// Builds the site of a function annotated with `#[timed]`.
    pub fn from_fn_site(site: &FnSite) -> Self {
        let file = PathBuf::from(site.file);
        let abs_path = absolutize(&file, Some(Path::new(site.manifest_dir)))
            .unwrap_or_else(|_| file.clone());
        Self {
            module: site.module.to_string(),
            function: site.qualified_name(),
            file,
            abs_path,
            line: Some(site.line),
        }
    }

    pub fn file_name(&self) -> String {
        self.abs_path
            .file_name()
            .or_else(|| self.file.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Stem used for the default `<stem>.log` file name.
    pub fn stem(&self) -> String {
        if self.is_unknown_file() {
            return "time_log".to_string();
        }
        self.abs_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "time_log".to_string())
    }

    /// Directory relative log files resolve against; the current directory
    /// when the source file is unknown.
    pub fn source_dir(&self) -> PathBuf {
        let parent = if self.is_unknown_file() {
            None
        } else {
            self.abs_path.parent().filter(|p| !p.as_os_str().is_empty())
        };
        match parent {
            Some(dir) => dir.to_path_buf(),
            None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Line number for display; `-1` when unknown.
    pub fn line_label(&self) -> String {
        self.line
            .map(|line| line.to_string())
            .unwrap_or_else(|| "-1".to_string())
    }

    /// `<module>.<function>:<line>`, the default logger name.
    pub fn default_logger_name(&self) -> String {
        format!("{}.{}:{}", self.module, self.function, self.line_label())
    }

    fn is_unknown_file(&self) -> bool {
        self.file.as_os_str() == UNKNOWN
    }
}

/// Compile-time location of a `#[timed]` function.
///
/// `path` is the `type_name` of a marker fn nested in the decorated body,
/// which spells out the impl type for methods.
#[derive(Debug, Clone, Copy)]
pub struct FnSite {
    pub module: &'static str,
    pub name: &'static str,
    pub path: &'static str,
    pub file: &'static str,
    pub line: u32,
    pub manifest_dir: &'static str,
}

impl FnSite {
    /// The function name qualified by its impl type, if any, e.g. `Cache::load`.
    pub fn qualified_name(&self) -> String {
        let path = self
            .path
            .strip_suffix(SITE_MARKER)
            .and_then(|p| p.strip_suffix("::"))
            .unwrap_or(self.path);
        let relative = path
            .strip_prefix(self.module)
            .and_then(|rest| rest.strip_prefix("::"));

        let qualified = match relative {
            Some(rest) => rest
                .split("::")
                .filter(|segment| !is_marker_segment(segment))
                .collect::<Vec<_>>()
                .join("::"),
            None => parse_symbol(path)
                .map(|parsed| parsed.function)
                .unwrap_or_default(),
        };
        if qualified.is_empty() {
            self.name.to_string()
        } else {
            qualified
        }
    }
}

/// One resolved stack frame. Inlined functions produce several frames for a
/// single return address, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub symbol: Option<String>,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
}

impl Frame {
    pub fn symbol_path(&self) -> Option<SymbolPath> {
        self.symbol.as_deref().and_then(parse_symbol)
    }
}

/// A demangled symbol split into module and function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolPath {
    pub module: String,
    pub function: String,
}

impl SymbolPath {
    pub fn crate_name(&self) -> &str {
        self.module.split("::").next().unwrap_or(&self.module)
    }
}

/// Splits a demangled symbol such as `app::db::Pool::get::{{closure}}` or
/// `<app::Job as core::ops::Drop>::drop` into module and function.
///
/// Segments starting with an uppercase letter directly before the function
/// are treated as the impl type and kept with the function. Symbols without
/// a module path (`main`, `__libc_start_main`) yield `None`.
pub fn parse_symbol(symbol: &str) -> Option<SymbolPath> {
    let symbol = strip_hash(symbol.trim());
    let path = if let Some(inner) = symbol.strip_prefix('<') {
        let close = matching_angle(inner)?;
        let self_type = inner[..close].split(" as ").next().unwrap_or_default();
        let self_type = self_type
            .trim_start_matches('&')
            .trim_start_matches("mut ")
            .trim_start_matches("dyn ");
        let rest = inner[close + 1..].trim_start_matches("::");
        if rest.is_empty() {
            self_type.to_string()
        } else {
            format!("{self_type}::{rest}")
        }
    } else {
        symbol.to_string()
    };

    let path = strip_generics(&path);
    let segments: Vec<&str> = path
        .split("::")
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && !is_marker_segment(segment))
        .collect();
    if segments.len() < 2 {
        return None;
    }

    let mut split = segments.len() - 1;
    while split > 1 && segments[split - 1].starts_with(|c: char| c.is_ascii_uppercase()) {
        split -= 1;
    }
    Some(SymbolPath {
        module: segments[..split].join("::"),
        function: segments[split..].join("::"),
    })
}

fn is_marker_segment(segment: &str) -> bool {
    segment.starts_with('{') || segment == SITE_MARKER
}

fn strip_hash(symbol: &str) -> &str {
    match symbol.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) => {
            head
        }
        _ => symbol,
    }
}

/// Index of the `>` closing an already-opened `<`, ignoring `->`.
fn matching_angle(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut prev = '\0';
    for (index, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' if prev != '-' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
        prev = c;
    }
    None
}

/// Removes `<...>` generic arguments, including a preceding `::` turbofish.
fn strip_generics(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0usize;
    let mut prev = '\0';
    for c in path.chars() {
        match c {
            '<' => {
                if depth == 0 && out.ends_with("::") {
                    out.truncate(out.len() - 2);
                }
                depth += 1;
            }
            '>' if depth > 0 && prev != '-' => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
        prev = c;
    }
    out
}

/// A predicate deciding that a frame is not a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Frames whose symbol has no module path, or no symbol at all.
    Unqualified,
    /// Frames whose symbol lives in this module path (segment-aware prefix).
    Module(String),
    /// Frames whose source file lies under this directory.
    PathPrefix(PathBuf),
    /// Frames whose source file path contains this fragment (`/` separated).
    PathFragment(String),
}

impl Exclusion {
    pub fn matches(&self, frame: &Frame) -> bool {
        match self {
            Exclusion::Unqualified => frame.symbol_path().is_none(),
            Exclusion::Module(prefix) => frame.symbol_path().is_some_and(|path| {
                let full = format!("{}::{}", path.module, path.function);
                full == *prefix || full.starts_with(&format!("{prefix}::"))
            }),
            Exclusion::PathPrefix(dir) => frame.file.as_deref().is_some_and(|f| f.starts_with(dir)),
            Exclusion::PathFragment(fragment) => frame
                .file
                .as_deref()
                .is_some_and(|f| f.to_string_lossy().replace('\\', "/").contains(fragment.as_str())),
        }
    }
}

/// Walks the stack and returns the first frame no exclusion rule matches.
#[derive(Debug, Clone)]
pub struct Resolver {
    rules: Vec<Exclusion>,
}

impl Resolver {
    /// The standard rule set: timelog's own crates, std, runtimes, the rust
    /// sysroot and every registry/git dependency.
    pub fn standard() -> Self {
        let mut rules = vec![Exclusion::Unqualified];
        rules.extend(
            [
                "timelog",
                "timelog_macros",
                "std",
                "core",
                "alloc",
                "test",
                "backtrace",
                "tokio",
                "futures",
                "futures_core",
                "futures_util",
                "futures_executor",
            ]
            .into_iter()
            .map(|name| Exclusion::Module(name.to_string())),
        );
        rules.extend(
            ["/rustc/", "/lib/rustlib/", "/.cargo/registry/", "/.cargo/git/"]
                .into_iter()
                .map(|fragment| Exclusion::PathFragment(fragment.to_string())),
        );
        if let Some(home) = env::var_os("CARGO_HOME").filter(|h| !h.is_empty()) {
            let home = PathBuf::from(home);
            rules.push(Exclusion::PathPrefix(home.join("registry")));
            rules.push(Exclusion::PathPrefix(home.join("git")));
        }
        Self { rules }
    }

    /// A resolver with no rules at all; mostly useful for tests.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn exclude(mut self, rule: Exclusion) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn exclude_module(self, prefix: impl Into<String>) -> Self {
        self.exclude(Exclusion::Module(prefix.into()))
    }

    pub fn exclude_path(self, dir: impl Into<PathBuf>) -> Self {
        self.exclude(Exclusion::PathPrefix(dir.into()))
    }

    pub fn rules(&self) -> &[Exclusion] {
        &self.rules
    }

    pub fn is_excluded(&self, frame: &Frame) -> bool {
        self.rules.iter().any(|rule| rule.matches(frame))
    }

    /// Picks the call site from an already captured list of frames,
    /// innermost first, falling back to `caller`.
    pub fn resolve_frames<I>(&self, frames: I, caller: &Location<'_>) -> CallSite
    where
        I: IntoIterator<Item = Frame>,
    {
        match frames.into_iter().find(|frame| !self.is_excluded(frame)) {
            Some(frame) => CallSite::from_frame(&frame, caller),
            None => CallSite::from_location(caller),
        }
    }

    /// Walks the live stack. Symbols are resolved lazily and the walk stops
    /// at the first match.
    pub fn resolve(&self, caller: &Location<'_>) -> CallSite {
        let mut found: Option<Frame> = None;
        let mut depth = 0usize;
        backtrace::trace(|raw| {
            depth += 1;
            backtrace::resolve_frame(raw, |symbol| {
                if found.is_some() {
                    return;
                }
                let frame = Frame {
                    symbol: symbol.name().map(|name| format!("{name:#}")),
                    file: symbol.filename().map(Path::to_path_buf),
                    line: symbol.lineno(),
                };
                if !self.is_excluded(&frame) {
                    found = Some(frame);
                }
            });
            found.is_none() && depth < MAX_STACK_DEPTH
        });

        let site = match found {
            Some(frame) => CallSite::from_frame(&frame, caller),
            None => CallSite::from_location(caller),
        };
        trace!(module = %site.module, function = %site.function, line = ?site.line, "resolved call site");
        site
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::standard()
    }
}

/// Turns a recorded source path into an absolute one.
///
/// Compiler-recorded paths are relative to the directory rustc ran in, which
/// for workspace members is the workspace root rather than the package.
/// Candidates are tried against `manifest_dir` and its ancestors, then the
/// current directory and its ancestors, and the first that exists wins.
pub fn absolutize(file: &Path, manifest_dir: Option<&Path>) -> Result<PathBuf> {
    if file.as_os_str().is_empty() || file.as_os_str() == UNKNOWN {
        return Err(TimerError::PathResolutionFailure(format!(
            "no source file for {}",
            file.display()
        )));
    }
    if file.is_absolute() {
        return Ok(file.to_path_buf());
    }

    let cwd = env::current_dir().ok();
    let bases = manifest_dir
        .into_iter()
        .flat_map(Path::ancestors)
        .chain(cwd.as_deref().into_iter().flat_map(Path::ancestors));
    for base in bases {
        let candidate = base.join(file);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    std::path::absolute(file).map_err(|err| {
        TimerError::PathResolutionFailure(format!("{}: {err}", file.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(symbol: &str, file: &str, line: u32) -> Frame {
        Frame {
            symbol: Some(symbol.to_string()),
            file: Some(PathBuf::from(file)),
            line: Some(line),
        }
    }

    #[test]
    fn test_parse_plain_function() {
        let parsed = parse_symbol("app::stage::load::h0123456789abcdef").unwrap();
        assert_eq!(parsed.module, "app::stage");
        assert_eq!(parsed.function, "load");
        assert_eq!(parsed.crate_name(), "app");
    }

    #[test]
    fn test_parse_method_and_closures() {
        let parsed = parse_symbol("app::db::Pool::get::{{closure}}::{{closure}}").unwrap();
        assert_eq!(parsed.module, "app::db");
        assert_eq!(parsed.function, "Pool::get");

        let parsed = parse_symbol("app::run::{closure#0}").unwrap();
        assert_eq!(parsed.function, "run");
    }

    #[test]
    fn test_parse_trait_impl_and_generics() {
        let parsed = parse_symbol("<app::jobs::Job as core::ops::drop::Drop>::drop").unwrap();
        assert_eq!(parsed.module, "app::jobs");
        assert_eq!(parsed.function, "Job::drop");

        let parsed = parse_symbol("<alloc::boxed::Box<F,A> as core::ops::function::FnOnce<Args>>::call_once")
            .unwrap();
        assert_eq!(parsed.crate_name(), "alloc");

        let parsed = parse_symbol("app::apply::<fn() -> u8, i32>").unwrap();
        assert_eq!(parsed.module, "app");
        assert_eq!(parsed.function, "apply");
    }

    #[test]
    fn test_unqualified_symbols() {
        assert_eq!(parse_symbol("main"), None);
        assert_eq!(parse_symbol("__libc_start_main"), None);
        assert!(Exclusion::Unqualified.matches(&Frame::default()));
    }

    #[test]
    fn test_module_rule_is_segment_aware() {
        let rule = Exclusion::Module("timelog".to_string());
        assert!(rule.matches(&frame("timelog::scope::Timer::enter", "/x/src/scope.rs", 1)));
        assert!(!rule.matches(&frame("timelog_app::main", "/x/src/main.rs", 1)));
    }

    #[test]
    fn test_standard_rules_skip_library_frames() {
        let caller = Location::caller();
        let frames = vec![
            frame("backtrace::backtrace::trace", "/home/u/.cargo/registry/src/backtrace/lib.rs", 10),
            frame("timelog::scope::Timer::enter", "/work/timelog/src/scope.rs", 80),
            frame("serde_json::de::from_str", "/home/u/.cargo/registry/src/serde_json/de.rs", 5),
            frame("my_app::pipeline::Stage::run", "/work/my_app/src/pipeline.rs", 42),
            frame("my_app::main", "/work/my_app/src/main.rs", 7),
        ];

        let site = Resolver::standard().resolve_frames(frames, caller);
        assert_eq!(site.module, "my_app::pipeline");
        assert_eq!(site.function, "Stage::run");
        assert_eq!(site.abs_path, PathBuf::from("/work/my_app/src/pipeline.rs"));
        assert_eq!(site.line, Some(42));
        assert_eq!(site.file_name(), "pipeline.rs");
        assert_eq!(site.default_logger_name(), "my_app::pipeline.Stage::run:42");
    }

    #[test]
    fn test_custom_rules_extend_standard_set() {
        let caller = Location::caller();
        let frames = vec![
            frame("my_app::telemetry::timed", "/work/my_app/src/telemetry.rs", 3),
            frame("my_app::jobs::run", "/work/my_app/src/jobs.rs", 9),
        ];
        let site = Resolver::standard()
            .exclude_module("my_app::telemetry")
            .resolve_frames(frames, caller);
        assert_eq!(site.function, "run");
    }

    #[test]
    fn test_fallback_to_caller_location() {
        let caller = Location::caller();
        let frames = vec![frame("std::rt::lang_start", "/rustc/abc/library/std/src/rt.rs", 1)];

        let site = Resolver::standard().resolve_frames(frames, caller);
        assert_eq!(site.line, Some(caller.line()));
        assert_eq!(site.module, "callsite");
        assert_eq!(site.function, UNKNOWN);
    }

    #[test]
    fn test_frame_without_debug_info_borrows_location() {
        let caller = Location::caller();
        let frames = vec![Frame {
            symbol: Some("my_app::work".to_string()),
            file: None,
            line: None,
        }];
        let site = Resolver::empty().resolve_frames(frames, caller);
        assert_eq!(site.module, "my_app");
        assert_eq!(site.file, PathBuf::from(caller.file()));
        assert_eq!(site.line, Some(caller.line()));
    }

    #[test]
    fn test_caller_line_wins_in_the_same_file() {
        let caller = Location::caller();
        let file = Path::new("/work/timelog").join(caller.file());
        let frames = vec![Frame {
            symbol: Some("my_app::fetch::{{closure}}".to_string()),
            file: Some(file.clone()),
            line: Some(caller.line() + 4),
        }];
        let site = Resolver::empty().resolve_frames(frames, caller);
        assert_eq!(site.function, "fetch");
        assert_eq!(site.abs_path, file);
        assert_eq!(site.line, Some(caller.line()));
    }

    #[test]
    fn test_unknown_site_defaults() {
        let site = CallSite::unknown();
        assert_eq!(site.stem(), "time_log");
        assert_eq!(site.line_label(), "-1");
        assert_eq!(site.source_dir(), env::current_dir().unwrap());
        assert!(absolutize(&site.file, None).is_err());
    }

    #[test]
    fn test_fn_site_qualified_names() {
        let site = FnSite {
            module: "my_app::db",
            name: "get",
            path: "my_app::db::Pool::get::__timelog_site",
            file: "src/db.rs",
            line: 12,
            manifest_dir: "/nowhere",
        };
        assert_eq!(site.qualified_name(), "Pool::get");

        let site = FnSite {
            path: "my_app::db::fetch::{{closure}}::__timelog_site",
            name: "fetch",
            ..site
        };
        assert_eq!(site.qualified_name(), "fetch");

        let site = FnSite {
            path: "<my_app::db::Pool as my_app::Source>::load::__timelog_site",
            name: "load",
            ..site
        };
        assert_eq!(site.qualified_name(), "Pool::load");
    }

    #[test]
    fn test_absolutize_prefers_existing_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let member = dir.path().join("member");
        std::fs::create_dir_all(member.join("src")).unwrap();
        std::fs::write(member.join("src/lib.rs"), "").unwrap();

        // recorded relative to the workspace root, manifest dir is the member
        let found = absolutize(Path::new("member/src/lib.rs"), Some(&member)).unwrap();
        assert_eq!(found, member.join("src/lib.rs"));
    }
}
