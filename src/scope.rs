//! The timing surfaces: scoped guards (sync and async), explicit call
//! wrappers, the hooks behind `#[timed]`, and manual segments.
//!
//! Every surface checks the enable flag first. A disabled timer resolves no
//! call site, opens no handler and reads no clock.

use crate::callsite::{CallSite, FnSite};
use crate::config::Timer;
use crate::error::{self, Result};
use crate::timer::{Emitter, MessageKind, Stopwatch, TimerState, compose_message, elapsed_ms};
use std::future::Future;
use std::panic::Location;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardKind {
    Call,
    Scope,
}

#[derive(Debug)]
struct Active {
    watch: Stopwatch,
    emitter: Emitter,
    site: CallSite,
    label: String,
    kind: GuardKind,
    extra: Option<String>,
}

/// Times the enclosing scope and writes one record when dropped.
///
/// The record is written on every exit path, including unwinding; a scope
/// left by a panic is tagged `ERR:panic`. The guard never catches or alters
/// the panic.
#[must_use = "the scope is only timed while the guard is alive"]
#[derive(Debug)]
pub struct TimingGuard {
    active: Option<Active>,
}

impl TimingGuard {
    /// A guard that records nothing.
    pub fn disabled() -> Self {
        Self { active: None }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn call_site(&self) -> Option<&CallSite> {
        self.active.as_ref().map(|active| &active.site)
    }

    /// Time elapsed so far, if the guard is recording.
    pub fn elapsed(&self) -> Option<Duration> {
        match self.active.as_ref()?.watch.state() {
            TimerState::Running(started) => Some(started.elapsed()),
            _ => None,
        }
    }

    /// Stops the timer now, writes the record and returns the elapsed
    /// milliseconds.
    pub fn finish(mut self) -> Option<f64> {
        self.complete()
    }

    fn complete(&mut self) -> Option<f64> {
        let mut active = self.active.take()?;
        let elapsed = match active.watch.stop() {
            Ok(elapsed) => elapsed_ms(elapsed),
            Err(err) => {
                error::report("timer was not running", &err);
                return None;
            }
        };
        let kind = match active.kind {
            GuardKind::Call => MessageKind::Call,
            GuardKind::Scope => MessageKind::Scope {
                panicked: std::thread::panicking(),
            },
        };
        let message = compose_message(kind, &active.label, elapsed, &active.site, active.extra.as_deref());
        active.emitter.emit(&message);
        Some(elapsed)
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        self.complete();
    }
}

impl Timer {
    /// Starts timing the current scope (the sync context manager).
    ///
    /// Handler setup failures are reported on stderr and the scope runs
    /// untimed; use [`Timer::try_enter`] to get them as an error instead.
    #[track_caller]
    pub fn enter(&self) -> TimingGuard {
        self.enter_at(Location::caller())
    }

    /// Like [`Timer::enter`], but surfaces `HandlerCreationFailure` and
    /// `InvalidFormat`.
    #[track_caller]
    pub fn try_enter(&self) -> Result<TimingGuard> {
        self.open_scope(Location::caller(), None)
    }

    /// Runs `f` inside a timed scope.
    #[track_caller]
    pub fn scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.enter_at(Location::caller());
        f()
    }

    /// Times `fut` from its first poll to completion (the async context
    /// manager). Dropping the future early still writes the record.
    #[track_caller]
    pub fn scope_async<Fut>(&self, fut: Fut) -> impl Future<Output = Fut::Output> + use<Fut>
    where
        Fut: Future,
    {
        let caller = Location::caller();
        let timer = self.clone();
        async move {
            let _guard = timer.enter_at(caller);
            fut.await
        }
    }

    /// Calls `f` and records `Ran {name} in ...`: the decorator applied by
    /// hand.
    #[track_caller]
    pub fn run<F, R>(&self, name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.enter_call(Location::caller(), name);
        f()
    }

    /// Async counterpart of [`Timer::run`]; suspension time counts.
    #[track_caller]
    pub fn run_async<Fut>(&self, name: &str, fut: Fut) -> impl Future<Output = Fut::Output> + use<Fut>
    where
        Fut: Future,
    {
        let caller = Location::caller();
        let timer = self.clone();
        let name = name.to_string();
        async move {
            let _guard = timer.enter_call(caller, &name);
            fut.await
        }
    }

    /// Entry point used by `#[timed]`. The site is known statically so no
    /// stack walk happens.
    pub fn enter_fn(&self, site: &FnSite) -> TimingGuard {
        if !self.is_enabled() {
            return TimingGuard::disabled();
        }
        let call_site = CallSite::from_fn_site(site);
        self.activate(call_site, site.name.to_string(), GuardKind::Call)
            .unwrap_or_else(|err| untimed(&err))
    }

    /// Starts a manual segment using this timer's configuration.
    #[track_caller]
    pub fn start(&self, name: impl Into<String>) -> Segment {
        let mut segment = Segment::at(name.into(), self.clone(), Location::caller());
        segment.watch = Stopwatch::started();
        segment
    }

    pub(crate) fn enter_at(&self, caller: &'static Location<'static>) -> TimingGuard {
        self.open_scope(caller, None).unwrap_or_else(|err| untimed(&err))
    }

    fn enter_call(&self, caller: &'static Location<'static>, name: &str) -> TimingGuard {
        self.open_scope(caller, Some(name)).unwrap_or_else(|err| untimed(&err))
    }

    fn open_scope(&self, caller: &'static Location<'static>, call_name: Option<&str>) -> Result<TimingGuard> {
        if !self.is_enabled() {
            return Ok(TimingGuard::disabled());
        }
        let site = self.resolver_handle().resolve(caller);
        match call_name {
            Some(name) => self.activate(site, name.to_string(), GuardKind::Call),
            None => {
                let label = self
                    .logger_name
                    .clone()
                    .unwrap_or_else(|| site.default_logger_name());
                self.activate(site, label, GuardKind::Scope)
            }
        }
    }

    fn activate(&self, site: CallSite, label: String, kind: GuardKind) -> Result<TimingGuard> {
        let config = self.resolve(&site);
        let emitter = Emitter::open(&config, &self.registry_handle())?;
        Ok(TimingGuard {
            active: Some(Active {
                watch: Stopwatch::started(),
                emitter,
                site,
                label,
                kind,
                extra: config.extra_msg,
            }),
        })
    }
}

fn untimed(err: &dyn std::fmt::Display) -> TimingGuard {
    error::report("running untimed", err);
    TimingGuard::disabled()
}

/// A manually started and stopped timing span inside a function body.
///
/// ```rust,ignore
/// let mut encode = timelog::start("encode");
/// let bytes = encode_frames(&frames);
/// let ms = encode.stop()?;
/// ```
#[derive(Debug)]
pub struct Segment {
    name: String,
    timer: Timer,
    caller: &'static Location<'static>,
    site: Option<CallSite>,
    watch: Stopwatch,
}

impl Segment {
    /// An idle segment with the default configuration; call
    /// [`Segment::start`] to begin timing.
    #[track_caller]
    pub fn new(name: impl Into<String>) -> Self {
        Self::at(name.into(), Timer::new(), Location::caller())
    }

    /// An idle segment that logs through `timer`'s configuration.
    #[track_caller]
    pub fn with_timer(name: impl Into<String>, timer: Timer) -> Self {
        Self::at(name.into(), timer, Location::caller())
    }

    fn at(name: String, timer: Timer, caller: &'static Location<'static>) -> Self {
        let site = timer
            .is_enabled()
            .then(|| timer.resolver_handle().resolve(caller));
        Self {
            name,
            timer,
            caller,
            site,
            watch: Stopwatch::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TimerState {
        self.watch.state()
    }

    /// The call site captured when the segment was created, if it was
    /// enabled at that time.
    pub fn call_site(&self) -> Option<&CallSite> {
        self.site.as_ref()
    }

    pub fn start(&mut self) -> Result<()> {
        self.watch.start()
    }

    /// Stops the segment, logs it when enabled, and returns the elapsed
    /// milliseconds. Fails with `InvalidTimerState` if the segment is not
    /// running.
    pub fn stop(&mut self) -> Result<f64> {
        let elapsed = elapsed_ms(self.watch.stop()?);
        if self.timer.is_enabled() {
            if let Err(err) = self.log(elapsed) {
                error::report("segment not logged", &err);
            }
        }
        Ok(elapsed)
    }

    fn log(&mut self, elapsed: f64) -> Result<()> {
        let caller = self.caller;
        let site = self
            .site
            .get_or_insert_with(|| CallSite::from_location(caller));
        let config = self.timer.resolve(site);
        let emitter = Emitter::open(&config, &self.timer.registry_handle())?;
        emitter.emit(&compose_message(
            MessageKind::Segment,
            &self.name,
            elapsed,
            site,
            config.extra_msg.as_deref(),
        ));
        Ok(())
    }
}

/// Times the current scope under the logical name `name`; sugar for
/// `timer.logger_name(name).enter()`.
///
/// ```rust,ignore
/// let _load = time_log("load", Timer::new().log_file("run.log"));
/// load_data();
/// ```
#[track_caller]
pub fn time_log(name: impl Into<String>, timer: Timer) -> TimingGuard {
    timer.logger_name(name).enter_at(Location::caller())
}

/// Starts a running segment with the default configuration.
#[track_caller]
pub fn start(name: impl Into<String>) -> Segment {
    let name = name.into();
    let mut segment = Segment::at(name, Timer::new(), Location::caller());
    segment.watch = Stopwatch::started();
    segment
}
