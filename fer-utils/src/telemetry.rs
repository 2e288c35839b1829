//! Scoped timing utilities used for stage timings and optional tracing.
//!
//! A [`TimingGuard`] records when it was created. Dropping it logs the elapsed
//! duration under the `fer::telemetry` target when telemetry is switched on
//! and the level passes the configured threshold. [`TimingGuard::finish`]
//! hands the duration back to the caller instead, which is how the pipeline
//! collects its per-stage timings.

use std::{
    borrow::Cow,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use log::{Level, LevelFilter, log, log_enabled};

/// Log target used by every timing guard.
pub const TELEMETRY_TARGET: &str = "fer::telemetry";

static TELEMETRY_ENABLED: AtomicBool = AtomicBool::new(false);
static TELEMETRY_LEVEL: AtomicUsize = AtomicUsize::new(LevelFilter::Off as usize);

/// RAII helper that logs how long a scope took when dropped.
pub struct TimingGuard {
    label: Cow<'static, str>,
    level: Level,
    start: Instant,
    active: bool,
}

impl TimingGuard {
    fn start(label: Cow<'static, str>, level: Level, active: bool) -> Self {
        Self {
            label,
            level,
            start: Instant::now(),
            active,
        }
    }

    /// Returns `true` when the guard will emit a log entry on drop.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Elapsed time since the guard was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the clock and return the elapsed duration.
    ///
    /// The duration is still logged when the guard is active, so callers that
    /// keep the value do not lose the trace line.
    pub fn finish(mut self) -> Duration {
        let duration = self.start.elapsed();
        self.emit(duration);
        self.active = false;
        duration
    }

    fn emit(&self, duration: Duration) {
        if self.active {
            log!(
                target: TELEMETRY_TARGET,
                self.level,
                "{} completed in {:.2?}",
                self.label,
                duration
            );
        }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if self.active {
            self.emit(self.start.elapsed());
        }
    }
}

/// Start a timing guard that logs at `level` when telemetry allows it.
pub fn timing_guard(label: impl Into<Cow<'static, str>>, level: Level) -> TimingGuard {
    timing_guard_if(label, level, true)
}

/// Start a timing guard that additionally requires `enabled` to be set.
pub fn timing_guard_if(
    label: impl Into<Cow<'static, str>>,
    level: Level,
    enabled: bool,
) -> TimingGuard {
    let active =
        enabled && telemetry_allows(level) && log_enabled!(target: TELEMETRY_TARGET, level);
    TimingGuard::start(label.into(), level, active)
}

/// Run `f` and return its output together with the wall-clock time it took.
pub fn measure<T>(
    label: impl Into<Cow<'static, str>>,
    level: Level,
    f: impl FnOnce() -> T,
) -> (T, Duration) {
    let guard = timing_guard(label, level);
    let value = f();
    (value, guard.finish())
}

/// Configure the global telemetry switch and threshold.
pub fn configure(enabled: bool, level: LevelFilter) {
    TELEMETRY_ENABLED.store(enabled, Ordering::Relaxed);
    TELEMETRY_LEVEL.store(level as usize, Ordering::Relaxed);
}

/// Whether telemetry logging is currently enabled.
pub fn telemetry_enabled() -> bool {
    TELEMETRY_ENABLED.load(Ordering::Relaxed)
}

/// The most verbose level telemetry will emit.
pub fn telemetry_level() -> LevelFilter {
    let index = TELEMETRY_LEVEL.load(Ordering::Relaxed);
    LevelFilter::iter()
        .nth(index)
        .unwrap_or(LevelFilter::Off)
}

/// Returns `true` when telemetry is on and `level` is within the threshold.
pub fn telemetry_allows(level: Level) -> bool {
    telemetry_enabled() && level <= telemetry_level()
}
