//! The authoritative show timer.

use crate::error::{TimerError, TimerResult};
use chrono::{Local, NaiveTime, TimeZone};
use parking_lot::{Mutex, RwLock};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Tick cadence for recomputing remaining values.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Clock source, swappable in tests. Returns Unix milliseconds.
type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

fn system_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A command applied to the timer.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerCommand {
    /// Arm the countdown from its current value and run.
    StartCountdown,
    /// Stop the countdown, keeping the last displayed value.
    PauseCountdown,
    /// Zero the countdown.
    ResetCountdown,
    /// Overwrite the countdown value (seconds).
    SetCountdownTime(f64),
    /// Add a signed number of seconds to the countdown.
    AdjustCountdown(f64),
    /// Aim the count-to-time timer at an `HH:MM:SS` wall-clock target.
    SetCountUpTarget(String),
    /// Run the count-to-time timer toward its target.
    StartCountUp,
    /// Stop the count-to-time timer, keeping its target.
    PauseCountUp,
    /// Clear the count-to-time timer and its target.
    ResetCountUp,
}

impl TimerCommand {
    /// Resolves a wire command into a [`TimerCommand`].
    ///
    /// `action` selects the command; the optional fields supply its
    /// argument where one is needed.
    pub fn parse(
        action: &str,
        countdown_time: Option<f64>,
        adjustment: Option<f64>,
        target_time_string: Option<&str>,
    ) -> TimerResult<Self> {
        match action {
            "startCountdown" => Ok(Self::StartCountdown),
            "pauseCountdown" => Ok(Self::PauseCountdown),
            "resetCountdown" => Ok(Self::ResetCountdown),
            "setCountdownTime" => Ok(Self::SetCountdownTime(countdown_time.unwrap_or(0.0))),
            "adjustCountdown" => Ok(Self::AdjustCountdown(adjustment.unwrap_or(0.0))),
            "setCountUpTarget" => Ok(Self::SetCountUpTarget(
                target_time_string.unwrap_or_default().to_string(),
            )),
            "startCountUp" => Ok(Self::StartCountUp),
            "pauseCountUp" => Ok(Self::PauseCountUp),
            "resetCountUp" => Ok(Self::ResetCountUp),
            other => Err(TimerError::unknown_action(other)),
        }
    }
}

/// One sub-timer: a remaining value counting toward a target.
#[derive(Debug, Clone, Default)]
struct SubTimer {
    /// Remaining seconds as last computed.
    value: f64,
    /// Whether the sub-timer is running.
    running: bool,
    /// Target instant, Unix milliseconds, while armed.
    target: Option<u64>,
}

impl SubTimer {
    fn remaining_at(&self, now: u64) -> Option<f64> {
        self.target
            .map(|t| (t.saturating_sub(now)) as f64 / 1000.0)
    }

    /// Recomputes the value from the target; returns true if a running
    /// timer just hit zero.
    fn tick(&mut self, now: u64) -> bool {
        if let Some(remaining) = self.remaining_at(now) {
            self.value = remaining;
            if self.running && remaining <= 0.0 {
                self.value = 0.0;
                self.running = false;
                self.target = None;
                return true;
            }
        }
        false
    }
}

#[derive(Debug, Default)]
struct TimerInner {
    countdown: SubTimer,
    count_to_time: SubTimer,
    /// `HH:MM:SS` representation of the count-to-time target, while armed.
    count_to_time_target_string: Option<String>,
}

/// Point-in-time copy of both sub-timers.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerSnapshot {
    /// Remaining countdown seconds.
    pub countdown_value: f64,
    /// Whether the countdown is running.
    pub countdown_running: bool,
    /// Countdown target, Unix milliseconds, while armed.
    pub countdown_target: Option<u64>,
    /// Remaining count-to-time seconds.
    pub count_to_time_value: f64,
    /// Whether the count-to-time timer is running.
    pub count_to_time_running: bool,
    /// Count-to-time target, Unix milliseconds, while armed.
    pub count_to_time_target: Option<u64>,
    /// `HH:MM:SS` form of the count-to-time target, while armed.
    pub count_to_time_target_string: Option<String>,
    /// Snapshot time, Unix milliseconds.
    pub timestamp: u64,
}

/// The authoritative timer.
///
/// Mutated only through [`ShowTimer::apply`], [`ShowTimer::tick`], and
/// [`ShowTimer::reset_countdown_to`]; every read is a snapshot copy, so
/// polling handlers never observe a half-applied command.
pub struct ShowTimer {
    inner: RwLock<TimerInner>,
    subscribers: Mutex<Vec<Sender<TimerSnapshot>>>,
    clock: Clock,
}

impl ShowTimer {
    /// Creates a timer using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(system_millis))
    }

    /// Creates a timer with an explicit clock (tests).
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            inner: RwLock::new(TimerInner::default()),
            subscribers: Mutex::new(Vec::new()),
            clock,
        }
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }

    /// Current wall-clock as `HH:MM:SS`.
    pub fn current_time_string(&self) -> String {
        format_millis_as_hms(self.now())
    }

    /// Applies a command.
    ///
    /// A malformed count-to-time target is rejected and logged; the
    /// previously armed target stays in effect.
    pub fn apply(&self, command: TimerCommand) -> TimerResult<()> {
        let now = self.now();
        let mut inner = self.inner.write();
        match command {
            TimerCommand::StartCountdown => {
                let millis = (inner.countdown.value.max(0.0) * 1000.0) as u64;
                inner.countdown.target = Some(now + millis);
                inner.countdown.running = true;
            }
            TimerCommand::PauseCountdown => {
                if let Some(remaining) = inner.countdown.remaining_at(now) {
                    inner.countdown.value = remaining.max(0.0);
                }
                inner.countdown.running = false;
                inner.countdown.target = None;
            }
            TimerCommand::ResetCountdown => {
                inner.countdown = SubTimer::default();
            }
            TimerCommand::SetCountdownTime(value) => {
                let value = value.max(0.0);
                inner.countdown.value = value;
                if inner.countdown.running {
                    inner.countdown.target = Some(now + (value * 1000.0) as u64);
                }
            }
            TimerCommand::AdjustCountdown(delta) => {
                if inner.countdown.running {
                    if let Some(remaining) = inner.countdown.remaining_at(now) {
                        let adjusted = (remaining + delta).max(0.0);
                        inner.countdown.value = adjusted;
                        inner.countdown.target = Some(now + (adjusted * 1000.0) as u64);
                    }
                } else {
                    inner.countdown.value = (inner.countdown.value + delta).max(0.0);
                }
            }
            TimerCommand::SetCountUpTarget(input) => {
                let (target, repr) = resolve_clock_target(&input, now).map_err(|err| {
                    warn!(input, "rejected count-to-time target");
                    err
                })?;
                inner.count_to_time.target = Some(target);
                inner.count_to_time.value = (target.saturating_sub(now)) as f64 / 1000.0;
                inner.count_to_time_target_string = Some(repr);
                debug!(target, "armed count-to-time target");
            }
            TimerCommand::StartCountUp => {
                if inner.count_to_time.target.is_some() {
                    inner.count_to_time.running = true;
                } else {
                    debug!("ignored startCountUp with no target armed");
                }
            }
            TimerCommand::PauseCountUp => {
                inner.count_to_time.running = false;
            }
            TimerCommand::ResetCountUp => {
                inner.count_to_time = SubTimer::default();
                inner.count_to_time_target_string = None;
            }
        }
        Ok(())
    }

    /// Stops, overwrites, re-arms from now, and restarts the countdown in
    /// one atomic step. Used when the operator selects a different cue so
    /// the new cue's duration starts counting immediately.
    pub fn reset_countdown_to(&self, value: f64) {
        let now = self.now();
        let value = value.max(0.0);
        let mut inner = self.inner.write();
        inner.countdown.value = value;
        inner.countdown.target = Some(now + (value * 1000.0) as u64);
        inner.countdown.running = true;
    }

    /// Recomputes both remaining values and publishes a snapshot.
    ///
    /// A running sub-timer that reaches zero auto-stops and clears its
    /// target.
    pub fn tick(&self) {
        let now = self.now();
        {
            let mut inner = self.inner.write();
            inner.countdown.tick(now);
            if inner.count_to_time.tick(now) {
                inner.count_to_time_target_string = None;
            }
        }
        self.publish(self.snapshot());
    }

    /// Returns a point-in-time copy of both sub-timers.
    pub fn snapshot(&self) -> TimerSnapshot {
        let now = self.now();
        let inner = self.inner.read();
        TimerSnapshot {
            countdown_value: inner.countdown.value,
            countdown_running: inner.countdown.running,
            countdown_target: inner.countdown.target,
            count_to_time_value: inner.count_to_time.value,
            count_to_time_running: inner.count_to_time.running,
            count_to_time_target: inner.count_to_time.target,
            count_to_time_target_string: inner.count_to_time_target_string.clone(),
            timestamp: now,
        }
    }

    /// Subscribes to per-tick snapshots.
    pub fn subscribe(&self) -> Receiver<TimerSnapshot> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    fn publish(&self, snapshot: TimerSnapshot) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

impl Default for ShowTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the 100ms tick task for a shared timer.
///
/// The returned handle is aborted at shutdown.
pub fn spawn_ticker(timer: Arc<ShowTimer>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            timer.tick();
        }
    })
}

/// Resolves an `HH:MM:SS` string to the next occurrence of that wall-clock
/// time: today if still ahead, otherwise tomorrow.
///
/// Returns the target as Unix milliseconds plus its normalized string form.
fn resolve_clock_target(input: &str, now: u64) -> TimerResult<(u64, String)> {
    let time = NaiveTime::parse_from_str(input.trim(), "%H:%M:%S")
        .map_err(|_| TimerError::invalid_target(input))?;

    let now_local = Local
        .timestamp_millis_opt(now as i64)
        .earliest()
        .ok_or_else(|| TimerError::invalid_target(input))?;

    let mut date = now_local.date_naive();
    let mut target = date
        .and_time(time)
        .and_local_timezone(Local)
        .earliest()
        .ok_or_else(|| TimerError::invalid_target(input))?;

    if target.timestamp_millis() as u64 <= now {
        date = date.succ_opt().ok_or_else(|| TimerError::invalid_target(input))?;
        target = date
            .and_time(time)
            .and_local_timezone(Local)
            .earliest()
            .ok_or_else(|| TimerError::invalid_target(input))?;
    }

    Ok((
        target.timestamp_millis() as u64,
        time.format("%H:%M:%S").to_string(),
    ))
}

/// Formats Unix milliseconds as local `HH:MM:SS`.
pub(crate) fn format_millis_as_hms(millis: u64) -> String {
    Local
        .timestamp_millis_opt(millis as i64)
        .earliest()
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "00:00:00".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Fixture {
        timer: ShowTimer,
        clock: Arc<AtomicU64>,
    }

    fn fixture() -> Fixture {
        fixture_at(1_700_000_000_000)
    }

    fn fixture_at(start: u64) -> Fixture {
        let clock = Arc::new(AtomicU64::new(start));
        let clock_for_timer = Arc::clone(&clock);
        let timer =
            ShowTimer::with_clock(Arc::new(move || clock_for_timer.load(Ordering::SeqCst)));
        Fixture { timer, clock }
    }

    /// Unix millis for today's local `HH:MM:SS`.
    fn local_today_millis(h: u32, m: u32, s: u32) -> u64 {
        Local::now()
            .date_naive()
            .and_hms_opt(h, m, s)
            .unwrap()
            .and_local_timezone(Local)
            .earliest()
            .unwrap()
            .timestamp_millis() as u64
    }

    fn advance(f: &Fixture, millis: u64) {
        f.clock.fetch_add(millis, Ordering::SeqCst);
        f.timer.tick();
    }

    #[test]
    fn countdown_runs_out_and_stops() {
        let f = fixture();
        f.timer
            .apply(TimerCommand::SetCountdownTime(300.0))
            .unwrap();
        f.timer.apply(TimerCommand::StartCountdown).unwrap();

        advance(&f, 100_000);
        let snap = f.timer.snapshot();
        assert!((snap.countdown_value - 200.0).abs() < 0.2);
        assert!(snap.countdown_running);

        // 301 seconds after start: ran out, auto-stopped, target cleared.
        advance(&f, 201_000);
        let snap = f.timer.snapshot();
        assert_eq!(snap.countdown_value, 0.0);
        assert!(!snap.countdown_running);
        assert!(snap.countdown_target.is_none());
    }

    #[test]
    fn pause_keeps_displayed_value() {
        let f = fixture();
        f.timer
            .apply(TimerCommand::SetCountdownTime(300.0))
            .unwrap();
        f.timer.apply(TimerCommand::StartCountdown).unwrap();
        advance(&f, 60_000);

        f.timer.apply(TimerCommand::PauseCountdown).unwrap();
        let snap = f.timer.snapshot();
        assert!(!snap.countdown_running);
        assert!(snap.countdown_target.is_none());
        assert!((snap.countdown_value - 240.0).abs() < 0.2);

        // Paused value does not decay.
        advance(&f, 60_000);
        assert!((f.timer.snapshot().countdown_value - 240.0).abs() < 0.2);
    }

    #[test]
    fn adjust_clamps_at_zero_when_stopped() {
        let f = fixture();
        f.timer.apply(TimerCommand::SetCountdownTime(10.0)).unwrap();
        f.timer.apply(TimerCommand::AdjustCountdown(-30.0)).unwrap();
        assert_eq!(f.timer.snapshot().countdown_value, 0.0);

        f.timer.apply(TimerCommand::AdjustCountdown(45.0)).unwrap();
        assert_eq!(f.timer.snapshot().countdown_value, 45.0);
    }

    #[test]
    fn adjust_moves_running_target() {
        let f = fixture();
        f.timer
            .apply(TimerCommand::SetCountdownTime(100.0))
            .unwrap();
        f.timer.apply(TimerCommand::StartCountdown).unwrap();
        advance(&f, 10_000);

        f.timer.apply(TimerCommand::AdjustCountdown(30.0)).unwrap();
        let snap = f.timer.snapshot();
        assert!(snap.countdown_running);
        assert!((snap.countdown_value - 120.0).abs() < 0.2);
    }

    #[test]
    fn reset_countdown_to_restarts_atomically() {
        let f = fixture();
        f.timer
            .apply(TimerCommand::SetCountdownTime(300.0))
            .unwrap();
        f.timer.apply(TimerCommand::StartCountdown).unwrap();
        advance(&f, 150_000);

        // Operator selects a different cue with a 90 second duration.
        f.timer.reset_countdown_to(90.0);
        let snap = f.timer.snapshot();
        assert!(snap.countdown_running);
        assert!((snap.countdown_value - 90.0).abs() < 0.001);

        advance(&f, 10_000);
        assert!((f.timer.snapshot().countdown_value - 80.0).abs() < 0.2);
    }

    #[test]
    fn clock_target_today_when_ahead() {
        let f = fixture_at(local_today_millis(9, 0, 0));
        f.timer
            .apply(TimerCommand::SetCountUpTarget("10:00:00".into()))
            .unwrap();

        let snap = f.timer.snapshot();
        assert_eq!(snap.count_to_time_target_string.as_deref(), Some("10:00:00"));
        assert!((snap.count_to_time_value - 3_600.0).abs() < 1.0);
    }

    #[test]
    fn clock_target_rolls_to_tomorrow_when_elapsed() {
        let f = fixture_at(local_today_millis(11, 0, 0));
        f.timer
            .apply(TimerCommand::SetCountUpTarget("10:00:00".into()))
            .unwrap();

        // Tomorrow at 10:00 is at least 12 hours out.
        let snap = f.timer.snapshot();
        assert!(snap.count_to_time_value > 12.0 * 3_600.0);
    }

    #[test]
    fn malformed_target_leaves_state_untouched() {
        let f = fixture_at(local_today_millis(9, 0, 0));
        f.timer
            .apply(TimerCommand::SetCountUpTarget("10:00:00".into()))
            .unwrap();
        let before = f.timer.snapshot();

        assert!(matches!(
            f.timer
                .apply(TimerCommand::SetCountUpTarget("not a time".into())),
            Err(TimerError::InvalidTargetTime { .. })
        ));
        let after = f.timer.snapshot();
        assert_eq!(after.count_to_time_target, before.count_to_time_target);
        assert_eq!(
            after.count_to_time_target_string,
            before.count_to_time_target_string
        );
    }

    #[test]
    fn count_to_time_runs_out_and_clears() {
        let f = fixture_at(local_today_millis(9, 0, 0));
        f.timer
            .apply(TimerCommand::SetCountUpTarget("09:00:30".into()))
            .unwrap();
        f.timer.apply(TimerCommand::StartCountUp).unwrap();

        advance(&f, 31_000);
        let snap = f.timer.snapshot();
        assert_eq!(snap.count_to_time_value, 0.0);
        assert!(!snap.count_to_time_running);
        assert!(snap.count_to_time_target.is_none());
        assert!(snap.count_to_time_target_string.is_none());
    }

    #[test]
    fn start_count_up_without_target_is_ignored() {
        let f = fixture();
        f.timer.apply(TimerCommand::StartCountUp).unwrap();
        assert!(!f.timer.snapshot().count_to_time_running);
    }

    #[test]
    fn subscribers_receive_tick_snapshots() {
        let f = fixture();
        let rx = f.timer.subscribe();
        f.timer
            .apply(TimerCommand::SetCountdownTime(10.0))
            .unwrap();
        f.timer.tick();

        let snap = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(snap.countdown_value, 10.0);
    }

    #[test]
    fn command_parse() {
        assert_eq!(
            TimerCommand::parse("setCountdownTime", Some(90.0), None, None).unwrap(),
            TimerCommand::SetCountdownTime(90.0)
        );
        assert_eq!(
            TimerCommand::parse("adjustCountdown", None, Some(-5.0), None).unwrap(),
            TimerCommand::AdjustCountdown(-5.0)
        );
        assert!(matches!(
            TimerCommand::parse("warpDrive", None, None, None),
            Err(TimerError::UnknownAction { .. })
        ));
    }
}
