//! Run-state machine and the suspend/resume/cancel rendezvous between the
//! controller and the sort loop.
//!
//! All shared coordination state lives behind one `parking_lot::Mutex` paired
//! with a `Condvar`. The loop re-checks state under the lock before every
//! wait, so a request can never slip between the check and the wait (no lost
//! wakeups), and delays are condvar timeouts rather than sleep-poll loops, so
//! a cancel wakes a sleeping loop immediately.
//!
//! Generations: every `Start` opens a new generation. A loop carrying an older
//! generation treats itself as cancelled, so a cancel followed by a quick
//! restart can never leave two loops mutating one array.
//!
//! Cancel is two-phase. [`ControlGate::request_cancel`] stops the loop but
//! keeps the public state at `Running`/`Paused`; only
//! [`ControlGate::complete_cancel`], called once the array is restored,
//! publishes `Idle`. Nobody can observe `Idle` over a half-sorted array, and
//! `Start` cannot slip in while the old loop is still being reaped.

#![allow(missing_docs)]

use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;

use crate::core::errors::{IsvError, Result};
use crate::engine::speed::SpeedModel;

/// Lifecycle of a sort run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Completed,
}

/// Events driving [`RunState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Pause,
    Resume,
    Cancel,
    /// The loop ran out of steps.
    Finish,
}

impl RunState {
    /// The single transition function. `None` means the event is a no-op in
    /// this state.
    #[must_use]
    pub const fn on(self, event: Transition) -> Option<Self> {
        match (self, event) {
            (Self::Idle, Transition::Start) | (Self::Paused, Transition::Resume) => {
                Some(Self::Running)
            }
            (Self::Running, Transition::Pause) => Some(Self::Paused),
            (Self::Running | Self::Paused | Self::Completed, Transition::Cancel) => {
                Some(Self::Idle)
            }
            (Self::Running, Transition::Finish) => Some(Self::Completed),
            _ => None,
        }
    }

    /// A sort is bound to the array (the loop owns `working`).
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug)]
struct GateState {
    run: RunState,
    speed: u8,
    generation: u64,
    /// The loop is blocked inside a pause.
    parked: bool,
    /// A loop thread exists for `generation`.
    loop_alive: bool,
    /// Cancel requested, `Idle` not yet published.
    cancelling: bool,
    worker: Option<ThreadId>,
}

/// Shared coordination primitive.
#[derive(Debug)]
pub struct ControlGate {
    state: Mutex<GateState>,
    cond: Condvar,
    model: SpeedModel,
}

impl ControlGate {
    #[must_use]
    pub fn new(model: SpeedModel, speed: u8) -> Self {
        Self {
            state: Mutex::new(GateState {
                run: RunState::Idle,
                speed,
                generation: 0,
                parked: false,
                loop_alive: false,
                cancelling: false,
                worker: None,
            }),
            cond: Condvar::new(),
            model,
        }
    }

    pub fn run_state(&self) -> RunState {
        self.state.lock().run
    }

    pub fn speed(&self) -> u8 {
        self.state.lock().speed
    }

    pub fn model(&self) -> SpeedModel {
        self.model
    }

    /// Delay the next suspension point will wait.
    pub fn current_delay(&self) -> Duration {
        self.model.delay_for_valid(self.speed())
    }

    /// Update the speed; takes effect at the next suspend (or on resume).
    pub fn set_speed(&self, speed: u8) {
        let mut guard = self.state.lock();
        guard.speed = speed;
        self.cond.notify_all();
    }

    /// Apply `Start`. Returns the new generation when the transition fired.
    pub fn begin(&self) -> Option<u64> {
        let mut guard = self.state.lock();
        let next = guard.run.on(Transition::Start)?;
        guard.run = next;
        guard.generation += 1;
        guard.parked = false;
        guard.loop_alive = true;
        guard.worker = None;
        self.cond.notify_all();
        Some(guard.generation)
    }

    /// Record the loop thread of `generation`.
    pub fn attach_worker(&self, generation: u64, worker: ThreadId) {
        let mut guard = self.state.lock();
        if guard.generation == generation {
            guard.worker = Some(worker);
        }
    }

    /// The loop of `generation` has exited.
    pub fn detach_worker(&self, generation: u64) {
        let mut guard = self.state.lock();
        if guard.generation == generation {
            guard.loop_alive = false;
            guard.parked = false;
            guard.worker = None;
        }
        self.cond.notify_all();
    }

    /// Whether the caller is the current loop thread.
    pub fn on_worker_thread(&self) -> bool {
        self.state.lock().worker == Some(thread::current().id())
    }

    /// Apply `Pause`. No-op unless running.
    pub fn pause(&self) -> bool {
        self.apply(Transition::Pause).is_some()
    }

    /// Apply `Resume`.
    ///
    /// Blocks until the loop has actually parked on the preceding pause, so a
    /// pause is always observed before it is lifted. Called from the loop
    /// thread itself (an observer) it cannot wait and just flips the state.
    pub fn resume(&self) -> bool {
        let me = thread::current().id();
        let mut guard = self.state.lock();
        while guard.run == RunState::Paused
            && !guard.parked
            && !guard.cancelling
            && guard.loop_alive
            && guard.worker != Some(me)
        {
            self.cond.wait(&mut guard);
        }
        self.apply_locked(&mut guard, Transition::Resume).is_some()
    }

    /// First phase of `Cancel`: the loop of the current generation stops at
    /// its next suspension point, pause/resume/start are refused, and the
    /// visible state is unchanged. Returns the state being cancelled from, or
    /// `None` when cancel is a no-op (idle, or another cancel in flight).
    pub fn request_cancel(&self) -> Option<RunState> {
        let mut guard = self.state.lock();
        let from = guard.run;
        if guard.cancelling || from.on(Transition::Cancel).is_none() {
            return None;
        }
        guard.cancelling = true;
        self.cond.notify_all();
        Some(from)
    }

    /// Second phase of `Cancel`: publish `Idle`.
    pub fn complete_cancel(&self) {
        let mut guard = self.state.lock();
        if guard.cancelling {
            guard.run = RunState::Idle;
            guard.cancelling = false;
            guard.parked = false;
        }
        self.cond.notify_all();
    }

    /// Both phases at once, for callers with nothing to restore.
    pub fn cancel(&self) -> Option<RunState> {
        let from = self.request_cancel()?;
        self.complete_cancel();
        Some(from)
    }

    /// Force `Idle` after an unexpected loop termination. Returns whether
    /// `generation` was still live.
    pub fn force_idle(&self, generation: u64) -> bool {
        let mut guard = self.state.lock();
        let applied = guard.generation == generation && guard.run != RunState::Idle;
        if applied {
            guard.run = RunState::Idle;
            guard.parked = false;
            guard.cancelling = false;
        }
        self.cond.notify_all();
        applied
    }

    /// Suspension point without a delay: honour pause and cancel.
    pub fn checkpoint(&self, generation: u64) -> Result<()> {
        self.suspend(generation, false)
    }

    /// Suspension point waiting the configured delay. Pausing mid-delay keeps
    /// the remaining time; resuming shortens it if the speed went up.
    pub fn delay(&self, generation: u64) -> Result<()> {
        self.suspend(generation, true)
    }

    /// Apply `Finish` for `generation`, parking first if a pause is pending.
    pub fn finish(&self, generation: u64) -> Result<()> {
        let mut guard = self.state.lock();
        loop {
            if guard.generation != generation || guard.cancelling {
                return Err(IsvError::CancelledDuringWait);
            }
            match guard.run {
                RunState::Running => {
                    guard.run = RunState::Completed;
                    self.cond.notify_all();
                    return Ok(());
                }
                RunState::Paused => {
                    self.park(&mut guard, generation);
                }
                RunState::Idle | RunState::Completed => {
                    return Err(IsvError::CancelledDuringWait);
                }
            }
        }
    }

    /// Block until the state is no longer `Running`.
    pub fn wait_while_running(&self) -> RunState {
        let mut guard = self.state.lock();
        while guard.run == RunState::Running {
            self.cond.wait(&mut guard);
        }
        guard.run
    }

    /// Like [`ControlGate::wait_while_running`], giving up after `timeout`.
    pub fn wait_while_running_for(&self, timeout: Duration) -> RunState {
        let deadline = Instant::now() + timeout;
        let mut guard = self.state.lock();
        while guard.run == RunState::Running {
            if self.cond.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        guard.run
    }

    // ──────────────────── internals ────────────────────

    fn apply(&self, event: Transition) -> Option<RunState> {
        let mut guard = self.state.lock();
        self.apply_locked(&mut guard, event)
    }

    fn apply_locked(
        &self,
        guard: &mut MutexGuard<'_, GateState>,
        event: Transition,
    ) -> Option<RunState> {
        if guard.cancelling {
            return None;
        }
        let next = guard.run.on(event)?;
        guard.run = next;
        self.cond.notify_all();
        Some(next)
    }

    fn suspend(&self, generation: u64, with_delay: bool) -> Result<()> {
        let mut guard = self.state.lock();
        let mut remaining = if with_delay {
            self.model.delay_for_valid(guard.speed)
        } else {
            Duration::ZERO
        };
        let mut deadline = Instant::now() + remaining;
        loop {
            if guard.generation != generation || guard.cancelling {
                return Err(IsvError::CancelledDuringWait);
            }
            match guard.run {
                RunState::Running => {
                    if Instant::now() >= deadline {
                        return Ok(());
                    }
                    self.cond.wait_until(&mut guard, deadline);
                }
                RunState::Paused => {
                    remaining = deadline.saturating_duration_since(Instant::now());
                    self.park(&mut guard, generation);
                    if with_delay {
                        remaining = remaining.min(self.model.delay_for_valid(guard.speed));
                    }
                    deadline = Instant::now() + remaining;
                }
                RunState::Idle | RunState::Completed => {
                    return Err(IsvError::CancelledDuringWait);
                }
            }
        }
    }

    fn park(&self, guard: &mut MutexGuard<'_, GateState>, generation: u64) {
        guard.parked = true;
        self.cond.notify_all();
        while guard.run == RunState::Paused && guard.generation == generation && !guard.cancelling
        {
            self.cond.wait(guard);
        }
        guard.parked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn gate(speed: u8) -> ControlGate {
        ControlGate::new(SpeedModel::default(), speed)
    }

    #[test]
    fn transition_table() {
        use RunState::{Completed, Idle, Paused, Running};
        use Transition::{Cancel, Finish, Pause, Resume, Start};

        assert_eq!(Idle.on(Start), Some(Running));
        assert_eq!(Running.on(Pause), Some(Paused));
        assert_eq!(Paused.on(Resume), Some(Running));
        assert_eq!(Running.on(Cancel), Some(Idle));
        assert_eq!(Paused.on(Cancel), Some(Idle));
        assert_eq!(Completed.on(Cancel), Some(Idle));
        assert_eq!(Running.on(Finish), Some(Completed));

        // documented no-ops
        assert_eq!(Running.on(Start), None);
        assert_eq!(Paused.on(Start), None);
        assert_eq!(Completed.on(Start), None);
        assert_eq!(Idle.on(Pause), None);
        assert_eq!(Idle.on(Resume), None);
        assert_eq!(Running.on(Resume), None);
        assert_eq!(Idle.on(Cancel), None);
        assert_eq!(Paused.on(Finish), None);
    }

    #[test]
    fn begin_opens_new_generation() {
        let g = gate(100);
        assert_eq!(g.begin(), Some(1));
        assert_eq!(g.begin(), None);
        assert_eq!(g.cancel(), Some(RunState::Running));
        assert_eq!(g.begin(), Some(2));
    }

    #[test]
    fn stale_generation_is_cancelled() {
        let g = gate(100);
        let first = g.begin().unwrap();
        g.cancel();
        let second = g.begin().unwrap();
        assert!(matches!(
            g.checkpoint(first),
            Err(IsvError::CancelledDuringWait)
        ));
        assert!(g.checkpoint(second).is_ok());
    }

    #[test]
    fn cancel_wakes_a_long_delay_promptly() {
        let g = Arc::new(gate(0)); // 3s delay
        let generation = g.begin().unwrap();
        let waiter = {
            let g = Arc::clone(&g);
            std::thread::spawn(move || {
                let started = Instant::now();
                let result = g.delay(generation);
                (result, started.elapsed())
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        g.cancel();
        let (result, elapsed) = waiter.join().unwrap();
        assert!(matches!(result, Err(IsvError::CancelledDuringWait)));
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    }

    #[test]
    fn resume_waits_for_park_and_releases_loop() {
        let g = Arc::new(gate(100));
        let generation = g.begin().unwrap();
        assert!(g.pause());
        let looper = {
            let g = Arc::clone(&g);
            std::thread::spawn(move || {
                g.attach_worker(generation, std::thread::current().id());
                std::thread::sleep(Duration::from_millis(30));
                let result = g.checkpoint(generation);
                g.detach_worker(generation);
                result
            })
        };
        assert!(g.resume());
        assert_eq!(g.run_state(), RunState::Running);
        assert!(looper.join().unwrap().is_ok());
    }

    #[test]
    fn resume_without_live_loop_does_not_block() {
        let g = gate(100);
        let generation = g.begin().unwrap();
        g.detach_worker(generation);
        assert!(g.pause());
        assert!(g.resume());
    }

    #[test]
    fn finish_from_running_completes() {
        let g = gate(100);
        let generation = g.begin().unwrap();
        assert!(g.finish(generation).is_ok());
        assert_eq!(g.run_state(), RunState::Completed);
        assert_eq!(g.wait_while_running(), RunState::Completed);
    }

    #[test]
    fn requested_cancel_stays_visible_until_completed() {
        let g = Arc::new(gate(100));
        let generation = g.begin().unwrap();
        assert_eq!(g.request_cancel(), Some(RunState::Running));
        assert_eq!(g.run_state(), RunState::Running);
        assert!(g.checkpoint(generation).is_err());
        assert_eq!(g.request_cancel(), None, "second cancel is a no-op");
        assert!(!g.pause());
        assert_eq!(g.begin(), None, "start refused while cancelling");

        let waiter = {
            let g = Arc::clone(&g);
            std::thread::spawn(move || g.wait_while_running())
        };
        std::thread::sleep(Duration::from_millis(30));
        assert!(!waiter.is_finished());
        g.complete_cancel();
        assert_eq!(waiter.join().unwrap(), RunState::Idle);
        assert_eq!(g.begin(), Some(generation + 1));
    }

    #[test]
    fn requested_cancel_releases_a_parked_loop() {
        let g = Arc::new(gate(100));
        let generation = g.begin().unwrap();
        assert!(g.pause());
        let looper = {
            let g = Arc::clone(&g);
            std::thread::spawn(move || g.checkpoint(generation))
        };
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(g.request_cancel(), Some(RunState::Paused));
        assert!(!g.resume(), "resume refused while cancelling");
        assert!(matches!(
            looper.join().unwrap(),
            Err(IsvError::CancelledDuringWait)
        ));
        assert_eq!(g.run_state(), RunState::Paused);
        g.complete_cancel();
        assert_eq!(g.run_state(), RunState::Idle);
    }

    #[test]
    fn zero_delay_at_full_speed() {
        let g = gate(100);
        let generation = g.begin().unwrap();
        let started = Instant::now();
        g.delay(generation).unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(g.current_delay(), Duration::ZERO);
    }

    #[test]
    fn wait_while_running_for_times_out() {
        let g = gate(100);
        g.begin().unwrap();
        let state = g.wait_while_running_for(Duration::from_millis(20));
        assert_eq!(state, RunState::Running);
    }
}
