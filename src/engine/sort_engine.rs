//! Sort engine: binds an [`ArrayState`], runs insertion sort on a dedicated
//! `isv-sort` thread one observable sub-step at a time, and exposes the
//! start / pause / resume / cancel / set-speed contract to the controller.
//!
//! Ownership rules:
//! - `working` and the highlight indices are written only by the sort thread
//!   while the run state is `Running` or `Paused`, one whole sub-step per
//!   write-lock acquisition. Readers therefore never see a half-applied shift.
//! - `cancel` restores the original order itself, after the loop has been
//!   joined (or, when called from an observer on the sort thread, while the
//!   loop is provably between steps). `Idle` is published under the array
//!   write lock together with the reset, so a reader that sees `Idle` sees
//!   the original order.
//! - The `Completed` step is delivered to observers before the state flips,
//!   so `wait_until_settled` returning `Completed` implies the final frame
//!   has been emitted.
//! - Observers receive a private clone of the array state, so they can call
//!   back into the engine (pause, cancel, even start) without deadlocking.

#![allow(missing_docs)]

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::core::config::{Config, MAX_NUM_VALUES, MAX_VALUE_RANGE};
use crate::core::errors::{IsvError, Result};
use crate::engine::array_state::{ArraySnapshot, ArrayState};
use crate::engine::control::{ControlGate, RunState};
use crate::engine::speed::{SpeedModel, validate_speed};
use crate::engine::stepper::{InsertionStepper, StepKind};

/// Notification fired after every observable sub-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepEvent {
    /// Monotonic across the engine's lifetime.
    pub seq: u64,
    /// Run generation that produced the step.
    pub generation: u64,
    pub kind: StepKind,
    /// Run state at emission.
    pub run_state: RunState,
}

type Observer = Arc<dyn Fn(&StepEvent, &ArrayState) + Send + Sync>;

struct Shared {
    array: RwLock<ArrayState>,
    gate: ControlGate,
    observers: RwLock<Vec<Observer>>,
    seq: AtomicU64,
}

impl Shared {
    fn emit(&self, generation: u64, kind: StepKind) {
        self.emit_as(generation, kind, self.gate.run_state());
    }

    fn emit_as(&self, generation: u64, kind: StepKind, run_state: RunState) {
        let view = self.array.read().clone();
        let event = StepEvent {
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            generation,
            kind,
            run_state,
        };
        let observers: Vec<Observer> = self.observers.read().clone();
        for observer in &observers {
            observer(&event, &view);
        }
    }

    /// Force `Idle` and restore the array after the loop died unexpectedly.
    fn abort_run(&self, generation: u64) {
        let applied = {
            let mut array = self.array.write();
            let applied = self.gate.force_idle(generation);
            if applied {
                array.reset();
            }
            applied
        };
        if applied {
            self.emit(generation, StepKind::Reset);
        }
    }
}

/// Step-driven insertion sort engine.
pub struct SortEngine {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for SortEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortEngine")
            .field("run_state", &self.run_state())
            .field("speed", &self.speed())
            .field("len", &self.shared.array.read().len())
            .finish_non_exhaustive()
    }
}

impl SortEngine {
    /// Engine over `array` with the default 3 s maximum delay.
    pub fn new(array: ArrayState, speed: u8) -> Result<Self> {
        Self::with_model(array, SpeedModel::default(), speed)
    }

    pub fn with_model(array: ArrayState, model: SpeedModel, speed: u8) -> Result<Self> {
        validate_speed(speed)?;
        Ok(Self {
            shared: Arc::new(Shared {
                array: RwLock::new(array),
                gate: ControlGate::new(model, speed),
                observers: RwLock::new(Vec::new()),
                seq: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        })
    }

    /// Engine with a random array shaped by `config.array`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let array = match config.array.seed {
            Some(seed) => ArrayState::initialize_with(
                config.array.num_values,
                config.array.value_range,
                &mut StdRng::seed_from_u64(seed),
            )?,
            None => ArrayState::initialize(config.array.num_values, config.array.value_range)?,
        };
        let model = SpeedModel::new(Duration::from_millis(config.animation.max_delay_ms));
        Self::with_model(array, model, config.animation.speed)
    }

    // ──────────────────── configuration ────────────────────

    /// Replace the array with a fresh random one and set the speed.
    ///
    /// Rejected while a sort is running or paused; the prior state is left
    /// untouched on any error.
    pub fn configure(&self, num_values: usize, value_range: u32, speed: u8) -> Result<()> {
        self.configure_with(num_values, value_range, speed, &mut rand::rng())
    }

    /// [`SortEngine::configure`] with a caller-supplied RNG.
    pub fn configure_with<R: rand::Rng>(
        &self,
        num_values: usize,
        value_range: u32,
        speed: u8,
        rng: &mut R,
    ) -> Result<()> {
        if num_values > MAX_NUM_VALUES {
            return Err(IsvError::invalid(format!(
                "number of values must be <= {MAX_NUM_VALUES}, got {num_values}"
            )));
        }
        if value_range > MAX_VALUE_RANGE {
            return Err(IsvError::invalid(format!(
                "value range must be <= {MAX_VALUE_RANGE}, got {value_range}"
            )));
        }
        validate_speed(speed)?;
        let array = ArrayState::initialize_with(num_values, value_range, rng)?;
        self.replace_array(array)?;
        self.shared.gate.set_speed(speed);
        Ok(())
    }

    /// Bind an explicit array. A completed run is closed first.
    pub fn replace_array(&self, array: ArrayState) -> Result<()> {
        {
            let mut current = self.shared.array.write();
            let state = self.shared.gate.run_state();
            if state.is_active() {
                return Err(IsvError::invalid(format!(
                    "cannot reconfigure while the sort is {}",
                    state.label()
                )));
            }
            if state == RunState::Completed {
                self.shared.gate.cancel();
            }
            *current = array;
        }
        self.join_worker();
        self.shared.emit(0, StepKind::Reset);
        Ok(())
    }

    /// Update the delay used from the next suspension point on.
    pub fn set_speed(&self, speed: u8) -> Result<()> {
        validate_speed(speed)?;
        self.shared.gate.set_speed(speed);
        Ok(())
    }

    /// Register a redraw callback fired after every observable sub-step.
    ///
    /// Runs on the sort thread at a suspension point; keep it short.
    pub fn on_step<F>(&self, observer: F)
    where
        F: Fn(&StepEvent, &ArrayState) + Send + Sync + 'static,
    {
        self.shared.observers.write().push(Arc::new(observer));
    }

    // ──────────────────── read side ────────────────────

    pub fn run_state(&self) -> RunState {
        self.shared.gate.run_state()
    }

    pub fn speed(&self) -> u8 {
        self.shared.gate.speed()
    }

    /// Delay the next suspension point will wait.
    pub fn current_delay(&self) -> Duration {
        self.shared.gate.current_delay()
    }

    pub fn snapshot(&self) -> ArraySnapshot {
        self.shared.array.read().snapshot()
    }

    /// Read-only access to the live state. Do not block inside `f`: the sort
    /// thread waits for the lock before its next sub-step.
    pub fn with_array<T>(&self, f: impl FnOnce(&ArrayState) -> T) -> T {
        f(&self.shared.array.read())
    }

    // ──────────────────── transitions ────────────────────

    /// `Idle → Running`: spawn the sort loop. `Ok(false)` when already
    /// sorting, paused, or completed.
    pub fn start(&self) -> Result<bool> {
        let Some(generation) = self.shared.gate.begin() else {
            return Ok(false);
        };
        self.join_worker();

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("isv-sort".to_string())
            .spawn(move || sort_thread_main(&shared, generation));

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                Ok(true)
            }
            Err(e) => {
                self.shared.gate.force_idle(generation);
                self.shared.gate.detach_worker(generation);
                Err(IsvError::Runtime {
                    details: format!("failed to spawn sort thread: {e}"),
                })
            }
        }
    }

    /// `Running → Paused`. The loop stops at its next suspension point.
    pub fn pause(&self) -> bool {
        self.shared.gate.pause()
    }

    /// `Paused → Running`, applying the latest speed.
    pub fn resume(&self) -> bool {
        self.shared.gate.resume()
    }

    /// `Running | Paused | Completed → Idle`, restoring the original order.
    pub fn cancel(&self) -> bool {
        if self.shared.gate.request_cancel().is_none() {
            return false;
        }
        self.join_worker();
        {
            let mut array = self.shared.array.write();
            array.reset();
            self.shared.gate.complete_cancel();
        }
        self.shared.emit(0, StepKind::Reset);
        true
    }

    /// Block until the engine is not `Running`.
    pub fn wait_until_settled(&self) -> RunState {
        self.shared.gate.wait_while_running()
    }

    /// [`SortEngine::wait_until_settled`] with an upper bound.
    pub fn wait_until_settled_for(&self, timeout: Duration) -> RunState {
        self.shared.gate.wait_while_running_for(timeout)
    }

    fn join_worker(&self) {
        if self.shared.gate.on_worker_thread() {
            // Called from an observer; the loop exits at its next suspension
            // point and is reaped by the next join.
            return;
        }
        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        if handle.thread().id() != thread::current().id() && handle.join().is_err() {
            eprintln!("[ISV-ENGINE] sort thread panicked outside the guarded loop");
        }
    }
}

impl Drop for SortEngine {
    fn drop(&mut self) {
        self.shared.gate.request_cancel();
        self.join_worker();
    }
}

// ──────────────────── sort thread ────────────────────

fn sort_thread_main(shared: &Shared, generation: u64) {
    shared
        .gate
        .attach_worker(generation, thread::current().id());

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_sort_loop(shared, generation)));
    match outcome {
        Ok(Ok(()) | Err(IsvError::CancelledDuringWait)) => {}
        Ok(Err(e)) => {
            eprintln!("[ISV-ENGINE] sort loop failed: {e}");
            shared.abort_run(generation);
        }
        Err(payload) => {
            eprintln!(
                "[ISV-ENGINE] sort loop terminated unexpectedly: {}",
                panic_message(payload.as_ref())
            );
            shared.abort_run(generation);
        }
    }

    shared.gate.detach_worker(generation);
}

fn run_sort_loop(shared: &Shared, generation: u64) -> Result<()> {
    let mut stepper = InsertionStepper::new();
    loop {
        shared.gate.checkpoint(generation)?;
        let step = {
            let mut array = shared.array.write();
            stepper.advance(&mut array)
        };
        let Some(kind) = step else {
            return Ok(());
        };
        if kind == StepKind::Completed {
            shared.emit_as(generation, kind, RunState::Completed);
            return shared.gate.finish(generation);
        }
        shared.emit(generation, kind);
        shared.gate.delay(generation)?;
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn engine(values: &[u32], speed: u8) -> SortEngine {
        SortEngine::new(ArrayState::from_values(values.to_vec()).unwrap(), speed).unwrap()
    }

    #[test]
    fn sorts_to_completion_at_full_speed() {
        let e = engine(&[5, 3, 1], 100);
        assert!(e.start().unwrap());
        assert_eq!(e.wait_until_settled(), RunState::Completed);
        let snap = e.snapshot();
        assert_eq!(snap.working, vec![1, 3, 5]);
        assert_eq!(snap.sorted_boundary, 3);
    }

    #[test]
    fn start_while_running_is_noop() {
        let e = engine(&[3, 2, 1], 0);
        assert!(e.start().unwrap());
        assert!(!e.start().unwrap());
        assert!(e.cancel());
    }

    #[test]
    fn start_after_completion_is_noop() {
        let e = engine(&[2, 1], 100);
        e.start().unwrap();
        e.wait_until_settled();
        assert!(!e.start().unwrap());
        assert_eq!(e.run_state(), RunState::Completed);
    }

    #[test]
    fn cancel_from_completed_resets() {
        let e = engine(&[2, 1], 100);
        e.start().unwrap();
        e.wait_until_settled();
        assert!(e.cancel());
        assert_eq!(e.run_state(), RunState::Idle);
        assert_eq!(e.snapshot().working, vec![2, 1]);
        assert!(!e.cancel(), "cancel while idle is a no-op");
    }

    #[test]
    fn observer_sees_every_step_in_order() {
        let e = engine(&[5, 3, 1], 100);
        let (tx, rx) = unbounded();
        e.on_step(move |event, state| {
            let _ = tx.send((event.seq, event.kind, state.working().to_vec()));
        });
        e.start().unwrap();
        e.wait_until_settled();
        drop(e);

        let events: Vec<_> = rx.try_iter().collect();
        let kinds: Vec<StepKind> = events.iter().map(|(_, k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::InterIteration { iteration: 1 },
                StepKind::KeySelected {
                    key_index: 1,
                    key: 3
                },
                StepKind::Shifted { from: 0, key: 3 },
                StepKind::InterIteration { iteration: 2 },
                StepKind::KeySelected {
                    key_index: 2,
                    key: 1
                },
                StepKind::Shifted { from: 1, key: 1 },
                StepKind::Shifted { from: 0, key: 1 },
                StepKind::Completed,
            ]
        );
        assert!(events.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(events.last().unwrap().2, vec![1, 3, 5]);
    }

    #[test]
    fn completed_frame_is_delivered_before_settling() {
        for _ in 0..200 {
            let e = engine(&[5, 3, 1], 100);
            let (tx, rx) = unbounded();
            e.on_step(move |event, _| {
                let _ = tx.send(*event);
            });
            e.start().unwrap();
            assert_eq!(e.wait_until_settled(), RunState::Completed);
            let last = rx.try_iter().last().expect("at least one step");
            assert_eq!(last.kind, StepKind::Completed);
            assert_eq!(last.run_state, RunState::Completed);
        }
    }

    #[test]
    fn idle_is_only_visible_over_the_original_order() {
        for _ in 0..20 {
            let e = Arc::new(
                SortEngine::with_model(
                    ArrayState::from_values(vec![6, 5, 4]).unwrap(),
                    SpeedModel::new(Duration::from_millis(20)),
                    0,
                )
                .unwrap(),
            );
            let (tx, rx) = unbounded();
            e.on_step(move |event, _| {
                let _ = tx.send(event.kind);
            });
            e.start().unwrap();
            loop {
                match rx.recv_timeout(Duration::from_secs(5)) {
                    Ok(StepKind::Shifted { .. }) => break,
                    Ok(_) => {}
                    Err(err) => panic!("no shift step: {err}"),
                }
            }

            let canceller = {
                let e = Arc::clone(&e);
                thread::spawn(move || e.cancel())
            };
            while !canceller.is_finished() {
                if e.run_state() == RunState::Idle {
                    assert_eq!(e.snapshot().working, vec![6, 5, 4]);
                }
            }
            assert!(canceller.join().unwrap());
            assert_eq!(e.run_state(), RunState::Idle);
            assert_eq!(e.snapshot().working, vec![6, 5, 4]);
        }
    }

    #[test]
    fn start_is_refused_until_cancel_has_reset() {
        let e = Arc::new(engine(&[3, 2, 1], 0));
        e.start().unwrap();
        let canceller = {
            let e = Arc::clone(&e);
            thread::spawn(move || e.cancel())
        };
        // either the cancel has fully finished (start wins a fresh run) or it
        // is still in flight (start is refused); never a run over a stale array
        let started = e.start().unwrap();
        assert!(canceller.join().unwrap());
        if started {
            assert_eq!(e.run_state(), RunState::Running);
            assert!(e.cancel());
        }
        assert_eq!(e.run_state(), RunState::Idle);
        assert_eq!(e.snapshot().working, vec![3, 2, 1]);
    }

    #[test]
    fn configure_rejects_bad_input_and_keeps_state() {
        let e = engine(&[4, 4, 4], 50);
        assert!(e.configure(0, 10, 50).is_err());
        assert!(e.configure(10, 0, 50).is_err());
        assert!(e.configure(201, 10, 50).is_err());
        assert!(e.configure(10, 100, 50).is_err());
        assert!(e.configure(10, 10, 101).is_err());
        assert_eq!(e.snapshot().working, vec![4, 4, 4]);
        assert_eq!(e.speed(), 50);
    }

    #[test]
    fn configure_while_active_is_rejected() {
        let e = engine(&[3, 2, 1], 0);
        e.start().unwrap();
        let err = e.configure(10, 10, 50).unwrap_err();
        assert_eq!(err.code(), "ISV-1001");
        e.pause();
        assert!(e.configure(10, 10, 50).is_err());
        e.cancel();
        assert!(e.configure(10, 10, 50).is_ok());
        assert_eq!(e.snapshot().working.len(), 10);
    }

    #[test]
    fn configure_after_completion_returns_to_idle() {
        let e = engine(&[2, 1], 100);
        e.start().unwrap();
        e.wait_until_settled();
        let mut rng = StdRng::seed_from_u64(3);
        e.configure_with(5, 9, 100, &mut rng).unwrap();
        assert_eq!(e.run_state(), RunState::Idle);
        assert_eq!(e.snapshot().sorted_boundary, 0);
    }

    #[test]
    fn panicking_observer_forces_idle_and_reset() {
        let e = engine(&[3, 1, 2], 100);
        e.on_step(|event, _| {
            if matches!(event.kind, StepKind::Shifted { .. }) {
                panic!("observer blew up");
            }
        });
        e.start().unwrap();
        let state = e.wait_until_settled_for(Duration::from_secs(5));
        assert_eq!(state, RunState::Idle);
        // the reset observer event also reaches the panicking observer, but
        // only Shifted panics, so the engine stays usable
        assert_eq!(e.snapshot().working, vec![3, 1, 2]);
    }

    #[test]
    fn from_config_honours_seed() {
        let mut cfg = Config::default();
        cfg.array.seed = Some(11);
        cfg.array.num_values = 20;
        let a = SortEngine::from_config(&cfg).unwrap();
        let b = SortEngine::from_config(&cfg).unwrap();
        assert_eq!(a.snapshot().working, b.snapshot().working);
        assert_eq!(a.speed(), 80);
    }

    #[test]
    fn set_speed_validates() {
        let e = engine(&[1], 10);
        assert!(e.set_speed(101).is_err());
        e.set_speed(100).unwrap();
        assert_eq!(e.current_delay(), Duration::ZERO);
    }
}
