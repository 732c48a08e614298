//! Interactive player: bars drawn bottom-up on the alternate screen, colored
//! by classifier state, driven from the keyboard.
//!
//! The [`Controller`] owns the engine and the user's pending selection and
//! maps key commands onto engine transitions. Rendering only ever reads
//! [`ArraySnapshot`]s; the sort thread flags a redraw after every sub-step.

#![allow(missing_docs)]

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Color, Print, SetAttribute, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::cli::palette::{bar_color, legend};
use crate::core::config::{Config, DisplayConfig, MAX_NUM_VALUES, MAX_SPEED, MAX_VALUE_RANGE};
use crate::core::errors::{IsvError, Result};
use crate::engine::array_state::{ArraySnapshot, ArrayState};
use crate::engine::classifier::{
    BarGeometry, BarState, Highlights, Spacing, bar_height, classify_with,
};
use crate::engine::control::RunState;
use crate::engine::sort_engine::SortEngine;
use crate::engine::speed::SpeedModel;
use crate::logger::trace::{CHANNEL_CAPACITY, StepTraceHandle, TraceEvent, spawn_trace_logger};

pub const NUM_VALUES_STEP: usize = 10;
pub const VALUE_RANGE_STEP: u32 = 5;
pub const SPEED_STEP: u8 = 5;

// ──────────────────── key bindings ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start, pause, or resume depending on the run state.
    Toggle,
    /// New random array while idle; reset while paused or completed.
    RefreshOrReset,
    Faster,
    Slower,
    MoreValues,
    FewerValues,
    WiderRange,
    NarrowerRange,
    Quit,
}

#[must_use]
pub fn command_for(key: &KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char(' ') => Some(Command::Toggle),
        KeyCode::Char('r' | 'R') => Some(Command::RefreshOrReset),
        KeyCode::Char('+' | '=') => Some(Command::Faster),
        KeyCode::Char('-' | '_') => Some(Command::Slower),
        KeyCode::Right => Some(Command::MoreValues),
        KeyCode::Left => Some(Command::FewerValues),
        KeyCode::Up => Some(Command::WiderRange),
        KeyCode::Down => Some(Command::NarrowerRange),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Command::Quit)
        }
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

// ──────────────────── controller ────────────────────

/// Owns the engine plus the selection shown in the status line.
#[derive(Debug)]
pub struct Controller {
    engine: SortEngine,
    rng: StdRng,
    num_values: usize,
    value_range: u32,
    speed: u8,
    /// Shape of the array currently bound to the engine.
    generated: (usize, u32),
    notice: Option<String>,
}

impl Controller {
    pub fn new(config: &Config) -> Result<Self> {
        let shape = config.array.clamped();
        let mut rng = shape.seed.map_or_else(
            || StdRng::from_rng(&mut rand::rng()),
            StdRng::seed_from_u64,
        );
        let array = ArrayState::initialize_with(shape.num_values, shape.value_range, &mut rng)?;
        let model = SpeedModel::new(Duration::from_millis(config.animation.max_delay_ms));
        let engine = SortEngine::with_model(array, model, config.animation.speed)?;
        Ok(Self {
            engine,
            rng,
            num_values: shape.num_values,
            value_range: shape.value_range,
            speed: config.animation.speed,
            generated: (shape.num_values, shape.value_range),
            notice: None,
        })
    }

    pub fn engine(&self) -> &SortEngine {
        &self.engine
    }

    /// Pending `(num_values, value_range)`; applied on the next refresh or start.
    pub fn selection(&self) -> (usize, u32) {
        (self.num_values, self.value_range)
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn handle(&mut self, command: Command) -> Result<Flow> {
        self.notice = None;
        let state = self.engine.run_state();
        match command {
            Command::Toggle => match state {
                RunState::Idle => {
                    // A fresh array only when the shape changed since the
                    // last generation; otherwise just pick up the speed.
                    if self.selection() == self.generated {
                        self.engine.set_speed(self.speed)?;
                    } else {
                        self.regenerate()?;
                    }
                    self.engine.start()?;
                }
                RunState::Running => {
                    self.engine.pause();
                }
                RunState::Paused => {
                    self.engine.set_speed(self.speed)?;
                    self.engine.resume();
                }
                RunState::Completed => self.set_notice("sorted; press r to reset"),
            },
            Command::RefreshOrReset => match state {
                RunState::Idle => self.regenerate()?,
                RunState::Paused | RunState::Completed => {
                    self.engine.cancel();
                }
                RunState::Running => self.set_notice("pause before resetting"),
            },
            Command::Faster => {
                self.change_speed(self.speed.saturating_add(SPEED_STEP).min(MAX_SPEED))?;
            }
            Command::Slower => self.change_speed(self.speed.saturating_sub(SPEED_STEP))?,
            Command::MoreValues
            | Command::FewerValues
            | Command::WiderRange
            | Command::NarrowerRange => {
                if state == RunState::Idle {
                    self.change_shape(command);
                } else {
                    self.set_notice("array shape is locked until reset");
                }
            }
            Command::Quit => {
                self.engine.cancel();
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    fn regenerate(&mut self) -> Result<()> {
        self.engine
            .configure_with(self.num_values, self.value_range, self.speed, &mut self.rng)?;
        self.generated = self.selection();
        Ok(())
    }

    fn change_speed(&mut self, speed: u8) -> Result<()> {
        self.engine.set_speed(speed)?;
        self.speed = speed;
        Ok(())
    }

    fn change_shape(&mut self, command: Command) {
        match command {
            Command::MoreValues => {
                self.num_values = (self.num_values + NUM_VALUES_STEP).min(MAX_NUM_VALUES);
            }
            Command::FewerValues => {
                self.num_values = self.num_values.saturating_sub(NUM_VALUES_STEP).max(1);
            }
            Command::WiderRange => {
                self.value_range = (self.value_range + VALUE_RANGE_STEP).min(MAX_VALUE_RANGE);
            }
            Command::NarrowerRange => {
                self.value_range = self.value_range.saturating_sub(VALUE_RANGE_STEP).max(1);
            }
            _ => {}
        }
    }
}

const fn toggle_label(state: RunState) -> &'static str {
    match state {
        RunState::Idle => "start",
        RunState::Running => "pause",
        RunState::Paused => "resume",
        RunState::Completed => "-",
    }
}

const fn reset_label(state: RunState) -> &'static str {
    match state {
        RunState::Idle => "refresh",
        RunState::Running => "-",
        RunState::Paused | RunState::Completed => "reset",
    }
}

// ──────────────────── bar layout ────────────────────

/// One bar placed in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarCell {
    pub x: u16,
    pub width: u16,
    pub height: u16,
    pub value: u32,
    pub state: BarState,
}

/// Place every visible bar of `snapshot` on a `cols`-wide plot.
/// Bars pushed past the right edge are dropped.
#[must_use]
pub fn layout_bars(
    snapshot: &ArraySnapshot,
    display: &DisplayConfig,
    cols: u16,
    plot_height: u16,
) -> Vec<BarCell> {
    let spacing = Spacing {
        comparison_padding: u32::from(display.comparison_padding),
        sorted_padding: u32::from(display.sorted_padding),
    };
    let geometry = BarGeometry::new(
        u32::from(cols),
        snapshot.working.len(),
        u32::from(display.wall_padding),
        spacing,
    );
    let highlights = Highlights::from(snapshot);
    let max_value = snapshot.working.iter().copied().max().unwrap_or(0);

    snapshot
        .working
        .iter()
        .enumerate()
        .filter_map(|(index, &value)| {
            let classification = classify_with(index, &highlights, spacing);
            let x = u16::try_from(geometry.x_for(index, classification))
                .ok()
                .filter(|x| *x < cols)?;
            let width = u16::try_from(geometry.bar_width)
                .unwrap_or(u16::MAX)
                .min(cols - x);
            let height = u16::try_from(bar_height(value, max_value, u32::from(plot_height)))
                .unwrap_or(plot_height)
                .max(1);
            Some(BarCell {
                x,
                width,
                height,
                value,
                state: classification.state,
            })
        })
        .collect()
}

// ──────────────────── main loop ────────────────────

/// Run the player until the user quits.
pub fn run(config: &Config) -> Result<()> {
    let mut controller = Controller::new(config)?;

    let dirty = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&dirty);
    controller
        .engine()
        .on_step(move |_, _| flag.store(true, Ordering::Release));

    let tracer = match &config.trace.jsonl_path {
        Some(path) => Some(start_tracer(&controller, config, path)?),
        None => None,
    };

    let mut stdout = io::stdout();
    terminal::enable_raw_mode().map_err(terminal_error)?;
    execute!(stdout, EnterAlternateScreen, Hide).map_err(terminal_error)?;

    let result = run_inner(&mut stdout, &mut controller, &dirty, config);

    // Always restore terminal state.
    let _ = execute!(stdout, Show, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    controller.engine().cancel();
    if let Some((handle, join)) = tracer {
        handle.shutdown();
        if join.join().is_err() {
            eprintln!("[ISV-TRACE] trace thread panicked");
        }
    }
    result
}

fn start_tracer(
    controller: &Controller,
    config: &Config,
    path: &std::path::Path,
) -> Result<(StepTraceHandle, JoinHandle<()>)> {
    let (handle, join) = spawn_trace_logger(Some(path), CHANNEL_CAPACITY)?;
    handle.send(TraceEvent::SessionStarted {
        config_hash: config.stable_hash()?,
        num_values: controller.selection().0,
        speed: controller.speed(),
    });
    let tracer = handle.clone();
    controller
        .engine()
        .on_step(move |event, state| tracer.record_step(event, state));
    Ok((handle, join))
}

fn run_inner(
    stdout: &mut io::Stdout,
    controller: &mut Controller,
    dirty: &AtomicBool,
    config: &Config,
) -> Result<()> {
    let poll = Duration::from_millis(config.animation.poll_interval_ms);
    loop {
        if event::poll(poll).map_err(terminal_error)? {
            match event::read().map_err(terminal_error)? {
                Event::Key(key) => {
                    if let Some(command) = command_for(&key) {
                        match controller.handle(command) {
                            Ok(Flow::Quit) => return Ok(()),
                            Ok(Flow::Continue) => {}
                            Err(e) => controller.set_notice(e.to_string()),
                        }
                        dirty.store(true, Ordering::Release);
                    }
                }
                Event::Resize(..) => dirty.store(true, Ordering::Release),
                _ => {}
            }
        }

        if dirty.swap(false, Ordering::AcqRel) {
            draw(stdout, controller, &config.display).map_err(terminal_error)?;
        }
    }
}

fn terminal_error(e: io::Error) -> IsvError {
    IsvError::Runtime {
        details: format!("terminal: {e}"),
    }
}

// ──────────────────── frame rendering ────────────────────

fn draw(stdout: &mut io::Stdout, controller: &Controller, display: &DisplayConfig) -> io::Result<()> {
    let (cols, rows) = terminal::size()?;
    let engine = controller.engine();
    let snapshot = engine.snapshot();
    let state = engine.run_state();

    queue!(stdout, MoveTo(0, 0), Clear(ClearType::All))?;

    // ── Header ──
    let mut header = format!(
        " Insertion Sort Visualizer  [{}]  speed {} ({} ms)  values {}",
        state.label().to_uppercase(),
        controller.speed(),
        engine.current_delay().as_millis(),
        snapshot.working.len(),
    );
    if controller.selection() != controller.generated {
        let (n, r) = controller.selection();
        header.push_str(&format!("  next: {n} values, range {r}"));
    }
    queue!(
        stdout,
        MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        SetAttribute(Attribute::Bold),
        Print(truncate(&header, cols)),
        SetAttribute(Attribute::Reset),
    )?;

    if rows < 6 {
        return stdout.flush();
    }

    // ── Bars ──
    let plot_top = 2u16;
    let plot_bottom = rows - 3;
    let plot_height = plot_bottom - plot_top;
    let bars = layout_bars(&snapshot, display, cols, plot_height);
    for bar in &bars {
        queue!(stdout, SetForegroundColor(bar_color(bar.state)))?;
        let fill = "█".repeat(usize::from(bar.width));
        for level in 0..bar.height {
            queue!(stdout, MoveTo(bar.x, plot_bottom - level), Print(&fill))?;
        }
        let label = bar.value.to_string();
        if label.len() <= usize::from(bar.width) && bar.height < plot_height {
            queue!(
                stdout,
                MoveTo(bar.x, plot_bottom - bar.height),
                Print(label)
            )?;
        }
    }
    if bars.len() < snapshot.working.len() {
        queue!(
            stdout,
            MoveTo(0, 1),
            SetForegroundColor(Color::DarkGrey),
            Print(format!(
                " showing {}/{} bars; widen the terminal",
                bars.len(),
                snapshot.working.len()
            )),
        )?;
    }

    // ── Footer ──
    queue!(
        stdout,
        MoveTo(1, rows - 2),
        SetForegroundColor(Color::DarkGrey),
        Print(truncate(&legend(), cols)),
    )?;
    let keys = format!(
        " space {}  r {}  +/- speed  \u{2190}/\u{2192} values  \u{2193}/\u{2191} range  q quit",
        toggle_label(state),
        reset_label(state),
    );
    queue!(
        stdout,
        MoveTo(0, rows - 1),
        SetForegroundColor(Color::White),
        Print(truncate(&keys, cols)),
    )?;
    if let Some(notice) = controller.notice() {
        let x = u16::try_from(keys.chars().count() + 2).unwrap_or(u16::MAX);
        if x < cols {
            queue!(
                stdout,
                MoveTo(x, rows - 1),
                SetForegroundColor(Color::Yellow),
                Print(truncate(notice, cols - x)),
            )?;
        }
    }
    queue!(stdout, SetAttribute(Attribute::Reset))?;
    stdout.flush()
}

fn truncate(text: &str, width: u16) -> String {
    text.chars().take(usize::from(width)).collect()
}
