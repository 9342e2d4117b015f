//! Simulated piston plant: a motor, an end-of-travel switch and a single-phase
//! encoder sharing one physical state.
//!
//! Time only moves through `advance()`. Tests drive it from a manual clock;
//! the CLI's simulation backend uses `spawn()` to advance it in real time on a
//! background thread, which plays the role of the encoder interrupt.

use nanofloat_traits::{EdgeSink, LimitState, LimitSwitch, MotorCommand, MotorDriver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const MICROS_PER_SEC: u64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct SimPistonCfg {
    /// Encoder edges produced per second while the motor runs.
    pub ticks_per_sec: u32,
    /// Physical position at which the limit switch closes.
    pub limit_at: i64,
    /// Travel past the switch before the piston hits its mechanical stop.
    pub overtravel: i64,
    /// Physical position at power-up.
    pub start_position: i64,
}

impl Default for SimPistonCfg {
    fn default() -> Self {
        Self {
            ticks_per_sec: 2_000,
            limit_at: 5_000,
            overtravel: 50,
            start_position: 0,
        }
    }
}

struct PlantState {
    command: MotorCommand,
    position: i64,
    // Sub-tick remainder, in tick-microseconds
    carry: u64,
    limit_enabled: bool,
    forced_limit: Option<LimitState>,
    stalled: bool,
    history: Vec<MotorCommand>,
    sink: Option<Arc<dyn EdgeSink>>,
}

/// Shared handle to the simulated plant. Cheap to clone.
#[derive(Clone)]
pub struct SimulatedPiston {
    cfg: SimPistonCfg,
    state: Arc<Mutex<PlantState>>,
}

impl core::fmt::Debug for SimulatedPiston {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedPiston")
            .field("cfg", &self.cfg)
            .field("true_position", &self.true_position())
            .finish()
    }
}

impl SimulatedPiston {
    pub fn new(cfg: SimPistonCfg) -> Self {
        let state = PlantState {
            command: MotorCommand::Stop,
            position: cfg.start_position,
            carry: 0,
            limit_enabled: true,
            forced_limit: None,
            stalled: false,
            history: Vec::new(),
            sink: None,
        };
        Self {
            cfg,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Route encoder edges to `sink` (normally the controller's edge counter).
    pub fn attach_encoder(&self, sink: Arc<dyn EdgeSink>) {
        if let Ok(mut st) = self.state.lock() {
            st.sink = Some(sink);
        }
    }

    pub fn motor(&self) -> SimulatedMotor {
        SimulatedMotor {
            state: self.state.clone(),
        }
    }

    pub fn limit_switch(&self) -> SimulatedLimitSwitch {
        SimulatedLimitSwitch {
            state: self.state.clone(),
            limit_at: self.cfg.limit_at,
        }
    }

    /// Move the plant forward by `d`, emitting one edge per tick of travel.
    pub fn advance(&self, d: Duration) {
        let Ok(mut st) = self.state.lock() else {
            return;
        };
        let step: i64 = match st.command {
            MotorCommand::Extend => 1,
            MotorCommand::Retract => -1,
            MotorCommand::Stop => {
                st.carry = 0;
                return;
            }
        };
        if st.stalled {
            return;
        }
        let elapsed_us = u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
        let budget = st
            .carry
            .saturating_add(elapsed_us.saturating_mul(u64::from(self.cfg.ticks_per_sec)));
        let ticks = budget / MICROS_PER_SEC;
        st.carry = budget % MICROS_PER_SEC;

        let hard_stop = self.cfg.limit_at.saturating_add(self.cfg.overtravel);
        for _ in 0..ticks {
            if step > 0 && st.position >= hard_stop {
                // Jammed against the mechanical stop: no travel, no edges.
                st.carry = 0;
                break;
            }
            st.position += step;
            if let Some(sink) = &st.sink {
                sink.on_edge();
            }
        }
    }

    /// Where the piston really is, independent of what the controller counted.
    pub fn true_position(&self) -> i64 {
        self.state.lock().map(|st| st.position).unwrap_or_default()
    }

    /// Command last applied to the motor lines.
    pub fn command(&self) -> MotorCommand {
        self.state
            .lock()
            .map(|st| st.command)
            .unwrap_or(MotorCommand::Stop)
    }

    /// Every command the motor driver received, in order.
    pub fn history(&self) -> Vec<MotorCommand> {
        self.state
            .lock()
            .map(|st| st.history.clone())
            .unwrap_or_default()
    }

    /// Freeze the mechanism: the motor stays energized but nothing turns.
    pub fn set_stalled(&self, stalled: bool) {
        if let Ok(mut st) = self.state.lock() {
            st.stalled = stalled;
        }
    }

    /// Override the switch level regardless of position; `None` restores physics.
    pub fn force_limit(&self, level: Option<LimitState>) {
        if let Ok(mut st) = self.state.lock() {
            st.forced_limit = level;
        }
    }

    /// Advance the plant in real time on a background thread until the
    /// returned runner is dropped.
    pub fn spawn(&self, period: Duration) -> PlantRunner {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_bg = shutdown.clone();
        let plant = self.clone();
        let join_handle = std::thread::spawn(move || {
            let mut last = Instant::now();
            while !shutdown_bg.load(Ordering::Relaxed) {
                std::thread::sleep(period);
                let now = Instant::now();
                plant.advance(now.saturating_duration_since(last));
                last = now;
            }
            tracing::trace!("simulated plant thread exiting");
        });
        PlantRunner {
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

/// Background thread advancing a [`SimulatedPiston`]; stops on drop.
pub struct PlantRunner {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Drop for PlantRunner {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "simulated plant thread panicked during shutdown");
        }
    }
}

pub struct SimulatedMotor {
    state: Arc<Mutex<PlantState>>,
}

impl MotorDriver for SimulatedMotor {
    fn drive(&mut self, command: MotorCommand) {
        if let Ok(mut st) = self.state.lock() {
            if st.command != command {
                st.carry = 0;
            }
            st.command = command;
            st.history.push(command);
        }
        tracing::trace!(?command, "motor lines set (simulated)");
    }
}

pub struct SimulatedLimitSwitch {
    state: Arc<Mutex<PlantState>>,
    limit_at: i64,
}

impl LimitSwitch for SimulatedLimitSwitch {
    fn read(&self) -> LimitState {
        let Ok(st) = self.state.lock() else {
            return LimitState::Clear;
        };
        if !st.limit_enabled {
            return LimitState::Clear;
        }
        if let Some(level) = st.forced_limit {
            return level;
        }
        if st.position >= self.limit_at {
            LimitState::Triggered
        } else {
            LimitState::Clear
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        if let Ok(mut st) = self.state.lock() {
            st.limit_enabled = enabled;
        }
    }

    fn is_enabled(&self) -> bool {
        self.state.lock().map(|st| st.limit_enabled).unwrap_or(false)
    }
}
