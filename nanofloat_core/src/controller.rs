//! The piston motion controller.
//!
//! Owns the absolute position and is the only code that changes it. A move
//! resolves its target once, commands the motor, then polls the edge counter
//! and limit switch until one of: target reached, limit tripped while
//! extending, stop requested, encoder silent for too long, or the move's time
//! budget spent. Every one of those paths stops the motor before anything else
//! and then persists the position.

use std::sync::Arc;
use std::time::Duration;

use nanofloat_traits::clock::Clock;
use nanofloat_traits::{LimitState, LimitSwitch, MotorCommand, MotorDriver, PositionStore};
use tracing::{debug, error, info, trace, warn};

use crate::config::{MotionCfg, PersistCfg, SafetyCfg};
use crate::edge_counter::EdgeCounter;
use crate::error::MotionError;
use crate::request::{MoveMethod, MoveRequest};
use crate::status::{MotionState, MoveReport, Persistence, StatusView};
use crate::stop::{StopHandle, StopSignal, StopTicket};

/// Why the poll loop ended short of its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Abort {
    Limit,
    Requested,
    Stall,
    Timeout,
}

pub struct MotionController<M: MotorDriver, L: LimitSwitch, P: PositionStore> {
    pub(crate) motor: M,
    pub(crate) limit: L,
    pub(crate) store: P,
    pub(crate) counter: Arc<EdgeCounter>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) motion: MotionCfg,
    pub(crate) safety: SafetyCfg,
    pub(crate) persist: PersistCfg,

    pub(crate) state: MotionState,
    pub(crate) position: i64,
    pub(crate) target: i64,
    // Set when the switch stopped an extend; blocks extends until a retract
    // leaves the switch or the operator resets.
    pub(crate) limit_latched: bool,
    // (target, position) of the last move that arrived. Cleared by anything
    // that moves the piston or redefines its position.
    pub(crate) settled: Option<(i64, i64)>,
    pub(crate) stop: StopSignal,
    pub(crate) status: StatusView,
    pub(crate) boot_warning: Option<MotionError>,
}

impl<M: MotorDriver, L: LimitSwitch, P: PositionStore> core::fmt::Debug
    for MotionController<M, L, P>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MotionController")
            .field("state", &self.state)
            .field("position", &self.position)
            .field("target", &self.target)
            .field("limit_latched", &self.limit_latched)
            .finish()
    }
}

impl<M: MotorDriver, L: LimitSwitch, P: PositionStore> MotionController<M, L, P> {
    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    /// Lock-free mirror of state and position for other threads.
    pub fn status(&self) -> StatusView {
        self.status.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.handle()
    }

    /// Counter to hand to the encoder interrupt.
    pub fn edge_counter(&self) -> Arc<EdgeCounter> {
        self.counter.clone()
    }

    pub fn limit_enabled(&self) -> bool {
        self.limit.is_enabled()
    }

    pub fn limit_state(&self) -> LimitState {
        self.limit.read()
    }

    /// Storage problem met while restoring the position at boot, if any.
    pub fn boot_warning(&self) -> Option<&MotionError> {
        self.boot_warning.as_ref()
    }

    /// Move using the textual method names of the command surface.
    pub fn move_cmd(&mut self, method: &str, amount: i64) -> Result<MoveReport, MotionError> {
        let request = MoveRequest::parse(method, amount)?;
        self.move_to(request)
    }

    /// Stop requests made from this call on end the move.
    pub fn move_to(&mut self, request: MoveRequest) -> Result<MoveReport, MotionError> {
        let ticket = self.stop.arm();
        self.move_with(request, ticket)
    }

    pub(crate) fn move_with(
        &mut self,
        request: MoveRequest,
        ticket: StopTicket,
    ) -> Result<MoveReport, MotionError> {
        self.ensure_idle()?;
        let start = self.position;
        let target = request.target_from(start)?;
        self.target = target;
        self.status.set_target(target);

        // A repeated absolute move is a no-op even when the last one overshot.
        let repeat = request.method == MoveMethod::Absolute
            && self.settled == Some((target, start));
        if target == start || repeat {
            debug!(position = start, target, "target already reached; no motion");
            return Ok(MoveReport {
                start,
                target,
                position: start,
                persistence: Persistence::Unchanged,
            });
        }
        self.settled = None;

        let dir = if target > start {
            MotorCommand::Extend
        } else {
            MotorCommand::Retract
        };
        if dir == MotorCommand::Extend && (self.limit_latched || self.limit.read().is_triggered())
        {
            self.limit_latched = true;
            warn!(position = start, target, "extend refused: limit switch is tripped");
            return Err(MotionError::LimitReached { position: start });
        }

        info!(method = %request.method, amount = request.amount, start, target, "move start");
        if let Err(cause) = self.run_motor(dir, Some(target), self.safety.max_move_ms, ticket) {
            return Err(self.abort(dir, cause));
        }
        let position = self.position;
        self.settled = Some((target, position));
        let persistence = self.finish(dir, MotionState::Idle);
        info!(position, target, overshoot = (position - target).abs(), "move complete");
        Ok(MoveReport {
            start,
            target,
            position,
            persistence,
        })
    }

    /// Stop the motor and persist the position as-is.
    ///
    /// A move in flight on another thread should be stopped through a
    /// [`StopHandle`] instead; this is for a controller that is not moving.
    pub fn stop(&mut self) -> Persistence {
        self.motor.drive(MotorCommand::Stop);
        self.stop.clear();
        let next = match self.state {
            MotionState::Idle => MotionState::Idle,
            MotionState::Faulted => MotionState::Faulted,
            // Only reachable if a move unwound without cleaning up.
            MotionState::Extending | MotionState::Retracting => {
                error!(state = %self.state, "stop found a move without an owner; faulting");
                MotionState::Faulted
            }
        };
        self.set_state(next);
        info!(position = self.position, "stop");
        self.save_position()
    }

    /// Operator reset after a fault: re-home against the limit switch.
    pub fn reset_fault(&mut self) -> Result<MoveReport, MotionError> {
        let ticket = self.stop.arm();
        self.reset_fault_with(ticket)
    }

    pub(crate) fn reset_fault_with(&mut self, ticket: StopTicket) -> Result<MoveReport, MotionError> {
        if matches!(
            self.state,
            MotionState::Extending | MotionState::Retracting
        ) {
            return Err(MotionError::Busy);
        }
        info!(was = %self.state, "fault reset requested; homing");
        self.home_inner(ticket)
    }

    /// Drive out to the limit switch and adopt the configured home position.
    pub fn home(&mut self) -> Result<MoveReport, MotionError> {
        let ticket = self.stop.arm();
        self.home_with(ticket)
    }

    pub(crate) fn home_with(&mut self, ticket: StopTicket) -> Result<MoveReport, MotionError> {
        self.ensure_idle()?;
        self.home_inner(ticket)
    }

    /// Declare the current physical position to be zero.
    pub fn zero(&mut self) -> Result<Persistence, MotionError> {
        self.ensure_idle()?;
        info!(previous = self.position, "position zeroed");
        self.settled = None;
        self.position = 0;
        self.target = 0;
        self.status.set_position(0);
        self.status.set_target(0);
        Ok(self.save_position())
    }

    /// Energize or bypass the limit switch. Bypassing leaves extend travel
    /// unprotected and is logged as such.
    pub fn set_limit_enabled(&mut self, enabled: bool) {
        self.limit.set_enabled(enabled);
        if enabled {
            info!("limit switch enabled");
        } else {
            self.limit_latched = false;
            warn!("limit switch DISABLED: extend travel is unprotected until re-enabled");
        }
    }

    /// Hold position for `d`, still honoring stop requests.
    pub fn hold(&mut self, d: Duration) -> Result<(), MotionError> {
        let ticket = self.stop.arm();
        self.hold_with(d, ticket)
    }

    pub(crate) fn hold_with(&mut self, d: Duration, ticket: StopTicket) -> Result<(), MotionError> {
        self.ensure_idle()?;
        let epoch = self.clock.now();
        let budget = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        while self.clock.ms_since(epoch) < budget {
            if self.stop.take_since(ticket) {
                info!(position = self.position, "hold interrupted by stop");
                return Err(MotionError::Stopped {
                    position: self.position,
                });
            }
            let remaining = budget.saturating_sub(self.clock.ms_since(epoch));
            let step = self.motion.poll_interval.min(Duration::from_millis(remaining));
            self.clock.sleep(step.max(Duration::from_millis(1)));
        }
        Ok(())
    }

    /// Write the in-memory position, retrying a bounded number of times.
    pub fn save_position(&mut self) -> Persistence {
        let attempts = 1 + u32::from(self.persist.save_retries);
        let mut last_err = String::new();
        for attempt in 1..=attempts {
            match self.store.save(self.position) {
                Ok(()) => {
                    if self.status.persistence_degraded() {
                        info!(position = self.position, "persistence restored");
                    }
                    self.status.set_degraded(false);
                    return Persistence::Saved;
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "position save failed");
                    last_err = e.to_string();
                    if attempt < attempts {
                        self.clock.sleep(self.motion.poll_interval);
                    }
                }
            }
        }
        self.status.set_degraded(true);
        error!(
            position = self.position,
            "position not persisted; continuing with in-memory value"
        );
        Persistence::Degraded(MotionError::StorageWriteError(last_err))
    }

    fn ensure_idle(&self) -> Result<(), MotionError> {
        match self.state {
            MotionState::Idle => Ok(()),
            MotionState::Faulted => Err(MotionError::Faulted),
            MotionState::Extending | MotionState::Retracting => Err(MotionError::Busy),
        }
    }

    fn set_state(&mut self, state: MotionState) {
        if self.state != state {
            trace!(from = %self.state, to = %state, "state change");
        }
        self.state = state;
        self.status.set_state(state);
    }

    fn home_inner(&mut self, ticket: StopTicket) -> Result<MoveReport, MotionError> {
        if !self.limit.is_enabled() {
            return Err(MotionError::HomingUnavailable);
        }
        let resume = self.state;
        let start = self.position;
        self.settled = None;
        let outcome = if self.limit.read().is_triggered() {
            Err(Abort::Limit)
        } else {
            self.run_motor(MotorCommand::Extend, None, self.safety.home_timeout_ms, ticket)
        };

        match outcome {
            Err(Abort::Limit) => {
                self.position = self.motion.home_position;
                self.target = self.position;
                self.status.set_position(self.position);
                self.status.set_target(self.position);
                // The switch itself still blocks extends from here.
                self.limit_latched = false;
                self.set_state(MotionState::Idle);
                let persistence = self.save_position();
                info!(position = self.position, ?persistence, "homed at limit switch");
                Ok(MoveReport {
                    start,
                    target: self.position,
                    position: self.position,
                    persistence,
                })
            }
            Err(Abort::Requested) => {
                let persistence = self.save_position();
                debug!(?persistence, "homing stopped by request");
                self.set_state(resume);
                Err(MotionError::Stopped {
                    position: self.position,
                })
            }
            Err(cause) => Err(self.abort(MotorCommand::Extend, cause)),
            // No target: only the switch or a watchdog ends a homing run.
            Ok(()) => Err(self.abort(MotorCommand::Extend, Abort::Timeout)),
        }
    }

    /// Drive in `dir` until the target is reached or a stop condition hits,
    /// then stop the motor.
    fn run_motor(
        &mut self,
        dir: MotorCommand,
        target: Option<i64>,
        budget_ms: u64,
        ticket: StopTicket,
    ) -> Result<(), Abort> {
        // Edges counted while idle belong to nobody.
        let stray = self.counter.take_delta();
        if stray > 0 {
            debug!(edges = stray, "discarding edges counted while idle");
        }

        self.set_state(if dir == MotorCommand::Extend {
            MotionState::Extending
        } else {
            MotionState::Retracting
        });
        self.motor.drive(dir);

        let epoch = self.clock.now();
        let mut last_edge_ms: u64 = 0;
        let outcome = loop {
            if self.stop.take_since(ticket) {
                break Err(Abort::Requested);
            }
            let now = self.clock.ms_since(epoch);
            let delta = self.counter.take_delta();
            if delta > 0 {
                self.apply_edges(dir, delta);
                last_edge_ms = now;
            }
            trace!(position = self.position, delta, "poll");

            if dir == MotorCommand::Extend && self.limit.read().is_triggered() {
                break Err(Abort::Limit);
            }
            if let Some(t) = target
                && reached(dir, self.position, t)
            {
                break Ok(());
            }
            if now.saturating_sub(last_edge_ms) >= self.safety.stall_timeout_ms {
                break Err(Abort::Stall);
            }
            if now >= budget_ms {
                break Err(Abort::Timeout);
            }
            self.clock.sleep(self.motion.poll_interval);
        };

        self.motor.drive(MotorCommand::Stop);
        // Edges that landed between the last poll and the stop command.
        let tail = self.counter.take_delta();
        if tail > 0 {
            self.apply_edges(dir, tail);
        }
        outcome
    }

    fn apply_edges(&mut self, dir: MotorCommand, edges: u32) {
        let d = i64::from(edges);
        self.position = match dir {
            MotorCommand::Extend => self.position.saturating_add(d),
            MotorCommand::Retract => self.position.saturating_sub(d),
            MotorCommand::Stop => self.position,
        };
        self.status.set_position(self.position);
    }

    /// Settle state and storage after the motor has stopped.
    fn finish(&mut self, dir: MotorCommand, next: MotionState) -> Persistence {
        if dir == MotorCommand::Retract && !self.limit.read().is_triggered() {
            self.limit_latched = false;
        }
        self.set_state(next);
        self.save_position()
    }

    fn abort(&mut self, dir: MotorCommand, cause: Abort) -> MotionError {
        let position = self.position;
        let (next, err) = match cause {
            Abort::Limit => {
                self.limit_latched = true;
                (MotionState::Idle, MotionError::LimitReached { position })
            }
            Abort::Requested => (MotionState::Idle, MotionError::Stopped { position }),
            Abort::Stall => (MotionState::Faulted, MotionError::StallDetected { position }),
            Abort::Timeout => (MotionState::Faulted, MotionError::MoveTimeout { position }),
        };
        let persistence = self.finish(dir, next);
        if err.is_fault() {
            error!(error = %err, ?persistence, "move faulted; reset required");
        } else {
            warn!(error = %err, ?persistence, "move ended early");
        }
        err
    }
}

/// True once `position` is at or past `target` in the direction of travel.
#[inline]
fn reached(dir: MotorCommand, position: i64, target: i64) -> bool {
    match dir {
        MotorCommand::Extend => position >= target,
        MotorCommand::Retract => position <= target,
        MotorCommand::Stop => true,
    }
}
