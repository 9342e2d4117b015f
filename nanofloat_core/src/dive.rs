//! Dive sequencer: a repeated series of absolute moves with holds between.
//!
//! Any leg that fails for a reason other than a fault or an operator stop
//! triggers one recovery move to the surface position before the error is
//! returned. A limit hit on the way out is the piston's end of travel and the
//! sequence carries on from there.

use std::time::Duration;

use nanofloat_traits::{LimitSwitch, MotorDriver, PositionStore};
use tracing::{error, info, warn};

use crate::controller::MotionController;
use crate::error::MotionError;
use crate::request::MoveRequest;
use crate::stop::StopTicket;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiveLeg {
    /// Absolute piston position for this leg.
    pub position: i64,
    /// Time to hold once the position is reached.
    pub hold: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivePlan {
    pub legs: Vec<DiveLeg>,
    pub cycles: u32,
    /// Where to park the piston if a leg fails.
    pub surface_position: i64,
}

impl DivePlan {
    /// Replace the legs, keeping cycles and surface position.
    pub fn with_legs(mut self, legs: Vec<DiveLeg>) -> Self {
        self.legs = legs;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiveSummary {
    pub cycles_completed: u32,
    pub final_position: i64,
}

pub fn run_dive<M, L, P>(
    ctl: &mut MotionController<M, L, P>,
    plan: &DivePlan,
) -> Result<DiveSummary, MotionError>
where
    M: MotorDriver,
    L: LimitSwitch,
    P: PositionStore,
{
    // One ticket for the whole dive: a stop between legs still ends it.
    let ticket = ctl.stop.arm();
    info!(cycles = plan.cycles, legs = plan.legs.len(), "dive start");
    for cycle in 0..plan.cycles {
        for (i, leg) in plan.legs.iter().enumerate() {
            match ctl.move_with(MoveRequest::absolute(leg.position), ticket) {
                Ok(report) => {
                    info!(cycle, leg = i, position = report.position, "leg reached");
                }
                Err(MotionError::LimitReached { position }) => {
                    warn!(cycle, leg = i, position, "leg cut short by limit switch");
                }
                Err(e) => return Err(recover(ctl, plan, e, ticket)),
            }
            if let Err(e) = ctl.hold_with(leg.hold, ticket) {
                return Err(recover(ctl, plan, e, ticket));
            }
        }
        info!(cycle, "dive cycle complete");
    }
    let summary = DiveSummary {
        cycles_completed: plan.cycles,
        final_position: ctl.position(),
    };
    info!(?summary, "dive finished");
    Ok(summary)
}

fn recover<M, L, P>(
    ctl: &mut MotionController<M, L, P>,
    plan: &DivePlan,
    err: MotionError,
    ticket: StopTicket,
) -> MotionError
where
    M: MotorDriver,
    L: LimitSwitch,
    P: PositionStore,
{
    if err.is_fault() || matches!(err, MotionError::Stopped { .. } | MotionError::Faulted) {
        error!(error = %err, "dive aborted");
        return err;
    }
    warn!(error = %err, surface = plan.surface_position, "dive leg failed; surfacing");
    match ctl.move_with(MoveRequest::absolute(plan.surface_position), ticket) {
        Ok(r) => info!(position = r.position, "surfaced after failure"),
        Err(MotionError::LimitReached { position }) => {
            info!(position, "surfaced to end of travel after failure");
        }
        Err(e) => error!(error = %e, "recovery move failed"),
    }
    err
}
