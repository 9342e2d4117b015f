//! Controller state and the lock-free status mirror read by other threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};

use crate::error::MotionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionState {
    Idle,
    Extending,
    Retracting,
    /// Stall or timeout; no moves until an operator reset.
    Faulted,
}

impl MotionState {
    fn to_u8(self) -> u8 {
        match self {
            MotionState::Idle => 0,
            MotionState::Extending => 1,
            MotionState::Retracting => 2,
            MotionState::Faulted => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => MotionState::Extending,
            2 => MotionState::Retracting,
            3 => MotionState::Faulted,
            _ => MotionState::Idle,
        }
    }
}

impl core::fmt::Display for MotionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            MotionState::Idle => "idle",
            MotionState::Extending => "extending",
            MotionState::Retracting => "retracting",
            MotionState::Faulted => "faulted",
        })
    }
}

/// Whether the final position of a move reached durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    Saved,
    /// Every save attempt failed; the position lives in memory only.
    Degraded(MotionError),
    /// Nothing moved, so nothing was written.
    Unchanged,
}

impl Persistence {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Persistence::Degraded(_))
    }
}

/// Result of a completed move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    pub start: i64,
    pub target: i64,
    /// Counted position where the piston stopped (may pass `target` by up to
    /// one poll interval of edges).
    pub position: i64,
    pub persistence: Persistence,
}

impl MoveReport {
    /// Counts travelled past the target in the direction of travel.
    pub fn overshoot(&self) -> i64 {
        if self.target >= self.start {
            (self.position - self.target).max(0)
        } else {
            (self.target - self.position).max(0)
        }
    }
}

#[derive(Debug, Default)]
struct StatusCell {
    state: AtomicU8,
    position: AtomicI64,
    target: AtomicI64,
    degraded: AtomicBool,
}

/// Read-only view of the controller, updated every poll. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct StatusView {
    cell: Arc<StatusCell>,
}

impl StatusView {
    pub fn state(&self) -> MotionState {
        MotionState::from_u8(self.cell.state.load(Ordering::Acquire))
    }

    pub fn position(&self) -> i64 {
        self.cell.position.load(Ordering::Acquire)
    }

    /// Target of the move in flight (or of the last move).
    pub fn target(&self) -> i64 {
        self.cell.target.load(Ordering::Acquire)
    }

    /// True once a save has been abandoned and not yet followed by a good one.
    pub fn persistence_degraded(&self) -> bool {
        self.cell.degraded.load(Ordering::Acquire)
    }

    pub(crate) fn set_state(&self, state: MotionState) {
        self.cell.state.store(state.to_u8(), Ordering::Release);
    }

    pub(crate) fn set_position(&self, position: i64) {
        self.cell.position.store(position, Ordering::Release);
    }

    pub(crate) fn set_target(&self, target: i64) {
        self.cell.target.store(target, Ordering::Release);
    }

    pub(crate) fn set_degraded(&self, degraded: bool) {
        self.cell.degraded.store(degraded, Ordering::Release);
    }
}
