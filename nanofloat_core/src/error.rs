use thiserror::Error;

/// Outcomes of the motion controller other than a completed move.
///
/// Validation errors are returned before any motor command. Variants carrying a
/// `position` are stop paths: the motor has been stopped and that position
/// recorded before the error is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MotionError {
    #[error("invalid move method '{0}' (expected rel|relative|abs|absolute)")]
    InvalidMethod(String),
    #[error("invalid target {0}: absolute targets must be >= 0")]
    InvalidTarget(i64),
    #[error("busy: another move is in progress")]
    Busy,
    #[error("controller faulted; reset (re-home) required")]
    Faulted,
    #[error("limit switch reached at position {position}")]
    LimitReached { position: i64 },
    #[error("stall detected at position {position}: no encoder edges while driving")]
    StallDetected { position: i64 },
    #[error("move exceeded its time budget at position {position}")]
    MoveTimeout { position: i64 },
    #[error("stopped by request at position {position}")]
    Stopped { position: i64 },
    #[error("homing unavailable: limit switch is disabled")]
    HomingUnavailable,
    #[error("position storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("position storage write failed: {0}")]
    StorageWriteError(String),
}

impl MotionError {
    /// Position at which the motor was stopped, for stop-path outcomes.
    pub fn position(&self) -> Option<i64> {
        match self {
            MotionError::LimitReached { position }
            | MotionError::StallDetected { position }
            | MotionError::MoveTimeout { position }
            | MotionError::Stopped { position } => Some(*position),
            _ => None,
        }
    }

    /// Faults latch the controller until an operator reset.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            MotionError::StallDetected { .. } | MotionError::MoveTimeout { .. }
        )
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing motor driver")]
    MissingMotor,
    #[error("missing limit switch")]
    MissingLimitSwitch,
    #[error("missing position store")]
    MissingStore,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
