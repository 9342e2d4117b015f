//! Move requests as accepted from the command surface.

use std::str::FromStr;

use crate::error::MotionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveMethod {
    /// Move by `amount` counts from the current position.
    Relative,
    /// Move to position `amount`.
    Absolute,
}

impl FromStr for MoveMethod {
    type Err = MotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rel" | "relative" => Ok(MoveMethod::Relative),
            "abs" | "absolute" => Ok(MoveMethod::Absolute),
            _ => Err(MotionError::InvalidMethod(s.to_string())),
        }
    }
}

impl core::fmt::Display for MoveMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            MoveMethod::Relative => "rel",
            MoveMethod::Absolute => "abs",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub method: MoveMethod,
    /// Signed distance (relative) or destination (absolute), in encoder counts.
    pub amount: i64,
}

impl MoveRequest {
    pub fn relative(amount: i64) -> Self {
        Self {
            method: MoveMethod::Relative,
            amount,
        }
    }

    pub fn absolute(position: i64) -> Self {
        Self {
            method: MoveMethod::Absolute,
            amount: position,
        }
    }

    /// Parse the textual form used by the shell (`"rel"`, `-100`).
    pub fn parse(method: &str, amount: i64) -> Result<Self, MotionError> {
        Ok(Self {
            method: method.parse()?,
            amount,
        })
    }

    /// Resolve the destination for a move starting at `current`.
    pub fn target_from(&self, current: i64) -> Result<i64, MotionError> {
        match self.method {
            MoveMethod::Relative => Ok(current.saturating_add(self.amount)),
            MoveMethod::Absolute if self.amount < 0 => Err(MotionError::InvalidTarget(self.amount)),
            MoveMethod::Absolute => Ok(self.amount),
        }
    }
}
