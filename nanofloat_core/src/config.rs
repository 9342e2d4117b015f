//! Runtime configuration used by `MotionController`.
//!
//! Separate from the TOML schema in `nanofloat_config`; see `conversions`.

use std::time::Duration;

/// Control loop timing and homing.
#[derive(Debug, Clone)]
pub struct MotionCfg {
    /// Sleep between polls of the edge counter and limit switch.
    pub poll_interval: Duration,
    /// Position assigned when homing reaches the limit switch.
    pub home_position: i64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5),
            home_position: 0,
        }
    }
}

/// Watchdogs for an in-flight move.
#[derive(Debug, Clone)]
pub struct SafetyCfg {
    /// Fault if no edge arrives for this long while the motor is driven.
    pub stall_timeout_ms: u64,
    /// Hard cap on a single move.
    pub max_move_ms: u64,
    /// Hard cap on a homing run.
    pub home_timeout_ms: u64,
}

impl Default for SafetyCfg {
    fn default() -> Self {
        Self {
            stall_timeout_ms: 500,
            max_move_ms: 120_000,
            home_timeout_ms: 180_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PersistCfg {
    /// Retries after a failed save before persistence is flagged degraded.
    pub save_retries: u8,
    /// Position assumed when the store cannot be read at boot.
    pub fallback_position: i64,
}

impl Default for PersistCfg {
    fn default() -> Self {
        Self {
            save_retries: 3,
            fallback_position: 0,
        }
    }
}
