//! `From` implementations bridging `nanofloat_config` types to core types.

use std::time::Duration;

use crate::config::{MotionCfg, PersistCfg, SafetyCfg};
use crate::dive::{DiveLeg, DivePlan};
use crate::store::FilePositionStore;

// ── MotionCfg ────────────────────────────────────────────────────────────────

impl From<&nanofloat_config::Motion> for MotionCfg {
    fn from(c: &nanofloat_config::Motion) -> Self {
        Self {
            poll_interval: Duration::from_millis(c.poll_interval_ms),
            home_position: c.home_position,
        }
    }
}

// ── SafetyCfg ────────────────────────────────────────────────────────────────

impl From<&nanofloat_config::Motion> for SafetyCfg {
    fn from(c: &nanofloat_config::Motion) -> Self {
        Self {
            stall_timeout_ms: c.stall_timeout_ms,
            max_move_ms: c.max_move_ms,
            home_timeout_ms: c.home_timeout_ms,
        }
    }
}

// ── Storage ──────────────────────────────────────────────────────────────────

impl From<&nanofloat_config::Storage> for PersistCfg {
    fn from(c: &nanofloat_config::Storage) -> Self {
        Self {
            save_retries: c.save_retries,
            fallback_position: c.default_position,
        }
    }
}

impl From<&nanofloat_config::Storage> for FilePositionStore {
    fn from(c: &nanofloat_config::Storage) -> Self {
        FilePositionStore::new(&c.path, c.key.clone(), c.default_position)
    }
}

// ── Dive ─────────────────────────────────────────────────────────────────────

impl From<&nanofloat_config::Dive> for DivePlan {
    fn from(c: &nanofloat_config::Dive) -> Self {
        let hold = Duration::from_millis(c.hold_ms);
        DivePlan {
            legs: vec![
                DiveLeg {
                    position: c.dive_position,
                    hold,
                },
                DiveLeg {
                    position: c.surface_position,
                    hold,
                },
            ],
            cycles: c.cycles,
            surface_position: c.surface_position,
        }
    }
}

impl From<&nanofloat_config::DiveLegRow> for DiveLeg {
    fn from(r: &nanofloat_config::DiveLegRow) -> Self {
        DiveLeg {
            position: r.position,
            hold: Duration::from_millis(r.hold_ms),
        }
    }
}
