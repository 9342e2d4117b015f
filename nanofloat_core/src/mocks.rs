//! Test and helper doubles for nanofloat_core

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use nanofloat_traits::{BoxError, LimitSwitch, LimitState, MotorCommand, MotorDriver, PositionStore};

/// In-memory position store with failure injection.
///
/// Clones share state, so a test can keep one and hand the other to the
/// controller.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    value: Arc<Mutex<Option<i64>>>,
    default: i64,
    fail_load: Arc<AtomicBool>,
    failing_saves: Arc<AtomicU32>,
    saves: Arc<AtomicU32>,
}

impl MemoryStore {
    pub fn new(default: i64) -> Self {
        Self {
            default,
            ..Self::default()
        }
    }

    /// Store pre-loaded with a saved position.
    pub fn with_saved(position: i64) -> Self {
        let s = Self::new(0);
        if let Ok(mut v) = s.value.lock() {
            *v = Some(position);
        }
        s
    }

    pub fn saved(&self) -> Option<i64> {
        self.value.lock().ok().and_then(|v| *v)
    }

    /// Successful saves so far.
    pub fn save_count(&self) -> u32 {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::Relaxed);
    }

    /// Make the next `n` save attempts fail. `u32::MAX` fails them all.
    pub fn fail_next_saves(&self, n: u32) {
        self.failing_saves.store(n, Ordering::Relaxed);
    }
}

impl PositionStore for MemoryStore {
    fn load(&mut self) -> Result<i64, BoxError> {
        if self.fail_load.load(Ordering::Relaxed) {
            return Err(Box::new(std::io::Error::other("storage not mounted")));
        }
        let v = self
            .value
            .lock()
            .map_err(|_| std::io::Error::other("store lock poisoned"))?;
        Ok(v.unwrap_or(self.default))
    }

    fn save(&mut self, position: i64) -> Result<(), BoxError> {
        let pending = self.failing_saves.load(Ordering::Relaxed);
        if pending > 0 {
            if pending != u32::MAX {
                self.failing_saves.store(pending - 1, Ordering::Relaxed);
            }
            return Err(Box::new(std::io::Error::other("write failed")));
        }
        let mut v = self
            .value
            .lock()
            .map_err(|_| std::io::Error::other("store lock poisoned"))?;
        *v = Some(position);
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Motor that only records what it was told.
#[derive(Debug, Clone, Default)]
pub struct RecordingMotor {
    history: Arc<Mutex<Vec<MotorCommand>>>,
}

impl RecordingMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<MotorCommand> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

impl MotorDriver for RecordingMotor {
    fn drive(&mut self, command: MotorCommand) {
        if let Ok(mut h) = self.history.lock() {
            h.push(command);
        }
    }
}

/// Limit switch whose level is set by the test.
#[derive(Debug, Clone)]
pub struct ManualLimitSwitch {
    triggered: Arc<AtomicBool>,
    enabled: Arc<AtomicBool>,
}

impl Default for ManualLimitSwitch {
    fn default() -> Self {
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl ManualLimitSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_triggered(&self, triggered: bool) {
        self.triggered.store(triggered, Ordering::Relaxed);
    }
}

impl LimitSwitch for ManualLimitSwitch {
    fn read(&self) -> LimitState {
        if self.enabled.load(Ordering::Relaxed) && self.triggered.load(Ordering::Relaxed) {
            LimitState::Triggered
        } else {
            LimitState::Clear
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}
