//! Hardware seams between the piston controller and whatever drives it
//! (GPIO on the float, a simulated plant on the bench, spies in tests).

pub mod clock;

pub use clock::{Clock, SystemClock};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Requested state of the two H-bridge direction lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorCommand {
    Extend,
    Retract,
    Stop,
}

/// Level reported by the end-of-travel switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitState {
    Clear,
    Triggered,
}

impl LimitState {
    #[inline]
    pub fn is_triggered(self) -> bool {
        matches!(self, LimitState::Triggered)
    }
}

/// Two-line motor interface. Implementations must never assert both
/// direction lines at once.
pub trait MotorDriver {
    fn drive(&mut self, command: MotorCommand);
}

/// End-of-travel switch with a switchable pull/enable line.
pub trait LimitSwitch {
    /// Current switch level; a disabled switch always reads `Clear`.
    fn read(&self) -> LimitState;
    fn set_enabled(&mut self, enabled: bool);
    fn is_enabled(&self) -> bool;
}

/// Receiver of encoder edges. Called from interrupt context, so
/// implementations must not block.
pub trait EdgeSink: Send + Sync {
    fn on_edge(&self);
}

/// Durable home for the last known piston position.
pub trait PositionStore {
    /// Last persisted position, or the store's default when nothing was saved yet.
    fn load(&mut self) -> Result<i64, BoxError>;
    fn save(&mut self, position: i64) -> Result<(), BoxError>;
}

impl<T: MotorDriver + ?Sized> MotorDriver for Box<T> {
    fn drive(&mut self, command: MotorCommand) {
        (**self).drive(command);
    }
}

impl<T: LimitSwitch + ?Sized> LimitSwitch for Box<T> {
    fn read(&self) -> LimitState {
        (**self).read()
    }
    fn set_enabled(&mut self, enabled: bool) {
        (**self).set_enabled(enabled);
    }
    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}

impl<T: PositionStore + ?Sized> PositionStore for Box<T> {
    fn load(&mut self) -> Result<i64, BoxError> {
        (**self).load()
    }
    fn save(&mut self, position: i64) -> Result<(), BoxError> {
        (**self).save(position)
    }
}
