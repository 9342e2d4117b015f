//! Thread-safe front end for a controller.
//!
//! The controller itself takes `&mut self` for every motion command. Sharing
//! it between the shell, a signal handler and the dive sequencer goes through
//! a mutex that is only ever *tried*: a command arriving while another holds
//! the controller gets `Busy` instead of queueing behind a long move. Reads
//! and stop requests bypass the lock entirely.

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use nanofloat_traits::{LimitSwitch, MotorDriver, PositionStore};
use tracing::warn;

use crate::builder::Piston;
use crate::controller::MotionController;
use crate::error::MotionError;
use crate::request::MoveRequest;
use crate::status::{MotionState, MoveReport, Persistence, StatusView};
use crate::stop::StopHandle;

pub struct SharedMotion<M: MotorDriver, L: LimitSwitch, P: PositionStore> {
    inner: Arc<Mutex<MotionController<M, L, P>>>,
    stop: StopHandle,
    status: StatusView,
}

/// Shared form of the boxed `Piston`.
pub type SharedPiston = SharedMotion<
    crate::builder::BoxedMotor,
    crate::builder::BoxedLimit,
    crate::builder::BoxedStore,
>;

impl<M: MotorDriver, L: LimitSwitch, P: PositionStore> Clone for SharedMotion<M, L, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            stop: self.stop.clone(),
            status: self.status.clone(),
        }
    }
}

impl From<Piston> for SharedPiston {
    fn from(p: Piston) -> Self {
        SharedMotion::new(p)
    }
}

impl<M: MotorDriver, L: LimitSwitch, P: PositionStore> SharedMotion<M, L, P> {
    pub fn new(controller: MotionController<M, L, P>) -> Self {
        let stop = controller.stop_handle();
        let status = controller.status();
        Self {
            inner: Arc::new(Mutex::new(controller)),
            stop,
            status,
        }
    }

    fn try_lock(&self) -> Result<MutexGuard<'_, MotionController<M, L, P>>, MotionError> {
        match self.inner.try_lock() {
            Ok(g) => Ok(g),
            Err(TryLockError::WouldBlock) => Err(MotionError::Busy),
            Err(TryLockError::Poisoned(p)) => {
                warn!("controller lock poisoned by a panicked command; recovering");
                Ok(p.into_inner())
            }
        }
    }

    /// Run `f` with exclusive access, or fail with `Busy`.
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut MotionController<M, L, P>) -> R,
    ) -> Result<R, MotionError> {
        let mut guard = self.try_lock()?;
        Ok(f(&mut guard))
    }

    pub fn move_cmd(&self, method: &str, amount: i64) -> Result<MoveReport, MotionError> {
        let request = MoveRequest::parse(method, amount)?;
        self.move_to(request)
    }

    /// Stop requests made from this call on end the move, including ones
    /// that land before the lock is taken.
    pub fn move_to(&self, request: MoveRequest) -> Result<MoveReport, MotionError> {
        let ticket = self.stop.arm();
        self.with(|c| c.move_with(request, ticket))?
    }

    /// Stop whatever is happening.
    ///
    /// A move in flight sees the request within one poll. When nothing holds
    /// the controller the stop is applied directly and the position saved.
    pub fn stop(&self) -> Option<Persistence> {
        self.stop.request();
        self.with(|c| c.stop()).ok()
    }

    pub fn reset_fault(&self) -> Result<MoveReport, MotionError> {
        let ticket = self.stop.arm();
        self.with(|c| c.reset_fault_with(ticket))?
    }

    pub fn home(&self) -> Result<MoveReport, MotionError> {
        let ticket = self.stop.arm();
        self.with(|c| c.home_with(ticket))?
    }

    pub fn zero(&self) -> Result<Persistence, MotionError> {
        self.with(|c| c.zero())?
    }

    pub fn set_limit_enabled(&self, enabled: bool) -> Result<(), MotionError> {
        self.with(|c| c.set_limit_enabled(enabled))
    }

    pub fn position(&self) -> i64 {
        self.status.position()
    }

    pub fn state(&self) -> MotionState {
        self.status.state()
    }

    pub fn status(&self) -> StatusView {
        self.status.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}
