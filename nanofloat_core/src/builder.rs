//! Type-state builder for `Piston` and generic `build_controller` constructor.
//!
//! `build()` only exists once a motor, limit switch and position store are
//! set. `try_build()` is always available and reports what is missing.

use std::marker::PhantomData;
use std::sync::Arc;

use nanofloat_traits::clock::{Clock, SystemClock};
use nanofloat_traits::{LimitSwitch, MotorDriver, PositionStore};
use tracing::{info, warn};

use crate::config::{MotionCfg, PersistCfg, SafetyCfg};
use crate::controller::MotionController;
use crate::edge_counter::EdgeCounter;
use crate::error::{BuildError, MotionError, Result};
use crate::status::{MotionState, StatusView};
use crate::stop::StopSignal;

pub type BoxedMotor = Box<dyn MotorDriver + Send>;
pub type BoxedLimit = Box<dyn LimitSwitch + Send>;
pub type BoxedStore = Box<dyn PositionStore + Send>;

/// Dynamically dispatched controller, as assembled by the CLI.
pub type Piston = MotionController<BoxedMotor, BoxedLimit, BoxedStore>;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct PistonBuilder<M, L, P> {
    motor: Option<BoxedMotor>,
    limit: Option<BoxedLimit>,
    store: Option<BoxedStore>,
    motion: Option<MotionCfg>,
    safety: Option<SafetyCfg>,
    persist: Option<PersistCfg>,
    counter: Option<Arc<EdgeCounter>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    _m: PhantomData<M>,
    _l: PhantomData<L>,
    _p: PhantomData<P>,
}

impl Default for PistonBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            motor: None,
            limit: None,
            store: None,
            motion: None,
            safety: None,
            persist: None,
            counter: None,
            clock: None,
            _m: PhantomData,
            _l: PhantomData,
            _p: PhantomData,
        }
    }
}

impl Piston {
    pub fn builder() -> PistonBuilder<Missing, Missing, Missing> {
        PistonBuilder::default()
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Validate timing, restore the persisted position, and assemble the controller.
///
/// Shared by `PistonBuilder::try_build()` and `build_controller()`.
#[allow(clippy::too_many_arguments)]
fn validate_and_build<M: MotorDriver, L: LimitSwitch, P: PositionStore>(
    mut motor: M,
    limit: L,
    mut store: P,
    motion: MotionCfg,
    safety: SafetyCfg,
    persist: PersistCfg,
    counter: Option<Arc<EdgeCounter>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<MotionController<M, L, P>> {
    if motion.poll_interval.is_zero() {
        return Err(invalid("poll interval must be > 0"));
    }
    if safety.stall_timeout_ms == 0 {
        return Err(invalid("stall_timeout_ms must be >= 1"));
    }
    if u128::from(safety.stall_timeout_ms) <= motion.poll_interval.as_millis() {
        return Err(invalid("stall_timeout_ms must exceed the poll interval"));
    }
    if safety.max_move_ms == 0 || safety.home_timeout_ms == 0 {
        return Err(invalid("move time budgets must be > 0"));
    }
    if motion.home_position < 0 {
        return Err(invalid("home_position must be >= 0"));
    }

    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(SystemClock),
    };

    // The motor state after a reboot is unknown; start from a known stop.
    motor.drive(nanofloat_traits::MotorCommand::Stop);

    let (position, boot_warning) = match store.load() {
        Ok(p) => {
            info!(position = p, "restored piston position");
            (p, None)
        }
        Err(e) => {
            let err = MotionError::StorageUnavailable(e.to_string());
            warn!(
                error = %err,
                fallback = persist.fallback_position,
                "using fallback position"
            );
            (persist.fallback_position, Some(err))
        }
    };

    let status = StatusView::default();
    status.set_state(MotionState::Idle);
    status.set_position(position);
    status.set_target(position);

    Ok(MotionController {
        motor,
        limit,
        store,
        counter: counter.unwrap_or_default(),
        clock,
        motion,
        safety,
        persist,
        state: MotionState::Idle,
        position,
        target: position,
        limit_latched: false,
        settled: None,
        stop: StopSignal::new(),
        status,
        boot_warning,
    })
}

impl<M, L, P> PistonBuilder<M, L, P> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<Piston> {
        let motor = self
            .motor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingMotor))?;
        let limit = self
            .limit
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLimitSwitch))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        validate_and_build(
            motor,
            limit,
            store,
            self.motion.unwrap_or_default(),
            self.safety.unwrap_or_default(),
            self.persist.unwrap_or_default(),
            self.counter,
            self.clock,
        )
    }

    pub fn with_motion(mut self, motion: MotionCfg) -> Self {
        self.motion = Some(motion);
        self
    }
    pub fn with_safety(mut self, safety: SafetyCfg) -> Self {
        self.safety = Some(safety);
        self
    }
    pub fn with_persist(mut self, persist: PersistCfg) -> Self {
        self.persist = Some(persist);
        self
    }
    /// Share an existing counter, e.g. one already wired to an interrupt.
    pub fn with_edge_counter(mut self, counter: Arc<EdgeCounter>) -> Self {
        self.counter = Some(counter);
        self
    }
    /// Defaults to `SystemClock`.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    fn retype<M2, L2, P2>(self) -> PistonBuilder<M2, L2, P2> {
        PistonBuilder {
            motor: self.motor,
            limit: self.limit,
            store: self.store,
            motion: self.motion,
            safety: self.safety,
            persist: self.persist,
            counter: self.counter,
            clock: self.clock,
            _m: PhantomData,
            _l: PhantomData,
            _p: PhantomData,
        }
    }
}

impl<L, P> PistonBuilder<Missing, L, P> {
    pub fn with_motor(
        mut self,
        motor: impl MotorDriver + Send + 'static,
    ) -> PistonBuilder<Set, L, P> {
        self.motor = Some(Box::new(motor));
        self.retype()
    }
}

impl<M, P> PistonBuilder<M, Missing, P> {
    pub fn with_limit_switch(
        mut self,
        limit: impl LimitSwitch + Send + 'static,
    ) -> PistonBuilder<M, Set, P> {
        self.limit = Some(Box::new(limit));
        self.retype()
    }
}

impl<M, L> PistonBuilder<M, L, Missing> {
    pub fn with_store(
        mut self,
        store: impl PositionStore + Send + 'static,
    ) -> PistonBuilder<M, L, Set> {
        self.store = Some(Box::new(store));
        self.retype()
    }
}

impl PistonBuilder<Set, Set, Set> {
    pub fn build(self) -> Result<Piston> {
        self.try_build()
    }
}

/// Build a statically dispatched controller from concrete parts.
#[allow(clippy::too_many_arguments)]
pub fn build_controller<M, L, P>(
    motor: M,
    limit: L,
    store: P,
    motion: MotionCfg,
    safety: SafetyCfg,
    persist: PersistCfg,
    counter: Option<Arc<EdgeCounter>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<MotionController<M, L, P>>
where
    M: MotorDriver,
    L: LimitSwitch,
    P: PositionStore,
{
    validate_and_build(motor, limit, store, motion, safety, persist, counter, clock)
}
