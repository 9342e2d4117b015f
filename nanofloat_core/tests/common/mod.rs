#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use nanofloat_core::mocks::MemoryStore;
use nanofloat_core::{EdgeCounter, MotionCfg, PersistCfg, Piston, SafetyCfg};
use nanofloat_hardware::{SimPistonCfg, SimulatedPiston};
use nanofloat_traits::clock::Clock;
use nanofloat_traits::clock::test_clock::TestClock;

type SleepHook = Box<dyn FnMut(u64) + Send>;

/// Manual clock that also moves the simulated plant, so every controller
/// sleep produces the encoder edges that would have arrived meanwhile.
#[derive(Clone)]
pub struct PlantClock {
    clock: TestClock,
    plant: SimulatedPiston,
    sleeps: Arc<AtomicU64>,
    hook: Arc<Mutex<Option<SleepHook>>>,
}

impl PlantClock {
    pub fn new(plant: SimulatedPiston) -> Self {
        Self {
            clock: TestClock::new(),
            plant,
            sleeps: Arc::new(AtomicU64::new(0)),
            hook: Arc::new(Mutex::new(None)),
        }
    }

    /// Run `f` after every sleep with the running sleep count.
    pub fn on_sleep(&self, f: impl FnMut(u64) + Send + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(f));
    }

    pub fn sleeps(&self) -> u64 {
        self.sleeps.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }
}

impl Clock for PlantClock {
    fn now(&self) -> Instant {
        self.clock.now()
    }

    fn sleep(&self, d: Duration) {
        self.clock.advance(d);
        self.plant.advance(d);
        let n = self.sleeps.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(hook) = self.hook.lock().unwrap().as_mut() {
            hook(n);
        }
    }
}

pub struct Rig {
    pub plant: SimulatedPiston,
    pub store: MemoryStore,
    pub clock: PlantClock,
    pub piston: Piston,
}

/// 2000 edges/s with a 5 ms poll: 10 edges per poll.
pub fn plant_cfg(start_position: i64) -> SimPistonCfg {
    SimPistonCfg {
        ticks_per_sec: 2_000,
        limit_at: 5_000,
        overtravel: 50,
        start_position,
    }
}

pub fn motion() -> MotionCfg {
    MotionCfg {
        poll_interval: Duration::from_millis(5),
        home_position: 5_000,
    }
}

pub fn safety() -> SafetyCfg {
    SafetyCfg {
        stall_timeout_ms: 200,
        max_move_ms: 10_000,
        home_timeout_ms: 10_000,
    }
}

pub fn rig_with(plant_cfg: SimPistonCfg, store: MemoryStore, safety: SafetyCfg) -> Rig {
    let plant = SimulatedPiston::new(plant_cfg);
    let counter = Arc::new(EdgeCounter::new());
    plant.attach_encoder(counter.clone());
    let clock = PlantClock::new(plant.clone());
    let piston = Piston::builder()
        .with_motor(plant.motor())
        .with_limit_switch(plant.limit_switch())
        .with_store(store.clone())
        .with_motion(motion())
        .with_safety(safety)
        .with_persist(PersistCfg {
            save_retries: 3,
            fallback_position: 0,
        })
        .with_edge_counter(counter)
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("build piston");
    Rig {
        plant,
        store,
        clock,
        piston,
    }
}

/// Plant and store agree on `start`.
pub fn rig_at(start: i64) -> Rig {
    rig_with(plant_cfg(start), MemoryStore::with_saved(start), safety())
}

pub const EDGES_PER_POLL: i64 = 10;
