mod common;

use std::sync::{Arc, Mutex};

use common::{PlantClock, motion, plant_cfg, rig_at, safety};
use nanofloat_core::mocks::MemoryStore;
use nanofloat_core::{
    EdgeCounter, MotionError, MotionState, PersistCfg, Piston, SharedPiston, StopHandle,
};
use nanofloat_hardware::{SimulatedLimitSwitch, SimulatedPiston};
use nanofloat_traits::{LimitState, LimitSwitch};

#[test]
fn commands_during_a_move_get_busy() {
    let rig = rig_at(0);
    let clock = rig.clock.clone();
    let shared = SharedPiston::from(rig.piston);
    let seen: Arc<Mutex<Vec<(Result<(), MotionError>, MotionState, i64)>>> = Arc::default();

    let other = shared.clone();
    let seen_bg = seen.clone();
    clock.on_sleep(move |n| {
        if n == 10 {
            let attempt = other.move_cmd("rel", 5).map(|_| ());
            seen_bg
                .lock()
                .unwrap()
                .push((attempt, other.state(), other.position()));
        }
    });

    let report = shared.move_cmd("rel", 500).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (attempt, state, position) = &seen[0];
    assert_eq!(*attempt, Err(MotionError::Busy));
    assert_eq!(*state, MotionState::Extending);
    // Mirror lags the plant by at most one poll.
    assert!((80..=100).contains(position), "position {position}");
    assert_eq!(report.position, 500);
    assert_eq!(shared.state(), MotionState::Idle);
}

#[test]
fn reset_and_home_are_busy_mid_move() {
    let rig = rig_at(0);
    let clock = rig.clock.clone();
    let shared = SharedPiston::from(rig.piston);
    let other = shared.clone();
    let results: Arc<Mutex<Vec<MotionError>>> = Arc::default();
    let results_bg = results.clone();
    clock.on_sleep(move |n| {
        if n == 3 {
            let mut r = results_bg.lock().unwrap();
            r.push(other.reset_fault().unwrap_err());
            r.push(other.home().unwrap_err());
            r.push(other.zero().unwrap_err());
        }
    });

    shared.move_cmd("rel", 100).unwrap();
    assert_eq!(*results.lock().unwrap(), vec![MotionError::Busy; 3]);
}

#[test]
fn stop_request_ends_move_within_one_poll() {
    let rig = rig_at(0);
    let clock = rig.clock.clone();
    let store = rig.store.clone();
    let plant = rig.plant.clone();
    let shared = SharedPiston::from(rig.piston);
    let other = shared.clone();
    clock.on_sleep(move |n| {
        if n == 25 {
            assert!(other.stop().is_none(), "controller busy; request only");
        }
    });

    let err = shared.move_cmd("rel", 2_000).unwrap_err();

    assert_eq!(err, MotionError::Stopped { position: 250 });
    assert_eq!(clock.sleeps(), 25);
    assert_eq!(shared.state(), MotionState::Idle);
    assert_eq!(store.saved(), Some(250));
    assert_eq!(plant.true_position(), 250);
}

#[test]
fn stop_handle_from_another_thread() {
    let rig = rig_at(0);
    let clock = rig.clock.clone();
    let shared = SharedPiston::from(rig.piston);
    let handle = shared.stop_handle();
    let (tx, rx) = crossbeam_channel::bounded::<()>(0);
    let (ack_tx, ack_rx) = crossbeam_channel::bounded::<()>(0);
    clock.on_sleep(move |n| {
        if n == 4 {
            tx.send(()).unwrap();
            ack_rx.recv().unwrap();
        }
    });
    let stopper = std::thread::spawn(move || {
        rx.recv().unwrap();
        handle.request();
        ack_tx.send(()).unwrap();
    });

    let err = shared.move_cmd("rel", 1_000).unwrap_err();
    stopper.join().unwrap();

    assert_eq!(err, MotionError::Stopped { position: 40 });
}

#[test]
fn stale_stop_does_not_cancel_next_move() {
    let rig = rig_at(0);
    let shared = SharedPiston::from(rig.piston);
    shared.stop_handle().request();
    let report = shared.move_cmd("rel", 100).unwrap();
    assert_eq!(report.position, 100);
}

#[test]
fn idle_stop_applies_directly() {
    let rig = rig_at(0);
    let store = rig.store.clone();
    let shared = SharedPiston::from(rig.piston);
    let saves = store.save_count();
    assert!(shared.stop().is_some());
    assert_eq!(store.save_count(), saves + 1);
}

/// Limit switch that sends a stop request on its first read once a handle is
/// parked in `pending`. The first read of a move is the pre-extend check.
struct StopOnRead {
    inner: SimulatedLimitSwitch,
    pending: Arc<Mutex<Option<StopHandle>>>,
}

impl LimitSwitch for StopOnRead {
    fn read(&self) -> LimitState {
        if let Some(h) = self.pending.lock().unwrap().take() {
            h.request();
        }
        self.inner.read()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.inner.set_enabled(enabled);
    }

    fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }
}

fn piston_with_stop_on_read() -> (Piston, SimulatedPiston, Arc<Mutex<Option<StopHandle>>>) {
    let plant = SimulatedPiston::new(plant_cfg(0));
    let counter = Arc::new(EdgeCounter::new());
    plant.attach_encoder(counter.clone());
    let pending = Arc::new(Mutex::new(None));
    let piston = Piston::builder()
        .with_motor(plant.motor())
        .with_limit_switch(StopOnRead {
            inner: plant.limit_switch(),
            pending: pending.clone(),
        })
        .with_store(MemoryStore::with_saved(0))
        .with_motion(motion())
        .with_safety(safety())
        .with_persist(PersistCfg {
            save_retries: 3,
            fallback_position: 0,
        })
        .with_edge_counter(counter)
        .with_clock(Box::new(PlantClock::new(plant.clone())))
        .build()
        .expect("build piston");
    (piston, plant, pending)
}

#[test]
fn stop_during_shared_move_setup_is_honored() {
    let (piston, plant, pending) = piston_with_stop_on_read();
    let shared = SharedPiston::from(piston);
    *pending.lock().unwrap() = Some(shared.stop_handle());

    let err = shared.move_cmd("rel", 100).unwrap_err();

    assert_eq!(err, MotionError::Stopped { position: 0 });
    assert_eq!(plant.true_position(), 0);
    assert_eq!(shared.state(), MotionState::Idle);
}

#[test]
fn stop_during_owned_move_setup_is_honored() {
    let (mut piston, _plant, pending) = piston_with_stop_on_read();
    *pending.lock().unwrap() = Some(piston.stop_handle());

    let err = piston.move_cmd("rel", 100).unwrap_err();

    assert_eq!(err, MotionError::Stopped { position: 0 });
}

#[test]
fn busy_caller_does_not_swallow_a_stop_for_the_running_move() {
    let rig = rig_at(0);
    let clock = rig.clock.clone();
    let shared = SharedPiston::from(rig.piston);
    let other = shared.clone();
    clock.on_sleep(move |n| {
        if n == 5 {
            other.stop_handle().request();
            assert_eq!(other.move_cmd("rel", 10), Err(MotionError::Busy));
        }
    });

    let err = shared.move_cmd("rel", 1_000).unwrap_err();

    assert_eq!(err, MotionError::Stopped { position: 50 });
}
