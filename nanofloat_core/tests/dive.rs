mod common;

use std::time::Duration;

use common::rig_at;
use nanofloat_core::{DiveLeg, DivePlan, MotionError, MotionState, run_dive};
use nanofloat_traits::MotorCommand;

fn plan(legs: &[(i64, u64)], cycles: u32) -> DivePlan {
    DivePlan {
        legs: legs
            .iter()
            .map(|&(position, hold_ms)| DiveLeg {
                position,
                hold: Duration::from_millis(hold_ms),
            })
            .collect(),
        cycles,
        surface_position: 3_000,
    }
}

#[test]
fn runs_every_cycle_and_holds() {
    let mut rig = rig_at(3_000);
    let summary = run_dive(&mut rig.piston, &plan(&[(1_000, 2_000), (3_000, 1_000)], 2)).unwrap();

    assert_eq!(summary.cycles_completed, 2);
    assert_eq!(summary.final_position, 3_000);
    assert_eq!(rig.store.saved(), Some(3_000));
    // 4 moves of 2000 counts at 2000/s plus 6 s of holds.
    let secs = rig.clock.elapsed().as_secs_f64();
    assert!((9.9..=10.2).contains(&secs), "elapsed {secs}");
    let retracts = rig
        .plant
        .history()
        .iter()
        .filter(|c| **c == MotorCommand::Retract)
        .count();
    assert_eq!(retracts, 2);
}

#[test]
fn limit_on_a_leg_is_not_fatal() {
    let mut rig = rig_at(4_000);
    let summary = run_dive(&mut rig.piston, &plan(&[(6_000, 10), (4_500, 10)], 1)).unwrap();
    assert_eq!(summary.final_position, 4_500);
}

#[test]
fn stop_during_hold_aborts_without_surfacing() {
    let mut rig = rig_at(3_000);
    let handle = rig.piston.stop_handle();
    // The first leg takes 100 polls; stop partway into the hold.
    rig.clock.on_sleep(move |n| {
        if n == 210 {
            handle.request();
        }
    });

    let err = run_dive(&mut rig.piston, &plan(&[(2_000, 60_000), (3_000, 0)], 3)).unwrap_err();

    assert_eq!(err, MotionError::Stopped { position: 2_000 });
    assert_eq!(rig.piston.position(), 2_000);
    assert_eq!(rig.piston.state(), MotionState::Idle);
}

#[test]
fn stop_at_end_of_hold_ends_the_next_leg() {
    let mut rig = rig_at(3_000);
    let handle = rig.piston.stop_handle();
    // 100 polls to reach 2000, then 10 polls of hold; the request lands on
    // the last hold sleep and is still pending when the next leg starts.
    rig.clock.on_sleep(move |n| {
        if n == 110 {
            handle.request();
        }
    });

    let err = run_dive(&mut rig.piston, &plan(&[(2_000, 50), (3_000, 0)], 1)).unwrap_err();

    assert_eq!(err, MotionError::Stopped { position: 2_000 });
    assert_eq!(rig.clock.sleeps(), 110);
    assert_eq!(rig.plant.command(), MotorCommand::Stop);
}

#[test]
fn failed_leg_surfaces_before_reporting() {
    let mut rig = rig_at(1_000);
    let err = run_dive(&mut rig.piston, &plan(&[(2_000, 0), (-5, 0)], 1)).unwrap_err();

    assert_eq!(err, MotionError::InvalidTarget(-5));
    assert_eq!(rig.piston.position(), 3_000);
}

#[test]
fn stall_during_dive_leaves_fault_for_operator() {
    let mut rig = rig_at(3_000);
    rig.plant.set_stalled(true);
    let err = run_dive(&mut rig.piston, &plan(&[(1_000, 0)], 1)).unwrap_err();
    assert!(err.is_fault());
    assert_eq!(rig.piston.state(), MotionState::Faulted);
    assert_eq!(rig.piston.position(), 3_000);
}

#[test]
fn plan_from_config_alternates_dive_and_surface() {
    let cfg = nanofloat_config::Dive {
        cycles: 4,
        dive_position: 100,
        surface_position: 4_000,
        hold_ms: 1_500,
    };
    let plan = DivePlan::from(&cfg);
    assert_eq!(plan.cycles, 4);
    assert_eq!(plan.surface_position, 4_000);
    assert_eq!(
        plan.legs,
        vec![
            DiveLeg { position: 100, hold: Duration::from_millis(1_500) },
            DiveLeg { position: 4_000, hold: Duration::from_millis(1_500) },
        ]
    );
}
