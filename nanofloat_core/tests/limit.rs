mod common;

use common::rig_at;
use nanofloat_core::{MotionError, MotionState, Persistence};
use nanofloat_traits::{LimitState, MotorCommand};

#[test]
fn extend_stops_at_limit_switch() {
    let mut rig = rig_at(4_000);
    let err = rig.piston.move_cmd("abs", 8_000).unwrap_err();

    assert_eq!(err, MotionError::LimitReached { position: 5_000 });
    assert_eq!(rig.piston.state(), MotionState::Idle);
    assert_eq!(rig.piston.position(), 5_000);
    assert_eq!(rig.store.saved(), Some(5_000));
    assert_eq!(rig.plant.command(), MotorCommand::Stop);
}

#[test]
fn extend_refused_while_switch_tripped() {
    let mut rig = rig_at(1_000);
    rig.plant.force_limit(Some(LimitState::Triggered));
    let history = rig.plant.history();

    let err = rig.piston.move_cmd("rel", 100).unwrap_err();

    assert_eq!(err, MotionError::LimitReached { position: 1_000 });
    assert_eq!(rig.plant.history(), history, "no motor command issued");
}

#[test]
fn latch_blocks_extend_until_retract() {
    let mut rig = rig_at(4_900);
    assert!(matches!(
        rig.piston.move_cmd("rel", 500),
        Err(MotionError::LimitReached { .. })
    ));

    // Still latched even if the switch chatters open.
    rig.plant.force_limit(Some(LimitState::Clear));
    let before = rig.plant.history().len();
    assert!(matches!(
        rig.piston.move_cmd("rel", 10),
        Err(MotionError::LimitReached { .. })
    ));
    assert_eq!(rig.plant.history().len(), before);
    rig.plant.force_limit(None);

    rig.piston.move_cmd("rel", -200).expect("retract ignores the limit");
    let report = rig.piston.move_cmd("rel", 100).expect("extend allowed again");
    assert!(report.position < 5_000);
}

#[test]
fn retract_ignores_tripped_switch() {
    let mut rig = rig_at(3_000);
    rig.plant.force_limit(Some(LimitState::Triggered));
    let report = rig.piston.move_cmd("rel", -300).unwrap();
    assert_eq!(report.position, 2_700);
}

#[test]
fn disabled_switch_reads_clear_and_blocks_homing() {
    let mut rig = rig_at(4_000);
    rig.piston.set_limit_enabled(false);
    assert!(!rig.piston.limit_enabled());

    let report = rig.piston.move_cmd("abs", 5_020).expect("no switch, no stop");
    assert!(report.position >= 5_020);

    assert_eq!(rig.piston.home(), Err(MotionError::HomingUnavailable));
    rig.piston.set_limit_enabled(true);
    assert!(rig.piston.limit_enabled());
}

#[test]
fn home_adopts_home_position_at_switch() {
    let mut rig = rig_at(1_000);
    // Counted position disagrees with the plant, as after a lost-power move.
    rig.piston.zero().unwrap();

    let homed = rig.piston.home().unwrap();

    assert_eq!(homed.start, 0);
    assert_eq!(homed.position, 5_000);
    assert_eq!(homed.persistence, Persistence::Saved);
    assert_eq!(rig.piston.position(), 5_000);
    assert_eq!(rig.store.saved(), Some(5_000));
    assert_eq!(rig.piston.state(), MotionState::Idle);
    assert_eq!(rig.plant.true_position(), 5_000);
}

#[test]
fn home_when_already_at_switch_does_not_move() {
    let mut rig = rig_at(5_000);
    let history = rig.plant.history();
    assert_eq!(rig.piston.home().unwrap().position, 5_000);
    assert_eq!(rig.plant.history(), history);
}
