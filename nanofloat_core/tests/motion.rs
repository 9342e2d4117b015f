mod common;

use common::{EDGES_PER_POLL, rig_at};
use nanofloat_core::{MotionError, MotionState, MoveRequest, Persistence};
use nanofloat_traits::MotorCommand;
use rstest::rstest;

#[rstest]
#[case::extend_relative(0, "rel", 500, 500)]
#[case::retract_relative(2_000, "relative", -750, 1_250)]
#[case::extend_absolute(100, "abs", 1_000, 1_000)]
#[case::retract_absolute(1_000, "ABSOLUTE", 300, 300)]
fn move_lands_within_one_poll_of_target(
    #[case] start: i64,
    #[case] method: &str,
    #[case] amount: i64,
    #[case] target: i64,
) {
    let mut rig = rig_at(start);
    let report = rig.piston.move_cmd(method, amount).expect("move");

    assert_eq!(report.start, start);
    assert_eq!(report.target, target);
    assert!(
        (report.position - target).abs() <= EDGES_PER_POLL,
        "landed at {} for target {target}",
        report.position
    );
    assert!(report.overshoot() <= EDGES_PER_POLL);
    assert_eq!(report.persistence, Persistence::Saved);
    assert_eq!(rig.piston.state(), MotionState::Idle);
    assert_eq!(rig.piston.position(), report.position);
    assert_eq!(rig.store.saved(), Some(report.position));
    assert_eq!(rig.plant.true_position(), report.position);
    assert_eq!(rig.plant.command(), MotorCommand::Stop);
}

#[test]
fn extend_drives_extend_then_stops() {
    let mut rig = rig_at(0);
    rig.piston.move_to(MoveRequest::relative(200)).unwrap();
    assert_eq!(
        rig.plant.history(),
        vec![MotorCommand::Stop, MotorCommand::Extend, MotorCommand::Stop]
    );
}

#[test]
fn retract_drives_retract() {
    let mut rig = rig_at(1_000);
    rig.piston.move_to(MoveRequest::relative(-200)).unwrap();
    assert_eq!(rig.plant.history()[1], MotorCommand::Retract);
}

#[test]
fn zero_distance_move_touches_nothing() {
    let mut rig = rig_at(1_234);
    let saves_before = rig.store.save_count();

    let report = rig.piston.move_cmd("abs", 1_234).unwrap();

    assert_eq!(report.persistence, Persistence::Unchanged);
    assert_eq!(report.position, 1_234);
    assert_eq!(rig.store.save_count(), saves_before);
    assert_eq!(rig.plant.history(), vec![MotorCommand::Stop]);
}

#[test]
fn repeated_absolute_move_after_overshoot_stays_put() {
    let mut rig = rig_at(0);
    let first = rig.piston.move_cmd("abs", 1_005).unwrap();
    assert_eq!(first.position, 1_010);
    let history = rig.plant.history();
    let saves = rig.store.save_count();

    let again = rig.piston.move_cmd("abs", 1_005).unwrap();

    assert_eq!(again.start, first.position);
    assert_eq!(again.position, first.position);
    assert_eq!(again.persistence, Persistence::Unchanged);
    assert_eq!(rig.plant.history(), history);
    assert_eq!(rig.store.save_count(), saves);
    assert_eq!(rig.plant.true_position(), 1_010);
}

#[rstest]
#[case::relative_back_to_target("rel", -5)]
#[case::new_absolute_target("abs", 1_200)]
fn settled_target_does_not_block_other_moves(#[case] method: &str, #[case] amount: i64) {
    let mut rig = rig_at(0);
    rig.piston.move_cmd("abs", 1_005).unwrap();
    let commands = rig.plant.history().len();

    let report = rig.piston.move_cmd(method, amount).unwrap();

    assert_eq!(report.persistence, Persistence::Saved);
    assert_eq!(rig.plant.history().len(), commands + 2);
}

#[test]
fn absolute_repeat_moves_again_after_zero() {
    let mut rig = rig_at(0);
    rig.piston.move_cmd("abs", 1_005).unwrap();
    rig.piston.zero().unwrap();

    let report = rig.piston.move_cmd("abs", 1_005).unwrap();

    assert_eq!(report.start, 0);
    assert!(report.position >= 1_005);
}

#[test]
fn invalid_method_is_rejected_before_motion() {
    let mut rig = rig_at(0);
    let err = rig.piston.move_cmd("sideways", 10).unwrap_err();
    assert_eq!(err, MotionError::InvalidMethod("sideways".into()));
    assert_eq!(rig.plant.history(), vec![MotorCommand::Stop]);
}

#[test]
fn negative_absolute_target_is_rejected_before_motion() {
    let mut rig = rig_at(500);
    let err = rig.piston.move_cmd("abs", -1).unwrap_err();
    assert_eq!(err, MotionError::InvalidTarget(-1));
    assert_eq!(rig.plant.history(), vec![MotorCommand::Stop]);
    assert_eq!(rig.piston.position(), 500);
}

#[test]
fn relative_move_below_zero_is_allowed() {
    let mut rig = rig_at(50);
    let report = rig.piston.move_cmd("rel", -100).unwrap();
    assert!(report.position <= -50);
}

#[test]
fn consecutive_moves_accumulate() {
    let mut rig = rig_at(0);
    rig.piston.move_cmd("rel", 400).unwrap();
    rig.piston.move_cmd("rel", 400).unwrap();
    let last = rig.piston.move_cmd("rel", -300).unwrap();
    assert!((last.position - 500).abs() <= 3 * EDGES_PER_POLL);
    assert_eq!(rig.plant.true_position(), last.position);
}

#[test]
fn status_view_tracks_controller() {
    let mut rig = rig_at(0);
    let view = rig.piston.status();
    rig.piston.move_cmd("abs", 800).unwrap();
    assert_eq!(view.position(), rig.piston.position());
    assert_eq!(view.target(), 800);
    assert_eq!(view.state(), MotionState::Idle);
}

#[test]
fn stray_idle_edges_are_not_counted() {
    let mut rig = rig_at(0);
    let counter = rig.piston.edge_counter();
    for _ in 0..7 {
        counter.on_edge();
    }
    let report = rig.piston.move_cmd("rel", 100).unwrap();
    assert_eq!(report.position, rig.plant.true_position());
    assert_eq!(counter.total(), 7 + report.position as u64);
}

#[test]
fn zero_redefines_current_position() {
    let mut rig = rig_at(0);
    rig.piston.move_cmd("abs", 1_000).unwrap();
    let p = rig.piston.zero().unwrap();
    assert_eq!(p, Persistence::Saved);
    assert_eq!(rig.piston.position(), 0);
    assert_eq!(rig.store.saved(), Some(0));

    let report = rig.piston.move_cmd("rel", -200).unwrap();
    assert!(report.position <= -200);
}
