mod common;

use common::Rig;
use pinrig_machine::DriverAction;

const TROUGH_AND_PLUNGER: &str = r"
switches:
  s_trough1: {number: 1}
  s_trough2: {number: 2}
  s_trough3: {number: 3}
  s_plunger: {number: 4}
coils:
  c_trough: {number: 1}
  c_plunger: {number: 2}
ball_devices:
  bd_trough:
    ball_switches: [s_trough1, s_trough2, s_trough3]
    eject_coil: c_trough
    eject_targets: [bd_plunger]
    tags: [trough]
  bd_plunger:
    ball_switches: [s_plunger]
    eject_coil: c_plunger
    eject_targets: [playfield]
    tags: [ball_add_live]
";

const HOLE: &str = r"
switches:
  s_hole: {number: 1}
  s_playfield: {number: 2, tags: [playfield_active]}
coils:
  c_hole: {number: 1}
ball_devices:
  bd_hole:
    ball_switches: [s_hole]
    eject_coil: c_hole
    eject_targets: [playfield]
    eject_timeouts: [3s]
    max_eject_attempts: 2
";

const TROUGH_FULL: [&str; 3] = ["s_trough1", "s_trough2", "s_trough3"];

#[test]
fn initial_count_is_a_silent_baseline() {
    let mut rig = Rig::new(TROUGH_AND_PLUNGER, &TROUGH_FULL);

    assert_eq!(rig.balls("bd_trough"), 3);
    assert_eq!(rig.balls("bd_plunger"), 0);
    assert_eq!(rig.machine.num_balls_known(), 99);
    assert_eq!(rig.posted("balldevice_bd_trough_ball_enter"), 0);
    assert!(rig.machine.ball_device("bd_trough").unwrap().is_valid());
}

#[test]
fn add_ball_feeds_the_playfield_through_the_plunger() {
    let mut rig = Rig::new(TROUGH_AND_PLUNGER, &TROUGH_FULL);

    assert!(rig.machine.add_ball("playfield", 1, None, false).unwrap());
    assert_eq!(rig.posted("balldevice_bd_plunger_ball_request"), 1);
    assert_eq!(rig.pulses("c_trough"), 1);
    let status = rig.machine.ball_device_status("bd_trough").unwrap();
    assert_eq!(status.eject_in_progress_target.as_deref(), Some("bd_plunger"));

    rig.release("s_trough1");
    rig.advance_time_and_run(100);
    rig.hit("s_plunger");
    rig.advance_time_and_run(600);

    assert_eq!(rig.posted("balldevice_bd_trough_ball_eject_success"), 1);
    assert_eq!(rig.balls("bd_trough"), 2);
    // The requested ball is claimed, so the plunger ejects it to the playfield.
    assert_eq!(rig.balls("bd_plunger"), 1);
    assert_eq!(rig.pulses("c_plunger"), 1);
    assert_eq!(rig.machine.ball_device("bd_plunger").unwrap().num_balls_requested(), 0);

    rig.release("s_plunger");
    rig.advance_time_and_run(600);

    assert_eq!(rig.posted("balldevice_bd_plunger_ball_eject_success"), 1);
    let args = rig.args("balldevice_bd_plunger_ball_eject_success").unwrap();
    assert_eq!(args.get_str("target"), Some("playfield"));
    assert_eq!(rig.balls("bd_plunger"), 0);
    let playfield = rig.machine.playfield("playfield").unwrap();
    assert_eq!(playfield.balls(), 1);
    assert_eq!(playfield.incoming(), 0);
}

#[test]
fn unclaimed_ball_in_a_device_gets_ejected() {
    let mut rig = Rig::new(TROUGH_AND_PLUNGER, &TROUGH_FULL);

    rig.hit("s_plunger");
    rig.advance_time_and_run(600);

    assert_eq!(rig.posted("balldevice_captured_from_playfield"), 1);
    assert_eq!(rig.posted("balldevice_bd_plunger_ball_enter"), 1);
    assert_eq!(rig.pulses("c_plunger"), 1);
    assert_eq!(rig.pulses("c_trough"), 0);
}

#[test]
fn playfield_switch_confirms_an_eject() {
    let mut rig = Rig::new(HOLE, &["s_hole"]);
    assert_eq!(rig.balls("bd_hole"), 1);

    assert!(rig.machine.eject("bd_hole", 1, None).unwrap());
    assert_eq!(rig.pulses("c_hole"), 1);
    let args = rig.args("balldevice_bd_hole_ball_eject_attempt").unwrap();
    assert_eq!(args.get_u64("timeout"), Some(3000));
    assert_eq!(args.get_u32("num_attempts"), Some(1));

    rig.release("s_hole");
    rig.advance_time_and_run(100);
    rig.hit("s_playfield");

    assert_eq!(rig.posted("balldevice_bd_hole_ball_eject_success"), 1);
    assert_eq!(rig.machine.ball_device_status("bd_hole").unwrap().eject_in_progress_target, None);
    assert_eq!(rig.machine.playfield("playfield").unwrap().balls(), 1);

    rig.advance_time_and_run(5000);
    assert_eq!(rig.posted("balldevice_bd_hole_ball_eject_failed"), 0);
    assert_eq!(rig.balls("bd_hole"), 0);
}

#[test]
fn recount_confirms_an_eject_to_the_playfield() {
    let mut rig = Rig::new(HOLE, &["s_hole"]);

    rig.machine.eject("bd_hole", 1, None).unwrap();
    rig.release("s_hole");
    rig.advance_time_and_run(400);
    assert_eq!(rig.posted("balldevice_bd_hole_ball_eject_success"), 0);

    rig.advance_time_and_run(200);
    assert_eq!(rig.posted("balldevice_bd_hole_ball_eject_success"), 1);
    assert_eq!(rig.posted("balldevice_bd_hole_ok_to_receive"), 1);
    assert_eq!(rig.machine.ball_device("bd_hole").unwrap().num_eject_attempts(), 0);
}

#[test]
fn timeouts_retry_until_permanent_failure() {
    let mut rig = Rig::new(HOLE, &["s_hole"]);

    rig.machine.eject("bd_hole", 1, None).unwrap();
    rig.advance_time_and_run(3500);

    assert_eq!(rig.posted("balldevice_bd_hole_ball_eject_failed"), 1);
    assert_eq!(rig.args("balldevice_bd_hole_ball_eject_failed").unwrap().get_u32("num_attempts"), Some(1));
    assert_eq!(rig.pulses("c_hole"), 2);
    assert_eq!(rig.posted("balldevice_bd_hole_ball_eject_permanent_failure"), 0);

    rig.advance_time_and_run(3500);

    assert_eq!(rig.posted("balldevice_bd_hole_ball_eject_failed"), 2);
    assert_eq!(rig.posted("balldevice_bd_hole_ball_eject_permanent_failure"), 1);
    assert_eq!(rig.pulses("c_hole"), 2);
    let device = rig.machine.ball_device("bd_hole").unwrap();
    assert_eq!(device.eject_in_progress(), None);
    assert_eq!(device.eject_queue_len(), 1);
    assert_eq!(device.balls(), 1);
}

#[test]
fn ball_falling_back_past_the_jam_switch_fails_the_eject() {
    let yaml = r"
switches:
  s_trough1: {number: 1}
  s_trough2: {number: 2}
  s_trough_jam: {number: 3}
  s_plunger: {number: 4}
coils:
  c_trough: {number: 1}
  c_plunger: {number: 2}
ball_devices:
  bd_trough:
    ball_switches: [s_trough1, s_trough2]
    jam_switch: s_trough_jam
    eject_coil: c_trough
    eject_targets: [bd_plunger]
    tags: [trough]
  bd_plunger:
    ball_switches: [s_plunger]
    eject_coil: c_plunger
    eject_targets: [playfield]
";
    let mut rig = Rig::new(yaml, &["s_trough1", "s_trough2"]);

    rig.machine.eject("bd_trough", 1, None).unwrap();
    assert_eq!(rig.pulses("c_trough"), 1);

    rig.release("s_trough1");
    assert_eq!(rig.balls("bd_trough"), 1);
    for _ in 0..2 {
        rig.hit("s_trough_jam");
        rig.release("s_trough_jam");
    }
    rig.advance_time_and_run(100);
    rig.hit("s_trough1");
    rig.advance_time_and_run(600);

    assert_eq!(rig.posted("balldevice_bd_trough_ball_eject_failed"), 1);
    assert_eq!(rig.posted("balldevice_bd_trough_ball_enter"), 0);
    assert_eq!(rig.balls("bd_trough"), 2);
    assert_eq!(rig.pulses("c_trough"), 2);
}

#[test]
fn entrance_switch_counts_until_full() {
    let yaml = r"
switches:
  s_lock_entry: {number: 1}
coils:
  c_lock: {number: 1}
ball_devices:
  bd_lock:
    entrance_switch: s_lock_entry
    ball_capacity: 3
    eject_coil: c_lock
    eject_targets: [playfield]
    tags: [trough]
";
    let mut rig = Rig::new(yaml, &[]);
    assert_eq!(rig.balls("bd_lock"), 0);

    for _ in 0..4 {
        rig.hit("s_lock_entry");
        rig.release("s_lock_entry");
    }

    assert_eq!(rig.balls("bd_lock"), 3);
    assert_eq!(rig.posted("balldevice_bd_lock_ball_enter"), 3);
    assert_eq!(rig.posted("balldevice_captured_from_playfield"), 3);
    assert_eq!(rig.machine.ball_device("bd_lock").unwrap().additional_capacity(), 0);
    assert_eq!(rig.pulses("c_lock"), 0);
}

#[test]
fn hold_coil_releases_for_an_eject_and_holds_the_rest() {
    let yaml = r"
switches:
  s_lock1: {number: 1}
  s_lock2: {number: 2}
coils:
  c_lock_hold: {number: 1, allow_enable: true}
ball_devices:
  bd_lock:
    ball_switches: [s_lock1, s_lock2]
    hold_switches: [s_lock1]
    hold_coil: c_lock_hold
    hold_coil_release_time: 1s
    eject_targets: [playfield]
    tags: [trough]
";
    let mut rig = Rig::new(yaml, &["s_lock2"]);
    assert_eq!(rig.balls("bd_lock"), 1);

    rig.hit("s_lock1");
    rig.advance_time_and_run(600);
    assert_eq!(rig.balls("bd_lock"), 2);

    rig.machine.eject("bd_lock", 1, None).unwrap();
    rig.release("s_lock1");
    assert_eq!(rig.balls("bd_lock"), 1);
    rig.advance_time_and_run(1100);

    assert_eq!(rig.posted("balldevice_bd_lock_ball_eject_success"), 1);
    assert_eq!(
        rig.platform.actions_for("c_lock_hold"),
        [
            DriverAction::Enable { coil: "c_lock_hold".into() },
            DriverAction::Disable { coil: "c_lock_hold".into() },
            DriverAction::Enable { coil: "c_lock_hold".into() },
        ]
    );
}

const PLUNGER: &str = r"
switches:
  s_plunger: {number: 1}
ball_devices:
  bd_plunger:
    ball_switches: [s_plunger]
    mechanical_eject: true
    eject_targets: [playfield]
";

#[test]
fn mechanical_plunge_counts_as_an_eject() {
    let mut rig = Rig::new(PLUNGER, &["s_plunger"]);

    assert!(rig.machine.setup_player_controlled_eject("bd_plunger", 1, None, None).unwrap());
    assert_eq!(rig.posted("balldevice_bd_plunger_ball_eject_attempt"), 0);

    rig.release("s_plunger");
    rig.advance_time_and_run(300);
    assert_eq!(rig.posted("balldevice_bd_plunger_mechanical_eject_attempt"), 1);
    assert_eq!(rig.posted("balldevice_bd_plunger_ball_eject_attempt"), 1);

    rig.advance_time_and_run(300);
    assert_eq!(rig.posted("balldevice_bd_plunger_ball_eject_success"), 1);
    assert_eq!(rig.balls("bd_plunger"), 0);
    assert_eq!(rig.machine.playfield("playfield").unwrap().balls(), 1);
}

#[test]
fn ball_rolling_back_fails_the_mechanical_eject() {
    let mut rig = Rig::new(PLUNGER, &["s_plunger"]);
    rig.machine.setup_player_controlled_eject("bd_plunger", 1, None, None).unwrap();

    rig.release("s_plunger");
    rig.advance_time_and_run(300);
    rig.hit("s_plunger");
    rig.advance_time_and_run(600);

    assert_eq!(rig.posted("balldevice_bd_plunger_mechanical_eject_failed"), 1);
    assert_eq!(rig.posted("balldevice_bd_plunger_player_controlled_eject_failed"), 1);
    assert_eq!(rig.posted("balldevice_bd_plunger_ball_eject_success"), 0);
    assert_eq!(rig.balls("bd_plunger"), 1);
    let playfield = rig.machine.playfield("playfield").unwrap();
    assert_eq!(playfield.incoming(), 0);
    assert_eq!(playfield.balls(), 0);
}

#[test]
fn eject_events_trigger_a_player_controlled_eject() {
    let yaml = r"
switches:
  s_plunger: {number: 1}
coils:
  c_plunger: {number: 1}
ball_devices:
  bd_plunger:
    ball_switches: [s_plunger]
    eject_coil: c_plunger
    eject_events: [launch_button]
    eject_targets: [playfield]
";
    let mut rig = Rig::new(yaml, &["s_plunger"]);

    rig.machine.setup_player_controlled_eject("bd_plunger", 1, None, None).unwrap();
    assert_eq!(rig.pulses("c_plunger"), 0);

    rig.post("launch_button");
    assert_eq!(rig.pulses("c_plunger"), 1);
}

#[test]
fn stop_clears_the_queue_and_recounts() {
    let mut rig = Rig::new(HOLE, &["s_hole"]);

    rig.machine.eject("bd_hole", 1, None).unwrap();
    rig.machine.stop_device("bd_hole").unwrap();

    let status = rig.machine.ball_device_status("bd_hole").unwrap();
    assert_eq!(status.balls, 1);
    assert_eq!(status.eject_in_progress_target, None);
    assert!(status.eject_queue.is_empty());

    rig.advance_time_and_run(5000);
    assert_eq!(rig.posted("balldevice_bd_hole_ball_eject_failed"), 0);
}

#[test]
fn unknown_devices_and_targets_are_errors() {
    let mut rig = Rig::new(HOLE, &["s_hole"]);

    let err = rig.machine.eject("bd_nope", 1, None).unwrap_err();
    assert_eq!(err.kind(), "unknown_device");
    let err = rig.machine.eject("bd_hole", 1, Some("bd_nowhere")).unwrap_err();
    assert!(err.to_string().contains("bd_nowhere"));
    assert!(!rig.machine.eject("bd_hole", 0, None).unwrap());
}
