mod common;

use common::Rig;
use pinrig_machine::DriverAction;

fn ball_save_machine(save: &str) -> String {
    format!(
        r"
switches:
  s_trough1: {{number: 1}}
  s_trough2: {{number: 2}}
  s_trough3: {{number: 3}}
coils:
  c_trough: {{number: 1}}
ball_devices:
  bd_trough:
    ball_switches: [s_trough1, s_trough2, s_trough3]
    eject_coil: c_trough
    eject_targets: [playfield]
    tags: [trough, ball_add_live]
ball_saves:
  bs_main:
    enable_events: [ball_started]
{save}
"
    )
}

/// Two balls in the trough, one in play, save armed.
fn armed(save: &str) -> Rig {
    let mut rig = Rig::new(&ball_save_machine(save), &["s_trough1", "s_trough2"]);
    rig.machine.set_balls_in_play(1);
    rig.post("ball_started");
    rig
}

fn drain(rig: &mut Rig, switch: &str) {
    rig.hit(switch);
    rig.advance_time_and_run(600);
}

#[test]
fn drained_ball_is_saved_and_relaunched() {
    let mut rig = armed("    active_time: 10s\n");
    assert!(rig.machine.ball_save("bs_main").unwrap().enabled());
    assert_eq!(rig.posted("ball_save_bs_main_enabled"), 1);

    drain(&mut rig, "s_trough3");

    assert_eq!(rig.posted("ball_drain"), 1);
    assert_eq!(rig.posted("ball_save_bs_main_saving_ball"), 1);
    assert_eq!(rig.args("ball_save_bs_main_saving_ball").unwrap().get_u32("balls"), Some(1));
    assert_eq!(rig.pulses("c_trough"), 1);
    assert_eq!(rig.posted("ball_save_bs_main_disabled"), 1);
    let save = rig.machine.ball_save("bs_main").unwrap();
    assert!(!save.enabled());
    assert_eq!(save.saves_remaining(), 0);
}

#[test]
fn unlimited_saves_stay_enabled() {
    let mut rig = armed("    active_time: 10s\n    balls_to_save: -1\n");

    drain(&mut rig, "s_trough3");
    rig.release("s_trough1");
    rig.advance_time_and_run(600);
    assert_eq!(rig.posted("balldevice_bd_trough_ball_eject_success"), 1);

    drain(&mut rig, "s_trough1");

    assert_eq!(rig.posted("ball_save_bs_main_saving_ball"), 2);
    assert_eq!(rig.pulses("c_trough"), 2);
    assert!(rig.machine.ball_save("bs_main").unwrap().enabled());
    assert_eq!(rig.posted("ball_save_bs_main_disabled"), 0);
}

#[test]
fn timer_runs_hurry_up_then_grace_then_disable() {
    let mut rig = armed("    active_time: 10s\n    hurry_up_time: 2s\n    grace_period: 2s\n");

    rig.advance_time_and_run(7900);
    assert_eq!(rig.posted("ball_save_bs_main_hurry_up"), 0);
    rig.advance_time_and_run(200);
    assert_eq!(rig.posted("ball_save_bs_main_hurry_up"), 1);
    assert_eq!(rig.posted("ball_save_bs_main_grace_period"), 0);

    rig.advance_time_and_run(2000);
    assert_eq!(rig.posted("ball_save_bs_main_grace_period"), 1);
    assert!(rig.machine.ball_save("bs_main").unwrap().enabled());

    rig.advance_time_and_run(2000);
    assert_eq!(rig.posted("ball_save_bs_main_disabled"), 1);
    assert!(!rig.machine.ball_save("bs_main").unwrap().enabled());
}

#[test]
fn default_timer_still_posts_hurry_up_and_grace_period() {
    let mut rig = armed("    active_time: 10s\n");

    rig.advance_time_and_run(9900);
    assert_eq!(rig.posted("ball_save_bs_main_hurry_up"), 0);
    assert_eq!(rig.posted("ball_save_bs_main_grace_period"), 0);

    rig.advance_time_and_run(200);
    assert_eq!(rig.posted("ball_save_bs_main_hurry_up"), 1);
    assert_eq!(rig.posted("ball_save_bs_main_grace_period"), 1);
    assert_eq!(rig.posted("ball_save_bs_main_disabled"), 1);
    assert!(!rig.machine.ball_save("bs_main").unwrap().enabled());

    let events = rig.events();
    let position = |name: &str| events.iter().position(|e| e == name).unwrap();
    assert!(position("ball_save_bs_main_hurry_up") < position("ball_save_bs_main_grace_period"));
    assert!(position("ball_save_bs_main_grace_period") < position("ball_save_bs_main_disabled"));
}

#[test]
fn timer_waits_for_its_start_event() {
    let mut rig = armed("    active_time: 1s\n    timer_start_events: [ball_save_timer_start]\n");

    rig.advance_time_and_run(2000);
    assert!(rig.machine.ball_save("bs_main").unwrap().enabled());

    rig.post("ball_save_timer_start");
    rig.advance_time_and_run(1100);
    assert!(!rig.machine.ball_save("bs_main").unwrap().enabled());
}

#[test]
fn no_save_without_balls_in_play() {
    let mut rig = armed("    active_time: 10s\n");
    rig.machine.set_balls_in_play(0);

    drain(&mut rig, "s_trough3");

    assert_eq!(rig.posted("ball_drain"), 1);
    assert_eq!(rig.posted("ball_save_bs_main_saving_ball"), 0);
    assert_eq!(rig.pulses("c_trough"), 0);
    assert!(rig.machine.ball_save("bs_main").unwrap().enabled());
}

#[test]
fn enable_and_disable_are_idempotent() {
    let mut rig = armed("    active_time: 10s\n    disable_events: [ball_ending]\n");
    rig.post("ball_started");
    assert_eq!(rig.posted("ball_save_bs_main_enabled"), 1);

    rig.post("ball_ending");
    rig.post("ball_ending");
    assert_eq!(rig.posted("ball_save_bs_main_disabled"), 1);

    rig.advance_time_and_run(11_000);
    assert_eq!(rig.posted("ball_save_bs_main_disabled"), 1);
}

const DRIVER_ENABLED: &str = r"
coils:
  c_bumpers: {number: 1, allow_enable: true}
driver_enabled:
  de_left:
    driver: c_bumpers
    enable_events: [ball_started]
    disable_events: [ball_ending]
  de_right:
    driver: c_bumpers
";

#[test]
fn driver_enabled_cascades_to_devices_on_the_same_driver() {
    let mut rig = Rig::new(DRIVER_ENABLED, &[]);

    rig.post("ball_started");
    assert!(rig.machine.driver_enabled("de_left").unwrap().enabled());
    assert!(rig.machine.driver_enabled("de_right").unwrap().enabled());
    assert_eq!(rig.platform.actions(), [DriverAction::Enable { coil: "c_bumpers".into() }]);

    rig.post("ball_ending");
    assert!(!rig.machine.driver_enabled("de_left").unwrap().enabled());
    assert!(!rig.machine.driver_enabled("de_right").unwrap().enabled());
    assert_eq!(rig.platform.actions().len(), 2);
}

#[test]
fn driver_enabled_ignores_pulses() {
    let rig = Rig::new(DRIVER_ENABLED, &[]);
    let device = rig.machine.driver_enabled("de_right").unwrap();

    device.pulse();
    device.timed_enable(500);
    assert!(rig.platform.actions().is_empty());
}

const FLIPPERS: &str = r"
switches:
  s_flipper_left: {number: 1}
  s_flipper_right: {number: 2}
coils:
  c_flipper_left_main: {number: 1}
  c_flipper_left_hold: {number: 2, allow_enable: true}
  c_flipper_right: {number: 3, allow_enable: true}
flippers:
  left_flipper:
    main_coil: c_flipper_left_main
    hold_coil: c_flipper_left_hold
    activation_switch: s_flipper_left
  right_flipper:
    main_coil: c_flipper_right
    activation_switch: s_flipper_right
";

#[test]
fn flipper_with_hold_coil_pulses_main_and_holds() {
    let mut rig = Rig::new(FLIPPERS, &[]);

    rig.hit("s_flipper_left");
    rig.release("s_flipper_left");
    assert!(rig.platform.actions().is_empty());

    rig.post("ball_started");
    assert!(rig.machine.flipper("left_flipper").unwrap().enabled());
    rig.hit("s_flipper_left");
    assert_eq!(
        rig.platform.actions(),
        [
            DriverAction::Pulse { coil: "c_flipper_left_main".into(), ms: 10 },
            DriverAction::Enable { coil: "c_flipper_left_hold".into() },
        ]
    );

    rig.platform.clear();
    rig.release("s_flipper_left");
    assert_eq!(
        rig.platform.actions(),
        [
            DriverAction::Disable { coil: "c_flipper_left_main".into() },
            DriverAction::Disable { coil: "c_flipper_left_hold".into() },
        ]
    );
}

#[test]
fn single_wound_flipper_enables_main_and_releases_on_tilt() {
    let mut rig = Rig::new(FLIPPERS, &[]);
    rig.post("ball_started");

    rig.hit("s_flipper_right");
    assert_eq!(rig.platform.actions_for("c_flipper_right"), [DriverAction::Enable { coil: "c_flipper_right".into() }]);

    rig.platform.clear();
    rig.post("tilt");
    assert!(!rig.machine.flipper("right_flipper").unwrap().enabled());
    assert!(rig.platform.actions_for("c_flipper_right").contains(&DriverAction::Disable { coil: "c_flipper_right".into() }));

    rig.platform.clear();
    rig.release("s_flipper_right");
    rig.hit("s_flipper_right");
    assert!(rig.platform.actions().is_empty());
}

#[test]
fn modes_start_and_stop_once() {
    let yaml = r"
modes:
  attract:
    start_events: [reset_complete]
    stop_events: [game_started]
    priority: 10
  base:
    start_events: [game_started]
    stop_events: [game_ended]
    priority: 100
  bonus:
    start_events: [game_started]
    priority: 500
";
    let mut rig = Rig::new(yaml, &[]);

    rig.post("reset_complete");
    rig.post("reset_complete");
    assert_eq!(rig.posted("mode_attract_started"), 1);
    assert_eq!(rig.machine.active_modes(), ["attract"]);

    rig.post("game_started");
    assert_eq!(rig.posted("mode_attract_stopped"), 1);
    assert_eq!(rig.machine.active_modes(), ["bonus", "base"]);

    rig.post("game_ended");
    assert_eq!(rig.posted("mode_base_stopped"), 1);
    assert!(rig.machine.mode("base").is_some_and(|m| !m.active()));
    assert_eq!(rig.machine.active_modes(), ["bonus"]);
}
