// End-to-end node behaviour over the built-in dictionary: frames in, outputs out
use dbw_core::{
    BrakeCmd, CanFrame, DbwConfig, DbwNode, Diagnostic, DisableCause, FaultKind, Gear, GearCmd,
    NodeOutput, Report, SignalCodec, SignalSet, SteeringCmd, Subsystem, WatchdogSource,
};
use std::time::{Duration, Instant};

fn node() -> DbwNode {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut node = DbwNode::new(DbwConfig::default()).unwrap();
    assert_eq!(node.take_outputs(), vec![NodeOutput::Enabled(false)]);
    node
}

fn frame(node: &DbwNode, name: &str, signals: &[(&str, f64)]) -> CanFrame {
    let set: SignalSet = signals.iter().map(|(n, v)| (*n, *v)).collect();
    node.codec().encode(name, &set).unwrap()
}

fn enabled_changes(outputs: &[NodeOutput]) -> Vec<bool> {
    outputs
        .iter()
        .filter_map(|o| match o {
            NodeOutput::Enabled(e) => Some(*e),
            _ => None,
        })
        .collect()
}

fn diagnostics(outputs: &[NodeOutput]) -> Vec<Diagnostic> {
    outputs
        .iter()
        .filter_map(|o| match o {
            NodeOutput::Diagnostic(d) => Some(d.clone()),
            _ => None,
        })
        .collect()
}

fn transmitted(outputs: &[NodeOutput]) -> Vec<CanFrame> {
    outputs
        .iter()
        .filter_map(|o| match o {
            NodeOutput::Transmit(f) => Some(f.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_enable_override_then_release_stays_disabled() {
    let mut node = node();

    node.enable();
    assert!(node.enabled());
    assert_eq!(enabled_changes(&node.take_outputs()), vec![true]);

    let held = frame(
        &node,
        "DBW_SteeringReport",
        &[("DBW_SteeringDriverActivity", 1.0)],
    );
    node.handle_frame(&held);
    assert!(!node.enabled());
    assert!(node.engine().state().override_active.steering);
    let outputs = node.take_outputs();
    assert_eq!(enabled_changes(&outputs), vec![false]);
    assert!(diagnostics(&outputs).contains(&Diagnostic::Disabled(DisableCause::Override(
        Subsystem::Steering
    ))));

    let released = frame(&node, "DBW_SteeringReport", &[]);
    node.handle_frame(&released);
    assert!(!node.enabled());
    assert!(enabled_changes(&node.take_outputs()).is_empty());

    node.enable();
    assert!(node.enabled());
}

#[test]
fn test_enable_refused_while_faulted() {
    let mut node = node();
    let faulted = frame(
        &node,
        "DBW_BrakeReport",
        &[("DBW_BrakeFault_Ch1", 1.0), ("DBW_BrakeFault_Ch2", 1.0)],
    );
    node.handle_frame(&faulted);
    node.take_outputs();

    node.enable();
    assert!(!node.enabled());
    let outputs = node.take_outputs();
    assert!(enabled_changes(&outputs).is_empty());
    assert_eq!(
        diagnostics(&outputs),
        vec![Diagnostic::EnableRefused(FaultKind::Brakes)]
    );
}

#[test]
fn test_single_channel_fault_does_not_disable() {
    let mut node = node();
    node.enable();
    node.take_outputs();

    let one_channel = frame(&node, "DBW_BrakeReport", &[("DBW_BrakeFault_Ch1", 1.0)]);
    node.handle_frame(&one_channel);
    assert!(node.enabled());

    let outputs = node.take_outputs();
    assert!(diagnostics(&outputs).contains(&Diagnostic::SubsystemFault {
        subsystem: Subsystem::Brake,
        channel_1: true,
        channel_2: false,
    }));
}

#[test]
fn test_steering_angle_clamped_on_the_wire() {
    let mut node = node();
    node.enable();
    node.take_outputs();

    node.steering_command(&SteeringCmd {
        steering_wheel_angle_cmd: 600f64.to_radians(),
        rolling_counter: 4,
        ..Default::default()
    })
    .unwrap();

    let frames = transmitted(&node.take_outputs());
    assert_eq!(frames.len(), 1);
    let signals = node.codec().decode(&frames[0]).unwrap();
    assert!((signals.float("AKit_SteeringWhlAngleCmd") - 500.0).abs() < 1e-9);
    assert!(signals.flag("AKit_SteerCtrlEnblCmd"));
    assert_eq!(signals.uint8("AKit_SteerCmdWatchdogCntr"), 4);
}

#[test]
fn test_disabled_commands_are_neutral() {
    let mut node = node();
    let held = frame(&node, "DBW_GearReport", &[("DBW_PrndDriverActivity", 1.0)]);
    node.handle_frame(&held);
    node.take_outputs();

    node.brake_command(&BrakeCmd {
        pedal_cmd: 80.0,
        rolling_counter: 1,
        ..Default::default()
    })
    .unwrap();
    node.gear_command(&GearCmd {
        gear: Gear::Reverse,
        rolling_counter: 1,
        ..Default::default()
    })
    .unwrap();

    let frames = transmitted(&node.take_outputs());
    assert_eq!(frames.len(), 2);

    let brake = node.codec().decode(&frames[0]).unwrap();
    assert_eq!(brake.float("AKit_BrakePedalCmd"), 0.0);
    assert!(!brake.flag("AKit_BrakeCtrlEnblCmd"));
    assert!(brake.flag("AKit_BrakePedalClearDriverOvrd"));

    let gear = node.codec().decode(&frames[1]).unwrap();
    assert_eq!(gear.uint8("AKit_PrndStateCmd"), 0);
    assert!(gear.flag("AKit_PrndClearDriverOvrd"));
}

#[test]
fn test_watchdog_braking_then_driver_control() {
    let mut node = node();
    let braking = frame(
        &node,
        "DBW_BrakeReport",
        &[
            ("DBW_BrakeFault", 1.0),
            ("DBW_BrakeWatchdogStatus", 6.0),
            ("DBW_BrakeInterventionActv", 1.0),
        ],
    );
    let released = frame(
        &node,
        "DBW_BrakeReport",
        &[("DBW_BrakeFault", 1.0), ("DBW_BrakeWatchdogStatus", 6.0)],
    );

    node.handle_frame(&braking);
    node.handle_frame(&released);

    let diags = diagnostics(&node.take_outputs());
    let braking_at = diags
        .iter()
        .position(|d| *d == Diagnostic::WatchdogBraking)
        .unwrap();
    let control_at = diags
        .iter()
        .position(|d| *d == Diagnostic::WatchdogDriverControl)
        .unwrap();
    assert!(braking_at < control_at);
    assert!(diags.contains(&Diagnostic::WatchdogEvent(WatchdogSource::BrakeCommand)));
    assert!(!node.engine().state().watchdog_using_brakes);
    assert!(node.engine().state().watchdog_warned);
}

#[test]
fn test_short_frame_dropped_silently() {
    let mut node = node();
    let mut short = frame(&node, "DBW_BrakeReport", &[("DBW_BrakeDriverActivity", 1.0)]);
    short.data.truncate(4);

    node.handle_frame(&short);
    assert!(node.take_outputs().is_empty());
    assert!(!node.engine().override_active());
}

#[test]
fn test_vin_published_once_assembled() {
    let mut node = node();
    let vin = b"2C4RC1BG5LR123456";
    let fragments: [(u8, &[u8]); 3] = [(0, &vin[0..7]), (1, &vin[7..14]), (2, &vin[14..17])];

    for (mux, digits) in fragments {
        let first_digit = match mux {
            0 => 1,
            1 => 8,
            _ => 15,
        };
        let mut signals = vec![("DBW_VinMultiplexor".to_string(), f64::from(mux))];
        for (i, &d) in digits.iter().enumerate() {
            signals.push((format!("DBW_VinDigit_{:02}", first_digit + i), f64::from(d)));
        }
        let set: SignalSet = signals.into_iter().collect();
        let f = node.codec().encode("DBW_Vin", &set).unwrap();
        node.handle_frame(&f);
    }

    assert_eq!(
        node.take_outputs(),
        vec![NodeOutput::Vin("2C4RC1BG5LR123456".to_string())]
    );
    assert_eq!(node.vin(), Some("2C4RC1BG5LR123456"));
}

#[test]
fn test_wheel_speed_publishes_joint_states() {
    let mut node = node();
    let speeds = frame(
        &node,
        "DBW_WheelSpeedReport",
        &[("DBW_WhlSpdType", 1.0), ("DBW_WhlSpd_FL", 10.0)],
    );
    node.handle_frame(&speeds);

    let outputs = node.take_outputs();
    assert!(matches!(outputs[0], NodeOutput::Report(Report::WheelSpeed(_))));
    let NodeOutput::JointStates(joints) = &outputs[1] else {
        panic!("expected joint states after the wheel speed report");
    };
    assert!((joints.joint("wheel_fl").unwrap().velocity - 10.0).abs() < 1e-9);
}

#[test]
fn test_sweep_clears_held_overrides() {
    let mut node = node();
    let held = frame(
        &node,
        "DBW_AccelPdlReport",
        &[("DBW_AccelPdlDriverActivity", 1.0)],
    );
    node.handle_frame(&held);
    node.take_outputs();

    let t0 = Instant::now();
    let mut sweeps = 0;
    for step in 0..10u64 {
        if node.poll_sweep(t0 + Duration::from_millis(step * 10)).unwrap() {
            sweeps += 1;
        }
    }
    // 0..90 ms at a 50 ms period
    assert_eq!(sweeps, 2);

    let frames = transmitted(&node.take_outputs());
    assert_eq!(frames.len(), 2);
    for f in frames {
        let signals = node.codec().decode(&f).unwrap();
        assert!(signals.flag("AKit_AccelPdlClearDriverOvrd"));
        assert!(!signals.flag("AKit_AccelPdlEnblCmd"));
    }
}

#[test]
fn test_outputs_serialize() {
    let mut node = node();
    node.enable();
    let json = serde_json::to_value(node.take_outputs()).unwrap();
    assert_eq!(json[0]["output"], "enabled");
    assert_eq!(json[0]["value"], true);
    assert_eq!(json[1]["output"], "diagnostic");
    assert_eq!(json[1]["value"]["kind"], "enabled");
}
