//! Serial sender behaviour against the simulated device

use motionkit_communication::{
    GcodeSender, SenderConfig, SerialGcodeSender, SimulatedPortFactory, WireEntry, WireLog,
    ALREADY_CENTERED, RANGE_EXCEEDED,
};
use motionkit_core::{Feedrate, Position};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn feed() -> Feedrate {
    Feedrate::new(200.0).unwrap()
}

fn sender_with_wire() -> (SerialGcodeSender, WireLog) {
    let factory = SimulatedPortFactory::new();
    let wire = factory.wire();
    let config = SenderConfig {
        ack_timeout: Duration::from_millis(500),
        read_timeout: Duration::from_millis(2),
        ..SenderConfig::default()
    };
    let sender = SerialGcodeSender::new(Arc::new(factory), config);
    sender.connect("COM9", 115200).unwrap();
    (sender, wire)
}

fn motion_lines(wire: &WireLog) -> Vec<String> {
    wire.lock()
        .iter()
        .filter_map(|entry| match entry {
            WireEntry::Written(line) if line.starts_with("G1 ") => Some(line.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_move_there_and_back() {
    let (sender, _wire) = sender_with_wire();

    let ack = sender
        .send_coordinates(Position::new(1.0, 2.0, 0.0), feed())
        .unwrap();
    assert!(ack.ok);
    let ack = sender
        .send_coordinates(Position::new(-1.0, -2.0, 0.0), feed())
        .unwrap();
    assert!(ack.ok);

    let position = sender.current_position().unwrap();
    assert!(position.approx_eq(&Position::zero(), 1e-9));
}

#[test]
fn test_home_issues_negated_sum_once() {
    let (sender, wire) = sender_with_wire();
    sender
        .send_coordinates(Position::new(1.0, 2.0, 0.5), feed())
        .unwrap();
    sender
        .send_coordinates(Position::new(0.5, -1.0, 0.25), feed())
        .unwrap();
    wire.lock().clear();

    let ack = sender.home(feed()).unwrap();
    assert!(ack.ok);
    assert_eq!(motion_lines(&wire), vec!["G1 X-1.500 Y-1.000 Z-0.750"]);
    assert_eq!(sender.current_position(), Some(Position::zero()));

    wire.lock().clear();
    let ack = sender.home(feed()).unwrap();
    assert!(ack.ok);
    assert_eq!(ack.message, ALREADY_CENTERED);
    assert!(wire.lock().is_empty());
}

#[test]
fn test_out_of_range_move_homes_instead() {
    let (sender, wire) = sender_with_wire();
    sender
        .send_coordinates(Position::new(4.0, 0.0, 0.0), feed())
        .unwrap();
    wire.lock().clear();

    let ack = sender
        .send_coordinates(Position::new(2.0, 0.0, 0.0), feed())
        .unwrap();
    assert!(!ack.ok);
    assert_eq!(ack.message, RANGE_EXCEEDED);
    assert_eq!(motion_lines(&wire), vec!["G1 X-4.000 Y0.000 Z0.000"]);
    assert_eq!(sender.trace_len(), 0);
    assert_eq!(sender.current_position(), Some(Position::zero()));
}

#[test]
fn test_out_of_range_first_move_writes_nothing() {
    let (sender, wire) = sender_with_wire();

    let ack = sender
        .send_coordinates(Position::new(0.0, 0.0, -4.5), feed())
        .unwrap();
    assert!(!ack.ok);
    assert_eq!(ack.message, RANGE_EXCEEDED);
    assert!(wire.lock().is_empty());
    assert_eq!(sender.trace_len(), 0);
}

#[test]
fn test_moves_up_to_the_limit_are_accepted() {
    let (sender, _wire) = sender_with_wire();
    let ack = sender
        .send_coordinates(Position::new(5.0, -5.0, 4.0), feed())
        .unwrap();
    assert!(ack.ok);
    assert_eq!(sender.current_position(), Some(Position::new(5.0, -5.0, 4.0)));
}

#[test]
fn test_timeout_after_move_line_keeps_trace() {
    let factory = SimulatedPortFactory::new().with_responder(|line| {
        if line == "G90" {
            Vec::new()
        } else {
            vec!["ok".to_string()]
        }
    });
    let config = SenderConfig {
        ack_timeout: Duration::from_millis(100),
        read_timeout: Duration::from_millis(2),
        ..SenderConfig::default()
    };
    let sender = SerialGcodeSender::new(Arc::new(factory), config);
    sender.connect("COM9", 115200).unwrap();

    let err = sender
        .send_coordinates(Position::new(1.0, 0.0, 0.0), feed())
        .unwrap_err();
    assert!(err.is_timeout());
    // The device accepted the motion line itself
    assert_eq!(sender.current_position(), Some(Position::new(1.0, 0.0, 0.0)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_position_is_sum_of_moves(
        moves in prop::collection::vec(
            (-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0),
            0..4,
        )
    ) {
        let (sender, _wire) = sender_with_wire();
        let mut expected = Position::zero();
        for (dx, dy, dz) in moves {
            let delta = Position::new(dx, dy, dz);
            let ack = sender.send_coordinates(delta, feed()).unwrap();
            prop_assert!(ack.ok);
            expected = expected + delta;
        }
        let position = sender.current_position().unwrap();
        prop_assert!(position.approx_eq(&expected, 1e-6));
    }
}
