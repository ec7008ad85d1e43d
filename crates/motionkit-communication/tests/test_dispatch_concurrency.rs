//! Dispatcher and poller coordination over the simulated device

use motionkit_communication::{
    CommandDispatcher, EventSink, GcodeSender, PollerConfig, PositionPoller, SenderConfig,
    SendCoordinatesUseCase, SendRawCommandUseCase, SerialGcodeSender, SerialPortInfo,
    SimulatedPortFactory, WireEntry,
};
use motionkit_core::{
    topics, CommandAck, Feedrate, InstrumentationEvent, InstrumentationKind, MotionBus,
    MotionEvent, Position, Result, STATUS_IDLE, STATUS_REFRESH_POSITION,
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum Mark {
    Busy(String),
    Idle,
    Refresh,
    PositionRead,
    Instrument(InstrumentationKind),
}

/// One ordered timeline shared by the bus listener and the sink
#[derive(Default)]
struct Timeline {
    marks: Mutex<Vec<Mark>>,
}

impl EventSink for Timeline {
    fn publish(&self, event: InstrumentationEvent) {
        self.marks.lock().push(Mark::Instrument(event.kind));
    }
}

/// Marks every `current_position()` call on the timeline
struct ObservedSender {
    inner: Arc<SerialGcodeSender>,
    timeline: Arc<Timeline>,
}

impl GcodeSender for ObservedSender {
    fn connect(&self, port: &str, baud_rate: u32) -> Result<()> {
        self.inner.connect(port, baud_rate)
    }
    fn disconnect(&self) {
        self.inner.disconnect()
    }
    fn list_serial_ports(&self) -> Result<Vec<SerialPortInfo>> {
        self.inner.list_serial_ports()
    }
    fn send_raw(&self, command: &str, wait_for_ok: bool) -> Result<CommandAck> {
        self.inner.send_raw(command, wait_for_ok)
    }
    fn send_coordinates(&self, position: Position, feedrate: Feedrate) -> Result<CommandAck> {
        self.inner.send_coordinates(position, feedrate)
    }
    fn home(&self, feedrate: Feedrate) -> Result<CommandAck> {
        self.inner.home(feedrate)
    }
    fn current_position(&self) -> Option<Position> {
        self.timeline.marks.lock().push(Mark::PositionRead);
        self.inner.current_position()
    }
    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

fn record_statuses(bus: &MotionBus, timeline: Arc<Timeline>) {
    bus.subscribe(topics::COMMAND_STATUS, move |event: &MotionEvent| {
        if let MotionEvent::CommandStatus(status) = event {
            let mark = match status.as_str() {
                STATUS_IDLE => Mark::Idle,
                STATUS_REFRESH_POSITION => Mark::Refresh,
                other => Mark::Busy(other.to_string()),
            };
            timeline.marks.lock().push(mark);
        }
    });
}

fn simulated_sender(delay: Duration) -> (Arc<SerialGcodeSender>, SimulatedPortFactory) {
    let factory = SimulatedPortFactory::new().with_response_delay(delay);
    let config = SenderConfig {
        ack_timeout: Duration::from_secs(1),
        read_timeout: Duration::from_millis(1),
        ..SenderConfig::default()
    };
    let sender = Arc::new(SerialGcodeSender::new(Arc::new(factory.clone()), config));
    sender.connect("COM9", 115200).unwrap();
    (sender, factory)
}

#[test]
fn test_concurrent_dispatch_serializes_the_wire() {
    let (sender, factory) = simulated_sender(Duration::from_millis(1));
    let bus = Arc::new(MotionBus::new());
    let dispatcher = Arc::new(CommandDispatcher::new(bus));
    let raw = Arc::new(SendRawCommandUseCase::new(dispatcher.clone(), sender));

    let handles: Vec<_> = [2usize, 2, 1]
        .into_iter()
        .enumerate()
        .map(|(t, count)| {
            let raw = raw.clone();
            thread::spawn(move || {
                for i in 0..count {
                    raw.execute_with(&format!("G4 P0.{}{}", t, i), true).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(dispatcher.wait_idle(Duration::from_secs(5)));

    let wire = factory.wire().lock().clone();
    assert_eq!(wire.len(), 10);
    for pair in wire.chunks(2) {
        assert!(matches!(pair[0], WireEntry::Written(_)));
        assert_eq!(pair[1], WireEntry::Read("ok".to_string()));
    }
}

#[test]
fn test_inflight_spans_busy_to_idle() {
    let (sender, _factory) = simulated_sender(Duration::ZERO);
    let bus = Arc::new(MotionBus::new());
    let dispatcher = Arc::new(CommandDispatcher::new(bus.clone()));

    let observed = Arc::new(Mutex::new(Vec::new()));
    let observed_clone = observed.clone();
    let weak: Weak<CommandDispatcher> = Arc::downgrade(&dispatcher);
    bus.subscribe(topics::COMMAND_STATUS, move |event: &MotionEvent| {
        if let (MotionEvent::CommandStatus(status), Some(dispatcher)) = (event, weak.upgrade()) {
            observed_clone.lock().push((status.clone(), dispatcher.busy()));
        }
    });

    let moves = SendCoordinatesUseCase::new(dispatcher.clone(), sender);
    let feed = Feedrate::new(300.0).unwrap();
    for _ in 0..3 {
        moves.execute(Position::new(0.5, 0.0, 0.0), feed).unwrap();
    }
    assert!(dispatcher.wait_idle(Duration::from_secs(5)));

    let observed = observed.lock();
    assert_eq!(observed.len(), 9);
    for triple in observed.chunks(3) {
        assert_eq!(triple[0], ("Moving…".to_string(), true));
        assert_eq!(triple[1], (STATUS_IDLE.to_string(), true));
        assert_eq!(triple[2], (STATUS_REFRESH_POSITION.to_string(), false));
    }
}

#[test]
fn test_poller_never_reads_mid_command() {
    let (sender, _factory) = simulated_sender(Duration::from_millis(2));
    let bus = Arc::new(MotionBus::new());
    let dispatcher = Arc::new(CommandDispatcher::new(bus.clone()));
    let timeline = Arc::new(Timeline::default());
    record_statuses(&bus, timeline.clone());
    sender.set_event_sink(timeline.clone());

    let observed = Arc::new(ObservedSender {
        inner: sender.clone(),
        timeline: timeline.clone(),
    });
    let poller = PositionPoller::with_config(
        observed,
        dispatcher.clone(),
        bus.clone(),
        PollerConfig {
            interval: Duration::from_millis(1),
            disconnected_backoff: Duration::from_millis(1),
        },
    );
    poller.start().unwrap();

    let moves = SendCoordinatesUseCase::new(dispatcher.clone(), sender.clone());
    let feed = Feedrate::new(200.0).unwrap();
    for i in 0..4 {
        let step = if i % 2 == 0 { 1.0 } else { -1.0 };
        moves.execute(Position::new(step, 0.0, 0.0), feed).unwrap();
        thread::sleep(Duration::from_millis(5));
    }
    assert!(dispatcher.wait_idle(Duration::from_secs(5)));
    thread::sleep(Duration::from_millis(20));
    poller.stop();

    let marks = timeline.marks.lock().clone();
    let mut in_command = false;
    let mut reads_outside = 0;
    for mark in &marks {
        match mark {
            Mark::Busy(_) => in_command = true,
            Mark::Idle => in_command = false,
            Mark::PositionRead => {
                assert!(!in_command, "position read between Busy and Idle: {:?}", marks);
                reads_outside += 1;
            }
            _ => {}
        }
    }
    assert!(reads_outside > 0);
    assert_eq!(sender.current_position(), Some(Position::zero()));
}

#[test]
fn test_poller_publishes_after_move() {
    let (sender, _factory) = simulated_sender(Duration::ZERO);
    let bus = Arc::new(MotionBus::new());
    let dispatcher = Arc::new(CommandDispatcher::new(bus.clone()));
    let positions = Arc::new(Mutex::new(Vec::new()));
    let positions_clone = positions.clone();
    bus.subscribe(topics::POSITION, move |event: &MotionEvent| {
        if let MotionEvent::PositionUpdated(position) = event {
            positions_clone.lock().push(*position);
        }
    });

    let poller = PositionPoller::with_config(
        sender.clone(),
        dispatcher.clone(),
        bus,
        PollerConfig {
            interval: Duration::from_secs(60),
            disconnected_backoff: Duration::from_millis(1),
        },
    );
    poller.start().unwrap();

    SendCoordinatesUseCase::new(dispatcher.clone(), sender)
        .execute(Position::new(1.0, 1.0, 0.0), Feedrate::new(200.0).unwrap())
        .unwrap();
    assert!(dispatcher.wait_idle(Duration::from_secs(5)));

    let target = Position::new(1.0, 1.0, 0.0);
    let mut found = false;
    for _ in 0..200 {
        if positions.lock().contains(&target) {
            found = true;
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    poller.stop();
    assert!(found, "refresh after the move was not published");
}

#[test]
fn test_timeout_is_reported_and_queue_continues() {
    let factory = SimulatedPortFactory::new().with_responder(|line| {
        if line == "M5" {
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
    let sender = Arc::new(SerialGcodeSender::new(Arc::new(factory), config));
    sender.connect("COM9", 115200).unwrap();

    let bus = Arc::new(MotionBus::new());
    let errors = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = errors.clone();
    bus.subscribe(topics::ERRORS, move |event: &MotionEvent| {
        if let MotionEvent::Error(raised) = event {
            errors_clone.lock().push(raised.clone());
        }
    });
    let results = Arc::new(Mutex::new(Vec::new()));
    let results_clone = results.clone();
    bus.subscribe(topics::COMMAND_RESULT, move |event: &MotionEvent| {
        if let MotionEvent::CommandResult(ack) = event {
            results_clone.lock().push(ack.message.clone());
        }
    });

    let dispatcher = Arc::new(CommandDispatcher::new(bus));
    let raw = SendRawCommandUseCase::new(dispatcher.clone(), sender.clone());
    raw.execute_with("M5", true).unwrap();
    raw.execute_with("G4 P0", true).unwrap();
    assert!(dispatcher.wait_idle(Duration::from_secs(5)));

    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "RAW M5 failed");
    assert!(errors[0].error.as_ref().is_some_and(|e| e.is_timeout()));
    assert_eq!(*results.lock(), vec!["ok".to_string()]);
    assert!(sender.is_connected());
}
