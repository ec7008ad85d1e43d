//! Position poller
//!
//! Periodically republishes the sender's derived position on
//! `gcode.position`. The poller backs off whenever the dispatcher has a
//! command in flight and wakes early on `trigger()` or on a
//! `"refresh-position"` status from the dispatcher.
//!
//! The dispatcher's transport gate is held only for the position read
//! itself; backoff sleeps and bus publishing happen without it.

use crate::dispatcher::CommandDispatcher;
use crate::instrumentation::{EventSink, NoopSink};
use crate::sender::GcodeSender;
use crate::worker::Worker;
use motionkit_core::{
    topics, ErrorRaised, Error, InstrumentationEvent, InstrumentationKind, IntervalScheduler,
    MotionBus, MotionEvent, SubscriptionId, STATUS_REFRESH_POSITION,
};
use parking_lot::{Condvar, Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const WORKER_NAME: &str = "PositionPoller";
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Poller timing
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between two position reads
    pub interval: Duration,
    /// Pause before re-checking a disconnected sender
    pub disconnected_backoff: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            disconnected_backoff: Duration::from_millis(100),
        }
    }
}

/// Early wake-up flag
#[derive(Default)]
struct Wakeup {
    flag: Mutex<bool>,
    signal: Condvar,
}

impl Wakeup {
    fn set(&self) {
        *self.flag.lock() = true;
        self.signal.notify_all();
    }

    /// Sleep up to `timeout`; returns early if set, consuming the flag
    fn wait(&self, timeout: Duration) {
        let mut flag = self.flag.lock();
        if !*flag {
            self.signal.wait_for(&mut flag, timeout);
        }
        *flag = false;
    }
}

struct PollLoop {
    sender: Arc<dyn GcodeSender>,
    dispatcher: Arc<CommandDispatcher>,
    bus: Arc<MotionBus>,
    sink: Arc<RwLock<Arc<dyn EventSink>>>,
    config: PollerConfig,
    stopped: Arc<AtomicBool>,
    wakeup: Arc<Wakeup>,
}

impl PollLoop {
    fn run(self) {
        let mut scheduler = IntervalScheduler::new(self.config.interval);
        loop {
            self.wakeup.wait(scheduler.timeout());
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            if scheduler.skip_if(self.dispatcher.busy()) {
                continue;
            }
            if !self.sender.is_connected() {
                thread::sleep(self.config.disconnected_backoff);
                scheduler.defer();
                continue;
            }

            let read = {
                let Some(_gate) = self.dispatcher.try_idle_guard() else {
                    scheduler.defer();
                    continue;
                };
                let sender = self.sender.clone();
                panic::catch_unwind(AssertUnwindSafe(move || sender.current_position()))
            };

            match read {
                Ok(position) => {
                    let sink = self.sink.read().clone();
                    sink.publish(InstrumentationEvent::now(InstrumentationKind::PositionRead));
                    if let Some(position) = position {
                        tracing::trace!("Polled position {}", position);
                        self.bus
                            .publish(topics::POSITION, MotionEvent::PositionUpdated(position));
                    }
                    scheduler.executed();
                }
                Err(_) => {
                    tracing::error!("Position poll failed");
                    self.bus.publish(
                        topics::ERRORS,
                        MotionEvent::Error(ErrorRaised::new(
                            "Position poll failed",
                            Error::other("position read panicked"),
                        )),
                    );
                    scheduler.defer();
                }
            }
        }
        tracing::debug!("Position poller stopped");
    }
}

/// Background refresher of the derived position
pub struct PositionPoller {
    sender: Arc<dyn GcodeSender>,
    dispatcher: Arc<CommandDispatcher>,
    bus: Arc<MotionBus>,
    sink: Arc<RwLock<Arc<dyn EventSink>>>,
    config: PollerConfig,
    stopped: Arc<AtomicBool>,
    wakeup: Arc<Wakeup>,
    worker: Mutex<Option<Worker>>,
    subscription: SubscriptionId,
}

impl PositionPoller {
    /// Create a stopped poller with default timing
    pub fn new(
        sender: Arc<dyn GcodeSender>,
        dispatcher: Arc<CommandDispatcher>,
        bus: Arc<MotionBus>,
    ) -> Self {
        Self::with_config(sender, dispatcher, bus, PollerConfig::default())
    }

    /// Create a stopped poller
    ///
    /// The poller listens for `"refresh-position"` on the status topic from
    /// the moment it is created.
    pub fn with_config(
        sender: Arc<dyn GcodeSender>,
        dispatcher: Arc<CommandDispatcher>,
        bus: Arc<MotionBus>,
        config: PollerConfig,
    ) -> Self {
        let wakeup = Arc::new(Wakeup::default());
        let listener = wakeup.clone();
        let subscription = bus.subscribe(topics::COMMAND_STATUS, move |event: &MotionEvent| {
            if matches!(event, MotionEvent::CommandStatus(status) if status == STATUS_REFRESH_POSITION)
            {
                listener.set();
            }
        });

        Self {
            sender,
            dispatcher,
            bus,
            sink: Arc::new(RwLock::new(Arc::new(NoopSink))),
            config,
            stopped: Arc::new(AtomicBool::new(true)),
            wakeup,
            worker: Mutex::new(None),
            subscription,
        }
    }

    /// Route `position_read` records to `sink`
    pub fn set_event_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.write() = sink;
    }

    /// Start the polling thread; no-op if already running
    pub fn start(&self) -> std::io::Result<()> {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.is_finished()) {
            return Ok(());
        }
        self.stopped.store(false, Ordering::SeqCst);

        let poll = PollLoop {
            sender: self.sender.clone(),
            dispatcher: self.dispatcher.clone(),
            bus: self.bus.clone(),
            sink: self.sink.clone(),
            config: self.config.clone(),
            stopped: self.stopped.clone(),
            wakeup: self.wakeup.clone(),
        };
        *worker = Some(Worker::spawn(WORKER_NAME, move || poll.run())?);
        tracing::debug!("Position poller started every {:?}", self.config.interval);
        Ok(())
    }

    /// Stop the polling thread and wait briefly for it
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.wakeup.set();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join_timeout(JOIN_TIMEOUT).is_some() {
                tracing::warn!("Position poller detached while still running");
            }
        }
    }

    /// Refresh now instead of at the next interval
    pub fn trigger(&self) {
        self.wakeup.set();
    }

    /// Whether the polling thread is running
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.is_finished())
    }
}

impl Drop for PositionPoller {
    fn drop(&mut self) {
        self.stop();
        self.bus.unsubscribe(topics::COMMAND_STATUS, self.subscription);
    }
}
