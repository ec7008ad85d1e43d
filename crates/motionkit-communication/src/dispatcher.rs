//! Command dispatcher
//!
//! Serializes every protocol exchange against one sender. Callers enqueue
//! `CommandRequest`s from any thread; a single worker thread executes them in
//! FIFO order and reports progress on the bus:
//!
//! 1. `gcode.command.status` with the request's status text
//! 2. `gcode.log` with each response line, `gcode.command.result` with the ack
//! 3. `errors` if the command failed, timed out or was rejected
//! 4. `gcode.command.status` with `"Idle"`
//! 5. `gcode.command.status` with `"refresh-position"` when requested
//!
//! The worker holds a transport gate for the whole of steps 1–4. The poller
//! only ever `try_lock`s that gate, so it never waits on a command and never
//! reads while one is in flight.

use crate::sender::protocol;
use crate::worker::Worker;
use motionkit_core::{
    topics, CommandAck, Error, ErrorRaised, MotionBus, MotionError, MotionEvent, Result,
    STATUS_IDLE, STATUS_REFRESH_POSITION,
};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

const WORKER_NAME: &str = "GcodeDispatcher";

type CommandFn = Box<dyn FnOnce() -> Result<CommandAck> + Send>;

/// Unit of work for the dispatcher
pub struct CommandRequest {
    /// Short name used in error reports, e.g. `"Move"`
    pub name: String,
    /// The work itself, run on the worker thread
    pub execute: CommandFn,
    /// Published as the busy status before execution
    pub status_text: String,
    /// Ask position observers to refresh once the command is done
    pub refresh_position: bool,
}

impl CommandRequest {
    /// Create a request that does not ask for a position refresh
    pub fn new<F>(name: impl Into<String>, status_text: impl Into<String>, execute: F) -> Self
    where
        F: FnOnce() -> Result<CommandAck> + Send + 'static,
    {
        Self {
            name: name.into(),
            execute: Box::new(execute),
            status_text: status_text.into(),
            refresh_position: false,
        }
    }

    /// Set whether a position refresh follows the command
    pub fn with_refresh_position(mut self, refresh: bool) -> Self {
        self.refresh_position = refresh;
        self
    }
}

impl std::fmt::Debug for CommandRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRequest")
            .field("name", &self.name)
            .field("status_text", &self.status_text)
            .field("refresh_position", &self.refresh_position)
            .finish_non_exhaustive()
    }
}

/// Dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How long `stop()` waits for the in-flight command
    pub shutdown_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(3),
        }
    }
}

enum Job {
    Run(CommandRequest),
    Shutdown,
}

struct Shared {
    bus: Arc<MotionBus>,
    inflight: AtomicBool,
    gate: Mutex<()>,
    pending: Mutex<usize>,
    drained: Condvar,
}

impl Shared {
    fn run(&self, jobs: mpsc::Receiver<Job>) {
        tracing::debug!("Dispatcher worker started");
        while let Ok(job) = jobs.recv() {
            match job {
                Job::Run(request) => {
                    let name = request.name.clone();
                    if let Err(payload) =
                        panic::catch_unwind(AssertUnwindSafe(|| self.execute(request)))
                    {
                        tracing::error!(
                            "{} aborted while reporting: {}",
                            name,
                            panic_message(payload.as_ref())
                        );
                        self.inflight.store(false, Ordering::SeqCst);
                    }
                    self.finish_one();
                }
                Job::Shutdown => break,
            }
        }
        tracing::debug!("Dispatcher worker stopped");
    }

    fn execute(&self, request: CommandRequest) {
        let CommandRequest {
            name,
            execute,
            status_text,
            refresh_position,
        } = request;

        let gate = self.gate.lock();
        self.inflight.store(true, Ordering::SeqCst);
        self.status(status_text);

        match panic::catch_unwind(AssertUnwindSafe(execute)) {
            Ok(Ok(ack)) => self.report_ack(&name, ack),
            Ok(Err(e)) => {
                tracing::error!("{} failed: {}", name, e);
                self.raise(&name, e);
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::error!("{} panicked: {}", name, reason);
                self.raise(&name, Error::other(reason));
            }
        }

        self.status(STATUS_IDLE.to_string());
        self.inflight.store(false, Ordering::SeqCst);
        drop(gate);

        if refresh_position {
            self.status(STATUS_REFRESH_POSITION.to_string());
        }
    }

    fn report_ack(&self, name: &str, ack: CommandAck) {
        for line in &ack.responses {
            self.bus
                .publish(topics::COMMAND_LOG, MotionEvent::Log(format!("<< {}", line)));
        }
        if !ack.ok {
            tracing::error!("{} failed: {}", name, ack.message);
            let error = if ack.message.starts_with(protocol::ERROR_PREFIX) {
                MotionError::DeviceError {
                    command: name.to_string(),
                    line: ack.message.clone(),
                }
            } else {
                MotionError::CommandRejected {
                    command: name.to_string(),
                    message: ack.message.clone(),
                }
            };
            self.raise(name, error.into());
        }
        self.bus
            .publish(topics::COMMAND_RESULT, MotionEvent::CommandResult(ack));
    }

    fn raise(&self, name: &str, error: Error) {
        self.bus.publish(
            topics::ERRORS,
            MotionEvent::Error(ErrorRaised::new(format!("{} failed", name), error)),
        );
    }

    fn status(&self, text: String) {
        self.bus
            .publish(topics::COMMAND_STATUS, MotionEvent::CommandStatus(text));
    }

    fn finish_one(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct Running {
    jobs: mpsc::Sender<Job>,
    worker: Worker,
}

/// Single-worker FIFO executor of command requests
pub struct CommandDispatcher {
    shared: Arc<Shared>,
    config: DispatcherConfig,
    running: Mutex<Option<Running>>,
    /// A stopped worker that timed out and still has queued commands
    draining: Mutex<Option<Worker>>,
}

impl CommandDispatcher {
    /// Create a dispatcher publishing on `bus`; the worker starts on first use
    pub fn new(bus: Arc<MotionBus>) -> Self {
        Self::with_config(bus, DispatcherConfig::default())
    }

    /// Create a dispatcher with explicit settings
    pub fn with_config(bus: Arc<MotionBus>, config: DispatcherConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                bus,
                inflight: AtomicBool::new(false),
                gate: Mutex::new(()),
                pending: Mutex::new(0),
                drained: Condvar::new(),
            }),
            config,
            running: Mutex::new(None),
            draining: Mutex::new(None),
        }
    }

    /// Enqueue `request` without blocking on its execution
    pub fn dispatch(&self, request: CommandRequest) -> Result<()> {
        let mut running = self.running.lock();
        if running.as_ref().map_or(true, |r| r.worker.is_finished()) {
            *running = Some(self.start()?);
        }

        *self.shared.pending.lock() += 1;
        let mut job = Job::Run(request);
        for _ in 0..2 {
            let Some(current) = running.as_ref() else {
                break;
            };
            match current.jobs.send(job) {
                Ok(()) => return Ok(()),
                Err(mpsc::SendError(returned)) => {
                    tracing::warn!("Dispatcher worker vanished; restarting");
                    job = returned;
                    *running = Some(self.start()?);
                }
            }
        }

        self.shared.finish_one();
        Err(Error::other("Dispatcher worker unavailable"))
    }

    fn start(&self) -> Result<Running> {
        let (jobs, queue) = mpsc::channel();
        let shared = self.shared.clone();
        // Commands queued before a timed-out stop run first
        let previous = self.draining.lock().take();
        let worker = Worker::spawn(WORKER_NAME, move || {
            if let Some(previous) = previous {
                previous.join();
            }
            shared.run(queue)
        })?;
        Ok(Running { jobs, worker })
    }

    /// Whether a command is executing right now; never blocks
    pub fn busy(&self) -> bool {
        self.shared.inflight.load(Ordering::SeqCst)
    }

    /// Commands enqueued but not yet finished
    pub fn pending(&self) -> usize {
        *self.shared.pending.lock()
    }

    /// Exclusive access to the transport, if no command is in flight
    ///
    /// While the guard is held the worker cannot start the next command.
    pub fn try_idle_guard(&self) -> Option<MutexGuard<'_, ()>> {
        if self.busy() {
            return None;
        }
        self.shared.gate.try_lock()
    }

    /// Block until every enqueued command has finished or `timeout` elapses
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            if self
                .shared
                .drained
                .wait_until(&mut pending, deadline)
                .timed_out()
            {
                return *pending == 0;
            }
        }
        true
    }

    /// Stop the worker after the commands already queued
    ///
    /// Returns false if the worker did not finish within the shutdown
    /// timeout. It then finishes its queue on its own, and a worker started
    /// by a later `dispatch` waits for it before running anything new.
    pub fn stop(&self) -> bool {
        let Some(running) = self.running.lock().take() else {
            return true;
        };
        let _ = running.jobs.send(Job::Shutdown);
        match running.worker.join_timeout(self.config.shutdown_timeout) {
            None => true,
            Some(worker) => {
                *self.draining.lock() = Some(worker);
                false
            }
        }
    }

    /// The bus progress is reported on
    pub fn bus(&self) -> &Arc<MotionBus> {
        &self.shared.bus
    }
}

impl Drop for CommandDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
