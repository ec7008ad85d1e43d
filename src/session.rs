//! Process wiring
//!
//! Builds the bus, sender, dispatcher, poller and use cases from a loaded
//! `Config` and tears them down in order.

use motionkit_communication::{
    BusEventSink, CommandDispatcher, DispatcherConfig, GcodeConnectionService, GcodeSender,
    HomeMachineUseCase, PollCurrentPositionUseCase, PollerConfig, PositionPoller,
    SendCoordinatesUseCase, SendRawCommandUseCase, SenderConfig, SerialGcodeSender,
    SerialPortFactory, SerialPortInfo, SimulatedPortFactory, TransportFactory,
};
use motionkit_core::{ConnectionError, Feedrate, MotionBus, Position, Result};
use motionkit_settings::Config;
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to drive one device
pub struct MotionSession {
    bus: Arc<MotionBus>,
    sender: Arc<SerialGcodeSender>,
    dispatcher: Arc<CommandDispatcher>,
    connection: GcodeConnectionService,
    send_coordinates: SendCoordinatesUseCase,
    home: HomeMachineUseCase,
    send_raw: SendRawCommandUseCase,
    polling: PollCurrentPositionUseCase,
    default_feedrate: Feedrate,
    baud_rate: u32,
}

impl MotionSession {
    /// Session talking to real serial ports
    pub fn serial(config: &Config) -> Result<Self> {
        Self::with_factory(config, Arc::new(SerialPortFactory))
    }

    /// Session talking to an in-process simulated device
    pub fn simulated(config: &Config) -> Result<Self> {
        Self::with_factory(config, Arc::new(SimulatedPortFactory::new()))
    }

    pub fn with_factory(config: &Config, factory: Arc<dyn TransportFactory>) -> Result<Self> {
        let bus = Arc::new(MotionBus::new());

        let sender = Arc::new(SerialGcodeSender::new(
            factory,
            SenderConfig {
                ack_timeout: config.connection.ack_timeout(),
                read_timeout: config.connection.read_timeout(),
                limits: config.motion.limits,
            },
        ));
        let instrumentation = Arc::new(BusEventSink::new(bus.clone()));
        sender.set_event_sink(instrumentation.clone());

        let dispatcher = Arc::new(CommandDispatcher::with_config(
            bus.clone(),
            DispatcherConfig {
                shutdown_timeout: config.dispatcher.shutdown_timeout(),
            },
        ));

        let device: Arc<dyn GcodeSender> = sender.clone();
        let poller = Arc::new(PositionPoller::with_config(
            device.clone(),
            dispatcher.clone(),
            bus.clone(),
            PollerConfig {
                interval: config.polling.interval(),
                disconnected_backoff: config.polling.disconnected_backoff(),
            },
        ));
        poller.set_event_sink(instrumentation);

        Ok(Self {
            connection: GcodeConnectionService::new(device.clone(), poller.clone()),
            send_coordinates: SendCoordinatesUseCase::new(dispatcher.clone(), device.clone()),
            home: HomeMachineUseCase::new(dispatcher.clone(), device.clone()),
            send_raw: SendRawCommandUseCase::new(dispatcher.clone(), device),
            polling: PollCurrentPositionUseCase::new(poller.clone()),
            default_feedrate: config.motion.default_feedrate()?,
            baud_rate: config.connection.baud_rate,
            bus,
            sender,
            dispatcher,
        })
    }

    pub fn bus(&self) -> &Arc<MotionBus> {
        &self.bus
    }

    pub fn default_feedrate(&self) -> Feedrate {
        self.default_feedrate
    }

    /// Start background position refresh
    pub fn start(&self) -> Result<()> {
        self.polling.start()?;
        Ok(())
    }

    pub fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        self.connection.list_ports()
    }

    /// Connect to `port`; "Auto" picks the first enumerated port
    pub fn connect(&self, port: &str, baud_rate: Option<u32>) -> Result<String> {
        let port = if port.eq_ignore_ascii_case("auto") {
            self.list_ports()?
                .into_iter()
                .next()
                .map(|info| info.device)
                .ok_or_else(|| ConnectionError::PortEnumeration {
                    reason: "no serial ports found".to_string(),
                })?
        } else {
            port.to_string()
        };
        self.connection
            .connect(&port, baud_rate.unwrap_or(self.baud_rate))?;
        Ok(port)
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Queue a relative move
    pub fn move_by(&self, delta: Position, feedrate: Option<Feedrate>) -> Result<()> {
        self.send_coordinates
            .execute(delta, feedrate.unwrap_or(self.default_feedrate))
    }

    /// Queue a return to the origin
    pub fn home(&self, feedrate: Option<Feedrate>) -> Result<()> {
        self.home.execute(feedrate.unwrap_or(self.default_feedrate))
    }

    /// Queue a raw line and wait for its `ok`
    pub fn raw(&self, command: &str) -> Result<()> {
        self.send_raw.execute_with(command, true)
    }

    pub fn position(&self) -> Option<Position> {
        self.sender.current_position()
    }

    /// Wait for every queued command to finish
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.dispatcher.wait_idle(timeout)
    }

    /// Stop background work and close the device
    pub fn shutdown(&self) {
        self.polling.stop();
        if !self.dispatcher.stop() {
            tracing::warn!("Shutting down with a command still in flight");
        }
        self.sender.disconnect();
    }
}

impl Drop for MotionSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
