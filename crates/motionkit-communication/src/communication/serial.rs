//! Hardware serial transport
//!
//! Opens USB or RS-232 ports with 8N1 framing and a short per-read timeout,
//! and enumerates the ports present on this machine.

use super::{LineBuffer, Transport, TransportFactory};
use motionkit_core::{ConnectionError, Result};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialPortInfo {
    /// Device path (e.g., "/dev/ttyUSB0", "COM3")
    pub device: String,

    /// Short name (last path component of the device)
    pub name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Hardware id summary (e.g., "USB VID:PID=1A86:7523 SER=0001")
    pub hwid: String,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Product string if available
    pub product: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(device: impl Into<String>, description: impl Into<String>) -> Self {
        let device = device.into();
        let name = short_name(&device);
        Self {
            device,
            name,
            description: description.into(),
            hwid: "n/a".to_string(),
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set product string
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Set serial number
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Set USB IDs and derive the hardware id summary
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self.hwid = format!("USB VID:PID={:04X}:{:04X}", vid, pid);
        if let Some(ref serial) = self.serial_number {
            self.hwid.push_str(&format!(" SER={}", serial));
        }
        self
    }
}

fn short_name(device: &str) -> String {
    device
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(device)
        .to_string()
}

/// List available serial ports on the system
///
/// Pure query: nothing is opened.
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => Ok(ports.iter().map(port_info).collect()),
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(ConnectionError::PortEnumeration {
                reason: e.to_string(),
            }
            .into())
        }
    }
}

fn port_info(port: &serialport::SerialPortInfo) -> SerialPortInfo {
    let info = SerialPortInfo::new(&port.port_name, get_port_description(port));

    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            let mut info = info;
            if let Some(ref serial) = usb_info.serial_number {
                info = info.with_serial_number(serial);
            }
            let mut info = info.with_usb_ids(usb_info.vid, usb_info.pid);
            if let Some(ref mfg) = usb_info.manufacturer {
                info = info.with_manufacturer(mfg);
            }
            if let Some(ref product) = usb_info.product {
                info = info.with_product(product);
            }
            info
        }
        _ => info,
    }
}

/// Get a user-friendly description for a port
fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Real serial port implementation using the serialport crate
pub struct RealSerialPort {
    port: Box<dyn serialport::SerialPort>,
    buffer: LineBuffer,
    scratch: [u8; 256],
}

impl RealSerialPort {
    /// Open a serial port with 8N1 framing
    pub fn open(port_name: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let builder = serialport::new(port_name, baud_rate)
            .timeout(read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None);

        match builder.open() {
            Ok(port) => Ok(RealSerialPort {
                port,
                buffer: LineBuffer::default(),
                scratch: [0; 256],
            }),
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", port_name, e);
                Err(ConnectionError::FailedToOpen {
                    port: port_name.to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }
}

impl Transport for RealSerialPort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        if let Some(line) = self.buffer.next_line() {
            return Ok(Some(line));
        }
        match self.port.read(&mut self.scratch) {
            Ok(0) => Ok(None),
            Ok(n) => {
                self.buffer.extend(&self.scratch[..n]);
                Ok(self.buffer.next_line())
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.buffer.clear();
        // The handle is released when dropped
        Ok(())
    }
}

/// Factory producing real serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortFactory;

impl TransportFactory for SerialPortFactory {
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn Transport>> {
        Ok(Box::new(RealSerialPort::open(port, baud_rate, read_timeout)?))
    }

    fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        list_ports()
    }
}
