//! Serial port connection and discovery
//!
//! Opens the configured device with 8N1 framing and no flow control, and
//! lists the ports the operating system knows about.

use crate::config::ReaderConfig;
use crate::error::{ReadError, Result};
use colored::Colorize;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read};

/// An open serial device, closed when dropped
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialConnection {
    /// Open the device named in `config`, discarding stale input if configured
    pub fn open(config: &ReaderConfig) -> Result<Self> {
        let port = serialport::new(&config.device_path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.poll_interval())
            .open()
            .map_err(|source| ReadError::Open {
                path: config.device_path.clone(),
                source,
            })?;

        let mut conn = Self {
            port,
            path: config.device_path.clone(),
        };

        if config.flush_on_open {
            conn.clear_input()?;
        }

        log::debug!("Opened {} at {} baud", conn.path, config.baud_rate);
        Ok(conn)
    }

    /// Device path this connection was opened with
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Discard bytes received but not yet read
    pub fn clear_input(&mut self) -> Result<()> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|source| ReadError::Flush {
                path: self.path.clone(),
                source,
            })
    }
}

impl Read for SerialConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

/// A serial port reported by the operating system
#[derive(Debug, Clone, PartialEq)]
pub struct PortInfo {
    pub path: String,
    pub kind: PortKind,
}

/// Bus a port is attached to, with USB descriptors when known
#[derive(Debug, Clone, PartialEq)]
pub enum PortKind {
    Usb {
        vid: u16,
        pid: u16,
        manufacturer: Option<String>,
        product: Option<String>,
    },
    Pci,
    Bluetooth,
    Unknown,
}

impl PortInfo {
    /// One-line description, e.g. `USB 2e8a:000a Raspberry Pi Pico`
    pub fn describe(&self) -> String {
        match self.kind {
            PortKind::Usb {
                vid,
                pid,
                ref manufacturer,
                ref product,
            } => {
                let names: Vec<&str> = [manufacturer.as_deref(), product.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect();
                if names.is_empty() {
                    format!("USB {:04x}:{:04x}", vid, pid)
                } else {
                    format!("USB {:04x}:{:04x} {}", vid, pid, names.join(" "))
                }
            }
            PortKind::Pci => "PCI".to_string(),
            PortKind::Bluetooth => "Bluetooth".to_string(),
            PortKind::Unknown => "unknown bus".to_string(),
        }
    }
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(p: serialport::SerialPortInfo) -> Self {
        let kind = match p.port_type {
            serialport::SerialPortType::UsbPort(usb) => PortKind::Usb {
                vid: usb.vid,
                pid: usb.pid,
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            serialport::SerialPortType::PciPort => PortKind::Pci,
            serialport::SerialPortType::BluetoothPort => PortKind::Bluetooth,
            serialport::SerialPortType::Unknown => PortKind::Unknown,
        };

        PortInfo {
            path: p.port_name,
            kind,
        }
    }
}

/// List all available serial ports, sorted by path
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .map_err(ReadError::Enumerate)?
        .into_iter()
        .map(PortInfo::from)
        .collect();

    ports.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(ports)
}

/// Print the available ports, marking the one `readserial read` would open
pub fn print_ports(configured: &str) -> Result<()> {
    let ports = list_ports()?;

    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        println!(
            "Configured device {} is not present. Check the cable and 'dialout' group membership.",
            configured.white().bold()
        );
        return Ok(());
    }

    for port in &ports {
        println!("{}", format_port_line(port, configured));
    }

    if !ports.iter().any(|p| p.path == configured) {
        println!(
            "\n{} configured device {} not found; pass -p <PORT> to choose one above",
            "[WARNING]".yellow().bold(),
            configured.white()
        );
    }

    Ok(())
}

fn format_port_line(port: &PortInfo, configured: &str) -> String {
    let marker = if port.path == configured { "*" } else { " " };
    format!("{} {:<20} {}", marker, port.path, port.describe())
}
