use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;

use crate::error::LinkError;

/// Longest inbound line kept; anything longer is returned in pieces
const MAX_PENDING: usize = 256;

/// Line-oriented channel to the device
pub trait Link {
    /// Write one already-terminated line
    fn write_line(&mut self, line: &str) -> Result<(), LinkError>;

    /// Return one inbound line if the device has sent anything, without
    /// blocking when nothing is waiting.
    fn poll_line(&mut self) -> Result<Option<Vec<u8>>, LinkError>;

    /// Drop the current handle and open the channel again
    fn reopen(&mut self) -> Result<(), LinkError>;
}

/// Serial port settings, fixed before the port is opened
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port: String,
    pub baud: u32,
    pub read_timeout: Duration,
}

pub struct SerialLink {
    settings: SerialSettings,
    port: Box<dyn SerialPort>,
    /// Bytes received past the last returned line
    pending: Vec<u8>,
}

impl SerialLink {
    pub fn open(settings: SerialSettings) -> Result<Self, LinkError> {
        let port = Self::open_port(&settings)?;
        log::info!(
            "Opened serial port {} at {} baud",
            settings.port,
            settings.baud
        );
        Ok(Self::with_port(settings, port))
    }

    fn with_port(settings: SerialSettings, port: Box<dyn SerialPort>) -> Self {
        Self {
            settings,
            port,
            pending: Vec::new(),
        }
    }

    fn open_port(settings: &SerialSettings) -> Result<Box<dyn SerialPort>, LinkError> {
        serialport::new(&settings.port, settings.baud)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|source| LinkError::Open {
                port: settings.port.clone(),
                source,
            })
    }
}

impl Link for SerialLink {
    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        self.port
            .write_all(line.as_bytes())
            .and_then(|_| self.port.flush())
            .map_err(LinkError::Write)
    }

    fn poll_line(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
        if let Some(line) = take_line(&mut self.pending) {
            return Ok(Some(line));
        }

        let waiting = self
            .port
            .bytes_to_read()
            .map_err(|e| LinkError::Read(e.into()))?;
        if waiting == 0 {
            return Ok(None);
        }

        // Something arrived: read until a terminator, the read timeout or a full buffer
        let deadline = Instant::now() + self.settings.read_timeout;
        let mut buf = [0u8; MAX_PENDING];
        loop {
            let room = MAX_PENDING.saturating_sub(self.pending.len());
            if room == 0 || Instant::now() >= deadline {
                break;
            }
            match self.port.read(&mut buf[..room]) {
                Ok(0) => break,
                Ok(n) => {
                    self.pending.extend_from_slice(&buf[..n]);
                    if buf[..n].contains(&b'\n') {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(LinkError::Read(e)),
            }
        }

        // A partial line that timed out is handed over as-is
        Ok(take_line(&mut self.pending).or_else(|| {
            (!self.pending.is_empty()).then(|| std::mem::take(&mut self.pending))
        }))
    }

    fn reopen(&mut self) -> Result<(), LinkError> {
        self.port = Self::open_port(&self.settings)?;
        self.pending.clear();
        log::info!("Reopened serial port {}", self.settings.port);
        Ok(())
    }
}

/// Split the first `\n`-terminated line (terminator included) off `pending`
fn take_line(pending: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = pending.iter().position(|&b| b == b'\n')?;
    let rest = pending.split_off(end + 1);
    Some(std::mem::replace(pending, rest))
}

/// Print the serial ports the OS knows about
pub fn list_ports() -> Result<(), LinkError> {
    let ports = serialport::available_ports().map_err(LinkError::Enumerate)?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => println!(
                "{}  (USB {:04x}:{:04x} {})",
                port.port_name,
                usb.vid,
                usb.pid,
                usb.product.unwrap_or_default()
            ),
            _ => println!("{}", port.port_name),
        }
    }
    Ok(())
}
