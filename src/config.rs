use clap::Parser;
use std::time::Duration;

use crate::backend::BackendKind;
use crate::link::SerialSettings;

/// Mirror the host's now-playing state onto a serial device and relay its buttons back
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Config {
    /// Serial port of the device, e.g. /dev/cu.usbmodem14201 or COM3
    #[arg(env = "TUNEBRIDGE_PORT", required_unless_present = "list_ports")]
    pub port: Option<String>,

    #[arg(long, env = "TUNEBRIDGE_BAUD", default_value_t = 115_200)]
    pub baud: u32,

    /// How long a read waits for the rest of an inbound line
    #[arg(long, env = "TUNEBRIDGE_READ_TIMEOUT_MS", default_value_t = 100)]
    pub read_timeout_ms: u64,

    /// Pause between update cycles
    #[arg(long, env = "TUNEBRIDGE_INTERVAL_MS", default_value_t = 1000)]
    pub interval_ms: u64,

    #[arg(long, env = "TUNEBRIDGE_BACKEND", value_enum, default_value_t = BackendKind::default())]
    pub backend: BackendKind,

    /// Upper bound on a single player query or command
    #[arg(long, env = "TUNEBRIDGE_QUERY_TIMEOUT_MS", default_value_t = 3000)]
    pub query_timeout_ms: u64,

    /// Times to reopen the port after a failed write before giving up (0 = exit immediately)
    #[arg(long, env = "TUNEBRIDGE_RECONNECT_ATTEMPTS", default_value_t = 0)]
    pub reconnect_attempts: u32,

    /// Print the serial ports found on this machine and exit
    #[arg(long)]
    pub list_ports: bool,
}

impl Config {
    pub fn serial_settings(&self, port: String) -> SerialSettings {
        SerialSettings {
            port,
            baud: self.baud,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}
