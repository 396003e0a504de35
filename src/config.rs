use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const BAUD_RATE: u32 = 115_200;

/// Sent in order when the operator stops the job from the control menu.
pub const STOP_GCODE: &str = "M107
M104 S0
M140 S0
G1 Z50
M84 Z E
";

/// How long a serial read waits before reporting an idle line.
pub const READ_TIMEOUT: Duration = Duration::from_millis(250);

pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
#[error("usage: {program} [serial port] [gcode path]")]
pub struct UsageError {
    program: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: String,
    pub gcode_path: PathBuf,
    pub baud_rate: u32,
}

impl Config {
    /// Builds the configuration from process arguments, program name first.
    pub fn from_args<I>(args: I) -> Result<Self, UsageError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let program = args.next().unwrap_or_else(|| "drip".to_owned());
        match (args.next(), args.next(), args.next()) {
            (Some(port), Some(gcode_path), None) => Ok(Self {
                port,
                gcode_path: gcode_path.into(),
                baud_rate: BAUD_RATE,
            }),
            _ => Err(UsageError { program }),
        }
    }
}
