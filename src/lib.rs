pub mod codec;
pub mod config;
pub mod console;
pub mod drip;
pub mod feed;
pub mod menu;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use self::config::Config;
pub use self::console::Interrupt;
pub use self::drip::Dripper;
pub use self::menu::Choice;
pub use self::transport::{Pulse, Transport};

use self::codec::ReadReplyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("serialport: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port closed")]
    Closed,

    #[error("cannot read from stdin")]
    ConsoleClosed,

    #[error("signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl From<ReadReplyError> for Error {
    fn from(err: ReadReplyError) -> Self {
        match err {
            ReadReplyError::Io(err) => Self::Io(err),
            ReadReplyError::Closed => Self::Closed,
        }
    }
}
