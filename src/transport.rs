use std::io::{self, BufRead, Write};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, SendError, Sender};
use serialport::SerialPort;

use crate::codec::{LineCodec, Reply};
use crate::config::{READ_TIMEOUT, WRITE_TIMEOUT};
use crate::Error;

/// Permission to send the next command. An error means the link is gone.
pub type Pulse = Result<(), Error>;

/// Opens the serial port, returning separate handles for reading and writing.
pub fn open(
    path: &str,
    baud_rate: u32,
) -> Result<(Box<dyn SerialPort>, Box<dyn SerialPort>), Error> {
    let port = serialport::new(path, baud_rate)
        .timeout(WRITE_TIMEOUT)
        .open()?;
    let mut reader = port.try_clone()?;
    reader.set_timeout(READ_TIMEOUT)?;
    Ok((reader, port))
}

/// The control loop's side of the serial link: a single-slot command
/// handoff to the writer thread and the stream of readiness pulses.
pub struct Transport {
    commands: Sender<Vec<u8>>,
    ready: Receiver<Pulse>,
    writer: Option<JoinHandle<()>>,
}

impl Transport {
    /// Wraps existing channels, for when something other than a port sits
    /// on the far side.
    pub fn new(commands: Sender<Vec<u8>>, ready: Receiver<Pulse>) -> Self {
        Self {
            commands,
            ready,
            writer: None,
        }
    }

    /// Starts the reader and writer threads. `echo_rx` and `echo_tx` receive
    /// the terminal copy of incoming and outgoing traffic.
    pub fn spawn<R, W, I, O>(reader: R, writer: W, echo_rx: I, echo_tx: O) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
        I: Write + Send + 'static,
        O: Write + Send + 'static,
    {
        // Capacity 1: the loop can hand off a line while the previous write
        // is still going out, but never two ahead.
        let (command_tx, command_rx) = bounded(1);
        let (ready_tx, ready_rx) = bounded(0);

        let writer_ready = ready_tx.clone();
        let writer = thread::Builder::new()
            .name("serial-tx".into())
            .spawn(move || write_loop(LineCodec::new(writer), command_rx, echo_tx, writer_ready))?;
        thread::Builder::new()
            .name("serial-rx".into())
            .spawn(move || read_loop(LineCodec::new(reader), echo_rx, ready_tx))?;

        Ok(Self {
            commands: command_tx,
            ready: ready_rx,
            writer: Some(writer),
        })
    }

    pub fn ready(&self) -> &Receiver<Pulse> {
        &self.ready
    }

    pub fn send(&self, line: Vec<u8>) -> Result<(), SendError<Vec<u8>>> {
        log::trace!("sending {:?}", String::from_utf8_lossy(&line));
        self.commands.send(line)
    }

    /// Closes the handoff and waits for the writer to finish the line it
    /// already accepted. Pulses nobody will read are dropped first, so a
    /// writer reporting an error cannot block the join.
    pub fn close(self) {
        let Self {
            commands,
            ready,
            writer,
        } = self;
        drop(commands);
        drop(ready);
        if let Some(writer) = writer {
            if writer.join().is_err() {
                log::error!("serial writer panicked");
            }
        }
    }
}

fn write_loop<W, O>(
    mut codec: LineCodec<W>,
    commands: Receiver<Vec<u8>>,
    mut echo: O,
    ready: Sender<Pulse>,
) where
    W: Write,
    O: Write,
{
    for line in commands {
        let _ = writeln!(echo, ">> {}", String::from_utf8_lossy(&line));
        if let Err(err) = codec.write_command(&line) {
            let _ = ready.send(Err(err.into()));
            return;
        }
    }
}

fn read_loop<R, O>(mut codec: LineCodec<R>, mut echo: O, ready: Sender<Pulse>)
where
    R: BufRead,
    O: Write,
{
    // Nothing is in flight yet, so the first command may go right away.
    if ready.send(Ok(())).is_err() {
        return;
    }
    let mut reply = Reply::new();
    loop {
        reply.clear();
        let result = codec.read_reply(&mut reply);
        log::trace!("received {:?}", reply);
        for line in reply.lines() {
            let _ = writeln!(echo, "<< {}", line);
        }
        let pulse = result.map_err(Error::from);
        let done = pulse.is_err();
        if ready.send(pulse).is_err() || done {
            return;
        }
    }
}
