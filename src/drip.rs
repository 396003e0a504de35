//! The control loop: paces command lines to the device, one per readiness
//! pulse, and hands control to the operator menu on interrupt.

use std::collections::VecDeque;
use std::io::Write;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver};

use crate::config::STOP_GCODE;
use crate::console::Interrupt;
use crate::feed::{FileLine, StopSequence};
use crate::menu::{self, Choice, PortLister};
use crate::transport::{Pulse, Transport};
use crate::Error;

/// Where streaming-mode lines come from.
enum Feed {
    File,
    Stop(StopSequence),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Streaming,
    Hacker,
}

enum Event {
    Operator(Option<String>),
    Interrupt,
    Ready(Option<Pulse>),
}

pub struct Dripper<O> {
    gcode: Receiver<FileLine>,
    transport: Transport,
    user_input: Receiver<String>,
    interrupt: Interrupt,
    out: O,
    stop_gcode: &'static str,
    list_ports: PortLister,
    feed: Feed,
    mode: Mode,
    hack_queue: VecDeque<String>,
    ready: bool,
}

impl<O: Write> Dripper<O> {
    pub fn new(
        gcode: Receiver<FileLine>,
        transport: Transport,
        user_input: Receiver<String>,
        interrupt: Interrupt,
        out: O,
    ) -> Self {
        Self {
            gcode,
            transport,
            user_input,
            interrupt,
            out,
            stop_gcode: STOP_GCODE,
            list_ports: serialport::available_ports,
            feed: Feed::File,
            mode: Mode::Streaming,
            hack_queue: VecDeque::new(),
            ready: false,
        }
    }

    pub fn with_stop_gcode(mut self, stop_gcode: &'static str) -> Self {
        self.stop_gcode = stop_gcode;
        self
    }

    pub fn with_port_lister(mut self, list_ports: PortLister) -> Self {
        self.list_ports = list_ports;
        self
    }

    /// Streams until the feed runs dry, the link fails, or the operator
    /// aborts. Returns the elapsed time, rounded to the second.
    pub fn run(mut self) -> Result<Duration, Error> {
        self.interrupt.arm();
        let start = Instant::now();
        log::info!("Start drip.");

        let result = self.drip();

        self.interrupt.disarm();
        self.transport.close();
        let elapsed = round_to_second(start.elapsed());
        log::info!("Stop drip. Elapsed: {}s", elapsed.as_secs());
        result.map(|()| elapsed)
    }

    fn drip(&mut self) -> Result<(), Error> {
        loop {
            let event = select! {
                recv(self.user_input) -> line => Event::Operator(line.ok()),
                recv(self.interrupt.receiver()) -> _ => Event::Interrupt,
                recv(self.transport.ready()) -> pulse => Event::Ready(pulse.ok()),
            };
            let flow = match event {
                Event::Operator(Some(line)) => self.on_operator(line),
                Event::Operator(None) => return Err(Error::ConsoleClosed),
                Event::Interrupt => self.on_interrupt()?,
                Event::Ready(pulse) => self.on_ready(pulse)?,
            };
            if flow.is_break() {
                return Ok(());
            }
        }
    }

    fn on_operator(&mut self, line: String) -> ControlFlow<()> {
        // Outside hacker mode the line is read only to keep the console moving.
        if self.mode != Mode::Hacker {
            return ControlFlow::Continue(());
        }
        if self.ready {
            self.send(line.into_bytes())
        } else {
            self.hack_queue.push_back(line);
            ControlFlow::Continue(())
        }
    }

    fn on_interrupt(&mut self) -> Result<ControlFlow<()>, Error> {
        self.interrupt.disarm();
        self.mode = Mode::Streaming;

        let choice = menu::control_menu(&self.user_input, &mut self.out, self.list_ports)?;
        if choice != Choice::Abort {
            self.interrupt.arm();
        }
        match choice {
            Choice::Continue => {
                writeln!(self.out, "-- DRIP FILE")?;
                self.feed = Feed::File;
            }
            Choice::Stop => {
                writeln!(self.out, "-- DRIP JOB STOP CODES")?;
                self.feed = Feed::Stop(StopSequence::new(self.stop_gcode));
            }
            Choice::Abort => {
                writeln!(self.out, "-- ABORT")?;
                return Ok(ControlFlow::Break(()));
            }
            Choice::HackerMode => {
                writeln!(self.out, "-- HACKER MODE: Type Gcodes now.")?;
                self.mode = Mode::Hacker;
            }
        }
        self.out.flush()?;
        log::debug!("menu chose {:?}, mode {:?}", choice, self.mode);

        // A pulse consumed before the menu opened would otherwise never be
        // followed by another one.
        if self.ready {
            self.advance()
        } else {
            Ok(ControlFlow::Continue(()))
        }
    }

    fn on_ready(&mut self, pulse: Option<Pulse>) -> Result<ControlFlow<()>, Error> {
        self.ready = true;
        match pulse {
            None => {
                log::info!("serial link closed");
                Ok(ControlFlow::Break(()))
            }
            Some(Err(err)) => {
                log::error!("{}", err);
                Ok(ControlFlow::Break(()))
            }
            Some(Ok(())) => self.advance(),
        }
    }

    /// Sends the next line from the active source, if there is one.
    fn advance(&mut self) -> Result<ControlFlow<()>, Error> {
        if self.mode == Mode::Hacker {
            return Ok(match self.hack_queue.pop_front() {
                Some(line) => self.send(line.into_bytes()),
                None => ControlFlow::Continue(()),
            });
        }
        let next = match &mut self.feed {
            Feed::File => match self.gcode.recv() {
                Ok(line) => Some(line?),
                Err(_) => None,
            },
            Feed::Stop(lines) => lines.next(),
        };
        Ok(match next {
            Some(line) => self.send(line),
            None => ControlFlow::Break(()),
        })
    }

    fn send(&mut self, line: Vec<u8>) -> ControlFlow<()> {
        self.ready = false;
        if self.transport.send(line).is_err() {
            log::error!("serial writer has stopped");
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}

/// Prints the end-of-run summary on the terminal.
pub fn print_elapsed<W: Write>(out: &mut W, elapsed: Duration) -> std::io::Result<()> {
    writeln!(out, "Elapsed: {}s", elapsed.as_secs())
}

fn round_to_second(elapsed: Duration) -> Duration {
    Duration::from_secs((elapsed.as_millis() as u64 + 500) / 1000)
}
