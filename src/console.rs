//! Operator input: typed lines and the interrupt keystroke.

use std::io::{self, BufRead};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::Error;

/// Pause before re-opening the console after it reported end of input.
const REOPEN_DELAY: Duration = Duration::from_millis(50);

/// Exit status used when a second interrupt arrives while the menu is open.
const INTERRUPTED: i32 = 130;

/// Spawns a thread that forwards every line typed on the console.
///
/// Some consoles report end of input when the interrupt key is pressed, so
/// end of input re-opens the console with `open` instead of ending the
/// stream. Any other read error closes the channel.
///
/// The channel is unbounded so ignored input never stalls the reader.
pub fn spawn_console<F, R>(mut open: F) -> io::Result<Receiver<String>>
where
    F: FnMut() -> R + Send + 'static,
    R: BufRead,
{
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("console".into())
        .spawn(move || loop {
            let mut console = open();
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match console.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        // Stray non-UTF-8 keystrokes are replaced, not fatal.
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end_matches('\n').trim_end_matches('\r');
                        if tx.send(line.to_owned()).is_err() {
                            return;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => {
                        log::error!("console: {}", err);
                        return;
                    }
                }
            }
            log::debug!("console reported end of input, re-opening");
            thread::sleep(REOPEN_DELAY);
        })?;
    Ok(rx)
}

/// Discards lines typed before now.
pub fn flush(input: &Receiver<String>) {
    let stale = input.try_iter().count();
    if stale > 0 {
        log::debug!("discarded {} buffered console lines", stale);
    }
}

/// Delivers interrupt keystrokes to the control loop.
///
/// While armed, an interrupt disarms the handle and is queued for the loop.
/// While disarmed, the process handler exits immediately, so pressing the
/// key twice in a row always gets out.
#[derive(Clone)]
pub struct Interrupt {
    armed: Arc<AtomicBool>,
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Interrupt {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            armed: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    /// Routes the process Ctrl-C handler through this handle.
    pub fn install(&self) -> Result<(), Error> {
        let handle = self.clone();
        ctrlc::set_handler(move || {
            if !handle.raise() {
                process::exit(INTERRUPTED);
            }
        })?;
        Ok(())
    }

    /// Returns `false` if the handle was disarmed and nothing was delivered.
    pub fn raise(&self) -> bool {
        if self.armed.swap(false, Ordering::SeqCst) {
            let _ = self.tx.send(());
            true
        } else {
            false
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}
