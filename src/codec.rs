use std::io::{self, BufRead, ErrorKind, Write};

use thiserror::Error;

/// Marker line the device sends once it has finished with a command.
pub const ACK: &str = "ok";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReadReplyError {
    #[error("io error")]
    Io(#[from] io::Error),

    #[error("serial port closed before the reply was acknowledged")]
    Closed,
}

/// Response lines collected between two acknowledgements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    lines: Vec<String>,
}

impl Reply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    fn push(&mut self, line: String) {
        self.lines.push(line);
    }
}

/// Line framing shared by command files, the serial reply stream, and the
/// serial command stream.
pub struct LineCodec<T> {
    inner: T,
    buf: Vec<u8>,
}

impl<T> LineCodec<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }
}

impl<T> LineCodec<T>
where
    T: BufRead,
{
    /// Reads one physical line into the internal buffer, including its
    /// terminator if there was one. Returns `false` at end of input.
    ///
    /// Serial ports report an idle line as a timeout; those are retried, and
    /// whatever part of the line already arrived stays in the buffer.
    fn fill_line(&mut self) -> io::Result<bool> {
        self.buf.clear();
        loop {
            match self.inner.read_until(b'\n', &mut self.buf) {
                Ok(0) => return Ok(!self.buf.is_empty()),
                Ok(_) => return Ok(true),
                Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
                Err(err) => return Err(err),
            }
        }
    }

    /// Returns the next command line, with any `;` comment removed and
    /// surrounding whitespace trimmed. Blank lines are skipped. `None` means
    /// the input is exhausted.
    pub fn read_command(&mut self) -> io::Result<Option<Vec<u8>>> {
        while self.fill_line()? {
            let mut line = self.buf.as_slice();
            if let Some(i) = line.iter().position(|&b| b == b';') {
                line = &line[..i];
            }
            let line = line.trim_ascii();
            if !line.is_empty() {
                return Ok(Some(line.to_vec()));
            }
        }
        Ok(None)
    }

    /// Collects response lines into `reply` until the device acknowledges
    /// with a bare `ok`. Empty lines are dropped.
    ///
    /// On error, `reply` holds whatever arrived before the failure.
    pub fn read_reply(&mut self, reply: &mut Reply) -> Result<(), ReadReplyError> {
        while self.fill_line()? {
            let line = String::from_utf8_lossy(&self.buf);
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            match line {
                ACK => return Ok(()),
                "" => {}
                _ => reply.push(line.to_owned()),
            }
        }
        Err(ReadReplyError::Closed)
    }
}

impl<T> LineCodec<T>
where
    T: Write,
{
    pub fn write_command(&mut self, line: &[u8]) -> io::Result<()> {
        self.inner.write_all(line)?;
        self.inner.write_all(b"\n")?;
        self.inner.flush()
    }
}
