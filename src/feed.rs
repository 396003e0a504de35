//! Sources of outgoing command lines.

use std::io::{self, BufRead};
use std::str::SplitInclusive;
use std::thread;

use crossbeam_channel::{bounded, Receiver};

use crate::codec::LineCodec;

/// One command line read from the gcode file, or the error that ended it.
pub type FileLine = io::Result<Vec<u8>>;

/// Spawns a thread that reads command lines from `reader` and hands them out
/// one at a time. The channel closes at end of input; a read error is
/// delivered as the last item.
///
/// The channel is a rendezvous, so the thread only reads ahead by a single
/// line and the file position is owned by whoever holds the receiver.
pub fn gcode_lines<R>(reader: R) -> io::Result<Receiver<FileLine>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = bounded(0);
    thread::Builder::new()
        .name("gcode-file".into())
        .spawn(move || {
            let mut codec = LineCodec::new(reader);
            loop {
                let item = match codec.read_command() {
                    Ok(Some(line)) => Ok(line),
                    Ok(None) => return,
                    Err(err) => Err(err),
                };
                let failed = item.is_err();
                if tx.send(item).is_err() || failed {
                    return;
                }
            }
        })?;
    Ok(rx)
}

/// A fresh pass over a fixed block of commands, one per line.
///
/// Each call to [`StopSequence::new`] starts again at the first command.
#[derive(Debug, Clone)]
pub struct StopSequence {
    lines: SplitInclusive<'static, char>,
}

impl StopSequence {
    pub fn new(text: &'static str) -> Self {
        Self {
            lines: text.split_inclusive('\n'),
        }
    }
}

impl Iterator for StopSequence {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            let line = line.strip_suffix('\n').unwrap_or(line);
            if !line.is_empty() {
                return Some(line.as_bytes().to_vec());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STOP_GCODE;
    use std::io::{BufReader, Cursor, Read};

    #[test]
    fn file_lines_in_order() {
        let rx = gcode_lines(Cursor::new(b"G28 ; home\n\nG1 X10\n".to_vec())).unwrap();
        let lines: Vec<Vec<u8>> = rx.iter().map(|l| l.unwrap()).collect();
        assert_eq!(lines, [b"G28".to_vec(), b"G1 X10".to_vec()]);
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "nope"))
        }
    }

    #[test]
    fn read_error_is_last_item() {
        let rx = gcode_lines(BufReader::new(Cursor::new(b"G28\n".to_vec()).chain(Broken))).unwrap();
        assert_eq!(rx.recv().unwrap().unwrap(), b"G28");
        let err = rx.recv().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn stop_sequence_restarts_every_time() {
        let expected = ["M107", "M104 S0", "M140 S0", "G1 Z50", "M84 Z E"];
        let mut first = StopSequence::new(STOP_GCODE);
        assert_eq!(first.next().unwrap(), b"M107");

        for _ in 0..3 {
            let lines: Vec<String> = StopSequence::new(STOP_GCODE)
                .map(|l| String::from_utf8(l).unwrap())
                .collect();
            assert_eq!(lines, expected);
        }
        assert_eq!(first.next().unwrap(), b"M104 S0");
    }

    #[test]
    fn stop_sequence_drops_empty_lines() {
        let lines: Vec<Vec<u8>> = StopSequence::new("\nM107\n\nM84").collect();
        assert_eq!(lines, [b"M107".to_vec(), b"M84".to_vec()]);
    }
}
