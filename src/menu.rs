use std::io::Write;

use crossbeam_channel::Receiver;
use serialport::{SerialPortInfo, SerialPortType};

use crate::console;
use crate::Error;

/// Source of the port list shown by the `l` option.
pub type PortLister = fn() -> serialport::Result<Vec<SerialPortInfo>>;

const PROMPT: &str = "-- CTRL MENU
c) continue    (drip GCode file)
s) stop job    (drip stop GCode)
a) hard abort  (exits program)
h) hacker mode (enter GCodes on keyboard)
l) list ports  (list COM ports)
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Continue,
    Stop,
    Abort,
    HackerMode,
}

/// Runs the control menu until the operator picks an option. Anything typed
/// before the menu opened is discarded first.
pub fn control_menu<W: Write>(
    input: &Receiver<String>,
    out: &mut W,
    list_ports: PortLister,
) -> Result<Choice, Error> {
    console::flush(input);
    choose(input, out, list_ports)
}

fn choose<W: Write>(
    input: &Receiver<String>,
    out: &mut W,
    list_ports: PortLister,
) -> Result<Choice, Error> {
    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;
        let answer = input.recv().map_err(|_| Error::ConsoleClosed)?;
        match answer.as_str() {
            "c" => return Ok(Choice::Continue),
            "s" => return Ok(Choice::Stop),
            "a" => return Ok(Choice::Abort),
            "h" => return Ok(Choice::HackerMode),
            "l" => print_ports(out, list_ports)?,
            _ => writeln!(out, "invalid entry: {:?}", answer)?,
        }
    }
}

fn print_ports<W: Write>(out: &mut W, list_ports: PortLister) -> Result<(), Error> {
    let ports = list_ports().unwrap_or_else(|err| {
        log::warn!("cannot list ports: {}", err);
        Vec::new()
    });
    if ports.is_empty() {
        writeln!(out, "(none)")?;
    }
    for port in ports {
        let kind = match port.port_type {
            SerialPortType::UsbPort(usb) => format!(
                "usb {:04x}:{:04x} {}",
                usb.vid,
                usb.pid,
                usb.product.unwrap_or_default()
            ),
            SerialPortType::PciPort => "pci".to_owned(),
            SerialPortType::BluetoothPort => "bluetooth".to_owned(),
            SerialPortType::Unknown => "unknown".to_owned(),
        };
        writeln!(out, "{}\t{}", port.port_name, kind.trim_end())?;
    }
    Ok(())
}
