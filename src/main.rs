//! Feeds a gcode file to a printer over a serial port, one line per `ok`.
//!
//! Press Ctrl-C for the control menu; press it again while the menu is open
//! to exit at once.

use anyhow::Context;
use dripper::{drip, feed, transport, Config, Dripper, Interrupt, Transport};
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_args(env::args()) {
        Ok(config) => config,
        Err(usage) => {
            println!("{}", usage);
            process::exit(2);
        }
    };

    let (reader, writer) = transport::open(&config.port, config.baud_rate)
        .with_context(|| format!("cannot open serial port {}", config.port))?;
    let gcode = File::open(&config.gcode_path)
        .with_context(|| format!("cannot open {}", config.gcode_path.display()))?;

    let transport = Transport::spawn(BufReader::new(reader), writer, io::stdout(), io::stdout())?;
    let gcode = feed::gcode_lines(BufReader::new(gcode))?;
    let user_input = dripper::console::spawn_console(|| io::stdin().lock())?;
    let interrupt = Interrupt::new();
    interrupt.install()?;

    let elapsed = Dripper::new(gcode, transport, user_input, interrupt, io::stdout()).run()?;
    drip::print_elapsed(&mut io::stdout(), elapsed)?;
    Ok(())
}
