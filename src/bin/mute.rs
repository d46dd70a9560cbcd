//! Acknowledges its briefing, then never answers again. Exits on `terminate`.

use std::io::{self, BufRead, Write};

use liars_dice::protocol::{Command, ACKNOWLEDGEMENT};

fn main() -> anyhow::Result<()> {
    let mut lines = io::stdin().lock().lines();
    let mut stdout = io::stdout().lock();
    while let Some(command) = lines.next() {
        let command = command?;
        let _parameter = lines.next().transpose()?;
        match Command::parse(&command) {
            Some(Command::CheckOtherPrograms) => {
                writeln!(stdout, "{ACKNOWLEDGEMENT}")?;
                stdout.flush()?;
            }
            Some(Command::Terminate) => break,
            _ => eprintln!("ignoring {command}"),
        }
    }
    Ok(())
}
