use std::{env, path::PathBuf, process::ExitCode};

use anyhow::Context;
use liars_dice::{prelude::*, report::format_leaderboard};

const USAGE: &str = "usage: liars-dice <min-set-count-per-competitor> [competitors-directory]";

fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let Some(min_set_count) = args.next() else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    let directory = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    if args.next().is_some() {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    }

    match run(&min_set_count, directory) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(min_set_count: &str, directory: PathBuf) -> anyhow::Result<()> {
    let min_set_count = min_set_count
        .parse::<usize>()
        .with_context(|| format!("invalid set count '{min_set_count}'\n{USAGE}"))?;
    let config = Configuration::from_env();
    let constraints = ConstraintsBuilder::from_env().build()?;

    let standings = Dealer::new(config, constraints).evaluate(directory, min_set_count)?;
    print!("{}", format_leaderboard(&standings));
    Ok(())
}
