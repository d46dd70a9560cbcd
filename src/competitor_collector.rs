//! Discovery of competitors: every subdirectory holding a `run` entry point is one.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use tracing::{info, instrument, warn};

use crate::competitor::Competitor;

/// Entry point file names, by preference.
pub const ENTRY_POINTS: [&str; 3] = ["run", "run.sh", "run.bat"];

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Competitors found in `directory`, sorted by name. Each is named after its subdirectory.
#[instrument]
pub fn collect_competitors(directory: &Path, verbose: bool) -> anyhow::Result<Vec<Arc<Competitor>>> {
    if !directory.is_dir() {
        bail!("'{}' is not a valid directory", directory.display());
    }

    let mut subdirs = std::fs::read_dir(directory)
        .with_context(|| format!("could not read '{}'", directory.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect::<Vec<_>>();
    subdirs.sort();
    info!(competitor_directories = ?subdirs);

    let longest_name = subdirs
        .iter()
        .filter_map(|path| path.file_name())
        .fold(0, |longest, name| longest.max(name.len()))
        + 3;

    if verbose {
        println!("Collecting competitors...");
    }

    let mut competitors = vec![];
    for subdir in subdirs {
        let Some(name) = subdir.file_name().and_then(|name| name.to_str()).map(str::to_string) else {
            warn!("skipping '{}': name is not valid UTF-8", subdir.display());
            continue;
        };
        if verbose {
            print!("Collecting {name:·<longest_name$} ");
            let _ = std::io::stdout().flush();
        }

        match find_entry_point(&subdir) {
            Ok(entry_point) => {
                competitors.push(Arc::new(Competitor::new(
                    name,
                    entry_point,
                    competitors.len() as u32,
                )));
                if verbose {
                    println!("{GREEN}Ok{RESET}");
                }
            }
            Err(e) => {
                warn!("skipping '{name}': {e:#}");
                if verbose {
                    println!("{RED}{e:#}{RESET}");
                }
            }
        }
    }
    Ok(competitors)
}

fn find_entry_point(dir: &Path) -> anyhow::Result<PathBuf> {
    if !dir.is_dir() {
        bail!("not a directory");
    }
    let Some(path) = ENTRY_POINTS
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
    else {
        bail!("no entry point ({})", ENTRY_POINTS.join(", "));
    };
    path.canonicalize()
        .with_context(|| format!("could not resolve '{}'", path.display()))
}
