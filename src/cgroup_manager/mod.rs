//! Spawning competitor processes, optionally inside a Linux cgroup v2.
//!
//! Every process is spawned with piped stdin, stdout and stderr; the caller takes the
//! pipes out of [`LimitedProcess::child`].

#[cfg(target_os = "linux")]
mod cgroup_manager_linux;

#[cfg(target_os = "linux")]
pub use cgroup_manager_linux::*;

#[cfg(not(target_os = "linux"))]
mod cgroup_manager_stub;

#[cfg(not(target_os = "linux"))]
pub use cgroup_manager_stub::*;

use std::{
    path::Path,
    process::{Child, Command, Stdio},
    time::{Duration, Instant},
};

use anyhow::Context;

fn create_process(command: &Path, args: &[String]) -> anyhow::Result<Child> {
    Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("could not launch '{}'", command.display()))
}

/// Polls `child` until it exits or `max_duration` elapses. Returns true if it exited.
pub fn wait_for_exit(child: &mut Child, max_duration: Duration) -> bool {
    let deadline = Instant::now() + max_duration;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(10).min(max_duration / 10));
            }
            _ => return false,
        }
    }
}

fn kill_child(child: &mut Child) -> anyhow::Result<()> {
    if let Ok(Some(_)) = child.try_wait() {
        return Ok(());
    }
    child.kill().context("could not kill process")?;
    child.wait().context("could not reap process")?;
    Ok(())
}
