use std::{
    path::Path,
    process::Child,
    sync::atomic::{AtomicU32, Ordering},
    time::{Duration, Instant},
};

use anyhow::Context;
use cgroups_rs::Cgroup;
use tracing::warn;

use super::{create_process, kill_child};

pub fn get_current_user_id() -> anyhow::Result<String> {
    let output = std::process::Command::new("id")
        .arg("-u")
        .output()
        .context("Could not launch 'id -u'")?;
    let untrimmed_id = std::str::from_utf8(&output.stdout).context("id is not a valid string")?;
    Ok(untrimmed_id.trim().to_string())
}

pub fn get_cgroup_path(user_id: &str, group_name: &str) -> String {
    format!("user.slice/user-{user_id}.slice/user@{user_id}.service/{group_name}")
}

/// Create a cgroup at `path`.
///
/// * `max_memory` - Maximum available memory in Bytes. Non-positive means no restriction.
/// * `max_pids` - Maximum number of PIDS inside the cgroup at any time. Non-positive means no restriction.
/// * `cpus` - which cpus the members can run one ("1-5,7", "1,3,4", ...). Empty string means no restriction.
pub fn create_cgroup(
    path: &str,
    max_memory: i64,
    max_pids: i64,
    cpus: &str,
) -> anyhow::Result<Cgroup> {
    let mut builder = cgroups_rs::cgroup_builder::CgroupBuilder::new(path);
    if max_memory > 0 {
        builder = builder.memory().memory_hard_limit(max_memory).done();
    }
    if max_pids > 0 {
        builder = builder
            .pid()
            .maximum_number_of_processes(cgroups_rs::MaxValue::Value(max_pids))
            .done();
    }
    if !cpus.is_empty() {
        builder = builder.cpu().cpus(cpus.to_string()).done();
    }
    builder
        .build(cgroups_rs::hierarchies::auto())
        .context("could not create cgroup")
}

fn wait_for_process_cleanup(cgroup: &Cgroup, pid: u64, max_duration: Duration) -> bool {
    let deadline = Instant::now() + max_duration;
    while cgroup.tasks().iter().any(|cpid| cpid.pid == pid) {
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10).min(max_duration / 10));
    }
    true
}

/// A competitor process, possibly confined to its own cgroup.
///
/// The process (and the cgroup) is cleaned up on drop if [`LimitedProcess::try_kill`]
/// was not called.
#[derive(Debug)]
pub struct LimitedProcess {
    pub child: Child,
    cgroup: Option<Cgroup>,
    cleaned_up: bool,
}

impl LimitedProcess {
    pub fn launch(
        command: &Path,
        args: &[String],
        max_memory: i64,
        cpus: &str,
    ) -> anyhow::Result<LimitedProcess> {
        static COUNTER: AtomicU32 = AtomicU32::new(1);
        let user_id = get_current_user_id().context("could not get user id")?;
        let group_name = format!(
            "LIARS_DICE_{}_{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let path = get_cgroup_path(&user_id, &group_name);
        let group = create_cgroup(&path, max_memory, 100, cpus)?;

        let mut child = match create_process(command, args) {
            Ok(child) => child,
            Err(e) => {
                let _ = group.delete();
                return Err(e);
            }
        };
        let pid = child.id() as u64;
        if let Err(e) = group.add_task_by_tgid(cgroups_rs::CgroupPid { pid }) {
            let _ = kill_child(&mut child);
            let _ = group.delete();
            return Err(e).context("could not add process to cgroup");
        }

        Ok(LimitedProcess {
            child,
            cgroup: Some(group),
            cleaned_up: false,
        })
    }

    pub fn launch_without_container(
        command: &Path,
        args: &[String],
    ) -> anyhow::Result<LimitedProcess> {
        Ok(LimitedProcess {
            child: create_process(command, args)?,
            cgroup: None,
            cleaned_up: false,
        })
    }

    pub fn is_contained(&self) -> bool {
        self.cgroup.is_some()
    }

    /// Kills the process (every process of its cgroup when contained).
    pub fn try_kill(&mut self, max_duration: Duration) -> anyhow::Result<()> {
        match &self.cgroup {
            Some(cgroup) => {
                cgroup.kill().context("could not kill cgroup")?;
                if !wait_for_process_cleanup(cgroup, self.child.id() as u64, max_duration) {
                    anyhow::bail!("process cleanup timed out");
                }
                let _ = self.child.wait();
                self.cleaned_up = true;
                if let Err(e) = cgroup.delete() {
                    warn!("Failed to remove cgroup. If this happens a lot, it may slow down the computer. {e}");
                }
                Ok(())
            }
            None => {
                kill_child(&mut self.child)?;
                self.cleaned_up = true;
                Ok(())
            }
        }
    }
}

impl Drop for LimitedProcess {
    fn drop(&mut self) {
        if !self.cleaned_up {
            if let Err(e) = self.try_kill(Duration::from_millis(100)) {
                warn!("could not kill process {} on drop: {e:#}", self.child.id());
            }
        }
    }
}
