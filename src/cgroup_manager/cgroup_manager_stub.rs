use std::{path::Path, process::Child, time::Duration};

use anyhow::bail;
use tracing::warn;

use super::{create_process, kill_child};

#[derive(Debug)]
pub struct LimitedProcess {
    pub child: Child,
    cleaned_up: bool,
}

impl LimitedProcess {
    pub fn launch(
        _command: &Path,
        _args: &[String],
        _max_memory: i64,
        _cpus: &str,
    ) -> anyhow::Result<LimitedProcess> {
        bail!("cgroups only available on linux")
    }

    pub fn launch_without_container(
        command: &Path,
        args: &[String],
    ) -> anyhow::Result<LimitedProcess> {
        Ok(LimitedProcess {
            child: create_process(command, args)?,
            cleaned_up: false,
        })
    }

    pub fn is_contained(&self) -> bool {
        false
    }

    pub fn try_kill(&mut self, _max_duration: Duration) -> anyhow::Result<()> {
        kill_child(&mut self.child)?;
        self.cleaned_up = true;
        Ok(())
    }
}

impl Drop for LimitedProcess {
    fn drop(&mut self) {
        if !self.cleaned_up {
            if let Err(e) = self.try_kill(Duration::from_millis(10)) {
                warn!("could not kill process {} on drop: {e:#}", self.child.id());
            }
        }
    }
}
