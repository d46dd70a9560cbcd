//! Request/response channel with one competitor process.
//!
//! The process reads requests on stdin and answers on stdout (see [`crate::protocol`]).
//! Each pipe is serviced by its own thread so that a competitor which stops reading, or
//! stops answering, never blocks the referee: responses are awaited with a deadline.

use std::{
    io::{BufRead, BufReader, Read, Write},
    process::{ChildStderr, ChildStdin, ChildStdout},
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread,
    time::Duration,
};

use anyhow::Context;
use tracing::{debug, instrument, trace, warn};

use crate::{
    cgroup_manager::{wait_for_exit, LimitedProcess},
    competitor::Competitor,
    configuration::Configuration,
    constraints::{Constraints, Timeouts},
    game::{Action, Match},
    history::Career,
    protocol::{check_response, decode_action, encode_parameter, frame, Command, CommError},
    set_runner::MAX_PARTICIPANTS,
};

/// What the referee may ask of a competitor.
///
/// Every failure is reported as a [`CommError`]; the caller decides what it costs the
/// competitor.
pub trait CompetitorChannel {
    /// Sends the careers of every participant of the set and waits for an acknowledgement.
    fn notify_careers(&mut self, careers: &[Career]) -> Result<(), CommError>;

    /// Asks for the next action. `game` must already be masked for this competitor.
    fn request_action(&mut self, game: &Match) -> Result<Action, CommError>;

    /// Sends the unmasked final state of a match and waits for an acknowledgement.
    fn notify_match_end(&mut self, game: &Match) -> Result<(), CommError>;

    /// Asks the competitor to exit, and makes sure it does.
    fn terminate(&mut self);

    /// Everything the competitor wrote on stderr. Only complete after [`terminate`].
    ///
    /// [`terminate`]: CompetitorChannel::terminate
    fn drain_stderr(&mut self) -> String;
}

/// Starts competitors.
pub trait ChannelLauncher {
    type Channel: CompetitorChannel;

    fn launch(&mut self, competitor: &Competitor) -> anyhow::Result<Self::Channel>;
}

/// Channel to a child process.
///
/// The child is killed on drop if [`CompetitorChannel::terminate`] was not called.
#[derive(Debug)]
pub struct ProcessChannel {
    name: String,
    process: LimitedProcess,
    requests: Option<Sender<String>>,
    responses: Receiver<String>,
    stderr: Receiver<String>,
    timeouts: Timeouts,
    desynchronized: bool,
}

impl ProcessChannel {
    pub fn new(
        name: impl Into<String>,
        mut process: LimitedProcess,
        timeouts: Timeouts,
    ) -> anyhow::Result<ProcessChannel> {
        let name = name.into();
        let stdin = process.child.stdin.take().context("stdin is not piped")?;
        let stdout = process.child.stdout.take().context("stdout is not piped")?;
        let stderr = process.child.stderr.take().context("stderr is not piped")?;

        Ok(ProcessChannel {
            requests: Some(spawn_writer(&name, stdin)?),
            responses: spawn_reader(&name, stdout)?,
            stderr: spawn_stderr_collector(&name, stderr)?,
            name,
            process,
            timeouts,
            desynchronized: false,
        })
    }

    fn call(
        &mut self,
        command: Command,
        parameter: String,
        timeout: Duration,
    ) -> Result<String, CommError> {
        if self.desynchronized {
            return Err(CommError::Desynchronized);
        }
        if let Ok(Some(status)) = self.process.child.try_wait() {
            return Err(CommError::Exited(status));
        }

        let requests = self.requests.as_ref().ok_or(CommError::Closed)?;
        trace!(competitor = %self.name, %command, "request");
        requests
            .send(frame(command, &parameter))
            .map_err(|_| CommError::Closed)?;

        match self.responses.recv_timeout(timeout) {
            Ok(line) => {
                trace!(competitor = %self.name, response = line.trim_end(), "response");
                Ok(line)
            }
            Err(RecvTimeoutError::Timeout) => {
                // a late answer would be taken for the answer to the next request
                self.desynchronized = true;
                Err(CommError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                if wait_for_exit(&mut self.process.child, Duration::from_millis(50)) {
                    if let Ok(Some(status)) = self.process.child.try_wait() {
                        return Err(CommError::Exited(status));
                    }
                }
                Err(CommError::Disconnected)
            }
        }
    }
}

impl CompetitorChannel for ProcessChannel {
    #[instrument(skip_all, fields(competitor = %self.name))]
    fn notify_careers(&mut self, careers: &[Career]) -> Result<(), CommError> {
        let parameter = encode_parameter(careers)?;
        let response = self.call(Command::CheckOtherPrograms, parameter, self.timeouts.briefing)?;
        check_response(&response)?;
        Ok(())
    }

    fn request_action(&mut self, game: &Match) -> Result<Action, CommError> {
        let parameter = encode_parameter(game)?;
        let response = self.call(Command::Action, parameter, self.timeouts.action)?;
        decode_action(&response)
    }

    fn notify_match_end(&mut self, game: &Match) -> Result<(), CommError> {
        let parameter = encode_parameter(game)?;
        let response = self.call(Command::GameEnd, parameter, self.timeouts.game_end)?;
        check_response(&response)?;
        Ok(())
    }

    #[instrument(skip_all, fields(competitor = %self.name))]
    fn terminate(&mut self) {
        let Some(requests) = self.requests.take() else {
            return;
        };
        let _ = requests.send(frame(Command::Terminate, ""));
        // closes stdin once the writer is done
        drop(requests);

        let grace = self.timeouts.shutdown_grace;
        if !wait_for_exit(&mut self.process.child, grace) {
            debug!("still running after {grace:?}, killing it");
        }
        // also reaps whatever the competitor started in its cgroup
        if let Err(e) = self.process.try_kill(grace.max(Duration::from_millis(100))) {
            warn!("could not kill competitor: {e:#}");
        }
    }

    fn drain_stderr(&mut self) -> String {
        self.stderr
            .recv_timeout(self.timeouts.shutdown_grace)
            .unwrap_or_default()
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn spawn_writer(name: &str, mut stdin: ChildStdin) -> anyhow::Result<Sender<String>> {
    let (tx, rx) = mpsc::channel::<String>();
    thread::Builder::new()
        .name(format!("{name}-stdin"))
        .spawn(move || {
            for message in rx {
                if stdin
                    .write_all(message.as_bytes())
                    .and_then(|_| stdin.flush())
                    .is_err()
                {
                    break;
                }
            }
        })
        .context("could not spawn stdin writer")?;
    Ok(tx)
}

fn spawn_reader(name: &str, stdout: ChildStdout) -> anyhow::Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("{name}-stdout"))
        .spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                }
            }
        })
        .context("could not spawn stdout reader")?;
    Ok(rx)
}

fn spawn_stderr_collector(name: &str, mut stderr: ChildStderr) -> anyhow::Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("{name}-stderr"))
        .spawn(move || {
            let mut bytes = Vec::new();
            let _ = stderr.read_to_end(&mut bytes);
            let _ = tx.send(String::from_utf8_lossy(&bytes).into_owned());
        })
        .context("could not spawn stderr collector")?;
    Ok(rx)
}

/// Launches competitors as child processes, inside a cgroup when the configuration asks for it.
#[derive(Debug)]
pub struct ProcessLauncher {
    config: Configuration,
    constraints: Constraints,
    next_slot: usize,
}

impl ProcessLauncher {
    pub fn new(config: Configuration, constraints: Constraints) -> ProcessLauncher {
        ProcessLauncher {
            config,
            constraints,
            next_slot: 0,
        }
    }
}

impl ChannelLauncher for ProcessLauncher {
    type Channel = ProcessChannel;

    #[instrument(skip_all, fields(competitor = %competitor.name))]
    fn launch(&mut self, competitor: &Competitor) -> anyhow::Result<ProcessChannel> {
        let cpus = self.constraints.cpus_for(self.next_slot);
        self.next_slot = (self.next_slot + 1) % MAX_PARTICIPANTS;

        let process = if self.config.contain {
            match LimitedProcess::launch(
                &competitor.path_to_exe,
                &competitor.args,
                self.constraints.competitor_ram() as i64,
                &cpus,
            ) {
                Ok(process) => process,
                Err(e) if self.config.allow_uncontained => {
                    warn!("running uncontained: {e:#}");
                    LimitedProcess::launch_without_container(&competitor.path_to_exe, &competitor.args)?
                }
                Err(e) => {
                    return Err(e.context(
                        "could not contain competitor (cgroups v2 may be unavailable, see LIARS_DICE_ALLOW_UNCONTAINED)",
                    ))
                }
            }
        } else {
            LimitedProcess::launch_without_container(&competitor.path_to_exe, &competitor.args)?
        };
        debug!(pid = process.child.id(), %cpus, contained = process.is_contained(), "launched");

        ProcessChannel::new(&competitor.name, process, self.constraints.timeouts())
    }
}
