//! In-process competitors for unit tests.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use anyhow::anyhow;

use crate::{
    channel::{ChannelLauncher, CompetitorChannel},
    competitor::Competitor,
    game::{Action, Match},
    history::Career,
    protocol::CommError,
    strategy::{AlwaysChallenge, MinimumRaise, Strategy},
};

type Policy = Box<dyn FnMut(&Match) -> Result<Action, CommError>>;

pub(crate) struct ScriptedChannel {
    policy: Policy,
    fail_briefing: bool,
    fail_game_end: bool,
    briefings: Option<Rc<RefCell<Vec<Vec<Career>>>>>,
    terminated: bool,
    stderr: String,
}

impl ScriptedChannel {
    pub(crate) fn new(
        policy: impl FnMut(&Match) -> Result<Action, CommError> + 'static,
    ) -> ScriptedChannel {
        ScriptedChannel {
            policy: Box::new(policy),
            fail_briefing: false,
            fail_game_end: false,
            briefings: None,
            terminated: false,
            stderr: String::new(),
        }
    }

    pub(crate) fn playing(mut strategy: impl Strategy + 'static) -> ScriptedChannel {
        ScriptedChannel::new(move |game| Ok(strategy.action(game)))
    }

    pub(crate) fn challenger() -> ScriptedChannel {
        ScriptedChannel::playing(AlwaysChallenge)
    }

    pub(crate) fn climber() -> ScriptedChannel {
        ScriptedChannel::playing(MinimumRaise)
    }

    pub(crate) fn failing_briefing(mut self) -> ScriptedChannel {
        self.fail_briefing = true;
        self
    }

    pub(crate) fn failing_game_end(mut self) -> ScriptedChannel {
        self.fail_game_end = true;
        self
    }

    /// Keeps a copy of every briefing received.
    pub(crate) fn recording_briefings(
        mut self,
        briefings: Rc<RefCell<Vec<Vec<Career>>>>,
    ) -> ScriptedChannel {
        self.briefings = Some(briefings);
        self
    }

    /// Returned by `drain_stderr`, once terminated.
    pub(crate) fn with_stderr(mut self, stderr: &str) -> ScriptedChannel {
        self.stderr = stderr.to_string();
        self
    }
}

impl CompetitorChannel for ScriptedChannel {
    fn notify_careers(&mut self, careers: &[Career]) -> Result<(), CommError> {
        if let Some(briefings) = &self.briefings {
            briefings.borrow_mut().push(careers.to_vec());
        }
        if self.fail_briefing {
            return Err(CommError::EmptyResponse);
        }
        Ok(())
    }

    fn request_action(&mut self, game: &Match) -> Result<Action, CommError> {
        assert!(!self.terminated, "request after terminate");
        (self.policy)(game)
    }

    fn notify_match_end(&mut self, game: &Match) -> Result<(), CommError> {
        // the final state is sent unmasked
        assert!(game.seats.iter().flat_map(|seat| &seat.faces).all(|&face| face != 0));
        if self.fail_game_end {
            return Err(CommError::Disconnected);
        }
        Ok(())
    }

    fn terminate(&mut self) {
        self.terminated = true;
    }

    fn drain_stderr(&mut self) -> String {
        if self.terminated {
            std::mem::take(&mut self.stderr)
        } else {
            String::new()
        }
    }
}

/// Builds a fresh channel for each launch of a known competitor name.
#[derive(Default)]
pub(crate) struct ScriptedLauncher {
    factories: HashMap<String, Box<dyn FnMut() -> ScriptedChannel>>,
    pub(crate) launched: Vec<String>,
}

impl ScriptedLauncher {
    pub(crate) fn new() -> ScriptedLauncher {
        ScriptedLauncher::default()
    }

    pub(crate) fn with(
        mut self,
        name: &str,
        factory: impl FnMut() -> ScriptedChannel + 'static,
    ) -> ScriptedLauncher {
        self.factories.insert(name.to_string(), Box::new(factory));
        self
    }
}

impl ChannelLauncher for ScriptedLauncher {
    type Channel = ScriptedChannel;

    fn launch(&mut self, competitor: &Competitor) -> anyhow::Result<ScriptedChannel> {
        let factory = self
            .factories
            .get_mut(&competitor.name)
            .ok_or_else(|| anyhow!("no executable for {}", competitor.name))?;
        self.launched.push(competitor.name.clone());
        Ok(factory())
    }
}

pub(crate) fn competitors(names: &[&str]) -> Vec<std::sync::Arc<Competitor>> {
    names
        .iter()
        .enumerate()
        .map(|(id, name)| std::sync::Arc::new(Competitor::new(*name, format!("/nowhere/{name}"), id as u32)))
        .collect()
}
