//! Line protocol spoken with competitor processes.
//!
//! Each call writes two lines to the competitor's stdin, a command name and a single-line
//! JSON parameter, then waits for one line on its stdout:
//!
//! | command | parameter | response |
//! |---|---|---|
//! | `check_other_programs` | `[Career, ..]` | `OK` |
//! | `action` | masked `Match` | `Action` |
//! | `game_end` | `Match` | `OK` |
//! | `terminate` | empty | none, the process exits |

use std::{fmt::Display, process::ExitStatus, time::Duration};

use serde::Serialize;
use thiserror::Error;

use crate::game::Action;

/// Commands understood by competitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    CheckOtherPrograms,
    Action,
    GameEnd,
    Terminate,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::CheckOtherPrograms => "check_other_programs",
            Command::Action => "action",
            Command::GameEnd => "game_end",
            Command::Terminate => "terminate",
        }
    }

    pub fn parse(s: &str) -> Option<Command> {
        match s.trim() {
            "check_other_programs" => Some(Command::CheckOtherPrograms),
            "action" => Some(Command::Action),
            "game_end" => Some(Command::GameEnd),
            "terminate" => Some(Command::Terminate),
            _ => None,
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement sent back for notifications.
pub const ACKNOWLEDGEMENT: &str = "OK";

/// Why a call to a competitor failed.
///
/// Callers treat every variant the same way: as a communication failure of that competitor.
#[derive(Debug, Error)]
pub enum CommError {
    #[error("process exited ({0})")]
    Exited(ExitStatus),
    #[error("process closed its output")]
    Disconnected,
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("empty response")]
    EmptyResponse,
    #[error("malformed response '{response}': {source}")]
    Malformed {
        response: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode parameter: {0}")]
    Encoding(#[source] serde_json::Error),
    #[error("channel is out of sync after an earlier timeout")]
    Desynchronized,
    #[error("channel is closed")]
    Closed,
}

/// Encodes `value` as a single line of JSON.
pub fn encode_parameter<T: Serialize + ?Sized>(value: &T) -> Result<String, CommError> {
    // compact output never contains a raw newline
    serde_json::to_string(value).map_err(CommError::Encoding)
}

/// Frames one request: command line then parameter line.
pub fn frame(command: Command, parameter: &str) -> String {
    format!("{command}\n{parameter}\n")
}

/// Strips the line terminator and rejects empty responses.
pub fn check_response(line: &str) -> Result<&str, CommError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(CommError::EmptyResponse);
    }
    Ok(line)
}

pub fn decode_action(line: &str) -> Result<Action, CommError> {
    let line = check_response(line)?;
    serde_json::from_str(line).map_err(|source| CommError::Malformed {
        response: line.to_string(),
        source,
    })
}
