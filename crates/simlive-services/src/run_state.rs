//! Run-state machine for the control protocol.
//!
//! ```text
//!            start               pause
//!   Idle ──────────▶ Running ◀──────────▶ Paused
//!    ▲                 │     continue       │
//!    │ reset           │ end / fail         │ end / fail
//!    │                 ▼                    │
//!    └──────────── Ended ◀──────────────────┘
//!                    │ start
//!                    └──────▶ Running
//! ```
//!
//! `end` is accepted from every state. Every change to a session's run
//! state goes through [`transition`].

use simlive_core::protocol::RunState;
use simlive_core::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Continue,
    End,
    /// The stepping task hit an engine failure.
    Fail,
    /// Session state was cleared.
    Reset,
}

impl Command {
    pub fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Pause => "pause",
            Command::Continue => "continue",
            Command::End => "end",
            Command::Fail => "fail",
            Command::Reset => "reset",
        }
    }
}

pub fn transition(state: RunState, command: Command) -> Result<RunState, SessionError> {
    use RunState::*;

    let next = match (command, state) {
        (Command::Start, Idle | Ended) => Running,
        (Command::Pause, Running) => Paused,
        (Command::Continue, Paused) => Running,
        (Command::End, _) => Ended,
        (Command::Fail, Running | Paused) => Ended,
        (Command::Reset, _) => Idle,
        (command, state) => {
            return Err(SessionError::InvalidRunState {
                command: command.name(),
                state,
            })
        }
    };
    Ok(next)
}
