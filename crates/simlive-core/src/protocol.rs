//! Live-connection wire types — control frames in, push frames out.
//!
//! Both directions are JSON text frames. Control frames are discriminated by
//! `type`, push frames by `event`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::Values;

// ── Run state ─────────────────────────────────────────────────────────────────

/// Control-protocol state of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
    Ended,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Ended => "ended",
        };
        f.write_str(name)
    }
}

// ── Control frames (client → server) ──────────────────────────────────────────

/// A control message received over the live connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Start {
        /// Simulated time the run starts from.
        #[serde(default, alias = "startTime")]
        start: f64,
        /// Optional wall-clock seconds between steps, applied before the run.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frequency: Option<f64>,
        /// Optional simulated-time delta per step, applied before the run.
        #[serde(
            default,
            rename = "stepSize",
            alias = "step_size",
            skip_serializing_if = "Option::is_none"
        )]
        step_size: Option<f64>,
    },
    Pause,
    Continue,
    End,
}

// ── Push frames (server → client) ─────────────────────────────────────────────

/// Event pushed to the owner of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PushEvent {
    /// One completed step.
    Response {
        /// Per-session publication counter; gaps mean coalesced ticks.
        seq: u64,
        /// Simulated time the values were computed at.
        time: f64,
        data: Values,
    },
    /// A failure. Stepping failures are delivered once, then the run ends.
    Error { kind: String, message: String },
}
