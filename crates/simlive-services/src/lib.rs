//! simlive-services — per-session state, the mutation gate, the run-state
//! machine, the stepping scheduler, and the result channel.

pub mod control;
pub mod gate;
pub mod result_channel;
pub mod run_state;
pub mod scheduler;
pub mod session;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use gate::MutationGate;
pub use result_channel::{ResultChannel, ResultReceiver};
pub use run_state::Command;
pub use session::{
    Engines, Session, SessionCore, SessionId, SessionSettings, SessionStore, SessionSummary,
    SimParams,
};
pub use workspace::{ModelView, RunView, SimParam};
