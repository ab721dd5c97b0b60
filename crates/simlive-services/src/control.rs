//! Control protocol — start / pause / continue / end for one session.
//!
//! Control operations serialize on the session's stepper slot, so at most
//! one stepping task exists per session. A `start` while a run is live
//! cancels and awaits the old task before spawning its replacement.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, info, warn};

use simlive_core::protocol::{ControlMessage, RunState};
use simlive_core::SessionError;

use crate::run_state::Command;
use crate::scheduler;
use crate::session::Session;

impl Session {
    /// Begin a live run from simulated time `start`. `frequency` and
    /// `step_size` update the cadence first when given.
    pub async fn start(
        self: &Arc<Self>,
        start: f64,
        frequency: Option<f64>,
        step_size: Option<f64>,
    ) -> Result<(), SessionError> {
        if !start.is_finite() {
            return Err(SessionError::InvalidParameter(format!(
                "start time must be finite, got {start}"
            )));
        }

        let mut stepper = self.stepper.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::UnknownSession(self.id().to_string()));
        }

        // Validate before disturbing a live run.
        let min_step_frequency = self.settings.min_step_frequency;
        let params = self
            .core
            .with(move |core| {
                core.engine_mut()?;
                let mut params = core.params;
                if let Some(f) = frequency {
                    params.step_frequency = f;
                }
                if let Some(dt) = step_size {
                    params.step_size = dt;
                }
                params.validate(min_step_frequency)
            })
            .await?;

        if let Some(task) = stepper.take() {
            debug!(session = %self.id(), state = %self.run_state(), "restarting live run");
            self.apply(Command::End)?;
            join(self, task).await;
        }

        self.core
            .with(move |core| {
                core.engine_mut()?.reset()?;
                core.sim_clock = start;
                core.params = params;
                Ok(())
            })
            .await?;

        self.apply(Command::Start)?;
        *stepper = Some(scheduler::spawn(self.clone(), params.period()));
        info!(
            session = %self.id(),
            start,
            frequency = params.step_frequency,
            step_size = params.step_size,
            "run started"
        );
        Ok(())
    }

    pub async fn pause(&self) -> Result<RunState, SessionError> {
        let _stepper = self.stepper.lock().await;
        self.apply(Command::Pause)
    }

    /// `continue`.
    pub async fn resume(&self) -> Result<RunState, SessionError> {
        let _stepper = self.stepper.lock().await;
        self.apply(Command::Continue)
    }

    /// Stop the live run. Returns once the stepping task has exited and
    /// released the gate.
    pub async fn end(&self) -> RunState {
        let mut stepper = self.stepper.lock().await;
        self.stop(&mut stepper).await
    }

    /// End any live run, drop the model and handles, return to Idle.
    pub async fn reset(&self) -> Result<(), SessionError> {
        let mut stepper = self.stepper.lock().await;
        self.stop(&mut stepper).await;
        self.clear().await?;
        self.apply(Command::Reset)?;
        info!(session = %self.id(), "session reset");
        Ok(())
    }

    /// Final teardown once the session has left the store: no further
    /// `start` is accepted, the task is stopped, then the handles go.
    pub(crate) async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let mut stepper = self.stepper.lock().await;
        self.stop(&mut stepper).await;
        if let Err(e) = self.clear().await {
            warn!(session = %self.id(), error = %e, "handles not released on shutdown");
        }
    }

    /// Drop the handles and go back to the configured defaults.
    async fn clear(&self) -> Result<(), SessionError> {
        let settings = self.settings.clone();
        self.core
            .with(move |core| {
                core.clear(&settings);
                Ok(())
            })
            .await
    }

    /// Dispatch one control frame. Transitions that are not valid from the
    /// current state are no-ops and report the unchanged state.
    pub async fn handle(self: &Arc<Self>, message: ControlMessage) -> Result<RunState, SessionError> {
        let result = match message {
            ControlMessage::Start {
                start,
                frequency,
                step_size,
            } => self
                .start(start, frequency, step_size)
                .await
                .map(|()| RunState::Running),
            ControlMessage::Pause => self.pause().await,
            ControlMessage::Continue => self.resume().await,
            ControlMessage::End => Ok(self.end().await),
        };
        match result {
            Err(SessionError::InvalidRunState { command, state }) => {
                debug!(session = %self.id(), command, %state, "control message ignored");
                Ok(state)
            }
            other => other,
        }
    }

    async fn stop(&self, stepper: &mut Option<tokio::task::JoinHandle<()>>) -> RunState {
        let state = self.apply(Command::End).unwrap_or(RunState::Ended);
        if let Some(task) = stepper.take() {
            join(self, task).await;
        }
        state
    }
}

async fn join(session: &Session, task: tokio::task::JoinHandle<()>) {
    if let Err(e) = task.await {
        warn!(session = %session.id(), error = %e, "stepping task did not exit cleanly");
    }
}
