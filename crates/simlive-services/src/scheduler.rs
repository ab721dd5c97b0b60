//! Stepping scheduler — the background task that drives one session's
//! live run.
//!
//! Per tick: sleep until the deadline, take the gate, step if the session
//! is Running, release, publish. The run state is checked again inside the
//! gate, so once `end` has been observed no further step happens. The
//! cadence is re-read on every tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use simlive_core::engine::Values;
use simlive_core::protocol::RunState;
use simlive_core::SessionError;

use crate::run_state::Command;
use crate::session::Session;

enum Tick {
    Stepped {
        period: Duration,
        time: f64,
        values: Values,
    },
    Skipped(Duration),
    Failed(SessionError),
}

/// Spawn the stepping task. The first tick fires one `period` from now.
pub(crate) fn spawn(session: Arc<Session>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(run(session, period))
}

async fn run(session: Arc<Session>, period: Duration) {
    let mut state_rx = session.watch_run_state();
    let mut deadline = Instant::now() + period;
    info!(session = %session.id(), period_ms = period.as_millis() as u64, "stepping task started");

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => {}
            _ = stopped(&mut state_rx) => break,
        }

        let gated = session.clone();
        let tick = session
            .core
            .with(move |core| {
                let period = core.params.period();
                if *gated.run_state.borrow() != RunState::Running {
                    return Ok(Tick::Skipped(period));
                }
                Ok(match core.step() {
                    Ok((time, values)) => Tick::Stepped {
                        period,
                        time,
                        values,
                    },
                    Err(e) => Tick::Failed(e),
                })
            })
            .await
            .unwrap_or_else(Tick::Failed);

        let period = match tick {
            Tick::Stepped {
                period,
                time,
                values,
            } => {
                let seq = session.results.publish_values(time, values);
                trace!(session = %session.id(), seq, time, "step published");
                period
            }
            Tick::Skipped(period) => period,
            Tick::Failed(e) => {
                warn!(session = %session.id(), error = %e, "step failed, ending run");
                session.results.publish_error(&e);
                if let Err(e) = session.apply(Command::Fail) {
                    debug!(session = %session.id(), error = %e, "run already stopped");
                }
                break;
            }
        };

        deadline = next_deadline(deadline, period, Instant::now());
    }

    info!(session = %session.id(), "stepping task stopped");
}

/// Resolves once the run is Ended or reset to Idle.
async fn stopped(rx: &mut watch::Receiver<RunState>) {
    loop {
        if matches!(*rx.borrow_and_update(), RunState::Ended | RunState::Idle) {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Next tick, measured from the previous deadline so jitter does not
/// accumulate. More than one period behind re-anchors to `now` instead of
/// firing a burst of catch-up ticks.
fn next_deadline(previous: Instant, period: Duration, now: Instant) -> Instant {
    let next = previous + period;
    if now.saturating_duration_since(next) > period {
        now
    } else {
        next
    }
}
