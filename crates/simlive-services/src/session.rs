//! Session store — one isolated interaction context per client.
//!
//! The store map only guards the map shape. Each entry is an
//! `Arc<Session>` whose mutable engine/layout state lives behind the
//! session's own [`MutationGate`], so unrelated sessions never contend.

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use simlive_core::config::SimliveConfig;
use simlive_core::engine::Values;
use simlive_core::layout::SpringLayout;
use simlive_core::protocol::RunState;
use simlive_core::reaction::ReactionEngine;
use simlive_core::{
    LayoutEngine, LayoutHandle, LayoutParams, SessionError, SimulationEngine, SimulationHandle,
};

use crate::gate::MutationGate;
use crate::result_channel::{ResultChannel, ResultReceiver};
use crate::run_state::{transition, Command};

// ── Identity ──────────────────────────────────────────────────────────────────

/// Opaque session identifier: 32 hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh id from a BLAKE3 digest of a process-wide counter, the clock,
    /// and the pid. Never repeats within a process.
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        let mut hasher = blake3::Hasher::new();
        hasher.update(&n.to_le_bytes());
        hasher.update(&nanos.to_le_bytes());
        hasher.update(&std::process::id().to_le_bytes());
        Self(hex::encode(&hasher.finalize().as_bytes()[..16]))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// Live-stepping cadence, editable from the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimParams {
    /// Wall-clock seconds between steps.
    pub step_frequency: f64,
    /// Simulated time advanced per step.
    pub step_size: f64,
}

impl SimParams {
    pub fn validate(self, min_step_frequency: f64) -> Result<Self, SessionError> {
        let floor = min_step_frequency.max(f64::MIN_POSITIVE);
        if !(self.step_frequency.is_finite() && self.step_frequency >= floor) {
            return Err(SessionError::InvalidParameter(format!(
                "stepFrequency must be at least {floor} s, got {}",
                self.step_frequency
            )));
        }
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(SessionError::InvalidParameter(format!(
                "stepSize must be positive, got {}",
                self.step_size
            )));
        }
        Ok(self)
    }

    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(self.step_frequency).unwrap_or(Duration::from_secs(1))
    }
}

/// Per-session defaults and limits, resolved once from config.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub step: SimParams,
    pub min_step_frequency: f64,
    pub layout: LayoutParams,
    /// 0 = unlimited.
    pub max_sessions: usize,
    pub max_model_bytes: usize,
    pub max_run_steps: usize,
}

impl SessionSettings {
    pub fn from_config(config: &SimliveConfig) -> Self {
        Self {
            step: SimParams {
                step_frequency: config.stepping.step_frequency,
                step_size: config.stepping.step_size,
            },
            min_step_frequency: config.stepping.min_step_frequency,
            layout: LayoutParams {
                gravity: config.layout.gravity,
                stiffness: config.layout.stiffness,
            },
            max_sessions: config.limits.max_sessions,
            max_model_bytes: config.limits.max_model_bytes,
            max_run_steps: config.limits.max_run_steps,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&SimliveConfig::default())
    }
}

/// The pluggable collaborators every session loads models through.
#[derive(Clone)]
pub struct Engines {
    pub simulation: Arc<dyn SimulationEngine>,
    pub layout: Arc<dyn LayoutEngine>,
}

impl Engines {
    /// The bundled reaction-network simulator and spring layout.
    pub fn reference(layout_iterations: usize) -> Self {
        Self {
            simulation: Arc::new(ReactionEngine),
            layout: Arc::new(SpringLayout {
                iterations: layout_iterations,
            }),
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Everything guarded by a session's mutation gate.
pub struct SessionCore {
    pub(crate) engine: Option<Box<dyn SimulationHandle>>,
    pub(crate) layout: Option<Box<dyn LayoutHandle>>,
    pub(crate) model_text: Option<Arc<str>>,
    /// Layout parameters the current diagram was built with.
    pub(crate) layout_params: LayoutParams,
    pub(crate) sim_clock: f64,
    pub(crate) params: SimParams,
}

impl SessionCore {
    fn new(settings: &SessionSettings) -> Self {
        Self {
            engine: None,
            layout: None,
            model_text: None,
            layout_params: settings.layout,
            sim_clock: 0.0,
            params: settings.step,
        }
    }

    pub(crate) fn engine_mut(&mut self) -> Result<&mut Box<dyn SimulationHandle>, SessionError> {
        self.engine.as_mut().ok_or(SessionError::ModelNotLoaded)
    }

    pub(crate) fn layout_mut(&mut self) -> Result<&mut Box<dyn LayoutHandle>, SessionError> {
        self.layout.as_mut().ok_or(SessionError::ModelNotLoaded)
    }

    /// Advance the engine by one live step from `sim_clock`.
    pub(crate) fn step(&mut self) -> Result<(f64, Values), SessionError> {
        let dt = self.params.step_size;
        let time = self.sim_clock;
        let out = self.engine_mut()?.step(time, dt)?;
        self.sim_clock = out.time;
        Ok((out.time, out.values))
    }

    /// Drop the handles and go back to defaults.
    pub(crate) fn clear(&mut self, settings: &SessionSettings) {
        *self = Self::new(settings);
    }
}

pub struct Session {
    id: SessionId,
    created_at: u64,
    pub(crate) core: MutationGate<SessionCore>,
    pub(crate) run_state: watch::Sender<RunState>,
    pub(crate) results: ResultChannel,
    /// Handle of the live stepping task. The lock also serializes control
    /// operations against each other.
    pub(crate) stepper: Mutex<Option<JoinHandle<()>>>,
    /// Set once the session has been removed from the store.
    pub(crate) closed: AtomicBool,
    pub(crate) engines: Engines,
    pub(crate) settings: Arc<SessionSettings>,
}

impl Session {
    pub fn new(id: SessionId, engines: Engines, settings: Arc<SessionSettings>) -> Self {
        let (run_state, _) = watch::channel(RunState::Idle);
        Self {
            id,
            created_at: now_ms(),
            core: MutationGate::new(SessionCore::new(&settings)),
            run_state,
            results: ResultChannel::new(),
            stepper: Mutex::new(None),
            closed: AtomicBool::new(false),
            engines,
            settings,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn run_state(&self) -> RunState {
        *self.run_state.borrow()
    }

    /// Watch run-state changes.
    pub fn watch_run_state(&self) -> watch::Receiver<RunState> {
        self.run_state.subscribe()
    }

    /// Receive this session's push events.
    pub fn subscribe(&self) -> ResultReceiver {
        self.results.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Apply one run-state transition atomically.
    pub(crate) fn apply(&self, command: Command) -> Result<RunState, SessionError> {
        let mut outcome = Ok(RunState::Idle);
        self.run_state.send_if_modified(|state| {
            outcome = transition(*state, command);
            match &outcome {
                Ok(next) if *next != *state => {
                    *state = *next;
                    true
                }
                _ => false,
            }
        });
        outcome
    }

    pub async fn summary(&self) -> Result<SessionSummary, SessionError> {
        let (model_loaded, sim_clock, params) = self
            .core
            .with(|core| Ok((core.engine.is_some(), core.sim_clock, core.params)))
            .await?;
        Ok(SessionSummary {
            session_id: self.id.clone(),
            created_at: self.created_at,
            run_state: self.run_state(),
            model_loaded,
            sim_clock,
            step_frequency: params.step_frequency,
            step_size: params.step_size,
            last_seq: self.results.last_seq(),
            subscribers: self.results.subscriber_count(),
        })
    }
}

/// Point-in-time view of a session for status and inspection.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    /// Unix ms.
    pub created_at: u64,
    pub run_state: RunState,
    pub model_loaded: bool,
    pub sim_clock: f64,
    pub step_frequency: f64,
    pub step_size: f64,
    pub last_seq: u64,
    pub subscribers: usize,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Registry of live sessions, shared across all tasks.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<SessionId, Arc<Session>>>,
    engines: Engines,
    settings: Arc<SessionSettings>,
}

impl SessionStore {
    pub fn new(engines: Engines, settings: SessionSettings) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            engines,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Register a session under `id`. Rejects ids already present.
    pub fn create(&self, id: SessionId) -> Result<Arc<Session>, SessionError> {
        let limit = self.settings.max_sessions;
        // len() before entry(): the entry guard holds a shard lock.
        if limit > 0 && self.sessions.len() >= limit {
            return Err(SessionError::SessionLimit(limit));
        }
        match self.sessions.entry(id) {
            Entry::Occupied(e) => Err(SessionError::DuplicateSession(e.key().to_string())),
            Entry::Vacant(e) => {
                let session = Arc::new(Session::new(
                    e.key().clone(),
                    self.engines.clone(),
                    self.settings.clone(),
                ));
                e.insert(session.clone());
                tracing::info!(session = %session.id(), "session created");
                Ok(session)
            }
        }
    }

    /// Register a session under a freshly generated id.
    pub fn create_fresh(&self) -> Result<Arc<Session>, SessionError> {
        self.create(SessionId::generate())
    }

    pub fn get(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))
    }

    /// Unregister a session, stop its stepping task, then release its
    /// handles. Returns once teardown is complete.
    pub async fn remove(&self, id: &str) -> Result<(), SessionError> {
        let (_, session) = self
            .sessions
            .remove(id)
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
        session.shutdown().await;
        tracing::info!(session = %id, "session removed");
        Ok(())
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove every session. Used at daemon shutdown.
    pub async fn shutdown_all(&self) {
        for id in self.ids() {
            let _ = self.remove(id.as_str()).await;
        }
    }
}
