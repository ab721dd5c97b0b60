//! Foreground operations — everything a client does to its session outside
//! the live run: upload, one-shot run, redraw, drag, parameter access.
//!
//! Each operation takes the session's gate for exactly one synchronous
//! closure. Handle construction for `upload` happens before the gate is
//! taken; only the swap happens inside it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use simlive_core::engine::{Diagram, Trace};
use simlive_core::{Bounds, LayoutParams, SessionError};

use crate::gate::blocking;
use crate::session::{Session, SimParams};

/// Response to `upload`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelView {
    pub layout: Diagram,
    pub params: Vec<String>,
    pub bounds: Bounds,
    pub compartments: Vec<String>,
    pub moieties: Vec<Vec<String>>,
    /// The stored model text, echoed back for download.
    pub sbml: String,
}

/// Response to a one-shot `run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunView {
    pub data: Trace,
    pub params: Vec<String>,
    pub bounds: Option<Bounds>,
    pub compartments: Vec<String>,
    pub moieties: Vec<Vec<String>>,
}

/// Live-stepping knobs settable through `set_sim_param`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimParam {
    StepFrequency,
    StepSize,
}

impl SimParam {
    pub fn parse(name: &str) -> Result<Self, SessionError> {
        match name {
            "stepFrequency" | "step_frequency" | "frequency" => Ok(SimParam::StepFrequency),
            "stepSize" | "step_size" => Ok(SimParam::StepSize),
            other => Err(SessionError::InvalidParameter(format!(
                "unknown simulation parameter '{other}'"
            ))),
        }
    }
}

impl Session {
    /// Load new model text, replacing both handles. A live run keeps going
    /// against the new engine handle from the current clock.
    pub async fn upload(
        &self,
        model: &str,
        bounds: Bounds,
        layout_params: LayoutParams,
    ) -> Result<ModelView, SessionError> {
        let limit = self.settings.max_model_bytes;
        if limit > 0 && model.len() > limit {
            return Err(SessionError::InvalidParameter(format!(
                "model is {} bytes, limit is {limit}",
                model.len()
            )));
        }
        if !(layout_params.gravity.is_finite() && layout_params.stiffness.is_finite()) {
            return Err(SessionError::InvalidParameter(
                "gravity and stiffness must be finite".into(),
            ));
        }
        let bounds = bounds.validate()?;

        // Handles are built before the gate is taken; only the swap is gated.
        let text: Arc<str> = Arc::from(model);
        let engines = self.engines.clone();
        let source = text.clone();
        let (engine, layout) = blocking(move || {
            let engine = engines.simulation.load(&source)?;
            let layout = engines.layout.layout(&source, bounds, layout_params)?;
            Ok((engine, layout))
        })
        .await?;

        let view = self
            .core
            .with(move |core| {
                let view = ModelView {
                    layout: layout.diagram().clone(),
                    params: engine.parameters(),
                    bounds: layout.bounds(),
                    compartments: engine.compartments(),
                    moieties: engine.moieties(),
                    sbml: text.to_string(),
                };
                core.engine = Some(engine);
                core.layout = Some(layout);
                core.model_text = Some(text);
                core.layout_params = layout_params;
                Ok(view)
            })
            .await?;

        info!(
            session = %self.id(),
            bytes = model.len(),
            nodes = view.layout.nodes.len(),
            "model uploaded"
        );
        Ok(view)
    }

    /// One-shot simulation over `[start, end]` with `steps` samples,
    /// independent of any live run.
    pub async fn run(&self, start: f64, end: f64, steps: usize) -> Result<RunView, SessionError> {
        let limit = self.settings.max_run_steps;
        if limit > 0 && steps > limit {
            return Err(SessionError::InvalidParameter(format!(
                "{steps} steps requested, limit is {limit}"
            )));
        }

        self.core
            .with(move |core| {
                let bounds = core.layout.as_ref().map(|l| l.bounds());
                let engine = core.engine_mut()?;
                Ok(RunView {
                    data: engine.run(start, end, steps)?,
                    params: engine.parameters(),
                    bounds,
                    compartments: engine.compartments(),
                    moieties: engine.moieties(),
                })
            })
            .await
    }

    /// Recompute the diagram for new bounds with the gravity and stiffness
    /// of the last upload. The model is not reloaded.
    pub async fn redraw(&self, bounds: Bounds) -> Result<Diagram, SessionError> {
        let bounds = bounds.validate()?;
        self.core
            .with(move |core| {
                let params = core.layout_params;
                let layout = core.layout_mut()?;
                layout.relayout(bounds, params)?;
                Ok(layout.diagram().clone())
            })
            .await
    }

    /// The model text as last uploaded.
    pub async fn model_text(&self) -> Result<Arc<str>, SessionError> {
        self.core
            .with(|core| core.model_text.clone().ok_or(SessionError::ModelNotLoaded))
            .await
    }

    pub async fn drag(&self, node: &str, dx: f64, dy: f64) -> Result<Diagram, SessionError> {
        if !(dx.is_finite() && dy.is_finite()) {
            return Err(SessionError::InvalidParameter(format!(
                "drag offset must be finite, got ({dx}, {dy})"
            )));
        }
        let node = node.to_string();
        self.core
            .with(move |core| {
                let layout = core.layout_mut()?;
                layout.move_node(&node, dx, dy)?;
                Ok(layout.diagram().clone())
            })
            .await
    }

    pub async fn get_param(&self, name: &str) -> Result<f64, SessionError> {
        let name = name.to_string();
        self.core
            .with(move |core| Ok(core.engine_mut()?.get_value(&name)?))
            .await
    }

    pub async fn set_param(&self, name: &str, value: f64) -> Result<(), SessionError> {
        if !value.is_finite() {
            return Err(SessionError::InvalidParameter(format!(
                "{name} must be finite, got {value}"
            )));
        }
        let param = name.to_string();
        self.core
            .with(move |core| Ok(core.engine_mut()?.set_value(&param, value)?))
            .await?;
        debug!(session = %self.id(), param = name, value, "parameter set");
        Ok(())
    }

    /// Update the live cadence. Takes effect on the next tick.
    pub async fn set_sim_param(&self, param: SimParam, value: f64) -> Result<SimParams, SessionError> {
        let min_step_frequency = self.settings.min_step_frequency;
        let params = self
            .core
            .with(move |core| {
                let mut params = core.params;
                match param {
                    SimParam::StepFrequency => params.step_frequency = value,
                    SimParam::StepSize => params.step_size = value,
                }
                core.params = params.validate(min_step_frequency)?;
                Ok(core.params)
            })
            .await?;
        debug!(session = %self.id(), ?param, value, "simulation parameter set");
        Ok(params)
    }
}
