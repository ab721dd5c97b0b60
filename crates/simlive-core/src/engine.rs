//! Contracts for the external collaborators: the simulation engine and the
//! layout engine.
//!
//! An engine turns model text into a handle; the handle is the opaque,
//! mutable resource a session owns. Handles are `Send` but not `Sync`: the
//! session's mutation gate is what serializes access to them, so the
//! engines themselves never have to be thread-safe internally.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, LayoutError};

/// Observable name → instantaneous value.
pub type Values = BTreeMap<String, f64>;

/// Result of advancing a handle by one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Simulated time after the step.
    pub time: f64,
    pub values: Values,
}

/// Time series produced by a one-shot run: observable name → samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl Trace {
    /// Number of samples per column.
    pub fn len(&self) -> usize {
        self.columns.values().next().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }
}

/// Loads model text into a fresh simulation handle.
pub trait SimulationEngine: Send + Sync {
    fn load(&self, model: &str) -> Result<Box<dyn SimulationHandle>, EngineError>;
}

/// A loaded, mutable simulation.
pub trait SimulationHandle: Send {
    /// Advance from `time` by `dt`.
    fn step(&mut self, time: f64, dt: f64) -> Result<StepOutput, EngineError>;

    /// Produce `points` evenly spaced samples over `[start, end]`.
    fn run(&mut self, start: f64, end: f64, points: usize) -> Result<Trace, EngineError>;

    fn get_value(&self, name: &str) -> Result<f64, EngineError>;

    fn set_value(&mut self, name: &str, value: f64) -> Result<(), EngineError>;

    /// Restore the initial state of the model.
    fn reset(&mut self) -> Result<(), EngineError>;

    /// Names of the tunable parameters.
    fn parameters(&self) -> Vec<String>;

    fn compartments(&self) -> Vec<String>;

    /// Groups of quantities whose sum is conserved.
    fn moieties(&self) -> Vec<Vec<String>>;
}

// ── Layout ────────────────────────────────────────────────────────────────────

/// Drawing area in client pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn validate(self) -> Result<Self, LayoutError> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        if ok(self.width) && ok(self.height) {
            Ok(self)
        } else {
            Err(LayoutError::InvalidBounds {
                width: self.width,
                height: self.height,
            })
        }
    }

    pub fn center(&self) -> [f64; 2] {
        [self.width / 2.0, self.height / 2.0]
    }
}

/// Tuning knobs forwarded to the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutParams {
    pub gravity: f64,
    pub stiffness: f64,
}

/// A 2-D diagram of the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    pub nodes: Vec<Node>,
    pub edges: Vec<HyperEdge>,
}

impl Diagram {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub centroid: [f64; 2],
    pub width: f64,
    pub height: f64,
    /// Value used to shade the node (initial amount for species).
    pub value: f64,
}

/// A reaction drawn as a centre point with one curve per participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperEdge {
    pub id: String,
    pub centroid: [f64; 2],
    pub curves: Vec<Curve>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub bezier: Bezier,
    #[serde(rename = "type")]
    pub kind: CurveKind,
    /// Arrow-head polygon; empty when the curve has no arrow.
    pub arrow: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveKind {
    Substrate,
    Product,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bezier {
    pub start: [f64; 2],
    pub cp1: [f64; 2],
    pub cp2: [f64; 2],
    pub end: [f64; 2],
}

/// Computes a diagram for model text.
pub trait LayoutEngine: Send + Sync {
    fn layout(
        &self,
        model: &str,
        bounds: Bounds,
        params: LayoutParams,
    ) -> Result<Box<dyn LayoutHandle>, LayoutError>;
}

/// A computed, mutable diagram.
pub trait LayoutHandle: Send {
    fn diagram(&self) -> &Diagram;

    fn bounds(&self) -> Bounds;

    /// Recompute geometry for new bounds without reloading the model.
    fn relayout(&mut self, bounds: Bounds, params: LayoutParams) -> Result<(), LayoutError>;

    /// Shift one node and re-derive the geometry that depends on it.
    fn move_node(&mut self, id: &str, dx: f64, dy: f64) -> Result<(), LayoutError>;
}
