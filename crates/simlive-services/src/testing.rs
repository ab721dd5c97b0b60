//! Scripted engine doubles for the services tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use simlive_core::engine::{Diagram, Node, StepOutput, Trace, Values};
use simlive_core::{
    Bounds, EngineError, LayoutEngine, LayoutError, LayoutHandle, LayoutParams,
    SimulationEngine, SimulationHandle,
};

use crate::session::{Engines, SessionSettings, SessionStore};

pub(crate) const MODEL: &str = "scripted model";

#[derive(Default)]
struct Script {
    steps: Vec<(f64, f64)>,
    /// `(k, k_echo)` seen by each step.
    k_seen: Vec<(f64, f64)>,
    resets: usize,
    fail_on_step: Option<usize>,
    /// Wall-clock time each one-shot `run` burns.
    run_cost: Duration,
    /// Parameters of every layout and relayout call, in order.
    layouts: Vec<LayoutParams>,
}

/// Shared view into what the scripted engine was asked to do.
#[derive(Clone, Default)]
pub(crate) struct Probe(Arc<Mutex<Script>>);

impl Probe {
    /// `(time, dt)` of every step call, in order.
    pub(crate) fn steps(&self) -> Vec<(f64, f64)> {
        self.0.lock().unwrap().steps.clone()
    }

    pub(crate) fn step_count(&self) -> usize {
        self.0.lock().unwrap().steps.len()
    }

    pub(crate) fn k_seen(&self) -> Vec<(f64, f64)> {
        self.0.lock().unwrap().k_seen.clone()
    }

    pub(crate) fn resets(&self) -> usize {
        self.0.lock().unwrap().resets
    }

    pub(crate) fn layouts(&self) -> Vec<LayoutParams> {
        self.0.lock().unwrap().layouts.clone()
    }

    /// Make every one-shot `run` block its thread for `cost`.
    pub(crate) fn run_cost(&self, cost: Duration) {
        self.0.lock().unwrap().run_cost = cost;
    }

    /// Make the `n`th step call (1-based, counted across handles) fail.
    pub(crate) fn fail_on_step(&self, n: usize) {
        self.0.lock().unwrap().fail_on_step = Some(n);
    }
}

struct ScriptedEngine(Probe);

impl SimulationEngine for ScriptedEngine {
    fn load(&self, model: &str) -> Result<Box<dyn SimulationHandle>, EngineError> {
        if model.trim().is_empty() {
            return Err(EngineError::Parse {
                line: 0,
                message: "empty model".into(),
            });
        }
        Ok(Box::new(ScriptedSim {
            probe: self.0.clone(),
            k: 1.0,
            k_echo: 1.0,
        }))
    }
}

/// `k` is stored twice and `set_value` writes the copies one after the
/// other, so a step that overlapped a write would see them disagree.
struct ScriptedSim {
    probe: Probe,
    k: f64,
    k_echo: f64,
}

impl SimulationHandle for ScriptedSim {
    fn step(&mut self, time: f64, dt: f64) -> Result<StepOutput, EngineError> {
        let mut script = self.probe.0.lock().unwrap();
        script.steps.push((time, dt));
        script.k_seen.push((self.k, self.k_echo));
        if script.fail_on_step == Some(script.steps.len()) {
            return Err(EngineError::Numerical("scripted failure".into()));
        }
        let time = time + dt;
        let mut values = Values::new();
        values.insert("time".into(), time);
        values.insert("k".into(), self.k);
        Ok(StepOutput { time, values })
    }

    fn run(&mut self, start: f64, end: f64, points: usize) -> Result<Trace, EngineError> {
        let cost = self.probe.0.lock().unwrap().run_cost;
        std::thread::sleep(cost);
        if end <= start || points < 2 {
            return Err(EngineError::InvalidRange(format!("{start}..{end}")));
        }
        let dt = (end - start) / (points - 1) as f64;
        let times: Vec<f64> = (0..points).map(|i| start + dt * i as f64).collect();
        let mut columns = BTreeMap::new();
        columns.insert("k".to_string(), vec![self.k; points]);
        columns.insert("time".to_string(), times);
        Ok(Trace { columns })
    }

    fn get_value(&self, name: &str) -> Result<f64, EngineError> {
        match name {
            "k" => Ok(self.k),
            _ => Err(EngineError::UnknownName(name.into())),
        }
    }

    fn set_value(&mut self, name: &str, value: f64) -> Result<(), EngineError> {
        match name {
            "k" => {
                self.k = value;
                std::thread::sleep(Duration::from_millis(1));
                self.k_echo = value;
                Ok(())
            }
            _ => Err(EngineError::UnknownName(name.into())),
        }
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        self.probe.0.lock().unwrap().resets += 1;
        Ok(())
    }

    fn parameters(&self) -> Vec<String> {
        vec!["k".into()]
    }

    fn compartments(&self) -> Vec<String> {
        vec!["cell".into()]
    }

    fn moieties(&self) -> Vec<Vec<String>> {
        Vec::new()
    }
}

struct ScriptedLayout(Probe);

impl LayoutEngine for ScriptedLayout {
    fn layout(
        &self,
        _model: &str,
        bounds: Bounds,
        params: LayoutParams,
    ) -> Result<Box<dyn LayoutHandle>, LayoutError> {
        let bounds = bounds.validate()?;
        self.0.0.lock().unwrap().layouts.push(params);
        Ok(Box::new(ScriptedDiagram {
            probe: self.0.clone(),
            bounds,
            diagram: Diagram {
                nodes: vec![Node {
                    id: "x".into(),
                    centroid: bounds.center(),
                    width: 20.0,
                    height: 10.0,
                    value: 0.0,
                }],
                edges: Vec::new(),
            },
        }))
    }
}

struct ScriptedDiagram {
    probe: Probe,
    bounds: Bounds,
    diagram: Diagram,
}

impl LayoutHandle for ScriptedDiagram {
    fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn relayout(&mut self, bounds: Bounds, params: LayoutParams) -> Result<(), LayoutError> {
        self.bounds = bounds.validate()?;
        self.probe.0.lock().unwrap().layouts.push(params);
        for node in &mut self.diagram.nodes {
            node.centroid = self.bounds.center();
        }
        Ok(())
    }

    fn move_node(&mut self, id: &str, dx: f64, dy: f64) -> Result<(), LayoutError> {
        let node = self
            .diagram
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| LayoutError::UnknownNode(id.into()))?;
        node.centroid[0] += dx;
        node.centroid[1] += dy;
        Ok(())
    }
}

pub(crate) fn scripted_engines() -> (Engines, Probe) {
    let probe = Probe::default();
    let engines = Engines {
        simulation: Arc::new(ScriptedEngine(probe.clone())),
        layout: Arc::new(ScriptedLayout(probe.clone())),
    };
    (engines, probe)
}

pub(crate) fn scripted_store() -> (SessionStore, Probe) {
    let (engines, probe) = scripted_engines();
    (SessionStore::new(engines, SessionSettings::default()), probe)
}

pub(crate) fn bounds() -> Bounds {
    Bounds::new(400.0, 300.0)
}
