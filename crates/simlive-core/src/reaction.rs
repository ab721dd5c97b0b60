//! Reference simulation engine — mass-action reaction networks.
//!
//! Model text is one declaration per line, `#` starts a comment:
//!
//! ```text
//! compartment cell = 1
//! species A = 10 in cell
//! species B = 0
//! param k1 = 0.5
//! reaction J0: A -> B ; k1
//! reaction J1: 2 B -> ; 0.01
//! ```
//!
//! Rates follow mass-action kinetics: `k * Π reactant^stoichiometry`. The
//! state is integrated with fixed-step RK4, sub-stepping each requested step
//! so that no internal step exceeds `MAX_SUBSTEP`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::engine::{SimulationEngine, SimulationHandle, StepOutput, Trace, Values};
use crate::error::EngineError;

const MAX_SUBSTEP: f64 = 0.01;
const MAX_SUBSTEPS_PER_CALL: usize = 1_000_000;

/// Observable name for simulated time in values and traces.
pub const TIME: &str = "time";

// ── Model ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub name: String,
    pub initial: f64,
    pub compartment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rate {
    Param(String),
    Const(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub id: String,
    /// (species index, stoichiometry)
    pub reactants: Vec<(usize, u32)>,
    pub products: Vec<(usize, u32)>,
    pub rate: Rate,
}

impl Reaction {
    fn conserves_count(&self) -> bool {
        let lhs: u32 = self.reactants.iter().map(|(_, s)| s).sum();
        let rhs: u32 = self.products.iter().map(|(_, s)| s).sum();
        !self.reactants.is_empty() && !self.products.is_empty() && lhs == rhs
    }
}

/// A parsed reaction network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactionModel {
    pub compartments: Vec<(String, f64)>,
    pub species: Vec<Species>,
    pub params: BTreeMap<String, f64>,
    pub reactions: Vec<Reaction>,
}

impl ReactionModel {
    pub fn species_index(&self, name: &str) -> Option<usize> {
        self.species.iter().position(|s| s.name == name)
    }

    /// Groups of species whose summed amount is invariant.
    ///
    /// Species connected through count-conserving reactions form a group,
    /// unless any member also takes part in a reaction that creates or
    /// destroys molecules.
    pub fn moieties(&self) -> Vec<Vec<String>> {
        let n = self.species.len();
        let mut parent: Vec<usize> = (0..n).collect();
        let mut broken = vec![false; n];

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for reaction in &self.reactions {
            let members: Vec<usize> = reaction
                .reactants
                .iter()
                .chain(reaction.products.iter())
                .map(|(i, _)| *i)
                .collect();
            if reaction.conserves_count() {
                for pair in members.windows(2) {
                    let (a, b) = (find(&mut parent, pair[0]), find(&mut parent, pair[1]));
                    parent[a] = b;
                }
            } else {
                for i in members {
                    broken[i] = true;
                }
            }
        }

        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..n {
            let root = find(&mut parent, i);
            groups.entry(root).or_default().push(i);
        }

        groups
            .into_values()
            .filter(|g| g.len() > 1 && g.iter().all(|i| !broken[*i]))
            .map(|g| g.into_iter().map(|i| self.species[i].name.clone()).collect())
            .collect()
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

fn parse_err(line: usize, message: impl Into<String>) -> EngineError {
    EngineError::Parse {
        line,
        message: message.into(),
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_number(line: usize, s: &str) -> Result<f64, EngineError> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| parse_err(line, format!("expected a number, found '{}'", s.trim())))?;
    if !value.is_finite() {
        return Err(parse_err(line, "value must be finite"));
    }
    Ok(value)
}

/// Split `NAME = VALUE [rest]` into its parts.
fn parse_assignment(line: usize, body: &str) -> Result<(String, String), EngineError> {
    let (name, value) = body
        .split_once('=')
        .ok_or_else(|| parse_err(line, "expected 'NAME = VALUE'"))?;
    let name = name.trim();
    if !is_ident(name) {
        return Err(parse_err(line, format!("invalid name '{name}'")));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

pub fn parse_model(text: &str) -> Result<ReactionModel, EngineError> {
    let mut model = ReactionModel::default();
    let mut pending: Vec<(usize, &str)> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    let mut declare = |name: &str, line: usize| -> Result<(), EngineError> {
        if let Some(prev) = seen.insert(name.to_string(), line) {
            return Err(parse_err(
                line,
                format!("'{name}' already declared on line {prev}"),
            ));
        }
        Ok(())
    };

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let (keyword, body) = content
            .split_once(char::is_whitespace)
            .ok_or_else(|| parse_err(line, format!("incomplete declaration '{content}'")))?;

        match keyword {
            "compartment" => {
                let (name, value) = parse_assignment(line, body)?;
                declare(&name, line)?;
                model.compartments.push((name, parse_number(line, &value)?));
            }
            "species" => {
                let (name, value) = parse_assignment(line, body)?;
                declare(&name, line)?;
                let (amount, compartment) = match value.split_once(" in ") {
                    Some((amount, comp)) => (amount, Some(comp.trim().to_string())),
                    None => (value.as_str(), None),
                };
                let initial = parse_number(line, amount)?;
                if initial < 0.0 {
                    return Err(parse_err(line, "species amount must be non-negative"));
                }
                model.species.push(Species {
                    name,
                    initial,
                    compartment,
                });
            }
            "param" => {
                let (name, value) = parse_assignment(line, body)?;
                declare(&name, line)?;
                model.params.insert(name, parse_number(line, &value)?);
            }
            // Reactions may reference species declared later.
            "reaction" => pending.push((line, body)),
            other => return Err(parse_err(line, format!("unknown declaration '{other}'"))),
        }
    }

    for comp in model.species.iter().filter_map(|s| s.compartment.as_ref()) {
        if !model.compartments.iter().any(|(name, _)| name == comp) {
            return Err(parse_err(0, format!("unknown compartment '{comp}'")));
        }
    }

    for (line, body) in pending {
        let reaction = parse_reaction(line, body, &model)?;
        declare(&reaction.id, line)?;
        model.reactions.push(reaction);
    }

    if model.species.is_empty() {
        return Err(parse_err(0, "model declares no species"));
    }
    Ok(model)
}

fn parse_reaction(line: usize, body: &str, model: &ReactionModel) -> Result<Reaction, EngineError> {
    let (id, rest) = body
        .split_once(':')
        .ok_or_else(|| parse_err(line, "expected 'ID: LHS -> RHS ; RATE'"))?;
    let id = id.trim();
    if !is_ident(id) {
        return Err(parse_err(line, format!("invalid reaction id '{id}'")));
    }
    let (equation, rate) = rest
        .split_once(';')
        .ok_or_else(|| parse_err(line, "missing '; RATE'"))?;
    let (lhs, rhs) = equation
        .split_once("->")
        .ok_or_else(|| parse_err(line, "missing '->'"))?;

    let rate = rate.trim();
    let rate = if is_ident(rate) {
        if !model.params.contains_key(rate) {
            return Err(parse_err(line, format!("unknown rate parameter '{rate}'")));
        }
        Rate::Param(rate.to_string())
    } else {
        Rate::Const(parse_number(line, rate)?)
    };

    Ok(Reaction {
        id: id.to_string(),
        reactants: parse_side(line, lhs, model)?,
        products: parse_side(line, rhs, model)?,
        rate,
    })
}

fn parse_side(line: usize, side: &str, model: &ReactionModel) -> Result<Vec<(usize, u32)>, EngineError> {
    let side = side.trim();
    if side.is_empty() {
        return Ok(Vec::new());
    }
    side.split('+')
        .map(|term| {
            let parts: Vec<&str> = term.split_whitespace().collect();
            let (stoich, name) = match parts.as_slice() {
                [name] => (1, *name),
                [n, name] => {
                    let n: u32 = n
                        .parse()
                        .map_err(|_| parse_err(line, format!("invalid stoichiometry '{n}'")))?;
                    (n, *name)
                }
                _ => return Err(parse_err(line, format!("invalid term '{}'", term.trim()))),
            };
            if stoich == 0 {
                return Err(parse_err(line, "stoichiometry must be positive"));
            }
            let index = model
                .species_index(name)
                .ok_or_else(|| parse_err(line, format!("unknown species '{name}'")))?;
            Ok((index, stoich))
        })
        .collect()
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// The reference [`SimulationEngine`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactionEngine;

impl SimulationEngine for ReactionEngine {
    fn load(&self, model: &str) -> Result<Box<dyn SimulationHandle>, EngineError> {
        Ok(Box::new(ReactionSim::new(parse_model(model)?)))
    }
}

/// Live state of one loaded reaction network.
#[derive(Debug, Clone)]
pub struct ReactionSim {
    model: Arc<ReactionModel>,
    amounts: Vec<f64>,
    params: BTreeMap<String, f64>,
}

impl ReactionSim {
    pub fn new(model: ReactionModel) -> Self {
        let amounts = model.species.iter().map(|s| s.initial).collect();
        let params = model.params.clone();
        Self {
            model: Arc::new(model),
            amounts,
            params,
        }
    }

    fn rate_constant(&self, rate: &Rate) -> f64 {
        match rate {
            Rate::Const(k) => *k,
            Rate::Param(name) => self.params.get(name).copied().unwrap_or(0.0),
        }
    }

    fn derivative(&self, amounts: &[f64], out: &mut [f64]) {
        out.iter_mut().for_each(|d| *d = 0.0);
        for reaction in &self.model.reactions {
            let mut rate = self.rate_constant(&reaction.rate);
            for &(i, stoich) in &reaction.reactants {
                rate *= amounts[i].powi(stoich as i32);
            }
            for &(i, stoich) in &reaction.reactants {
                out[i] -= stoich as f64 * rate;
            }
            for &(i, stoich) in &reaction.products {
                out[i] += stoich as f64 * rate;
            }
        }
    }

    fn rk4(&self, amounts: &mut [f64], h: f64) {
        let n = amounts.len();
        let (mut k1, mut k2, mut k3, mut k4) = (vec![0.0; n], vec![0.0; n], vec![0.0; n], vec![0.0; n]);
        let mut tmp = vec![0.0; n];

        self.derivative(amounts, &mut k1);
        for i in 0..n {
            tmp[i] = amounts[i] + 0.5 * h * k1[i];
        }
        self.derivative(&tmp, &mut k2);
        for i in 0..n {
            tmp[i] = amounts[i] + 0.5 * h * k2[i];
        }
        self.derivative(&tmp, &mut k3);
        for i in 0..n {
            tmp[i] = amounts[i] + h * k3[i];
        }
        self.derivative(&tmp, &mut k4);
        for i in 0..n {
            amounts[i] += h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
    }

    /// Integrate `amounts` forward by `dt`.
    fn advance(&self, amounts: &mut [f64], dt: f64) -> Result<(), EngineError> {
        let substeps = ((dt / MAX_SUBSTEP).ceil() as usize).max(1);
        if substeps > MAX_SUBSTEPS_PER_CALL {
            return Err(EngineError::InvalidRange(format!(
                "step of {dt} needs too many internal steps"
            )));
        }
        let h = dt / substeps as f64;
        for _ in 0..substeps {
            self.rk4(amounts, h);
        }
        if let Some(i) = amounts.iter().position(|a| !a.is_finite()) {
            return Err(EngineError::Numerical(format!(
                "species '{}' diverged",
                self.model.species[i].name
            )));
        }
        Ok(())
    }

    fn snapshot(&self, time: f64, amounts: &[f64]) -> Values {
        let mut values = Values::new();
        values.insert(TIME.to_string(), time);
        for (species, amount) in self.model.species.iter().zip(amounts) {
            values.insert(species.name.clone(), *amount);
        }
        values
    }
}

impl SimulationHandle for ReactionSim {
    fn step(&mut self, time: f64, dt: f64) -> Result<StepOutput, EngineError> {
        if !(dt.is_finite() && dt > 0.0) || !time.is_finite() {
            return Err(EngineError::InvalidRange(format!("step of {dt} from {time}")));
        }
        let mut amounts = self.amounts.clone();
        self.advance(&mut amounts, dt)?;
        self.amounts = amounts;
        let time = time + dt;
        Ok(StepOutput {
            time,
            values: self.snapshot(time, &self.amounts),
        })
    }

    /// Runs from the initial amounts with the current parameters; the live
    /// state used by `step` is left untouched.
    fn run(&mut self, start: f64, end: f64, points: usize) -> Result<Trace, EngineError> {
        if !(start.is_finite() && end.is_finite()) || end <= start {
            return Err(EngineError::InvalidRange(format!("{start}..{end}")));
        }
        if points < 2 {
            return Err(EngineError::InvalidRange(format!(
                "need at least 2 points, got {points}"
            )));
        }

        let mut amounts: Vec<f64> = self.model.species.iter().map(|s| s.initial).collect();
        let interval = (end - start) / (points - 1) as f64;
        let mut trace = Trace::default();
        for i in 0..points {
            if i > 0 {
                self.advance(&mut amounts, interval)?;
            }
            let time = start + interval * i as f64;
            for (name, value) in self.snapshot(time, &amounts) {
                trace.columns.entry(name).or_default().push(value);
            }
        }
        Ok(trace)
    }

    fn get_value(&self, name: &str) -> Result<f64, EngineError> {
        if let Some(i) = self.model.species_index(name) {
            return Ok(self.amounts[i]);
        }
        self.params
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::UnknownName(name.to_string()))
    }

    fn set_value(&mut self, name: &str, value: f64) -> Result<(), EngineError> {
        if !value.is_finite() {
            return Err(EngineError::InvalidRange(format!("{name} = {value}")));
        }
        if let Some(i) = self.model.species_index(name) {
            self.amounts[i] = value;
            return Ok(());
        }
        match self.params.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(EngineError::UnknownName(name.to_string())),
        }
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        self.amounts = self.model.species.iter().map(|s| s.initial).collect();
        Ok(())
    }

    fn parameters(&self) -> Vec<String> {
        self.params.keys().cloned().collect()
    }

    fn compartments(&self) -> Vec<String> {
        self.model.compartments.iter().map(|(n, _)| n.clone()).collect()
    }

    fn moieties(&self) -> Vec<Vec<String>> {
        self.model.moieties()
    }
}
