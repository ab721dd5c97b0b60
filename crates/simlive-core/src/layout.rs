//! Reference layout engine — spring relaxation over the reaction network.
//!
//! Species become boxes, reactions become hyperedges: a centre point joined
//! to every participant by a cubic Bézier curve. Products get an arrow head.

use crate::engine::{
    Bezier, Bounds, Curve, CurveKind, Diagram, HyperEdge, LayoutEngine, LayoutHandle,
    LayoutParams, Node,
};
use crate::error::LayoutError;
use crate::reaction::parse_model;

const NODE_HEIGHT: f64 = 24.0;
const MIN_NODE_WIDTH: f64 = 40.0;
const CHAR_WIDTH: f64 = 9.0;
const ARROW_LENGTH: f64 = 10.0;
const ARROW_HALF_WIDTH: f64 = 4.0;
const LONE_REACTION_OFFSET: f64 = 40.0;
const EPSILON: f64 = 1e-6;

/// The reference [`LayoutEngine`].
#[derive(Debug, Clone, Copy)]
pub struct SpringLayout {
    pub iterations: usize,
}

impl Default for SpringLayout {
    fn default() -> Self {
        Self { iterations: 200 }
    }
}

impl LayoutEngine for SpringLayout {
    fn layout(
        &self,
        model: &str,
        bounds: Bounds,
        params: LayoutParams,
    ) -> Result<Box<dyn LayoutHandle>, LayoutError> {
        let bounds = bounds.validate()?;
        let model = parse_model(model).map_err(|e| LayoutError::Model(e.to_string()))?;
        if model.species.is_empty() {
            return Err(LayoutError::EmptyModel);
        }

        let nodes = model
            .species
            .iter()
            .map(|s| Node {
                id: s.name.clone(),
                centroid: [0.0, 0.0],
                width: (s.name.len() as f64 * CHAR_WIDTH + 20.0).max(MIN_NODE_WIDTH),
                height: NODE_HEIGHT,
                value: s.initial,
            })
            .collect();
        let reactions = model
            .reactions
            .iter()
            .map(|r| ReactionLinks {
                id: r.id.clone(),
                reactants: r.reactants.iter().map(|(i, _)| *i).collect(),
                products: r.products.iter().map(|(i, _)| *i).collect(),
            })
            .collect();

        let mut handle = SpringDiagram {
            iterations: self.iterations,
            params,
            bounds,
            reactions,
            diagram: Diagram {
                nodes,
                edges: Vec::new(),
            },
        };
        handle.relax();
        handle.derive_edges();
        Ok(Box::new(handle))
    }
}

#[derive(Debug, Clone)]
struct ReactionLinks {
    id: String,
    reactants: Vec<usize>,
    products: Vec<usize>,
}

impl ReactionLinks {
    fn participants(&self) -> impl Iterator<Item = usize> + '_ {
        self.reactants.iter().chain(self.products.iter()).copied()
    }
}

/// Layout state for one model.
#[derive(Debug, Clone)]
pub struct SpringDiagram {
    iterations: usize,
    params: LayoutParams,
    bounds: Bounds,
    reactions: Vec<ReactionLinks>,
    diagram: Diagram,
}

impl SpringDiagram {
    /// Place nodes on a circle, then relax them under repulsion, spring
    /// attraction along reactions, and a pull towards the centre.
    fn relax(&mut self) {
        let n = self.diagram.nodes.len();
        let center = self.bounds.center();
        let radius = 0.35 * self.bounds.width.min(self.bounds.height);
        let mut pos: Vec<[f64; 2]> = (0..n)
            .map(|i| {
                if n == 1 {
                    return center;
                }
                let angle = std::f64::consts::TAU * i as f64 / n as f64;
                [center[0] + radius * angle.cos(), center[1] + radius * angle.sin()]
            })
            .collect();

        let ideal = (self.bounds.width * self.bounds.height / n as f64).sqrt();
        let mut temperature = self.bounds.width.min(self.bounds.height) / 10.0;
        let cooling = temperature / (self.iterations.max(1) as f64 + 1.0);

        for _ in 0..self.iterations {
            let mut disp = vec![[0.0f64; 2]; n];

            for i in 0..n {
                for j in (i + 1)..n {
                    let (d, dist) = delta(pos[i], pos[j], i + j);
                    let force = ideal * ideal / dist;
                    for k in 0..2 {
                        disp[i][k] += d[k] / dist * force;
                        disp[j][k] -= d[k] / dist * force;
                    }
                }
            }

            for reaction in &self.reactions {
                let members: Vec<usize> = reaction.participants().collect();
                for (a, &i) in members.iter().enumerate() {
                    for &j in &members[a + 1..] {
                        if i == j {
                            continue;
                        }
                        let (d, dist) = delta(pos[i], pos[j], i + j);
                        let force = self.params.stiffness * dist * dist / ideal;
                        for k in 0..2 {
                            disp[i][k] -= d[k] / dist * force;
                            disp[j][k] += d[k] / dist * force;
                        }
                    }
                }
            }

            for i in 0..n {
                for k in 0..2 {
                    disp[i][k] += self.params.gravity * (center[k] - pos[i][k]) * 0.1;
                }
                let len = (disp[i][0].powi(2) + disp[i][1].powi(2)).sqrt();
                if len > EPSILON {
                    let step = len.min(temperature);
                    pos[i][0] += disp[i][0] / len * step;
                    pos[i][1] += disp[i][1] / len * step;
                }
                let node = &self.diagram.nodes[i];
                pos[i][0] = clamp(pos[i][0], node.width / 2.0, self.bounds.width - node.width / 2.0);
                pos[i][1] = clamp(pos[i][1], node.height / 2.0, self.bounds.height - node.height / 2.0);
            }

            temperature = (temperature - cooling).max(EPSILON);
        }

        for (node, p) in self.diagram.nodes.iter_mut().zip(pos) {
            node.centroid = p;
        }
    }

    /// Recompute every hyperedge from the current node positions.
    fn derive_edges(&mut self) {
        let nodes = &self.diagram.nodes;
        self.diagram.edges = self
            .reactions
            .iter()
            .map(|reaction| {
                let members: Vec<&Node> = reaction.participants().map(|i| &nodes[i]).collect();
                let mut centroid = [0.0, 0.0];
                for node in &members {
                    centroid[0] += node.centroid[0] / members.len() as f64;
                    centroid[1] += node.centroid[1] / members.len() as f64;
                }
                if members.len() == 1 {
                    centroid[1] -= LONE_REACTION_OFFSET;
                }

                let substrates = reaction.reactants.iter().map(|&i| {
                    let node = &nodes[i];
                    Curve {
                        bezier: straight_bezier(border_point(node, centroid), centroid),
                        kind: CurveKind::Substrate,
                        arrow: Vec::new(),
                    }
                });
                let products = reaction.products.iter().map(|&i| {
                    let end = border_point(&nodes[i], centroid);
                    Curve {
                        bezier: straight_bezier(centroid, end),
                        kind: CurveKind::Product,
                        arrow: arrow_head(centroid, end),
                    }
                });

                HyperEdge {
                    id: reaction.id.clone(),
                    centroid,
                    curves: substrates.chain(products).collect(),
                }
            })
            .collect();
    }
}

impl LayoutHandle for SpringDiagram {
    fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn relayout(&mut self, bounds: Bounds, params: LayoutParams) -> Result<(), LayoutError> {
        self.bounds = bounds.validate()?;
        self.params = params;
        self.relax();
        self.derive_edges();
        Ok(())
    }

    fn move_node(&mut self, id: &str, dx: f64, dy: f64) -> Result<(), LayoutError> {
        if !(dx.is_finite() && dy.is_finite()) {
            return Err(LayoutError::Model(format!("invalid offset ({dx}, {dy})")));
        }
        let node = self
            .diagram
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| LayoutError::UnknownNode(id.to_string()))?;
        node.centroid[0] += dx;
        node.centroid[1] += dy;
        self.derive_edges();
        Ok(())
    }
}

// ── Geometry helpers ──────────────────────────────────────────────────────────

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    if hi < lo {
        (lo + hi) / 2.0
    } else {
        v.clamp(lo, hi)
    }
}

/// Vector from `b` to `a` and its length. Coincident points are nudged
/// apart in a direction derived from `salt` so they can separate.
fn delta(a: [f64; 2], b: [f64; 2], salt: usize) -> ([f64; 2], f64) {
    let d = [a[0] - b[0], a[1] - b[1]];
    let dist = (d[0] * d[0] + d[1] * d[1]).sqrt();
    if dist > EPSILON {
        return (d, dist);
    }
    let angle = salt as f64;
    ([angle.cos() * EPSILON, angle.sin() * EPSILON], EPSILON)
}

fn straight_bezier(start: [f64; 2], end: [f64; 2]) -> Bezier {
    let lerp = |t: f64| [start[0] + (end[0] - start[0]) * t, start[1] + (end[1] - start[1]) * t];
    Bezier {
        start,
        cp1: lerp(1.0 / 3.0),
        cp2: lerp(2.0 / 3.0),
        end,
    }
}

/// Where the segment from the node centre towards `toward` leaves the box.
fn border_point(node: &Node, toward: [f64; 2]) -> [f64; 2] {
    let c = node.centroid;
    let d = [toward[0] - c[0], toward[1] - c[1]];
    let sx = if d[0].abs() > EPSILON { (node.width / 2.0) / d[0].abs() } else { f64::INFINITY };
    let sy = if d[1].abs() > EPSILON { (node.height / 2.0) / d[1].abs() } else { f64::INFINITY };
    let s = sx.min(sy).min(1.0);
    if !s.is_finite() {
        return c;
    }
    [c[0] + d[0] * s, c[1] + d[1] * s]
}

fn arrow_head(from: [f64; 2], tip: [f64; 2]) -> Vec<[f64; 2]> {
    let d = [tip[0] - from[0], tip[1] - from[1]];
    let len = (d[0] * d[0] + d[1] * d[1]).sqrt();
    if len < EPSILON {
        return Vec::new();
    }
    let u = [d[0] / len, d[1] / len];
    let base = [tip[0] - u[0] * ARROW_LENGTH, tip[1] - u[1] * ARROW_LENGTH];
    let perp = [-u[1] * ARROW_HALF_WIDTH, u[0] * ARROW_HALF_WIDTH];
    vec![
        tip,
        [base[0] + perp[0], base[1] + perp[1]],
        [base[0] - perp[0], base[1] - perp[1]],
    ]
}
