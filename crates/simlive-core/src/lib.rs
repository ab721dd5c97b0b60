//! simlive-core — shared types, configuration, engine contracts, and the
//! reference simulation/layout engines. All other simlive crates depend on
//! this one.

pub mod config;
pub mod engine;
pub mod error;
pub mod layout;
pub mod protocol;
pub mod reaction;

pub use engine::{
    Bounds, Diagram, LayoutEngine, LayoutHandle, LayoutParams, SimulationEngine,
    SimulationHandle, StepOutput, Trace,
};
pub use error::{EngineError, LayoutError, SessionError};
