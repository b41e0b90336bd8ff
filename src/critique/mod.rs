//! Iterative critique: run configuration and the controller that drives it.

mod config;
mod controller;

pub use config::{DEFAULT_CRITIQUE_TYPE, DEFAULT_ITERATIONS, DEFAULT_MODEL, RunConfig, select_critic};
pub use controller::{CritiqueController, IterationState, RunReport, SkippedIteration};
