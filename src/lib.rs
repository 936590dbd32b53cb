//! Construction noise impact estimation against versioned reference datasets.
//!
//! A request names a noise category, a time period and a set of sources. The
//! engine combines the sources, propagates them to the receiver, compares the
//! received level against background and NML, classifies the impact and picks
//! the applicable mitigation measures.

pub mod calculator;
pub mod dataset;
pub mod error;
pub mod impact;
pub mod levels;
pub mod mitigation;
pub mod model;
pub mod policy;
pub mod propagation;
pub mod solver;
pub mod trace;
pub mod util;
pub mod worked_examples;

#[cfg(test)]
mod fixtures;

pub use calculator::{NoiseCalculator, calculate_with};
pub use dataset::{Dataset, DatasetStore};
pub use error::{EngineError, EngineResult};
pub use model::{EstimationRequest, EstimationResult};
pub use policy::EnginePolicy;
