//! The compute fabric: the execution engine that selects and drives a
//! role's model chain, gates each attempt through budget and privacy
//! checks, records usage, and supports stateful sessions with automatic
//! context condensation.

pub mod advisor;
pub mod fabric;
pub mod triage;

pub use advisor::{Advisor, AdvisorRegistry};
pub use fabric::{ComputeFabric, ModelAttempt, ModelTriedCallback};
pub use triage::{TriageRouter, TriageRule};
