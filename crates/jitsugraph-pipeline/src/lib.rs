pub mod gate;
pub mod normalize;
pub mod orchestrator;

pub use gate::{RateDecision, RateLimitGate};
pub use normalize::normalize_graph;
pub use orchestrator::Pipeline;
