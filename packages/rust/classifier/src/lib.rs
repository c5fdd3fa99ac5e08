//! Model-type classification: an optional external oracle backed by a
//! deterministic rule.

pub mod classifier;
pub mod oracle;
pub mod providers;

pub use classifier::{Classification, Classifier, DecidedBy, fallback_model_type};
pub use oracle::{ClassificationOracle, parse_model_type};
pub use providers::{ChatOracle, OllamaOracle};
