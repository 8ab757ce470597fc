//! # Model Module
//!
//! The imputation engine: the sliding variant window, the dosage decision
//! tree, and the controller that wires both into the parsing pipeline.

pub mod predictor;
pub mod tree;
pub mod window;

pub use predictor::{PredictingHandler, TargetPrediction};
pub use tree::{DecisionTree, RandomForest};
pub use window::Window;
