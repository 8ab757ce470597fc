//! # Rafter Library
//!
//! Streaming VCF quality control with random-forest genotype imputation.
//!
//! A single-pass parser decodes a VCF stream, applies sample, position,
//! variant and call-quality filters, and feeds each admitted variant to an
//! ordered chain of handlers: a genotype-matrix builder, per-region
//! call-rate accounting, a packed binary writer, and an imputation
//! controller that trains per-target decision trees over a sliding window
//! of neighbouring variants.
//!
//! ## Modules
//! - `config`: CLI argument parsing and validation
//! - `data`: genomic coordinates and per-sample calls
//! - `error`: error types and result alias
//! - `io`: filters, genotype decoding, the parser driver and handlers
//! - `model`: the sliding window, decision trees and the predictor
//! - `pipeline`: high-level workflow orchestration

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod pipeline;

// Re-export commonly used types
pub use config::Config;
pub use data::{Allele, AlleleBinary, AlleleType, Chromosome, Position, Range, Variant};
pub use error::{RafterError, Result};
pub use io::{
    BinaryFileHandler, CallRateHandler, GenotypeMatrixHandler, Stat, VariantsHandler, VcfFilter,
    VcfFilterStats, VcfParser,
};
pub use model::{DecisionTree, PredictingHandler, RandomForest, TargetPrediction, Window};
pub use pipeline::PipelineOutput;
