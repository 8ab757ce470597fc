//! # I/O Module
//!
//! The streaming side of the pipeline: admission filters, the per-record
//! genotype decoder, the parser driver and the handler chain it feeds.

pub mod filter;
pub mod format;
pub mod handlers;
pub mod parser;

pub use filter::{Stat, VcfFilter, VcfFilterStats};
pub use format::FormatReader;
pub use handlers::{
    BinaryFileHandler, CallRateHandler, GenotypeMatrixHandler, VariantsHandler,
};
pub use parser::{SharedHandler, VcfParser};
