//! # Data Module
//!
//! Pure value types shared across the pipeline: genomic coordinates and
//! per-sample genotype calls. No I/O lives here.

pub mod allele;
pub mod variant;

pub use allele::{Allele, AlleleBinary, AlleleType};
pub use variant::{Chromosome, Position, Range, Variant};
