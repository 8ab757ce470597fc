//! # Configuration Logic
//!
//! CLI argument parsing and validation using clap derive.

use clap::Parser;
use std::path::PathBuf;

use crate::error::{RafterError, Result};

/// Rafter: streaming VCF quality control and genotype imputation
#[derive(Parser, Debug, Clone)]
#[command(name = "rafter")]
#[command(version = "0.1.0")]
#[command(about = "Streaming VCF quality control and genotype imputation", long_about = None)]
pub struct Config {
    /// Input VCF file (plain, gzip or bgzip)
    #[arg(long, value_name = "FILE")]
    pub vcf: PathBuf,

    /// Write the genotype matrix as TSV
    #[arg(long, value_name = "FILE")]
    pub gmatrix: Option<PathBuf>,

    /// Write per-region call rates as TSV (requires at least one --region)
    #[arg(long, value_name = "FILE")]
    pub callrate: Option<PathBuf>,

    /// Region for call-rate reporting, chrom:from-to (repeatable)
    #[arg(long = "region", value_name = "RANGE")]
    pub regions: Vec<String>,

    /// Prefix for the binary dump (<prefix>_bin and <prefix>_meta)
    #[arg(long, value_name = "PREFIX")]
    pub binary_prefix: Option<PathBuf>,

    /// File with sample IDs to admit, one per line (default: all)
    #[arg(long, value_name = "FILE")]
    pub keep_samples: Option<PathBuf>,

    /// File with banned positions, chrom:pos, one per line
    #[arg(long, value_name = "FILE")]
    pub exclude_positions: Option<PathBuf>,

    /// File with admitted variants, chrom:pos_REF/ALT, one per line
    #[arg(long, value_name = "FILE")]
    pub keep_variants: Option<PathBuf>,

    /// File with imputation targets, chrom:pos_REF/ALT, one per line
    #[arg(long, value_name = "FILE")]
    pub impute_targets: Option<PathBuf>,

    /// Write predicted dosages as TSV (requires --impute-targets)
    #[arg(long, value_name = "FILE")]
    pub predictions: Option<PathBuf>,

    /// Minimum per-call read depth
    #[arg(long, default_value = "0")]
    pub min_dp: u32,

    /// Minimum per-call genotype quality
    #[arg(long, default_value = "0")]
    pub min_gq: u32,

    /// Imputation window capacity in variants
    #[arg(long, default_value = "100")]
    pub window_size: usize,

    /// Imputation window span in base pairs around each target
    #[arg(long, default_value = "100000")]
    pub window_size_kb: u32,

    /// Seed for the tree learner's RNG
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.window_size < 2 {
            return Err(RafterError::invalid_data(
                "window size must hold at least two variants",
            ));
        }
        if self.callrate.is_some() && self.regions.is_empty() {
            return Err(RafterError::invalid_data(
                "--callrate needs at least one --region",
            ));
        }
        if self.predictions.is_some() && self.impute_targets.is_none() {
            return Err(RafterError::invalid_data(
                "--predictions needs --impute-targets",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config::parse_from(["rafter", "--vcf", "in.vcf"])
    }

    #[test]
    fn defaults_are_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn callrate_requires_regions() {
        let mut config = base();
        config.callrate = Some("rates.tsv".into());
        assert!(config.validate().is_err());
        config.regions.push("1:1-1000".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tiny_window_is_rejected() {
        let mut config = base();
        config.window_size = 1;
        assert!(config.validate().is_err());
    }
}
