//! # Application Entry Point
//!
//! Thin CLI wrapper: parse arguments, run the pipeline, write the
//! requested artifacts.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rafter::pipeline::{self, write_predictions};
use rafter::Config;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    config.validate()?;

    let output = pipeline::run_file(&config)
        .with_context(|| format!("failed to parse {}", config.vcf.display()))?;

    if let Some(path) = &config.gmatrix {
        let mut writer = create(path)?;
        output
            .genotypes
            .write_tsv(&mut writer)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote genotype matrix");
    }

    if let (Some(path), Some(call_rates)) = (&config.callrate, &output.call_rates) {
        let mut writer = create(path)?;
        call_rates
            .write_tsv(&mut writer)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote call rates");
    }

    if let Some(path) = &config.predictions {
        let mut writer = create(path)?;
        write_predictions(&output.predictions, &output.samples, &mut writer)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(
            path = %path.display(),
            n_targets = output.predictions.len(),
            "wrote predicted dosages"
        );
    }

    Ok(())
}

fn create(path: &Path) -> anyhow::Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .with_context(|| format!("failed to create {}", path.display()))
}
