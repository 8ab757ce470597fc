//! # Pipeline Orchestration
//!
//! Builds the filter and handler chain from a [`Config`], drives the
//! parser over the input stream and hands the collected artifacts back.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;

use noodles::bgzf;
use tracing::{info, info_span};

use crate::config::Config;
use crate::data::{Position, Range, Variant};
use crate::error::{RafterError, Result};
use crate::io::filter::{VcfFilter, VcfFilterStats};
use crate::io::handlers::{BinaryFileHandler, CallRateHandler, GenotypeMatrixHandler};
use crate::io::parser::{SharedHandler, VcfParser};
use crate::model::predictor::{PredictingHandler, TargetPrediction};

/// Everything a parse run produces.
#[derive(Debug)]
pub struct PipelineOutput {
    /// Admitted sample names, in header order.
    pub samples: Vec<String>,
    /// The accumulated genotype matrix.
    pub genotypes: GenotypeMatrixHandler,
    /// Per-region call rates, when regions were configured.
    pub call_rates: Option<CallRateHandler>,
    /// Imputed dosages, when targets were configured.
    pub predictions: Vec<TargetPrediction>,
    /// Filter decision counters.
    pub stats: VcfFilterStats,
}

/// Open a VCF path, transparently decoding bgzip/gzip.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let is_gzipped = path
        .extension()
        .map(|e| e == "gz" || e == "bgz")
        .unwrap_or(false);
    if is_gzipped {
        Ok(Box::new(BufReader::new(bgzf::Reader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Run the full pipeline against the configured input file.
pub fn run_file(config: &Config) -> Result<PipelineOutput> {
    let input = open_input(&config.vcf)?;
    run(config, input)
}

/// Run the full pipeline against an already opened stream.
pub fn run<R: BufRead>(config: &Config, input: R) -> Result<PipelineOutput> {
    let span = info_span!("pipeline", vcf = ?config.vcf);
    let _guard = span.enter();

    let filter = build_filter(config)?;
    let mut parser = VcfParser::new(input, filter);
    parser.parse_header()?;
    let samples = parser.sample_names().to_vec();

    let gmatrix = Rc::new(RefCell::new(GenotypeMatrixHandler::new(samples.clone())));
    let shared: SharedHandler = gmatrix.clone();
    parser.register_handler(shared, 0);

    let callrate = if config.regions.is_empty() {
        None
    } else {
        let ranges = config
            .regions
            .iter()
            .map(|s| Range::from_str(s))
            .collect::<Result<Vec<_>>>()?;
        let handler = Rc::new(RefCell::new(CallRateHandler::new(samples.clone(), ranges)));
        let shared: SharedHandler = handler.clone();
        parser.register_handler(shared, 1);
        Some(handler)
    };

    if let Some(prefix) = &config.binary_prefix {
        let handler = BinaryFileHandler::create(samples.clone(), prefix)?;
        parser.register_handler(Rc::new(RefCell::new(handler)), 2);
    }

    let predictor = match &config.impute_targets {
        Some(path) => {
            let targets = read_variants(path)?;
            let handler = Rc::new(RefCell::new(PredictingHandler::new(
                samples.clone(),
                targets,
                config.window_size,
                config.window_size_kb,
                config.seed,
            )));
            let shared: SharedHandler = handler.clone();
            parser.register_handler(shared, 3);
            Some(handler)
        }
        None => None,
    };

    parser.parse_genotypes()?;
    let stats = parser.into_stats();
    for (stat, count) in stats.iter() {
        info!(stat = stat.name(), count, "filter counter");
    }

    let genotypes = unwrap_handler(gmatrix);
    let call_rates = callrate.map(unwrap_handler);
    let predictions = predictor
        .map(|handler| unwrap_handler(handler).into_predictions())
        .unwrap_or_default();

    Ok(PipelineOutput {
        samples,
        genotypes,
        call_rates,
        predictions,
        stats,
    })
}

/// Reclaim a handler once the parser (and its clones) are gone.
fn unwrap_handler<T>(handler: Rc<RefCell<T>>) -> T {
    Rc::try_unwrap(handler)
        .unwrap_or_else(|_| unreachable!("parser dropped, handler uniquely owned"))
        .into_inner()
}

fn build_filter(config: &Config) -> Result<VcfFilter> {
    let mut filter = VcfFilter::new(config.min_dp, config.min_gq);
    if let Some(path) = &config.keep_samples {
        filter.add_samples(read_list(path)?);
    }
    if let Some(path) = &config.exclude_positions {
        let positions = read_list(path)?
            .iter()
            .map(|s| Position::from_str(s))
            .collect::<Result<Vec<_>>>()?;
        filter.add_banned_positions(positions);
    }
    if let Some(path) = &config.keep_variants {
        filter.set_allowed_variants(read_variants(path)?);
    }
    Ok(filter)
}

/// Non-blank lines of a text file.
fn read_list(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        RafterError::invalid_data(format!("can't read {}: {e}", path.display()))
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Variant strings, one per line, each possibly multi-allelic.
fn read_variants(path: &Path) -> Result<Vec<Variant>> {
    let mut variants = Vec::new();
    for line in read_list(path)? {
        variants.extend(Variant::parse_variants(&line)?);
    }
    Ok(variants)
}

/// Dump predicted dosages as TSV: target variant, then one column per sample.
pub fn write_predictions<W: Write>(
    predictions: &[TargetPrediction],
    samples: &[String],
    writer: &mut W,
) -> std::io::Result<()> {
    writeln!(writer, "variant\t{}", samples.join("\t"))?;
    for prediction in predictions {
        write!(writer, "{}", prediction.variant)?;
        for dosage in &prediction.dosages {
            write!(writer, "\t{dosage:.4}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AlleleType;
    use std::io::Cursor;

    fn config() -> Config {
        use clap::Parser;
        Config::parse_from(["rafter", "--vcf", "in.vcf"])
    }

    const VCF: &str = "\
##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2
1\t100\t.\tA\tT\t50\tPASS\t.\tGT:DP:GQ\t0/1:20:40\t0/0:25:50
1\t200\t.\tC\tG\t50\tq10\t.\tGT:DP:GQ\t0/1:20:40\t0/0:25:50
1\t300\t.\tG\tA\t50\tPASS\t.\tGT:DP:GQ\t1/1:20:40\t./.:0:0
";

    #[test]
    fn pipeline_collects_matrix_and_stats() {
        let output = run(&config(), Cursor::new(VCF.to_string())).unwrap();
        assert_eq!(output.samples, ["S1", "S2"]);
        assert_eq!(output.genotypes.variants().len(), 2);
        assert_eq!(
            output.genotypes.matrix()[0],
            vec![AlleleType::Het, AlleleType::HomRef]
        );
        assert_eq!(
            output.genotypes.matrix()[1],
            vec![AlleleType::Hom, AlleleType::Missing]
        );
        assert_eq!(output.stats.count(crate::io::filter::Stat::NonPass), 1);
        assert!(output.call_rates.is_none());
        assert!(output.predictions.is_empty());
    }

    #[test]
    fn pipeline_reports_call_rates_for_regions() {
        let mut config = config();
        config.regions.push("1:1-250".to_string());
        let output = run(&config, Cursor::new(VCF.to_string())).unwrap();
        let call_rates = output.call_rates.unwrap();
        // only the PASS record at position 100 falls in the region
        assert_eq!(call_rates.rates()[0], vec![1.0, 1.0]);
    }

    #[test]
    fn predictions_tsv_shape() {
        let predictions = vec![TargetPrediction {
            variant: Variant::parse_variants("1:100_A/T").unwrap().remove(0),
            dosages: vec![0.5, 1.25],
        }];
        let mut buf = Vec::new();
        write_predictions(&predictions, &["S1".into(), "S2".into()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "variant\tS1\tS2\n1:100_A/T\t0.5000\t1.2500\n");
    }
}
