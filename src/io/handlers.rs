//! # Variant Handlers
//!
//! Everything downstream of the parser implements [`VariantsHandler`]:
//! the parser feeds each admitted variant, with one decoded [`Allele`] per
//! admitted sample, to every registered handler in registration order.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::data::{Allele, AlleleBinary, AlleleType, Range, Variant};
use crate::error::Result;

/// A consumer of admitted variants.
pub trait VariantsHandler {
    /// Admitted sample names, in column order.
    fn samples(&self) -> &[String];

    /// Whether this handler wants the variant. Variants no handler wants
    /// are not decoded at all.
    fn is_of_interest(&self, _variant: &Variant) -> bool {
        true
    }

    /// Consume one admitted variant with one decoded call per sample.
    fn process_variant(&mut self, variant: &Variant, alleles: &[Allele]) -> Result<()>;

    /// Called once after the input stream is exhausted.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Accumulates the sample×variant genotype matrix in memory.
#[derive(Debug, Default)]
pub struct GenotypeMatrixHandler {
    samples: Vec<String>,
    variants: Vec<Variant>,
    matrix: Vec<Vec<AlleleType>>,
}

impl GenotypeMatrixHandler {
    pub fn new(samples: Vec<String>) -> Self {
        Self {
            samples,
            variants: Vec::new(),
            matrix: Vec::new(),
        }
    }

    /// Row labels, in the order variants were emitted.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// One row per variant, one cell per admitted sample.
    pub fn matrix(&self) -> &[Vec<AlleleType>] {
        &self.matrix
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Variant>, Vec<Vec<AlleleType>>) {
        (self.samples, self.variants, self.matrix)
    }

    /// Dump the matrix as TSV: header of sample names, then one row per
    /// variant keyed by its canonical string. Missing cells render as `NA`.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "variant\t{}", self.samples.join("\t"))?;
        for (variant, row) in self.variants.iter().zip(&self.matrix) {
            write!(writer, "{variant}")?;
            for cell in row {
                write!(writer, "\t{cell}")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

impl VariantsHandler for GenotypeMatrixHandler {
    fn samples(&self) -> &[String] {
        &self.samples
    }

    fn process_variant(&mut self, variant: &Variant, alleles: &[Allele]) -> Result<()> {
        self.variants.push(variant.clone());
        self.matrix
            .push(alleles.iter().map(|a| a.allele_type()).collect());
        Ok(())
    }
}

/// Counts non-missing calls per configured region and sample.
#[derive(Debug)]
pub struct CallRateHandler {
    samples: Vec<String>,
    ranges: Vec<Range>,
    n_variants: Vec<u64>,
    non_missing: Vec<Vec<u64>>,
}

impl CallRateHandler {
    pub fn new(samples: Vec<String>, ranges: Vec<Range>) -> Self {
        let n_ranges = ranges.len();
        let n_samples = samples.len();
        Self {
            samples,
            ranges,
            n_variants: vec![0; n_ranges],
            non_missing: vec![vec![0; n_samples]; n_ranges],
        }
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Per-range, per-sample call rates. Ranges that saw no variants
    /// report NaN; the consumer decides how to render those.
    pub fn rates(&self) -> Vec<Vec<f64>> {
        self.non_missing
            .iter()
            .zip(&self.n_variants)
            .map(|(row, &n)| {
                row.iter()
                    .map(|&called| called as f64 / n as f64)
                    .collect()
            })
            .collect()
    }

    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "region\t{}", self.samples.join("\t"))?;
        for (range, row) in self.ranges.iter().zip(self.rates()) {
            write!(writer, "{range}")?;
            for rate in row {
                if rate.is_nan() {
                    write!(writer, "\tNA")?;
                } else {
                    write!(writer, "\t{rate:.4}")?;
                }
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

impl VariantsHandler for CallRateHandler {
    fn samples(&self) -> &[String] {
        &self.samples
    }

    fn is_of_interest(&self, variant: &Variant) -> bool {
        let position = variant.position();
        self.ranges.iter().any(|r| r.includes(&position))
    }

    fn process_variant(&mut self, variant: &Variant, alleles: &[Allele]) -> Result<()> {
        let position = variant.position();
        for (i, range) in self.ranges.iter().enumerate() {
            if !range.includes(&position) {
                continue;
            }
            self.n_variants[i] += 1;
            for (j, allele) in alleles.iter().enumerate() {
                if !allele.allele_type().is_missing() {
                    self.non_missing[i][j] += 1;
                }
            }
        }
        Ok(())
    }
}

/// Streams admitted variants to a packed binary file plus a text sidecar.
///
/// The metadata stream carries one header line of tab-joined sample names,
/// then the canonical variant string of every emitted variant, in emission
/// order. The binary stream carries one [`AlleleBinary`] record per sample
/// per variant, little-endian, in the same order.
pub struct BinaryFileHandler<B: Write, M: Write> {
    samples: Vec<String>,
    binary: B,
    meta: M,
}

impl BinaryFileHandler<BufWriter<File>, BufWriter<File>> {
    /// Open `<prefix>_bin` and `<prefix>_meta` for writing.
    pub fn create(samples: Vec<String>, prefix: &Path) -> Result<Self> {
        let mut path = prefix.as_os_str().to_owned();
        path.push("_bin");
        let binary = BufWriter::new(File::create(Path::new(&path))?);
        let mut path = prefix.as_os_str().to_owned();
        path.push("_meta");
        let meta = BufWriter::new(File::create(Path::new(&path))?);
        Self::new(samples, binary, meta)
    }
}

impl<B: Write, M: Write> BinaryFileHandler<B, M> {
    /// Writes the metadata header immediately.
    pub fn new(samples: Vec<String>, binary: B, mut meta: M) -> Result<Self> {
        writeln!(meta, "{}", samples.join("\t"))?;
        Ok(Self {
            samples,
            binary,
            meta,
        })
    }

    /// Consume the handler, flushing and returning the underlying streams.
    pub fn into_streams(mut self) -> Result<(B, M)> {
        self.binary.flush()?;
        self.meta.flush()?;
        Ok((self.binary, self.meta))
    }
}

impl<B: Write, M: Write> VariantsHandler for BinaryFileHandler<B, M> {
    fn samples(&self) -> &[String] {
        &self.samples
    }

    fn process_variant(&mut self, variant: &Variant, alleles: &[Allele]) -> Result<()> {
        writeln!(self.meta, "{variant}")?;
        for allele in alleles {
            AlleleBinary::from_allele(allele).write_to(&mut self.binary)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.binary.flush()?;
        self.meta.flush()?;
        Ok(())
    }
}
