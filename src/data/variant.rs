//! # Genomic Coordinates
//!
//! Value types for chromosomes, positions, ranges and variants, together
//! with their string forms. Parsers fail with [`RafterError::Format`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{RafterError, Result};

const CHR_X: u8 = 23;
const CHR_Y: u8 = 24;

/// A human chromosome, stored as 1..=22, 23 (X) or 24 (Y).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Chromosome(u8);

impl Chromosome {
    pub const X: Chromosome = Chromosome(CHR_X);
    pub const Y: Chromosome = Chromosome(CHR_Y);

    /// Create a chromosome from its numeric form.
    pub fn new(num: u8) -> Result<Self> {
        if (1..=CHR_Y).contains(&num) {
            Ok(Self(num))
        } else {
            Err(RafterError::format(format!("unknown chromosome: {num}")))
        }
    }

    pub fn num(self) -> u8 {
        self.0
    }
}

impl FromStr for Chromosome {
    type Err = RafterError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.strip_prefix("chr").unwrap_or(s);
        match name {
            "X" | "x" => Ok(Self::X),
            "Y" | "y" => Ok(Self::Y),
            _ => name
                .parse::<u8>()
                .map_err(|_| RafterError::format(format!("unknown chromosome: {s}")))
                .and_then(Self::new),
        }
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            CHR_X => write!(f, "X"),
            CHR_Y => write!(f, "Y"),
            n => write!(f, "{n}"),
        }
    }
}

/// A 1-based genomic position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    chromosome: Chromosome,
    pos: u32,
}

impl Position {
    pub fn new(chromosome: Chromosome, pos: u32) -> Self {
        Self { chromosome, pos }
    }

    pub fn chromosome(&self) -> Chromosome {
        self.chromosome
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }
}

impl FromStr for Position {
    type Err = RafterError;

    /// Parse `chrom:pos`.
    fn from_str(s: &str) -> Result<Self> {
        let (chrom, pos) = s
            .split_once(':')
            .ok_or_else(|| RafterError::format(format!("expected chrom:pos, got {s}")))?;
        let chromosome = chrom.parse()?;
        let pos = pos
            .parse()
            .map_err(|_| RafterError::format(format!("can't read variant position: {s}")))?;
        Ok(Self::new(chromosome, pos))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chromosome, self.pos)
    }
}

/// An inclusive genomic interval.
///
/// Bounds are signed: target windows are built as `pos ± span/2` and may
/// extend below 1. Ordered by `(chromosome, to, from)` so that an ordered
/// set supports the lower-bound query in [`Range::query`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    chromosome: Chromosome,
    from: i64,
    to: i64,
}

impl Range {
    pub fn new(chromosome: Chromosome, from: i64, to: i64) -> Self {
        Self { chromosome, from, to }
    }

    /// Lower-bound key: sorts before every real range ending at `pos` or later.
    pub fn query(chromosome: Chromosome, pos: u32) -> Self {
        Self::new(chromosome, i64::MIN, i64::from(pos))
    }

    pub fn chromosome(&self) -> Chromosome {
        self.chromosome
    }

    pub fn from(&self) -> i64 {
        self.from
    }

    pub fn to(&self) -> i64 {
        self.to
    }

    pub fn includes(&self, p: &Position) -> bool {
        self.chromosome == p.chromosome()
            && self.from <= i64::from(p.pos())
            && i64::from(p.pos()) <= self.to
    }
}

impl Ord for Range {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.chromosome, self.to, self.from).cmp(&(other.chromosome, other.to, other.from))
    }
}

impl PartialOrd for Range {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Range {
    type Err = RafterError;

    /// Parse `chrom:from-to`.
    fn from_str(s: &str) -> Result<Self> {
        let (chrom, bounds) = s
            .split_once(':')
            .ok_or_else(|| RafterError::format(format!("expected chrom:from-to, got {s}")))?;
        let (from, to) = bounds
            .split_once('-')
            .ok_or_else(|| RafterError::format(format!("expected chrom:from-to, got {s}")))?;
        let chromosome = chrom.parse()?;
        let from = from
            .parse()
            .map_err(|_| RafterError::format(format!("can't read range bounds: {s}")))?;
        let to = to
            .parse()
            .map_err(|_| RafterError::format(format!("can't read range bounds: {s}")))?;
        Ok(Self::new(chromosome, from, to))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.from, self.to)
    }
}

/// A single (position, ref, alt) triple.
///
/// Multi-allelic sites expand into one `Variant` per alternate allele.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Variant {
    position: Position,
    reference: String,
    alternative: String,
}

impl Variant {
    pub fn new(position: Position, reference: impl Into<String>, alternative: impl Into<String>) -> Self {
        Self {
            position,
            reference: reference.into(),
            alternative: alternative.into(),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn alternative(&self) -> &str {
        &self.alternative
    }

    /// Parse `chrom:pos_REF/ALT1/ALT2/...` into one variant per alternate.
    ///
    /// Alternates equal to the reference are dropped: a variant's alt never
    /// names the reference allele.
    pub fn parse_variants(s: &str) -> Result<Vec<Variant>> {
        let (pos, alleles) = s
            .split_once('_')
            .ok_or_else(|| RafterError::format(format!("expected chrom:pos_REF/ALT, got {s}")))?;
        let position: Position = pos.parse()?;
        let mut parts = alleles.split('/');
        let reference = parts
            .next()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| RafterError::format(format!("missing reference allele: {s}")))?;
        let variants: Vec<Variant> = parts
            .filter(|alt| !alt.is_empty() && *alt != reference)
            .map(|alt| Variant::new(position, reference, alt))
            .collect();
        if variants.is_empty() {
            return Err(RafterError::format(format!("no alternate alleles: {s}")));
        }
        Ok(variants)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}/{}", self.position, self.reference, self.alternative)
    }
}
