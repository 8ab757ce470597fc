//! # Per-Sample Calls
//!
//! Genotype call classes, quality-annotated calls and their packed wire form.

use std::fmt;
use std::io::{self, Read, Write};

/// Diploid genotype class for one sample at one variant.
///
/// The discriminants define the total order used for split thresholds:
/// `HomRef < Het < Hom < Missing`. `Missing` is never a threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AlleleType {
    HomRef = 0,
    Het = 1,
    Hom = 2,
    Missing = 3,
}

impl AlleleType {
    /// Numeric rank; total over all variants.
    pub fn code(self) -> u8 {
        match self {
            AlleleType::HomRef => 0,
            AlleleType::Het => 1,
            AlleleType::Hom => 2,
            AlleleType::Missing => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(AlleleType::HomRef),
            1 => Some(AlleleType::Het),
            2 => Some(AlleleType::Hom),
            3 => Some(AlleleType::Missing),
            _ => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, AlleleType::Missing)
    }
}

impl fmt::Display for AlleleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlleleType::Missing => write!(f, "NA"),
            other => write!(f, "{}", other.code()),
        }
    }
}

/// One sample's call at one alternate allele, with read depth and quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Allele {
    allele_type: AlleleType,
    dp: u32,
    gq: u32,
}

impl Allele {
    pub fn new(allele_type: AlleleType, dp: u32, gq: u32) -> Self {
        Self { allele_type, dp, gq }
    }

    pub fn allele_type(&self) -> AlleleType {
        self.allele_type
    }

    pub fn dp(&self) -> u32 {
        self.dp
    }

    pub fn gq(&self) -> u32 {
        self.gq
    }
}

/// Packed wire form of an [`Allele`]: `(DP: u16 LE, GQ: u16 LE, code: u8)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlleleBinary {
    pub dp: u16,
    pub gq: u16,
    pub code: u8,
}

impl AlleleBinary {
    /// Size of one packed record in bytes.
    pub const SIZE: usize = 5;

    pub fn from_allele(allele: &Allele) -> Self {
        Self {
            dp: allele.dp().min(u32::from(u16::MAX)) as u16,
            gq: allele.gq().min(u32::from(u16::MAX)) as u16,
            code: allele.allele_type().code(),
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.dp.to_le_bytes())?;
        writer.write_all(&self.gq.to_le_bytes())?;
        writer.write_all(&[self.code])
    }

    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact(&mut buf)?;
        Ok(Self {
            dp: u16::from_le_bytes([buf[0], buf[1]]),
            gq: u16::from_le_bytes([buf[2], buf[3]]),
            code: buf[4],
        })
    }
}
