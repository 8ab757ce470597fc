//! # Genotype Field Decoding
//!
//! Decodes per-sample genotype columns according to the record's FORMAT
//! column. Every rejected call is accounted for in [`VcfFilterStats`];
//! only genuinely unparseable fields raise errors.

use crate::data::{Allele, AlleleType};
use crate::error::{RafterError, Result};
use crate::io::filter::{Stat, VcfFilter, VcfFilterStats};

const GT_FIELD: &str = "GT";
const DP_FIELD: &str = "DP";
const GQ_FIELD: &str = "GQ";
const AD_FIELD: &str = "AD";

/// Field layout of one record's FORMAT column.
#[derive(Clone, Debug)]
pub struct FormatReader {
    gt: usize,
    dp: Option<usize>,
    gq: Option<usize>,
    ad: Option<usize>,
}

impl FormatReader {
    /// Locate GT/DP/GQ/AD in a colon-separated FORMAT string.
    ///
    /// GT is mandatory; the rest are optional.
    pub fn new(format: &str) -> Result<Self> {
        let gt = field_index(format, GT_FIELD)
            .ok_or_else(|| RafterError::format("no GT field available for a variant"))?;
        Ok(Self {
            gt,
            dp: field_index(format, DP_FIELD),
            gq: field_index(format, GQ_FIELD),
            ad: field_index(format, AD_FIELD),
        })
    }

    /// Decode one sample's genotype column for the `k`-th alternate allele
    /// (1-based among the record's alternates).
    pub fn parse(
        &self,
        genotype: &str,
        k: usize,
        filter: &VcfFilter,
        stats: &mut VcfFilterStats,
    ) -> Result<Allele> {
        let parts: Vec<&str> = genotype.split(':').collect();
        let gt = *parts
            .get(self.gt)
            .ok_or_else(|| wrong_genotype(genotype))?;

        if matches!(gt, "." | "./." | ".|.") {
            stats.add(Stat::GtMiss, 1);
            return Ok(Allele::new(AlleleType::Missing, 0, 0));
        }

        let dp = int_field(&parts, self.dp).ok_or_else(|| wrong_genotype(genotype))?;
        let gq = int_field(&parts, self.gq).ok_or_else(|| wrong_genotype(genotype))?;

        if !filter.apply_quality(dp, gq) {
            stats.add(Stat::DpGq, 1);
            return Ok(Allele::new(AlleleType::Missing, dp, gq));
        }

        let allele_type = parse_gt(gt, k).ok_or_else(|| wrong_genotype(genotype))?;

        if allele_type == AlleleType::Het && dp > 0 {
            if let Some(ad) = self.ad.and_then(|idx| parts.get(idx)) {
                if let Some(false) = allele_balance_ok(ad, k, dp) {
                    stats.add(Stat::AlleleBalance, 1);
                    return Ok(Allele::new(AlleleType::Missing, 0, 0));
                }
            }
        }

        Ok(Allele::new(allele_type, dp, gq))
    }
}

fn wrong_genotype(genotype: &str) -> RafterError {
    RafterError::format(format!("wrong genotype format: {genotype}"))
}

fn field_index(format: &str, field: &str) -> Option<usize> {
    format.split(':').position(|part| part == field)
}

/// Integer sub-field; 0 when the column is absent or dotted, `None` on garbage.
fn int_field(parts: &[&str], idx: Option<usize>) -> Option<u32> {
    match idx.and_then(|i| parts.get(i)) {
        None => Some(0),
        Some(&".") => Some(0),
        Some(raw) => raw.parse().ok(),
    }
}

/// Classify a GT token against alternate index `k`. `None` means unparseable.
fn parse_gt(gt: &str, k: usize) -> Option<AlleleType> {
    match gt.find(['/', '|']) {
        None => {
            let a: usize = gt.parse().ok()?;
            Some(haploid_class(a, k))
        }
        Some(sep) => {
            let a: usize = gt[..sep].parse().ok()?;
            let b: usize = gt[sep + 1..].parse().ok()?;
            Some(diploid_class(a, b, k))
        }
    }
}

fn haploid_class(a: usize, k: usize) -> AlleleType {
    if a == 0 {
        AlleleType::HomRef
    } else if a == k {
        AlleleType::Hom
    } else {
        AlleleType::Missing
    }
}

fn diploid_class(a: usize, b: usize, k: usize) -> AlleleType {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    if first == second {
        if first == 0 {
            AlleleType::HomRef
        } else if first == k {
            AlleleType::Hom
        } else {
            AlleleType::Missing
        }
    } else if first == 0 && second == k {
        AlleleType::Het
    } else {
        AlleleType::Missing
    }
}

/// Check ref and alt read fractions against `[0.3, 0.7]`.
///
/// `None` when AD is absent or unparseable; the balance check is then
/// skipped and the call stands.
fn allele_balance_ok(ad: &str, k: usize, dp: u32) -> Option<bool> {
    let mut counts = ad.split(',');
    let reference: u32 = counts.next()?.parse().ok()?;
    let alternate: u32 = ad.split(',').nth(k)?.parse().ok()?;
    let depth = f64::from(dp);
    let ref_ratio = f64::from(reference) / depth;
    let alt_ratio = f64::from(alternate) / depth;
    Some((0.3..=0.7).contains(&ref_ratio) && (0.3..=0.7).contains(&alt_ratio))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(format: &str, genotype: &str, k: usize, min_dp: u32, min_gq: u32) -> (Result<Allele>, VcfFilterStats) {
        let reader = FormatReader::new(format).unwrap();
        let filter = VcfFilter::new(min_dp, min_gq);
        let mut stats = VcfFilterStats::new();
        let allele = reader.parse(genotype, k, &filter, &mut stats);
        (allele, stats)
    }

    #[test]
    fn format_requires_gt() {
        assert!(FormatReader::new("DP:GQ").is_err());
        assert!(FormatReader::new("GT").is_ok());
        assert!(FormatReader::new("DP:GT:GQ:AD").is_ok());
    }

    #[test]
    fn decodes_het_with_qualities() {
        let (allele, stats) = decode("GT:DP:GQ", "0/1:20:40", 1, 10, 30);
        let allele = allele.unwrap();
        assert_eq!(allele.allele_type(), AlleleType::Het);
        assert_eq!(allele.dp(), 20);
        assert_eq!(allele.gq(), 40);
        assert_eq!(stats.count(Stat::DpGq), 0);
    }

    #[test]
    fn low_depth_becomes_missing_with_observed_qualities() {
        let (allele, stats) = decode("GT:DP:GQ", "0/1:5:40", 1, 10, 30);
        let allele = allele.unwrap();
        assert_eq!(allele.allele_type(), AlleleType::Missing);
        assert_eq!(allele.dp(), 5);
        assert_eq!(allele.gq(), 40);
        assert_eq!(stats.count(Stat::DpGq), 1);
    }

    #[test]
    fn missing_gt_forms() {
        for gt in [".", "./.", ".|."] {
            let (allele, stats) = decode("GT:DP", &format!("{gt}:7"), 1, 0, 0);
            assert_eq!(allele.unwrap().allele_type(), AlleleType::Missing);
            assert_eq!(stats.count(Stat::GtMiss), 1);
        }
    }

    #[test]
    fn genotype_classes_ignore_allele_order() {
        assert_eq!(parse_gt("0/0", 1), Some(AlleleType::HomRef));
        assert_eq!(parse_gt("1/1", 1), Some(AlleleType::Hom));
        assert_eq!(parse_gt("0/1", 1), Some(AlleleType::Het));
        assert_eq!(parse_gt("1/0", 1), Some(AlleleType::Het));
        assert_eq!(parse_gt("0|1", 1), Some(AlleleType::Het));
        assert_eq!(parse_gt("1/2", 1), Some(AlleleType::Missing));
        assert_eq!(parse_gt("2/2", 2), Some(AlleleType::Hom));
        assert_eq!(parse_gt("0/2", 1), Some(AlleleType::Missing));
    }

    #[test]
    fn single_allele_genotypes() {
        assert_eq!(parse_gt("0", 1), Some(AlleleType::HomRef));
        assert_eq!(parse_gt("1", 1), Some(AlleleType::Hom));
        assert_eq!(parse_gt("2", 1), Some(AlleleType::Missing));
    }

    #[test]
    fn garbage_gt_is_a_format_error() {
        let (allele, _) = decode("GT:DP:GQ", "a/b:20:40", 1, 0, 0);
        assert!(allele.is_err());
        let (allele, _) = decode("GT:DP:GQ", "0/1:x:40", 1, 0, 0);
        assert!(allele.is_err());
    }

    #[test]
    fn skewed_allele_balance_rejects_het() {
        let (allele, stats) = decode("GT:DP:AD", "0/1:10:2,8", 1, 0, 0);
        let allele = allele.unwrap();
        assert_eq!(allele.allele_type(), AlleleType::Missing);
        assert_eq!(allele.dp(), 0);
        assert_eq!(allele.gq(), 0);
        assert_eq!(stats.count(Stat::AlleleBalance), 1);
    }

    #[test]
    fn balanced_het_is_kept() {
        let (allele, stats) = decode("GT:DP:AD", "0/1:10:5,5", 1, 0, 0);
        assert_eq!(allele.unwrap().allele_type(), AlleleType::Het);
        assert_eq!(stats.count(Stat::AlleleBalance), 0);
    }

    #[test]
    fn balance_uses_the_kth_alternate_count() {
        // AD = ref,alt1,alt2; for k=2 the second alternate carries the reads
        let (allele, stats) = decode("GT:DP:AD", "0/2:10:5,0,5", 2, 0, 0);
        assert_eq!(allele.unwrap().allele_type(), AlleleType::Het);
        assert_eq!(stats.count(Stat::AlleleBalance), 0);

        let (allele, stats) = decode("GT:DP:AD", "0/2:10:8,0,2", 2, 0, 0);
        assert_eq!(allele.unwrap().allele_type(), AlleleType::Missing);
        assert_eq!(stats.count(Stat::AlleleBalance), 1);
    }

    #[test]
    fn unparseable_ad_skips_balance_check() {
        let (allele, stats) = decode("GT:DP:AD", "0/1:10:.", 1, 0, 0);
        assert_eq!(allele.unwrap().allele_type(), AlleleType::Het);
        assert_eq!(stats.count(Stat::AlleleBalance), 0);
    }

    #[test]
    fn zero_depth_skips_balance_check() {
        let (allele, _) = decode("GT:AD", "0/1:0,0", 1, 0, 0);
        assert_eq!(allele.unwrap().allele_type(), AlleleType::Het);
    }

    #[test]
    fn dotted_depth_counts_as_zero() {
        let (allele, stats) = decode("GT:DP:GQ", "0/1:.:40", 1, 10, 0);
        assert_eq!(allele.unwrap().allele_type(), AlleleType::Missing);
        assert_eq!(stats.count(Stat::DpGq), 1);
    }
}
