//! # Record and Call Filters
//!
//! Admission predicates applied while streaming a VCF, and the counters
//! that account for every rejection.

use std::collections::HashSet;

use crate::data::{Position, Variant};

/// Reasons a variant or call was counted or rejected during parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stat {
    /// Candidate variants seen (after ALT expansion)
    Overall,
    /// Variants on records whose FILTER column was not PASS
    NonPass,
    /// Variants at explicitly banned positions
    Banned,
    /// Variants on records with a column-count mismatch
    Warning,
    /// Calls with a missing GT field
    GtMiss,
    /// Calls below the DP/GQ thresholds
    DpGq,
    /// Heterozygous calls with skewed allele balance
    AlleleBalance,
}

impl Stat {
    pub const ALL: [Stat; 7] = [
        Stat::Overall,
        Stat::NonPass,
        Stat::Banned,
        Stat::Warning,
        Stat::GtMiss,
        Stat::DpGq,
        Stat::AlleleBalance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stat::Overall => "overall",
            Stat::NonPass => "non_pass",
            Stat::Banned => "banned",
            Stat::Warning => "warning",
            Stat::GtMiss => "gt_miss",
            Stat::DpGq => "dp_gq",
            Stat::AlleleBalance => "allele_balance",
        }
    }

    fn index(self) -> usize {
        match self {
            Stat::Overall => 0,
            Stat::NonPass => 1,
            Stat::Banned => 2,
            Stat::Warning => 3,
            Stat::GtMiss => 4,
            Stat::DpGq => 5,
            Stat::AlleleBalance => 6,
        }
    }
}

/// Counters for every filter decision taken during a parse.
#[derive(Clone, Debug, Default)]
pub struct VcfFilterStats {
    counts: [u64; 7],
}

impl VcfFilterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stat: Stat, n: u64) {
        self.counts[stat.index()] += n;
    }

    pub fn count(&self, stat: Stat) -> u64 {
        self.counts[stat.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stat, u64)> + '_ {
        Stat::ALL.iter().map(|&stat| (stat, self.count(stat)))
    }
}

/// Sample, position, variant and call-quality admission rules.
#[derive(Clone, Debug, Default)]
pub struct VcfFilter {
    min_dp: u32,
    min_gq: u32,
    allowed_samples: Option<HashSet<String>>,
    banned_positions: HashSet<Position>,
    allowed_variants: Option<HashSet<Variant>>,
}

impl VcfFilter {
    pub fn new(min_dp: u32, min_gq: u32) -> Self {
        Self {
            min_dp,
            min_gq,
            ..Self::default()
        }
    }

    /// Restrict admission to the given sample names.
    pub fn add_samples<I: IntoIterator<Item = String>>(&mut self, samples: I) {
        self.allowed_samples
            .get_or_insert_with(HashSet::new)
            .extend(samples);
    }

    /// Ban positions outright; their records are skipped.
    pub fn add_banned_positions<I: IntoIterator<Item = Position>>(&mut self, positions: I) {
        self.banned_positions.extend(positions);
    }

    /// Restrict admission to the given variants.
    pub fn set_allowed_variants<I: IntoIterator<Item = Variant>>(&mut self, variants: I) {
        self.allowed_variants
            .get_or_insert_with(HashSet::new)
            .extend(variants);
    }

    /// True iff there is no allow-list or the sample is on it.
    pub fn apply_sample(&self, name: &str) -> bool {
        self.allowed_samples
            .as_ref()
            .map_or(true, |allowed| allowed.contains(name))
    }

    /// True iff the position is not banned.
    pub fn apply_position(&self, position: &Position) -> bool {
        !self.banned_positions.contains(position)
    }

    /// True iff both depth and quality reach their thresholds.
    pub fn apply_quality(&self, dp: u32, gq: u32) -> bool {
        dp >= self.min_dp && gq >= self.min_gq
    }

    /// True iff there is no allow-list or the variant is on it.
    pub fn apply_variant(&self, variant: &Variant) -> bool {
        self.allowed_variants
            .as_ref()
            .map_or(true, |allowed| allowed.contains(variant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Chromosome;

    #[test]
    fn sample_allow_list() {
        let mut filter = VcfFilter::new(0, 0);
        assert!(filter.apply_sample("anyone"));
        filter.add_samples(["S1".to_string()]);
        assert!(filter.apply_sample("S1"));
        assert!(!filter.apply_sample("S2"));
    }

    #[test]
    fn banned_positions() {
        let mut filter = VcfFilter::new(0, 0);
        let banned = Position::new(Chromosome::new(1).unwrap(), 100);
        filter.add_banned_positions([banned]);
        assert!(!filter.apply_position(&banned));
        assert!(filter.apply_position(&Position::new(Chromosome::new(1).unwrap(), 101)));
    }

    #[test]
    fn quality_thresholds_are_inclusive() {
        let filter = VcfFilter::new(10, 30);
        assert!(filter.apply_quality(10, 30));
        assert!(!filter.apply_quality(9, 30));
        assert!(!filter.apply_quality(10, 29));
    }

    #[test]
    fn variant_allow_list() {
        let mut filter = VcfFilter::new(0, 0);
        let variants = Variant::parse_variants("1:5_A/T").unwrap();
        assert!(filter.apply_variant(&variants[0]));
        filter.set_allowed_variants(variants.clone());
        assert!(filter.apply_variant(&variants[0]));
        let other = Variant::parse_variants("1:5_A/G").unwrap();
        assert!(!filter.apply_variant(&other[0]));
    }

    #[test]
    fn stats_accumulate() {
        let mut stats = VcfFilterStats::new();
        stats.add(Stat::Overall, 3);
        stats.add(Stat::NonPass, 1);
        stats.add(Stat::Overall, 2);
        assert_eq!(stats.count(Stat::Overall), 5);
        assert_eq!(stats.count(Stat::NonPass), 1);
        assert_eq!(stats.count(Stat::GtMiss), 0);
        assert_eq!(stats.iter().count(), 7);
    }
}
