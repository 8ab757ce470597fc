//! # Sliding Variant Window
//!
//! Bounded ring of recently seen variants around the stream cursor. The
//! imputation controller trains per-target models on the window contents.

use crate::data::{AlleleType, Variant};
use crate::error::{RafterError, Result};

/// Per-variant allele classes for every admitted sample.
pub type FeatureRow = Vec<AlleleType>;

/// Ring buffer of `(variant, calls)` pairs, bounded two ways: by entry
/// count (`max_size`) and by base-pair distance from the query target
/// (`max_size_kb / 2`, applied when a dataset is assembled).
#[derive(Debug)]
pub struct Window {
    max_size: usize,
    max_size_kb: u32,
    variants: Vec<Variant>,
    features: Vec<FeatureRow>,
    /// Oldest slot once capacity is reached; advances only after the first
    /// overwrite and wraps to 0.
    start: usize,
}

impl Window {
    pub fn new(max_size: usize, max_size_kb: u32) -> Self {
        Self {
            max_size,
            max_size_kb,
            variants: Vec::new(),
            features: Vec::new(),
            start: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn clear(&mut self) {
        self.variants.clear();
        self.features.clear();
        self.start = 0;
    }

    /// Append a variant, overwriting the oldest slot once full.
    pub fn add(&mut self, alleles: FeatureRow, variant: Variant) {
        if self.features.len() < self.max_size {
            self.variants.push(variant);
            self.features.push(alleles);
        } else {
            self.variants[self.start] = variant;
            self.features[self.start] = alleles;
            self.start += 1;
            if self.start == self.max_size {
                self.start = 0;
            }
        }
    }

    pub fn contains(&self, target: &Variant) -> bool {
        self.variants.iter().any(|v| v == target)
    }

    /// Assemble the training set for `target`: its own calls become the
    /// labels, every other slot within half the base-pair width becomes a
    /// feature row. Fails when the target never entered the window.
    pub fn dataset(&self, target: &Variant) -> Result<(Vec<FeatureRow>, FeatureRow)> {
        let half_width = i64::from(self.max_size_kb / 2);
        let target_pos = i64::from(target.position().pos());

        let mut features = Vec::new();
        let mut labels = FeatureRow::new();
        for (variant, row) in self.variants.iter().zip(&self.features) {
            if variant == target {
                labels = row.clone();
            } else if (i64::from(variant.position().pos()) - target_pos).abs() <= half_width {
                features.push(row.clone());
            }
        }
        if labels.is_empty() {
            return Err(RafterError::no_training_data(format!(
                "no values for training set at {target}"
            )));
        }
        Ok((features, labels))
    }
}
