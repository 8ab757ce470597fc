//! # Imputation Controller
//!
//! A [`VariantsHandler`] that keeps a sliding [`Window`] of neighbouring
//! variants and, when a chromosome is finished, trains one decision tree
//! per designated target to predict dosages for every admitted sample.

use std::collections::{BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::data::{Allele, AlleleType, Chromosome, Range, Variant};
use crate::error::Result;
use crate::io::handlers::VariantsHandler;
use crate::model::tree::{DecisionTree, Features, Labels};
use crate::model::window::Window;

/// Predicted dosages for one target variant, one value per admitted sample.
#[derive(Clone, Debug)]
pub struct TargetPrediction {
    pub variant: Variant,
    pub dosages: Vec<f64>,
}

/// Trains per-target trees over the surrounding variant window.
pub struct PredictingHandler {
    samples: Vec<String>,
    /// Non-overlapping sorted interest regions, per chromosome.
    ranges: HashMap<u8, BTreeSet<Range>>,
    /// Targets awaiting prediction, per chromosome, ascending by position.
    pending: HashMap<u8, Vec<Variant>>,
    window: Window,
    curr_chr: Option<Chromosome>,
    rng: StdRng,
    predictions: Vec<TargetPrediction>,
}

impl PredictingHandler {
    /// `window_size` bounds the window in entries, `window_size_kb` in base
    /// pairs around each target (half the span on each side).
    pub fn new(
        samples: Vec<String>,
        targets: Vec<Variant>,
        window_size: usize,
        window_size_kb: u32,
        seed: u64,
    ) -> Self {
        let half_width = i64::from(window_size_kb / 2);
        let mut ranges: HashMap<u8, BTreeSet<Range>> = HashMap::new();
        let mut pending: HashMap<u8, Vec<Variant>> = HashMap::new();
        for target in targets {
            let position = target.position();
            let chromosome = position.chromosome();
            let pos = i64::from(position.pos());
            insert_merged(
                ranges.entry(chromosome.num()).or_default(),
                Range::new(chromosome, pos - half_width, pos + half_width),
            );
            pending.entry(chromosome.num()).or_default().push(target);
        }
        for targets in pending.values_mut() {
            targets.sort_by_key(|t| t.position().pos());
        }
        Self {
            samples,
            ranges,
            pending,
            window: Window::new(window_size, window_size_kb),
            curr_chr: None,
            rng: StdRng::seed_from_u64(seed),
            predictions: Vec::new(),
        }
    }

    pub fn predictions(&self) -> &[TargetPrediction] {
        &self.predictions
    }

    pub fn into_predictions(self) -> Vec<TargetPrediction> {
        self.predictions
    }

    #[cfg(test)]
    pub(crate) fn ranges_for(&self, chromosome: Chromosome) -> Option<&BTreeSet<Range>> {
        self.ranges.get(&chromosome.num())
    }

    /// Drain pending targets of a finished chromosome: each target still in
    /// the window gets a tree trained on its neighbours and a dosage per
    /// sample.
    fn cleanup(&mut self, chromosome: Chromosome) -> Result<()> {
        let Some(targets) = self.pending.remove(&chromosome.num()) else {
            return Ok(());
        };
        for target in targets {
            if !self.window.contains(&target) {
                debug!("target {target} never entered the window, skipping");
                continue;
            }
            let (features, labels) = self.window.dataset(&target)?;
            let Some((train_features, train_labels, keep)) = training_subset(&features, &labels)
            else {
                debug!("target {target} has no called samples to train on, skipping");
                continue;
            };
            let tree = DecisionTree::fit(&train_features, &train_labels, &mut self.rng)?;
            let dosages = (0..self.samples.len())
                .map(|sample| {
                    let query: Vec<AlleleType> =
                        features.iter().map(|row| row[sample]).collect();
                    tree.predict(&query)
                })
                .collect();
            debug!(
                n_features = features.len(),
                n_train = keep,
                "predicted dosages for {target}"
            );
            self.predictions.push(TargetPrediction {
                variant: target,
                dosages,
            });
        }
        Ok(())
    }
}

impl VariantsHandler for PredictingHandler {
    fn samples(&self) -> &[String] {
        &self.samples
    }

    fn is_of_interest(&self, variant: &Variant) -> bool {
        let position = variant.position();
        let Some(set) = self.ranges.get(&position.chromosome().num()) else {
            return false;
        };
        let query = Range::query(position.chromosome(), position.pos());
        set.range(query..)
            .next()
            .is_some_and(|range| range.includes(&position))
    }

    fn process_variant(&mut self, variant: &Variant, alleles: &[Allele]) -> Result<()> {
        let classes: Vec<AlleleType> = alleles.iter().map(|a| a.allele_type()).collect();
        let chromosome = variant.position().chromosome();
        if self.curr_chr != Some(chromosome) {
            if let Some(previous) = self.curr_chr {
                self.cleanup(previous)?;
            }
            self.window.clear();
            self.curr_chr = Some(chromosome);
        }
        self.window.add(classes, variant.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(chromosome) = self.curr_chr.take() {
            self.cleanup(chromosome)?;
        }
        self.window.clear();
        let unreached: usize = self.pending.values().map(Vec::len).sum();
        if unreached > 0 {
            debug!(unreached, "targets on chromosomes absent from the input");
        }
        info!(n_targets = self.predictions.len(), "imputation finished");
        Ok(())
    }
}

/// Keep only samples with called labels; feature columns follow.
///
/// Returns `None` when every label is missing.
fn training_subset(
    features: &Features,
    labels: &Labels,
) -> Option<(Features, Labels, usize)> {
    let keep: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, label)| !label.is_missing())
        .map(|(i, _)| i)
        .collect();
    if keep.is_empty() {
        return None;
    }
    let train_labels: Labels = keep.iter().map(|&i| labels[i]).collect();
    let train_features: Features = features
        .iter()
        .map(|row| keep.iter().map(|&i| row[i]).collect())
        .collect();
    Some((train_features, train_labels, keep.len()))
}

/// Insert a range, coalescing every overlapping or adjacent neighbour so
/// the set stays non-overlapping and sorted.
fn insert_merged(set: &mut BTreeSet<Range>, mut range: Range) {
    let neighbours: Vec<Range> = set
        .iter()
        .filter(|q| q.from() <= range.to() + 1 && q.to() + 1 >= range.from())
        .copied()
        .collect();
    for q in neighbours {
        set.remove(&q);
        range = Range::new(
            range.chromosome(),
            range.from().min(q.from()),
            range.to().max(q.to()),
        );
    }
    set.insert(range);
}
