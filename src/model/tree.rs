//! # Dosage Decision Trees
//!
//! A CART-style learner over categorical genotype classes. Trees are
//! trained on bootstrap bags, route missing values to both children with
//! fractional weights, and are pruned bottom-up whenever splitting raises
//! the posterior variance of the predicted dosage.
//!
//! Nodes live in an arena indexed by `usize`; parents own their children
//! exclusively, so no reference counting is needed.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::AlleleType;
use crate::error::{RafterError, Result};

/// Scores must beat the incumbent by at least this margin.
const EPS: f64 = 1e-8;

/// Training features: outer index = predictor variant, inner = sample.
pub type Features = Vec<Vec<AlleleType>>;
/// Training labels: one non-missing class per sample.
pub type Labels = Vec<AlleleType>;

/// Weighted class counts in `HomRef`, `Het`, `Hom` order.
type ClassWeights = [f64; 3];

#[derive(Debug)]
enum Node {
    Leaf {
        class_weights: ClassWeights,
    },
    Inner {
        class_weights: ClassWeights,
        left: usize,
        right: usize,
        var: usize,
        separator: AlleleType,
    },
}

impl Node {
    fn class_weights(&self) -> &ClassWeights {
        match self {
            Node::Leaf { class_weights } | Node::Inner { class_weights, .. } => class_weights,
        }
    }
}

/// A bootstrap bag: sample indices with fractional weights.
#[derive(Debug, Default)]
struct Bag {
    samples: Vec<usize>,
    weights: Vec<f64>,
    sum: f64,
}

impl Bag {
    /// Draw `n` indices uniformly with replacement, each with weight 1.
    fn bootstrap<R: Rng>(n: usize, rng: &mut R) -> Self {
        let samples = (0..n).map(|_| rng.gen_range(0..n)).collect();
        Self {
            samples,
            weights: vec![1.0; n],
            sum: n as f64,
        }
    }

    fn add(&mut self, sample: usize, weight: f64) {
        self.samples.push(sample);
        self.weights.push(weight);
        self.sum += weight;
    }

    fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.samples.iter().copied().zip(self.weights.iter().copied())
    }
}

/// A fitted dosage tree for one target variant.
#[derive(Debug)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    root: usize,
}

impl DecisionTree {
    /// Train on a bootstrap bag drawn from `rng`.
    ///
    /// `features[v][s]` is sample `s`'s class at predictor variant `v`;
    /// `labels[s]` is the class at the target. Labels must not be missing.
    pub fn fit<R: Rng>(features: &Features, labels: &Labels, rng: &mut R) -> Result<Self> {
        if labels.is_empty() {
            return Err(RafterError::invalid_data(
                "decision tree needs at least one training sample",
            ));
        }
        let bag = Bag::bootstrap(labels.len(), rng);
        let mut builder = TreeBuilder {
            features,
            labels,
            rng,
            nodes: Vec::new(),
        };
        let root = builder.subtree(bag)?;
        Ok(Self {
            nodes: builder.nodes,
            root,
        })
    }

    /// Predict the expected alternate-allele dosage, in `[0, 2]`.
    ///
    /// Missing predictor values descend into both children; the results are
    /// blended with the node's class-weight ratios.
    pub fn predict(&self, features: &[AlleleType]) -> f64 {
        self.predict_node(self.root, features)
    }

    fn predict_node(&self, id: usize, features: &[AlleleType]) -> f64 {
        match &self.nodes[id] {
            Node::Leaf { class_weights } => dosage(class_weights),
            Node::Inner {
                class_weights,
                left,
                right,
                var,
                separator,
            } => {
                let value = features[*var];
                if !value.is_missing() {
                    if value <= *separator {
                        self.predict_node(*left, features)
                    } else {
                        self.predict_node(*right, features)
                    }
                } else {
                    let (left_ratio, right_ratio) = missing_ratios(class_weights, *separator);
                    left_ratio * self.predict_node(*left, features)
                        + right_ratio * self.predict_node(*right, features)
                }
            }
        }
    }

    #[cfg(test)]
    fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}

struct TreeBuilder<'a, R: Rng> {
    features: &'a Features,
    labels: &'a Labels,
    rng: &'a mut R,
    nodes: Vec<Node>,
}

impl<R: Rng> TreeBuilder<'_, R> {
    fn subtree(&mut self, bag: Bag) -> Result<usize> {
        let class_weights = self.counts(&bag)?;
        let n_features = self.features.len();
        let k = (n_features as f64).sqrt().floor() as usize;
        let candidates = self.sample_vars(n_features, k);

        let mut best: Option<(usize, AlleleType)> = None;
        let mut best_score = entropy(&class_weights) - EPS;
        for var in candidates {
            for separator in [AlleleType::HomRef, AlleleType::Het] {
                let (left, right) = self.split(&bag, separator, var, &class_weights);
                let score = self.split_score(&left, &right)?;
                if score < best_score {
                    best_score = score;
                    best = Some((var, separator));
                }
            }
        }

        match best {
            None => Ok(self.push(Node::Leaf { class_weights })),
            Some((var, separator)) => {
                let (left_bag, right_bag) = self.split(&bag, separator, var, &class_weights);
                let left = self.subtree(left_bag)?;
                let right = self.subtree(right_bag)?;
                Ok(self.prune(left, right, class_weights, separator, var))
            }
        }
    }

    /// Weighted class counts of a bag; missing labels are a caller bug.
    fn counts(&self, bag: &Bag) -> Result<ClassWeights> {
        let mut counts = [0.0; 3];
        for (sample, weight) in bag.iter() {
            match self.labels[sample] {
                AlleleType::HomRef => counts[0] += weight,
                AlleleType::Het => counts[1] += weight,
                AlleleType::Hom => counts[2] += weight,
                AlleleType::Missing => {
                    return Err(RafterError::invalid_data(
                        "training labels must not be missing",
                    ))
                }
            }
        }
        Ok(counts)
    }

    /// Partition a bag by threshold at predictor `var`.
    ///
    /// Missing values go to both sides, weighted by the parent's class
    /// ratios (never recomputed per child).
    fn split(
        &self,
        bag: &Bag,
        separator: AlleleType,
        var: usize,
        parent_weights: &ClassWeights,
    ) -> (Bag, Bag) {
        let (left_ratio, right_ratio) = missing_ratios(parent_weights, separator);
        let column = &self.features[var];
        let mut left = Bag::default();
        let mut right = Bag::default();
        for (sample, weight) in bag.iter() {
            let value = column[sample];
            if value.is_missing() {
                left.add(sample, weight * left_ratio);
                right.add(sample, weight * right_ratio);
            } else if value <= separator {
                left.add(sample, weight);
            } else {
                right.add(sample, weight);
            }
        }
        (left, right)
    }

    /// Weight-averaged child entropy.
    fn split_score(&self, left: &Bag, right: &Bag) -> Result<f64> {
        let sum = left.sum + right.sum;
        let left_ratio = left.sum / sum;
        let right_ratio = right.sum / sum;
        Ok(left_ratio * entropy(&self.counts(left)?) + right_ratio * entropy(&self.counts(right)?))
    }

    /// `k` distinct predictor indices, uniform over the feature set.
    fn sample_vars(&mut self, n: usize, k: usize) -> Vec<usize> {
        let mut all: Vec<usize> = (0..n).collect();
        all.shuffle(self.rng);
        all.truncate(k);
        all
    }

    /// Collapse the freshly built split back into a leaf when separating
    /// raises the posterior dosage variance.
    fn prune(
        &mut self,
        left: usize,
        right: usize,
        class_weights: ClassWeights,
        separator: AlleleType,
        var: usize,
    ) -> usize {
        let left_weights = *self.nodes[left].class_weights();
        let right_weights = *self.nodes[right].class_weights();
        let left_sum: f64 = left_weights.iter().sum();
        let right_sum: f64 = right_weights.iter().sum();
        let split_variance = (left_sum * dosage_variance(&left_weights)
            + right_sum * dosage_variance(&right_weights))
            / (left_sum + right_sum);
        let joint_variance = dosage_variance(&class_weights);
        if joint_variance < split_variance - EPS {
            self.push(Node::Leaf { class_weights })
        } else {
            self.push(Node::Inner {
                class_weights,
                left,
                right,
                var,
                separator,
            })
        }
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

/// Fractional routing ratios for a missing value at a node split.
fn missing_ratios(class_weights: &ClassWeights, separator: AlleleType) -> (f64, f64) {
    let sum: f64 = class_weights.iter().sum();
    if sum <= 0.0 {
        return (0.5, 0.5);
    }
    let hom_ref = class_weights[0] / sum;
    let het = class_weights[1] / sum;
    let left_ratio = if separator == AlleleType::Het {
        hom_ref + het
    } else {
        hom_ref
    };
    (left_ratio, 1.0 - left_ratio)
}

/// Entropy of the weighted class distribution.
fn entropy(class_weights: &ClassWeights) -> f64 {
    let sum: f64 = class_weights.iter().sum();
    let mut information = 0.0;
    for &count in class_weights {
        if count != 0.0 {
            let ratio = count / sum;
            information -= ratio * ratio.ln();
        }
    }
    information
}

/// Posterior class means under a symmetric Dirichlet(1,1,1) prior.
fn dirichlet_means(class_weights: &ClassWeights) -> ([f64; 3], f64) {
    let total: f64 = class_weights.iter().sum::<f64>() + 3.0;
    let means = [
        (class_weights[0] + 1.0) / total,
        (class_weights[1] + 1.0) / total,
        (class_weights[2] + 1.0) / total,
    ];
    (means, total)
}

/// Expected dosage at a leaf: `E[het] + 2 E[hom]`.
fn dosage(class_weights: &ClassWeights) -> f64 {
    let (means, _) = dirichlet_means(class_weights);
    means[1] + 2.0 * means[2]
}

/// Posterior variance of the dosage under the same Dirichlet prior.
fn dosage_variance(class_weights: &ClassWeights) -> f64 {
    let (means, total) = dirichlet_means(class_weights);
    let var = |m: f64| m * (1.0 - m) / (total + 1.0);
    let covariance = -means[1] * means[2] / (total + 1.0);
    var(means[1]) + 4.0 * var(means[2]) + 4.0 * covariance
}

/// Averages independently bagged trees drawn from one RNG stream.
#[derive(Debug)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit<R: Rng>(
        n_trees: usize,
        features: &Features,
        labels: &Labels,
        rng: &mut R,
    ) -> Result<Self> {
        let trees = (0..n_trees)
            .map(|_| DecisionTree::fit(features, labels, rng))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn predict(&self, features: &[AlleleType]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        total / self.trees.len() as f64
    }
}
