//! Random forest classifier
//!
//! Bagged CART trees split on Gini impurity with `sqrt(n_features)`
//! candidate features per node. Every tree derives its RNG from the forest
//! seed and its own index, so a fit is reproducible regardless of how rayon
//! schedules the trees.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Default forest seed
pub const DEFAULT_SEED: u64 = 42;

/// Forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// None grows trees until leaves are pure or too small to split
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: DEFAULT_SEED,
        }
    }
}

impl std::fmt::Display for ForestParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let depth = self
            .max_depth
            .map_or_else(|| "None".to_string(), |d| d.to_string());
        write!(
            f,
            "n_estimators={}, max_depth={}, min_samples_split={}, min_samples_leaf={}",
            self.n_estimators, depth, self.min_samples_split, self.min_samples_leaf
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Node {
    Leaf {
        proba: [f64; 2],
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single CART tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Class probabilities for one (scaled) row
    pub fn predict_proba_row(&self, row: &[f64]) -> [f64; 2] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { proba } => return *proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a [u8],
    params: &'a ForestParams,
    max_features: usize,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    decrease: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl<'a> TreeBuilder<'a> {
    fn grow(&mut self, samples: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let counts = class_counts(self.y, &samples);
        let n = samples.len();
        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            proba: leaf_proba(counts),
        });

        let pure = counts[0] == 0 || counts[1] == 0;
        let depth_reached = self.params.max_depth.map_or(false, |d| depth >= d);
        if pure
            || depth_reached
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
        {
            return node_idx;
        }

        let Some(split) = self.best_split(&samples, counts, rng) else {
            return node_idx;
        };

        self.importances[split.feature] += split.decrease;
        let left = self.grow(split.left, depth + 1, rng);
        let right = self.grow(split.right, depth + 1, rng);
        self.nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    fn best_split(&self, samples: &[usize], counts: [usize; 2], rng: &mut StdRng) -> Option<BestSplit> {
        let n = samples.len();
        let n_features = self.x.ncols();
        let parent_impurity = n as f64 * gini(counts);
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut best: Option<(usize, f64, f64)> = None;
        let mut order = samples.to_vec();

        for feature in index::sample(rng, n_features, self.max_features).into_iter() {
            order.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let mut left_counts = [0usize; 2];
            for i in 0..n - 1 {
                left_counts[self.y[order[i]] as usize] += 1;
                let left_n = i + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let here = self.x[[order[i], feature]];
                let next = self.x[[order[i + 1], feature]];
                if next <= here {
                    continue;
                }

                let right_counts = [counts[0] - left_counts[0], counts[1] - left_counts[1]];
                let child_impurity =
                    left_n as f64 * gini(left_counts) + right_n as f64 * gini(right_counts);
                let decrease = parent_impurity - child_impurity;

                if best.map_or(true, |(_, _, d)| decrease > d) {
                    let mut threshold = (here + next) / 2.0;
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some((feature, threshold, decrease));
                }
            }
        }

        let (feature, threshold, decrease) = best?;
        if decrease <= 0.0 {
            return None;
        }
        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&i| self.x[[i, feature]] <= threshold);

        Some(BestSplit {
            feature,
            threshold,
            decrease,
            left,
            right,
        })
    }
}

fn class_counts(y: &[u8], samples: &[usize]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for &i in samples {
        counts[y[i] as usize] += 1;
    }
    counts
}

fn gini(counts: [usize; 2]) -> f64 {
    let n = (counts[0] + counts[1]) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p0 = counts[0] as f64 / n;
    let p1 = counts[1] as f64 / n;
    1.0 - p0 * p0 - p1 * p1
}

fn leaf_proba(counts: [usize; 2]) -> [f64; 2] {
    let n = (counts[0] + counts[1]) as f64;
    if n == 0.0 {
        return [0.5, 0.5];
    }
    let p1 = counts[1] as f64 / n;
    [1.0 - p1, p1]
}

fn tree_seed(seed: u64, tree: usize) -> u64 {
    seed.wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add((tree as u64).wrapping_mul(1_442_695_040_888_963_407))
}

/// Bagged ensemble of CART trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit a forest on labels in {0, 1}
    pub fn fit(x: &Array2<f64>, y: &[u8], params: ForestParams) -> Self {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let max_features = ((n_features as f64).sqrt().floor() as usize).clamp(1, n_features.max(1));

        let trees: Vec<DecisionTree> = (0..params.n_estimators.max(1))
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(tree_seed(params.seed, t));
                let bootstrap: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

                let mut builder = TreeBuilder {
                    x,
                    y,
                    params: &params,
                    max_features,
                    nodes: Vec::new(),
                    importances: vec![0.0; n_features],
                };
                builder.grow(bootstrap, 0, &mut rng);

                let total: f64 = builder.importances.iter().sum();
                if total > 0.0 {
                    builder.importances.iter_mut().for_each(|v| *v /= total);
                }
                DecisionTree {
                    nodes: builder.nodes,
                    importances: builder.importances,
                }
            })
            .collect();

        let mut feature_importances = vec![0.0; n_features];
        for tree in &trees {
            for (acc, v) in feature_importances.iter_mut().zip(&tree.importances) {
                *acc += v;
            }
        }
        let total: f64 = feature_importances.iter().sum();
        if total > 0.0 {
            feature_importances.iter_mut().for_each(|v| *v /= total);
        }

        Self {
            params,
            n_features,
            trees,
            feature_importances,
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Normalised mean impurity decrease per feature
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn predict_proba_row(&self, row: &[f64]) -> [f64; 2] {
        if self.trees.is_empty() {
            return [0.5, 0.5];
        }
        let sum = self.trees.iter().fold([0.0, 0.0], |acc, tree| {
            let p = tree.predict_proba_row(row);
            [acc[0] + p[0], acc[1] + p[1]]
        });
        let n = self.trees.len() as f64;
        let p1 = (sum[1] / n).clamp(0.0, 1.0);
        [1.0 - p1, p1]
    }
}
