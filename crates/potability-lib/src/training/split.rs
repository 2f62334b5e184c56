//! Seeded stratified splitting
//!
//! Both the train/test split and the k-fold generator shuffle each class
//! separately, so every partition keeps the class ratio of the input.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

/// Share of rows held out for testing
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Folds used for grid search and cross-validation
pub const DEFAULT_FOLDS: usize = 5;

/// Shuffled row indices of each class, `[negatives, positives]`
fn shuffled_by_class(targets: &[u8], rng: &mut StdRng) -> [Vec<usize>; 2] {
    let mut classes: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, &t) in targets.iter().enumerate() {
        classes[usize::from(t == 1)].push(i);
    }
    for class in classes.iter_mut() {
        class.shuffle(rng);
    }
    classes
}

/// Split row indices into (train, test), stratified on `targets`.
/// Each class contributes `round(len * test_fraction)` rows to the test set.
pub fn stratified_split(targets: &[u8], test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(targets.len());
    let mut test = Vec::new();

    for mut class in shuffled_by_class(targets, &mut rng) {
        let n_test = ((class.len() as f64) * test_fraction.clamp(0.0, 1.0)).round() as usize;
        let rest = class.split_off(n_test.min(class.len()));
        test.extend(class);
        train.extend(rest);
    }
    train.sort_unstable();
    test.sort_unstable();

    debug!(
        train = train.len(),
        test = test.len(),
        "Stratified train/test split"
    );
    (train, test)
}

/// `k` stratified folds as (train, validation) index pairs. Rows of each
/// class are dealt round-robin, continuing across classes so fold sizes
/// differ by at most one.
pub fn stratified_kfold(targets: &[u8], k: usize, seed: u64) -> Vec<(Vec<usize>, Vec<usize>)> {
    let k = k.max(1);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds: Vec<Vec<usize>> = vec![Vec::new(); k];

    let mut position = 0;
    for class in shuffled_by_class(targets, &mut rng) {
        for i in class {
            folds[position % k].push(i);
            position += 1;
        }
    }

    (0..k)
        .map(|f| {
            let mut validation = folds[f].clone();
            validation.sort_unstable();
            let mut train: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(g, _)| *g != f)
                .flat_map(|(_, fold)| fold.iter().copied())
                .collect();
            train.sort_unstable();
            (train, validation)
        })
        .collect()
}
