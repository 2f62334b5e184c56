//! Rule-based fallback classifier
//!
//! Serves whenever no trained artifact is available. Needs no training data
//! and is fully deterministic.

use crate::schema::{PH_INDEX, TURBIDITY_INDEX};
use serde::{Deserialize, Serialize};

/// Acceptable pH band (inclusive)
pub const SAFE_PH_RANGE: (f64, f64) = (6.5, 8.5);

/// Maximum acceptable turbidity (NTU)
pub const MAX_SAFE_TURBIDITY: f64 = 5.0;

const BASE_PROBABILITY: f64 = 0.5;
const PH_BONUS: f64 = 0.25;
const TURBIDITY_BONUS: f64 = 0.15;
const PROBABILITY_BOUNDS: (f64, f64) = (0.01, 0.99);

/// Stateless pH + turbidity rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    fn checks(row: &[f64]) -> (bool, bool) {
        let ph = row.get(PH_INDEX).copied().unwrap_or(f64::NAN);
        // short vectors have no turbidity column; treat it as on the limit
        let turbidity = row.get(TURBIDITY_INDEX).copied().unwrap_or(MAX_SAFE_TURBIDITY);

        let ph_ok = (SAFE_PH_RANGE.0..=SAFE_PH_RANGE.1).contains(&ph);
        let turbidity_ok = turbidity <= MAX_SAFE_TURBIDITY;
        (ph_ok, turbidity_ok)
    }

    /// 1 (safe) iff both rules hold
    pub fn label(&self, row: &[f64]) -> u8 {
        let (ph_ok, turbidity_ok) = Self::checks(row);
        u8::from(ph_ok && turbidity_ok)
    }

    /// `[p_unsafe, p_safe]`
    pub fn proba(&self, row: &[f64]) -> [f64; 2] {
        let (ph_ok, turbidity_ok) = Self::checks(row);
        let mut safe = BASE_PROBABILITY;
        if ph_ok {
            safe += PH_BONUS;
        }
        if turbidity_ok {
            safe += TURBIDITY_BONUS;
        }
        let safe = safe.clamp(PROBABILITY_BOUNDS.0, PROBABILITY_BOUNDS.1);
        [1.0 - safe, safe]
    }
}
