//! Relaxation dynamics over a live neuron state.
//!
//! Two update disciplines share one [`NeuronState`]:
//! - synchronous: every neuron becomes `sign(w_k · s)` at once (`sign(0) = +1`);
//! - asynchronous: one unit block (or one neuron) is recomputed in place as
//!   `clamp(w_k · s, -1, 1)`. Within a block, later neurons see the values just
//!   written for earlier ones; neurons outside the block keep their old values.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;
#[cfg(feature = "simd")]
use wide::f64x4;

use crate::codec::{BitWidth, EncodedPattern};
use crate::error::{HopfieldError, Result};
use crate::prng::{Prng, UnitPicker};
use crate::weights::WeightMatrix;

/// Execution tier for the synchronous matrix-vector product.
///
/// - `Scalar`: single-threaded baseline
/// - `Simd`: single-threaded with `wide` lanes (requires `simd` feature)
/// - `Parallel`: rows split across rayon workers (requires `parallel` feature)
///
/// Tiers agree up to floating-point summation order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ExecutionTier {
    #[default]
    Scalar,
    Simd,
    Parallel,
}

/// `N` neuron values, each in `[-1, 1]`. Length fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuronState(Vec<f64>);

impl NeuronState {
    pub fn zeros(n: usize) -> Self {
        Self(vec![0.0; n])
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, k: usize) -> Option<f64> {
        self.0.get(k).copied()
    }

    /// Threshold to a bipolar pattern (`> 0 -> +1`).
    pub fn binarize(&self) -> EncodedPattern {
        EncodedPattern::from_neurons(&self.0)
    }
}

/// How a bounded synchronous recall ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecallOutcome {
    /// Synchronous steps taken, including the one that found the fixed point.
    pub iterations: usize,
    /// `false` when the iteration cap was hit first (oscillation or slow descent).
    pub converged: bool,
}

pub struct RecallEngine<P: UnitPicker = Prng> {
    state: NeuronState,
    units: usize,
    width: BitWidth,
    picker: P,
    tier: ExecutionTier,
}

impl<P: UnitPicker> RecallEngine<P> {
    /// Engine for `units` blocks of `width` neurons, state all zeros.
    pub fn new(units: usize, width: BitWidth, picker: P) -> Self {
        Self {
            state: NeuronState::zeros(units * width.block_len()),
            units,
            width,
            picker,
            tier: ExecutionTier::default(),
        }
    }

    pub fn state(&self) -> &NeuronState {
        &self.state
    }

    pub fn neuron_count(&self) -> usize {
        self.state.len()
    }

    pub fn unit_count(&self) -> usize {
        self.units
    }

    pub fn width(&self) -> BitWidth {
        self.width
    }

    pub fn picker_mut(&mut self) -> &mut P {
        &mut self.picker
    }

    /// Set the requested execution tier.
    pub fn set_execution_tier(&mut self, tier: ExecutionTier) {
        self.tier = tier;
    }

    pub fn execution_tier(&self) -> ExecutionTier {
        self.tier
    }

    /// The tier actually used, after compile-time feature gates.
    pub fn effective_execution_tier(&self) -> ExecutionTier {
        match self.tier {
            ExecutionTier::Scalar => ExecutionTier::Scalar,
            ExecutionTier::Simd => {
                #[cfg(feature = "simd")]
                {
                    ExecutionTier::Simd
                }
                #[cfg(not(feature = "simd"))]
                {
                    ExecutionTier::Scalar
                }
            }
            ExecutionTier::Parallel => {
                #[cfg(feature = "parallel")]
                {
                    ExecutionTier::Parallel
                }
                #[cfg(not(feature = "parallel"))]
                {
                    ExecutionTier::Scalar
                }
            }
        }
    }

    /// Copy a full pattern into the state.
    pub fn seed(&mut self, pattern: &EncodedPattern) -> Result<()> {
        self.check_len(pattern.len())?;
        for (s, &b) in self.state.0.iter_mut().zip(pattern.as_slice()) {
            *s = b as f64;
        }
        Ok(())
    }

    /// Copy a prefix into the state; the remaining neurons are set to `-1`.
    pub fn seed_partial(&mut self, prefix: &[i8]) -> Result<()> {
        let n = self.state.len();
        if prefix.len() > n {
            return Err(HopfieldError::PatternSizeMismatch {
                expected: n,
                actual: prefix.len(),
            });
        }
        for (k, s) in self.state.0.iter_mut().enumerate() {
            *s = prefix.get(k).map_or(-1.0, |&b| (b as f64).clamp(-1.0, 1.0));
        }
        Ok(())
    }

    /// Overwrite the state with arbitrary values, clamped to `[-1, 1]`.
    pub fn seed_values(&mut self, values: &[f64]) -> Result<()> {
        self.check_len(values.len())?;
        for (s, &v) in self.state.0.iter_mut().zip(values) {
            *s = v.clamp(-1.0, 1.0);
        }
        Ok(())
    }

    /// Uniform random state in `[-1, 1)`.
    pub fn randomize(&mut self, rng: &mut Prng) {
        for s in self.state.0.iter_mut() {
            *s = rng.gen_range_f64(-1.0, 1.0);
        }
    }

    /// One synchronous step. Returns whether any neuron changed.
    pub fn step_sync(&mut self, weights: &WeightMatrix) -> Result<bool> {
        self.check_len(weights.dim())?;

        let next = match self.effective_execution_tier() {
            ExecutionTier::Scalar => self.next_sync_scalar(weights),
            ExecutionTier::Simd => self.next_sync_simd(weights),
            ExecutionTier::Parallel => self.next_sync_parallel(weights),
        };

        let changed = next != self.state.0;
        self.state.0 = next;
        Ok(changed)
    }

    /// Synchronous steps until a fixed point or `max_iterations`.
    pub fn recall_sync(
        &mut self,
        weights: &WeightMatrix,
        max_iterations: usize,
    ) -> Result<RecallOutcome> {
        self.check_len(weights.dim())?;

        let mut outcome = RecallOutcome {
            iterations: 0,
            converged: false,
        };
        while outcome.iterations < max_iterations {
            outcome.iterations += 1;
            if !self.step_sync(weights)? {
                outcome.converged = true;
                break;
            }
        }

        debug!(
            iterations = outcome.iterations,
            converged = outcome.converged,
            "synchronous recall finished"
        );
        Ok(outcome)
    }

    /// Recompute every neuron of one picked unit block, in order, in place.
    ///
    /// Returns the unit index. Picker values beyond the unit count wrap.
    pub fn step_async_block(&mut self, weights: &WeightMatrix) -> Result<usize> {
        self.check_len(weights.dim())?;
        if self.units == 0 {
            return Ok(0);
        }

        let unit = self.picker.pick(self.units) % self.units;
        let block = self.width.block_len();
        for k in unit * block..(unit + 1) * block {
            let v = self.dot(weights.row(k), &self.state.0);
            self.state.0[k] = v.clamp(-1.0, 1.0);
        }
        Ok(unit)
    }

    /// Recompute one picked neuron in place. Returns its index.
    pub fn step_async_neuron(&mut self, weights: &WeightMatrix) -> Result<usize> {
        self.check_len(weights.dim())?;
        let n = self.state.len();
        if n == 0 {
            return Ok(0);
        }

        let k = self.picker.pick(n) % n;
        let v = self.dot(weights.row(k), &self.state.0);
        self.state.0[k] = v.clamp(-1.0, 1.0);
        Ok(k)
    }

    fn check_len(&self, actual: usize) -> Result<()> {
        let expected = self.state.len();
        if actual != expected {
            return Err(HopfieldError::PatternSizeMismatch { expected, actual });
        }
        Ok(())
    }

    #[inline]
    fn dot(&self, row: &[f64], state: &[f64]) -> f64 {
        match self.effective_execution_tier() {
            ExecutionTier::Simd => dot_simd(row, state),
            _ => dot_scalar(row, state),
        }
    }

    fn next_sync_scalar(&self, weights: &WeightMatrix) -> Vec<f64> {
        let s = &self.state.0;
        (0..s.len())
            .map(|k| sign(dot_scalar(weights.row(k), s)))
            .collect()
    }

    fn next_sync_simd(&self, weights: &WeightMatrix) -> Vec<f64> {
        let s = &self.state.0;
        (0..s.len())
            .map(|k| sign(dot_simd(weights.row(k), s)))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn next_sync_parallel(&self, weights: &WeightMatrix) -> Vec<f64> {
        let s = &self.state.0;
        (0..s.len())
            .into_par_iter()
            .map(|k| sign(dot_scalar(weights.row(k), s)))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn next_sync_parallel(&self, weights: &WeightMatrix) -> Vec<f64> {
        self.next_sync_scalar(weights)
    }
}

#[inline]
fn sign(x: f64) -> f64 {
    if x >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

#[inline]
fn dot_scalar(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Four-lane dot product; the tail is summed scalar.
#[cfg(feature = "simd")]
fn dot_simd(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    let lanes = n / 4 * 4;

    let mut acc = f64x4::splat(0.0);
    for i in (0..lanes).step_by(4) {
        let va = f64x4::from([a[i], a[i + 1], a[i + 2], a[i + 3]]);
        let vb = f64x4::from([b[i], b[i + 1], b[i + 2], b[i + 3]]);
        acc = acc + va * vb;
    }

    let mut sum: f64 = acc.to_array().iter().sum();
    for i in lanes..n {
        sum += a[i] * b[i];
    }
    sum
}

#[cfg(not(feature = "simd"))]
fn dot_simd(a: &[f64], b: &[f64]) -> f64 {
    dot_scalar(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GridGeometry, Maneuver};
    use crate::library::{DegeneratePolicy, PatternLibrary};
    use crate::prng::ScriptedPicker;
    use crate::weights::{train, train_patterns};

    fn library() -> PatternLibrary {
        PatternLibrary::build(
            GridGeometry::new(3, 3, 0.1).unwrap(),
            BitWidth::new(4).unwrap(),
            &[Maneuver::RIGHT, Maneuver::LEFT, Maneuver::FORWARD],
            0.025,
            DegeneratePolicy::Skip,
        )
        .unwrap()
    }

    fn engine_for(lib: &PatternLibrary) -> RecallEngine {
        RecallEngine::new(lib.geometry().unit_count(), lib.width(), Prng::new(7))
    }

    #[test]
    fn stored_patterns_are_fixed_points() {
        let lib = library();
        let w = train(&lib);
        let mut engine = engine_for(&lib);

        for p in lib.iter() {
            engine.seed(p).unwrap();
            assert!(!engine.step_sync(&w).unwrap());
            assert_eq!(&engine.state().binarize(), p);
        }
    }

    #[test]
    fn sync_step_is_idempotent_at_fixed_point() {
        let lib = library();
        let w = train(&lib);
        let mut engine = engine_for(&lib);
        engine.randomize(&mut Prng::new(99));

        let outcome = engine.recall_sync(&w, 50).unwrap();
        assert!(outcome.converged);
        assert!(engine.state().values().iter().all(|v| v.abs() == 1.0));

        let before = engine.state().clone();
        for _ in 0..3 {
            assert!(!engine.step_sync(&w).unwrap());
            assert_eq!(engine.state(), &before);
        }
    }

    #[test]
    fn recall_respects_iteration_cap() {
        let lib = library();
        let w = train(&lib);
        let mut engine = engine_for(&lib);
        engine.randomize(&mut Prng::new(3));

        let outcome = engine.recall_sync(&w, 0).unwrap();
        assert_eq!(outcome.iterations, 0);
        assert!(!outcome.converged);
    }

    #[test]
    fn async_block_updates_sequentially_within_block() {
        // Two units, two neurons each.
        let p = EncodedPattern::from_bits(vec![1, -1, 1, 1]).unwrap();
        let w = train_patterns(&[p], 4).unwrap();
        let mut engine =
            RecallEngine::new(2, BitWidth::new(2).unwrap(), ScriptedPicker::new(vec![1, 0]));
        engine.seed_values(&[0.5, 0.5, -0.5, 0.25]).unwrap();

        assert_eq!(engine.step_async_block(&w).unwrap(), 1);
        // Neuron 3 reads the freshly written neuron 2 (0.25), not the stale -0.5.
        assert_eq!(engine.state().values(), &[0.5, 0.5, 0.25, 0.25]);

        assert_eq!(engine.step_async_block(&w).unwrap(), 0);
        assert_eq!(engine.state().values(), &[0.0, -0.5, 0.25, 0.25]);
        assert_eq!(engine.picker_mut().consumed(), 2);
    }

    #[test]
    fn async_neuron_clamps() {
        let p = EncodedPattern::from_bits(vec![1, 1, 1]).unwrap();
        let w = train_patterns(&[p], 3).unwrap();
        let mut engine =
            RecallEngine::new(3, BitWidth::new(2).unwrap(), ScriptedPicker::new(vec![2]));
        // Six neurons against a 3x3 matrix.
        assert!(engine.step_async_neuron(&w).is_err());

        let mut engine =
            RecallEngine::new(1, BitWidth::new(3).unwrap(), ScriptedPicker::new(vec![2]));
        engine.seed_values(&[1.0, 1.0, -1.0]).unwrap();
        assert_eq!(engine.step_async_neuron(&w).unwrap(), 2);
        assert_eq!(engine.state().values(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn zero_weights_drive_state_to_plus_one() {
        let mut engine = RecallEngine::new(9, BitWidth::new(4).unwrap(), Prng::new(1));
        engine.randomize(&mut Prng::new(5));
        let w = WeightMatrix::zeros(36);

        let outcome = engine.recall_sync(&w, 10).unwrap();
        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 2);
        assert!(engine.state().values().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn seed_partial_pads_with_minus_one() {
        let mut engine = RecallEngine::new(2, BitWidth::new(2).unwrap(), Prng::new(1));
        engine.seed_partial(&[1, 1]).unwrap();
        assert_eq!(engine.state().values(), &[1.0, 1.0, -1.0, -1.0]);
        assert!(engine.seed_partial(&[1; 5]).is_err());
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let mut engine = RecallEngine::new(9, BitWidth::new(4).unwrap(), Prng::new(1));
        let w = WeightMatrix::zeros(3);
        let err = engine.step_sync(&w).unwrap_err();
        assert!(matches!(
            err,
            HopfieldError::PatternSizeMismatch {
                expected: 36,
                actual: 3
            }
        ));
        assert!(engine.step_async_block(&w).is_err());
        assert!(engine.seed_values(&[0.0; 4]).is_err());
    }

    #[cfg(any(feature = "simd", feature = "parallel"))]
    fn assert_tier_matches_scalar(tier: ExecutionTier) {
        let lib = library();
        let w = train(&lib);
        for seed in [11, 23, 57] {
            let mut scalar = engine_for(&lib);
            scalar.randomize(&mut Prng::new(seed));
            let mut other = engine_for(&lib);
            other.seed_values(scalar.state().values()).unwrap();
            other.set_execution_tier(tier);
            assert_eq!(other.effective_execution_tier(), tier);

            scalar.step_sync(&w).unwrap();
            other.step_sync(&w).unwrap();
            assert_eq!(scalar.state(), other.state(), "seed {seed}");
        }
    }

    #[cfg(feature = "simd")]
    #[test]
    fn simd_tier_matches_scalar() {
        assert_tier_matches_scalar(ExecutionTier::Simd);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_tier_matches_scalar() {
        assert_tier_matches_scalar(ExecutionTier::Parallel);
    }

    #[test]
    fn missing_features_fall_back_to_scalar() {
        let mut engine = RecallEngine::new(1, BitWidth::new(2).unwrap(), Prng::new(1));
        engine.set_execution_tier(ExecutionTier::Simd);
        let expected = if cfg!(feature = "simd") {
            ExecutionTier::Simd
        } else {
            ExecutionTier::Scalar
        };
        assert_eq!(engine.effective_execution_tier(), expected);

        engine.set_execution_tier(ExecutionTier::Parallel);
        let expected = if cfg!(feature = "parallel") {
            ExecutionTier::Parallel
        } else {
            ExecutionTier::Scalar
        };
        assert_eq!(engine.effective_execution_tier(), expected);
    }
}
