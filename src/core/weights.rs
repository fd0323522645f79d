use tracing::debug;

use crate::codec::EncodedPattern;
use crate::error::{HopfieldError, Result};
use crate::library::PatternLibrary;

/// Hebbian weights: `N×N`, symmetric, zero diagonal. Flat row-major storage.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    dim: usize,
    data: Vec<f64>,
}

impl WeightMatrix {
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            data: vec![0.0; dim * dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn get(&self, a: usize, b: usize) -> f64 {
        self.data[a * self.dim + b]
    }

    /// Incoming weights of neuron `k`.
    #[inline]
    pub fn row(&self, k: usize) -> &[f64] {
        &self.data[k * self.dim..(k + 1) * self.dim]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.dim).all(|a| (a + 1..self.dim).all(|b| self.get(a, b) == self.get(b, a)))
    }

    pub fn diagonal_is_zero(&self) -> bool {
        (0..self.dim).all(|k| self.get(k, k) == 0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&w| w == 0.0)
    }
}

/// Train on every pattern in the library.
///
/// An empty library yields an all-zero `N×N` matrix.
pub fn train(library: &PatternLibrary) -> WeightMatrix {
    let n = library.pattern_length();
    let w = accumulate(library.patterns(), n);
    debug!(
        patterns = library.pattern_count(),
        neurons = n,
        "weights trained"
    );
    w
}

/// Train on loose patterns, checking each is exactly `n` long.
pub fn train_patterns(patterns: &[EncodedPattern], n: usize) -> Result<WeightMatrix> {
    if let Some(bad) = patterns.iter().find(|p| p.len() != n) {
        return Err(HopfieldError::PatternSizeMismatch {
            expected: n,
            actual: bad.len(),
        });
    }
    Ok(accumulate(patterns, n))
}

// Callers guarantee every pattern has length `n`.
fn accumulate(patterns: &[EncodedPattern], n: usize) -> WeightMatrix {
    let mut w = WeightMatrix::zeros(n);
    if patterns.is_empty() {
        return w;
    }

    // Sums of ±1 products are small integers, exact in f64. Only the upper
    // triangle is accumulated; it is mirrored after the division.
    for p in patterns {
        let bits = p.as_slice();
        for a in 0..n {
            let pa = f64::from(bits[a]);
            for b in (a + 1)..n {
                w.data[a * n + b] += pa * f64::from(bits[b]);
            }
        }
    }

    let count = patterns.len() as f64;
    for a in 0..n {
        for b in (a + 1)..n {
            let v = w.data[a * n + b] / count;
            w.data[a * n + b] = v;
            w.data[b * n + a] = v;
        }
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BitWidth;
    use crate::geometry::{GridGeometry, Maneuver};
    use crate::library::DegeneratePolicy;

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

    #[test]
    fn symmetric_with_zero_diagonal() {
        let w = train(&library());
        assert_eq!(w.dim(), 36);
        assert!(w.is_symmetric());
        assert!(w.diagonal_is_zero());
        assert!(!w.is_zero());
    }

    #[test]
    fn single_pattern_is_outer_product() {
        let p = EncodedPattern::from_bits(vec![1, -1, 1]).unwrap();
        let w = train_patterns(&[p], 3).unwrap();
        assert_eq!(w.row(0), &[0.0, -1.0, 1.0]);
        assert_eq!(w.row(1), &[-1.0, 0.0, -1.0]);
        assert_eq!(w.get(2, 0), 1.0);
    }

    #[test]
    fn averages_over_patterns() {
        let a = EncodedPattern::from_bits(vec![1, 1]).unwrap();
        let b = EncodedPattern::from_bits(vec![1, -1]).unwrap();
        let c = EncodedPattern::from_bits(vec![-1, -1]).unwrap();
        let w = train_patterns(&[a, b, c], 2).unwrap();
        assert!((w.get(0, 1) - 1.0 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn empty_library_trains_to_zeros() {
        let lib = PatternLibrary::empty(
            GridGeometry::new(3, 3, 0.1).unwrap(),
            BitWidth::new(4).unwrap(),
        );
        let w = train(&lib);
        assert_eq!(w.dim(), 36);
        assert!(w.is_zero());
    }

    #[test]
    fn rejects_wrong_length() {
        let p = EncodedPattern::from_bits(vec![1, -1]).unwrap();
        let err = train_patterns(&[p], 3).unwrap_err();
        assert!(matches!(
            err,
            HopfieldError::PatternSizeMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }
}
