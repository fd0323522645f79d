use crate::codec::{decode_value, encode_into, BitWidth, EncodedPattern, NeuronBit};
use crate::error::{HopfieldError, Result};
use crate::geometry::GridGeometry;

/// Per-unit signed speeds, `rows × cols`.
pub type SpeedMatrix = Vec<Vec<i64>>;

/// Decode a state or pattern into one speed per unit.
pub fn decode_all<B: NeuronBit>(
    bits: &[B],
    geometry: &GridGeometry,
    width: BitWidth,
) -> Result<SpeedMatrix> {
    let block = width.block_len();
    let expected = geometry.unit_count() * block;
    if bits.len() != expected {
        return Err(HopfieldError::PatternSizeMismatch {
            expected,
            actual: bits.len(),
        });
    }

    bits.chunks_exact(block * geometry.cols())
        .map(|row| row.chunks_exact(block).map(decode_value).collect())
        .collect()
}

/// Encode measured speeds back into a neuron pattern.
///
/// Speeds are scaled by `1 / max_magnitude`; anything beyond `±max_magnitude`
/// is an `EncodeOverflow`.
pub fn encode_all(
    speeds: &[Vec<i64>],
    geometry: &GridGeometry,
    width: BitWidth,
) -> Result<EncodedPattern> {
    if speeds.len() != geometry.rows() {
        return Err(HopfieldError::PatternSizeMismatch {
            expected: geometry.rows(),
            actual: speeds.len(),
        });
    }

    let max = width.max_magnitude() as f64;
    let mut bits = Vec::with_capacity(geometry.unit_count() * width.block_len());
    for row in speeds {
        if row.len() != geometry.cols() {
            return Err(HopfieldError::PatternSizeMismatch {
                expected: geometry.cols(),
                actual: row.len(),
            });
        }
        for &speed in row {
            encode_into(speed as f64 / max, width, &mut bits)?;
        }
    }
    EncodedPattern::from_bits(bits)
}

/// The actuation side of the control loop: something that holds unit speeds.
pub trait Actuator {
    fn grid(&self) -> (usize, usize);

    fn unit_speed(&self, row: usize, col: usize) -> i64;

    fn set_unit_speed(&mut self, row: usize, col: usize, speed: i64);

    fn all_speeds(&self) -> SpeedMatrix {
        let (rows, cols) = self.grid();
        (0..rows)
            .map(|r| (0..cols).map(|c| self.unit_speed(r, c)).collect())
            .collect()
    }

    fn set_all_speeds(&mut self, speeds: &[Vec<i64>]) {
        for (r, row) in speeds.iter().enumerate() {
            for (c, &speed) in row.iter().enumerate() {
                self.set_unit_speed(r, c, speed);
            }
        }
    }
}

/// In-memory actuator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedTable {
    rows: usize,
    cols: usize,
    speeds: Vec<i64>,
}

impl SpeedTable {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            speeds: vec![0; rows * cols],
        }
    }

    /// Build from a rectangular matrix.
    pub fn from_matrix(speeds: &[Vec<i64>]) -> Result<Self> {
        let rows = speeds.len();
        let cols = speeds.first().map_or(0, Vec::len);
        if let Some(bad) = speeds.iter().find(|r| r.len() != cols) {
            return Err(HopfieldError::PatternSizeMismatch {
                expected: cols,
                actual: bad.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            speeds: speeds.concat(),
        })
    }
}

impl Actuator for SpeedTable {
    fn grid(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn unit_speed(&self, row: usize, col: usize) -> i64 {
        self.speeds[row * self.cols + col]
    }

    fn set_unit_speed(&mut self, row: usize, col: usize, speed: i64) {
        self.speeds[row * self.cols + col] = speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (GridGeometry, BitWidth) {
        (
            GridGeometry::new(2, 3, 0.1).unwrap(),
            BitWidth::new(4).unwrap(),
        )
    }

    #[test]
    fn speeds_survive_encode_decode() {
        let (g, w) = setup();
        let speeds = vec![vec![-7, 0, 3], vec![7, -1, 5]];
        let pattern = encode_all(&speeds, &g, w).unwrap();
        assert_eq!(pattern.len(), 24);
        assert_eq!(decode_all(pattern.as_slice(), &g, w).unwrap(), speeds);
    }

    #[test]
    fn decode_reads_relaxing_state() {
        let (g, w) = setup();
        let mut state = vec![-0.3; 24];
        // Unit (1, 2): sign set, magnitude 0b110.
        state[20..24].copy_from_slice(&[0.9, 0.1, 0.4, -0.2]);
        let speeds = decode_all(&state, &g, w).unwrap();
        assert_eq!(speeds[1][2], 6);
        assert_eq!(speeds[0][0], 0);
    }

    #[test]
    fn rejects_bad_dimensions_and_overflow() {
        let (g, w) = setup();
        assert!(matches!(
            decode_all(&[1i8; 20], &g, w),
            Err(HopfieldError::PatternSizeMismatch {
                expected: 24,
                actual: 20
            })
        ));
        assert!(encode_all(&[vec![0, 0, 0]], &g, w).is_err());
        assert!(encode_all(&[vec![0, 0], vec![0, 0]], &g, w).is_err());
        assert!(matches!(
            encode_all(&[vec![8, 0, 0], vec![0, 0, 0]], &g, w),
            Err(HopfieldError::EncodeOverflow { .. })
        ));
    }

    #[test]
    fn speed_table_acts_as_actuator() {
        let mut table = SpeedTable::new(2, 2);
        table.set_all_speeds(&[vec![1, 2], vec![3, 4]]);
        assert_eq!(table.unit_speed(1, 0), 3);
        assert_eq!(table.all_speeds(), vec![vec![1, 2], vec![3, 4]]);

        let from = SpeedTable::from_matrix(&[vec![1, 2], vec![3, 4]]).unwrap();
        assert_eq!(from, table);
        assert!(SpeedTable::from_matrix(&[vec![1, 2], vec![3]]).is_err());
    }
}
