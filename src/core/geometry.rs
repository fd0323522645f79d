#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{HopfieldError, Result};

/// One raw (unnormalized) target value per unit, row-major.
pub type RawPattern = Vec<f64>;

/// A canonical swarm maneuver: forward speed and right-turn contribution.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Maneuver {
    pub forward: f64,
    pub right: f64,
}

impl Maneuver {
    pub const FORWARD: Maneuver = Maneuver::new(1.0, 0.0);
    pub const BACKWARD: Maneuver = Maneuver::new(-1.0, 0.0);
    pub const RIGHT: Maneuver = Maneuver::new(0.0, 1.0);
    pub const LEFT: Maneuver = Maneuver::new(0.0, -1.0);

    pub const fn new(forward: f64, right: f64) -> Self {
        Self { forward, right }
    }
}

/// Grid layout of the swarm.
///
/// Per-unit quantities are indexed row-major: `row * cols + col`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridGeometry {
    rows: u32,
    cols: u32,
    unit_size: f64,
}

impl GridGeometry {
    pub fn new(rows: u32, cols: u32, unit_size: f64) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(HopfieldError::InvalidConfig("rows and cols must be >= 1"));
        }
        if !unit_size.is_finite() || unit_size < 0.0 {
            return Err(HopfieldError::InvalidConfig(
                "unit_size must be finite and >= 0",
            ));
        }
        Ok(Self {
            rows,
            cols,
            unit_size,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows as usize
    }

    pub fn cols(&self) -> usize {
        self.cols as usize
    }

    pub fn unit_size(&self) -> f64 {
        self.unit_size
    }

    pub fn unit_count(&self) -> usize {
        self.rows() * self.cols()
    }

    #[inline]
    pub fn unit_index(&self, row: usize, col: usize) -> usize {
        row * self.cols() + col
    }

    /// Notional center of the whole grid, in (row, col) coordinates.
    pub fn center(&self) -> (f64, f64) {
        (
            self.rows as f64 * self.unit_size / 2.0,
            self.cols as f64 * self.unit_size / 2.0,
        )
    }

    pub fn unit_center(&self, row: usize, col: usize) -> (f64, f64) {
        let s = self.unit_size;
        (row as f64 * s + s / 2.0, col as f64 * s + s / 2.0)
    }

    /// Integer-spaced positions centered on the origin, for display.
    pub fn centered_positions(&self) -> Vec<(f64, f64)> {
        let (rows, cols) = (self.rows as i64, self.cols as i64);
        let mut out = Vec::with_capacity(self.unit_count());
        for i in 0..rows {
            for j in 0..cols {
                out.push(((2 * i - rows + 1) as f64, (2 * j - cols + 1) as f64));
            }
        }
        out
    }

    /// Raw target values of one maneuver.
    ///
    /// Each unit gets `forward / wheel_radius + right * distance * direction * product`
    /// where `distance` is its distance to the grid center, `direction` is 0 on the
    /// center row and 1 elsewhere, and `product = 1 / cos(atan2(d_col, d_row))`.
    /// On the center row the (very large) angular product is multiplied by zero.
    pub fn raw_pattern(&self, maneuver: Maneuver, wheel_radius: f64) -> Result<RawPattern> {
        let center = self.center();
        let forward_term = maneuver.forward / wheel_radius;

        let mut out = Vec::with_capacity(self.unit_count());
        for row in 0..self.rows() {
            for col in 0..self.cols() {
                let unit = self.unit_center(row, col);
                let d_row = unit.0 - center.0;
                let d_col = unit.1 - center.1;

                let distance = d_row.hypot(d_col);
                let direction = if center.0 - unit.0 == 0.0 { 0.0 } else { 1.0 };

                let cos = d_col.atan2(d_row).cos();
                if cos == 0.0 {
                    return Err(HopfieldError::GeometryDegenerate { row, col });
                }
                let product = 1.0 / cos;

                let value = forward_term + maneuver.right * distance * direction * product;
                if !value.is_finite() {
                    return Err(HopfieldError::GeometryDegenerate { row, col });
                }
                out.push(value);
            }
        }
        Ok(out)
    }
}
