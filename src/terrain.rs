//! Terrain heightmap payload carried by `terrain` entities.
//!
//! The service never samples the grid; it only checks that the grid agrees
//! with the declared extents before the entity is admitted to a session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TerrainError {
    #[error("length and width must be positive whole numbers (got {length} x {width})")]
    BadExtent { length: f64, width: f64 },

    #[error("height must be a non-negative number (got {0})")]
    BadHeight(f64),

    #[error("heights has {actual} rows, expected {expected}")]
    RowCount { expected: usize, actual: usize },

    #[error("heights row {row} has {actual} values, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("heights[{row}][{col}] is not finite")]
    NonFinite { row: usize, col: usize },
}

/// A `length` x `width` grid of heights, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainGrid {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub heights: Vec<Vec<f64>>,
}

impl TerrainGrid {
    pub fn new(
        length: f64,
        width: f64,
        height: f64,
        heights: Vec<Vec<f64>>,
    ) -> Result<Self, TerrainError> {
        let rows = whole(length);
        let cols = whole(width);
        let (Some(rows), Some(cols)) = (rows, cols) else {
            return Err(TerrainError::BadExtent { length, width });
        };

        if !height.is_finite() || height < 0.0 {
            return Err(TerrainError::BadHeight(height));
        }

        if heights.len() != rows {
            return Err(TerrainError::RowCount {
                expected: rows,
                actual: heights.len(),
            });
        }

        for (r, row) in heights.iter().enumerate() {
            if row.len() != cols {
                return Err(TerrainError::RowLength {
                    row: r,
                    expected: cols,
                    actual: row.len(),
                });
            }
            if let Some(c) = row.iter().position(|h| !h.is_finite()) {
                return Err(TerrainError::NonFinite { row: r, col: c });
            }
        }

        Ok(Self {
            length,
            width,
            height,
            heights,
        })
    }

    pub fn rows(&self) -> usize {
        self.heights.len()
    }

    pub fn cols(&self) -> usize {
        self.heights.first().map_or(0, Vec::len)
    }
}

/// `Some(n)` when `v` is a positive integer-valued float.
fn whole(v: f64) -> Option<usize> {
    if v.is_finite() && v >= 1.0 && v.fract() == 0.0 {
        Some(v as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: usize, cols: usize) -> Vec<Vec<f64>> {
        vec![vec![0.5; cols]; rows]
    }

    #[test]
    fn accepts_grid_matching_extents() {
        let t = TerrainGrid::new(3.0, 2.0, 10.0, grid(3, 2)).unwrap();
        assert_eq!(t.rows(), 3);
        assert_eq!(t.cols(), 2);
    }

    #[test]
    fn rejects_wrong_row_count() {
        let err = TerrainGrid::new(4.0, 2.0, 10.0, grid(3, 2)).unwrap_err();
        assert_eq!(
            err,
            TerrainError::RowCount {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn rejects_ragged_rows() {
        let mut heights = grid(2, 2);
        heights[1].push(1.0);
        let err = TerrainGrid::new(2.0, 2.0, 1.0, heights).unwrap_err();
        assert!(matches!(err, TerrainError::RowLength { row: 1, .. }));
    }

    #[test]
    fn rejects_fractional_or_zero_extent() {
        assert!(matches!(
            TerrainGrid::new(2.5, 2.0, 1.0, grid(2, 2)),
            Err(TerrainError::BadExtent { .. })
        ));
        assert!(matches!(
            TerrainGrid::new(0.0, 0.0, 1.0, Vec::new()),
            Err(TerrainError::BadExtent { .. })
        ));
    }

    #[test]
    fn rejects_negative_height_and_nan_samples() {
        assert_eq!(
            TerrainGrid::new(1.0, 1.0, -1.0, grid(1, 1)).unwrap_err(),
            TerrainError::BadHeight(-1.0)
        );
        let err = TerrainGrid::new(1.0, 2.0, 1.0, vec![vec![0.0, f64::NAN]]).unwrap_err();
        assert_eq!(err, TerrainError::NonFinite { row: 0, col: 1 });
    }
}
