use crate::error::{FieldError, Result};
use ndarray::{Array2, ArrayView2};

/// Square R×R scalar buffer, row-major (`cells[[y, x]]`).
///
/// Cell `(x, y)` sits at the normalized coordinate `(x / (R-1), y / (R-1))`,
/// so the corner cells land exactly on `0.0` and `1.0`.
#[derive(Clone, Debug, PartialEq)]
pub struct GridField {
    resolution: usize,
    cells: Array2<f64>,
}

impl GridField {
    pub fn new(resolution: usize) -> Result<Self> {
        if resolution <= 1 {
            return Err(FieldError::configuration(format!(
                "Grid resolution must be at least 2, got {}",
                resolution
            )));
        }
        Ok(Self {
            resolution,
            cells: Array2::zeros((resolution, resolution)),
        })
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.resolution && y < self.resolution
    }

    pub fn read(&self, x: usize, y: usize) -> Result<f64> {
        self.check_bounds(x, y)?;
        Ok(self.cells[[y, x]])
    }

    pub fn write(&mut self, x: usize, y: usize, value: f64) -> Result<()> {
        self.check_bounds(x, y)?;
        self.cells[[y, x]] = value;
        Ok(())
    }

    /// Reset every cell to zero without reallocating.
    pub fn zero(&mut self) {
        self.cells.fill(0.0);
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.cells.view()
    }

    pub(crate) fn cells_mut(&mut self) -> &mut Array2<f64> {
        &mut self.cells
    }

    /// Normalized coordinate of cell index `i` along either axis.
    pub fn coord(&self, i: usize) -> f64 {
        i as f64 / (self.resolution - 1) as f64
    }

    /// Cell whose center is closest to the normalized point `(u, v)`.
    /// Points outside the unit square snap to the nearest edge cell.
    pub fn nearest_cell(&self, u: f64, v: f64) -> (usize, usize) {
        let last = (self.resolution - 1) as f64;
        let snap = |t: f64| (t.clamp(0.0, 1.0) * last).round() as usize;
        (snap(u), snap(v))
    }

    /// Largest absolute cell value.
    pub fn peak_abs(&self) -> f64 {
        self.cells.iter().fold(0.0_f64, |peak, v| peak.max(v.abs()))
    }

    /// Sum of squared cell values.
    pub fn energy(&self) -> f64 {
        self.cells.iter().map(|v| v * v).sum()
    }

    fn check_bounds(&self, x: usize, y: usize) -> Result<()> {
        if self.in_bounds(x, y) {
            Ok(())
        } else {
            Err(FieldError::Index {
                x,
                y,
                resolution: self.resolution,
            })
        }
    }
}
