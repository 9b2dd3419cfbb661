//! Damped leapfrog update over the 5-point stencil.
//!
//! ```text
//! laplacian = c[x+1,y] + c[x-1,y] + c[x,y+1] + c[x,y-1] - 4 c[x,y]
//! next      = (2 - damping) c - (1 - damping) p + wave_speed² laplacian + source
//! ```
//!
//! Obstacle cells are written as 0. Neighbour lookups past the edge repeat the
//! edge cell, which gives a reflecting (zero-gradient) boundary. Every result
//! is clamped to `[-clamp_bound, clamp_bound]`.
//!
//! `next` is computed from frozen `previous`/`current`/`source` views only,
//! so rows are independent and can be spread over threads freely.

use crate::error::{FieldError, Result};
use crate::grid::GridField;
use crate::obstacles::ObstacleMask;
use crate::simulation::SimulationParameters;
use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis};
use rayon::prelude::*;

/// Read-only inputs of one step.
#[derive(Clone, Copy, Debug)]
pub struct StepInputs<'a> {
    pub previous: &'a GridField,
    pub current: &'a GridField,
    pub source: &'a GridField,
    pub obstacles: &'a ObstacleMask,
}

/// Cells the safety clamp had to act on during one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KernelStats {
    /// NaN or infinite results, forced into the clamp range
    pub non_finite_cells: usize,
    /// Finite results outside the clamp range
    pub clamped_cells: usize,
}

impl KernelStats {
    fn merge(self, other: Self) -> Self {
        Self {
            non_finite_cells: self.non_finite_cells + other.non_finite_cells,
            clamped_cells: self.clamped_cells + other.clamped_cells,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Coefficients {
    current: f64,
    previous: f64,
    speed_sq: f64,
    bound: f64,
}

impl Coefficients {
    fn new(params: &SimulationParameters) -> Self {
        Self {
            current: 2.0 - params.damping,
            previous: 1.0 - params.damping,
            speed_sq: params.wave_speed * params.wave_speed,
            bound: params.clamp_bound,
        }
    }

    fn bounded(&self, raw: f64, stats: &mut KernelStats) -> f64 {
        if raw.is_nan() {
            stats.non_finite_cells += 1;
            0.0
        } else if raw.is_infinite() {
            stats.non_finite_cells += 1;
            self.bound.copysign(raw)
        } else if raw.abs() > self.bound {
            stats.clamped_cells += 1;
            raw.clamp(-self.bound, self.bound)
        } else {
            raw
        }
    }
}

struct Frozen<'a> {
    previous: ArrayView2<'a, f64>,
    current: ArrayView2<'a, f64>,
    source: ArrayView2<'a, f64>,
    obstacles: &'a Array2<bool>,
    n: usize,
}

/// Compute `next` with rows distributed over the rayon pool.
pub fn step_parallel(
    inputs: &StepInputs<'_>,
    params: &SimulationParameters,
    next: &mut GridField,
) -> Result<KernelStats> {
    check_shapes(inputs, next)?;
    let frozen = freeze(inputs);
    let coefficients = Coefficients::new(params);

    let stats = next
        .cells_mut()
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .map(|(y, row)| update_row(y, row, &frozen, &coefficients))
        .reduce(KernelStats::default, KernelStats::merge);

    Ok(stats)
}

/// Single-threaded reference path. Produces the same bits as [`step_parallel`].
pub fn step_serial(
    inputs: &StepInputs<'_>,
    params: &SimulationParameters,
    next: &mut GridField,
) -> Result<KernelStats> {
    check_shapes(inputs, next)?;
    let frozen = freeze(inputs);
    let coefficients = Coefficients::new(params);

    let stats = next
        .cells_mut()
        .axis_iter_mut(Axis(0))
        .enumerate()
        .fold(KernelStats::default(), |acc, (y, row)| {
            acc.merge(update_row(y, row, &frozen, &coefficients))
        });

    Ok(stats)
}

fn freeze<'a>(inputs: &StepInputs<'a>) -> Frozen<'a> {
    Frozen {
        previous: inputs.previous.view(),
        current: inputs.current.view(),
        source: inputs.source.view(),
        obstacles: inputs.obstacles.cells(),
        n: inputs.current.resolution(),
    }
}

fn update_row(
    y: usize,
    mut row: ArrayViewMut1<'_, f64>,
    frozen: &Frozen<'_>,
    coefficients: &Coefficients,
) -> KernelStats {
    let n = frozen.n;
    let cur = &frozen.current;
    let y_up = y.saturating_sub(1);
    let y_down = (y + 1).min(n - 1);
    let mut stats = KernelStats::default();

    for (x, out) in row.iter_mut().enumerate() {
        // Dirichlet pin
        if frozen.obstacles[[y, x]] {
            *out = 0.0;
            continue;
        }

        let x_left = x.saturating_sub(1);
        let x_right = (x + 1).min(n - 1);
        let center = cur[[y, x]];
        let laplacian = cur[[y, x_right]] + cur[[y, x_left]] + cur[[y_down, x]] + cur[[y_up, x]]
            - 4.0 * center;

        let raw = coefficients.current * center - coefficients.previous * frozen.previous[[y, x]]
            + coefficients.speed_sq * laplacian
            + frozen.source[[y, x]];
        *out = coefficients.bounded(raw, &mut stats);
    }

    stats
}

fn check_shapes(inputs: &StepInputs<'_>, next: &GridField) -> Result<()> {
    let expected = next.resolution();
    let shapes = [
        inputs.previous.view().dim(),
        inputs.current.view().dim(),
        inputs.source.view().dim(),
        inputs.obstacles.cells().dim(),
    ];
    for (rows, cols) in shapes {
        if rows != expected || cols != expected {
            return Err(FieldError::Shape {
                expected,
                rows,
                cols,
            });
        }
    }
    Ok(())
}
