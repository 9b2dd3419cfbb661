use crate::error::{FieldError, Result};
use crate::grid::GridField;

/// Radii at or below this are rejected.
pub const IMPULSE_RADIUS_EPSILON: f64 = 1e-9;

/// Gaussian support in multiples of the radius; cells further out get exactly 0.
pub const IMPULSE_SUPPORT_RADII: f64 = 3.0;

/// Transient Gaussian bump applied for exactly one step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceImpulse {
    /// Normalized center in [0, 1]²
    pub center: (f64, f64),
    /// Normalized radius
    pub radius: f64,
    pub strength: f64,
}

impl SourceImpulse {
    pub fn new(center: (f64, f64), radius: f64, strength: f64) -> Result<Self> {
        if !radius.is_finite() || radius <= IMPULSE_RADIUS_EPSILON {
            return Err(FieldError::impulse(format!(
                "radius must be positive, got {}",
                radius
            )));
        }
        if !strength.is_finite() {
            return Err(FieldError::impulse(format!(
                "strength must be finite, got {}",
                strength
            )));
        }
        let (u, v) = center;
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
            return Err(FieldError::impulse(format!(
                "center ({}, {}) is outside the unit square",
                u, v
            )));
        }
        Ok(Self {
            center,
            radius,
            strength,
        })
    }

    pub fn support(&self) -> f64 {
        IMPULSE_SUPPORT_RADII * self.radius
    }

    /// `strength * exp(-d² / radius²)` inside the support, 0 outside.
    pub fn contribution(&self, u: f64, v: f64) -> f64 {
        let du = u - self.center.0;
        let dv = v - self.center.1;
        let dist_sq = du * du + dv * dv;
        let support = self.support();
        if dist_sq > support * support {
            return 0.0;
        }
        self.strength * (-dist_sq / (self.radius * self.radius)).exp()
    }

    // Inclusive cell range covering [c - support, c + support] on one axis
    fn cell_span(&self, c: f64, resolution: usize) -> (usize, usize) {
        let last = (resolution - 1) as f64;
        let lo = ((c - self.support()) * last).floor().max(0.0) as usize;
        let hi = ((c + self.support()) * last).ceil().min(last) as usize;
        (lo, hi)
    }
}

/// Pending impulses for the next step.
#[derive(Clone, Debug, Default)]
pub struct SourceInjector {
    pending: Vec<SourceImpulse>,
}

impl SourceInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, center: (f64, f64), radius: f64, strength: f64) -> Result<()> {
        let impulse = SourceImpulse::new(center, radius, strength)?;
        self.pending.push(impulse);
        Ok(())
    }

    pub fn pending(&self) -> &[SourceImpulse] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Add every pending impulse into `scratch`, then empty the queue.
    ///
    /// Contributions sum across impulses. The queue is cleared even when no
    /// cell falls inside any impulse's support. Returns the number of impulses
    /// consumed.
    pub fn rasterize(&mut self, scratch: &mut GridField) -> usize {
        let resolution = scratch.resolution();
        let consumed = self.pending.len();

        for impulse in self.pending.drain(..) {
            let (x_lo, x_hi) = impulse.cell_span(impulse.center.0, resolution);
            let (y_lo, y_hi) = impulse.cell_span(impulse.center.1, resolution);
            let cells = scratch.cells_mut();

            for y in y_lo..=y_hi {
                let v = y as f64 / (resolution - 1) as f64;
                for x in x_lo..=x_hi {
                    let u = x as f64 / (resolution - 1) as f64;
                    cells[[y, x]] += impulse.contribution(u, v);
                }
            }
        }

        consumed
    }
}
