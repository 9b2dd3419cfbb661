use crate::error::{FieldError, Result};
use crate::grid::GridField;
use crate::kernel::{self, KernelStats, StepInputs};
use crate::obstacles::ObstacleMask;
use crate::source::SourceInjector;
use crate::wavefield::{FieldBufferSet, Role};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_1_SQRT_2;
use tracing::{debug, trace, warn};

/// Stability limit of the explicit 2D 5-point leapfrog scheme, in grid units.
pub const MAX_STABLE_WAVE_SPEED: f64 = FRAC_1_SQRT_2;

/// Fraction of `max_wave_speed()` above which a valid wave speed is logged as
/// close to instability.
pub const SOFT_CFL_FRACTION: f64 = 0.9;

/// Read-only view of the current field, valid until the next step.
pub type FieldView<'a> = ArrayView2<'a, f64>;

type ObstaclePredicate = Box<dyn Fn(f64, f64) -> bool + Send + Sync>;

/// Tunable integrator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    /// Courant coefficient (cells per step)
    pub wave_speed: f64,
    /// Velocity damping per step, in [0, 1)
    pub damping: f64,
    /// Safety clamp applied to every cell after a step
    pub clamp_bound: f64,
    /// Fraction of `MAX_STABLE_WAVE_SPEED` that `wave_speed` may use
    pub cfl_safety: f64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            wave_speed: 0.3,
            damping: 0.02,
            clamp_bound: 10.0,
            cfl_safety: 0.75,
        }
    }
}

impl SimulationParameters {
    pub fn max_wave_speed(&self) -> f64 {
        self.cfl_safety * MAX_STABLE_WAVE_SPEED
    }

    /// True when `wave_speed` stays inside the safety margin.
    pub fn check_cfl(&self) -> bool {
        self.wave_speed <= self.max_wave_speed()
    }

    /// True when `wave_speed` is valid but above `SOFT_CFL_FRACTION` of the limit.
    pub fn near_cfl_limit(&self) -> bool {
        self.check_cfl() && self.wave_speed > SOFT_CFL_FRACTION * self.max_wave_speed()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.cfl_safety > 0.0 && self.cfl_safety <= 1.0) {
            return Err(FieldError::configuration(format!(
                "cfl_safety must be in (0, 1], got {}",
                self.cfl_safety
            )));
        }
        if !(self.wave_speed.is_finite() && self.wave_speed > 0.0) {
            return Err(FieldError::configuration(format!(
                "wave_speed must be positive, got {}",
                self.wave_speed
            )));
        }
        if !self.check_cfl() {
            return Err(FieldError::configuration(format!(
                "wave_speed {} exceeds the stable limit {:.4} (cfl_safety {})",
                self.wave_speed,
                self.max_wave_speed(),
                self.cfl_safety
            )));
        }
        if !(0.0..1.0).contains(&self.damping) {
            return Err(FieldError::configuration(format!(
                "damping must be in [0, 1), got {}",
                self.damping
            )));
        }
        if !(self.clamp_bound.is_finite() && self.clamp_bound > 0.0) {
            return Err(FieldError::configuration(format!(
                "clamp_bound must be positive, got {}",
                self.clamp_bound
            )));
        }
        Ok(())
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Step counter after this step
    pub step: u64,
    pub impulses_applied: usize,
    pub non_finite_cells: usize,
    pub clamped_cells: usize,
}

/// Caller-owned simulation context: three rotating field buffers, the source
/// scratch buffer, pending impulses, obstacles and parameters.
///
/// [`current_field`](Self::current_field) borrows the simulation immutably
/// while [`step`](Self::step) needs `&mut self`, so a view can never outlive
/// the step that would reassign its storage.
pub struct WaveSimulation {
    buffers: FieldBufferSet,
    scratch: GridField,
    injector: SourceInjector,
    obstacles: ObstacleMask,
    obstacle_predicate: Option<ObstaclePredicate>,
    params: SimulationParameters,
    current_step: u64,
}

impl WaveSimulation {
    pub fn new(resolution: usize, params: SimulationParameters) -> Result<Self> {
        params.validate()?;
        warn_if_near_cfl_limit(&params);
        let buffers = FieldBufferSet::new(resolution)?;
        let scratch = GridField::new(resolution)?;
        debug!(
            resolution,
            wave_speed = params.wave_speed,
            damping = params.damping,
            "Allocated wave field"
        );

        Ok(Self {
            buffers,
            scratch,
            injector: SourceInjector::new(),
            obstacles: ObstacleMask::open(resolution),
            obstacle_predicate: None,
            params,
            current_step: 0,
        })
    }

    pub fn resolution(&self) -> usize {
        self.buffers.resolution()
    }

    pub fn parameters(&self) -> &SimulationParameters {
        &self.params
    }

    /// Swap parameters between steps. Invalid parameters leave the old ones in place.
    pub fn set_parameters(&mut self, params: SimulationParameters) -> Result<()> {
        params.validate()?;
        warn_if_near_cfl_limit(&params);
        self.params = params;
        Ok(())
    }

    pub fn step_count(&self) -> u64 {
        self.current_step
    }

    pub fn pending_impulses(&self) -> usize {
        self.injector.len()
    }

    /// Queue a Gaussian impulse for the next step only.
    pub fn inject_impulse(&mut self, u: f64, v: f64, radius: f64, strength: f64) -> Result<()> {
        self.injector.enqueue((u, v), radius, strength)
    }

    /// Replace the obstacle mask. The field itself is left untouched; newly
    /// blocked cells are pinned from the next step on.
    pub fn configure_obstacles<F>(&mut self, predicate: F)
    where
        F: Fn(f64, f64) -> bool + Send + Sync + 'static,
    {
        self.obstacles = ObstacleMask::from_predicate(self.resolution(), &predicate);
        self.obstacle_predicate = Some(Box::new(predicate));
        debug!(
            blocked = self.obstacles.blocked_cells(),
            "Configured obstacles"
        );
    }

    pub fn clear_obstacles(&mut self) {
        self.obstacles = ObstacleMask::open(self.resolution());
        self.obstacle_predicate = None;
    }

    pub fn obstacles(&self) -> &ObstacleMask {
        &self.obstacles
    }

    /// The buffer holding the latest state. All zero before the first step.
    pub fn current_field(&self) -> FieldView<'_> {
        self.buffers.field(Role::Current).view()
    }

    pub fn current(&self) -> &GridField {
        self.buffers.field(Role::Current)
    }

    /// Discard every buffer and reallocate at `resolution`, zero-filled.
    /// Obstacles are re-evaluated from the last configured predicate.
    pub fn resize(&mut self, resolution: usize) -> Result<()> {
        let buffers = FieldBufferSet::new(resolution)?;
        let scratch = GridField::new(resolution)?;

        self.buffers = buffers;
        self.scratch = scratch;
        self.injector.clear();
        self.obstacles = match &self.obstacle_predicate {
            Some(predicate) => ObstacleMask::from_predicate(resolution, predicate),
            None => ObstacleMask::open(resolution),
        };
        self.current_step = 0;
        debug!(resolution, "Resized wave field");
        Ok(())
    }

    /// Zero all buffers, drop pending impulses and restart the step counter.
    pub fn reset(&mut self) {
        self.buffers.zero();
        self.scratch.zero();
        self.injector.clear();
        self.current_step = 0;
    }

    /// Advance one tick with the kernel spread over the rayon pool.
    pub fn step(&mut self) -> Result<StepReport> {
        self.advance(kernel::step_parallel)
    }

    /// Advance one tick on the calling thread.
    pub fn step_serial(&mut self) -> Result<StepReport> {
        self.advance(kernel::step_serial)
    }

    fn advance<K>(&mut self, kernel: K) -> Result<StepReport>
    where
        K: FnOnce(&StepInputs<'_>, &SimulationParameters, &mut GridField) -> Result<KernelStats>,
    {
        // 1. Rasterize this step's impulses
        self.scratch.zero();
        let impulses_applied = self.injector.rasterize(&mut self.scratch);

        // 2. previous/current -> next
        let (previous, current, next) = self.buffers.step_views();
        let inputs = StepInputs {
            previous,
            current,
            source: &self.scratch,
            obstacles: &self.obstacles,
        };
        let stats = kernel(&inputs, &self.params, next)?;

        // 3. Relabel roles
        self.buffers.rotate();
        self.current_step += 1;

        if stats.non_finite_cells > 0 {
            warn!(
                step = self.current_step,
                cells = stats.non_finite_cells,
                "Non-finite values after step, forced into clamp range"
            );
        }
        trace!(
            step = self.current_step,
            impulses_applied,
            clamped = stats.clamped_cells,
            "Step complete"
        );

        Ok(StepReport {
            step: self.current_step,
            impulses_applied,
            non_finite_cells: stats.non_finite_cells,
            clamped_cells: stats.clamped_cells,
        })
    }
}

fn warn_if_near_cfl_limit(params: &SimulationParameters) {
    if params.near_cfl_limit() {
        warn!(
            wave_speed = params.wave_speed,
            limit = params.max_wave_speed(),
            "Wave speed is close to the stability limit"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn undamped() -> SimulationParameters {
        SimulationParameters {
            wave_speed: 0.3,
            damping: 0.0,
            ..SimulationParameters::default()
        }
    }

    #[test]
    fn test_default_parameters_are_valid() {
        let params = SimulationParameters::default();
        assert!(params.validate().is_ok());
        assert!(params.check_cfl());
        assert_relative_eq!(params.max_wave_speed(), 0.75 * FRAC_1_SQRT_2);
    }

    #[test]
    fn test_parameter_bounds() {
        let base = SimulationParameters::default();
        let bad = [
            SimulationParameters { wave_speed: 0.0, ..base },
            SimulationParameters { wave_speed: 0.6, ..base },
            SimulationParameters { wave_speed: f64::NAN, ..base },
            SimulationParameters { damping: 1.0, ..base },
            SimulationParameters { damping: -0.1, ..base },
            SimulationParameters { clamp_bound: 0.0, ..base },
            SimulationParameters { cfl_safety: 1.5, ..base },
            SimulationParameters { cfl_safety: 0.0, ..base },
        ];
        for params in bad {
            assert!(
                matches!(params.validate(), Err(FieldError::Configuration(_))),
                "{:?} should be rejected",
                params
            );
        }
        // full margin allows up to the theoretical limit
        let edge = SimulationParameters {
            wave_speed: 0.7,
            cfl_safety: 1.0,
            ..base
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_soft_cfl_margin() {
        let base = SimulationParameters::default();
        assert!(!base.near_cfl_limit());

        // limit is 0.75 / sqrt(2) ~= 0.530, soft margin starts at ~0.477
        let close = SimulationParameters { wave_speed: 0.5, ..base };
        assert!(close.near_cfl_limit());
        assert!(close.validate().is_ok());
        assert!(WaveSimulation::new(8, close).is_ok());

        let mut sim = WaveSimulation::new(8, base).unwrap();
        sim.set_parameters(close).unwrap();
        assert_relative_eq!(sim.parameters().wave_speed, 0.5);

        // past the hard limit it is an error, not a warning
        let over = SimulationParameters { wave_speed: 0.6, ..base };
        assert!(!over.near_cfl_limit());
        assert!(over.validate().is_err());
    }

    #[test]
    fn test_clear_obstacles_reopens_grid() {
        let mut sim = WaveSimulation::new(9, undamped()).unwrap();
        sim.configure_obstacles(|_, _| true);
        assert!(sim.obstacles().covers_all());

        sim.clear_obstacles();
        assert!(sim.obstacles().is_open());

        sim.inject_impulse(0.5, 0.5, 0.1, 1.0).unwrap();
        sim.step().unwrap();
        assert_relative_eq!(sim.current().peak_abs(), 1.0);

        // a later resize must not bring the old mask back
        sim.resize(11).unwrap();
        assert!(sim.obstacles().is_open());
    }

    #[test]
    fn test_construction_errors() {
        assert!(matches!(
            WaveSimulation::new(1, SimulationParameters::default()),
            Err(FieldError::Configuration(_))
        ));
        let params = SimulationParameters {
            damping: 2.0,
            ..SimulationParameters::default()
        };
        assert!(WaveSimulation::new(16, params).is_err());
    }

    #[test]
    fn test_current_field_before_first_step_is_zero() {
        let sim = WaveSimulation::new(8, undamped()).unwrap();
        let view = sim.current_field();
        assert_eq!(view.dim(), (8, 8));
        assert!(view.iter().all(|&v| v == 0.0));
        assert_eq!(sim.step_count(), 0);
    }

    #[test]
    fn test_rejected_impulse_leaves_run_alone() {
        let mut sim = WaveSimulation::new(9, undamped()).unwrap();
        assert!(matches!(
            sim.inject_impulse(0.5, 0.5, 0.0, 1.0),
            Err(FieldError::Impulse(_))
        ));
        assert_eq!(sim.pending_impulses(), 0);
        let report = sim.step().unwrap();
        assert_eq!(report.impulses_applied, 0);
        assert_eq!(sim.current().peak_abs(), 0.0);
    }

    #[test]
    fn test_impulse_lasts_one_step() {
        let mut sim = WaveSimulation::new(9, undamped()).unwrap();
        sim.inject_impulse(0.5, 0.5, 0.1, 1.0).unwrap();
        assert_eq!(sim.pending_impulses(), 1);

        let first = sim.step().unwrap();
        assert_eq!(first.impulses_applied, 1);
        assert_eq!(first.step, 1);
        assert_eq!(sim.pending_impulses(), 0);
        assert_relative_eq!(sim.current().read(4, 4).unwrap(), 1.0);

        // second step has no source term: 2c - p + c² lap
        let second = sim.step().unwrap();
        assert_eq!(second.impulses_applied, 0);
        assert!(sim.current().read(4, 4).unwrap() < 2.0);
    }

    #[test]
    fn test_set_parameters_keeps_old_on_error() {
        let mut sim = WaveSimulation::new(4, undamped()).unwrap();
        let bad = SimulationParameters {
            wave_speed: 5.0,
            ..undamped()
        };
        assert!(sim.set_parameters(bad).is_err());
        assert_eq!(sim.parameters(), &undamped());

        let good = SimulationParameters {
            damping: 0.1,
            ..undamped()
        };
        sim.set_parameters(good).unwrap();
        assert_relative_eq!(sim.parameters().damping, 0.1);
    }

    #[test]
    fn test_configure_obstacles_does_not_reset_field() {
        let mut sim = WaveSimulation::new(9, undamped()).unwrap();
        sim.inject_impulse(0.5, 0.5, 0.1, 1.0).unwrap();
        sim.step().unwrap();
        let before = sim.current().clone();

        sim.configure_obstacles(|u, _| u < 0.2);
        assert_eq!(sim.current(), &before);
        assert_eq!(sim.step_count(), 1);
        assert_eq!(sim.obstacles().blocked_cells(), 2 * 9);
    }

    #[test]
    fn test_resize_rebuilds_everything() {
        let mut sim = WaveSimulation::new(9, undamped()).unwrap();
        sim.configure_obstacles(|u, _| u > 0.9);
        sim.inject_impulse(0.5, 0.5, 0.1, 1.0).unwrap();
        sim.step().unwrap();
        sim.inject_impulse(0.5, 0.5, 0.1, 1.0).unwrap();

        sim.resize(21).unwrap();

        assert_eq!(sim.resolution(), 21);
        assert_eq!(sim.current_field().dim(), (21, 21));
        assert_eq!(sim.current().peak_abs(), 0.0);
        assert_eq!(sim.pending_impulses(), 0);
        assert_eq!(sim.step_count(), 0);
        // u > 0.9 covers the last two columns of a 21 grid
        assert_eq!(sim.obstacles().blocked_cells(), 2 * 21);

        assert!(sim.resize(1).is_err());
        assert_eq!(sim.resolution(), 21);
    }

    #[test]
    fn test_reset() {
        let mut sim = WaveSimulation::new(9, undamped()).unwrap();
        sim.inject_impulse(0.5, 0.5, 0.1, 1.0).unwrap();
        sim.step().unwrap();
        sim.step().unwrap();
        sim.inject_impulse(0.2, 0.2, 0.1, 1.0).unwrap();

        sim.reset();

        assert_eq!(sim.step_count(), 0);
        assert_eq!(sim.pending_impulses(), 0);
        sim.step().unwrap();
        assert_eq!(sim.current().peak_abs(), 0.0);
    }
}
