use crate::obstacles::{union_predicate, ObstacleShape};
use crate::simulation::{SimulationParameters, WaveSimulation};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Grid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_resolution")]
    pub resolution: usize,
}

fn default_resolution() -> usize {
    256
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
        }
    }
}

impl GridConfig {
    fn validate(&self) -> Result<()> {
        if self.resolution <= 1 {
            return Err(anyhow!(
                "Grid resolution must be at least 2, got {}",
                self.resolution
            ));
        }
        Ok(())
    }
}

/// Run length and progress reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_steps")]
    pub steps: u64,
    #[serde(default = "default_report_period")]
    pub report_period: u64,
}

fn default_steps() -> u64 {
    600
}

fn default_report_period() -> u64 {
    100
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            report_period: default_report_period(),
        }
    }
}

impl RunConfig {
    fn validate(&self) -> Result<()> {
        if self.report_period == 0 {
            return Err(anyhow!("report_period must be positive"));
        }
        Ok(())
    }
}

/// Impulse fired at `at_step`, and again every `period` steps if set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpulseConfig {
    pub u: f64,
    pub v: f64,
    pub radius: f64,
    pub strength: f64,
    #[serde(default)]
    pub at_step: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u64>,
}

impl ImpulseConfig {
    /// Whether this impulse fires right before step `step` (0-based).
    pub fn fires_at(&self, step: u64) -> bool {
        match self.period {
            Some(period) if period > 0 => {
                step >= self.at_step && (step - self.at_step) % period == 0
            }
            _ => step == self.at_step,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.u) || !(0.0..=1.0).contains(&self.v) {
            return Err(anyhow!(
                "Impulse position ({}, {}) is outside the unit square",
                self.u,
                self.v
            ));
        }
        if self.radius <= 0.0 {
            return Err(anyhow!("Impulse radius must be positive, got {}", self.radius));
        }
        if self.period == Some(0) {
            return Err(anyhow!("Impulse period must be positive"));
        }
        Ok(())
    }
}

/// Complete scene configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub wave: SimulationParameters,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub impulses: Vec<ImpulseConfig>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleShape>,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| anyhow!("Failed to parse TOML config: {}", e))?;

        // Validate before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.run.validate()?;
        self.wave
            .validate()
            .map_err(|e| anyhow!("Invalid [wave] section: {}", e))?;
        for impulse in &self.impulses {
            impulse.validate()?;
        }
        Ok(())
    }

    /// Build a simulation with this scene's grid, parameters and obstacles.
    pub fn build_simulation(&self) -> Result<WaveSimulation> {
        let mut sim = WaveSimulation::new(self.grid.resolution, self.wave)?;
        if !self.obstacles.is_empty() {
            sim.configure_obstacles(union_predicate(self.obstacles.clone()));
        }
        Ok(sim)
    }

    pub fn log_summary(&self) {
        info!("=== Scene Configuration ===");
        info!("Grid: {}x{}", self.grid.resolution, self.grid.resolution);
        info!(
            "Wave: speed={} (limit {:.4}), damping={}, clamp=±{}",
            self.wave.wave_speed,
            self.wave.max_wave_speed(),
            self.wave.damping,
            self.wave.clamp_bound
        );
        info!(
            "Run: {} steps, report every {}",
            self.run.steps, self.run.report_period
        );
        info!("Impulses: {}", self.impulses.len());
        for (i, imp) in self.impulses.iter().enumerate() {
            match imp.period {
                Some(period) => info!(
                    "  Impulse {}: ({}, {}) r={} s={} from step {} every {}",
                    i, imp.u, imp.v, imp.radius, imp.strength, imp.at_step, period
                ),
                None => info!(
                    "  Impulse {}: ({}, {}) r={} s={} at step {}",
                    i, imp.u, imp.v, imp.radius, imp.strength, imp.at_step
                ),
            }
        }
        info!("Obstacles: {} shape(s)", self.obstacles.len());
    }
}
