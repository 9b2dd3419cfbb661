use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Per-cell obstacle flags. Blocked cells are pinned to zero every step.
#[derive(Clone, Debug, PartialEq)]
pub struct ObstacleMask {
    blocked: Array2<bool>,
    blocked_count: usize,
}

impl ObstacleMask {
    /// Mask with no obstacles.
    pub fn open(resolution: usize) -> Self {
        Self {
            blocked: Array2::from_elem((resolution, resolution), false),
            blocked_count: 0,
        }
    }

    /// Evaluate `predicate(u, v)` at every cell's normalized coordinate.
    pub fn from_predicate<F>(resolution: usize, predicate: F) -> Self
    where
        F: Fn(f64, f64) -> bool,
    {
        let last = resolution.saturating_sub(1).max(1) as f64;
        let blocked = Array2::from_shape_fn((resolution, resolution), |(y, x)| {
            predicate(x as f64 / last, y as f64 / last)
        });
        let blocked_count = blocked.iter().filter(|&&b| b).count();
        Self {
            blocked,
            blocked_count,
        }
    }

    pub fn resolution(&self) -> usize {
        self.blocked.nrows()
    }

    /// Out-of-range cells report as open.
    pub fn is_blocked(&self, x: usize, y: usize) -> bool {
        self.blocked.get([y, x]).copied().unwrap_or(false)
    }

    pub fn blocked_cells(&self) -> usize {
        self.blocked_count
    }

    pub fn is_open(&self) -> bool {
        self.blocked_count == 0
    }

    pub fn covers_all(&self) -> bool {
        self.blocked_count == self.blocked.len()
    }

    pub(crate) fn cells(&self) -> &Array2<bool> {
        &self.blocked
    }
}

/// Obstacle primitive in normalized coordinates, as written in scene files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ObstacleShape {
    Rect {
        min: [f64; 2],
        max: [f64; 2],
    },
    Circle {
        center: [f64; 2],
        radius: f64,
    },
}

impl ObstacleShape {
    pub fn contains(&self, u: f64, v: f64) -> bool {
        match self {
            ObstacleShape::Rect { min, max } => {
                u >= min[0] && u <= max[0] && v >= min[1] && v <= max[1]
            }
            ObstacleShape::Circle { center, radius } => {
                let du = u - center[0];
                let dv = v - center[1];
                du * du + dv * dv <= radius * radius
            }
        }
    }
}

/// Predicate that is true inside any of `shapes`.
pub fn union_predicate(shapes: Vec<ObstacleShape>) -> impl Fn(f64, f64) -> bool + Send + Sync {
    move |u, v| shapes.iter().any(|shape| shape.contains(u, v))
}
