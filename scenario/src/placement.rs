//! NPC placement geometry: ring sampling around the ego spawn, pairwise
//! spacing along the candidate's forward axis, and the lane-distance check.
//!
//! # Spacing criterion
//! sep(c, o) = |(c.pos − o.pos) · fwd(c)|
//!
//! Accept `c` if sep(c, o) > gap for every placed `o`, where
//! gap = min_gap, or min_gap × long_gap_factor when either vehicle is long.
//!
//! A rejected candidate is pushed back by `min_gap` along its own forward
//! axis and re-checked against everything, up to `max_shift_attempts` times.

use crate::config::ScenarioConfig;
use serde::{Deserialize, Serialize};
use sim_client::{Transform, Vector};

/// Caller-tunable spacing and sampling radii.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpacingParams {
    /// Minimum forward separation between two vehicles (m)
    pub min_gap: f64,
    /// Inner radius of the sampling ring around the ego spawn (m)
    pub spawn_radius_min: f64,
    /// Outer radius of the sampling ring (m)
    pub spawn_radius_max: f64,
}

impl Default for SpacingParams {
    fn default() -> Self {
        Self {
            min_gap: 5.0,
            spawn_radius_min: 10.0,
            spawn_radius_max: 500.0,
        }
    }
}

impl SpacingParams {
    pub fn validate(&self) -> Result<(), String> {
        let finite = [self.min_gap, self.spawn_radius_min, self.spawn_radius_max]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err("spacing parameters must be finite".into());
        }
        if self.min_gap <= 0.0 {
            return Err(format!("min_gap must be positive, got {}", self.min_gap));
        }
        if self.spawn_radius_min < 0.0 || self.spawn_radius_max < self.spawn_radius_min {
            return Err(format!(
                "spawn radii must satisfy 0 <= min <= max, got {}..{}",
                self.spawn_radius_min, self.spawn_radius_max
            ));
        }
        Ok(())
    }
}

/// A vehicle already on the map, as far as spacing is concerned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedVehicle {
    pub transform: Transform,
    /// Needs the widened gap (bus, truck, ...)
    pub long: bool,
}

/// Spacing thresholds resolved from the request and the scenario config.
#[derive(Clone, Copy, Debug)]
pub struct SpacingRules {
    pub min_gap: f64,
    pub long_gap_factor: f64,
    pub max_shift_attempts: u32,
}

impl SpacingRules {
    pub fn new(params: &SpacingParams, config: &ScenarioConfig) -> Self {
        Self {
            min_gap: params.min_gap,
            long_gap_factor: config.long_gap_factor,
            max_shift_attempts: config.max_shift_attempts,
        }
    }

    pub fn required_gap(&self, a_long: bool, b_long: bool) -> f64 {
        if a_long || b_long {
            self.min_gap * self.long_gap_factor
        } else {
            self.min_gap
        }
    }

    pub fn is_clear_of(&self, candidate: &Transform, long: bool, placed: &[PlacedVehicle]) -> bool {
        placed.iter().all(|other| {
            forward_separation(candidate, &other.transform) > self.required_gap(long, other.long)
        })
    }

    /// Shift `candidate` back until it clears every placed vehicle.
    /// `None` once the shift budget is spent.
    pub fn resolve(
        &self,
        candidate: Transform,
        long: bool,
        placed: &[PlacedVehicle],
    ) -> Option<Transform> {
        let mut candidate = candidate;
        for _ in 0..self.max_shift_attempts {
            if self.is_clear_of(&candidate, long, placed) {
                return Some(candidate);
            }
            let back = candidate.forward() * -self.min_gap;
            candidate = candidate.translated(back);
        }
        None
    }
}

/// Separation between two poses measured along `candidate`'s forward axis.
pub fn forward_separation(candidate: &Transform, other: &Transform) -> f64 {
    (candidate.position - other.position)
        .dot(&candidate.forward())
        .abs()
}

/// `candidate` still sits on a drivable lane: summed per-axis distance to its
/// own lane projection below `tolerance`.
pub fn is_on_lane(candidate: &Transform, projected: &Transform, tolerance: f64) -> bool {
    candidate.position.manhattan_distance(&projected.position) < tolerance
}

/// Point `distance` away from `origin` at `angle` (radians) in the ground
/// (x/z) plane, at the origin's height.
pub fn ring_point(origin: Vector, angle: f64, distance: f64) -> Vector {
    Vector::new(
        origin.x + distance * angle.cos(),
        origin.y,
        origin.z + distance * angle.sin(),
    )
}

pub fn is_long_vehicle(name: &str, long_types: &[String]) -> bool {
    long_types.iter().any(|t| t == name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
