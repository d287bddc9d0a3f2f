//! Terminal conditions and observers.
//!
//! These modules go last in a [`crate::module::ModuleList`] so they see the
//! position and energy after the tick. Reaching a condition is an ordinary
//! state transition: the candidate is deactivated with the module name as the
//! `"Deactivated"` reason.

use crate::candidate::Candidate;
use crate::error::{Error, Result};
use crate::module::{Context, Module};
use nalgebra::Vector3;

#[derive(Debug, Clone)]
pub struct MaximumTrajectoryLength {
    max_length: f64,
}

impl MaximumTrajectoryLength {
    pub fn new(max_length: f64) -> Result<Self> {
        if !(max_length > 0.0) {
            return Err(Error::invalid(format!(
                "maximum trajectory length must be positive, got {}",
                max_length
            )));
        }
        Ok(Self { max_length })
    }
}

impl Module for MaximumTrajectoryLength {
    fn process(&self, candidate: &mut Candidate, _ctx: &mut Context) {
        let length = candidate.trajectory_length();
        if length >= self.max_length {
            candidate.deactivate("MaximumTrajectoryLength");
        } else {
            candidate.limit_next_step(self.max_length - length);
        }
    }
}

#[derive(Debug, Clone)]
pub struct MinimumEnergy {
    min_energy: f64,
}

impl MinimumEnergy {
    pub fn new(min_energy: f64) -> Self {
        Self { min_energy }
    }
}

impl Module for MinimumEnergy {
    fn process(&self, candidate: &mut Candidate, _ctx: &mut Context) {
        if candidate.current().energy() < self.min_energy {
            candidate.deactivate("MinimumEnergy");
        }
    }
}

/// Flags candidates leaving a sphere with `"OutOfBounds"`.
///
/// The next step is limited to the distance to the surface plus `margin`,
/// so a candidate leaves by at most `margin`.
#[derive(Debug, Clone)]
pub struct SphericalBoundary {
    center: Vector3<f64>,
    radius: f64,
    margin: f64,
}

impl SphericalBoundary {
    pub fn new(center: Vector3<f64>, radius: f64, margin: f64) -> Result<Self> {
        if !(radius > 0.0) || !(margin > 0.0) {
            return Err(Error::invalid(format!(
                "spherical boundary needs positive radius and margin, got {} and {}",
                radius, margin
            )));
        }
        Ok(Self {
            center,
            radius,
            margin,
        })
    }
}

impl Module for SphericalBoundary {
    fn process(&self, candidate: &mut Candidate, _ctx: &mut Context) {
        let distance = (candidate.current().position() - self.center).norm();
        if distance >= self.radius {
            candidate.set_property("OutOfBounds", "SphericalBoundary");
            candidate.deactivate("SphericalBoundary");
        } else {
            candidate.limit_next_step(self.radius - distance + self.margin);
        }
    }
}

/// Detects candidates crossing the surface of a sphere in either direction
/// and flags them with `"Detected"`.
#[derive(Debug, Clone)]
pub struct ObserverSphere {
    name: String,
    center: Vector3<f64>,
    radius: f64,
    tolerance: f64,
    deactivate: bool,
}

impl ObserverSphere {
    pub fn new(name: &str, center: Vector3<f64>, radius: f64, tolerance: f64) -> Result<Self> {
        if !(radius > 0.0) || !(tolerance > 0.0) {
            return Err(Error::invalid(format!(
                "observer '{}' needs positive radius and tolerance",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            center,
            radius,
            tolerance,
            deactivate: true,
        })
    }

    /// Keep detected candidates active.
    pub fn with_deactivation(mut self, deactivate: bool) -> Self {
        self.deactivate = deactivate;
        self
    }

    fn signed_distance(&self, position: &Vector3<f64>) -> f64 {
        (position - self.center).norm() - self.radius
    }
}

impl Module for ObserverSphere {
    fn process(&self, candidate: &mut Candidate, _ctx: &mut Context) {
        let before = self.signed_distance(candidate.previous().position());
        let after = self.signed_distance(candidate.current().position());
        let moved = candidate.previous().position() != candidate.current().position();
        let crossed = moved && (before.signum() != after.signum() || after == 0.0);
        if crossed {
            candidate.set_property("Detected", self.name.clone());
            if self.deactivate {
                candidate.deactivate("ObserverSphere");
            }
            return;
        }
        candidate.limit_next_step(after.abs().max(self.tolerance));
    }

    fn description(&self) -> String {
        format!("ObserverSphere({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleState;
    use crate::particle_id::proton;

    fn at(position: Vector3<f64>) -> Candidate {
        let mut c = Candidate::new(ParticleState::new(proton(), 1.0, position, Vector3::x()));
        c.set_next_step(f64::MAX);
        c
    }

    fn moved(from: Vector3<f64>, to: Vector3<f64>) -> Candidate {
        let mut c = at(from);
        c.snapshot_previous();
        c.current_mut().set_position(to);
        c.set_current_step((to - from).norm());
        c
    }

    #[test]
    fn test_maximum_trajectory_length() {
        let module = MaximumTrajectoryLength::new(10.0).unwrap();
        let mut c = at(Vector3::zeros());
        c.set_trajectory_length(4.0);
        module.process(&mut c, &mut Context::new(0));
        assert!(c.is_active());
        assert_eq!(c.next_step(), 6.0);

        c.set_trajectory_length(10.0);
        module.process(&mut c, &mut Context::new(0));
        assert!(!c.is_active());
        assert_eq!(c.property("Deactivated"), Some("MaximumTrajectoryLength"));
        assert!(MaximumTrajectoryLength::new(0.0).is_err());
    }

    #[test]
    fn test_minimum_energy() {
        let module = MinimumEnergy::new(2.0);
        let mut c = at(Vector3::zeros());
        module.process(&mut c, &mut Context::new(0));
        assert!(!c.is_active());
        assert_eq!(c.property("Deactivated"), Some("MinimumEnergy"));
    }

    #[test]
    fn test_spherical_boundary() {
        let module = SphericalBoundary::new(Vector3::zeros(), 10.0, 0.5).unwrap();
        let mut inside = at(Vector3::new(4.0, 0.0, 0.0));
        module.process(&mut inside, &mut Context::new(0));
        assert!(inside.is_active());
        assert_eq!(inside.next_step(), 6.5);

        let mut outside = at(Vector3::new(0.0, 10.2, 0.0));
        module.process(&mut outside, &mut Context::new(0));
        assert!(!outside.is_active());
        assert!(outside.has_property("OutOfBounds"));
    }

    #[test]
    fn test_observer_detects_crossing_both_ways() {
        let observer = ObserverSphere::new("obs", Vector3::zeros(), 5.0, 0.1).unwrap();
        let mut outward = moved(Vector3::new(4.0, 0.0, 0.0), Vector3::new(6.0, 0.0, 0.0));
        observer.process(&mut outward, &mut Context::new(0));
        assert_eq!(outward.property("Detected"), Some("obs"));
        assert!(!outward.is_active());

        let mut inward = moved(Vector3::new(0.0, 7.0, 0.0), Vector3::new(0.0, 3.0, 0.0));
        observer.process(&mut inward, &mut Context::new(0));
        assert!(inward.has_property("Detected"));
    }

    #[test]
    fn test_observer_limits_approach() {
        let observer = ObserverSphere::new("obs", Vector3::zeros(), 5.0, 0.1)
            .unwrap()
            .with_deactivation(false);
        let mut c = moved(Vector3::new(1.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0));
        observer.process(&mut c, &mut Context::new(0));
        assert!(c.is_active());
        assert!(!c.has_property("Detected"));
        assert_eq!(c.next_step(), 3.0);

        let mut c = moved(Vector3::new(4.0, 0.0, 0.0), Vector3::new(5.5, 0.0, 0.0));
        observer.process(&mut c, &mut Context::new(0));
        assert!(c.is_active());
        assert!(c.has_property("Detected"));
    }

    #[test]
    fn test_observer_ignores_first_tick() {
        let observer = ObserverSphere::new("obs", Vector3::zeros(), 5.0, 0.1).unwrap();
        let mut c = at(Vector3::new(5.0, 0.0, 0.0));
        observer.process(&mut c, &mut Context::new(0));
        assert!(c.is_active());
        assert_eq!(c.next_step(), 0.1);
    }
}
