//! Boris push propagation with step doubling error control.

use super::{check_tolerance, move_rectilinear, StepLimits};
use crate::candidate::Candidate;
use crate::error::Result;
use crate::field::{FieldSampler, MagneticField};
use crate::module::{Context, Module};
use crate::units::{C_LIGHT, C_SQUARED};
use nalgebra::Vector3;
use std::sync::Arc;

/// Order of the leapfrog scheme.
const ORDER: i32 = 2;

#[derive(Debug, Clone, Copy)]
struct Y {
    x: Vector3<f64>,
    u: Vector3<f64>,
}

/// Deflection in a magnetic field using the Boris rotation.
///
/// The velocity update is a pure rotation, so the speed is conserved exactly.
/// The local error is estimated by comparing one step of `h` with two of
/// `h/2` (Richardson extrapolation for a second order scheme).
pub struct PropagationBP {
    field: Arc<dyn MagneticField>,
    tolerance: f64,
    limits: StepLimits,
}

impl PropagationBP {
    pub fn new(
        field: Arc<dyn MagneticField>,
        tolerance: f64,
        min_step: f64,
        max_step: f64,
    ) -> Result<Self> {
        check_tolerance(tolerance)?;
        Ok(Self {
            field,
            tolerance,
            limits: StepLimits::new(min_step, max_step)?,
        })
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn min_step(&self) -> f64 {
        self.limits.min_step
    }

    pub fn max_step(&self) -> f64 {
        self.limits.max_step
    }

    /// One Boris push over `step` meters. `q_over_m` in C/kg with the
    /// relativistic mass E/c².
    fn push(field: &FieldSampler, y: Y, step: f64, q_over_m: f64) -> Y {
        let mut x = y.x + y.u * (step / 2.0);
        let b = field.value_at(&x);
        let t = b * (q_over_m / 2.0 * step / C_LIGHT);
        let s = t * (2.0 / (1.0 + t.dot(&t)));
        let v_help = y.u + y.u.cross(&t);
        let u = y.u + v_help.cross(&s);
        x += u * (step / 2.0);
        Y { x, u }
    }

    /// Result of a full step, result of two half steps and the error estimate.
    fn try_step(field: &FieldSampler, y: Y, step: f64, q_over_m: f64) -> (Y, Y, f64) {
        let full = Self::push(field, y, step, q_over_m);
        let half = Self::push(field, y, step / 2.0, q_over_m);
        let refined = Self::push(field, half, step / 2.0, q_over_m);
        let divisor = 1.0 - 2f64.powi(-ORDER);
        let error = (full.x - refined.x).norm() / (step * divisor);
        (full, refined, error)
    }
}

impl Module for PropagationBP {
    fn process(&self, candidate: &mut Candidate, _ctx: &mut Context) {
        candidate.snapshot_previous();
        let mut step = self.limits.clamp(candidate.next_step());

        let charge = candidate.current().charge();
        if charge == 0.0 {
            move_rectilinear(candidate, step);
            candidate.set_next_step(self.limits.max_step);
            return;
        }

        let field = FieldSampler::new(self.field.as_ref(), candidate.redshift());
        let q_over_m = charge * C_SQUARED / candidate.current().energy();
        let y = Y {
            x: *candidate.current().position(),
            u: *candidate.current().direction(),
        };

        let mut next_step = step;
        let out = if self.limits.is_fixed() {
            Self::try_step(&field, y, step, q_over_m).0
        } else {
            loop {
                let (full, refined, error) = Self::try_step(&field, y, step, q_over_m);
                let r = error / self.tolerance;
                let alpha = 0.95 * r.powf(-1.0 / 3.0);
                if r > 1.0 {
                    if step <= self.limits.min_step {
                        break refined;
                    }
                    next_step = (step * alpha)
                        .max(0.1 * step)
                        .max(self.limits.min_step);
                    log::trace!(
                        "boris step of {:.3e} m rejected (error ratio {:.3}), retrying with {:.3e} m",
                        step,
                        r,
                        next_step
                    );
                    step = next_step;
                } else {
                    next_step = (step * alpha)
                        .min(5.0 * step)
                        .min(self.limits.max_step)
                        .max(self.limits.min_step);
                    break full;
                }
            }
        };

        let current = candidate.current_mut();
        current.set_position(out.x);
        current.set_direction(out.u);
        candidate.set_current_step(step);
        candidate.set_next_step(next_step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{UniformField, ZeroField};
    use crate::particle::ParticleState;
    use crate::particle_id::{proton, PHOTON};
    use crate::units::{EEV, ELEMENTARY_CHARGE, GEV, KPC, MICROGAUSS, PARSEC};

    fn proton_at(energy: f64, direction: Vector3<f64>) -> Candidate {
        Candidate::new(ParticleState::new(proton(), energy, Vector3::zeros(), direction))
    }

    fn uniform(b: f64) -> Arc<dyn MagneticField> {
        Arc::new(UniformField::new(Vector3::new(0.0, 0.0, b)))
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(PropagationBP::new(Arc::new(ZeroField), 2.0, 1.0, 10.0).is_err());
        assert!(PropagationBP::new(Arc::new(ZeroField), 1e-4, -1.0, 10.0).is_err());
    }

    #[test]
    fn test_zero_field_is_rectilinear() {
        let prop = PropagationBP::new(Arc::new(ZeroField), 1e-4, 1.0 * PARSEC, 1.0 * KPC).unwrap();
        let direction = Vector3::new(0.0, -1.0, 1.0).normalize();
        let mut c = proton_at(EEV, direction);
        let mut ctx = Context::new(1);
        for _ in 0..10 {
            prop.process(&mut c, &mut ctx);
            assert!((c.current().direction() - direction).norm() < 1e-12);
        }
        let expected = direction * c.trajectory_length();
        assert!((c.current().position() - expected).norm() < 1e-9 * c.trajectory_length());
    }

    #[test]
    fn test_step_grows_without_error() {
        let prop = PropagationBP::new(Arc::new(ZeroField), 1e-4, 1.0 * PARSEC, 1.0 * KPC).unwrap();
        let mut c = proton_at(EEV, Vector3::x());
        prop.process(&mut c, &mut Context::new(1));
        assert_eq!(c.current_step(), 1.0 * PARSEC);
        assert_eq!(c.next_step(), 5.0 * PARSEC);
    }

    #[test]
    fn test_direction_norm_preserved_in_uniform_field() {
        let prop = PropagationBP::new(uniform(1.0 * MICROGAUSS), 1e-4, 1.0 * PARSEC, 10.0 * KPC).unwrap();
        let mut c = proton_at(1.0 * EEV, Vector3::new(1.0, 1.0, 1.0).normalize());
        let mut ctx = Context::new(3);
        for _ in 0..500 {
            prop.process(&mut c, &mut ctx);
            assert!((c.current().direction().norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_gyration_radius() {
        let b = 1.0 * MICROGAUSS;
        let energy = 1.0 * EEV;
        let radius = energy / (ELEMENTARY_CHARGE * C_LIGHT * b);
        let prop = PropagationBP::new(uniform(b), 1e-6, 1e-3 * radius, 0.01 * radius).unwrap();
        let mut c = proton_at(energy, Vector3::x());
        let mut ctx = Context::new(1);
        let mut max_distance: f64 = 0.0;
        while c.trajectory_length() < std::f64::consts::PI * radius {
            prop.process(&mut c, &mut ctx);
            max_distance = max_distance.max(c.current().position().norm());
        }
        assert!((max_distance - 2.0 * radius).abs() < 0.02 * radius);
    }

    #[test]
    fn test_error_above_tolerance_at_min_step_accepts_refined() {
        // strong field and a fixed floor: the step cannot shrink further
        let prop = PropagationBP::new(uniform(1.0), 1e-12, 1.0, 2.0).unwrap();
        let mut c = proton_at(10.0 * GEV, Vector3::x());
        prop.process(&mut c, &mut Context::new(1));
        assert_eq!(c.current_step(), 1.0);
        assert!(c.next_step() >= 1.0 && c.next_step() <= 2.0);
        assert!((c.current().direction().norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_photon_moves_straight() {
        let prop = PropagationBP::new(uniform(1.0 * MICROGAUSS), 1e-4, 1.0, 100.0).unwrap();
        let mut c = Candidate::new(ParticleState::new(PHOTON, EEV, Vector3::zeros(), Vector3::z()));
        c.set_next_step(50.0);
        prop.process(&mut c, &mut Context::new(1));
        assert_eq!(c.current().position(), &Vector3::new(0.0, 0.0, 50.0));
        assert_eq!(c.next_step(), 100.0);
    }
}
