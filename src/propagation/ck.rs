//! Adaptive Runge-Kutta propagation with the Cash-Karp embedded 5(4) pair.
//!
//! The state is (position, momentum) and the equation of motion is
//! dx/dt = c p̂, dp/dt = q c (p̂ × B). The step is shrunk until the momentum
//! error estimate is within `tolerance` relative to the state scale.

use super::{check_tolerance, move_rectilinear, StepLimits};
use crate::candidate::Candidate;
use crate::error::Result;
use crate::field::{FieldSampler, MagneticField};
use crate::module::{Context, Module};
use crate::units::C_LIGHT;
use nalgebra::Vector3;
use std::ops::{Add, Mul};
use std::sync::Arc;

// The field is static, so the stage nodes c_i never enter the derivative.
const A: [[f64; 5]; 6] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0],
    [3.0 / 10.0, -9.0 / 10.0, 6.0 / 5.0, 0.0, 0.0],
    [-11.0 / 54.0, 5.0 / 2.0, -70.0 / 27.0, 35.0 / 27.0, 0.0],
    [
        1631.0 / 55296.0,
        175.0 / 512.0,
        575.0 / 13824.0,
        44275.0 / 110592.0,
        253.0 / 4096.0,
    ],
];

// fifth order
const B: [f64; 6] = [
    37.0 / 378.0,
    0.0,
    250.0 / 621.0,
    125.0 / 594.0,
    0.0,
    512.0 / 1771.0,
];

// embedded fourth order
const B_STAR: [f64; 6] = [
    2825.0 / 27648.0,
    0.0,
    18575.0 / 48384.0,
    13525.0 / 55296.0,
    277.0 / 14336.0,
    1.0 / 4.0,
];

/// Integration state: position (m) and momentum (kg m/s).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Y {
    x: Vector3<f64>,
    p: Vector3<f64>,
}

impl Y {
    fn zero() -> Self {
        Y {
            x: Vector3::zeros(),
            p: Vector3::zeros(),
        }
    }
}

impl Add for Y {
    type Output = Y;
    fn add(self, rhs: Y) -> Y {
        Y {
            x: self.x + rhs.x,
            p: self.p + rhs.p,
        }
    }
}

impl Mul<f64> for Y {
    type Output = Y;
    fn mul(self, rhs: f64) -> Y {
        Y {
            x: self.x * rhs,
            p: self.p * rhs,
        }
    }
}

/// Largest momentum error relative to its component scale
/// `tolerance * (|p_i| + |dp_i/dt| h)`. Components with a zero scale are
/// skipped.
fn error_ratio(tolerance: f64, y: &Y, k0: &Y, err: &Y, h: f64) -> f64 {
    (0..3)
        .filter_map(|i| {
            let scale = tolerance * (y.p[i].abs() + k0.p[i].abs() * h);
            (scale > 0.0).then(|| (err.p[i] / scale).abs())
        })
        .fold(0.0, f64::max)
}

/// Deflection in a magnetic field with adaptive step control.
pub struct PropagationCK {
    field: Arc<dyn MagneticField>,
    tolerance: f64,
    limits: StepLimits,
}

impl PropagationCK {
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

    fn derivative(field: &FieldSampler, y: &Y, charge: f64) -> Y {
        let direction = y.p.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
        let b = field.value_at(&y.x);
        Y {
            x: direction * C_LIGHT,
            p: direction.cross(&b) * (charge * C_LIGHT),
        }
    }

    /// One Cash-Karp step of `h` seconds; returns the fifth order solution
    /// and the difference to the embedded fourth order one.
    fn try_step(field: &FieldSampler, y: &Y, k0: &Y, h: f64, charge: f64) -> (Y, Y) {
        let mut k = [Y::zero(); 6];
        k[0] = *k0;
        for i in 1..6 {
            let mut yi = *y;
            for j in 0..i {
                yi = yi + k[j] * (A[i][j] * h);
            }
            k[i] = Self::derivative(field, &yi, charge);
        }
        let mut out = *y;
        let mut err = Y::zero();
        for i in 0..6 {
            out = out + k[i] * (B[i] * h);
            err = err + k[i] * ((B[i] - B_STAR[i]) * h);
        }
        (out, err)
    }
}

impl Module for PropagationCK {
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
        let y = Y {
            x: *candidate.current().position(),
            p: candidate.current().momentum(),
        };
        let k0 = Self::derivative(&field, &y, charge);
        let min_h = self.limits.min_step / C_LIGHT;
        let max_h = self.limits.max_step / C_LIGHT;

        let mut h = step / C_LIGHT;
        let mut next_h = h;
        let out = loop {
            let (out, err) = Self::try_step(&field, &y, &k0, h, charge);
            if self.limits.is_fixed() {
                break out;
            }
            let r = error_ratio(self.tolerance, &y, &k0, &err, h);
            next_h = (h * 0.95 * r.powf(-0.2)).clamp(0.1 * h, 5.0 * h).clamp(min_h, max_h);
            if r > 1.0 && h > min_h {
                log::trace!(
                    "cash-karp step of {:.3e} m rejected (error ratio {:.3}), retrying with {:.3e} m",
                    h * C_LIGHT,
                    r,
                    next_h * C_LIGHT
                );
                h = next_h;
                continue;
            }
            break out;
        };
        step = h * C_LIGHT;

        let current = candidate.current_mut();
        current.set_position(out.x);
        current.set_direction(out.p);
        candidate.set_current_step(step);
        candidate.set_next_step(next_h * C_LIGHT);
    }
}
