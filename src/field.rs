//! Magnetic field collaborator.
//!
//! The propagators only need the field value at a position. Concrete field
//! models (grids, turbulence, galactic models) live outside this crate and
//! implement [`MagneticField`]; the simple fields here cover tests and
//! homogeneous setups.

use nalgebra::Vector3;
use std::cell::Cell;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("position ({x:.3e}, {y:.3e}, {z:.3e}) m is outside the field volume")]
    OutOfRange { x: f64, y: f64, z: f64 },

    #[error("field evaluation failed: {0}")]
    Evaluation(String),
}

/// Field value in tesla at a position (m) and redshift.
///
/// Implementations must be pure and safe to query from many propagation
/// threads at once.
pub trait MagneticField: Send + Sync {
    fn field_at(&self, position: &Vector3<f64>, redshift: f64) -> Result<Vector3<f64>, FieldError>;
}

/// Field queries for one tick, with failures treated as zero field.
///
/// The first failure of the tick is logged at `warn`, the rest at `debug`.
pub(crate) struct FieldSampler<'a> {
    field: &'a dyn MagneticField,
    redshift: f64,
    failures: Cell<u32>,
}

impl<'a> FieldSampler<'a> {
    pub(crate) fn new(field: &'a dyn MagneticField, redshift: f64) -> Self {
        Self {
            field,
            redshift,
            failures: Cell::new(0),
        }
    }

    pub(crate) fn value_at(&self, position: &Vector3<f64>) -> Vector3<f64> {
        match self.field.field_at(position, self.redshift) {
            Ok(b) => b,
            Err(e) => {
                let failures = self.failures.get() + 1;
                self.failures.set(failures);
                if failures == 1 {
                    log::warn!("magnetic field query failed, using zero field: {}", e);
                } else {
                    log::debug!("magnetic field query failed again ({}): {}", failures, e);
                }
                Vector3::zeros()
            }
        }
    }

    pub(crate) fn failures(&self) -> u32 {
        self.failures.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformField {
    value: Vector3<f64>,
}

impl UniformField {
    pub fn new(value: Vector3<f64>) -> Self {
        Self { value }
    }
}

impl MagneticField for UniformField {
    fn field_at(&self, _position: &Vector3<f64>, _redshift: f64) -> Result<Vector3<f64>, FieldError> {
        Ok(self.value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroField;

impl MagneticField for ZeroField {
    fn field_at(&self, _position: &Vector3<f64>, _redshift: f64) -> Result<Vector3<f64>, FieldError> {
        Ok(Vector3::zeros())
    }
}

/// Restricts another field to a sphere; queries outside it fail with
/// [`FieldError::OutOfRange`], as a gridded field does beyond its grid.
#[derive(Debug, Clone)]
pub struct SphericalFieldVolume<F> {
    inner: F,
    center: Vector3<f64>,
    radius: f64,
}

impl<F: MagneticField> SphericalFieldVolume<F> {
    pub fn new(inner: F, center: Vector3<f64>, radius: f64) -> Self {
        Self {
            inner,
            center,
            radius,
        }
    }
}

impl<F: MagneticField> MagneticField for SphericalFieldVolume<F> {
    fn field_at(&self, position: &Vector3<f64>, redshift: f64) -> Result<Vector3<f64>, FieldError> {
        if (position - self.center).norm() > self.radius {
            return Err(FieldError::OutOfRange {
                x: position.x,
                y: position.y,
                z: position.z,
            });
        }
        self.inner.field_at(position, redshift)
    }
}
