//! Propagators: move the candidate by one step per tick.
//!
//! Every propagator snapshots `previous`, moves `current`, records the step
//! through [`Candidate::set_current_step`] and proposes the next step. They
//! must be the first modules of a [`crate::module::ModuleList`].

mod bp;
mod ck;
mod simple;

pub use bp::PropagationBP;
pub use ck::PropagationCK;
pub use simple::SimplePropagation;

use crate::candidate::Candidate;
use crate::error::{Error, Result};

/// Allowed step range in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct StepLimits {
    pub min_step: f64,
    pub max_step: f64,
}

impl StepLimits {
    pub fn new(min_step: f64, max_step: f64) -> Result<Self> {
        if !(min_step > 0.0) {
            return Err(Error::invalid(format!(
                "minimum step must be positive, got {}",
                min_step
            )));
        }
        if !(max_step >= min_step) || !max_step.is_finite() {
            return Err(Error::invalid(format!(
                "maximum step {} must be finite and not below minimum step {}",
                max_step, min_step
            )));
        }
        Ok(Self { min_step, max_step })
    }

    pub fn clamp(&self, step: f64) -> f64 {
        step.clamp(self.min_step, self.max_step)
    }

    pub fn is_fixed(&self) -> bool {
        self.min_step == self.max_step
    }
}

pub(crate) fn check_tolerance(tolerance: f64) -> Result<()> {
    if tolerance > 0.0 && tolerance < 1.0 {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "tolerance must be in (0, 1), got {}",
            tolerance
        )))
    }
}

/// Straight-line move of `step` meters along the current direction.
pub(crate) fn move_rectilinear(candidate: &mut Candidate, step: f64) {
    let position = candidate.current().position() + candidate.current().direction() * step;
    candidate.current_mut().set_position(position);
    candidate.set_current_step(step);
}
