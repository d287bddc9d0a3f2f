use super::{move_rectilinear, StepLimits};
use crate::candidate::Candidate;
use crate::error::Result;
use crate::module::{Context, Module};

/// Rectilinear propagation, ignoring any magnetic field.
#[derive(Debug, Clone)]
pub struct SimplePropagation {
    limits: StepLimits,
}

impl SimplePropagation {
    pub fn new(min_step: f64, max_step: f64) -> Result<Self> {
        Ok(Self {
            limits: StepLimits::new(min_step, max_step)?,
        })
    }

    pub fn min_step(&self) -> f64 {
        self.limits.min_step
    }

    pub fn max_step(&self) -> f64 {
        self.limits.max_step
    }
}

impl Module for SimplePropagation {
    fn process(&self, candidate: &mut Candidate, _ctx: &mut Context) {
        candidate.snapshot_previous();
        let step = self.limits.clamp(candidate.next_step());
        move_rectilinear(candidate, step);
        candidate.set_next_step(self.limits.max_step);
    }
}
