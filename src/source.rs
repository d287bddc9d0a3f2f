use crate::candidate::Candidate;
use crate::particle::ParticleState;
use crate::particle_id;
use crate::stats::{AngularDistribution, EnergyDistribution};
use crate::units::EEV;
use nalgebra::Vector3;
use rand::RngCore;

/// Produces the initial candidates of a run.
pub trait Source: Send + Sync {
    fn get_candidate(&self, rng: &mut dyn RngCore) -> Candidate;
}

/// Point source with independent energy and direction distributions.
#[derive(Debug, Clone)]
pub struct IndependentSource {
    pub particle_id: i32,
    pub position: Vector3<f64>,
    pub angle: AngularDistribution,
    pub energy: EnergyDistribution,
    pub redshift: f64,
}

impl IndependentSource {
    pub fn new() -> Self {
        Self {
            particle_id: particle_id::proton(),
            position: Vector3::zeros(),
            angle: AngularDistribution::Isotropic,
            energy: EnergyDistribution::Monoenergetic(10.0 * EEV),
            redshift: 0.0,
        }
    }
}

impl Default for IndependentSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for IndependentSource {
    fn get_candidate(&self, rng: &mut dyn RngCore) -> Candidate {
        let direction = self.angle.sample(rng);
        let energy = self.energy.sample(rng);
        let state = ParticleState::new(
            self.particle_id,
            energy,
            self.position,
            Vector3::new(direction[0], direction[1], direction[2]),
        );
        Candidate::new(state).with_redshift(self.redshift)
    }
}
