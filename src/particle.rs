use crate::data::nuclear_mass;
use crate::particle_id::{self, charge_units, is_nucleus};
use crate::units::{C_LIGHT, C_SQUARED, ELEMENTARY_CHARGE, MASS_ELECTRON, MEV};
use nalgebra::Vector3;

/// Instantaneous state of one particle.
///
/// Only the particle code, lab-frame total energy, position and direction are
/// stored. Everything else (mass, charge, Lorentz factor, momentum) is derived
/// on demand so it can never go stale.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleState {
    id: i32,
    energy: f64,
    position: Vector3<f64>,
    direction: Vector3<f64>,
}

impl ParticleState {
    pub fn new(id: i32, energy: f64, position: Vector3<f64>, direction: Vector3<f64>) -> Self {
        let mut state = Self {
            id,
            energy: 0.0,
            position,
            direction: Vector3::new(1.0, 0.0, 0.0),
        };
        state.set_energy(energy);
        state.set_direction(direction);
        state
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    /// Species changes go through [`crate::candidate::Candidate::set_species`]
    /// so the interaction-state cache is cleared alongside.
    pub(crate) fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Negative energies are clamped to zero.
    pub fn set_energy(&mut self, energy: f64) {
        self.energy = energy.max(0.0);
    }

    pub fn position(&self) -> &Vector3<f64> {
        &self.position
    }

    pub fn set_position(&mut self, position: Vector3<f64>) {
        self.position = position;
    }

    pub fn direction(&self) -> &Vector3<f64> {
        &self.direction
    }

    /// Stores the unit vector along `direction`; a zero vector is ignored.
    pub fn set_direction(&mut self, direction: Vector3<f64>) {
        let norm = direction.norm();
        if norm > 0.0 && norm.is_finite() {
            self.direction = direction / norm;
        }
    }

    /// Electric charge in coulomb.
    pub fn charge(&self) -> f64 {
        charge_units(self.id) as f64 * ELEMENTARY_CHARGE
    }

    /// Rest mass in kg; zero for photons and neutrinos.
    pub fn mass(&self) -> f64 {
        if is_nucleus(self.id) {
            return nuclear_mass(self.id);
        }
        match self.id.abs() {
            11 => MASS_ELECTRON,
            13 => 105.6583755 * MEV / C_SQUARED,
            111 => 134.9768 * MEV / C_SQUARED,
            211 => 139.57039 * MEV / C_SQUARED,
            _ => 0.0,
        }
    }

    /// E / (m c^2); infinite for massless particles.
    pub fn lorentz_factor(&self) -> f64 {
        let mass = self.mass();
        if mass == 0.0 {
            return f64::INFINITY;
        }
        self.energy / (mass * C_SQUARED)
    }

    /// Set the energy through the Lorentz factor, keeping the species.
    pub fn set_lorentz_factor(&mut self, gamma: f64) {
        self.set_energy(gamma * self.mass() * C_SQUARED);
    }

    /// Velocity vector; ultra-relativistic particles move at c along `direction`.
    pub fn velocity(&self) -> Vector3<f64> {
        let gamma = self.lorentz_factor();
        let beta = if gamma.is_finite() && gamma > 1.0 {
            (1.0 - 1.0 / (gamma * gamma)).sqrt()
        } else if gamma.is_finite() {
            0.0
        } else {
            1.0
        };
        self.direction * beta * C_LIGHT
    }

    /// Momentum vector in kg m/s, using the ultra-relativistic relation p = E / c.
    pub fn momentum(&self) -> Vector3<f64> {
        self.direction * (self.energy / C_LIGHT)
    }

    /// Magnetic rigidity E / (Z e) in volt, zero for neutral particles.
    pub fn rigidity(&self) -> f64 {
        let charge = self.charge();
        if charge == 0.0 {
            return 0.0;
        }
        self.energy / charge.abs()
    }

    pub fn is_nucleus(&self) -> bool {
        is_nucleus(self.id)
    }

    pub fn charge_number(&self) -> i32 {
        particle_id::charge_number(self.id)
    }

    pub fn mass_number(&self) -> i32 {
        particle_id::mass_number(self.id)
    }
}

impl Default for ParticleState {
    fn default() -> Self {
        Self::new(
            particle_id::proton(),
            0.0,
            Vector3::zeros(),
            Vector3::new(1.0, 0.0, 0.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle_id::{nucleus_id, proton, PHOTON};
    use crate::units::{EEV, MASS_PROTON};

    #[test]
    fn test_particle_construction() {
        let p = ParticleState::new(
            proton(),
            1.0 * EEV,
            Vector3::new(0.0, 1.0, 2.0),
            Vector3::new(2.0, 0.0, 0.0),
        );
        assert_eq!(p.position(), &Vector3::new(0.0, 1.0, 2.0));
        assert_eq!(p.direction(), &Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(p.energy(), 1.0 * EEV);
        assert_eq!(p.id(), proton());
    }

    #[test]
    fn test_negative_energy_clamped() {
        let mut p = ParticleState::default();
        p.set_energy(-5.0);
        assert_eq!(p.energy(), 0.0);
    }

    #[test]
    fn test_zero_direction_ignored() {
        let mut p = ParticleState::default();
        p.set_direction(Vector3::zeros());
        assert_eq!(p.direction(), &Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_derived_quantities_follow_energy() {
        let mut p = ParticleState::new(proton(), 1.0 * EEV, Vector3::zeros(), Vector3::x());
        let gamma = p.lorentz_factor();
        assert!((gamma - EEV / (MASS_PROTON * C_SQUARED)).abs() / gamma < 1e-12);
        p.set_energy(2.0 * EEV);
        assert!((p.lorentz_factor() / gamma - 2.0).abs() < 1e-12);
        assert!((p.momentum().norm() - 2.0 * EEV / C_LIGHT).abs() < 1e-30);
    }

    #[test]
    fn test_lorentz_factor_setter() {
        let mut p = ParticleState::new(nucleus_id(4, 2), 1.0, Vector3::zeros(), Vector3::x());
        p.set_lorentz_factor(1e10);
        assert!((p.lorentz_factor() - 1e10).abs() / 1e10 < 1e-12);
    }

    #[test]
    fn test_photon_is_massless_and_neutral() {
        let p = ParticleState::new(PHOTON, 1.0 * EEV, Vector3::zeros(), Vector3::z());
        assert_eq!(p.mass(), 0.0);
        assert_eq!(p.charge(), 0.0);
        assert!(p.lorentz_factor().is_infinite());
        assert!((p.velocity().norm() - C_LIGHT).abs() < 1e-6);
    }
}
