use crate::candidate::Candidate;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::module::{Context, Module};
use crate::photon_field::PhotonField;
use crate::tables::TabulatedRate;
use crate::units::{C_SQUARED, MASS_PROTON};

/// Continuous energy loss of nuclei by Bethe-Heitler pair production.
///
/// The table holds the relative loss rate `(1/E) dE/dx` (1/m) of protons
/// against the proton energy. A nucleus with the same Lorentz factor loses
/// `Z²/A` times that relative rate. The next step is limited so that one
/// step removes at most `limit` of the energy.
pub struct ElectronPairProduction {
    loss_rates: TabulatedRate,
    photon_field: PhotonField,
    limit: f64,
}

impl ElectronPairProduction {
    pub fn new(loss_rates: TabulatedRate, photon_field: PhotonField) -> Self {
        Self {
            loss_rates,
            photon_field,
            limit: 0.1,
        }
    }

    /// Load `ElectronPairProduction_<field>` through the global configuration.
    pub fn from_config(photon_field: PhotonField) -> Result<Self> {
        let key = format!("ElectronPairProduction_{}", photon_field.name());
        let path = Config::global().resolve(&key)?;
        Ok(Self::new(TabulatedRate::from_file(path)?, photon_field))
    }

    pub fn with_limit(mut self, limit: f64) -> Result<Self> {
        if !(limit > 0.0 && limit < 1.0) {
            return Err(Error::invalid(format!(
                "relative loss limit must be in (0, 1), got {}",
                limit
            )));
        }
        self.limit = limit;
        Ok(self)
    }

    /// Relative energy loss per length (1/m); zero for anything but charged nuclei.
    pub fn relative_loss_rate(&self, candidate: &Candidate) -> f64 {
        let state = candidate.current();
        if !state.is_nucleus() || state.charge_number() == 0 {
            return 0.0;
        }
        let (a, z) = (state.mass_number() as f64, state.charge_number() as f64);
        let proton_energy = state.lorentz_factor() * MASS_PROTON * C_SQUARED;
        let proton_rate = self.photon_field.scaled_rate(
            |e| self.loss_rates.rate(e),
            proton_energy,
            candidate.redshift(),
        );
        z * z / a * proton_rate
    }
}

impl Module for ElectronPairProduction {
    fn process(&self, candidate: &mut Candidate, _ctx: &mut Context) {
        let rate = self.relative_loss_rate(candidate);
        if !(rate > 0.0) {
            return;
        }
        let step = candidate.current_step();
        let energy = candidate.current().energy();
        candidate
            .current_mut()
            .set_energy(energy * (1.0 - rate * step).max(0.0));
        candidate.limit_next_step(self.limit / rate);
    }

    fn description(&self) -> String {
        format!("ElectronPairProduction({})", self.photon_field.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleState;
    use crate::particle_id::{nucleus_id, proton, ELECTRON, PHOTON};
    use crate::units::{EEV, EV, MPC};
    use nalgebra::Vector3;

    fn loss_rates() -> TabulatedRate {
        let energies = vec![1e17 * EV, 1e18 * EV, 1e21 * EV];
        let rate = 1.0 / (1000.0 * MPC);
        TabulatedRate::new(energies, vec![0.0, rate, rate]).unwrap()
    }

    fn candidate(id: i32, energy: f64, step: f64) -> Candidate {
        let mut c = Candidate::new(ParticleState::new(id, energy, Vector3::zeros(), Vector3::x()));
        c.set_next_step(f64::MAX);
        c.set_current_step(step);
        c
    }

    #[test]
    fn test_proton_loss() {
        let epp = ElectronPairProduction::new(loss_rates(), PhotonField::cmb());
        let mut c = candidate(proton(), 10.0 * EEV, 10.0 * MPC);
        epp.process(&mut c, &mut Context::new(1));
        assert!((c.current().energy() / (10.0 * EEV) - 0.99).abs() < 1e-9);
        assert!((c.next_step() - 100.0 * MPC).abs() < 1e-6 * MPC);
    }

    #[test]
    fn test_nucleus_scales_with_z_squared_over_a() {
        let epp = ElectronPairProduction::new(loss_rates(), PhotonField::cmb());
        let p = candidate(proton(), 10.0 * EEV, 0.0);
        let mut fe = candidate(nucleus_id(56, 26), 1.0, 0.0);
        fe.current_mut().set_lorentz_factor(p.current().lorentz_factor());
        let ratio = epp.relative_loss_rate(&fe) / epp.relative_loss_rate(&p);
        assert!((ratio - 26.0 * 26.0 / 56.0).abs() < 1e-9);
    }

    #[test]
    fn test_neutral_and_leptons_unaffected() {
        let epp = ElectronPairProduction::new(loss_rates(), PhotonField::cmb());
        for id in [PHOTON, ELECTRON, crate::particle_id::neutron()] {
            let mut c = candidate(id, 10.0 * EEV, 10.0 * MPC);
            epp.process(&mut c, &mut Context::new(1));
            assert_eq!(c.current().energy(), 10.0 * EEV);
            assert_eq!(c.next_step(), f64::MAX);
        }
    }

    #[test]
    fn test_below_table_no_loss() {
        let epp = ElectronPairProduction::new(loss_rates(), PhotonField::cmb());
        let mut c = candidate(proton(), 1e16 * EV, 10.0 * MPC);
        epp.process(&mut c, &mut Context::new(1));
        assert_eq!(c.current().energy(), 1e16 * EV);
    }

    #[test]
    fn test_limit_validation() {
        let epp = ElectronPairProduction::new(loss_rates(), PhotonField::cmb());
        assert!(epp.with_limit(1.5).is_err());
    }
}
