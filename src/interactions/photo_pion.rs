use super::{process_stochastic, random_position_on_step, sample_weighted, SamplingStrategy, StochasticInteraction};
use crate::candidate::Candidate;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fast_rng::FastRng;
use crate::module::{Context, Module};
use crate::particle_id::{
    neutron, nucleus_id, proton, ELECTRON, ELECTRON_ANTINEUTRINO, ELECTRON_NEUTRINO, MUON_ANTINEUTRINO,
    MUON_NEUTRINO, PHOTON, POSITRON,
};
use crate::photon_field::PhotonField;
use crate::tables::TabulatedRate;
use nalgebra::Vector3;

/// Mean fraction of the nucleon energy carried off by the pion.
const INELASTICITY: f64 = 0.2;

/// Reduction of the per-nucleon rate inside a nucleus.
const NUCLEAR_SHADOWING: f64 = 0.85;

const CHANNEL_NEUTRON: i32 = 0;
const CHANNEL_PROTON: i32 = 1;

/// Photo-pion production of nucleons, free or bound in nuclei.
///
/// Rates are tabulated per nucleon against the nucleon energy, with one
/// column (same rate for protons and neutrons) or two (protons, neutrons).
/// Each interaction converts [`INELASTICITY`] of the nucleon energy into a
/// pion that decays on the spot; isospin decides between a neutral and a
/// charged pion. A nucleon struck inside a nucleus is knocked out.
pub struct PhotoPionProduction {
    rates: TabulatedRate,
    photon_field: PhotonField,
    strategy: SamplingStrategy,
    have_photons: bool,
    have_neutrinos: bool,
    have_electrons: bool,
}

impl PhotoPionProduction {
    pub fn new(rates: TabulatedRate, photon_field: PhotonField) -> Result<Self> {
        if rates.column_count() > 2 {
            return Err(Error::invalid(format!(
                "photo-pion rates need one or two columns, got {}",
                rates.column_count()
            )));
        }
        Ok(Self {
            rates,
            photon_field,
            strategy: SamplingStrategy::PerTick { limit: 0.1 },
            have_photons: false,
            have_neutrinos: false,
            have_electrons: false,
        })
    }

    /// Load rates from the data set `PhotoPionProduction_<field>`.
    pub fn from_config(photon_field: PhotonField) -> Result<Self> {
        let key = format!("PhotoPionProduction_{}", photon_field.name());
        let path = Config::global().resolve(&key)?;
        Self::new(TabulatedRate::from_file(path)?, photon_field)
    }

    /// Fraction of the mean free path the next step may span.
    pub fn with_limit(mut self, limit: f64) -> Result<Self> {
        self.strategy = SamplingStrategy::per_tick(limit)?;
        Ok(self)
    }

    pub fn with_photons(mut self, have_photons: bool) -> Self {
        self.have_photons = have_photons;
        self
    }

    pub fn with_neutrinos(mut self, have_neutrinos: bool) -> Self {
        self.have_neutrinos = have_neutrinos;
        self
    }

    pub fn with_electrons(mut self, have_electrons: bool) -> Self {
        self.have_electrons = have_electrons;
        self
    }

    fn nucleon_rate(&self, column: usize, energy_per_nucleon: f64, z: f64) -> f64 {
        let column = column.min(self.rates.column_count() - 1);
        self.photon_field
            .scaled_rate(|e| self.rates.rate_column(column, e), energy_per_nucleon, z)
    }

    /// Rates on (neutrons, protons), indexed by channel.
    fn channel_rates(&self, candidate: &Candidate) -> [f64; 2] {
        let state = candidate.current();
        if !state.is_nucleus() {
            return [0.0; 2];
        }
        let (a, protons) = (state.mass_number(), state.charge_number());
        let neutrons = a - protons;
        let energy_per_nucleon = state.energy() / a as f64;
        let z = candidate.redshift();
        let shadowing = if a == 1 { 1.0 } else { NUCLEAR_SHADOWING };
        [
            shadowing * neutrons as f64 * self.nucleon_rate(1, energy_per_nucleon, z),
            shadowing * protons as f64 * self.nucleon_rate(0, energy_per_nucleon, z),
        ]
    }

    /// Decay products of the pion with charge `charge` and energy `energy`.
    fn emit_pion(&self, candidate: &mut Candidate, charge: i32, energy: f64, position: Vector3<f64>) {
        match charge {
            0 => {
                if self.have_photons {
                    candidate.add_secondary(PHOTON, energy / 2.0, position, 1.0);
                    candidate.add_secondary(PHOTON, energy / 2.0, position, 1.0);
                }
            }
            _ => {
                // pi -> mu nu_mu, mu -> e nu_e nu_mu; four leptons share the energy
                let quarter = energy / 4.0;
                let (lepton, nu_e, nu_mu, nu_mu_bar) = if charge > 0 {
                    (POSITRON, ELECTRON_NEUTRINO, MUON_NEUTRINO, MUON_ANTINEUTRINO)
                } else {
                    (ELECTRON, ELECTRON_ANTINEUTRINO, MUON_ANTINEUTRINO, MUON_NEUTRINO)
                };
                if self.have_electrons {
                    candidate.add_secondary(lepton, quarter, position, 1.0);
                }
                if self.have_neutrinos {
                    candidate.add_secondary(nu_e, quarter, position, 1.0);
                    candidate.add_secondary(nu_mu, quarter, position, 1.0);
                    candidate.add_secondary(nu_mu_bar, quarter, position, 1.0);
                }
            }
        }
    }
}

impl StochasticInteraction for PhotoPionProduction {
    fn rate(&self, candidate: &Candidate) -> f64 {
        self.channel_rates(candidate).iter().sum()
    }

    fn sample_channel(&self, candidate: &Candidate, rng: &mut FastRng) -> i32 {
        sample_weighted(&self.channel_rates(candidate), rng)
            .map(|i| i as i32)
            .unwrap_or(CHANNEL_PROTON)
    }

    fn perform_interaction(&self, candidate: &mut Candidate, channel: i32, ctx: &mut Context) {
        let state = candidate.current();
        let (a, z) = (state.mass_number(), state.charge_number());
        let on_proton = channel == CHANNEL_PROTON;
        if (on_proton && z == 0) || (!on_proton && a - z == 0) {
            return;
        }
        let energy_per_nucleon = state.energy() / a as f64;
        let position = random_position_on_step(candidate, ctx.rng());

        // isospin of the Delta resonance: 2/3 keep the nucleon, 1/3 flip it
        let flip = ctx.rng().random() < 1.0 / 3.0;
        let out_is_proton = on_proton != flip;
        let pion_charge = match (on_proton, flip) {
            (_, false) => 0,
            (true, true) => 1,
            (false, true) => -1,
        };
        let out_nucleon = if out_is_proton { proton() } else { neutron() };
        let nucleon_energy = energy_per_nucleon * (1.0 - INELASTICITY);
        let pion_energy = energy_per_nucleon * INELASTICITY;

        if a == 1 {
            candidate.set_species(out_nucleon);
            candidate.current_mut().set_energy(nucleon_energy);
        } else {
            let rest_z = if on_proton { z - 1 } else { z };
            candidate.add_secondary(out_nucleon, nucleon_energy, position, 1.0);
            candidate.set_species(nucleus_id(a - 1, rest_z));
            candidate
                .current_mut()
                .set_energy(energy_per_nucleon * (a - 1) as f64);
        }
        self.emit_pion(candidate, pion_charge, pion_energy, position);
    }
}

impl Module for PhotoPionProduction {
    fn process(&self, candidate: &mut Candidate, ctx: &mut Context) {
        process_stochastic(self, self.strategy, candidate, ctx);
    }

    fn description(&self) -> String {
        format!("PhotoPionProduction({})", self.photon_field.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleState;
    use crate::units::{EEV, KPC, MPC};

    /// Step-like rate: zero below 10^19.5 eV, 1/(10 Mpc) above.
    fn rates(columns: usize) -> TabulatedRate {
        let energies: Vec<f64> = [19.0, 19.4, 19.6, 22.0]
            .iter()
            .map(|lg| 10f64.powf(*lg) * crate::units::EV)
            .collect();
        let column = vec![0.0, 0.0, 1.0 / (10.0 * MPC), 1.0 / (10.0 * MPC)];
        TabulatedRate::with_columns(energies, vec![column; columns]).unwrap()
    }

    fn candidate(id: i32, energy: f64, step: f64) -> Candidate {
        let mut c = Candidate::new(ParticleState::new(id, energy, Vector3::zeros(), Vector3::x()));
        c.set_next_step(f64::MAX);
        c.snapshot_previous();
        c.current_mut().set_position(Vector3::new(step, 0.0, 0.0));
        c.set_current_step(step);
        c
    }

    #[test]
    fn test_too_many_columns_rejected() {
        assert!(PhotoPionProduction::new(rates(3), PhotonField::cmb()).is_err());
    }

    #[test]
    fn test_below_threshold_nothing_happens() {
        let ppp = PhotoPionProduction::new(rates(2), PhotonField::cmb()).unwrap();
        let mut c = candidate(proton(), 1.0 * EEV, 100.0 * MPC);
        ppp.process(&mut c, &mut Context::new(1));
        assert_eq!(c.current().id(), proton());
        assert_eq!(c.current().energy(), 1.0 * EEV);
        assert_eq!(c.next_step(), f64::MAX);
    }

    #[test]
    fn test_ten_eev_proton_limits_step() {
        // 10 EeV is below 10^19.5 eV: the rate is zero
        let ppp = PhotoPionProduction::new(rates(2), PhotonField::cmb()).unwrap();
        let mut c = candidate(proton(), 10.0 * EEV, 1.0 * KPC);
        ppp.process(&mut c, &mut Context::new(1));
        assert_eq!(c.current().energy(), 10.0 * EEV);

        // at 100 EeV a kpc step mostly does not interact but limits the step
        let mut c = candidate(proton(), 100.0 * EEV, 1.0 * KPC);
        ppp.process(&mut c, &mut Context::new(1));
        assert!(c.current().energy() < 100.0 * EEV || (c.next_step() - 1.0 * MPC).abs() < 1e-6 * MPC);
    }

    #[test]
    fn test_step_longer_than_free_path_never_overshoots() {
        // flat 1/(10 Mpc) on both nucleons from 1 EeV up
        let energies: Vec<f64> = [18.0, 22.0]
            .iter()
            .map(|lg| 10f64.powf(*lg) * crate::units::EV)
            .collect();
        let rate = 1.0 / (10.0 * MPC);
        let table = TabulatedRate::with_columns(energies, vec![vec![rate, rate]; 2]).unwrap();
        let ppp = PhotoPionProduction::new(table, PhotonField::cmb()).unwrap();
        let limit = 0.1 / rate;
        for seed in 0..200 {
            let energy = 10.0 * EEV;
            let mut c = candidate(proton(), energy, 50.0 * MPC);
            ppp.process(&mut c, &mut Context::new(seed));
            let changed = c.current().id() != proton() || c.current().energy() != energy;
            assert!(changed || c.next_step() <= limit * (1.0 + 1e-12), "seed {}", seed);
            if c.current().energy() > 1.0 * EEV {
                assert!(c.next_step() <= limit * (1.0 + 1e-12), "seed {}", seed);
            }
        }
    }

    #[test]
    fn test_proton_loses_energy_over_long_step() {
        let ppp = PhotoPionProduction::new(rates(2), PhotonField::cmb())
            .unwrap()
            .with_photons(true)
            .with_neutrinos(true)
            .with_electrons(true);
        let energy = 1000.0 * EEV;
        let mut c = candidate(proton(), energy, 200.0 * MPC);
        ppp.process(&mut c, &mut Context::new(9));
        assert!(c.current().energy() < energy);
        assert!(!c.secondaries().is_empty());
        let secondary_energy: f64 = c.secondaries().iter().map(|s| s.current().energy()).sum();
        assert!((c.current().energy() + secondary_energy - energy).abs() < 1e-9 * energy);
    }

    #[test]
    fn test_nucleus_emits_nucleon() {
        let ppp = PhotoPionProduction::new(rates(1), PhotonField::cmb()).unwrap();
        let a = 4;
        // energy per nucleon 100 EeV
        let mut c = candidate(nucleus_id(a, 2), 400.0 * EEV, 1e26);
        let mut ctx = Context::new(5);
        ppp.perform_interaction(&mut c, CHANNEL_PROTON, &mut ctx);
        assert_eq!(c.current().id(), nucleus_id(3, 1));
        assert_eq!(c.current().energy(), 300.0 * EEV);
        let nucleon = &c.secondaries()[0];
        assert!(nucleon.current().id() == proton() || nucleon.current().id() == neutron());
        assert!((nucleon.current().energy() - 80.0 * EEV).abs() < 1e-9 * EEV);
    }

    #[test]
    fn test_nuclear_rate_counts_nucleons() {
        let ppp = PhotoPionProduction::new(rates(1), PhotonField::cmb()).unwrap();
        let free = candidate(proton(), 100.0 * EEV, 0.0);
        let bound = candidate(nucleus_id(4, 2), 400.0 * EEV, 0.0);
        let ratio = ppp.rate(&bound) / ppp.rate(&free);
        assert!((ratio - 4.0 * NUCLEAR_SHADOWING).abs() < 1e-9);
    }

    #[test]
    fn test_isospin_ratio() {
        let ppp = PhotoPionProduction::new(rates(2), PhotonField::cmb()).unwrap();
        let mut ctx = Context::new(2);
        let n = 30_000;
        let mut neutrons = 0;
        for _ in 0..n {
            let mut c = candidate(proton(), 100.0 * EEV, 1.0);
            ppp.perform_interaction(&mut c, CHANNEL_PROTON, &mut ctx);
            if c.current().id() == neutron() {
                neutrons += 1;
            }
        }
        assert!((neutrons as f64 / n as f64 - 1.0 / 3.0).abs() < 0.02);
    }
}
