use super::{process_stochastic, random_position_on_step, sample_weighted, SamplingStrategy, StochasticInteraction};
use crate::candidate::Candidate;
use crate::config::Config;
use crate::data::nuclear_mass;
use crate::error::Result;
use crate::fast_rng::FastRng;
use crate::module::{Context, Module};
use crate::particle_id::{
    is_nucleus, nucleus_id, ELECTRON, ELECTRON_ANTINEUTRINO, ELECTRON_NEUTRINO, POSITRON,
};
use crate::tables::{DecayProducts, DecayTable};
use crate::units::{C_LIGHT, C_SQUARED, ELECTRON_REST_ENERGY};
use nalgebra::Vector3;

/// Data set key used by [`NuclearDecay::from_config`].
pub const DECAY_TABLE_KEY: &str = "NuclearDecay";

/// Radioactive decay of unstable nuclei.
///
/// The decay length is `gamma * c * tau`, so the free path is sampled once
/// per species and kept in the interaction-state cache. β± decays emit the
/// electron or positron and the neutrino; p, n and α emission leave the
/// fragments at the parent's Lorentz factor.
pub struct NuclearDecay {
    table: DecayTable,
    have_electrons: bool,
    have_neutrinos: bool,
}

impl NuclearDecay {
    pub fn new(table: DecayTable) -> Self {
        Self {
            table,
            have_electrons: true,
            have_neutrinos: true,
        }
    }

    pub fn from_config() -> Result<Self> {
        let path = Config::global().resolve(DECAY_TABLE_KEY)?;
        Ok(Self::new(DecayTable::from_file(path)?))
    }

    pub fn with_electrons(mut self, have_electrons: bool) -> Self {
        self.have_electrons = have_electrons;
        self
    }

    pub fn with_neutrinos(mut self, have_neutrinos: bool) -> Self {
        self.have_neutrinos = have_neutrinos;
        self
    }

    fn channel_rates(&self, candidate: &Candidate) -> Vec<f64> {
        let state = candidate.current();
        if !state.is_nucleus() {
            return Vec::new();
        }
        let gamma = state.lorentz_factor();
        if !gamma.is_finite() {
            return Vec::new();
        }
        self.table
            .channels(state.id())
            .iter()
            .map(|channel| 1.0 / (gamma * C_LIGHT * channel.lifetime))
            .collect()
    }

    fn beta_decay(&self, candidate: &mut Candidate, beta_plus: bool, position: Vector3<f64>, rng: &mut FastRng) {
        let state = candidate.current();
        let (a, z) = (state.mass_number(), state.charge_number());
        let daughter_z = if beta_plus { z - 1 } else { z + 1 };
        if daughter_z < 0 || daughter_z > a {
            log::warn!("NuclearDecay: beta decay impossible for A={} Z={}", a, z);
            return;
        }
        let gamma = state.lorentz_factor();
        let daughter = nucleus_id(a, daughter_z);
        let q_value = ((nuclear_mass(state.id()) - nuclear_mass(daughter)) * C_SQUARED
            - ELECTRON_REST_ENERGY)
            .max(0.0);

        candidate.set_species(daughter);
        candidate.current_mut().set_lorentz_factor(gamma);

        let kinetic = sample_beta_kinetic_energy(q_value, rng);
        let beta = (1.0 - 1.0 / (gamma * gamma)).max(0.0).sqrt();
        if self.have_electrons {
            let e_rest = ELECTRON_REST_ENERGY + kinetic;
            let p_rest = (e_rest * e_rest - ELECTRON_REST_ENERGY * ELECTRON_REST_ENERGY).max(0.0).sqrt();
            let cos_theta = 2.0 * rng.random() - 1.0;
            let energy = gamma * (e_rest + beta * p_rest * cos_theta);
            let id = if beta_plus { POSITRON } else { ELECTRON };
            candidate.add_secondary(id, energy, position, 1.0);
        }
        if self.have_neutrinos {
            let e_rest = q_value - kinetic;
            let cos_theta = 2.0 * rng.random() - 1.0;
            let energy = gamma * e_rest * (1.0 + beta * cos_theta);
            let id = if beta_plus { ELECTRON_NEUTRINO } else { ELECTRON_ANTINEUTRINO };
            if energy > 0.0 {
                candidate.add_secondary(id, energy, position, 1.0);
            }
        }
    }

    /// Emit `count` fragments (a, z) at the parent's Lorentz factor.
    fn fragment_emission(&self, candidate: &mut Candidate, a: i32, z: i32, count: u32, position: Vector3<f64>) {
        for _ in 0..count {
            let state = candidate.current();
            let (parent_a, parent_z) = (state.mass_number(), state.charge_number());
            let (rest_a, rest_z) = (parent_a - a, parent_z - z);
            if rest_a < 1 || rest_z < 0 || rest_z > rest_a {
                log::warn!(
                    "NuclearDecay: cannot emit A={} Z={} from A={} Z={}",
                    a,
                    z,
                    parent_a,
                    parent_z
                );
                return;
            }
            let gamma = state.lorentz_factor();
            let fragment = nucleus_id(a, z);
            candidate.set_species(nucleus_id(rest_a, rest_z));
            candidate.current_mut().set_lorentz_factor(gamma);
            let energy = gamma * nuclear_mass(fragment) * C_SQUARED;
            candidate.add_secondary(fragment, energy, position, 1.0);
        }
    }
}

/// Kinetic energy of the beta particle from the allowed spectrum shape
/// `p E (Q - T)^2`, by rejection sampling.
fn sample_beta_kinetic_energy(q_value: f64, rng: &mut FastRng) -> f64 {
    if !(q_value > 0.0) {
        return 0.0;
    }
    let m = ELECTRON_REST_ENERGY;
    let shape = |t: f64| {
        let e = t + m;
        (e * e - m * m).max(0.0).sqrt() * e * (q_value - t).powi(2)
    };
    let peak = (0..=64)
        .map(|i| shape(q_value * i as f64 / 64.0))
        .fold(0.0, f64::max)
        * 1.1;
    if !(peak > 0.0) {
        return 0.0;
    }
    loop {
        let t = rng.random() * q_value;
        if rng.random() * peak <= shape(t) {
            return t;
        }
    }
}

impl StochasticInteraction for NuclearDecay {
    fn rate(&self, candidate: &Candidate) -> f64 {
        self.channel_rates(candidate).iter().sum()
    }

    fn sample_channel(&self, candidate: &Candidate, rng: &mut FastRng) -> i32 {
        sample_weighted(&self.channel_rates(candidate), rng)
            .map(|i| i as i32)
            .unwrap_or(-1)
    }

    fn perform_interaction(&self, candidate: &mut Candidate, channel: i32, ctx: &mut Context) {
        let id = candidate.current().id();
        if !is_nucleus(id) {
            return;
        }
        let Some(decay) = usize::try_from(channel)
            .ok()
            .and_then(|i| self.table.channels(id).get(i).copied())
        else {
            return;
        };
        let products = DecayProducts::decode(decay.code);
        let position = random_position_on_step(candidate, ctx.rng());

        for _ in 0..products.beta_minus {
            self.beta_decay(candidate, false, position, ctx.rng());
        }
        for _ in 0..products.beta_plus {
            self.beta_decay(candidate, true, position, ctx.rng());
        }
        self.fragment_emission(candidate, 4, 2, products.alpha, position);
        self.fragment_emission(candidate, 1, 1, products.proton, position);
        self.fragment_emission(candidate, 1, 0, products.neutron, position);
    }
}

impl Module for NuclearDecay {
    fn process(&self, candidate: &mut Candidate, ctx: &mut Context) {
        process_stochastic(self, SamplingStrategy::Persisted, candidate, ctx);
    }
}
