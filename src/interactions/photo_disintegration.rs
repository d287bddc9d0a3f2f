use super::{process_stochastic, random_position_on_step, sample_weighted, SamplingStrategy, StochasticInteraction};
use crate::candidate::Candidate;
use crate::config::Config;
use crate::error::Result;
use crate::fast_rng::FastRng;
use crate::module::{Context, Module};
use crate::particle_id::nucleus_id;
use crate::photon_field::PhotonField;
use crate::tables::{DisintegrationProducts, DisintegrationTable};

/// Photo-disintegration of nuclei on a photon background.
///
/// Channel rates are tabulated against the nucleus' Lorentz factor. Emitted
/// fragments and the remaining nucleus share the energy per nucleon of the
/// parent.
pub struct PhotoDisintegration {
    table: DisintegrationTable,
    photon_field: PhotonField,
}

impl PhotoDisintegration {
    pub fn new(table: DisintegrationTable, photon_field: PhotonField) -> Self {
        Self {
            table,
            photon_field,
        }
    }

    /// Load the table for `photon_field` from the data set
    /// `PhotoDisintegration_<field>`.
    pub fn from_config(photon_field: PhotonField) -> Result<Self> {
        let key = format!("PhotoDisintegration_{}", photon_field.name());
        let path = Config::global().resolve(&key)?;
        Ok(Self::new(DisintegrationTable::from_file(path)?, photon_field))
    }

    pub fn photon_field(&self) -> &PhotonField {
        &self.photon_field
    }

    fn channel_rates(&self, candidate: &Candidate) -> Vec<f64> {
        let state = candidate.current();
        if !state.is_nucleus() || state.mass_number() < 2 {
            return Vec::new();
        }
        let gamma = state.lorentz_factor();
        let z = candidate.redshift();
        self.table
            .channels(state.id())
            .iter()
            .map(|channel| {
                self.photon_field
                    .scaled_rate(|g| self.table.channel_rate(channel, g), gamma, z)
            })
            .collect()
    }
}

impl StochasticInteraction for PhotoDisintegration {
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
        let Some(code) = usize::try_from(channel)
            .ok()
            .and_then(|i| self.table.channels(id).get(i))
            .map(|c| c.code)
        else {
            return;
        };
        let products = DisintegrationProducts::decode(code);
        let (d_a, d_z) = products.mass_and_charge_change();
        let (a, z) = (candidate.current().mass_number(), candidate.current().charge_number());
        let (rest_a, rest_z) = (a - d_a, z - d_z);
        if rest_a < 0 || rest_z < 0 || rest_z > rest_a || (rest_a == 0 && rest_z != 0) {
            log::warn!(
                "PhotoDisintegration: channel {} cannot act on A={} Z={}",
                code,
                a,
                z
            );
            return;
        }

        let energy_per_nucleon = candidate.current().energy() / a as f64;
        let position = random_position_on_step(candidate, ctx.rng());
        for fragment in products.fragment_ids() {
            let fragment_a = crate::particle_id::mass_number(fragment);
            candidate.add_secondary(fragment, energy_per_nucleon * fragment_a as f64, position, 1.0);
        }

        if rest_a == 0 {
            candidate.deactivate("PhotoDisintegration");
            return;
        }
        candidate.set_species(nucleus_id(rest_a, rest_z));
        candidate
            .current_mut()
            .set_energy(energy_per_nucleon * rest_a as f64);
    }
}

impl Module for PhotoDisintegration {
    fn process(&self, candidate: &mut Candidate, ctx: &mut Context) {
        process_stochastic(self, SamplingStrategy::Persisted, candidate, ctx);
    }

    fn description(&self) -> String {
        format!("PhotoDisintegration({})", self.photon_field.name())
    }
}
