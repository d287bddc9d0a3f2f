use super::{process_stochastic, random_position_on_step, SamplingStrategy, StochasticInteraction, Thinning};
use crate::candidate::Candidate;
use crate::config::Config;
use crate::error::Result;
use crate::module::{Context, Module};
use crate::particle_id::{ELECTRON, PHOTON, POSITRON};
use crate::photon_field::PhotonField;
use crate::tables::{TabulatedCdf, TabulatedRate};
use crate::units::ELECTRON_REST_ENERGY;

/// Breit-Wheeler pair production of photons on a photon background.
///
/// The photon is absorbed and replaced by an electron-positron pair. The
/// squared centre-of-mass energy `s` is drawn from the tabulated cumulative
/// rate; the lepton energies follow from isotropic emission in the
/// centre-of-mass frame.
pub struct EMPairProduction {
    rates: TabulatedRate,
    cdf: TabulatedCdf,
    photon_field: PhotonField,
    strategy: SamplingStrategy,
    thinning: Thinning,
    have_electrons: bool,
}

impl EMPairProduction {
    pub fn new(rates: TabulatedRate, cdf: TabulatedCdf, photon_field: PhotonField) -> Self {
        Self {
            rates,
            cdf,
            photon_field,
            strategy: SamplingStrategy::PerTick { limit: 0.1 },
            thinning: Thinning::none(),
            have_electrons: true,
        }
    }

    /// Load `EMPairProduction_<field>` (rates) and
    /// `EMPairProduction_<field>_CDF` through the global configuration.
    pub fn from_config(photon_field: PhotonField) -> Result<Self> {
        let key = format!("EMPairProduction_{}", photon_field.name());
        let (rate_path, cdf_path) = {
            let config = Config::global();
            (config.resolve(&key)?, config.resolve(&format!("{}_CDF", key))?)
        };
        Ok(Self::new(
            TabulatedRate::from_file(rate_path)?,
            TabulatedCdf::from_file(cdf_path)?,
            photon_field,
        ))
    }

    pub fn with_limit(mut self, limit: f64) -> Result<Self> {
        self.strategy = SamplingStrategy::per_tick(limit)?;
        Ok(self)
    }

    pub fn with_thinning(mut self, exponent: f64) -> Result<Self> {
        self.thinning = Thinning::new(exponent)?;
        Ok(self)
    }

    pub fn with_electrons(mut self, have_electrons: bool) -> Self {
        self.have_electrons = have_electrons;
        self
    }
}

impl StochasticInteraction for EMPairProduction {
    fn rate(&self, candidate: &Candidate) -> f64 {
        if candidate.current().id() != PHOTON {
            return 0.0;
        }
        self.photon_field.scaled_rate(
            |e| self.rates.rate(e),
            candidate.current().energy(),
            candidate.redshift(),
        )
    }

    fn perform_interaction(&self, candidate: &mut Candidate, _channel: i32, ctx: &mut Context) {
        if !self.have_electrons {
            candidate.deactivate("EMPairProduction");
            return;
        }
        let zp1 = 1.0 + candidate.redshift();
        let energy = candidate.current().energy() * zp1;
        let threshold = 4.0 * ELECTRON_REST_ENERGY * ELECTRON_REST_ENERGY;
        let s = self
            .cdf
            .sample(energy, ctx.rng().random())
            .unwrap_or(threshold)
            .max(threshold);

        // isotropic decay in the centre-of-mass frame
        let beta = (1.0 - threshold / s).max(0.0).sqrt();
        let cos_theta = 2.0 * ctx.rng().random() - 1.0;
        let electron = 0.5 * energy * (1.0 + beta * cos_theta);
        let positron = energy - electron;
        let fraction = electron / energy;

        let position = random_position_on_step(candidate, ctx.rng());
        if let Some(w) = self.thinning.accept(fraction, ctx.rng()) {
            candidate.add_secondary(ELECTRON, electron / zp1, position, w);
        }
        if let Some(w) = self.thinning.accept(1.0 - fraction, ctx.rng()) {
            candidate.add_secondary(POSITRON, positron / zp1, position, w);
        }
        candidate.deactivate("EMPairProduction");
    }
}

impl Module for EMPairProduction {
    fn process(&self, candidate: &mut Candidate, ctx: &mut Context) {
        process_stochastic(self, self.strategy, candidate, ctx);
    }

    fn description(&self) -> String {
        format!("EMPairProduction({})", self.photon_field.name())
    }
}
