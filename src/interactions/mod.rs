//! Stochastic interactions.
//!
//! Every probabilistic process is described by a [`StochasticInteraction`]:
//! a rate for the candidate's current state, a channel sampler and the action
//! that performs the interaction. [`process_stochastic`] drives it with one of
//! two free-path strategies:
//!
//! * [`SamplingStrategy::Persisted`] samples the free path once and keeps it
//!   in the candidate's interaction-state cache under the module's id,
//!   consuming it step by step.
//! * [`SamplingStrategy::PerTick`] draws fresh free paths against the step
//!   just taken, so one tick may contain several interactions.
//!
//! Both rely on the exponential distribution being memoryless.

mod electron_pair_production;
mod em_pair_production;
mod nuclear_decay;
mod photo_disintegration;
mod photo_pion;
mod synchrotron;

pub use electron_pair_production::ElectronPairProduction;
pub use em_pair_production::EMPairProduction;
pub use nuclear_decay::NuclearDecay;
pub use photo_disintegration::PhotoDisintegration;
pub use photo_pion::PhotoPionProduction;
pub use synchrotron::SynchrotronRadiation;

use crate::candidate::{Candidate, InteractionState};
use crate::error::{Error, Result};
use crate::fast_rng::FastRng;
use crate::module::Context;
use nalgebra::Vector3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingStrategy {
    Persisted,
    /// `limit` is the fraction of the mean free path the next step may span.
    PerTick { limit: f64 },
}

impl SamplingStrategy {
    pub fn per_tick(limit: f64) -> Result<Self> {
        if limit > 0.0 && limit.is_finite() {
            Ok(Self::PerTick { limit })
        } else {
            Err(Error::invalid(format!(
                "step limit must be positive, got {}",
                limit
            )))
        }
    }
}

pub trait StochasticInteraction: Send + Sync {
    /// Total interaction rate (1/m) in the candidate's current state,
    /// redshift scaling included. Zero when the process does not apply.
    fn rate(&self, candidate: &Candidate) -> f64;

    /// Pick the channel of the next interaction.
    fn sample_channel(&self, _candidate: &Candidate, _rng: &mut FastRng) -> i32 {
        0
    }

    fn perform_interaction(&self, candidate: &mut Candidate, channel: i32, ctx: &mut Context);
}

/// Run one tick of `interaction` on the candidate.
///
/// The step just taken is consumed by pending or freshly sampled free paths;
/// whatever remains limits the next step. Nothing happens to inactive
/// candidates or when the rate is zero.
pub fn process_stochastic<I>(
    interaction: &I,
    strategy: SamplingStrategy,
    candidate: &mut Candidate,
    ctx: &mut Context,
) where
    I: StochasticInteraction + ?Sized,
{
    match strategy {
        SamplingStrategy::Persisted => process_persisted(interaction, candidate, ctx),
        SamplingStrategy::PerTick { limit } => process_per_tick(interaction, limit, candidate, ctx),
    }
}

fn process_persisted<I>(interaction: &I, candidate: &mut Candidate, ctx: &mut Context)
where
    I: StochasticInteraction + ?Sized,
{
    let module = ctx.module_id();
    let mut step = candidate.current_step();
    while candidate.is_active() {
        let state = match candidate.interaction_state(module) {
            Some(state) => state,
            None => {
                let rate = interaction.rate(candidate);
                if !(rate > 0.0) {
                    return;
                }
                let distance = ctx.rng().exponential(rate);
                let channel = interaction.sample_channel(candidate, ctx.rng());
                InteractionState::new(distance, channel)
            }
        };

        if state.distance > step {
            let remaining = state.distance - step;
            candidate.limit_next_step(remaining);
            candidate.set_interaction_state(module, InteractionState::new(remaining, state.channel));
            return;
        }

        step -= state.distance;
        candidate.remove_interaction_state(module);
        interaction.perform_interaction(candidate, state.channel, ctx);
    }
}

fn process_per_tick<I>(interaction: &I, limit: f64, candidate: &mut Candidate, ctx: &mut Context)
where
    I: StochasticInteraction + ?Sized,
{
    let mut step = candidate.current_step();
    while candidate.is_active() {
        let rate = interaction.rate(candidate);
        if !(rate > 0.0) {
            return;
        }
        let distance = ctx.rng().exponential(rate);
        if distance > step {
            candidate.limit_next_step(limit / rate);
            return;
        }
        step -= distance;
        let channel = interaction.sample_channel(candidate, ctx.rng());
        interaction.perform_interaction(candidate, channel, ctx);
    }
}

/// Uniformly random point on the step just taken.
pub fn random_position_on_step(candidate: &Candidate, rng: &mut FastRng) -> Vector3<f64> {
    let a = candidate.previous().position();
    let b = candidate.current().position();
    a + (b - a) * rng.random()
}

/// Weighted down-sampling of secondaries.
///
/// A secondary carrying `fraction` of the parent energy is kept with
/// probability `fraction^exponent` and its weight is divided by that
/// probability, so expectation values are unchanged. An exponent of zero
/// keeps everything.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Thinning {
    exponent: f64,
}

impl Thinning {
    pub fn new(exponent: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&exponent) {
            Ok(Self { exponent })
        } else {
            Err(Error::invalid(format!(
                "thinning exponent must be in [0, 1], got {}",
                exponent
            )))
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    /// Weight factor for an accepted secondary, `None` if it is dropped.
    pub fn accept(&self, fraction: f64, rng: &mut FastRng) -> Option<f64> {
        if self.exponent == 0.0 {
            return Some(1.0);
        }
        let probability = fraction.clamp(0.0, 1.0).powf(self.exponent);
        if probability > 0.0 && rng.random() < probability {
            Some(1.0 / probability)
        } else {
            None
        }
    }
}

/// Pick an index with probability proportional to `weights`.
pub(crate) fn sample_weighted(weights: &[f64], rng: &mut FastRng) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        return None;
    }
    let target = rng.random() * total;
    let mut cumulative = 0.0;
    for (index, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if target < cumulative {
            return Some(index);
        }
    }
    weights.iter().rposition(|&w| w > 0.0)
}
