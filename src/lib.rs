pub mod bank;
pub mod boundaries;
pub mod candidate;
pub mod config;
pub mod data;
pub mod error;
pub mod fast_rng;
pub mod field;
pub mod interactions;
pub mod module;
pub mod output;
pub mod particle;
pub mod particle_id;
pub mod photon_field;
pub mod propagation;
pub mod settings;
pub mod source;
pub mod stats;
pub mod tables;
pub mod units;
pub mod utilities;

pub use bank::CandidateBank;
pub use boundaries::{MaximumTrajectoryLength, MinimumEnergy, ObserverSphere, SphericalBoundary};
pub use candidate::{Candidate, InteractionState, ModuleId};
pub use config::Config;
pub use error::{Error, Result};
pub use fast_rng::FastRng;
pub use field::{FieldError, MagneticField, UniformField, ZeroField};
pub use interactions::{
    EMPairProduction, ElectronPairProduction, NuclearDecay, PhotoDisintegration,
    PhotoPionProduction, SamplingStrategy, StochasticInteraction, SynchrotronRadiation, Thinning,
};
pub use module::{Context, Module, ModuleList, RunSummary};
pub use output::{CandidateCollector, CandidateFilter, EnergyTally, Output};
pub use particle::ParticleState;
pub use photon_field::PhotonField;
pub use propagation::{PropagationBP, PropagationCK, SimplePropagation};
pub use settings::Settings;
pub use source::{IndependentSource, Source};
pub use stats::{AngularDistribution, EnergyDistribution};
pub use tables::{DecayTable, DisintegrationTable, TabulatedCdf, TabulatedRate};
pub use utilities::interpolate_linear;
