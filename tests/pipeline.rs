// End-to-end runs of small pipelines.

use cosmic_ray_mc::output::CandidateFilter;
use cosmic_ray_mc::particle_id::{neutron, proton, ELECTRON, ELECTRON_ANTINEUTRINO, PHOTON};
use cosmic_ray_mc::tables::DecayChannel;
use cosmic_ray_mc::units::{EEV, KPC, MICROGAUSS, MPC};
use cosmic_ray_mc::{
    AngularDistribution, Candidate, CandidateCollector, Context, DecayTable, EnergyDistribution,
    EnergyTally, IndependentSource, MaximumTrajectoryLength, MinimumEnergy, ModuleList,
    NuclearDecay, ObserverSphere, ParticleState, PropagationBP, PropagationCK, Settings,
    SimplePropagation, SphericalBoundary, UniformField,
};
use nalgebra::Vector3;
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_observer_detects_every_candidate() {
    init_logging();
    let mut modules = ModuleList::new();
    modules.add(SimplePropagation::new(1.0 * KPC, 100.0 * KPC).unwrap());
    modules.add(ObserverSphere::new("shell", Vector3::zeros(), 1.0 * MPC, 1.0 * KPC).unwrap());
    modules.add(MaximumTrajectoryLength::new(10.0 * MPC).unwrap());

    let source = IndependentSource {
        particle_id: PHOTON,
        angle: AngularDistribution::Isotropic,
        ..IndependentSource::default()
    };
    let detected = CandidateCollector::with_filter(CandidateFilter {
        particle_id: None,
        required_property: Some("Detected".to_string()),
    });
    let settings = Settings {
        candidates: 100,
        ..Settings::default()
    };
    let summary = modules.run_source(&source, &settings, &[&detected]);
    assert_eq!(summary.finished, 100);
    assert_eq!(detected.len(), 100);
    for c in detected.sorted() {
        let r = c.current().position().norm();
        assert!(r >= 1.0 * MPC && r <= 1.0 * MPC + 1.001 * KPC);
        assert_eq!(c.property("Detected"), Some("shell"));
        assert_eq!(c.property("Deactivated"), Some("ObserverSphere"));
    }
}

#[test]
fn test_neutron_decay_chain_recursive() {
    init_logging();
    let mut table = DecayTable::new();
    table
        .insert(neutron(), DecayChannel { lifetime: 880.0, code: 10000 })
        .unwrap();
    let mut modules = ModuleList::new();
    modules.add(SimplePropagation::new(0.1 * KPC, 1.0 * KPC).unwrap());
    modules.add(NuclearDecay::new(table));
    modules.add(MaximumTrajectoryLength::new(1.0 * MPC).unwrap());

    let start = Candidate::new(ParticleState::new(neutron(), 1.0 * EEV, Vector3::zeros(), Vector3::x()));
    let mut ctx = Context::new(3);
    let (finished, dropped) = modules.run_recursive(start, &mut ctx, 100);
    assert_eq!(dropped, 0);

    // a 1 EeV neutron decays after ~9 kpc, far below 1 Mpc
    let ids: Vec<i32> = finished.iter().map(|c| c.current().id()).collect();
    assert_eq!(ids, vec![proton(), ELECTRON, ELECTRON_ANTINEUTRINO]);
    let parent = finished[0].serial_number();
    for secondary in &finished[1..] {
        assert_eq!(secondary.parent_serial(), Some(parent));
        assert!(secondary.initial().position().x < 1.0 * MPC);
        let length = secondary.trajectory_length();
        assert!(length >= 1.0 * MPC && length <= 1.0 * MPC + 0.1 * KPC);
    }
}

#[test]
fn test_charged_particles_stay_in_field_region() {
    init_logging();
    let field = Arc::new(UniformField::new(Vector3::new(0.0, 0.0, 10.0 * MICROGAUSS)));
    for propagator in 0..2 {
        let mut modules = ModuleList::new();
        if propagator == 0 {
            modules.add(PropagationCK::new(field.clone(), 1e-4, 1e-3 * KPC, 10.0 * KPC).unwrap());
        } else {
            modules.add(PropagationBP::new(field.clone(), 1e-4, 1e-3 * KPC, 10.0 * KPC).unwrap());
        }
        modules.add(SphericalBoundary::new(Vector3::zeros(), 1.0 * MPC, 1.0 * KPC).unwrap());
        modules.add(MaximumTrajectoryLength::new(50.0 * KPC).unwrap());

        // 1 EeV protons gyrate with r ~ 0.1 kpc in 10 microgauss
        let source = IndependentSource {
            angle: AngularDistribution::new_monodirectional(1.0, 0.0, 0.0),
            energy: EnergyDistribution::Monoenergetic(1.0 * EEV),
            ..IndependentSource::default()
        };
        let collector = CandidateCollector::new();
        let settings = Settings {
            candidates: 4,
            parallel: false,
            ..Settings::default()
        };
        modules.run_source(&source, &settings, &[&collector]);
        for c in collector.into_inner() {
            assert_eq!(c.property("Deactivated"), Some("MaximumTrajectoryLength"));
            assert!(c.current().position().norm() < 1.0 * KPC);
            assert!((c.current().direction().norm() - 1.0).abs() < 1e-9);
        }
    }
}

#[test]
fn test_energy_tally_over_batches() {
    init_logging();
    let mut modules = ModuleList::new();
    modules.add(SimplePropagation::new(1.0 * KPC, 1.0 * KPC).unwrap());
    modules.add(MinimumEnergy::new(0.0));
    modules.add(MaximumTrajectoryLength::new(1.0 * KPC).unwrap());

    let source = IndependentSource {
        energy: EnergyDistribution::new_power_law(1.0 * EEV, 100.0 * EEV, -1.0),
        ..IndependentSource::default()
    };
    let tally = EnergyTally::new("spectrum", 1.0 * EEV, 100.0 * EEV, 2).unwrap();
    for seed in 0..10 {
        let settings = Settings {
            candidates: 500,
            seed,
            ..Settings::default()
        };
        let summary = modules.run_source(&source, &settings, &[&tally]);
        tally.end_batch(summary.primaries);
    }
    assert_eq!(tally.n_batches(), 10);
    // E^-1 is flat in log E: half of the primaries per decade
    for (mean, rel) in tally.mean().iter().zip(tally.rel_error()) {
        assert!((mean - 0.5).abs() < 0.05, "mean {}", mean);
        assert!(rel < 0.05);
    }
}
