//! Synchrotron radiation of charged particles in a magnetic field.
//!
//! With `r` the gyration radius, the energy loss per length is
//! `dE/dx = q² γ⁴ / (6π ε₀ r²)` and photon energies scale with the critical
//! energy `ε_c = 3/2 ħ c γ³ / r`. Photons above `secondary_threshold` are
//! emitted one by one through the per-tick stochastic loop; the energy
//! radiated below the threshold is removed continuously.

use super::{process_stochastic, random_position_on_step, SamplingStrategy, StochasticInteraction};
use crate::candidate::Candidate;
use crate::error::{Error, Result};
use crate::field::{FieldSampler, MagneticField};
use crate::module::{Context, Module};
use crate::particle_id::PHOTON;
use crate::units::{C_LIGHT, EPSILON0, H_BAR, MEV};
use std::f64::consts::PI;
use std::sync::Arc;

/// F(x) = x ∫_x^∞ K_{5/3}(t) dt, approximation of Aharonian, Kelner and
/// Prosekin (2010), accurate to better than one percent.
fn synchrotron_function(x: f64) -> f64 {
    let x13 = x.cbrt();
    let x23 = x13 * x13;
    let x43 = x23 * x23;
    2.15 * x13
        * (1.0 + 3.06 * x).powf(1.0 / 6.0)
        * (1.0 + 0.884 * x23 + 0.471 * x43)
        / (1.0 + 1.64 * x23 + 0.974 * x43)
        * (-x).exp()
}

/// Photon spectrum in units of the critical energy, tabulated once.
///
/// `number[i]` and `energy[i]` are the cumulative photon number and energy
/// below `x[i]`, for the number spectrum `dN/dx ∝ F(x)/x`.
#[derive(Debug, Clone)]
struct SynchrotronSpectrum {
    ln_x: Vec<f64>,
    number: Vec<f64>,
    energy: Vec<f64>,
}

impl SynchrotronSpectrum {
    const X_MIN: f64 = 1e-8;
    const X_MAX: f64 = 60.0;
    const POINTS: usize = 1000;

    fn new() -> Self {
        let (lo, hi) = (Self::X_MIN.ln(), Self::X_MAX.ln());
        let ln_x: Vec<f64> = (0..Self::POINTS)
            .map(|i| lo + (hi - lo) * i as f64 / (Self::POINTS - 1) as f64)
            .collect();
        // below X_MIN, F(x)/x ~ 2.15 x^(-2/3)
        let mut number = vec![3.0 * 2.15 * Self::X_MIN.cbrt()];
        let mut energy = vec![0.75 * 2.15 * Self::X_MIN.powf(4.0 / 3.0)];
        for i in 1..ln_x.len() {
            let (x0, x1) = (ln_x[i - 1].exp(), ln_x[i].exp());
            let d = ln_x[i] - ln_x[i - 1];
            // dN = F(x)/x dx = F(x) dln x, dW = x F(x) dln x
            let (f0, f1) = (synchrotron_function(x0), synchrotron_function(x1));
            number.push(number[i - 1] + 0.5 * (f0 + f1) * d);
            energy.push(energy[i - 1] + 0.5 * (x0 * f0 + x1 * f1) * d);
        }
        Self {
            ln_x,
            number,
            energy,
        }
    }

    fn total_number(&self) -> f64 {
        self.number[self.number.len() - 1]
    }

    fn total_energy(&self) -> f64 {
        self.energy[self.energy.len() - 1]
    }

    /// Mean photon energy in units of the critical energy.
    fn mean_x(&self) -> f64 {
        self.total_energy() / self.total_number()
    }

    fn cumulative(&self, table: &[f64], x: f64) -> f64 {
        if !(x > Self::X_MIN) {
            return table[0] * (x.max(0.0) / Self::X_MIN).cbrt();
        }
        crate::utilities::interpolate_linear(&self.ln_x, table, x.ln())
    }

    /// Fraction of photons above `x`.
    fn number_above(&self, x: f64) -> f64 {
        1.0 - self.cumulative(&self.number, x) / self.total_number()
    }

    /// Fraction of radiated energy below `x`.
    fn energy_below(&self, x: f64) -> f64 {
        self.cumulative(&self.energy, x) / self.total_energy()
    }

    /// Photon energy (in units of ε_c) above `x_min`, from a uniform `u`.
    fn sample_above(&self, x_min: f64, u: f64) -> f64 {
        let start = self.cumulative(&self.number, x_min);
        let target = start + u * (self.total_number() - start);
        let i = self.number.partition_point(|&n| n < target);
        if i == 0 {
            return Self::X_MIN.max(x_min);
        }
        if i >= self.number.len() {
            return Self::X_MAX;
        }
        let (n0, n1) = (self.number[i - 1], self.number[i]);
        let t = if n1 > n0 { (target - n0) / (n1 - n0) } else { 0.0 };
        (self.ln_x[i - 1] + t * (self.ln_x[i] - self.ln_x[i - 1]))
            .exp()
            .max(x_min)
    }
}

/// Emission quantities for the candidate's current state.
struct Emission {
    /// Energy loss per length (J/m).
    loss: f64,
    /// Critical photon energy (J).
    critical_energy: f64,
}

pub struct SynchrotronRadiation {
    field: Arc<dyn MagneticField>,
    spectrum: SynchrotronSpectrum,
    secondary_threshold: f64,
    limit: f64,
    have_photons: bool,
}

impl SynchrotronRadiation {
    pub fn new(field: Arc<dyn MagneticField>) -> Self {
        Self {
            field,
            spectrum: SynchrotronSpectrum::new(),
            secondary_threshold: 1.0 * MEV,
            limit: 0.1,
            have_photons: true,
        }
    }

    /// Photons below this energy (J) are not emitted individually.
    pub fn with_secondary_threshold(mut self, threshold: f64) -> Result<Self> {
        if !(threshold > 0.0) {
            return Err(Error::invalid(format!(
                "secondary threshold must be positive, got {}",
                threshold
            )));
        }
        self.secondary_threshold = threshold;
        Ok(self)
    }

    /// Maximum relative energy loss per step, also the fraction of the mean
    /// emission length the next step may span.
    pub fn with_limit(mut self, limit: f64) -> Result<Self> {
        SamplingStrategy::per_tick(limit)?;
        self.limit = limit;
        Ok(self)
    }

    pub fn with_photons(mut self, have_photons: bool) -> Self {
        self.have_photons = have_photons;
        self
    }

    fn emission(&self, candidate: &Candidate) -> Option<Emission> {
        let state = candidate.current();
        let charge = state.charge();
        let gamma = state.lorentz_factor();
        if charge == 0.0 || !gamma.is_finite() {
            return None;
        }
        let b = FieldSampler::new(self.field.as_ref(), candidate.redshift()).value_at(state.position());
        let b_perp = b.cross(state.direction()).norm();
        if !(b_perp > 0.0) {
            return None;
        }
        let radius = state.energy() / (charge.abs() * C_LIGHT * b_perp);
        Some(Emission {
            loss: charge * charge * gamma.powi(4) / (6.0 * PI * EPSILON0 * radius * radius),
            critical_energy: 1.5 * H_BAR * C_LIGHT * gamma.powi(3) / radius,
        })
    }
}

impl StochasticInteraction for SynchrotronRadiation {
    fn rate(&self, candidate: &Candidate) -> f64 {
        match self.emission(candidate) {
            Some(e) => {
                let x_min = self.secondary_threshold / e.critical_energy;
                let photon_rate = e.loss / (e.critical_energy * self.spectrum.mean_x());
                photon_rate * self.spectrum.number_above(x_min)
            }
            None => 0.0,
        }
    }

    fn perform_interaction(&self, candidate: &mut Candidate, _channel: i32, ctx: &mut Context) {
        let Some(e) = self.emission(candidate) else {
            return;
        };
        let x_min = self.secondary_threshold / e.critical_energy;
        let x = self.spectrum.sample_above(x_min, ctx.rng().random());
        let energy = candidate.current().energy();
        let photon = (x * e.critical_energy).min(energy);
        candidate.current_mut().set_energy(energy - photon);
        if self.have_photons {
            let position = random_position_on_step(candidate, ctx.rng());
            candidate.add_secondary(PHOTON, photon, position, 1.0);
        }
    }
}

impl Module for SynchrotronRadiation {
    fn process(&self, candidate: &mut Candidate, ctx: &mut Context) {
        if let Some(e) = self.emission(candidate) {
            let energy = candidate.current().energy();
            let x_min = self.secondary_threshold / e.critical_energy;
            let continuous = e.loss * self.spectrum.energy_below(x_min);
            let step = candidate.current_step();
            candidate
                .current_mut()
                .set_energy(energy - continuous * step);
            if e.loss > 0.0 {
                candidate.limit_next_step(self.limit * energy / e.loss);
            }
        }
        process_stochastic(
            self,
            SamplingStrategy::PerTick { limit: self.limit },
            candidate,
            ctx,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{UniformField, ZeroField};
    use crate::particle::ParticleState;
    use crate::particle_id::{proton, ELECTRON};
    use crate::units::{EEV, EV, GEV, MICROGAUSS, TEV};
    use nalgebra::Vector3;

    fn electron(energy: f64, step: f64) -> Candidate {
        let mut c = Candidate::new(ParticleState::new(ELECTRON, energy, Vector3::zeros(), Vector3::x()));
        c.set_next_step(f64::MAX);
        c.snapshot_previous();
        c.current_mut().set_position(Vector3::new(step, 0.0, 0.0));
        c.set_current_step(step);
        c
    }

    fn field() -> Arc<dyn MagneticField> {
        Arc::new(UniformField::new(Vector3::new(0.0, 0.0, 1.0 * MICROGAUSS)))
    }

    #[test]
    fn test_spectrum_mean() {
        let spectrum = SynchrotronSpectrum::new();
        let expected = 8.0 / (15.0 * 3f64.sqrt());
        assert!((spectrum.mean_x() / expected - 1.0).abs() < 0.02);
        assert!(spectrum.number_above(0.0) > 0.999);
        assert!(spectrum.number_above(100.0) < 1e-9);
        assert!((spectrum.energy_below(1e3) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sampling_above_threshold() {
        let spectrum = SynchrotronSpectrum::new();
        let mut rng = crate::fast_rng::FastRng::new(1);
        for _ in 0..1000 {
            let x = spectrum.sample_above(0.5, rng.random());
            assert!(x >= 0.5 && x <= SynchrotronSpectrum::X_MAX);
        }
    }

    #[test]
    fn test_energy_loss_rate() {
        // electron at 90 degrees pitch: dE/dt = 2 σ_T c γ² U_B with U_B = B²/(2 μ0)
        let sr = SynchrotronRadiation::new(field());
        let c = electron(1.0 * TEV, 0.0);
        let e = sr.emission(&c).unwrap();
        let gamma = c.current().lorentz_factor();
        let b = 1.0 * MICROGAUSS;
        let mu0 = 1.0 / (EPSILON0 * C_LIGHT * C_LIGHT);
        let expected = 2.0 * crate::units::SIGMA_THOMSON * gamma * gamma * b * b / (2.0 * mu0);
        assert!((e.loss / expected - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_neutral_or_unmagnetized_unaffected() {
        let sr = SynchrotronRadiation::new(Arc::new(ZeroField));
        let mut c = electron(1.0 * TEV, 1e20);
        sr.process(&mut c, &mut Context::new(1));
        assert_eq!(c.current().energy(), 1.0 * TEV);

        let sr = SynchrotronRadiation::new(field());
        let mut photon = Candidate::new(ParticleState::new(PHOTON, TEV, Vector3::zeros(), Vector3::x()));
        photon.set_current_step(1e20);
        sr.process(&mut photon, &mut Context::new(1));
        assert_eq!(photon.current().energy(), TEV);
    }

    #[test]
    fn test_electron_radiates_photons() {
        // critical energy ~0.7 eV; a 1e8 m step emits a few tens of photons
        let sr = SynchrotronRadiation::new(field()).with_secondary_threshold(0.1 * EV).unwrap();
        let energy = 100.0 * TEV;
        let mut c = electron(energy, 1e8);
        sr.process(&mut c, &mut Context::new(2));
        assert!(c.current().energy() < energy);
        assert!(!c.secondaries().is_empty());
        let photons: f64 = c.secondaries().iter().map(|s| s.current().energy()).sum();
        assert!(c.secondaries().iter().all(|s| s.current().id() == PHOTON));
        assert!(c.current().energy() + photons <= energy * (1.0 + 1e-12));
        assert!(c.next_step() < f64::MAX);
    }

    #[test]
    fn test_step_limited_by_relative_loss() {
        let sr = SynchrotronRadiation::new(field()).with_limit(0.05).unwrap();
        let mut c = electron(1.0 * TEV, 0.0);
        let e = sr.emission(&c).unwrap();
        sr.process(&mut c, &mut Context::new(1));
        assert!(c.next_step() <= 0.05 * 1.0 * TEV / e.loss * (1.0 + 1e-12));
    }

    #[test]
    fn test_proton_losses_tiny() {
        let sr = SynchrotronRadiation::new(field());
        let p = Candidate::new(ParticleState::new(proton(), 1.0 * EEV, Vector3::zeros(), Vector3::x()));
        let e = sr.emission(&p).unwrap();
        // energy loss length far beyond the Hubble radius
        assert!(p.current().energy() / e.loss > 1e28);
        let el = electron(1.0 * GEV, 0.0);
        assert!(sr.emission(&el).unwrap().loss > 0.0);
    }
}
