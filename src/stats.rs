use rand::{Rng, RngCore};
use rand_distr::{Distribution, UnitSphere};

/// Direction distribution of a source.
#[derive(Debug, Clone, PartialEq)]
pub enum AngularDistribution {
    Isotropic,
    Monodirectional { reference_uvw: [f64; 3] },
}

impl AngularDistribution {
    /// Panics on a zero vector.
    pub fn new_monodirectional(u: f64, v: f64, w: f64) -> Self {
        let mag = (u * u + v * v + w * w).sqrt();
        if mag == 0.0 {
            panic!("Direction vector cannot be zero");
        }
        Self::Monodirectional {
            reference_uvw: [u / mag, v / mag, w / mag],
        }
    }

    pub fn new_isotropic() -> Self {
        Self::Isotropic
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> [f64; 3] {
        match self {
            AngularDistribution::Isotropic => UnitSphere.sample(rng),
            AngularDistribution::Monodirectional { reference_uvw } => *reference_uvw,
        }
    }
}

/// Energy distribution of a source (joules).
#[derive(Debug, Clone, PartialEq)]
pub enum EnergyDistribution {
    Monoenergetic(f64),
    /// dN/dE ~ E^index between `e_min` and `e_max`.
    PowerLaw { e_min: f64, e_max: f64, index: f64 },
}

impl EnergyDistribution {
    /// Panics unless `0 < e_min < e_max`.
    pub fn new_power_law(e_min: f64, e_max: f64, index: f64) -> Self {
        if !(e_min > 0.0 && e_max > e_min) {
            panic!("Power law needs 0 < e_min < e_max, got {} and {}", e_min, e_max);
        }
        Self::PowerLaw {
            e_min,
            e_max,
            index,
        }
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        match *self {
            EnergyDistribution::Monoenergetic(energy) => energy,
            EnergyDistribution::PowerLaw {
                e_min,
                e_max,
                index,
            } => {
                let u: f64 = rng.gen();
                if (index + 1.0).abs() < 1e-12 {
                    e_min * (e_max / e_min).powf(u)
                } else {
                    let g = index + 1.0;
                    let lo = e_min.powf(g);
                    let hi = e_max.powf(g);
                    (lo + u * (hi - lo)).powf(1.0 / g)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fast_rng::FastRng;

    #[test]
    fn test_monodirectional_distribution() {
        let mut rng = FastRng::new(1);
        let mono = AngularDistribution::new_monodirectional(0.0, 0.0, 2.0);
        assert_eq!(mono.sample(&mut rng), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_isotropic_randomness() {
        let mut rng = FastRng::new(5);
        let iso = AngularDistribution::Isotropic;
        let mut mean = [0.0; 3];
        let n = 20_000;
        for _ in 0..n {
            let s = iso.sample(&mut rng);
            let mag = (s[0] * s[0] + s[1] * s[1] + s[2] * s[2]).sqrt();
            assert!((mag - 1.0).abs() < 1e-10);
            for k in 0..3 {
                mean[k] += s[k] / n as f64;
            }
        }
        for m in mean {
            assert!(m.abs() < 0.03, "mean component {}", m);
        }
    }

    #[test]
    #[should_panic(expected = "Direction vector cannot be zero")]
    fn test_zero_direction_panics() {
        AngularDistribution::new_monodirectional(0.0, 0.0, 0.0);
    }

    #[test]
    fn test_power_law_within_bounds() {
        let mut rng = FastRng::new(9);
        for index in [-1.0, -2.7, 0.0] {
            let dist = EnergyDistribution::new_power_law(1.0, 100.0, index);
            for _ in 0..1000 {
                let e = dist.sample(&mut rng);
                assert!((1.0..=100.0).contains(&e), "index {} gave {}", index, e);
            }
        }
    }

    #[test]
    fn test_power_law_flat_mean() {
        let mut rng = FastRng::new(11);
        let dist = EnergyDistribution::new_power_law(1.0, 3.0, 0.0);
        let n = 50_000;
        let mean = (0..n).map(|_| dist.sample(&mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 2.0).abs() < 0.02);
    }

    #[test]
    fn test_send_sync_bounds() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<AngularDistribution>();
        assert_sync::<EnergyDistribution>();
    }
}
