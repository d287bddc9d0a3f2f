// src/data.rs
// Static nuclear data used by the interaction modules. Only a handful of
// nuclides carry measured values; everything else falls back to the
// semi-empirical mass formula, which is accurate to a few MeV and well below
// the energy scales propagated here.
use crate::particle_id::{charge_number, mass_number, nucleus_id};
use crate::units::{AMU, C_SQUARED, MASS_ELECTRON, MASS_NEUTRON, MASS_PROTON, MEV};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Measured atomic masses in unified atomic mass units, keyed by nucleus id.
///
/// Values are atomic (neutral atom) masses; [`nuclear_mass`] removes the
/// electron masses before returning.
pub static ATOMIC_MASSES: Lazy<HashMap<i32, f64>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(nucleus_id(2, 1), 2.01410177812);
    m.insert(nucleus_id(3, 1), 3.01604928199);
    m.insert(nucleus_id(3, 2), 3.01602932265);
    m.insert(nucleus_id(4, 2), 4.00260325413);
    m.insert(nucleus_id(6, 3), 6.0151228874);
    m.insert(nucleus_id(7, 3), 7.0160034366);
    m.insert(nucleus_id(9, 4), 9.012183065);
    m.insert(nucleus_id(12, 6), 12.0);
    m.insert(nucleus_id(14, 7), 14.00307400443);
    m.insert(nucleus_id(16, 8), 15.99491461957);
    m.insert(nucleus_id(20, 10), 19.9924401762);
    m.insert(nucleus_id(24, 12), 23.985041697);
    m.insert(nucleus_id(28, 14), 27.97692653465);
    m.insert(nucleus_id(56, 26), 55.9349363);
    m
});

/// Nuclear binding energy (joules) from the Bethe-Weizsaecker formula.
pub fn binding_energy_semf(a: i32, z: i32) -> f64 {
    if a <= 1 {
        return 0.0;
    }
    let af = a as f64;
    let zf = z as f64;
    let n = a - z;
    let volume = 15.75 * af;
    let surface = 17.8 * af.powf(2.0 / 3.0);
    let coulomb = 0.711 * zf * (zf - 1.0) / af.cbrt();
    let asymmetry = 23.7 * (af - 2.0 * zf).powi(2) / af;
    let pairing = if a % 2 == 1 {
        0.0
    } else if z % 2 == 0 && n % 2 == 0 {
        11.18 / af.sqrt()
    } else {
        -11.18 / af.sqrt()
    };
    (volume - surface - coulomb - asymmetry + pairing).max(0.0) * MEV
}

/// Rest mass (kg) of the nucleus with the given id.
pub fn nuclear_mass(id: i32) -> f64 {
    let a = mass_number(id);
    let z = charge_number(id);
    if a == 1 {
        return if z == 1 { MASS_PROTON } else { MASS_NEUTRON };
    }
    if let Some(&atomic) = ATOMIC_MASSES.get(&id) {
        return atomic * AMU - z as f64 * MASS_ELECTRON;
    }
    z as f64 * MASS_PROTON + (a - z) as f64 * MASS_NEUTRON - binding_energy_semf(a, z) / C_SQUARED
}
