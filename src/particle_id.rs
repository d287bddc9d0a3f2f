//! Particle codes.
//!
//! Leptons, photons and mesons use their PDG numbers. Nuclei use the PDG nucleus
//! scheme `1_000_000_000 + Z * 10_000 + A * 10`; a free proton is the nucleus
//! with Z = A = 1 and a free neutron the nucleus with Z = 0, A = 1.

pub const ELECTRON: i32 = 11;
pub const POSITRON: i32 = -11;
pub const ELECTRON_NEUTRINO: i32 = 12;
pub const ELECTRON_ANTINEUTRINO: i32 = -12;
pub const MUON_NEUTRINO: i32 = 14;
pub const MUON_ANTINEUTRINO: i32 = -14;
pub const PHOTON: i32 = 22;
pub const PION_ZERO: i32 = 111;
pub const PION_PLUS: i32 = 211;

const NUCLEUS_OFFSET: i32 = 1_000_000_000;

/// Id of a nucleus, or `None` if the pair is unphysical (`a < 1`, `z < 0`,
/// `z > a`) or does not fit the encoding (`a > 999`).
pub fn try_nucleus_id(a: i32, z: i32) -> Option<i32> {
    if a < 1 || z < 0 || z > a || a > 999 {
        return None;
    }
    Some(NUCLEUS_OFFSET + z * 10_000 + a * 10)
}

/// Build the id of a nucleus with mass number `a` and charge number `z`.
///
/// Panics where [`try_nucleus_id`] returns `None`. Data files go through
/// [`try_nucleus_id`] so a bad row is reported as a parse error.
pub fn nucleus_id(a: i32, z: i32) -> i32 {
    match try_nucleus_id(a, z) {
        Some(id) => id,
        None => panic!("nucleus_id: unphysical nucleus A={} Z={}", a, z),
    }
}

pub fn proton() -> i32 {
    nucleus_id(1, 1)
}

pub fn neutron() -> i32 {
    nucleus_id(1, 0)
}

/// True for ids in the nucleus range (including free nucleons).
pub fn is_nucleus(id: i32) -> bool {
    id >= NUCLEUS_OFFSET
}

/// Charge number Z of a nucleus, or 0 for non-nuclei.
pub fn charge_number(id: i32) -> i32 {
    if !is_nucleus(id) {
        return 0;
    }
    (id - NUCLEUS_OFFSET) / 10_000 % 1000
}

/// Mass number A of a nucleus, or 0 for non-nuclei.
pub fn mass_number(id: i32) -> i32 {
    if !is_nucleus(id) {
        return 0;
    }
    (id - NUCLEUS_OFFSET) / 10 % 1000
}

/// Electric charge in units of the elementary charge, for any particle code.
pub fn charge_units(id: i32) -> i32 {
    if is_nucleus(id) {
        return charge_number(id);
    }
    match id {
        ELECTRON => -1,
        POSITRON => 1,
        PION_PLUS => 1,
        -211 => -1,
        13 => -1,
        -13 => 1,
        _ => 0,
    }
}
