// SI units and physical constants used throughout the engine.
// All lengths are meters, energies joules, fields tesla.

pub const C_LIGHT: f64 = 2.99792458e8;
pub const C_SQUARED: f64 = C_LIGHT * C_LIGHT;
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19;
pub const EPSILON0: f64 = 8.8541878128e-12;
pub const H_PLANCK: f64 = 6.62607015e-34;
pub const H_BAR: f64 = H_PLANCK / (2.0 * std::f64::consts::PI);
pub const AMU: f64 = 1.66053906660e-27;
pub const MASS_PROTON: f64 = 1.67262192369e-27;
pub const MASS_NEUTRON: f64 = 1.67492749804e-27;
pub const MASS_ELECTRON: f64 = 9.1093837015e-31;
pub const SIGMA_THOMSON: f64 = 6.6524587321e-29;

pub const EV: f64 = ELEMENTARY_CHARGE;
pub const KEV: f64 = 1e3 * EV;
pub const MEV: f64 = 1e6 * EV;
pub const GEV: f64 = 1e9 * EV;
pub const TEV: f64 = 1e12 * EV;
pub const PEV: f64 = 1e15 * EV;
pub const EEV: f64 = 1e18 * EV;
pub const ZEV: f64 = 1e21 * EV;

pub const METER: f64 = 1.0;
pub const KILOMETER: f64 = 1e3;
pub const PARSEC: f64 = 3.0856775814913673e16;
pub const KPC: f64 = 1e3 * PARSEC;
pub const MPC: f64 = 1e6 * PARSEC;
pub const GPC: f64 = 1e9 * PARSEC;

pub const TESLA: f64 = 1.0;
pub const GAUSS: f64 = 1e-4 * TESLA;
pub const MICROGAUSS: f64 = 1e-6 * GAUSS;
pub const NANOGAUSS: f64 = 1e-9 * GAUSS;

pub const SECOND: f64 = 1.0;

/// Rest energy of the electron, m_e c^2.
pub const ELECTRON_REST_ENERGY: f64 = MASS_ELECTRON * C_SQUARED;
