use crate::error::{Error, Result};
use crate::utilities::interpolate_linear;

/// Target photon background of an interaction.
///
/// Tabulated rates assume the present-day field. The evolution of the
/// comoving photon density beyond the adiabatic `(1+z)^3` is described by an
/// optional redshift-scaling table; the cosmic microwave background needs none.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotonField {
    name: String,
    scaling_redshifts: Vec<f64>,
    scaling_values: Vec<f64>,
}

impl PhotonField {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scaling_redshifts: Vec::new(),
            scaling_values: Vec::new(),
        }
    }

    /// Cosmic microwave background.
    pub fn cmb() -> Self {
        Self::new("CMB")
    }

    /// Attach a scaling table `s(z)`, with `s(0) = 1` by convention.
    pub fn with_redshift_scaling(mut self, redshifts: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if redshifts.len() != values.len() || redshifts.is_empty() {
            return Err(Error::invalid(format!(
                "photon field {}: scaling table needs matching, non-empty columns",
                self.name
            )));
        }
        if redshifts.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(Error::invalid(format!(
                "photon field {}: scaling redshifts must be ascending",
                self.name
            )));
        }
        if values.iter().any(|&v| v < 0.0) {
            return Err(Error::invalid(format!(
                "photon field {}: scaling values must be non-negative",
                self.name
            )));
        }
        self.scaling_redshifts = redshifts;
        self.scaling_values = values;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Density evolution factor at redshift `z`; 1 without a scaling table.
    pub fn redshift_scaling(&self, z: f64) -> f64 {
        if self.scaling_redshifts.is_empty() {
            return 1.0;
        }
        interpolate_linear(&self.scaling_redshifts, &self.scaling_values, z)
    }

    /// Effective in-flight rate from a present-day table:
    /// `rate(E (1+z)) * (1+z)^2 * s(z)`.
    pub fn scaled_rate<F: Fn(f64) -> f64>(&self, table_rate: F, energy: f64, z: f64) -> f64 {
        if z == 0.0 {
            return table_rate(energy);
        }
        let zp1 = 1.0 + z;
        table_rate(energy * zp1) * zp1 * zp1 * self.redshift_scaling(z)
    }
}
