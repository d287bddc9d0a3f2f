//! Tabulated interaction data.
//!
//! All files are whitespace separated text; blank lines and lines starting
//! with `#` are ignored. Energies are given as `log10(E / eV)` and stored
//! internally as `log10(E / J)`. Rates are inverse lengths in 1/m, already
//! scaled to the present-day (z = 0) target photon density.

use crate::error::{Error, Result};
use crate::particle_id::{nucleus_id, try_nucleus_id};
use crate::units::EV;
use crate::utilities::{closest_index, digit, interpolate_or_zero};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Data rows of a table file: (line number, parsed values).
fn read_rows<R: BufRead>(reader: R, path: &Path) -> Result<Vec<(usize, Vec<f64>)>> {
    let mut rows = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| Error::io(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let values = trimmed
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    Error::parse(path, index + 1, format!("cannot parse '{}' as a number", token))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push((index + 1, values));
    }
    Ok(rows)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::io(path, e))
}

fn log10_ev_to_joule(log10_ev: f64) -> f64 {
    log10_ev + EV.log10()
}

fn check_ascending(values: &[f64], what: &str) -> Result<()> {
    if values.len() < 2 {
        return Err(Error::invalid(format!("{} needs at least two points", what)));
    }
    if values.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(Error::invalid(format!("{} must be strictly ascending", what)));
    }
    Ok(())
}

/// Interaction rate (1/m) tabulated against energy, with one or more columns
/// (for example separate rates on protons and neutrons).
#[derive(Debug, Clone)]
pub struct TabulatedRate {
    log_energies: Vec<f64>,
    columns: Vec<Vec<f64>>,
}

impl TabulatedRate {
    /// Single-column table from energies (J) and rates (1/m).
    pub fn new(energies: Vec<f64>, rates: Vec<f64>) -> Result<Self> {
        Self::with_columns(energies, vec![rates])
    }

    pub fn with_columns(energies: Vec<f64>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if energies.iter().any(|&e| !(e > 0.0)) {
            return Err(Error::invalid("tabulated energies must be positive"));
        }
        let log_energies: Vec<f64> = energies.iter().map(|e| e.log10()).collect();
        check_ascending(&log_energies, "rate table energy grid")?;
        if columns.is_empty() {
            return Err(Error::invalid("rate table has no rate column"));
        }
        for column in &columns {
            if column.len() != log_energies.len() {
                return Err(Error::invalid(format!(
                    "rate column has {} values for {} energies",
                    column.len(),
                    log_energies.len()
                )));
            }
            if column.iter().any(|&r| r < 0.0 || !r.is_finite()) {
                return Err(Error::invalid("rates must be finite and non-negative"));
            }
        }
        Ok(Self {
            log_energies,
            columns,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::from_reader(open(path)?, path)
    }

    /// Parse rows of `log10(E/eV) rate [rate ...]`.
    pub fn from_reader<R: BufRead>(reader: R, path: &Path) -> Result<Self> {
        let rows = read_rows(reader, path)?;
        let width = match rows.first() {
            Some((_, values)) if values.len() >= 2 => values.len(),
            Some((line, _)) => {
                return Err(Error::parse(path, *line, "expected log10(E) and at least one rate"))
            }
            None => return Err(Error::MissingData(format!("{} has no data rows", path.display()))),
        };
        let mut energies = Vec::with_capacity(rows.len());
        let mut columns = vec![Vec::with_capacity(rows.len()); width - 1];
        for (line, values) in rows {
            if values.len() != width {
                return Err(Error::parse(
                    path,
                    line,
                    format!("expected {} columns, found {}", width, values.len()),
                ));
            }
            energies.push(10f64.powf(log10_ev_to_joule(values[0])));
            for (column, value) in columns.iter_mut().zip(&values[1..]) {
                column.push(*value);
            }
        }
        Self::with_columns(energies, columns)
    }

    /// Rate in the first column; zero outside the tabulated energy range.
    pub fn rate(&self, energy: f64) -> f64 {
        self.rate_column(0, energy)
    }

    pub fn rate_column(&self, column: usize, energy: f64) -> f64 {
        if !(energy > 0.0) {
            return 0.0;
        }
        match self.columns.get(column) {
            Some(rates) => interpolate_or_zero(&self.log_energies, rates, energy.log10()),
            None => 0.0,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn min_energy(&self) -> f64 {
        10f64.powf(self.log_energies[0])
    }

    pub fn max_energy(&self) -> f64 {
        10f64.powf(self.log_energies[self.log_energies.len() - 1])
    }
}

/// Cumulative rate tabulated against energy (rows) and a secondary variable
/// `s` (columns), for inverse-CDF sampling of interaction products.
///
/// File layout: the first data row lists the `log10(s / eV^2)` grid, every
/// following row is `log10(E/eV)` and one cumulative value per `s` bin.
#[derive(Debug, Clone)]
pub struct TabulatedCdf {
    log_energies: Vec<f64>,
    log_s: Vec<f64>,
    cdf: Vec<Vec<f64>>,
}

impl TabulatedCdf {
    /// Build from energies (J), `s` grid (J^2) and cumulative rows.
    pub fn new(energies: Vec<f64>, s_values: Vec<f64>, cdf: Vec<Vec<f64>>) -> Result<Self> {
        if energies.iter().chain(s_values.iter()).any(|&v| !(v > 0.0)) {
            return Err(Error::invalid("CDF grids must be positive"));
        }
        let log_energies: Vec<f64> = energies.iter().map(|e| e.log10()).collect();
        let log_s: Vec<f64> = s_values.iter().map(|s| s.log10()).collect();
        check_ascending(&log_energies, "CDF energy grid")?;
        check_ascending(&log_s, "CDF s grid")?;
        if cdf.len() != log_energies.len() {
            return Err(Error::invalid("CDF needs one row per energy"));
        }
        for row in &cdf {
            if row.len() != log_s.len() {
                return Err(Error::invalid("CDF row length differs from s grid"));
            }
            if row.windows(2).any(|w| w[1] < w[0]) {
                return Err(Error::invalid("CDF rows must be non-decreasing"));
            }
        }
        Ok(Self {
            log_energies,
            log_s,
            cdf,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::from_reader(open(path)?, path)
    }

    pub fn from_reader<R: BufRead>(reader: R, path: &Path) -> Result<Self> {
        let mut rows = read_rows(reader, path)?.into_iter();
        let (_, s_row) = rows
            .next()
            .ok_or_else(|| Error::MissingData(format!("{} has no s grid", path.display())))?;
        let ev_squared = 2.0 * EV.log10();
        let s_values: Vec<f64> = s_row.iter().map(|v| 10f64.powf(v + ev_squared)).collect();
        let mut energies = Vec::new();
        let mut cdf = Vec::new();
        for (line, values) in rows {
            if values.len() != s_values.len() + 1 {
                return Err(Error::parse(
                    path,
                    line,
                    format!("expected {} columns, found {}", s_values.len() + 1, values.len()),
                ));
            }
            energies.push(10f64.powf(log10_ev_to_joule(values[0])));
            cdf.push(values[1..].to_vec());
        }
        Self::new(energies, s_values, cdf)
    }

    /// Sample `s` (J^2) for the given energy from the nearest tabulated row,
    /// interpolating linearly in `log10(s)` inside the selected bin.
    /// Returns `None` if the row carries no weight.
    pub fn sample(&self, energy: f64, u: f64) -> Option<f64> {
        if !(energy > 0.0) {
            return None;
        }
        let row = &self.cdf[closest_index(&self.log_energies, energy.log10())];
        let total = row[row.len() - 1];
        if !(total > 0.0) {
            return None;
        }
        let target = u.clamp(0.0, 1.0) * total;
        let upper = row.partition_point(|&c| c < target).min(row.len() - 1);
        if upper == 0 {
            return Some(10f64.powf(self.log_s[0]));
        }
        let (c0, c1) = (row[upper - 1], row[upper]);
        let fraction = if c1 > c0 { (target - c0) / (c1 - c0) } else { 0.0 };
        let log_s = self.log_s[upper - 1] + fraction * (self.log_s[upper] - self.log_s[upper - 1]);
        Some(10f64.powf(log_s))
    }
}

/// Products of a decay channel packed as `#beta- #beta+ #alpha #p #n`, one
/// decimal digit each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecayProducts {
    pub beta_minus: u32,
    pub beta_plus: u32,
    pub alpha: u32,
    pub proton: u32,
    pub neutron: u32,
}

impl DecayProducts {
    pub fn decode(code: i64) -> Self {
        Self {
            beta_minus: digit(code, 10000) as u32,
            beta_plus: digit(code, 1000) as u32,
            alpha: digit(code, 100) as u32,
            proton: digit(code, 10) as u32,
            neutron: digit(code, 1) as u32,
        }
    }

    pub fn encode(&self) -> i64 {
        self.beta_minus as i64 * 10000
            + self.beta_plus as i64 * 1000
            + self.alpha as i64 * 100
            + self.proton as i64 * 10
            + self.neutron as i64
    }

    /// Change of (A, Z) of the decaying nucleus.
    pub fn mass_and_charge_change(&self) -> (i32, i32) {
        let d_a = 4 * self.alpha + self.proton + self.neutron;
        let d_z = 2 * self.alpha as i32 + self.proton as i32 + self.beta_plus as i32
            - self.beta_minus as i32;
        (d_a as i32, d_z)
    }
}

/// Nuclear fragments emitted by photo-disintegration, in channel-code order:
/// n, p, H2, H3, He3, He4 as (A, Z).
pub const DISINTEGRATION_FRAGMENTS: [(i32, i32); 6] =
    [(1, 0), (1, 1), (2, 1), (3, 1), (3, 2), (4, 2)];

const FRAGMENT_PLACES: [i64; 6] = [100000, 10000, 1000, 100, 10, 1];

/// Multiset of fragments emitted by a disintegration channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisintegrationProducts {
    pub counts: [u32; 6],
}

impl DisintegrationProducts {
    pub fn decode(code: i64) -> Self {
        let mut counts = [0u32; 6];
        for (count, place) in counts.iter_mut().zip(FRAGMENT_PLACES) {
            *count = digit(code, place) as u32;
        }
        Self { counts }
    }

    pub fn encode(&self) -> i64 {
        self.counts
            .iter()
            .zip(FRAGMENT_PLACES)
            .map(|(&count, place)| count as i64 * place)
            .sum()
    }

    /// Fragment ids with multiplicity.
    pub fn fragment_ids(&self) -> Vec<i32> {
        let mut ids = Vec::new();
        for (&count, &(a, z)) in self.counts.iter().zip(DISINTEGRATION_FRAGMENTS.iter()) {
            for _ in 0..count {
                ids.push(nucleus_id(a, z));
            }
        }
        ids
    }

    pub fn mass_and_charge_change(&self) -> (i32, i32) {
        self.counts
            .iter()
            .zip(DISINTEGRATION_FRAGMENTS.iter())
            .fold((0, 0), |(da, dz), (&count, &(a, z))| {
                (da + count as i32 * a, dz + count as i32 * z)
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayChannel {
    /// Rest-frame mean lifetime in seconds.
    pub lifetime: f64,
    pub code: i64,
}

/// Decay channels per nucleus, read from rows of `A Z lifetime_s channelCode`.
#[derive(Debug, Clone, Default)]
pub struct DecayTable {
    channels: HashMap<i32, Vec<DecayChannel>>,
}

impl DecayTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: i32, channel: DecayChannel) -> Result<()> {
        if !(channel.lifetime > 0.0) {
            return Err(Error::invalid(format!(
                "decay lifetime must be positive, got {}",
                channel.lifetime
            )));
        }
        self.channels.entry(id).or_default().push(channel);
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::from_reader(open(path)?, path)
    }

    pub fn from_reader<R: BufRead>(reader: R, path: &Path) -> Result<Self> {
        let mut table = Self::new();
        for (line, values) in read_rows(reader, path)? {
            if values.len() != 4 {
                return Err(Error::parse(path, line, "expected A Z lifetime channelCode"));
            }
            let (a, z) = (values[0] as i32, values[1] as i32);
            let id = try_nucleus_id(a, z).ok_or_else(|| {
                Error::parse(path, line, format!("unphysical nucleus A={} Z={}", a, z))
            })?;
            let channel = DecayChannel {
                lifetime: values[2],
                code: values[3] as i64,
            };
            table
                .insert(id, channel)
                .map_err(|e| Error::parse(path, line, e.to_string()))?;
        }
        Ok(table)
    }

    /// Channels of the given nucleus; empty for stable species.
    pub fn channels(&self, id: i32) -> &[DecayChannel] {
        self.channels.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisintegrationChannel {
    pub code: i64,
    /// Rate (1/m) at each Lorentz factor of the table grid.
    pub rates: Vec<f64>,
}

/// Photo-disintegration channels per nucleus, tabulated against the Lorentz
/// factor. First data row: `log10(gamma)` grid; then rows of
/// `Z A channelCode rate...`.
#[derive(Debug, Clone)]
pub struct DisintegrationTable {
    log_lorentz: Vec<f64>,
    channels: HashMap<i32, Vec<DisintegrationChannel>>,
}

impl DisintegrationTable {
    pub fn new(lorentz_factors: Vec<f64>) -> Result<Self> {
        if lorentz_factors.iter().any(|&g| !(g > 0.0)) {
            return Err(Error::invalid("Lorentz factor grid must be positive"));
        }
        let log_lorentz: Vec<f64> = lorentz_factors.iter().map(|g| g.log10()).collect();
        check_ascending(&log_lorentz, "Lorentz factor grid")?;
        Ok(Self {
            log_lorentz,
            channels: HashMap::new(),
        })
    }

    pub fn insert(&mut self, id: i32, channel: DisintegrationChannel) -> Result<()> {
        if channel.rates.len() != self.log_lorentz.len() {
            return Err(Error::invalid(format!(
                "channel {} has {} rates for {} grid points",
                channel.code,
                channel.rates.len(),
                self.log_lorentz.len()
            )));
        }
        let (d_a, d_z) = DisintegrationProducts::decode(channel.code).mass_and_charge_change();
        let (a, z) = (crate::particle_id::mass_number(id), crate::particle_id::charge_number(id));
        if d_a == 0 || d_a > a || d_z > z {
            return Err(Error::invalid(format!(
                "channel {} cannot act on nucleus A={} Z={}",
                channel.code, a, z
            )));
        }
        self.channels.entry(id).or_default().push(channel);
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::from_reader(open(path)?, path)
    }

    pub fn from_reader<R: BufRead>(reader: R, path: &Path) -> Result<Self> {
        let mut rows = read_rows(reader, path)?.into_iter();
        let (_, grid) = rows.next().ok_or_else(|| {
            Error::MissingData(format!("{} has no Lorentz factor grid", path.display()))
        })?;
        let mut table = Self::new(grid.iter().map(|g| 10f64.powf(*g)).collect())?;
        for (line, values) in rows {
            if values.len() != grid.len() + 3 {
                return Err(Error::parse(
                    path,
                    line,
                    format!("expected {} columns, found {}", grid.len() + 3, values.len()),
                ));
            }
            let (z, a) = (values[0] as i32, values[1] as i32);
            let id = try_nucleus_id(a, z).ok_or_else(|| {
                Error::parse(path, line, format!("unphysical nucleus A={} Z={}", a, z))
            })?;
            let channel = DisintegrationChannel {
                code: values[2] as i64,
                rates: values[3..].to_vec(),
            };
            table
                .insert(id, channel)
                .map_err(|e| Error::parse(path, line, e.to_string()))?;
        }
        Ok(table)
    }

    pub fn channels(&self, id: i32) -> &[DisintegrationChannel] {
        self.channels.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rate (1/m) of one channel at the given Lorentz factor; zero outside the grid.
    pub fn channel_rate(&self, channel: &DisintegrationChannel, lorentz_factor: f64) -> f64 {
        if !(lorentz_factor > 0.0) {
            return 0.0;
        }
        interpolate_or_zero(&self.log_lorentz, &channel.rates, lorentz_factor.log10())
    }
}

/// Resolve `path` relative to a data directory unless it is absolute.
pub fn resolve_data_path(data_dir: &Path, path: &str) -> PathBuf {
    let candidate = PathBuf::from(path);
    if candidate.is_absolute() {
        candidate
    } else {
        data_dir.join(candidate)
    }
}
