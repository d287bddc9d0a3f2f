//! Consumers of finished candidates.
//!
//! Outputs are shared by every worker thread of a run; each keeps its
//! aggregate behind a single `Mutex` taken once per finished candidate.

use crate::candidate::Candidate;
use crate::error::{Error, Result};
use std::fmt;
use std::sync::Mutex;

pub trait Output: Send + Sync {
    fn process(&self, candidate: &Candidate);
}

/// Which finished candidates an output accepts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFilter {
    /// Only this particle id, if set.
    pub particle_id: Option<i32>,
    /// Only candidates carrying this property, e.g. "Detected".
    pub required_property: Option<String>,
}

impl CandidateFilter {
    pub fn accepts(&self, candidate: &Candidate) -> bool {
        if let Some(id) = self.particle_id {
            if candidate.current().id() != id {
                return false;
            }
        }
        match &self.required_property {
            Some(key) => candidate.has_property(key),
            None => true,
        }
    }
}

/// Keeps a copy of every accepted candidate.
#[derive(Debug, Default)]
pub struct CandidateCollector {
    pub filter: CandidateFilter,
    candidates: Mutex<Vec<Candidate>>,
}

impl CandidateCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: CandidateFilter) -> Self {
        Self {
            filter,
            candidates: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Collected candidates ordered by serial number.
    pub fn sorted(&self) -> Vec<Candidate> {
        let mut out = self.lock().clone();
        out.sort_by_key(|c| c.serial_number());
        out
    }

    pub fn into_inner(self) -> Vec<Candidate> {
        self.candidates
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Candidate>> {
        self.candidates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Output for CandidateCollector {
    fn process(&self, candidate: &Candidate) {
        if self.filter.accepts(candidate) {
            self.lock().push(candidate.clone());
        }
    }
}

#[derive(Debug, Default)]
struct TallyState {
    current: Vec<f64>,
    batches: Vec<Vec<f64>>,
}

/// Weighted histogram of final energies in logarithmic bins.
///
/// Each call to [`EnergyTally::end_batch`] closes one batch; statistics are
/// computed across batches and normalized per primary.
#[derive(Debug)]
pub struct EnergyTally {
    pub name: String,
    pub filter: CandidateFilter,
    log_edges: Vec<f64>,
    state: Mutex<TallyState>,
}

impl EnergyTally {
    /// `bins` logarithmic bins between `e_min` and `e_max` (joules).
    pub fn new(name: &str, e_min: f64, e_max: f64, bins: usize) -> Result<Self> {
        if !(e_min > 0.0 && e_max > e_min) || bins == 0 {
            return Err(Error::invalid(format!(
                "energy tally '{}' needs 0 < e_min < e_max and at least one bin",
                name
            )));
        }
        let (lo, hi) = (e_min.log10(), e_max.log10());
        let log_edges = (0..=bins)
            .map(|i| lo + (hi - lo) * i as f64 / bins as f64)
            .collect();
        Ok(Self {
            name: name.to_string(),
            filter: CandidateFilter::default(),
            log_edges,
            state: Mutex::new(TallyState {
                current: vec![0.0; bins],
                batches: Vec::new(),
            }),
        })
    }

    pub fn with_filter(mut self, filter: CandidateFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn bin_count(&self) -> usize {
        self.log_edges.len() - 1
    }

    /// Bin edges in joules.
    pub fn bin_edges(&self) -> Vec<f64> {
        self.log_edges.iter().map(|e| 10f64.powf(*e)).collect()
    }

    fn bin_of(&self, energy: f64) -> Option<usize> {
        if energy <= 0.0 {
            return None;
        }
        let x = energy.log10();
        let lo = self.log_edges[0];
        let hi = self.log_edges[self.log_edges.len() - 1];
        if x < lo || x >= hi {
            return None;
        }
        let bin = ((x - lo) / (hi - lo) * self.bin_count() as f64) as usize;
        Some(bin.min(self.bin_count() - 1))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TallyState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Close the current batch, normalizing it by the number of primaries.
    pub fn end_batch(&self, primaries: usize) {
        let mut state = self.lock();
        let norm = if primaries > 0 { 1.0 / primaries as f64 } else { 0.0 };
        let batch = state.current.iter().map(|w| w * norm).collect();
        state.batches.push(batch);
        state.current.iter_mut().for_each(|w| *w = 0.0);
    }

    pub fn n_batches(&self) -> usize {
        self.lock().batches.len()
    }

    /// Weighted counts accumulated since the last `end_batch`.
    pub fn pending_counts(&self) -> Vec<f64> {
        self.lock().current.clone()
    }

    /// Mean per primary in each bin.
    pub fn mean(&self) -> Vec<f64> {
        let state = self.lock();
        let n = state.batches.len();
        let mut mean = vec![0.0; self.bin_count()];
        if n == 0 {
            return mean;
        }
        for batch in &state.batches {
            for (m, w) in mean.iter_mut().zip(batch) {
                *m += w / n as f64;
            }
        }
        mean
    }

    /// Standard deviation of the mean in each bin.
    pub fn std_dev(&self) -> Vec<f64> {
        let mean = self.mean();
        let state = self.lock();
        let n = state.batches.len() as f64;
        let mut var = vec![0.0; self.bin_count()];
        for batch in &state.batches {
            for ((v, w), m) in var.iter_mut().zip(batch).zip(&mean) {
                *v += (w - m).powi(2);
            }
        }
        var.iter()
            .map(|v| (v / (n - 1.0).max(1.0) / n.max(1.0)).sqrt())
            .collect()
    }

    pub fn rel_error(&self) -> Vec<f64> {
        self.mean()
            .iter()
            .zip(self.std_dev())
            .map(|(m, s)| if *m > 0.0 { s / m } else { 0.0 })
            .collect()
    }
}

impl Output for EnergyTally {
    fn process(&self, candidate: &Candidate) {
        if !self.filter.accepts(candidate) {
            return;
        }
        if let Some(bin) = self.bin_of(candidate.current().energy()) {
            self.lock().current[bin] += candidate.weight();
        }
    }
}

impl fmt::Display for EnergyTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Energy tally: {}", self.name)?;
        writeln!(f, "  Batches: {}", self.n_batches())?;
        let edges = self.bin_edges();
        let mean = self.mean();
        let rel = self.rel_error();
        for i in 0..self.bin_count() {
            writeln!(
                f,
                "  [{:.3e}, {:.3e}) J: {:.6} per primary ({:.2}%)",
                edges[i],
                edges[i + 1],
                mean[i],
                rel[i] * 100.0
            )?;
        }
        Ok(())
    }
}
