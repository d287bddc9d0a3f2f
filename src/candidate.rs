use crate::particle::ParticleState;
use nalgebra::Vector3;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SERIAL_NUMBER: AtomicU64 = AtomicU64::new(1);

fn next_serial_number() -> u64 {
    NEXT_SERIAL_NUMBER.fetch_add(1, Ordering::Relaxed)
}

/// Identity of a module inside a [`crate::module::ModuleList`], assigned when
/// the module is added. Used as the key of the interaction-state cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ModuleId(pub u16);

/// A pending interaction: remaining free path (m) and the sampled channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionState {
    pub distance: f64,
    pub channel: i32,
}

impl InteractionState {
    pub fn new(distance: f64, channel: i32) -> Self {
        Self {
            distance: distance.max(0.0),
            channel,
        }
    }
}

/// Full propagation record of one particle.
///
/// `initial` is fixed at creation. `previous` is the snapshot taken by the
/// propagator at the start of each tick and `current` is the live state.
/// Secondaries created by interactions are owned here until the pipeline
/// detaches them with [`Candidate::take_secondaries`].
#[derive(Debug, Clone)]
pub struct Candidate {
    initial: ParticleState,
    previous: ParticleState,
    current: ParticleState,
    active: bool,
    redshift: f64,
    trajectory_length: f64,
    current_step: f64,
    next_step: f64,
    weight: f64,
    serial_number: u64,
    parent_serial: Option<u64>,
    properties: HashMap<String, String>,
    interaction_states: HashMap<ModuleId, InteractionState>,
    secondaries: Vec<Candidate>,
}

impl Candidate {
    pub fn new(state: ParticleState) -> Self {
        Self {
            initial: state.clone(),
            previous: state.clone(),
            current: state,
            active: true,
            redshift: 0.0,
            trajectory_length: 0.0,
            current_step: 0.0,
            next_step: 0.0,
            weight: 1.0,
            serial_number: next_serial_number(),
            parent_serial: None,
            properties: HashMap::new(),
            interaction_states: HashMap::new(),
            secondaries: Vec::new(),
        }
    }

    pub fn with_redshift(mut self, redshift: f64) -> Self {
        self.redshift = redshift;
        self
    }

    pub fn initial(&self) -> &ParticleState {
        &self.initial
    }

    pub fn previous(&self) -> &ParticleState {
        &self.previous
    }

    pub fn previous_mut(&mut self) -> &mut ParticleState {
        &mut self.previous
    }

    pub fn current(&self) -> &ParticleState {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut ParticleState {
        &mut self.current
    }

    /// Copy `current` into `previous`; called by propagators at the start of a tick.
    pub fn snapshot_previous(&mut self) {
        self.previous = self.current.clone();
    }

    /// Change the particle species. Rates and channels depend on the species,
    /// so every cached interaction state is dropped.
    pub fn set_species(&mut self, id: i32) {
        if self.current.id() != id {
            self.current.set_id(id);
            self.interaction_states.clear();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Deactivate and record the reason under the `"Deactivated"` property.
    pub fn deactivate(&mut self, reason: &str) {
        if self.active {
            log::debug!(
                "candidate {} deactivated: {} (E = {:.3e} J, L = {:.3e} m)",
                self.serial_number,
                reason,
                self.current.energy(),
                self.trajectory_length
            );
        }
        self.active = false;
        self.set_property("Deactivated", reason);
    }

    pub fn redshift(&self) -> f64 {
        self.redshift
    }

    pub fn set_redshift(&mut self, redshift: f64) {
        self.redshift = redshift;
    }

    pub fn trajectory_length(&self) -> f64 {
        self.trajectory_length
    }

    pub fn set_trajectory_length(&mut self, length: f64) {
        self.trajectory_length = length;
    }

    pub fn current_step(&self) -> f64 {
        self.current_step
    }

    /// Record the step just taken and add it to the trajectory length.
    pub fn set_current_step(&mut self, step: f64) {
        self.current_step = step;
        self.trajectory_length += step;
    }

    pub fn next_step(&self) -> f64 {
        self.next_step
    }

    /// Propose the next step. Only propagators call this; every other module
    /// uses [`Candidate::limit_next_step`].
    pub fn set_next_step(&mut self, step: f64) {
        self.next_step = step;
    }

    /// `next_step = min(next_step, step)`.
    pub fn limit_next_step(&mut self, step: f64) {
        if step < self.next_step {
            self.next_step = step;
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn serial_number(&self) -> u64 {
        self.serial_number
    }

    pub fn parent_serial(&self) -> Option<u64> {
        self.parent_serial
    }

    pub fn set_property(&mut self, key: &str, value: impl Into<String>) {
        self.properties.insert(key.to_string(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn remove_property(&mut self, key: &str) -> Option<String> {
        self.properties.remove(key)
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn interaction_state(&self, module: ModuleId) -> Option<InteractionState> {
        self.interaction_states.get(&module).copied()
    }

    pub fn set_interaction_state(&mut self, module: ModuleId, state: InteractionState) {
        self.interaction_states.insert(module, state);
    }

    pub fn remove_interaction_state(&mut self, module: ModuleId) -> Option<InteractionState> {
        self.interaction_states.remove(&module)
    }

    pub fn clear_interaction_states(&mut self) {
        self.interaction_states.clear();
    }

    pub fn interaction_state_count(&self) -> usize {
        self.interaction_states.len()
    }

    /// Create a secondary at `position` (normally a point on the step just
    /// taken) moving along the current direction.
    ///
    /// The secondary inherits redshift, properties and `weight * w`; its
    /// trajectory length is the parent's minus the distance still to go from
    /// `position` to the parent's current position. Inactive candidates do not
    /// emit secondaries.
    pub fn add_secondary(&mut self, id: i32, energy: f64, position: Vector3<f64>, w: f64) {
        if !self.active {
            log::debug!(
                "candidate {} is inactive, dropping secondary {}",
                self.serial_number,
                id
            );
            return;
        }
        let state = ParticleState::new(id, energy, position, *self.current.direction());
        let mut secondary = Candidate::new(state);
        secondary.redshift = self.redshift;
        secondary.trajectory_length =
            self.trajectory_length - (self.current.position() - position).norm();
        secondary.weight = self.weight * w;
        secondary.parent_serial = Some(self.serial_number);
        secondary.properties = self.properties.clone();
        self.secondaries.push(secondary);
    }

    pub fn secondaries(&self) -> &[Candidate] {
        &self.secondaries
    }

    /// Detach all secondaries, handing ownership to the caller.
    pub fn take_secondaries(&mut self) -> Vec<Candidate> {
        std::mem::take(&mut self.secondaries)
    }
}
