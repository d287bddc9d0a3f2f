//! Module pipeline.
//!
//! A [`ModuleList`] is an ordered sequence of [`Module`]s. One tick calls every
//! module once, in order; a candidate is ticked until it is deactivated.
//! Propagators go first, then modules that consume the step (losses and
//! interactions), then boundaries and observers.

use crate::bank::CandidateBank;
use crate::candidate::{Candidate, ModuleId};
use crate::fast_rng::FastRng;
use crate::output::Output;
use crate::settings::Settings;
use crate::source::Source;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-worker state passed into every module call: the worker's random
/// generator and the identity of the module being executed.
#[derive(Debug, Clone)]
pub struct Context {
    rng: FastRng,
    module_id: ModuleId,
}

impl Context {
    pub fn new(seed: u64) -> Self {
        Self::from_rng(FastRng::new(seed))
    }

    pub fn from_rng(rng: FastRng) -> Self {
        Self {
            rng,
            module_id: ModuleId::default(),
        }
    }

    pub fn rng(&mut self) -> &mut FastRng {
        &mut self.rng
    }

    /// Identity of the module currently being executed.
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    pub fn set_module_id(&mut self, id: ModuleId) {
        self.module_id = id;
    }
}

/// A unit of work applied to a candidate once per tick.
///
/// Modules are shared between worker threads; their configuration is
/// read-only once the pipeline runs and all per-candidate state lives in the
/// candidate itself.
pub trait Module: Send + Sync {
    fn process(&self, candidate: &mut Candidate, ctx: &mut Context);

    fn description(&self) -> String {
        let name = std::any::type_name::<Self>();
        name.rsplit("::").next().unwrap_or(name).to_string()
    }
}

/// Counts reported by [`ModuleList::run_source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Candidates drawn from the source.
    pub primaries: usize,
    /// Finished candidates handed to the outputs, secondaries included.
    pub finished: usize,
    /// Secondaries dropped because a history exceeded its secondary cap.
    pub dropped_secondaries: usize,
}

#[derive(Default)]
pub struct ModuleList {
    modules: Vec<Box<dyn Module>>,
}

impl ModuleList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module; returns the identity it runs under.
    pub fn add(&mut self, module: impl Module + 'static) -> ModuleId {
        self.add_boxed(Box::new(module))
    }

    /// Panics if the list already holds `u16::MAX + 1` modules.
    pub fn add_boxed(&mut self, module: Box<dyn Module>) -> ModuleId {
        let id = match u16::try_from(self.modules.len()) {
            Ok(index) => ModuleId(index),
            Err(_) => panic!("module list is full ({} modules)", self.modules.len()),
        };
        self.modules.push(module);
        id
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.description()).collect()
    }

    /// One tick: every module once, in order. Modules after the one that
    /// deactivated the candidate are skipped for the rest of the tick.
    pub fn process(&self, candidate: &mut Candidate, ctx: &mut Context) {
        for (index, module) in self.modules.iter().enumerate() {
            if !candidate.is_active() {
                break;
            }
            ctx.set_module_id(ModuleId(index as u16));
            module.process(candidate, ctx);
        }
    }

    /// Tick the candidate until it is deactivated. Secondaries stay attached.
    pub fn run(&self, candidate: &mut Candidate, ctx: &mut Context) {
        while candidate.is_active() {
            self.process(candidate, ctx);
        }
    }

    /// Propagate a candidate and all of its descendants to completion.
    ///
    /// Secondaries are detached after their parent finishes and processed
    /// FIFO on the same worker. At most `max_secondaries` descendants are
    /// propagated; the returned count says how many were dropped beyond that.
    /// Finished candidates are returned primary first.
    pub fn run_recursive(
        &self,
        candidate: Candidate,
        ctx: &mut Context,
        max_secondaries: usize,
    ) -> (Vec<Candidate>, usize) {
        let mut finished = Vec::new();
        let mut bank = CandidateBank::new();
        let mut banked = 0usize;
        let mut dropped = 0usize;
        bank.push(candidate);
        while let Some(mut current) = bank.pop() {
            self.run(&mut current, ctx);
            for secondary in current.take_secondaries() {
                if banked < max_secondaries {
                    bank.push(secondary);
                    banked += 1;
                } else {
                    dropped += 1;
                }
            }
            finished.push(current);
        }
        if dropped > 0 {
            log::warn!(
                "secondary cap of {} reached, dropped {} secondaries",
                max_secondaries,
                dropped
            );
        }
        (finished, dropped)
    }

    /// Draw `settings.candidates` candidates from `source`, propagate each to
    /// completion and hand every finished candidate to `outputs`.
    ///
    /// Candidate `i` always uses random stream `i` of `settings.seed`, so
    /// results do not depend on the number of worker threads.
    pub fn run_source(
        &self,
        source: &dyn Source,
        settings: &Settings,
        outputs: &[&dyn Output],
    ) -> RunSummary {
        log::info!(
            "propagating {} candidates through {} modules (seed {}, parallel {}, recursive {})",
            settings.candidates,
            self.len(),
            settings.seed,
            settings.parallel,
            settings.recursive
        );
        let finished = AtomicUsize::new(0);
        let dropped = AtomicUsize::new(0);

        let work = |ctx: &mut Context, index: usize| {
            ctx.rng().reseed_stream(settings.seed, index as u64);
            let candidate = source.get_candidate(ctx.rng());
            let histories = if settings.recursive {
                let (done, lost) =
                    self.run_recursive(candidate, ctx, settings.max_secondaries_per_candidate);
                dropped.fetch_add(lost, Ordering::Relaxed);
                done
            } else {
                let mut candidate = candidate;
                self.run(&mut candidate, ctx);
                vec![candidate]
            };
            for candidate in &histories {
                for output in outputs {
                    output.process(candidate);
                }
            }
            finished.fetch_add(histories.len(), Ordering::Relaxed);
        };

        if settings.parallel {
            (0..settings.candidates)
                .into_par_iter()
                .for_each_init(|| Context::new(settings.seed), |ctx, index| work(ctx, index));
        } else {
            let mut ctx = Context::new(settings.seed);
            for index in 0..settings.candidates {
                work(&mut ctx, index);
            }
        }

        let summary = RunSummary {
            primaries: settings.candidates,
            finished: finished.into_inner(),
            dropped_secondaries: dropped.into_inner(),
        };
        log::info!(
            "run finished: {} primaries, {} finished candidates",
            summary.primaries,
            summary.finished
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleState;
    use crate::particle_id::{proton, PHOTON};
    use nalgebra::Vector3;
    use std::sync::Mutex;

    fn candidate() -> Candidate {
        Candidate::new(ParticleState::new(proton(), 1.0, Vector3::zeros(), Vector3::x()))
    }

    /// Advances one meter per tick.
    struct Step;

    impl Module for Step {
        fn process(&self, candidate: &mut Candidate, _ctx: &mut Context) {
            candidate.snapshot_previous();
            let position = candidate.current().position() + Vector3::x();
            candidate.current_mut().set_position(position);
            candidate.set_current_step(1.0);
            candidate.set_next_step(1.0);
        }
    }

    /// Deactivates after the given trajectory length.
    struct StopAt(f64);

    impl Module for StopAt {
        fn process(&self, candidate: &mut Candidate, _ctx: &mut Context) {
            if candidate.trajectory_length() >= self.0 {
                candidate.deactivate("StopAt");
            }
        }
    }

    /// Records which module id it ran under.
    struct RecordId(Mutex<Vec<ModuleId>>);

    impl Module for RecordId {
        fn process(&self, _candidate: &mut Candidate, ctx: &mut Context) {
            self.0.lock().unwrap().push(ctx.module_id());
        }
    }

    /// Emits one photon on the first tick of a proton.
    struct EmitOnce;

    impl Module for EmitOnce {
        fn process(&self, candidate: &mut Candidate, _ctx: &mut Context) {
            if candidate.current().id() == proton() && candidate.trajectory_length() == 1.0 {
                let position = *candidate.current().position();
                candidate.add_secondary(PHOTON, 0.5, position, 1.0);
            }
        }
    }

    #[test]
    fn test_run_ticks_until_inactive() {
        let mut list = ModuleList::new();
        list.add(Step);
        list.add(StopAt(5.0));
        let mut c = candidate();
        let mut ctx = Context::new(1);
        list.run(&mut c, &mut ctx);
        assert!(!c.is_active());
        assert_eq!(c.trajectory_length(), 5.0);
        assert_eq!(c.current().position(), &Vector3::new(5.0, 0.0, 0.0));
        assert_eq!(c.property("Deactivated"), Some("StopAt"));
    }

    #[test]
    fn test_module_ids_follow_insertion_order() {
        let mut list = ModuleList::new();
        assert_eq!(list.add(Step), ModuleId(0));
        let recorder = std::sync::Arc::new(RecordId(Mutex::new(Vec::new())));
        struct Shared(std::sync::Arc<RecordId>);
        impl Module for Shared {
            fn process(&self, candidate: &mut Candidate, ctx: &mut Context) {
                self.0.process(candidate, ctx)
            }
        }
        assert_eq!(list.add(Shared(recorder.clone())), ModuleId(1));
        list.add(StopAt(2.0));
        let mut ctx = Context::new(1);
        list.run(&mut candidate(), &mut ctx);
        assert_eq!(*recorder.0.lock().unwrap(), vec![ModuleId(1), ModuleId(1)]);
    }

    #[test]
    fn test_modules_after_deactivation_are_skipped() {
        let mut list = ModuleList::new();
        list.add(StopAt(0.0));
        list.add(Step);
        let mut c = candidate();
        list.process(&mut c, &mut Context::new(0));
        assert!(!c.is_active());
        assert_eq!(c.trajectory_length(), 0.0);
    }

    #[test]
    fn test_run_recursive_processes_secondaries() {
        let mut list = ModuleList::new();
        list.add(Step);
        list.add(EmitOnce);
        list.add(StopAt(3.0));
        let mut ctx = Context::new(1);
        let (finished, dropped) = list.run_recursive(candidate(), &mut ctx, 100);
        assert_eq!(dropped, 0);
        assert_eq!(finished.len(), 2);
        assert_eq!(finished[0].current().id(), proton());
        let photon = &finished[1];
        assert_eq!(photon.current().id(), PHOTON);
        assert_eq!(photon.initial().position(), &Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(photon.parent_serial(), Some(finished[0].serial_number()));
        assert!(!photon.is_active());
        assert!(finished.iter().all(|c| c.secondaries().is_empty()));
    }

    #[test]
    fn test_run_recursive_secondary_cap() {
        let mut list = ModuleList::new();
        list.add(Step);
        list.add(EmitOnce);
        list.add(StopAt(3.0));
        let (finished, dropped) = list.run_recursive(candidate(), &mut Context::new(1), 0);
        assert_eq!(finished.len(), 1);
        assert_eq!(dropped, 1);
    }

    #[test]
    #[should_panic(expected = "module list is full")]
    fn test_module_list_capacity() {
        let mut list = ModuleList::new();
        for _ in 0..=u16::MAX as usize {
            list.add(Step);
        }
        assert_eq!(list.len(), 65536);
        list.add(Step);
    }

    #[test]
    fn test_description_defaults_to_type_name() {
        assert_eq!(Step.description(), "Step");
    }
}
