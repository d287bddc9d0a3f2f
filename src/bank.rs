// Candidate banking
//
// Secondaries detached from a finished candidate are queued here and
// propagated one after another by the same worker, so a candidate and every
// descendant it spawns stay on one thread.

use crate::candidate::Candidate;
use std::collections::VecDeque;

/// FIFO queue of candidates awaiting propagation.
#[derive(Debug, Default)]
pub struct CandidateBank {
    queue: VecDeque<Candidate>,
}

impl CandidateBank {
    pub fn new() -> Self {
        CandidateBank {
            queue: VecDeque::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        CandidateBank {
            queue: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, candidate: Candidate) {
        self.queue.push_back(candidate);
    }

    /// Bank every secondary of `parent`, detaching them from it.
    pub fn bank_secondaries(&mut self, parent: &mut Candidate) -> usize {
        let secondaries = parent.take_secondaries();
        let count = secondaries.len();
        self.queue.extend(secondaries);
        count
    }

    pub fn pop(&mut self) -> Option<Candidate> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
