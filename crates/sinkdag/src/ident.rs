// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Vertex identifiers and id generation.
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Identifier of a vertex within one graph.
///
/// Ids are drawn uniformly from the 32-bit space. The graph does not enforce
/// global uniqueness: inserting a second vertex with an existing id is a
/// silent no-op, so avoiding collisions is the caller's responsibility.
pub type VertexId = u32;

/// Reserved id that addresses the whole graph in [`Graph::digest`](crate::Graph::digest).
///
/// Generators in this module never yield it.
pub const ROOT_ID: VertexId = 0;

/// Source of fresh vertex ids.
pub trait IdSource {
    /// Returns the next id. Must never return [`ROOT_ID`].
    fn next_id(&mut self) -> VertexId;
}

/// Uniformly random ids backed by any [`RngCore`].
#[derive(Debug, Clone)]
pub struct RandomIds<R> {
    rng: R,
}

impl<R: RngCore> RandomIds<R> {
    /// Wraps an existing generator.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomIds<StdRng> {
    /// Seeds from operating-system entropy.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Deterministic stream for tests and reproducible fixtures.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: RngCore> IdSource for RandomIds<R> {
    fn next_id(&mut self) -> VertexId {
        loop {
            let id = self.rng.next_u32();
            if id != ROOT_ID {
                return id;
            }
        }
    }
}

/// Monotonic ids starting at 1.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    next: VertexId,
}

impl SequentialIds {
    /// Starts the sequence at 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self) -> VertexId {
        let id = self.next;
        // Wrap past u32::MAX back to 1, skipping the root sentinel.
        self.next = self.next.checked_add(1).unwrap_or(1);
        id
    }
}
