// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recursive Merkle-style digests.
//!
//! Determinism contract
//! - A vertex digest binds the vertex's own wire bytes and, recursively, the
//!   digests of all its ancestors:
//!   - `leaf = TAG_LEAF ++ H(encode_vertex(v))`
//!   - no parents: `H(leaf)`
//!   - otherwise: `H(H(leaf) ++ Σ (TAG_BRANCH ++ digest(parent)))`, parents
//!     in ascending id order.
//! - The root digest ([`ROOT_ID`]) binds the frontier:
//!   `H(Σ (TAG_BRANCH ++ digest(head)))`, heads in ascending id order. An
//!   empty frontier hashes the empty buffer.
//! - Sibling sets are always sorted before hashing, so insertion order never
//!   affects the output.
//!
//! The hash function is injected through [`DigestFn`]; any
//! `Fn(&[u8]) -> Vec<u8>` qualifies.
use std::fmt;
use std::str::FromStr;

use rustc_hash::{FxHashMap, FxHashSet};
use sha2::Digest as _;
use thiserror::Error;

use crate::codec;
use crate::graph::{Graph, GraphError};
use crate::ident::{VertexId, ROOT_ID};

/// Prefix of a vertex's own hashed payload.
pub const TAG_LEAF: u8 = 0x00;
/// Prefix of a reference to a parent (or frontier head) digest.
pub const TAG_BRANCH: u8 = 0x01;

/// One-way hash applied to arbitrary byte strings.
///
/// Implementations must be deterministic and free of side effects.
pub trait DigestFn {
    /// Hashes `bytes`.
    fn hash(&self, bytes: &[u8]) -> Vec<u8>;
}

impl<F> DigestFn for F
where
    F: Fn(&[u8]) -> Vec<u8>,
{
    fn hash(&self, bytes: &[u8]) -> Vec<u8> {
        self(bytes)
    }
}

/// 32-byte BLAKE3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blake3;

impl DigestFn for Blake3 {
    fn hash(&self, bytes: &[u8]) -> Vec<u8> {
        blake3::hash(bytes).as_bytes().to_vec()
    }
}

/// 32-byte SHA-256.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sha256;

impl DigestFn for Sha256 {
    fn hash(&self, bytes: &[u8]) -> Vec<u8> {
        sha2::Sha256::digest(bytes).to_vec()
    }
}

/// Runtime selection between the bundled hashers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// [`Blake3`].
    #[default]
    Blake3,
    /// [`Sha256`].
    Sha256,
}

impl HashAlgorithm {
    /// Canonical lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }
}

impl DigestFn for HashAlgorithm {
    fn hash(&self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Blake3 => Blake3.hash(bytes),
            Self::Sha256 => Sha256.hash(bytes),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name did not match a bundled hasher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown hash algorithm {0:?} (expected \"blake3\", \"sha256\" or \"sha-256\")")]
pub struct UnknownHashAlgorithm(pub String);

impl FromStr for HashAlgorithm {
    type Err = UnknownHashAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blake3" => Ok(Self::Blake3),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            _ => Err(UnknownHashAlgorithm(s.to_owned())),
        }
    }
}

enum Step {
    Enter(VertexId),
    Exit(VertexId),
}

/// Digest computation over one graph with a fixed hasher.
///
/// Vertex digests are memoized, so shared ancestry is hashed once and the
/// engine can answer several queries against the same graph cheaply. The
/// walk uses an explicit work stack rather than native recursion.
pub struct DigestEngine<'g, H: ?Sized> {
    graph: &'g Graph,
    hasher: &'g H,
    memo: FxHashMap<VertexId, Vec<u8>>,
}

impl<'g, H: DigestFn + ?Sized> DigestEngine<'g, H> {
    /// Binds an engine to `graph` and `hasher`.
    pub fn new(graph: &'g Graph, hasher: &'g H) -> Self {
        Self {
            graph,
            hasher,
            memo: FxHashMap::default(),
        }
    }

    /// Root digest for [`ROOT_ID`], vertex digest otherwise.
    pub fn digest(&mut self, id: VertexId) -> Result<Vec<u8>, GraphError> {
        if id == ROOT_ID {
            self.root()
        } else {
            self.vertex(id)
        }
    }

    /// Digest of the whole graph through its frontier.
    pub fn root(&mut self) -> Result<Vec<u8>, GraphError> {
        let mut heads = self.graph.frontier().to_vec();
        heads.sort_unstable();
        let mut buf = Vec::new();
        for head in heads {
            let digest = self.vertex(head)?;
            buf.push(TAG_BRANCH);
            buf.extend_from_slice(&digest);
        }
        Ok(self.hasher.hash(&buf))
    }

    /// Digest of vertex `id` and its ancestry.
    ///
    /// # Errors
    ///
    /// [`GraphError::VertexNotFound`] if `id` or any ancestor id is not an
    /// inserted vertex.
    pub fn vertex(&mut self, id: VertexId) -> Result<Vec<u8>, GraphError> {
        if let Some(digest) = self.memo.get(&id) {
            return Ok(digest.clone());
        }

        let mut path: Vec<VertexId> = Vec::new();
        let mut on_path: FxHashSet<VertexId> = FxHashSet::default();
        let mut stack = vec![Step::Enter(id)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(current) => {
                    if self.memo.contains_key(&current) {
                        continue;
                    }
                    if !on_path.insert(current) {
                        path.push(current);
                        return Err(GraphError::Cycle { id: current, path });
                    }
                    if !self.graph.contains(current) {
                        return Err(self.not_found(current));
                    }
                    path.push(current);
                    stack.push(Step::Exit(current));
                    for parent in self.graph.sorted_parents(current).into_iter().rev() {
                        stack.push(Step::Enter(parent));
                    }
                }
                Step::Exit(current) => {
                    let digest = self.compute(current)?;
                    self.memo.insert(current, digest);
                    on_path.remove(&current);
                    path.pop();
                }
            }
        }

        self.memo
            .get(&id)
            .cloned()
            .ok_or_else(|| self.not_found(id))
    }

    /// Hashes one vertex whose parents are all memoized.
    fn compute(&self, id: VertexId) -> Result<Vec<u8>, GraphError> {
        let vertex = self.graph.vertex(id).ok_or_else(|| self.not_found(id))?;
        let mut leaf = vec![TAG_LEAF];
        leaf.extend(self.hasher.hash(&codec::encode_vertex(vertex)?));
        let parents = self.graph.sorted_parents(id);
        if parents.is_empty() {
            return Ok(self.hasher.hash(&leaf));
        }
        let mut buf = self.hasher.hash(&leaf);
        for parent in parents {
            let digest = self.memo.get(&parent).ok_or_else(|| self.not_found(parent))?;
            buf.push(TAG_BRANCH);
            buf.extend_from_slice(digest);
        }
        Ok(self.hasher.hash(&buf))
    }

    fn not_found(&self, id: VertexId) -> GraphError {
        GraphError::VertexNotFound {
            id,
            known: self.graph.vertex_ids(),
        }
    }
}

impl Graph {
    /// Digest of the whole graph when `id` is [`ROOT_ID`], otherwise of
    /// vertex `id` and its ancestry.
    ///
    /// # Errors
    ///
    /// [`GraphError::VertexNotFound`] naming the missing id and every known
    /// vertex id.
    pub fn digest<H: DigestFn + ?Sized>(
        &self,
        id: VertexId,
        hasher: &H,
    ) -> Result<Vec<u8>, GraphError> {
        DigestEngine::new(self, hasher).digest(id)
    }

    /// Digest of the whole graph through its frontier.
    pub fn root_digest<H: DigestFn + ?Sized>(&self, hasher: &H) -> Result<Vec<u8>, GraphError> {
        DigestEngine::new(self, hasher).root()
    }

    /// Digest of vertex `id`, without the [`ROOT_ID`] sentinel shortcut.
    pub fn vertex_digest<H: DigestFn + ?Sized>(
        &self,
        id: VertexId,
        hasher: &H,
    ) -> Result<Vec<u8>, GraphError> {
        DigestEngine::new(self, hasher).vertex(id)
    }

    /// Returns `true` if the current root digest equals `expected`.
    ///
    /// Used for optimistic concurrency: a writer holding the digest it last
    /// observed can detect that the graph moved underneath it.
    pub fn matches_root<H: DigestFn + ?Sized>(
        &self,
        expected: &[u8],
        hasher: &H,
    ) -> Result<bool, GraphError> {
        Ok(self.root_digest(hasher)? == expected)
    }
}
