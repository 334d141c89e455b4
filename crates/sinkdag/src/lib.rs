// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! sinkdag: content-addressed record DAG with frontier tracking.
//!
//! A [`Graph`] holds opaque records ([`Vertex`]) linked by dependency
//! [`Edge`]s. Every edge insertion is checked for cycles, and the graph keeps
//! a *frontier*: the vertices no edge has named as a parent yet. New records
//! can be attached under the whole frontier at once via
//! [`Graph::add_reduced`], collapsing concurrent heads into one.
//!
//! # Determinism contract
//!
//! - [`Graph::digest`] depends only on vertex bytes and edge structure.
//!   Sibling sets are always sorted numerically before they are hashed, so
//!   insertion order never leaks into a digest.
//! - The wire format ([`codec`]) is big-endian, tag-prefixed and
//!   length-framed. Changing a tag or a field width changes every digest and
//!   must be treated as a breaking change.
//! - The hash function is injected ([`DigestFn`]); the crate ships
//!   [`Blake3`] and [`Sha256`].
//!
//! # Example
//!
//! ```
//! use sinkdag::{Blake3, Edge, Graph, Vertex};
//!
//! # fn main() -> Result<(), sinkdag::GraphError> {
//! let mut graph = Graph::new();
//! graph.add(Vertex::new(1, b"genesis".to_vec()));
//! graph.add(Vertex::new(2, b"second".to_vec()));
//! graph.add_edge(Edge::new(2, 1))?;
//! assert_eq!(graph.frontier(), &[2]);
//!
//! graph.add_reduced(Vertex::new(3, b"merge".to_vec()))?;
//! assert_eq!(graph.frontier(), &[3]);
//! assert_eq!(graph.dependencies(3)?, vec![1, 2]);
//!
//! let root = graph.root_digest(&Blake3)?;
//! let copy = Graph::from_bytes(&graph.to_bytes()?)?;
//! assert_eq!(copy.root_digest(&Blake3)?, root);
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

/// Binary wire format for vertices, edges and whole graphs.
pub mod codec;
/// Recursive Merkle-style digests over the graph.
pub mod digest;
mod graph;
mod guard;
mod ident;
mod record;

/// Wire codec entry points and error type.
pub use codec::{CodecError, TAG_EDGE, TAG_GRAPH, TAG_VERTEX};
/// Digest engine, injected hash seam and bundled hashers.
pub use digest::{
    Blake3, DigestEngine, DigestFn, HashAlgorithm, Sha256, UnknownHashAlgorithm, TAG_BRANCH,
    TAG_LEAF,
};
/// In-memory DAG with frontier tracking.
pub use graph::{Graph, GraphError};
/// Vertex identifiers and id generators.
pub use ident::{IdSource, RandomIds, SequentialIds, VertexId, ROOT_ID};
/// Vertex and edge value types.
pub use record::{Edge, Vertex};
