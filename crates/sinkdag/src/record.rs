// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Vertex and edge records.
use bytes::Bytes;

use crate::codec::{self, CodecError};
use crate::ident::{IdSource, VertexId};

/// A record in the graph: an id plus an opaque payload.
///
/// The payload is never interpreted by this crate. Vertices are immutable
/// once built; a graph never mutates or removes one after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Vertex {
    /// Unique key within one graph.
    pub id: VertexId,
    /// Application payload.
    pub data: Bytes,
}

impl Vertex {
    /// Builds a vertex with an explicit id.
    pub fn new(id: VertexId, data: impl Into<Bytes>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    /// Builds a vertex with an id drawn from `ids`.
    pub fn generate(ids: &mut impl IdSource, data: impl Into<Bytes>) -> Self {
        Self::new(ids.next_id(), data)
    }

    /// Wire encoding (see [`codec::encode_vertex`]).
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode_vertex(self)
    }

    /// Parses the wire encoding (see [`codec::decode_vertex`]).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode_vertex(bytes)
    }
}

/// Dependency relation: `child` depends on `parent`.
///
/// The parent is the ancestor when traversing dependencies or computing
/// digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    /// The dependent vertex.
    pub child: VertexId,
    /// The vertex depended upon.
    pub parent: VertexId,
}

impl Edge {
    /// Builds the edge `child -> parent`.
    pub const fn new(child: VertexId, parent: VertexId) -> Self {
        Self { child, parent }
    }

    /// Wire encoding (see [`codec::encode_edge`]).
    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode_edge(self)
    }

    /// Parses the wire encoding (see [`codec::decode_edge`]).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode_edge(bytes)
    }
}
