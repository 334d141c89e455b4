// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Binary wire format for vertices, edges and whole graphs.
//!
//! Every shape starts with a one-byte type tag; all multi-byte integers are
//! big-endian `u32`.
//!
//! | Shape  | Layout                                                                 |
//! |--------|------------------------------------------------------------------------|
//! | Vertex | `0x01` · id · data length · data                                       |
//! | Edge   | `0x02` · child · parent                                                |
//! | Graph  | `0x03` · vertex count · (frame length · vertex)* · edge count · (frame length · edge)* |
//!
//! Decoding is strict: every read is bounds-checked, tags must match, and
//! every frame (and the top-level buffer) must be consumed exactly. Errors
//! carry the offending payload as lowercase hex.
//!
//! The graph encoding does not carry the frontier; [`Graph::from_bytes`]
//! rebuilds it by replaying insertions.
//!
//! [`Graph::from_bytes`]: crate::Graph::from_bytes
use bytes::BufMut;
use thiserror::Error;

use crate::record::{Edge, Vertex};

/// Type tag of an encoded [`Vertex`].
pub const TAG_VERTEX: u8 = 0x01;
/// Type tag of an encoded [`Edge`].
pub const TAG_EDGE: u8 = 0x02;
/// Type tag of an encoded graph.
pub const TAG_GRAPH: u8 = 0x03;

/// Tag + id + data length.
const VERTEX_HEADER_LEN: usize = 9;
/// Tag + child + parent.
const EDGE_LEN: usize = 9;
const EDGE_FRAME_LEN: u32 = 9;
/// Smallest possible framed element inside a graph (length prefix + header).
const MIN_FRAME_LEN: usize = 4 + VERTEX_HEADER_LEN;

/// Errors produced while encoding or decoding the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Fewer bytes remained than the next field needs.
    #[error(
        "truncated {field}: need {needed} bytes at offset {offset}, {remaining} remaining in payload {payload}"
    )]
    Truncated {
        /// Field being read.
        field: &'static str,
        /// Offset of the read within the payload.
        offset: usize,
        /// Bytes required by the field.
        needed: usize,
        /// Bytes left in the payload.
        remaining: usize,
        /// Offending payload, hex encoded.
        payload: String,
    },

    /// Leading type tag did not match the shape being decoded.
    #[error("type tag mismatch: expected {expected:#04x}, got {actual:#04x} in payload {payload}")]
    TypeMismatch {
        /// Tag of the expected shape.
        expected: u8,
        /// Tag found in the payload.
        actual: u8,
        /// Offending payload, hex encoded.
        payload: String,
    },

    /// A frame or buffer held more bytes than its shape consumed.
    #[error("{trailing} trailing bytes after {shape} in payload {payload}")]
    TrailingBytes {
        /// Shape that was decoded.
        shape: &'static str,
        /// Number of unconsumed bytes.
        trailing: usize,
        /// Offending payload, hex encoded.
        payload: String,
    },

    /// A length or count does not fit the `u32` prefix.
    #[error("{field} of {len} does not fit in a u32 prefix")]
    LengthOverflow {
        /// Field being written.
        field: &'static str,
        /// Actual length or count.
        len: usize,
    },
}

/// Encodes a vertex.
///
/// # Errors
///
/// [`CodecError::LengthOverflow`] if the payload is 4 GiB or larger.
pub fn encode_vertex(vertex: &Vertex) -> Result<Vec<u8>, CodecError> {
    let len = prefix(vertex.data.len(), "vertex data length")?;
    let mut out = Vec::with_capacity(VERTEX_HEADER_LEN + vertex.data.len());
    out.put_u8(TAG_VERTEX);
    out.put_u32(vertex.id);
    out.put_u32(len);
    out.put_slice(&vertex.data);
    Ok(out)
}

/// Decodes a vertex, consuming `bytes` exactly.
pub fn decode_vertex(bytes: &[u8]) -> Result<Vertex, CodecError> {
    let mut reader = Reader::new(bytes);
    reader.tag(TAG_VERTEX)?;
    let id = reader.u32("vertex id")?;
    let len = reader.u32("vertex data length")?;
    let data = reader.take(widen(len), "vertex data")?;
    reader.finish("vertex")?;
    Ok(Vertex::new(id, data.to_vec()))
}

/// Encodes an edge (always 9 bytes).
pub fn encode_edge(edge: &Edge) -> Vec<u8> {
    let mut out = Vec::with_capacity(EDGE_LEN);
    out.put_u8(TAG_EDGE);
    out.put_u32(edge.child);
    out.put_u32(edge.parent);
    out
}

/// Decodes an edge, consuming `bytes` exactly.
pub fn decode_edge(bytes: &[u8]) -> Result<Edge, CodecError> {
    let mut reader = Reader::new(bytes);
    reader.tag(TAG_EDGE)?;
    let child = reader.u32("edge child")?;
    let parent = reader.u32("edge parent")?;
    reader.finish("edge")?;
    Ok(Edge::new(child, parent))
}

/// Encodes a graph from its vertex and edge sequences, preserving order.
///
/// # Errors
///
/// [`CodecError::LengthOverflow`] if a count or vertex frame exceeds `u32`.
pub fn encode_graph(vertices: &[Vertex], edges: &[Edge]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(
        1 + 8 + vertices.len() * MIN_FRAME_LEN + edges.len() * (4 + EDGE_LEN),
    );
    out.put_u8(TAG_GRAPH);

    out.put_u32(prefix(vertices.len(), "vertex count")?);
    for vertex in vertices {
        let frame = encode_vertex(vertex)?;
        out.put_u32(prefix(frame.len(), "vertex frame length")?);
        out.put_slice(&frame);
    }

    out.put_u32(prefix(edges.len(), "edge count")?);
    for edge in edges {
        out.put_u32(EDGE_FRAME_LEN);
        out.put_slice(&encode_edge(edge));
    }
    Ok(out)
}

/// Decodes a graph into its vertex and edge sequences (wire order).
pub fn decode_graph(bytes: &[u8]) -> Result<(Vec<Vertex>, Vec<Edge>), CodecError> {
    let mut reader = Reader::new(bytes);
    reader.tag(TAG_GRAPH)?;

    let vertex_count = reader.u32("vertex count")?;
    let mut vertices = Vec::with_capacity(reader.bounded_capacity(vertex_count));
    for _ in 0..vertex_count {
        let len = reader.u32("vertex frame length")?;
        let frame = reader.take(widen(len), "vertex frame")?;
        vertices.push(decode_vertex(frame)?);
    }

    let edge_count = reader.u32("edge count")?;
    let mut edges = Vec::with_capacity(reader.bounded_capacity(edge_count));
    for _ in 0..edge_count {
        let len = reader.u32("edge frame length")?;
        let frame = reader.take(widen(len), "edge frame")?;
        edges.push(decode_edge(frame)?);
    }

    reader.finish("graph")?;
    Ok((vertices, edges))
}

fn prefix(len: usize, field: &'static str) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError::LengthOverflow { field, len })
}

// A length that does not fit usize can never be satisfied; `take` reports it.
fn widen(len: u32) -> usize {
    usize::try_from(len).unwrap_or(usize::MAX)
}

/// Cursor over an encoded payload with bounds-checked reads.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], CodecError> {
        let remaining = self.remaining();
        if remaining < len {
            return Err(CodecError::Truncated {
                field,
                offset: self.pos,
                needed: len,
                remaining,
                payload: hex::encode(self.buf),
            });
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, CodecError> {
        let raw = self.take(4, field)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn tag(&mut self, expected: u8) -> Result<(), CodecError> {
        let actual = self.take(1, "type tag")?[0];
        if actual != expected {
            return Err(CodecError::TypeMismatch {
                expected,
                actual,
                payload: hex::encode(self.buf),
            });
        }
        Ok(())
    }

    fn finish(&self, shape: &'static str) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            trailing => Err(CodecError::TrailingBytes {
                shape,
                trailing,
                payload: hex::encode(self.buf),
            }),
        }
    }

    /// Preallocation hint for `count` framed elements that cannot exceed
    /// what the remaining bytes could possibly hold.
    fn bounded_capacity(&self, count: u32) -> usize {
        widen(count).min(self.remaining() / MIN_FRAME_LEN)
    }
}
