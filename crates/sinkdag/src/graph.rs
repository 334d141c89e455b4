// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory DAG of records with frontier (sink) tracking.
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::{debug, trace};

use crate::codec::{self, CodecError};
use crate::guard;
use crate::ident::VertexId;
use crate::record::{Edge, Vertex};

/// Errors returned by graph operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// An id reappeared on the active dependency path.
    #[error("cycle detected at vertex {id}: path {path:?}")]
    Cycle {
        /// The repeated id.
        id: VertexId,
        /// Traversal path from the walk's start to the repeated id.
        path: Vec<VertexId>,
    },

    /// The requested vertex (or one of its ancestors) is not in the graph.
    #[error("vertex {id} not found; known vertices: {known:?}")]
    VertexNotFound {
        /// The missing id.
        id: VertexId,
        /// Every vertex id in the graph, ascending.
        known: Vec<VertexId>,
    },

    /// The whole-graph encoding was malformed.
    #[error("malformed graph encoding: {0}")]
    Codec(#[from] CodecError),
}

/// Append-mostly DAG of [`Vertex`] records linked by [`Edge`]s.
///
/// # Frontier
///
/// Every newly inserted vertex joins the frontier, in insertion order, and
/// leaves it when an edge naming it as parent is successfully added.
///
/// The frontier is not part of the wire encoding. [`Graph::from_bytes`]
/// replays vertices before edges, so a vertex inserted after an edge already
/// named it is a head of the original but not of the replayed graph.
/// Vertices and edges always survive replay.
///
/// # Concurrency
///
/// The graph is plain owned data. Hosts share it behind their own
/// exclusive-access discipline or hand out clones as snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    /// Vertices in insertion order.
    vertices: Vec<Vertex>,
    /// `VertexId -> position in vertices`.
    index: FxHashMap<VertexId, usize>,
    /// Edges in insertion order.
    edges: Vec<Edge>,
    /// Membership set for duplicate-edge checks.
    edge_set: FxHashSet<Edge>,
    /// `child -> parents`, each bucket in edge insertion order.
    parents: FxHashMap<VertexId, Vec<VertexId>>,
    /// Current heads.
    frontier: Vec<VertexId>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `vertex` unless its id is already present.
    ///
    /// Returns `false` (and leaves the graph untouched) on a duplicate id.
    /// A new id always joins the frontier.
    pub fn add(&mut self, vertex: Vertex) -> bool {
        let id = vertex.id;
        if self.index.contains_key(&id) {
            trace!(id, "duplicate vertex ignored");
            return false;
        }
        self.index.insert(id, self.vertices.len());
        self.vertices.push(vertex);
        self.frontier.push(id);
        trace!(id, frontier = self.frontier.len(), "vertex added");
        true
    }

    /// Inserts `vertex` as a dependent of every current frontier member.
    ///
    /// One edge `(vertex.id, head)` is added per head, then the vertex itself
    /// via [`Graph::add`]; the vertex becomes the sole frontier member.
    ///
    /// The operation is atomic: if any edge is rejected, the edges already
    /// inserted by this call are removed and the frontier is restored before
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// [`GraphError::Cycle`] if a head already depends on `vertex.id`
    /// (including the case where `vertex.id` is itself a head).
    pub fn add_reduced(&mut self, vertex: Vertex) -> Result<(), GraphError> {
        let heads = self.frontier.clone();
        let mut inserted = 0usize;
        for head in &heads {
            match self.add_edge(Edge::new(vertex.id, *head)) {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(err) => {
                    for _ in 0..inserted {
                        self.pop_edge();
                    }
                    self.frontier.clone_from(&heads);
                    debug!(id = vertex.id, rolled_back = inserted, %err, "reduced add rejected");
                    return Err(err);
                }
            }
        }
        self.add(vertex);
        Ok(())
    }

    /// Inserts `edge` after checking it keeps the graph acyclic.
    ///
    /// Returns `Ok(false)` if the exact pair already exists. On success the
    /// parent leaves the frontier.
    ///
    /// # Errors
    ///
    /// [`GraphError::Cycle`] if the edge closes a cycle. The edge is removed
    /// again before returning, so the graph is unchanged.
    pub fn add_edge(&mut self, edge: Edge) -> Result<bool, GraphError> {
        if self.edge_set.contains(&edge) {
            trace!(child = edge.child, parent = edge.parent, "duplicate edge ignored");
            return Ok(false);
        }

        self.push_edge(edge);
        if let Err(err) = guard::dependency_closure(self, edge.child) {
            self.pop_edge();
            debug!(child = edge.child, parent = edge.parent, %err, "edge rejected");
            return Err(err);
        }

        self.frontier.retain(|id| *id != edge.parent);
        trace!(child = edge.child, parent = edge.parent, "edge added");
        Ok(true)
    }

    /// Edges whose child is `id`, in edge insertion order.
    pub fn parent_edges(&self, id: VertexId) -> impl Iterator<Item = Edge> + '_ {
        self.parents
            .get(&id)
            .into_iter()
            .flatten()
            .map(move |parent| Edge::new(id, *parent))
    }

    /// Transitive ancestors of `id`, ascending and de-duplicated.
    ///
    /// # Errors
    ///
    /// [`GraphError::Cycle`] if `id` reaches itself. Graphs built through
    /// this API never contain cycles.
    pub fn dependencies(&self, id: VertexId) -> Result<Vec<VertexId>, GraphError> {
        guard::dependency_closure(self, id)
    }

    /// Returns the vertex with `id`, if present.
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.index.get(&id).map(|pos| &self.vertices[*pos])
    }

    /// Returns `true` if a vertex with `id` is present.
    pub fn contains(&self, id: VertexId) -> bool {
        self.index.contains_key(&id)
    }

    /// Vertices in insertion order.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Current frontier, in vertex insertion order.
    pub fn frontier(&self) -> &[VertexId] {
        &self.frontier
    }

    /// Every vertex id, ascending.
    pub fn vertex_ids(&self) -> Vec<VertexId> {
        let mut ids: Vec<VertexId> = self.index.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns `true` if the graph holds no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Wire encoding of the vertex and edge sequences (see [`codec`]).
    ///
    /// # Errors
    ///
    /// [`CodecError::LengthOverflow`] if a payload or count exceeds `u32`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode_graph(&self.vertices, &self.edges)
    }

    /// Rebuilds a graph from its wire encoding.
    ///
    /// Vertices are replayed through [`Graph::add`], then edges through
    /// [`Graph::add_edge`], which re-validates acyclicity of untrusted input.
    /// The rebuilt frontier is the set of vertices no edge names as parent.
    ///
    /// # Errors
    ///
    /// [`GraphError::Codec`] for malformed bytes, [`GraphError::Cycle`] if
    /// the encoded edges form a cycle.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        let (vertices, edges) = codec::decode_graph(bytes)?;
        let mut graph = Self::new();
        for vertex in vertices {
            graph.add(vertex);
        }
        for edge in edges {
            graph.add_edge(edge)?;
        }
        debug!(
            vertices = graph.len(),
            edges = graph.edge_count(),
            frontier = graph.frontier.len(),
            "graph decoded"
        );
        Ok(graph)
    }

    /// Direct parents of `id`, ascending.
    pub(crate) fn sorted_parents(&self, id: VertexId) -> Vec<VertexId> {
        let mut parents = self.parents.get(&id).cloned().unwrap_or_default();
        parents.sort_unstable();
        parents
    }

    fn push_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
        self.edge_set.insert(edge);
        self.parents.entry(edge.child).or_default().push(edge.parent);
    }

    /// Removes the most recently pushed edge and its index entries.
    fn pop_edge(&mut self) -> Option<Edge> {
        let edge = self.edges.pop()?;
        self.edge_set.remove(&edge);
        let bucket_is_empty = self.parents.get_mut(&edge.child).map_or_else(
            || {
                debug_assert!(false, "parent index missing bucket for child {}", edge.child);
                false
            },
            |parents| {
                let popped = parents.pop();
                debug_assert_eq!(popped, Some(edge.parent), "parent index desynced");
                parents.is_empty()
            },
        );
        if bucket_is_empty {
            self.parents.remove(&edge.child);
        }
        Some(edge)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn v(id: VertexId) -> Vertex {
        Vertex::new(id, id.to_be_bytes().to_vec())
    }

    #[test]
    fn add_appends_to_frontier_once() {
        let mut graph = Graph::new();
        assert!(graph.add(v(1)));
        assert!(graph.add(v(2)));
        assert!(!graph.add(Vertex::new(1, b"other".to_vec())));
        assert_eq!(graph.frontier(), &[1, 2]);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.vertex(1).unwrap(), &v(1));
    }

    #[test]
    fn add_edge_shrinks_frontier_and_records_dependency() {
        let mut graph = Graph::new();
        graph.add(v(1));
        graph.add(v(2));
        assert!(graph.add_edge(Edge::new(2, 1)).unwrap());
        assert_eq!(graph.frontier(), &[2]);
        assert_eq!(graph.dependencies(2).unwrap(), vec![1]);
        assert!(graph.dependencies(1).unwrap().is_empty());
    }

    #[test]
    fn duplicate_edge_is_a_no_op() {
        let mut graph = Graph::new();
        graph.add(v(1));
        graph.add(v(2));
        assert!(graph.add_edge(Edge::new(2, 1)).unwrap());
        let before = graph.clone();
        assert!(!graph.add_edge(Edge::new(2, 1)).unwrap());
        assert_eq!(graph, before);
    }

    #[test]
    fn self_loop_is_rejected_and_rolled_back() {
        let mut graph = Graph::new();
        graph.add(v(1));
        let before = graph.clone();
        let err = graph.add_edge(Edge::new(1, 1)).unwrap_err();
        assert_eq!(err, GraphError::Cycle { id: 1, path: vec![1, 1] });
        assert_eq!(graph, before);
        assert_eq!(graph.frontier(), &[1]);
    }

    #[test]
    fn long_cycle_is_rejected_and_rolled_back() {
        let mut graph = Graph::new();
        for id in 1..=4 {
            graph.add(v(id));
        }
        graph.add_edge(Edge::new(2, 1)).unwrap();
        graph.add_edge(Edge::new(3, 2)).unwrap();
        graph.add_edge(Edge::new(4, 3)).unwrap();
        let before = graph.to_bytes().unwrap();

        let err = graph.add_edge(Edge::new(1, 4)).unwrap_err();
        assert_eq!(
            err,
            GraphError::Cycle {
                id: 1,
                path: vec![1, 4, 3, 2, 1]
            }
        );
        assert_eq!(graph.to_bytes().unwrap(), before);
        assert_eq!(graph.frontier(), &[4]);
        assert_eq!(graph.parent_edges(1).count(), 0);
    }

    #[test]
    fn parent_edges_keep_insertion_order() {
        let mut graph = Graph::new();
        graph.add_edge(Edge::new(9, 5)).unwrap();
        graph.add_edge(Edge::new(9, 2)).unwrap();
        graph.add_edge(Edge::new(7, 2)).unwrap();
        graph.add_edge(Edge::new(9, 8)).unwrap();
        let edges: Vec<Edge> = graph.parent_edges(9).collect();
        assert_eq!(edges, vec![Edge::new(9, 5), Edge::new(9, 2), Edge::new(9, 8)]);
        assert_eq!(graph.sorted_parents(9), vec![2, 5, 8]);
    }

    #[test]
    fn add_reduced_collapses_frontier() {
        let mut graph = Graph::new();
        graph.add(v(1));
        graph.add(v(2));
        graph.add_edge(Edge::new(2, 1)).unwrap();

        graph.add_reduced(v(3)).unwrap();
        assert_eq!(graph.frontier(), &[3]);
        assert_eq!(graph.edges().last(), Some(&Edge::new(3, 2)));

        graph.add(v(4));
        graph.add_reduced(v(5)).unwrap();
        assert_eq!(graph.frontier(), &[5]);
        assert_eq!(graph.dependencies(5).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn add_reduced_on_empty_graph_is_plain_add() {
        let mut graph = Graph::new();
        graph.add_reduced(v(1)).unwrap();
        assert_eq!(graph.frontier(), &[1]);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn add_reduced_is_atomic_on_cycle() {
        let mut graph = Graph::new();
        graph.add(v(1));
        graph.add(v(2));
        // 2 already depends on the not-yet-inserted id 9.
        graph.add_edge(Edge::new(2, 9)).unwrap();
        let before = graph.clone();

        let err = graph.add_reduced(v(9)).unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
        assert_eq!(graph, before);
        assert_eq!(graph.frontier(), &[1, 2]);
        assert!(!graph.contains(9));
    }

    #[test]
    fn add_reduced_rejects_existing_head() {
        let mut graph = Graph::new();
        graph.add(v(1));
        let before = graph.clone();
        let err = graph.add_reduced(v(1)).unwrap_err();
        assert_eq!(err, GraphError::Cycle { id: 1, path: vec![1, 1] });
        assert_eq!(graph, before);
    }

    #[test]
    fn late_vertex_joins_frontier_even_if_referenced() {
        let mut graph = Graph::new();
        graph.add(v(5));
        graph.add_edge(Edge::new(5, 7)).unwrap();
        graph.add(v(7));
        assert_eq!(graph.frontier(), &[5, 7]);

        let copy = Graph::from_bytes(&graph.to_bytes().unwrap()).unwrap();
        assert_eq!(copy.vertices(), graph.vertices());
        assert_eq!(copy.edges(), graph.edges());
        assert_eq!(copy.frontier(), &[5]);
    }

    #[test]
    fn wire_replay_keeps_frontier_once_late_heads_are_covered() {
        let mut graph = Graph::new();
        graph.add(v(5));
        graph.add_edge(Edge::new(5, 7)).unwrap();
        graph.add(v(7));
        graph.add(v(3));
        graph.add_reduced(v(11)).unwrap();
        graph.add(v(2));
        assert_eq!(graph.frontier(), &[11, 2]);

        let copy = Graph::from_bytes(&graph.to_bytes().unwrap()).unwrap();
        assert_eq!(copy.frontier(), graph.frontier());
        assert_eq!(copy, graph);
    }

    #[test]
    fn cyclic_blob_is_rejected() {
        let bytes =
            codec::encode_graph(&[v(1), v(2)], &[Edge::new(2, 1), Edge::new(1, 2)]).unwrap();
        let err = Graph::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
    }

    #[test]
    fn malformed_blob_surfaces_codec_error() {
        let err = Graph::from_bytes(&[codec::TAG_EDGE]).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Codec(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn vertex_ids_are_sorted() {
        let mut graph = Graph::new();
        for id in [9, 3, 7] {
            graph.add(v(id));
        }
        assert_eq!(graph.vertex_ids(), vec![3, 7, 9]);
        assert!(!graph.is_empty());
    }

    #[test]
    fn graph_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Graph>();
    }
}
