// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dependency-closure walk with cycle detection.
//!
//! The walk is depth-first over parent edges, siblings in ascending id order.
//! It runs on an explicit work stack so deep ancestries cannot exhaust the
//! call stack. The active path is threaded through the whole walk, so cycles
//! of any length are caught, not only self-loops.
use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::graph::{Graph, GraphError};
use crate::ident::VertexId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VisitState {
    /// On the active path.
    Visiting,
    /// Fully explored; reachable again only through another branch.
    Visited,
}

enum Step {
    Enter(VertexId),
    Exit(VertexId),
}

/// Returns every transitive ancestor of `start`, sorted and de-duplicated.
///
/// # Errors
///
/// [`GraphError::Cycle`] if any id reappears on the active traversal path.
/// The reported path runs from `start` to the repeated id inclusive.
pub(crate) fn dependency_closure(
    graph: &Graph,
    start: VertexId,
) -> Result<Vec<VertexId>, GraphError> {
    let mut state: FxHashMap<VertexId, VisitState> = FxHashMap::default();
    let mut path: Vec<VertexId> = Vec::new();
    let mut ancestors: BTreeSet<VertexId> = BTreeSet::new();
    let mut stack = vec![Step::Enter(start)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(id) => {
                match state.get(&id) {
                    Some(VisitState::Visiting) => {
                        path.push(id);
                        return Err(GraphError::Cycle { id, path });
                    }
                    Some(VisitState::Visited) => continue,
                    None => {}
                }
                state.insert(id, VisitState::Visiting);
                path.push(id);
                if id != start {
                    ancestors.insert(id);
                }
                stack.push(Step::Exit(id));
                // Reversed so the smallest parent is walked first.
                for parent in graph.sorted_parents(id).into_iter().rev() {
                    stack.push(Step::Enter(parent));
                }
            }
            Step::Exit(id) => {
                state.insert(id, VisitState::Visited);
                path.pop();
            }
        }
    }

    Ok(ancestors.into_iter().collect())
}
