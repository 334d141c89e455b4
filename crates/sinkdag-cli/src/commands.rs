// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Subcommand implementations over graph files.
//!
//! A graph file holds the raw graph wire encoding. Every command loads the
//! whole file, applies one operation and (for mutations) writes it back.
//! Results go to the supplied writer; diagnostics go through `tracing`.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use sinkdag::{DigestFn, Edge, Graph, HashAlgorithm, IdSource, Vertex, VertexId, ROOT_ID};
use tracing::{debug, info, warn};

pub(crate) fn load(path: &Path) -> Result<Graph> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let graph = Graph::from_bytes(&bytes)
        .with_context(|| format!("{} is not a valid graph file", path.display()))?;
    debug!(path = %path.display(), vertices = graph.len(), "graph loaded");
    Ok(graph)
}

fn save(path: &Path, graph: &Graph) -> Result<()> {
    let bytes = graph.to_bytes()?;
    fs::write(path, &bytes).with_context(|| format!("failed to write {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "graph saved");
    Ok(())
}

/// Writes an empty graph to `path`, refusing to clobber an existing file.
pub(crate) fn init(path: &Path, out: &mut impl Write) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    save(path, &Graph::new())?;
    info!(path = %path.display(), "initialized empty graph");
    writeln!(out, "initialized {}", path.display())?;
    Ok(())
}

/// Appends a vertex with a fresh id and prints the id.
///
/// With `detached` the vertex is inserted on its own as a new head;
/// otherwise it is attached under the entire frontier.
pub(crate) fn append(
    path: &Path,
    payload: Vec<u8>,
    detached: bool,
    ids: &mut impl IdSource,
    out: &mut impl Write,
) -> Result<VertexId> {
    let mut graph = load(path)?;
    let vertex = Vertex::generate(ids, payload);
    let id = vertex.id;
    if graph.contains(id) {
        bail!("generated id {id} is already in use; retry with a different --seed");
    }
    if detached {
        graph.add(vertex);
    } else {
        graph
            .add_reduced(vertex)
            .with_context(|| format!("failed to attach vertex {id} under the frontier"))?;
    }
    save(path, &graph)?;
    info!(id, detached, frontier = ?graph.frontier(), "vertex appended");
    writeln!(out, "{id}")?;
    Ok(id)
}

/// Adds the edge `child -> parent`.
pub(crate) fn link(path: &Path, edge: Edge, out: &mut impl Write) -> Result<()> {
    let mut graph = load(path)?;
    let added = graph
        .add_edge(edge)
        .with_context(|| format!("cannot link {} -> {}", edge.child, edge.parent))?;
    if added {
        save(path, &graph)?;
        writeln!(out, "linked {} -> {}", edge.child, edge.parent)?;
    } else {
        writeln!(out, "edge {} -> {} already present", edge.child, edge.parent)?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct VertexReport {
    id: VertexId,
    len: usize,
    data: String,
}

#[derive(Debug, Serialize)]
struct EdgeReport {
    child: VertexId,
    parent: VertexId,
}

#[derive(Debug, Serialize)]
struct Report {
    hash: String,
    vertices: Vec<VertexReport>,
    edges: Vec<EdgeReport>,
    frontier: Vec<VertexId>,
    /// `None` when an edge names a vertex that was never inserted.
    root: Option<String>,
}

impl Report {
    fn build(graph: &Graph, hash: HashAlgorithm) -> Self {
        let root = match graph.root_digest(&hash) {
            Ok(digest) => Some(hex::encode(digest)),
            Err(err) => {
                warn!(%err, "root digest unavailable");
                None
            }
        };
        Self {
            hash: hash.name().to_owned(),
            vertices: graph
                .vertices()
                .iter()
                .map(|vertex| VertexReport {
                    id: vertex.id,
                    len: vertex.data.len(),
                    data: hex::encode(&vertex.data),
                })
                .collect(),
            edges: graph
                .edges()
                .iter()
                .map(|edge| EdgeReport {
                    child: edge.child,
                    parent: edge.parent,
                })
                .collect(),
            frontier: graph.frontier().to_vec(),
            root,
        }
    }
}

/// Lists vertices, edges, frontier and root digest.
pub(crate) fn inspect(
    path: &Path,
    json: bool,
    hash: HashAlgorithm,
    out: &mut impl Write,
) -> Result<()> {
    let graph = load(path)?;
    let report = Report::build(&graph, hash);
    if json {
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "vertices: {}", report.vertices.len())?;
    for vertex in &report.vertices {
        writeln!(out, "  {:>10}  {:>6}B  {}", vertex.id, vertex.len, vertex.data)?;
    }
    writeln!(out, "edges: {}", report.edges.len())?;
    for edge in &report.edges {
        writeln!(out, "  {:>10} -> {}", edge.child, edge.parent)?;
    }
    writeln!(out, "frontier: {:?}", report.frontier)?;
    match &report.root {
        Some(root) => writeln!(out, "root ({}): {root}", report.hash)?,
        None => writeln!(out, "root ({}): unavailable", report.hash)?,
    }
    Ok(())
}

/// Prints the hex digest of `id` ([`ROOT_ID`] for the whole graph).
pub(crate) fn digest<H: DigestFn + ?Sized>(
    path: &Path,
    id: VertexId,
    hasher: &H,
    out: &mut impl Write,
) -> Result<()> {
    let graph = load(path)?;
    let digest = graph.digest(id, hasher).with_context(|| {
        if id == ROOT_ID {
            "failed to digest graph root".to_owned()
        } else {
            format!("failed to digest vertex {id}")
        }
    })?;
    writeln!(out, "{}", hex::encode(digest))?;
    Ok(())
}

/// Compares the root digest with `expected` (hex); mismatch is an error.
pub(crate) fn verify<H: DigestFn + ?Sized>(
    path: &Path,
    expected: &str,
    hasher: &H,
    out: &mut impl Write,
) -> Result<()> {
    let expected = hex::decode(expected.trim())
        .with_context(|| format!("expected digest {expected:?} is not valid hex"))?;
    let graph = load(path)?;
    if graph.matches_root(&expected, hasher)? {
        writeln!(out, "ok {}", hex::encode(&expected))?;
        return Ok(());
    }
    let actual = hex::encode(graph.root_digest(hasher)?);
    warn!(expected = %hex::encode(&expected), %actual, "root digest mismatch");
    bail!(
        "root digest mismatch: expected {}, found {actual}",
        hex::encode(&expected)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sinkdag::{Blake3, SequentialIds, Sha256};

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    fn fresh(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("graph.sdag");
        init(&path, &mut Vec::new()).unwrap();
        path
    }

    #[test]
    fn init_writes_empty_graph_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = fresh(&dir);
        assert_eq!(load(&path).unwrap(), Graph::new());
        assert!(init(&path, &mut Vec::new()).is_err());
    }

    #[test]
    fn append_chains_under_frontier_and_detached_adds_head() {
        let dir = tempfile::tempdir().unwrap();
        let path = fresh(&dir);
        let mut ids = SequentialIds::new();

        let mut out = Vec::new();
        let first = append(&path, b"a".to_vec(), false, &mut ids, &mut out).unwrap();
        let second = append(&path, b"b".to_vec(), false, &mut ids, &mut out).unwrap();
        let side = append(&path, b"c".to_vec(), true, &mut ids, &mut out).unwrap();
        assert_eq!(output(out), format!("{first}\n{second}\n{side}\n"));

        let graph = load(&path).unwrap();
        assert_eq!(graph.edges(), &[Edge::new(second, first)]);
        assert_eq!(graph.frontier(), &[second, side]);
    }

    #[test]
    fn append_refuses_id_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let path = fresh(&dir);
        append(&path, Vec::new(), false, &mut SequentialIds::new(), &mut Vec::new()).unwrap();
        let err = append(&path, Vec::new(), false, &mut SequentialIds::new(), &mut Vec::new())
            .unwrap_err();
        assert!(err.to_string().contains("already in use"), "{err}");
        assert_eq!(load(&path).unwrap().len(), 1);
    }

    #[test]
    fn link_reports_duplicates_and_rejects_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let path = fresh(&dir);
        let mut out = Vec::new();
        link(&path, Edge::new(2, 1), &mut out).unwrap();
        link(&path, Edge::new(2, 1), &mut out).unwrap();
        assert_eq!(
            output(out),
            "linked 2 -> 1\nedge 2 -> 1 already present\n"
        );

        let before = fs::read(&path).unwrap();
        let err = link(&path, Edge::new(1, 2), &mut Vec::new()).unwrap_err();
        assert!(format!("{err:#}").contains("cycle detected"), "{err:#}");
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn digest_and_verify_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = fresh(&dir);
        append(&path, b"x".to_vec(), false, &mut SequentialIds::new(), &mut Vec::new()).unwrap();

        let mut out = Vec::new();
        digest(&path, ROOT_ID, &Sha256, &mut out).unwrap();
        let root = output(out).trim().to_owned();
        assert_eq!(root, hex::encode(load(&path).unwrap().root_digest(&Sha256).unwrap()));

        let mut out = Vec::new();
        verify(&path, &root, &Sha256, &mut out).unwrap();
        assert_eq!(output(out), format!("ok {root}\n"));

        let err = verify(&path, &root, &Blake3, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("mismatch"), "{err}");
        assert!(verify(&path, "not-hex", &Blake3, &mut Vec::new()).is_err());
    }

    #[test]
    fn digest_of_unknown_vertex_names_known_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = fresh(&dir);
        append(&path, Vec::new(), false, &mut SequentialIds::new(), &mut Vec::new()).unwrap();
        let err = digest(&path, 99, &Blake3, &mut Vec::new()).unwrap_err();
        assert!(format!("{err:#}").contains("known vertices: [1]"), "{err:#}");
    }

    #[test]
    fn inspect_renders_text_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = fresh(&dir);
        let mut ids = SequentialIds::new();
        append(&path, b"hi".to_vec(), false, &mut ids, &mut Vec::new()).unwrap();
        append(&path, Vec::new(), false, &mut ids, &mut Vec::new()).unwrap();

        let mut text = Vec::new();
        inspect(&path, false, HashAlgorithm::Blake3, &mut text).unwrap();
        let text = output(text);
        assert!(text.starts_with("vertices: 2\n"), "{text}");
        assert!(text.contains("6869"), "{text}");
        assert!(text.contains("frontier: [2]"), "{text}");

        let mut json = Vec::new();
        inspect(&path, true, HashAlgorithm::Blake3, &mut json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["frontier"], serde_json::json!([2]));
        assert_eq!(value["edges"][0]["child"], 2);
        assert_eq!(value["vertices"][0]["data"], "6869");
        let root = hex::encode(load(&path).unwrap().root_digest(&Blake3).unwrap());
        assert_eq!(value["root"], root);
    }

    #[test]
    fn inspect_tolerates_dangling_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = fresh(&dir);
        append(&path, Vec::new(), false, &mut SequentialIds::new(), &mut Vec::new()).unwrap();
        link(&path, Edge::new(1, 50), &mut Vec::new()).unwrap();

        let mut json = Vec::new();
        inspect(&path, true, HashAlgorithm::Blake3, &mut json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert!(value["root"].is_null());
    }

    #[test]
    fn corrupt_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.sdag");
        fs::write(&path, [0xff, 0x00]).unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("not a valid graph file"), "{err}");
    }
}
