//! Bifurcation index (C2): maps canonical k-mer fingerprints of branching
//! vertices to stable vertex ids and tracks every occurrence on both strands.
//!
//! Vertices are never deleted — block identity across simplification
//! iterations depends on id stability — only their occurrence lists change.
//! Occurrence handles are arena cursors, so they survive edits to unrelated
//! parts of the sequence; the bulge engine erases and re-registers the
//! neighborhood of every edit it makes.

use ahash::AHashMap;

use crate::kmer::fingerprint::{fingerprint_window, Fingerprint, Sense};
use crate::seq::nucleotide::{complement, normalize};
use crate::seq::store::{Cursor, DnaSequence, Strand};

/// Stable identifier of a branching vertex of the de Bruijn graph.
pub type VertexId = usize;

#[derive(Debug)]
struct Vertex {
    /// Normalized canonical spelling; the collision check for the hash.
    canon: Box<[u8]>,
    /// True once any occurrence was registered at a record boundary.
    boundary: bool,
}

/// The index itself. One per simplification stage (ids are k-specific).
pub struct BifurcationIndex {
    k: usize,
    vertices: Vec<Vertex>,
    /// fingerprint hash -> vertices sharing it (almost always one).
    buckets: AHashMap<u64, Vec<VertexId>>,
    /// live occurrence -> vertex.
    by_pos: AHashMap<Cursor, VertexId>,
    /// per-vertex occurrences, insertion ordered.
    occurrences: Vec<Vec<Cursor>>,
}

/// True iff the raw window `buf`, viewed in `sense`, spells `canon`.
fn matches_canon(buf: &[u8], sense: Sense, canon: &[u8]) -> bool {
    if buf.len() != canon.len() {
        return false;
    }
    match sense {
        Sense::Forward => buf.iter().zip(canon).all(|(&b, &c)| normalize(b) == c),
        Sense::Reverse => buf
            .iter()
            .rev()
            .zip(canon)
            .all(|(&b, &c)| complement(normalize(b)) == c),
    }
}

impl BifurcationIndex {
    pub fn new(k: usize) -> Self {
        BifurcationIndex {
            k,
            vertices: Vec::new(),
            buckets: AHashMap::new(),
            by_pos: AHashMap::new(),
            occurrences: Vec::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_boundary_vertex(&self, vertex: VertexId) -> bool {
        self.vertices[vertex].boundary
    }

    /// Vertex registered at this exact cursor, if any.
    pub fn vertex_at(&self, cursor: Cursor) -> Option<VertexId> {
        self.by_pos.get(&cursor).copied()
    }

    /// Live occurrences of a vertex across both strands, oldest first.
    pub fn occurrences(&self, vertex: VertexId) -> &[Cursor] {
        &self.occurrences[vertex]
    }

    /// Looks up an existing vertex for the window's content. The hash bucket
    /// narrows the candidates; canonical spelling decides.
    fn resolve(&self, buf: &[u8], fingerprint: Fingerprint) -> Option<VertexId> {
        let bucket = self.buckets.get(&fingerprint.hash)?;
        bucket
            .iter()
            .copied()
            .find(|&v| matches_canon(buf, fingerprint.sense, &self.vertices[v].canon))
    }

    /// Returns the vertex for the window content at `cursor`, creating it on
    /// first sight. `buf`/`rc_buf` are fingerprint scratch space.
    pub fn ensure_vertex(
        &mut self,
        seq: &DnaSequence,
        cursor: Cursor,
        boundary: bool,
        buf: &mut Vec<u8>,
        rc_buf: &mut Vec<u8>,
    ) -> Option<VertexId> {
        let fingerprint = fingerprint_window(seq, cursor, self.k, buf, rc_buf)?;
        if let Some(v) = self.resolve(buf, fingerprint) {
            self.vertices[v].boundary |= boundary;
            return Some(v);
        }
        let canon: Box<[u8]> = match fingerprint.sense {
            Sense::Forward => buf.clone().into_boxed_slice(),
            Sense::Reverse => rc_buf.clone().into_boxed_slice(),
        };
        let v = self.vertices.len();
        self.vertices.push(Vertex { canon, boundary });
        self.occurrences.push(Vec::new());
        self.buckets.entry(fingerprint.hash).or_default().push(v);
        Some(v)
    }

    /// Records `cursor` as an occurrence of `vertex`. Idempotent.
    pub fn register(&mut self, cursor: Cursor, vertex: VertexId) {
        match self.by_pos.insert(cursor, vertex) {
            Some(old) if old == vertex => {}
            Some(old) => {
                // The position changed identity under an edit; drop the stale
                // membership before recording the new one.
                let list = &mut self.occurrences[old];
                if let Some(i) = list.iter().position(|&c| c == cursor) {
                    list.remove(i);
                }
                self.occurrences[vertex].push(cursor);
            }
            None => self.occurrences[vertex].push(cursor),
        }
    }

    /// Removes the occurrence at `cursor`, if registered.
    pub fn erase_at(&mut self, cursor: Cursor) {
        if let Some(vertex) = self.by_pos.remove(&cursor) {
            let list = &mut self.occurrences[vertex];
            if let Some(i) = list.iter().position(|&c| c == cursor) {
                list.remove(i);
            }
        }
    }

    /// If the window at `cursor` carries the fingerprint of a known vertex,
    /// registers the occurrence and returns the id. New fingerprints are NOT
    /// promoted to vertices here: during re-indexing the only new content is
    /// a copy of a branch that is already present elsewhere, so every
    /// branching window resolves.
    pub fn register_if_known(
        &mut self,
        seq: &DnaSequence,
        cursor: Cursor,
        buf: &mut Vec<u8>,
        rc_buf: &mut Vec<u8>,
    ) -> Option<VertexId> {
        let fingerprint = fingerprint_window(seq, cursor, self.k, buf, rc_buf)?;
        let vertex = self.resolve(buf, fingerprint)?;
        self.register(cursor, vertex);
        Some(vertex)
    }

    /// Drops every registration whose window starts within `span` positions
    /// from `start` (in `start`'s direction), on both strands. Callers pad
    /// the span by k-1 on each side so windows merely overlapping an edit are
    /// covered too.
    pub fn erase_occurrences_in_span(&mut self, seq: &DnaSequence, start: Cursor, span: usize) {
        let mut c = start;
        for _ in 0..span {
            if seq.is_boundary(c) {
                break;
            }
            self.erase_at(Cursor::new(c.node, Strand::Positive));
            self.erase_at(Cursor::new(c.node, Strand::Negative));
            c = seq.advance(c);
        }
    }

    /// Re-derives registrations for every window starting within `span`
    /// positions from `start`, on both strands. Idempotent: applying it twice
    /// with identical arguments equals applying it once.
    pub fn reindex_after_edit(&mut self, seq: &DnaSequence, start: Cursor, span: usize) {
        let mut buf = Vec::with_capacity(self.k);
        let mut rc_buf = Vec::with_capacity(self.k);
        let mut c = start;
        for _ in 0..span {
            if seq.is_boundary(c) {
                break;
            }
            self.register_if_known(seq, Cursor::new(c.node, Strand::Positive), &mut buf, &mut rc_buf);
            self.register_if_known(seq, Cursor::new(c.node, Strand::Negative), &mut buf, &mut rc_buf);
            c = seq.advance(c);
        }
    }

    /// Snapshot of all live occurrences, for tests and invariant checks.
    #[cfg(test)]
    pub fn occurrence_snapshot(&self) -> Vec<(VertexId, Vec<Cursor>)> {
        self.occurrences
            .iter()
            .enumerate()
            .map(|(v, list)| (v, list.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(records: &[&str]) -> DnaSequence {
        DnaSequence::new(&records.iter().map(|r| r.as_bytes().to_vec()).collect::<Vec<_>>())
    }

    fn scratch() -> (Vec<u8>, Vec<u8>) {
        (Vec::new(), Vec::new())
    }

    #[test]
    fn test_ensure_vertex_unifies_reverse_complements() {
        let seq = store(&["GACCT", "AGGTC"]);
        let mut index = BifurcationIndex::new(5);
        let (mut buf, mut rc) = scratch();
        let a = seq.begin(0, Strand::Positive);
        let b = seq.begin(1, Strand::Positive);
        let va = index.ensure_vertex(&seq, a, false, &mut buf, &mut rc).unwrap();
        let vb = index.ensure_vertex(&seq, b, false, &mut buf, &mut rc).unwrap();
        assert_eq!(va, vb);
        assert_eq!(index.vertex_count(), 1);
    }

    #[test]
    fn test_register_is_idempotent() {
        let seq = store(&["GACCT"]);
        let mut index = BifurcationIndex::new(5);
        let (mut buf, mut rc) = scratch();
        let a = seq.begin(0, Strand::Positive);
        let v = index.ensure_vertex(&seq, a, false, &mut buf, &mut rc).unwrap();
        index.register(a, v);
        index.register(a, v);
        assert_eq!(index.occurrences(v), &[a]);
    }

    #[test]
    fn test_erase_then_reindex_restores_occurrence() {
        let seq = store(&["GACCTAA"]);
        let mut index = BifurcationIndex::new(5);
        let (mut buf, mut rc) = scratch();
        let a = seq.begin(0, Strand::Positive);
        let v = index.ensure_vertex(&seq, a, false, &mut buf, &mut rc).unwrap();
        index.register(a, v);
        index.erase_occurrences_in_span(&seq, seq.begin(0, Strand::Positive), 7);
        assert_eq!(index.occurrences(v), &[]);
        index.reindex_after_edit(&seq, seq.begin(0, Strand::Positive), 7);
        assert_eq!(index.vertex_at(a), Some(v));
        // The physical window is rediscovered on both strands.
        assert_eq!(index.occurrences(v).len(), 2);
        assert!(index.occurrences(v).contains(&a));
    }

    #[test]
    fn test_reindex_is_idempotent() {
        let seq = store(&["GACCTAA"]);
        let mut index = BifurcationIndex::new(5);
        let (mut buf, mut rc) = scratch();
        let a = seq.begin(0, Strand::Positive);
        let v = index.ensure_vertex(&seq, a, false, &mut buf, &mut rc).unwrap();
        index.register(a, v);
        index.reindex_after_edit(&seq, seq.begin(0, Strand::Positive), 7);
        let once = index.occurrence_snapshot();
        index.reindex_after_edit(&seq, seq.begin(0, Strand::Positive), 7);
        assert_eq!(index.occurrence_snapshot(), once);
    }

    #[test]
    fn test_boundary_flag_sticks() {
        let seq = store(&["GACCT"]);
        let mut index = BifurcationIndex::new(5);
        let (mut buf, mut rc) = scratch();
        let a = seq.begin(0, Strand::Positive);
        let v = index.ensure_vertex(&seq, a, true, &mut buf, &mut rc).unwrap();
        index.ensure_vertex(&seq, a, false, &mut buf, &mut rc).unwrap();
        assert!(index.is_boundary_vertex(v));
    }
}
