//! Edge enumeration (C5): walking the simplified graph.
//!
//! Between two consecutive bifurcations on a strand lies exactly one maximal
//! non-branching path. Each is emitted with both its current coordinates and
//! the coordinates the covered bases had in the original input, which is what
//! block instances are ultimately reported in. Positions are always given on
//! the forward strand (leftmost covered base), with `direction` carrying the
//! orientation, so overlap tests work across strands.

use crate::graph::bifurcation::{BifurcationIndex, VertexId};
use crate::progress::Progress;
use crate::seq::nucleotide::normalize;
use crate::seq::store::{Cursor, DnaSequence, Strand};

/// A maximal non-branching walk between two bifurcations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub chr: usize,
    pub direction: Strand,
    pub start_vertex: VertexId,
    pub end_vertex: VertexId,
    /// Forward-strand coordinate of the leftmost covered base, current state.
    pub actual_position: usize,
    pub actual_length: usize,
    /// Forward-strand coordinate of the leftmost covered base, input state.
    pub original_position: usize,
    pub original_length: usize,
    /// Normalized character immediately after the start window, in walk
    /// direction. Distinguishes parallel edges between the same vertex pair.
    pub first_char: u8,
}

impl Edge {
    /// Carries no interior beyond the shared windows.
    pub fn is_empty(&self, k: usize) -> bool {
        self.original_length <= k
    }

    /// Same chromosome and intersecting current extents.
    pub fn overlaps(&self, other: &Edge) -> bool {
        self.chr == other.chr
            && self.actual_position < other.actual_position + other.actual_length
            && other.actual_position < self.actual_position + self.actual_length
    }
}

/// Emits every edge of the graph, both strands of every chromosome, in scan
/// order. Deterministic for a given (sequence, index).
pub fn list_edges(
    seq: &DnaSequence,
    index: &BifurcationIndex,
    progress: &mut Progress,
) -> Vec<Edge> {
    let k = index.k();
    let mut edges = Vec::new();
    let total: usize = (0..seq.chromosome_count())
        .map(|chr| 2 * seq.chromosome_len(chr).saturating_sub(k - 1))
        .sum();
    let mut done = 0usize;
    progress.start();
    for chr in 0..seq.chromosome_count() {
        for strand in [Strand::Positive, Strand::Negative] {
            let len = seq.chromosome_len(chr);
            if len < k {
                continue;
            }
            let mut cursor = seq.begin(chr, strand);
            let mut prev: Option<(usize, Cursor, VertexId)> = None;
            for walk_pos in 0..=len - k {
                if let Some(vertex) = index.vertex_at(cursor) {
                    if let Some((start_pos, start_cursor, start_vertex)) = prev {
                        edges.push(make_edge(
                            seq,
                            k,
                            chr,
                            strand,
                            len,
                            start_pos,
                            start_cursor,
                            start_vertex,
                            walk_pos,
                            vertex,
                        ));
                    }
                    prev = Some((walk_pos, cursor, vertex));
                }
                cursor = seq.advance(cursor);
                done += 1;
                progress.run(done, total);
            }
        }
    }
    progress.end();
    edges
}

#[allow(clippy::too_many_arguments)]
fn make_edge(
    seq: &DnaSequence,
    k: usize,
    chr: usize,
    strand: Strand,
    len: usize,
    start_pos: usize,
    start_cursor: Cursor,
    start_vertex: VertexId,
    end_pos: usize,
    end_vertex: VertexId,
) -> Edge {
    let span = end_pos - start_pos + k;

    // First character after the start window, and the last covered node for
    // the original extent.
    let mut c = start_cursor;
    for _ in 0..k {
        c = seq.advance(c);
    }
    let first_char = normalize(seq.read(c));
    let mut last = c;
    for _ in 0..span - k - 1 {
        last = seq.advance(last);
    }

    let first_orig = seq.original(start_cursor) as usize;
    let last_orig = seq.original(last) as usize;
    let (original_position, original_length) = match strand {
        Strand::Positive => (first_orig, last_orig - first_orig + 1),
        Strand::Negative => (last_orig, first_orig - last_orig + 1),
    };
    let actual_position = match strand {
        Strand::Positive => start_pos,
        Strand::Negative => len - end_pos - k,
    };

    Edge {
        chr,
        direction: strand,
        start_vertex,
        end_vertex,
        actual_position,
        actual_length: span,
        original_position,
        original_length,
        first_char,
    }
}
