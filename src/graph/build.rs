//! Initial graph construction (C3).
//!
//! Two passes over both strands of every chromosome. The census pass counts,
//! per canonical k-mer, the distinct successor characters seen in each
//! orientation; the registration pass turns every branching k-mer into a
//! vertex of the bifurcation index and records all of its occurrences.
//! In-branching needs no separate bookkeeping: a predecessor of a window on
//! one strand is the successor of the same physical window on the other.

use ahash::AHashMap;
use rayon::prelude::*;

use crate::graph::bifurcation::BifurcationIndex;
use crate::kmer::fingerprint::{fingerprint_window, flip_window, Sense};
use crate::progress::Progress;
use crate::seq::nucleotide::{is_definite, normalize};
use crate::seq::store::{Cursor, DnaSequence, Strand};

#[derive(Debug, Clone, Copy)]
struct CensusEntry {
    rep: Cursor,
    rep_sense: Sense,
    /// Successor characters seen in canonical orientation (A/C/G/T bits).
    fwd: u8,
    /// Successor characters seen in reverse orientation.
    rev: u8,
    /// Some occurrence sits at a record end or against an `N` run.
    boundary: bool,
}

impl CensusEntry {
    fn branching(&self) -> bool {
        self.fwd.count_ones() > 1 || self.rev.count_ones() > 1 || self.boundary
    }
}

type Census = AHashMap<u64, Vec<CensusEntry>>;

fn char_bit(ch: u8) -> u8 {
    match normalize(ch) {
        b'A' => 1,
        b'C' => 2,
        b'G' => 4,
        b'T' => 8,
        _ => 0,
    }
}

/// Content equality between a window and a census representative, accounting
/// for their senses relative to the shared canonical form.
fn same_content(
    seq: &DnaSequence,
    k: usize,
    cursor: Cursor,
    sense: Sense,
    entry: &CensusEntry,
) -> bool {
    if sense == entry.rep_sense {
        seq.window_equal(cursor, entry.rep, k)
    } else {
        seq.window_equal(cursor, flip_window(seq, entry.rep, k), k)
    }
}

fn census_strand(seq: &DnaSequence, chr: usize, strand: Strand, k: usize) -> Census {
    let mut census = Census::new();
    let len = seq.chromosome_len(chr);
    if len < k {
        return census;
    }
    let mut buf = Vec::with_capacity(k);
    let mut rc_buf = Vec::with_capacity(k);
    let mut cursor = seq.begin(chr, strand);
    let mut succ = cursor;
    for _ in 0..k {
        succ = seq.advance(succ);
    }
    for _ in 0..=len - k {
        if let Some(fp) = fingerprint_window(seq, cursor, k, &mut buf, &mut rc_buf) {
            let succ_ch = seq.read(succ);
            let at_boundary = seq.is_boundary(succ) || !is_definite(succ_ch);
            let bit = if at_boundary { 0 } else { char_bit(succ_ch) };
            let bucket = census.entry(fp.hash).or_default();
            let slot = bucket
                .iter()
                .position(|e| same_content(seq, k, cursor, fp.sense, e))
                .unwrap_or_else(|| {
                    bucket.push(CensusEntry {
                        rep: cursor,
                        rep_sense: fp.sense,
                        fwd: 0,
                        rev: 0,
                        boundary: false,
                    });
                    bucket.len() - 1
                });
            let entry = &mut bucket[slot];
            entry.boundary |= at_boundary;
            match fp.sense {
                Sense::Forward => entry.fwd |= bit,
                Sense::Reverse => entry.rev |= bit,
            }
        }
        cursor = seq.advance(cursor);
        succ = seq.advance(succ);
    }
    census
}

fn merge_census(seq: &DnaSequence, k: usize, mut into: Census, from: Census) -> Census {
    for (hash, entries) in from {
        let bucket = into.entry(hash).or_default();
        for entry in entries {
            let slot = bucket
                .iter()
                .position(|e| same_content(seq, k, entry.rep, entry.rep_sense, e));
            match slot {
                Some(i) => {
                    bucket[i].fwd |= entry.fwd;
                    bucket[i].rev |= entry.rev;
                    bucket[i].boundary |= entry.boundary;
                }
                None => bucket.push(entry),
            }
        }
    }
    into
}

/// Builds the bifurcation index for the current state of the sequence.
/// Vertex ids are assigned in scan order, so the result is deterministic for
/// a given (sequence, k).
pub fn build_index(seq: &DnaSequence, k: usize, progress: &mut Progress) -> BifurcationIndex {
    // Census: each (chromosome, strand) pair folds its own map.
    let strands: Vec<(usize, Strand)> = (0..seq.chromosome_count())
        .flat_map(|chr| [(chr, Strand::Positive), (chr, Strand::Negative)])
        .collect();
    let census = strands
        .par_iter()
        .map(|&(chr, strand)| census_strand(seq, chr, strand, k))
        .reduce(Census::new, |a, b| merge_census(seq, k, a, b));

    // Registration: sequential scan in a fixed order.
    let mut index = BifurcationIndex::new(k);
    let mut buf = Vec::with_capacity(k);
    let mut rc_buf = Vec::with_capacity(k);
    let total: usize = strands
        .iter()
        .map(|&(chr, _)| seq.chromosome_len(chr).saturating_sub(k - 1))
        .sum();
    let mut done = 0usize;
    progress.start();
    for &(chr, strand) in &strands {
        let len = seq.chromosome_len(chr);
        if len < k {
            continue;
        }
        let mut cursor = seq.begin(chr, strand);
        let mut succ = cursor;
        for _ in 0..k {
            succ = seq.advance(succ);
        }
        for idx in 0..=len - k {
            if let Some(fp) = fingerprint_window(seq, cursor, k, &mut buf, &mut rc_buf) {
                let is_branching = census
                    .get(&fp.hash)
                    .and_then(|bucket| {
                        bucket.iter().find(|e| same_content(seq, k, cursor, fp.sense, e))
                    })
                    .map(|e| e.branching())
                    .unwrap_or(false);
                if is_branching {
                    let succ_ch = seq.read(succ);
                    let at_edge =
                        idx == 0 || seq.is_boundary(succ) || !is_definite(succ_ch);
                    if let Some(v) =
                        index.ensure_vertex(seq, cursor, at_edge, &mut buf, &mut rc_buf)
                    {
                        index.register(cursor, v);
                    }
                }
            }
            cursor = seq.advance(cursor);
            succ = seq.advance(succ);
            done += 1;
            progress.run(done, total);
        }
    }
    progress.end();
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(records: &[&str]) -> DnaSequence {
        DnaSequence::new(&records.iter().map(|r| r.as_bytes().to_vec()).collect::<Vec<_>>())
    }

    fn index_of(records: &[&str], k: usize) -> (DnaSequence, BifurcationIndex) {
        let seq = store(records);
        let index = build_index(&seq, k, &mut Progress::none());
        (seq, index)
    }

    #[test]
    fn test_out_branching_is_detected() {
        // "AAC" continues with G in one record and T in the other.
        let (seq, index) = index_of(&["AACGG", "AACTT"], 3);
        let a = seq.begin(0, Strand::Positive);
        let b = seq.begin(1, Strand::Positive);
        let va = index.vertex_at(a).expect("AAC@r1 is a bifurcation");
        let vb = index.vertex_at(b).expect("AAC@r2 is a bifurcation");
        assert_eq!(va, vb);
        // Two + strand occurrences plus their - strand views.
        assert_eq!(index.occurrences(va).len(), 4);
    }

    #[test]
    fn test_record_ends_are_bifurcations() {
        let (seq, index) = index_of(&["ACGGT"], 5);
        let v = index
            .vertex_at(seq.begin(0, Strand::Positive))
            .expect("single full window is a boundary bifurcation");
        assert!(index.is_boundary_vertex(v));
    }

    #[test]
    fn test_interior_of_unique_sequence_is_not_branching() {
        // No repeats: only the boundary windows may become vertices.
        let (seq, index) = index_of(&["ACGGTCA"], 3);
        let interior = seq.cursor_at(0, 2, Strand::Positive);
        assert_eq!(index.vertex_at(interior), None);
    }

    #[test]
    fn test_n_breaks_matching() {
        // The window covering the N carries no fingerprint, and its flanks
        // count as boundary bifurcations.
        let (seq, index) = index_of(&["ACGTTNACGTT"], 4);
        let before_n = seq.cursor_at(0, 1, Strand::Positive);
        let v = index.vertex_at(before_n).expect("window before N run");
        assert!(index.is_boundary_vertex(v));
    }

    #[test]
    fn test_deterministic_vertex_ids() {
        let (_, a) = index_of(&["AACGGTTACG", "AACTGTTACG"], 4);
        let (_, b) = index_of(&["AACGGTTACG", "AACTGTTACG"], 4);
        assert_eq!(a.vertex_count(), b.vertex_count());
    }
}
