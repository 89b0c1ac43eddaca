//! Bulge removal (C4).
//!
//! A bulge is a pair of short, distinct walks between the same two branching
//! vertices. Each simplification pass visits every vertex, walks a bounded
//! distance out of each of its occurrences, and greedily rewrites alternative
//! branches onto a representative so that small variation (SNPs, short
//! indels) stops fragmenting the graph. Every rewrite goes through the
//! sequence store and is followed by occurrence erasure plus re-indexing of
//! the affected neighborhood, which keeps vertex ids stable across passes.

use ahash::{AHashMap, AHashSet};
use tracing::debug;

use crate::graph::bifurcation::{BifurcationIndex, VertexId};
use crate::progress::Progress;
use crate::seq::nucleotide::normalize;
use crate::seq::store::{Cursor, DnaSequence};

/// One bounded walk's first arrival at a target vertex.
#[derive(Debug, Clone, Copy)]
struct Visit {
    walk: usize,
    distance: usize,
}

/// A validated collapse: rewrite the range at `other` with the content
/// spelled at `rep`.
struct Collapse {
    rep: Cursor,
    rep_len: usize,
    other: Cursor,
    other_len: usize,
}

/// Runs one simplification stage: up to `max_iterations` passes over all
/// vertices, stopping early once a pass collapses nothing. Returns the total
/// number of collapsed bulges.
pub fn simplify_stage(
    seq: &mut DnaSequence,
    index: &mut BifurcationIndex,
    min_branch_size: usize,
    max_iterations: usize,
    progress: &mut Progress,
) -> usize {
    let mut total = 0;
    for iteration in 0..max_iterations {
        let mut collapsed = 0;
        progress.start();
        let vertex_count = index.vertex_count();
        for vertex in 0..vertex_count {
            collapsed += remove_bulges(seq, index, vertex, min_branch_size);
            progress.run(vertex + 1, vertex_count);
        }
        progress.end();
        debug!(iteration, collapsed, "bulge removal pass");
        total += collapsed;
        if collapsed == 0 {
            break;
        }
    }
    total
}

/// Collapses bulges rooted at one vertex until none remain. Each collapse
/// invalidates the walk analysis, so the search restarts after every edit.
fn remove_bulges(
    seq: &mut DnaSequence,
    index: &mut BifurcationIndex,
    vertex: VertexId,
    min_branch_size: usize,
) -> usize {
    if min_branch_size == 0 {
        return 0;
    }
    let mut count = 0;
    while let Some(collapse) = find_bulge(seq, index, vertex, min_branch_size) {
        apply_collapse(seq, index, &collapse);
        count += 1;
    }
    count
}

/// Searches for one collapsible bulge out of `vertex`.
fn find_bulge(
    seq: &DnaSequence,
    index: &BifurcationIndex,
    vertex: VertexId,
    min_branch_size: usize,
) -> Option<Collapse> {
    let k = index.k();
    let starts = index.occurrences(vertex).to_vec();
    if starts.len() < 2 {
        return None;
    }
    // A branch needs an interior: raw distance d corresponds to
    // d - (k - 1) non-overlapping characters between the two windows.
    let max_span = min_branch_size + k - 1;

    let mut visits: AHashMap<VertexId, Vec<Visit>> = AHashMap::new();
    for (walk, &start) in starts.iter().enumerate() {
        let mut c = start;
        for distance in 1..=max_span {
            c = seq.advance(c);
            if seq.is_boundary(c) {
                break;
            }
            if distance < k {
                continue;
            }
            if let Some(target) = index.vertex_at(c) {
                if target == vertex {
                    continue;
                }
                let list = visits.entry(target).or_default();
                if !list.iter().any(|v| v.walk == walk) {
                    list.push(Visit { walk, distance });
                }
            }
        }
    }

    let mut targets: Vec<VertexId> = visits
        .iter()
        .filter(|(_, list)| list.len() >= 2)
        .map(|(&t, _)| t)
        .collect();
    targets.sort_unstable();

    for target in targets {
        if let Some(collapse) = plan_collapse(seq, index, &starts, &visits[&target]) {
            return Some(collapse);
        }
    }
    None
}

/// Branch groups for one target: walks that spell identical content belong
/// together; any pair of groups is a candidate bulge.
fn plan_collapse(
    seq: &DnaSequence,
    index: &BifurcationIndex,
    starts: &[Cursor],
    arrivals: &[Visit],
) -> Option<Collapse> {
    let k = index.k();

    struct Branch {
        start: Cursor,
        len: usize,
        content: Vec<u8>,
        original_len: usize,
        min_interior: VertexId,
    }

    let mut branches = Vec::with_capacity(arrivals.len());
    for visit in arrivals {
        let start = starts[visit.walk];
        let len = visit.distance + k;
        let mut content = Vec::with_capacity(len);
        let mut min_interior = VertexId::MAX;
        let mut c = start;
        let mut last = start;
        for offset in 0..len {
            content.push(normalize(seq.read(c)));
            if offset > 0 && offset < visit.distance {
                if let Some(v) = index.vertex_at(c) {
                    min_interior = min_interior.min(v);
                }
            }
            last = c;
            c = seq.advance(c);
        }
        let first_orig = seq.original(start) as i64;
        let last_orig = seq.original(last) as i64;
        let original_len = (first_orig - last_orig).unsigned_abs() as usize + 1;
        branches.push(Branch { start, len, content, original_len, min_interior });
    }

    // Group by spelled content.
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, branch) in branches.iter().enumerate() {
        match groups
            .iter()
            .position(|g| branches[g[0]].content == branch.content)
        {
            Some(g) => groups[g].push(i),
            None => groups.push(vec![i]),
        }
    }
    if groups.len() < 2 {
        return None;
    }

    // Representative group: largest summed original length, then smallest
    // interior vertex id, then lexicographically smallest content.
    let total_of = |g: usize| -> usize {
        groups[g].iter().map(|&i| branches[i].original_len).sum()
    };
    let interior_of = |g: usize| -> VertexId {
        groups[g].iter().map(|&i| branches[i].min_interior).min().unwrap()
    };
    let mut rep_idx = 0;
    for g in 1..groups.len() {
        let candidate = (total_of(g), interior_of(g), &branches[groups[g][0]].content);
        let current = (total_of(rep_idx), interior_of(rep_idx), &branches[groups[rep_idx][0]].content);
        let better = candidate.0 > current.0
            || (candidate.0 == current.0
                && (candidate.1 < current.1
                    || (candidate.1 == current.1 && candidate.2 < current.2)));
        if better {
            rep_idx = g;
        }
    }
    let rep = &branches[groups[rep_idx][0]];
    let rep_nodes: AHashSet<_> = seq.collect_range(rep.start, rep.len)?.into_iter().collect();

    for (i, branch) in branches.iter().enumerate() {
        if groups[rep_idx].contains(&i) {
            continue;
        }
        // Branches sharing a physical position would collapse onto
        // themselves; a rewrite covering a whole chromosome would erase one
        // strand's representation of it.
        let nodes = match seq.collect_range(branch.start, branch.len) {
            Some(nodes) => nodes,
            None => continue,
        };
        if nodes.iter().any(|n| rep_nodes.contains(n)) {
            continue;
        }
        if branch.len >= seq.chromosome_len(seq.chr_of(branch.start)) {
            continue;
        }
        return Some(Collapse {
            rep: rep.start,
            rep_len: rep.len,
            other: branch.start,
            other_len: branch.len,
        });
    }
    None
}

/// Rewrites the chosen branch and repairs the index around the edit.
fn apply_collapse(seq: &mut DnaSequence, index: &mut BifurcationIndex, collapse: &Collapse) {
    let k = index.k();

    // Replacement content is read through the representative cursor, case
    // preserved, before anything is touched.
    let mut content = Vec::with_capacity(collapse.rep_len);
    let mut c = collapse.rep;
    for _ in 0..collapse.rep_len {
        content.push(seq.read(c));
        c = seq.advance(c);
    }

    // Windows merely overlapping the rewritten range also change content, so
    // the erased and re-indexed span is padded by k-1 on each side.
    let mut anchor = collapse.other;
    let mut back = 0;
    while back < k - 1 {
        let p = seq.retreat(anchor);
        if p == anchor || seq.is_boundary(p) {
            break;
        }
        anchor = p;
        back += 1;
    }
    index.erase_occurrences_in_span(seq, anchor, back + collapse.other_len + (k - 1));

    let resumed = seq.replace(collapse.other, collapse.other_len, &content);
    let start = if back > 0 { anchor } else { resumed };
    index.reindex_after_edit(seq, start, back + content.len() + (k - 1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build::build_index;
    use crate::seq::store::Strand;

    fn store(records: &[&str]) -> DnaSequence {
        DnaSequence::new(&records.iter().map(|r| r.as_bytes().to_vec()).collect::<Vec<_>>())
    }

    #[test]
    fn test_snp_bulge_collapses() {
        let mut seq = store(&["AAAACGTTTT", "AAAACCTTTT"]);
        let mut index = build_index(&seq, 3, &mut Progress::none());
        let collapsed = simplify_stage(&mut seq, &mut index, 2, 4, &mut Progress::none());
        assert!(collapsed > 0);
        assert_eq!(
            seq.spell(0, Strand::Positive),
            seq.spell(1, Strand::Positive)
        );
        // Original coordinates of the untouched flanks survive the rewrite.
        let tail = seq.cursor_at(0, 9, Strand::Positive);
        assert_eq!(seq.original(tail), 9);
        let tail2 = seq.cursor_at(1, 9, Strand::Positive);
        assert_eq!(seq.original(tail2), 9);
    }

    #[test]
    fn test_zero_branch_size_is_a_no_op() {
        let mut seq = store(&["AAAACGTTTT", "AAAACCTTTT"]);
        let before0 = seq.spell(0, Strand::Positive);
        let before1 = seq.spell(1, Strand::Positive);
        let mut index = build_index(&seq, 3, &mut Progress::none());
        let collapsed = simplify_stage(&mut seq, &mut index, 0, 4, &mut Progress::none());
        assert_eq!(collapsed, 0);
        assert_eq!(seq.spell(0, Strand::Positive), before0);
        assert_eq!(seq.spell(1, Strand::Positive), before1);
    }

    #[test]
    fn test_identical_sequences_have_no_bulges() {
        let mut seq = store(&["ACGGTCACGT", "ACGGTCACGT"]);
        let mut index = build_index(&seq, 3, &mut Progress::none());
        let collapsed = simplify_stage(&mut seq, &mut index, 3, 4, &mut Progress::none());
        assert_eq!(collapsed, 0);
    }

    #[test]
    fn test_palindrome_does_not_collapse_onto_itself() {
        // The record equals its own reverse complement, so the walks out of
        // the mirrored occurrences share physical positions and every
        // candidate pair must be rejected by the self-overlap check.
        let mut seq = store(&["AACGCGTT"]);
        let before = seq.spell(0, Strand::Positive);
        let mut index = build_index(&seq, 3, &mut Progress::none());
        let collapsed = simplify_stage(&mut seq, &mut index, 2, 4, &mut Progress::none());
        assert_eq!(collapsed, 0);
        assert_eq!(seq.spell(0, Strand::Positive), before);
    }
}
