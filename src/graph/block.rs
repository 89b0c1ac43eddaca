//! Block assembly (C6): from edges to labeled synteny block instances.
//!
//! Every physical region is seen twice in the edge list, once per strand.
//! The two views are paired by their current extent, one is chosen as the
//! canonical representation, and canonical edges are grouped by
//! `(startVertex, endVertex, firstChar)`. Groups are trimmed where they abut
//! neighboring blocks, filtered, and numbered in a stable order, so block ids
//! are reproducible run to run.

use ahash::AHashMap;
use serde::Serialize;

use crate::graph::bifurcation::{BifurcationIndex, VertexId};
use crate::graph::edge::Edge;
use crate::seq::store::Strand;

/// One occurrence of a synteny block, on original input coordinates.
/// `signed_block_id` is positive for instances on the reference strand and
/// negative on the reverse; `start..end` is half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockInstance {
    pub signed_block_id: i64,
    pub chr: usize,
    pub direction: i8,
    pub start: usize,
    pub end: usize,
}

impl BlockInstance {
    pub fn block_id(&self) -> u64 {
        self.signed_block_id.unsigned_abs()
    }

    pub fn length(&self) -> usize {
        self.end - self.start
    }
}

/// Assembly parameters. `trim_k` bounds the boundary trim, `min_size` the
/// smallest reported block, and `shared_only` keeps only blocks present on
/// every input record.
#[derive(Debug, Clone, Copy)]
pub struct BlockOptions {
    pub trim_k: usize,
    pub min_size: usize,
    pub shared_only: bool,
}

/// A physical occurrence: the chosen representation plus its strand mirror.
#[derive(Debug, Clone)]
struct Occurrence {
    canonical: Edge,
    mirror: Edge,
}

fn signature(edge: &Edge) -> (VertexId, VertexId, u8) {
    (edge.start_vertex, edge.end_vertex, edge.first_char)
}

/// Builds block instances from the edge list. `chromosome_count` is the
/// total number of input records (for the shared-only filter).
pub fn assemble_blocks(
    index: &BifurcationIndex,
    edges: Vec<Edge>,
    chromosome_count: usize,
    options: &BlockOptions,
) -> Vec<BlockInstance> {
    let k = index.k();

    // Pair the two strand views of every physical region, dropping edges
    // that carry nothing beyond their endpoint windows.
    let mut by_extent: AHashMap<(usize, usize, usize), Vec<Edge>> = AHashMap::new();
    for edge in edges {
        if edge.is_empty(k) {
            continue;
        }
        by_extent
            .entry((edge.chr, edge.actual_position, edge.actual_length))
            .or_default()
            .push(edge);
    }

    let mut groups: AHashMap<(VertexId, VertexId, u8), Vec<Occurrence>> = AHashMap::new();
    for (_, pair) in by_extent {
        let occurrence = match pair.len() {
            2 => {
                let (a, b) = (pair[0].clone(), pair[1].clone());
                // Canonical orientation: the representation whose signature
                // sorts first; ties (palindromic content) keep the positive
                // strand.
                if (signature(&a), a.direction) <= (signature(&b), b.direction) {
                    Occurrence { canonical: a, mirror: b }
                } else {
                    Occurrence { canonical: b, mirror: a }
                }
            }
            _ => continue,
        };
        groups.entry(signature(&occurrence.canonical)).or_default().push(occurrence);
    }

    // Deterministic group order regardless of hash-map iteration.
    let mut groups: Vec<(_, Vec<Occurrence>)> = groups.into_iter().collect();
    groups.sort_by_key(|(sig, _)| *sig);

    let mut finished: Vec<(usize, Vec<BlockInstance>)> = Vec::new();
    for (_, mut occurrences) in groups {
        occurrences.sort_by_key(|o| {
            (o.canonical.chr, o.canonical.actual_position, o.canonical.direction)
        });

        // Overlapping occurrences within a group (tandem self-similarity)
        // cannot both be reported; keep the first of each overlapping run.
        let mut kept: Vec<Occurrence> = Vec::with_capacity(occurrences.len());
        for occurrence in occurrences {
            if kept.iter().all(|p| !p.canonical.overlaps(&occurrence.canonical)) {
                kept.push(occurrence);
            }
        }
        if kept.len() < 2 {
            continue;
        }

        // Sign convention: the leading instance sits on the positive strand.
        if kept[0].canonical.direction == Strand::Negative {
            for occurrence in kept.iter_mut() {
                std::mem::swap(&mut occurrence.canonical, &mut occurrence.mirror);
            }
        }

        let sig = signature(&kept[0].canonical);
        let instances = trim_group(index, &kept, sig, options.trim_k);
        if instances.iter().any(|i| i.length() < options.min_size) {
            continue;
        }
        if options.shared_only {
            let mut present = vec![false; chromosome_count];
            for instance in &instances {
                present[instance.chr] = true;
            }
            if !present.iter().all(|&p| p) {
                continue;
            }
        }
        let total: usize = instances.iter().map(|i| i.length()).sum();
        finished.push((total, instances));
    }

    // Stable ids: by decreasing total original length, then by the instance
    // vector itself.
    finished.sort_by(|(ta, ia), (tb, ib)| {
        tb.cmp(ta).then_with(|| instance_vector(ia).cmp(&instance_vector(ib)))
    });

    let mut blocks = Vec::new();
    for (id, (_, instances)) in finished.into_iter().enumerate() {
        let block_id = (id + 1) as i64;
        for instance in instances {
            blocks.push(BlockInstance {
                signed_block_id: block_id * instance.direction as i64,
                ..instance
            });
        }
    }
    blocks
}

fn instance_vector(instances: &[BlockInstance]) -> Vec<(usize, usize, usize, i8)> {
    instances
        .iter()
        .map(|i| (i.chr, i.start, i.end, i.direction))
        .collect()
}

/// Shrinks a group's instances where they abut neighboring blocks: half a
/// window's worth of original bases is given up at every end whose vertex is
/// not a record boundary, never cutting below `trim_k`.
fn trim_group(
    index: &BifurcationIndex,
    occurrences: &[Occurrence],
    sig: (VertexId, VertexId, u8),
    trim_k: usize,
) -> Vec<BlockInstance> {
    let overhang = (trim_k + 1) / 2;
    let front = if index.is_boundary_vertex(sig.0) { 0 } else { overhang };
    let back = if index.is_boundary_vertex(sig.1) { 0 } else { overhang };

    occurrences
        .iter()
        .map(|occurrence| {
            let edge = &occurrence.canonical;
            let mut start = edge.original_position;
            let mut len = edge.original_length;
            let allowance = len.saturating_sub(trim_k);
            let f = front.min(allowance);
            let b = back.min(allowance - f);
            match edge.direction {
                // Positive: the block prefix is at the low end.
                Strand::Positive => {
                    start += f;
                    len -= f + b;
                }
                // Negative: the block prefix is at the high end.
                Strand::Negative => {
                    start += b;
                    len -= f + b;
                }
            }
            BlockInstance {
                signed_block_id: edge.direction.sign() as i64,
                chr: edge.chr,
                direction: edge.direction.sign() as i8,
                start,
                end: start + len,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build::build_index;
    use crate::graph::edge::list_edges;
    use crate::progress::Progress;
    use crate::seq::store::DnaSequence;

    fn blocks_for(records: &[&str], k: usize, options: &BlockOptions) -> Vec<BlockInstance> {
        let seq = DnaSequence::new(
            &records.iter().map(|r| r.as_bytes().to_vec()).collect::<Vec<_>>(),
        );
        let index = build_index(&seq, k, &mut Progress::none());
        let edges = list_edges(&seq, &index, &mut Progress::none());
        assemble_blocks(&index, edges, seq.chromosome_count(), options)
    }

    #[test]
    fn test_identical_records_form_one_block() {
        let blocks = blocks_for(
            &["AAAAACCCCCGGGGGTTTTT", "AAAAACCCCCGGGGGTTTTT"],
            5,
            &BlockOptions { trim_k: 5, min_size: 10, shared_only: false },
        );
        assert_eq!(blocks.len(), 2);
        for (i, instance) in blocks.iter().enumerate() {
            assert_eq!(instance.signed_block_id, 1);
            assert_eq!(instance.chr, i);
            assert_eq!(instance.start, 0);
            assert_eq!(instance.end, 20);
        }
    }

    #[test]
    fn test_inverted_repeat_gets_opposite_signs() {
        // An 8 bp sequence, a spacer, then its reverse complement.
        let blocks = blocks_for(
            &["ACCTGAAGTTTTCTTCAGGT"],
            4,
            &BlockOptions { trim_k: 4, min_size: 6, shared_only: false },
        );
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].signed_block_id, 1);
        assert_eq!(blocks[1].signed_block_id, -1);
        assert_eq!(blocks[0].length(), blocks[1].length());
        // The forward copy sits at the start, the inverted one at the end.
        assert_eq!(blocks[0].start, 0);
        assert_eq!(blocks[1].end, 20);
    }

    #[test]
    fn test_unique_region_is_not_a_block() {
        let blocks = blocks_for(
            &["ACGGTCATTACGAAC"],
            4,
            &BlockOptions { trim_k: 4, min_size: 4, shared_only: false },
        );
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_shared_only_filter_drops_partial_blocks() {
        // The repeat lives in the first two records only; the third record
        // shares no k-mer with them and is too short to form an edge.
        let records = ["AAAAACCCCCGGGGGTTTTT", "AAAAACCCCCGGGGGTTTTT", "GAGAG"];
        let options = BlockOptions { trim_k: 5, min_size: 10, shared_only: false };
        let blocks = blocks_for(&records, 5, &options);
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.block_id() == 1));

        let shared = blocks_for(&records, 5, &BlockOptions { shared_only: true, ..options });
        assert!(shared.is_empty());
    }

    #[test]
    fn test_min_size_filter() {
        let blocks = blocks_for(
            &["AAAAACCCCCGGGGGTTTTT", "AAAAACCCCCGGGGGTTTTT"],
            5,
            &BlockOptions { trim_k: 5, min_size: 21, shared_only: false },
        );
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_deterministic_ids_across_runs() {
        let records = ["AAAAACCCCCGGGGGTTTTT", "AAAAACCCCCGGGGGTTTTT"];
        let options = BlockOptions { trim_k: 5, min_size: 10, shared_only: false };
        let a = blocks_for(&records, 5, &options);
        let b = blocks_for(&records, 5, &options);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }
}
