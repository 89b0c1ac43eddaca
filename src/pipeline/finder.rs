//! The synteny block finder engine.
//!
//! Owns the working double-stranded sequence and the immutable input backup.
//! Callers drive it through simplification stages and then ask for blocks;
//! between stages the working sequence keeps its simplified state while
//! original input coordinates survive inside the sequence store.

use std::io::Write;
use std::path::Path;

use petgraph::graph::DiGraph;
use tracing::info;

use crate::error::{Error, Result};
use crate::graph::block::{assemble_blocks, BlockInstance, BlockOptions};
use crate::graph::build::build_index;
use crate::graph::bulge::simplify_stage;
use crate::graph::edge::{list_edges, Edge};
use crate::io::fasta::FastaRecord;
use crate::progress::{Progress, ProgressCallback};
use crate::seq::backup::SequenceBackup;
use crate::seq::nucleotide::is_valid_input;
use crate::seq::store::{DnaSequence, Strand};

/// Hard ceiling on the total input size: 1 GB across all records.
pub const MAX_INPUT_SIZE: u64 = 1 << 30;

#[derive(Debug)]
pub struct BlockFinder {
    records: Vec<FastaRecord>,
    seq: DnaSequence,
    backup: SequenceBackup,
}

impl BlockFinder {
    /// Builds an engine keeping the input backup in memory.
    pub fn new(records: Vec<FastaRecord>) -> Result<Self> {
        validate_records(&records)?;
        let raw: Vec<Vec<u8>> = records.iter().map(|r| r.sequence.clone()).collect();
        let seq = DnaSequence::new(&raw);
        Ok(BlockFinder { records, seq, backup: SequenceBackup::in_ram(raw) })
    }

    /// Builds an engine that spills the input backup to a scoped temporary
    /// directory under `temp_dir`.
    pub fn with_temp_dir(records: Vec<FastaRecord>, temp_dir: &Path) -> Result<Self> {
        validate_records(&records)?;
        let raw: Vec<Vec<u8>> = records.iter().map(|r| r.sequence.clone()).collect();
        let seq = DnaSequence::new(&raw);
        let backup = SequenceBackup::spilled(&raw, temp_dir)?;
        Ok(BlockFinder { records, seq, backup })
    }

    pub fn records(&self) -> &[FastaRecord] {
        &self.records
    }

    pub fn backup(&self) -> &SequenceBackup {
        &self.backup
    }

    pub fn sequence(&self) -> &DnaSequence {
        &self.seq
    }

    /// Runs one simplification stage at `k`: builds the bifurcation index,
    /// then up to `max_iterations` bulge removal passes. Returns the number
    /// of collapsed bulges.
    pub fn perform_graph_simplifications(
        &mut self,
        k: usize,
        min_branch_size: usize,
        max_iterations: usize,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<usize> {
        if k < 2 {
            return Err(Error::InvalidParameter(format!("k must be at least 2, got {k}")));
        }
        if max_iterations < 1 {
            return Err(Error::InvalidParameter(
                "at least one simplification iteration is required".into(),
            ));
        }
        let mut progress = Progress::new(progress);
        let mut index = build_index(&self.seq, k, &mut progress);
        info!(k, vertices = index.vertex_count(), "bifurcation index built");
        let collapsed = simplify_stage(
            &mut self.seq,
            &mut index,
            min_branch_size,
            max_iterations,
            &mut progress,
        );
        info!(k, collapsed, "simplification stage finished");
        Ok(collapsed)
    }

    /// Enumerates the simplified graph at `k` and assembles synteny blocks on
    /// original input coordinates.
    pub fn generate_synteny_blocks(
        &self,
        k: usize,
        trim_k: usize,
        min_size: usize,
        shared_only: bool,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<BlockInstance>> {
        if k < 2 {
            return Err(Error::InvalidParameter(format!("k must be at least 2, got {k}")));
        }
        if min_size < 1 {
            return Err(Error::InvalidParameter("minimum block size must be positive".into()));
        }
        let mut progress = Progress::new(progress);
        let index = build_index(&self.seq, k, &mut progress);
        let edges = list_edges(&self.seq, &index, &mut progress);
        self.verify_edges(&edges)?;
        let options = BlockOptions { trim_k, min_size, shared_only };
        Ok(assemble_blocks(&index, edges, self.records.len(), &options))
    }

    /// Dumps the condensed de Bruijn graph at `k` in dot format.
    pub fn serialize_condensed_graph(
        &self,
        k: usize,
        out: &mut dyn Write,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<()> {
        if k < 2 {
            return Err(Error::InvalidParameter(format!("k must be at least 2, got {k}")));
        }
        let mut progress = Progress::new(progress);
        let index = build_index(&self.seq, k, &mut progress);
        let edges = list_edges(&self.seq, &index, &mut progress);

        let mut graph: DiGraph<String, String> = DiGraph::new();
        let mut nodes = ahash::AHashMap::new();
        for edge in &edges {
            for vertex in [edge.start_vertex, edge.end_vertex] {
                nodes
                    .entry(vertex)
                    .or_insert_with(|| graph.add_node(format!("v{vertex}")));
            }
        }
        for edge in &edges {
            let sign = if edge.direction == Strand::Positive { '+' } else { '-' };
            graph.add_edge(
                nodes[&edge.start_vertex],
                nodes[&edge.end_vertex],
                format!(
                    "chr{} {sign} [{}, {})",
                    edge.chr + 1,
                    edge.actual_position,
                    edge.actual_position + edge.actual_length
                ),
            );
        }
        write!(out, "{}", petgraph::dot::Dot::new(&graph))?;
        Ok(())
    }

    /// Internal consistency check on enumerated edges; a failure means the
    /// index and the sequence store disagree and no blocks can be trusted.
    fn verify_edges(&self, edges: &[Edge]) -> Result<()> {
        for edge in edges {
            let record_len = self.records[edge.chr].sequence.len();
            if edge.original_length == 0
                || edge.original_position + edge.original_length > record_len
            {
                return Err(Error::Corruption(format!(
                    "edge on chromosome {} maps to original range [{}, {}) outside 0..{}",
                    edge.chr + 1,
                    edge.original_position,
                    edge.original_position + edge.original_length,
                    record_len
                )));
            }
            if edge.actual_length > self.seq.chromosome_len(edge.chr) {
                return Err(Error::Corruption(format!(
                    "edge on chromosome {} is longer than the chromosome",
                    edge.chr + 1
                )));
            }
        }
        Ok(())
    }
}

fn validate_records(records: &[FastaRecord]) -> Result<()> {
    let total: u64 = records.iter().map(|r| r.sequence.len() as u64).sum();
    if total > MAX_INPUT_SIZE {
        return Err(Error::InputTooLarge { limit: MAX_INPUT_SIZE });
    }
    for record in records {
        if let Some(pos) = record.sequence.iter().position(|&b| !is_valid_input(b)) {
            return Err(Error::InvalidParameter(format!(
                "record '{}' contains invalid character '{}' at position {pos}",
                record.description, record.sequence[pos] as char
            )));
        }
    }
    Ok(())
}
