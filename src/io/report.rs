//! Block report writers: the tabular coordinates listing, a JSON variant,
//! block sequences in FASTA, and a coverage summary.
//!
//! Coordinates in the tabular report are "conventional": 1-based inclusive,
//! with start and end swapped for instances on the negative strand.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::graph::block::BlockInstance;
use crate::io::fasta::FastaRecord;
use crate::seq::backup::SequenceBackup;
use crate::seq::nucleotide::reverse_complement;

const DELIMITER: &str =
    "--------------------------------------------------------------------------------";
const FASTA_WIDTH: usize = 80;

fn conventional(instance: &BlockInstance) -> (usize, usize) {
    if instance.direction >= 0 {
        (instance.start + 1, instance.end)
    } else {
        (instance.end, instance.start + 1)
    }
}

/// Groups instances by |block id|, ids ascending, instances by chromosome.
fn grouped(blocks: &[BlockInstance]) -> Vec<(u64, Vec<&BlockInstance>)> {
    let mut ids: Vec<u64> = blocks.iter().map(|b| b.block_id()).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.into_iter()
        .map(|id| {
            let mut instances: Vec<&BlockInstance> =
                blocks.iter().filter(|b| b.block_id() == id).collect();
            instances.sort_by_key(|b| (b.chr, b.start));
            (id, instances)
        })
        .collect()
}

/// The `blocks_coords` tabular listing: a chromosome table followed by one
/// instance table per block.
pub fn write_blocks_coords(
    records: &[FastaRecord],
    blocks: &[BlockInstance],
    path: &Path,
) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "Seq_id\tSize\tDescription")?;
    for record in records {
        writeln!(out, "{}\t{}\t{}", record.id + 1, record.sequence.len(), record.description)?;
    }
    writeln!(out, "{DELIMITER}")?;
    for (id, instances) in grouped(blocks) {
        writeln!(out, "Block #{id}")?;
        writeln!(out, "Seq_id\tStrand\tStart\tEnd\tLength")?;
        for instance in instances {
            let strand = if instance.direction >= 0 { '+' } else { '-' };
            let (start, end) = conventional(instance);
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                instance.chr + 1,
                strand,
                start,
                end,
                instance.length()
            )?;
        }
        writeln!(out, "{DELIMITER}")?;
    }
    out.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonSequence<'a> {
    id: usize,
    description: &'a str,
    length: usize,
}

#[derive(Serialize)]
struct JsonBlock<'a> {
    block_id: u64,
    instances: Vec<&'a BlockInstance>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    sequences: Vec<JsonSequence<'a>>,
    blocks: Vec<JsonBlock<'a>>,
}

/// Same content as the tabular listing, as JSON.
pub fn write_blocks_json(
    records: &[FastaRecord],
    blocks: &[BlockInstance],
    path: &Path,
) -> Result<()> {
    let report = JsonReport {
        sequences: records
            .iter()
            .map(|r| JsonSequence {
                id: r.id + 1,
                description: &r.description,
                length: r.sequence.len(),
            })
            .collect(),
        blocks: grouped(blocks)
            .into_iter()
            .map(|(block_id, instances)| JsonBlock { block_id, instances })
            .collect(),
    };
    let out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(out, &report).map_err(std::io::Error::from)?;
    Ok(())
}

/// FASTA of every block instance's original sequence, reverse-complemented
/// for instances on the negative strand. Reads through the input backup.
pub fn write_blocks_sequences(
    backup: &SequenceBackup,
    blocks: &[BlockInstance],
    path: &Path,
) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for (id, instances) in grouped(blocks) {
        for instance in instances {
            let (start, end) = conventional(instance);
            writeln!(
                out,
                ">Block_{id}_Seq_{}_Strand_{}_[{start}..{end}]",
                instance.chr + 1,
                if instance.direction >= 0 { '+' } else { '-' },
            )?;
            let raw = backup.slice(instance.chr, instance.start, instance.end);
            let sequence = if instance.direction >= 0 {
                raw.to_vec()
            } else {
                reverse_complement(raw)
            };
            for chunk in sequence.chunks(FASTA_WIDTH) {
                out.write_all(chunk)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// Per-chromosome and total base coverage by blocks.
pub fn write_coverage_report(
    records: &[FastaRecord],
    blocks: &[BlockInstance],
    path: &Path,
) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    let groups = grouped(blocks);
    writeln!(out, "Blocks found: {}", groups.len())?;
    writeln!(out, "Seq_id\tSize\tCovered\tPercent")?;
    let mut total_size = 0usize;
    let mut total_covered = 0usize;
    for record in records {
        let mut intervals: Vec<(usize, usize)> = blocks
            .iter()
            .filter(|b| b.chr == record.id)
            .map(|b| (b.start, b.end))
            .collect();
        intervals.sort_unstable();
        let mut covered = 0usize;
        let mut watermark = 0usize;
        for (start, end) in intervals {
            let start = start.max(watermark);
            if end > start {
                covered += end - start;
                watermark = end;
            }
        }
        let size = record.sequence.len();
        let percent = if size == 0 { 0.0 } else { covered as f64 * 100.0 / size as f64 };
        writeln!(out, "{}\t{}\t{}\t{:.2}", record.id + 1, size, covered, percent)?;
        total_size += size;
        total_covered += covered;
    }
    let percent = if total_size == 0 {
        0.0
    } else {
        total_covered as f64 * 100.0 / total_size as f64
    };
    writeln!(out, "Total\t{total_size}\t{total_covered}\t{percent:.2}")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Vec<FastaRecord>, Vec<BlockInstance>) {
        let records = vec![
            FastaRecord { id: 0, description: "first".into(), sequence: b"ACGTACGTAC".to_vec() },
            FastaRecord { id: 1, description: "second".into(), sequence: b"GGGGACGTAC".to_vec() },
        ];
        let blocks = vec![
            BlockInstance { signed_block_id: 1, chr: 0, direction: 1, start: 0, end: 6 },
            BlockInstance { signed_block_id: -1, chr: 1, direction: -1, start: 4, end: 10 },
        ];
        (records, blocks)
    }

    #[test]
    fn test_coords_report_format() {
        let (records, blocks) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks_coords.txt");
        write_blocks_coords(&records, &blocks, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Block #1"));
        // Positive strand: 1-based inclusive. Negative strand: swapped.
        assert!(text.contains("1\t+\t1\t6\t6"));
        assert!(text.contains("2\t-\t10\t5\t6"));
    }

    #[test]
    fn test_sequences_report_reverse_complements() {
        let (records, blocks) = sample();
        let backup = SequenceBackup::in_ram(records.iter().map(|r| r.sequence.clone()).collect());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks_sequences.fasta");
        write_blocks_sequences(&backup, &blocks, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        // chr0 [0,6) forward.
        assert!(text.contains("ACGTAC"));
        // chr1 [4,10) = ACGTAC, reverse complement GTACGT.
        assert!(text.contains("GTACGT"));
    }

    #[test]
    fn test_coverage_report_totals() {
        let (records, blocks) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage_report.txt");
        write_coverage_report(&records, &blocks, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Blocks found: 1"));
        assert!(text.contains("Total\t20\t12\t60.00"));
    }

    #[test]
    fn test_json_report_round_trips() {
        let (records, blocks) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks_coords.json");
        write_blocks_json(&records, &blocks, &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["blocks"][0]["block_id"], 1);
        assert_eq!(value["sequences"].as_array().unwrap().len(), 2);
    }
}
