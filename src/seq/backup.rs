//! Immutable backup of the raw input records.
//!
//! The working sequence gets rewritten during simplification, but block
//! sequences and coverage reports need the original characters. Small inputs
//! keep the backup in memory; large runs can spill it to a scoped temporary
//! directory and read it back through a memory map. The directory is removed
//! when the backup is dropped, on every exit path.

use std::fs::File;
use std::io::{BufWriter, Write};

use memmap2::Mmap;
use std::path::Path;
use tempfile::TempDir;

use crate::error::Result;

#[derive(Debug)]
pub enum SequenceBackup {
    InRam {
        records: Vec<Vec<u8>>,
    },
    Spilled {
        _dir: TempDir,
        map: Mmap,
        spans: Vec<(usize, usize)>,
    },
}

impl SequenceBackup {
    pub fn in_ram(records: Vec<Vec<u8>>) -> Self {
        SequenceBackup::InRam { records }
    }

    /// Writes the records to an append-only file in a fresh temp directory
    /// under `parent` and maps it read-only.
    pub fn spilled(records: &[Vec<u8>], parent: &Path) -> Result<Self> {
        let total: usize = records.iter().map(|r| r.len()).sum();
        if total == 0 {
            // Nothing to map; an empty file cannot be.
            return Ok(SequenceBackup::in_ram(records.to_vec()));
        }
        let dir = tempfile::Builder::new().prefix("kestrel-").tempdir_in(parent)?;
        let path = dir.path().join("sequence.bin");
        let mut spans = Vec::with_capacity(records.len());
        let mut offset = 0usize;
        {
            let mut out = BufWriter::new(File::create(&path)?);
            for record in records {
                out.write_all(record)?;
                spans.push((offset, record.len()));
                offset += record.len();
            }
            out.flush()?;
        }
        let file = File::open(&path)?;
        let map = unsafe { Mmap::map(&file)? };
        Ok(SequenceBackup::Spilled { _dir: dir, map, spans })
    }

    pub fn record_count(&self) -> usize {
        match self {
            SequenceBackup::InRam { records } => records.len(),
            SequenceBackup::Spilled { spans, .. } => spans.len(),
        }
    }

    pub fn record_len(&self, chr: usize) -> usize {
        match self {
            SequenceBackup::InRam { records } => records[chr].len(),
            SequenceBackup::Spilled { spans, .. } => spans[chr].1,
        }
    }

    /// Original characters of `chr` in `start..end`.
    pub fn slice(&self, chr: usize, start: usize, end: usize) -> &[u8] {
        match self {
            SequenceBackup::InRam { records } => &records[chr][start..end],
            SequenceBackup::Spilled { map, spans, .. } => {
                let (offset, len) = spans[chr];
                debug_assert!(end <= len);
                &map[offset + start..offset + end]
            }
        }
    }
}
