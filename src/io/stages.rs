use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};

/// One simplification stage: the k-mer size and the longest alternative
/// branch that may be collapsed at that k.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub k: usize,
    pub min_branch_size: usize,
}

impl Stage {
    pub fn new(k: usize, min_branch_size: usize) -> Self {
        Stage { k, min_branch_size }
    }
}

/// Fewer, larger blocks.
pub fn loose() -> Vec<Stage> {
    vec![
        Stage::new(30, 150),
        Stage::new(100, 1000),
        Stage::new(1000, 5000),
        Stage::new(5000, 15000),
    ]
}

/// More, smaller blocks.
pub fn fine() -> Vec<Stage> {
    vec![Stage::new(30, 150), Stage::new(100, 500), Stage::new(500, 1500)]
}

/// For distant genomes: the fine schedule continued to larger scales.
pub fn far() -> Vec<Stage> {
    vec![
        Stage::new(30, 150),
        Stage::new(100, 500),
        Stage::new(500, 1500),
        Stage::new(1500, 5000),
        Stage::new(5000, 15000),
    ]
}

/// Looks up a named parameter set.
pub fn preset(name: &str) -> Option<Vec<Stage>> {
    match name {
        "loose" => Some(loose()),
        "fine" => Some(fine()),
        "far" => Some(far()),
        _ => None,
    }
}

fn parse_stage_line(line: &str, line_no: usize) -> Result<Stage> {
    let mut fields = line.split_whitespace();
    let bad = |what: &str| {
        Error::InvalidParameter(format!("stage file line {line_no}: {what}"))
    };
    let k: usize = fields
        .next()
        .ok_or_else(|| bad("missing k"))?
        .parse()
        .map_err(|_| bad("k is not a positive integer"))?;
    let min_branch_size: usize = fields
        .next()
        .ok_or_else(|| bad("missing minimum branch size"))?
        .parse()
        .map_err(|_| bad("minimum branch size is not a positive integer"))?;
    if fields.next().is_some() {
        return Err(bad("expected exactly two fields"));
    }
    if k < 2 {
        return Err(bad("k must be at least 2"));
    }
    if min_branch_size < 1 {
        return Err(bad("minimum branch size must be at least 1"));
    }
    Ok(Stage { k, min_branch_size })
}

/// Parses a stage file: one `k minBranchSize` pair per line, `#` comments
/// and blank lines ignored.
pub fn read_stage_file(path: &Path) -> Result<Vec<Stage>> {
    let file = File::open(path).map_err(|_| Error::MissingFile(path.to_path_buf()))?;
    let mut stages = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        stages.push(parse_stage_line(line, i + 1)?);
    }
    if stages.is_empty() {
        return Err(Error::InvalidParameter(format!(
            "stage file {} contains no stages",
            path.display()
        )));
    }
    Ok(stages)
}
