//! End-to-end driver behind the CLI: read inputs, run the stage schedule,
//! assemble blocks, write reports.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::graph::block::BlockInstance;
use crate::io::fasta::read_fasta_files;
use crate::io::report;
use crate::io::stages::Stage;
use crate::pipeline::finder::BlockFinder;
use crate::progress::ProgressState;

#[derive(Debug, Clone)]
pub struct FindOptions {
    pub inputs: Vec<PathBuf>,
    pub out_dir: PathBuf,
    pub stages: Vec<Stage>,
    pub min_block_size: usize,
    pub max_iterations: usize,
    pub shared_only: bool,
    pub last_k: Option<usize>,
    /// None keeps the input backup in RAM; Some spills it under this dir.
    pub temp_dir: Option<PathBuf>,
    pub all_stages: bool,
    pub graph_file: bool,
    pub sequences_file: bool,
    pub json: bool,
}

/// Console progress: a bracketed dot bar per enumeration pass.
pub fn console_progress(percent: usize, state: ProgressState) {
    match state {
        ProgressState::Start => print!("["),
        ProgressState::Run => {
            if percent % 4 == 0 {
                print!(".");
            }
        }
        ProgressState::End => println!("]"),
    }
    let _ = std::io::stdout().flush();
}

/// Runs the whole pipeline. Returns the final block list.
pub fn find_blocks(options: &FindOptions) -> Result<Vec<BlockInstance>> {
    let (records, reference_count) = read_fasta_files(&options.inputs)?;
    let total_bases: usize = records.iter().map(|r| r.sequence.len()).sum();
    info!(
        records = records.len(),
        reference_records = reference_count,
        total_bases,
        "input loaded"
    );
    std::fs::create_dir_all(&options.out_dir)?;

    let mut finder = match &options.temp_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            BlockFinder::with_temp_dir(records, dir)?
        }
        None => BlockFinder::new(records)?,
    };

    let mut trim_k = usize::MAX;
    let mut history: Vec<Vec<BlockInstance>> = Vec::new();
    let stage_count = options.stages.len();
    for (i, stage) in options.stages.iter().enumerate() {
        trim_k = trim_k.min(stage.k);
        if options.all_stages {
            let blocks = finder.generate_synteny_blocks(
                stage.k,
                trim_k,
                stage.k,
                options.shared_only,
                Some(&mut console_progress),
            )?;
            history.push(blocks);
        }
        println!("Simplification stage {} of {stage_count}", i + 1);
        println!("Enumerating vertices of the graph, then performing bulge removal...");
        finder.perform_graph_simplifications(
            stage.k,
            stage.min_branch_size,
            options.max_iterations,
            Some(&mut console_progress),
        )?;
    }

    println!("Finding synteny blocks and generating the output...");
    let trim_k = trim_k.min(options.min_block_size);
    let last_k = options.last_k.unwrap_or_else(|| {
        options
            .stages
            .last()
            .map(|s| s.k)
            .unwrap_or(usize::MAX)
            .min(options.min_block_size)
    });
    let blocks = finder.generate_synteny_blocks(
        last_k,
        trim_k,
        options.min_block_size,
        options.shared_only,
        Some(&mut console_progress),
    )?;

    write_reports(&finder, &blocks, &history, last_k, options)?;
    info!(blocks = blocks.len(), "done");
    Ok(blocks)
}

#[derive(Debug, Clone)]
pub struct GraphOptions {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub stages: Vec<Stage>,
    pub max_iterations: usize,
    pub last_k: Option<usize>,
}

/// Runs the stage schedule and writes the condensed de Bruijn graph in dot
/// format, without computing blocks.
pub fn dump_graph(options: &GraphOptions) -> Result<()> {
    let (records, _) = read_fasta_files(&options.inputs)?;
    let mut finder = BlockFinder::new(records)?;
    let stage_count = options.stages.len();
    for (i, stage) in options.stages.iter().enumerate() {
        println!("Simplification stage {} of {stage_count}", i + 1);
        finder.perform_graph_simplifications(
            stage.k,
            stage.min_branch_size,
            options.max_iterations,
            Some(&mut console_progress),
        )?;
    }
    let last_k = options
        .last_k
        .or_else(|| options.stages.last().map(|s| s.k))
        .unwrap_or(2);
    let mut writer = BufWriter::new(File::create(&options.output)?);
    finder.serialize_condensed_graph(last_k, &mut writer, Some(&mut console_progress))?;
    writer.flush()?;
    Ok(())
}

fn write_reports(
    finder: &BlockFinder,
    blocks: &[BlockInstance],
    history: &[Vec<BlockInstance>],
    last_k: usize,
    options: &FindOptions,
) -> Result<()> {
    let out = |name: &str| options.out_dir.join(name);

    report::write_blocks_coords(finder.records(), blocks, &out("blocks_coords.txt"))?;
    report::write_coverage_report(finder.records(), blocks, &out("coverage_report.txt"))?;
    if options.json {
        report::write_blocks_json(finder.records(), blocks, &out("blocks_coords.json"))?;
    }
    if options.sequences_file {
        report::write_blocks_sequences(finder.backup(), blocks, &out("blocks_sequences.fasta"))?;
    }
    if options.all_stages {
        for (i, stage_blocks) in history.iter().enumerate() {
            let name = format!("blocks_coords{i}.txt");
            report::write_blocks_coords(finder.records(), stage_blocks, &out(&name))?;
        }
    }
    if options.graph_file {
        let mut writer = BufWriter::new(File::create(out("de_bruijn_graph.dot"))?);
        finder.serialize_condensed_graph(last_k, &mut writer, Some(&mut console_progress))?;
        writer.flush()?;
    }
    Ok(())
}
