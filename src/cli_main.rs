use std::path::PathBuf;

use clap::{Parser, Subcommand};

use kestrel::error::{Error, Result};
use kestrel::io::stages::{preset, read_stage_file, Stage};
use kestrel::pipeline::synteny::{dump_graph, find_blocks, FindOptions, GraphOptions};

#[derive(Parser, Debug)]
#[command(
    name = "kestrel",
    version,
    about = "Finds synteny blocks in closely related genomes",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find synteny blocks across the input genomes
    Find {
        /// FASTA file(s) with nucleotide sequences, plain or gzipped
        #[arg(required = true)]
        filenames: Vec<PathBuf>,

        /// Directory where output files are written
        #[arg(short, long, default_value = ".")]
        outdir: PathBuf,

        /// Named simplification parameter set: loose, fine or far
        #[arg(short = 's', long, default_value = "loose", conflicts_with = "stagefile")]
        parameters: String,

        /// File with manually chosen simplification parameters, one
        /// "k minBranchSize" pair per line
        #[arg(short = 'k', long)]
        stagefile: Option<PathBuf>,

        /// Minimum size of a synteny block in base pairs
        #[arg(short, long, default_value_t = 5000)]
        minblocksize: usize,

        /// Maximum number of iterations during one simplification stage
        #[arg(short = 'i', long, default_value_t = 4)]
        maxiterations: usize,

        /// Output only blocks that occur on every input sequence
        #[arg(short = 'a', long)]
        sharedonly: bool,

        /// Value of k used for the final block enumeration
        #[arg(long)]
        lastk: Option<usize>,

        /// Directory where temporary files are stored
        #[arg(short, long)]
        tempdir: Option<PathBuf>,

        /// Perform all computations in RAM, don't create temp files
        #[arg(short = 'r', long)]
        inram: bool,

        /// Output coordinates of synteny blocks from all stages
        #[arg(long)]
        allstages: bool,

        /// Output the condensed de Bruijn graph in dot format
        #[arg(short = 'g', long)]
        graphfile: bool,

        /// Output sequences of synteny blocks in FASTA format
        #[arg(short = 'q', long)]
        sequencesfile: bool,

        /// Also write block coordinates as JSON
        #[arg(long)]
        json: bool,

        /// Number of threads to use
        #[arg(long, default_value_t = num_cpus::get())]
        threads: usize,
    },

    /// Export the condensed de Bruijn graph after simplification
    Graph {
        /// FASTA file(s) with nucleotide sequences, plain or gzipped
        #[arg(required = true)]
        filenames: Vec<PathBuf>,

        /// Output dot file
        #[arg(short, long, default_value = "de_bruijn_graph.dot")]
        output: PathBuf,

        /// Named simplification parameter set: loose, fine or far
        #[arg(short = 's', long, default_value = "loose", conflicts_with = "stagefile")]
        parameters: String,

        /// File with manually chosen simplification parameters
        #[arg(short = 'k', long)]
        stagefile: Option<PathBuf>,

        /// Maximum number of iterations during one simplification stage
        #[arg(short = 'i', long, default_value_t = 4)]
        maxiterations: usize,

        /// Value of k used for the graph dump
        #[arg(long)]
        lastk: Option<usize>,

        /// Number of threads to use
        #[arg(long, default_value_t = num_cpus::get())]
        threads: usize,
    },
}

fn resolve_stages(parameters: &str, stagefile: &Option<PathBuf>) -> Result<Vec<Stage>> {
    match stagefile {
        Some(path) => read_stage_file(path),
        None => preset(parameters).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "unknown parameter set '{parameters}', expected loose, fine or far"
            ))
        }),
    }
}

fn init_thread_pool(threads: usize) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .map_err(|e| Error::InvalidParameter(format!("thread pool: {e}")))
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Find {
            filenames,
            outdir,
            parameters,
            stagefile,
            minblocksize,
            maxiterations,
            sharedonly,
            lastk,
            tempdir,
            inram,
            allstages,
            graphfile,
            sequencesfile,
            json,
            threads,
        } => {
            init_thread_pool(threads)?;
            let stages = resolve_stages(&parameters, &stagefile)?;
            let temp_dir = if inram {
                None
            } else {
                Some(tempdir.unwrap_or_else(|| outdir.clone()))
            };
            let options = FindOptions {
                inputs: filenames,
                out_dir: outdir,
                stages,
                min_block_size: minblocksize,
                max_iterations: maxiterations,
                shared_only: sharedonly,
                last_k: lastk,
                temp_dir,
                all_stages: allstages,
                graph_file: graphfile,
                sequences_file: sequencesfile,
                json,
            };
            find_blocks(&options)?;
            Ok(())
        }
        Commands::Graph {
            filenames,
            output,
            parameters,
            stagefile,
            maxiterations,
            lastk,
            threads,
        } => {
            init_thread_pool(threads)?;
            let stages = resolve_stages(&parameters, &stagefile)?;
            let options = GraphOptions {
                inputs: filenames,
                output,
                stages,
                max_iterations: maxiterations,
                last_k: lastk,
            };
            dump_graph(&options)
        }
    }
}
