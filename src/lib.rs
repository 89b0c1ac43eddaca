//! Kestrel finds synteny blocks in closely related genomes.
//!
//! The engine builds a de Bruijn graph over all input sequences and both
//! strands, repeatedly collapses *bulges* (short alternative paths between
//! the same pair of branching vertices) over a schedule of growing k values,
//! and reports the maximal shared paths of the simplified graph as oriented
//! blocks with coordinates on the original inputs.
//!
//! See [`pipeline::finder::BlockFinder`] for the engine,
//! [`pipeline::synteny::find_blocks`] for the end-to-end driver used by the
//! CLI, and [`graph::block::BlockInstance`] for the output records.

pub mod error;
pub mod graph;
pub mod io;
pub mod kmer;
pub mod pipeline;
pub mod progress;
pub mod seq;

pub use error::{Error, Result};
pub use graph::block::{BlockInstance, BlockOptions};
pub use io::fasta::FastaRecord;
pub use io::stages::Stage;
pub use pipeline::finder::BlockFinder;
pub use progress::ProgressState;
