//! Input and output collaborators around the core: FASTA reading, stage
//! parameter lists, and block reports.

pub mod fasta;
pub mod report;
pub mod stages;
