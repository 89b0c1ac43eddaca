//! Pipeline layer: the block finder engine and the CLI-facing driver.

pub mod finder;
pub mod synteny;
