use std::path::PathBuf;

/// Crate-wide error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("input is larger than {limit} bytes, can't proceed")]
    InputTooLarge { limit: u64 },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot open file {0}")]
    MissingFile(PathBuf),
    #[error("internal invariant violated: {0}")]
    Corruption(String),
}

pub type Result<T> = std::result::Result<T, Error>;
