//! K-mer processing: canonical fingerprints over both strands.

pub mod fingerprint;
