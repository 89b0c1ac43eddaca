//! Canonical k-mer fingerprints.
//!
//! A window and its reverse complement must land on the same fingerprint, so
//! the hash is `min(hash(forward), hash(reverse complement))` over normalized
//! bytes, with the winning orientation recorded as the window's *sense*.
//! Hashes are not trusted alone: callers resolve collisions with a secondary
//! content comparison (see `BifurcationIndex`).

use ahash::RandomState;

use crate::seq::nucleotide::{complement, is_definite, normalize};
use crate::seq::store::{Cursor, DnaSequence};

/// Fixed seeds so fingerprints are reproducible across runs.
const SEED: (u64, u64, u64, u64) = (0x6b65_7374, 0x7265_6c31, 0x9e37_79b9, 0x85eb_ca6b);

/// Orientation of a window relative to its canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// The window spells the canonical form.
    Forward,
    /// The window spells the reverse complement of the canonical form.
    Reverse,
}

impl Sense {
    pub fn flip(self) -> Sense {
        match self {
            Sense::Forward => Sense::Reverse,
            Sense::Reverse => Sense::Forward,
        }
    }
}

/// Canonical fingerprint of one k-length window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: u64,
    pub sense: Sense,
}

fn hasher() -> RandomState {
    RandomState::with_seeds(SEED.0, SEED.1, SEED.2, SEED.3)
}

fn hash_bytes(bytes: &[u8]) -> u64 {
    hasher().hash_one(bytes)
}

/// Fingerprints the window starting at `cursor`. Returns None when the
/// window crosses a record boundary or contains an indefinite base (`N`),
/// which by construction never matches anything.
///
/// `buf` and `rc_buf` are scratch space reused across calls.
pub fn fingerprint_window(
    seq: &DnaSequence,
    cursor: Cursor,
    k: usize,
    buf: &mut Vec<u8>,
    rc_buf: &mut Vec<u8>,
) -> Option<Fingerprint> {
    if !seq.window(cursor, k, buf) {
        return None;
    }
    for ch in buf.iter_mut() {
        if !is_definite(*ch) {
            return None;
        }
        *ch = normalize(*ch);
    }
    rc_buf.clear();
    rc_buf.extend(buf.iter().rev().map(|&b| complement(b)));

    let forward = hash_bytes(buf);
    let reverse = hash_bytes(rc_buf);
    if forward <= reverse {
        Some(Fingerprint { hash: forward, sense: Sense::Forward })
    } else {
        Some(Fingerprint { hash: reverse, sense: Sense::Reverse })
    }
}

/// Normalized canonical spelling for a window already read into `buf`.
pub fn canonical_bytes(buf: &[u8], sense: Sense) -> Vec<u8> {
    match sense {
        Sense::Forward => buf.iter().map(|&b| normalize(b)).collect(),
        Sense::Reverse => buf.iter().rev().map(|&b| complement(normalize(b))).collect(),
    }
}

/// Cursor reading the same physical window from the opposite strand: it
/// starts at the window's last node with the strand flipped, so its k
/// characters are the reverse complement of the original window.
pub fn flip_window(seq: &DnaSequence, cursor: Cursor, k: usize) -> Cursor {
    let mut c = cursor;
    for _ in 0..k - 1 {
        c = seq.advance(c);
    }
    Cursor::new(c.node, c.strand.flip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::store::Strand;

    fn store(records: &[&str]) -> DnaSequence {
        DnaSequence::new(&records.iter().map(|r| r.as_bytes().to_vec()).collect::<Vec<_>>())
    }

    #[test]
    fn test_fingerprint_matches_reverse_complement() {
        // GACCT on the forward strand; AGGTC is its reverse complement.
        let seq = store(&["GACCT", "AGGTC"]);
        let mut buf = Vec::new();
        let mut rc = Vec::new();
        let a = fingerprint_window(&seq, seq.begin(0, Strand::Positive), 5, &mut buf, &mut rc)
            .unwrap();
        let b = fingerprint_window(&seq, seq.begin(1, Strand::Positive), 5, &mut buf, &mut rc)
            .unwrap();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.sense, b.sense.flip());
    }

    #[test]
    fn test_fingerprint_ignores_case() {
        let seq = store(&["gAcCt", "GACCT"]);
        let mut buf = Vec::new();
        let mut rc = Vec::new();
        let a = fingerprint_window(&seq, seq.begin(0, Strand::Positive), 5, &mut buf, &mut rc)
            .unwrap();
        let b = fingerprint_window(&seq, seq.begin(1, Strand::Positive), 5, &mut buf, &mut rc)
            .unwrap();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.sense, b.sense);
    }

    #[test]
    fn test_indefinite_bases_have_no_fingerprint() {
        let seq = store(&["ACNGT"]);
        let mut buf = Vec::new();
        let mut rc = Vec::new();
        assert!(fingerprint_window(&seq, seq.begin(0, Strand::Positive), 5, &mut buf, &mut rc)
            .is_none());
    }

    #[test]
    fn test_flip_window_reads_reverse_complement() {
        let seq = store(&["GACCTAA"]);
        let start = seq.begin(0, Strand::Positive);
        let flipped = flip_window(&seq, start, 5);
        let mut buf = Vec::new();
        assert!(seq.window(flipped, 5, &mut buf));
        assert_eq!(buf, b"AGGTC");
    }

    #[test]
    fn test_both_strand_views_share_a_fingerprint() {
        let seq = store(&["GACCTAA"]);
        let mut buf = Vec::new();
        let mut rc = Vec::new();
        let fwd = fingerprint_window(&seq, seq.begin(0, Strand::Positive), 5, &mut buf, &mut rc)
            .unwrap();
        // The same physical window seen from the negative strand.
        let flipped = flip_window(&seq, seq.begin(0, Strand::Positive), 5);
        let rev = fingerprint_window(&seq, flipped, 5, &mut buf, &mut rc).unwrap();
        assert_eq!(fwd.hash, rev.hash);
        assert_eq!(fwd.sense, rev.sense.flip());
    }
}
