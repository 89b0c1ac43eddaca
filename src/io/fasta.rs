use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{Error, Result};

/// One input genome. Ids are assigned across all files in reading order; the
/// first file defines the reference chromosome set.
#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: usize,
    pub description: String,
    pub sequence: Vec<u8>,
}

/// Open a FASTA file for reading, handles gzipped files automatically.
pub fn open_fasta(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|_| Error::MissingFile(path.to_path_buf()))?;
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Appends all records from one file, continuing the shared id space.
pub fn read_fasta_into(path: &Path, records: &mut Vec<FastaRecord>) -> Result<()> {
    let reader = open_fasta(path)?;
    let mut current: Option<FastaRecord> = None;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            if let Some(record) = current.take() {
                records.push(record);
            }
            current = Some(FastaRecord {
                id: records.len(),
                description: header.trim().to_string(),
                sequence: Vec::new(),
            });
        } else {
            match current.as_mut() {
                Some(record) => record.sequence.extend(
                    line.bytes().filter(|b| !b.is_ascii_whitespace()),
                ),
                None => {
                    return Err(Error::InvalidParameter(format!(
                        "{}: sequence data before the first FASTA header",
                        path.display()
                    )))
                }
            }
        }
    }
    if let Some(record) = current.take() {
        records.push(record);
    }
    Ok(())
}

/// Reads several FASTA files into one record list with a shared id space.
/// Returns the records and the number of records in the first file (the
/// reference set).
pub fn read_fasta_files(paths: &[impl AsRef<Path>]) -> Result<(Vec<FastaRecord>, usize)> {
    let mut records = Vec::new();
    let mut reference_count = 0;
    for (i, path) in paths.iter().enumerate() {
        read_fasta_into(path.as_ref(), &mut records)?;
        if i == 0 {
            reference_count = records.len();
        }
    }
    Ok((records, reference_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_reads_multi_record_fasta() {
        let file = write_temp(">chr1 first\nACGT\nACGT\n>chr2\nTTTT\n");
        let mut records = Vec::new();
        read_fasta_into(file.path(), &mut records).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 0);
        assert_eq!(records[0].description, "chr1 first");
        assert_eq!(records[0].sequence, b"ACGTACGT");
        assert_eq!(records[1].id, 1);
        assert_eq!(records[1].sequence, b"TTTT");
    }

    #[test]
    fn test_rejects_headerless_data() {
        let file = write_temp("ACGT\n");
        let mut records = Vec::new();
        assert!(read_fasta_into(file.path(), &mut records).is_err());
    }

    #[test]
    fn test_missing_file_error() {
        let mut records = Vec::new();
        let err = read_fasta_into(Path::new("/no/such/file.fa"), &mut records).unwrap_err();
        assert!(matches!(err, Error::MissingFile(_)));
    }

    #[test]
    fn test_reference_count_covers_first_file_only() {
        let a = write_temp(">a\nACGT\n>b\nACGT\n");
        let b = write_temp(">c\nACGT\n");
        let (records, reference) =
            read_fasta_files(&[a.path().to_path_buf(), b.path().to_path_buf()]).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(reference, 2);
        assert_eq!(records[2].id, 2);
    }
}
