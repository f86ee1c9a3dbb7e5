//! FASTA alignments and their reduction to parsimony-informative columns.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::{Result, WalkError};
use crate::io::open_reader;

/// A multiple sequence alignment, sequences upper-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    names: Vec<String>,
    sequences: Vec<Vec<u8>>,
    by_name: HashMap<String, usize>,
}

impl Alignment {
    pub fn from_fasta<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        Self::read_fasta(open_reader(p)?, p)
    }

    /// Parse FASTA from any reader; `source` only labels errors.
    pub fn read_fasta<R: BufRead>(reader: R, source: &Path) -> Result<Self> {
        let malformed = |reason: String| WalkError::MalformedAlignment {
            path: source.to_path_buf(),
            reason,
        };

        let mut alignment = Alignment::default();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| WalkError::io(source, e))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix('>') {
                // The name is the first word of the header
                let name = header.split_whitespace().next().unwrap_or_default().to_owned();
                if name.is_empty() {
                    return Err(malformed(format!("line {}: empty sequence name", i + 1)));
                }
                if alignment.by_name.contains_key(&name) {
                    return Err(malformed(format!("duplicate sequence name {name:?}")));
                }
                alignment.by_name.insert(name.clone(), alignment.names.len());
                alignment.names.push(name);
                alignment.sequences.push(Vec::new());
            } else {
                let Some(seq) = alignment.sequences.last_mut() else {
                    return Err(malformed(format!("line {}: sequence data before first header", i + 1)));
                };
                seq.extend(line.bytes().filter(|b| !b.is_ascii_whitespace()).map(|b| b.to_ascii_uppercase()));
            }
        }

        if let Some(first) = alignment.sequences.first() {
            let width = first.len();
            if let Some(k) = alignment.sequences.iter().position(|s| s.len() != width) {
                return Err(malformed(format!(
                    "sequence {:?} has length {}, expected {width}",
                    alignment.names[k],
                    alignment.sequences[k].len()
                )));
            }
        }
        Ok(alignment)
    }

    pub fn num_sequences(&self) -> usize {
        self.names.len()
    }

    /// Number of columns.
    pub fn num_sites(&self) -> usize {
        self.sequences.first().map_or(0, Vec::len)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn sequence(&self, name: &str) -> Option<&[u8]> {
        self.by_name.get(name).map(|&k| self.sequences[k].as_slice())
    }

    /// Columns where not every sequence carries the same character.
    pub fn informative_sites(&self) -> Vec<usize> {
        (0..self.num_sites())
            .filter(|&site| {
                let first = self.sequences[0][site];
                self.sequences.iter().any(|s| s[site] != first)
            })
            .collect()
    }

    /// A copy holding only [`Self::informative_sites`], in column order.
    pub fn reduce_to_informative(&self) -> Alignment {
        let sites = self.informative_sites();
        Alignment {
            names: self.names.clone(),
            sequences: self
                .sequences
                .iter()
                .map(|s| sites.iter().map(|&site| s[site]).collect())
                .collect(),
            by_name: self.by_name.clone(),
        }
    }

    pub fn write_fasta<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        for (name, seq) in self.names.iter().zip(&self.sequences) {
            writeln!(out, ">{name}")?;
            out.write_all(seq)?;
            writeln!(out)?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Alignment> {
        Alignment::read_fasta(text.as_bytes(), Path::new("test.fasta"))
    }

    #[test]
    fn test_informative_sites() {
        let aln = parse(">A\nACGT\n>B\nacga\n>C\nAC\nTT\n").unwrap();
        assert_eq!(aln.num_sequences(), 3);
        assert_eq!(aln.num_sites(), 4);
        assert_eq!(aln.informative_sites(), vec![2, 3]);

        let reduced = aln.reduce_to_informative();
        assert_eq!(reduced.num_sites(), 2);
        assert_eq!(reduced.sequence("B"), Some(&b"GA"[..]));
        assert_eq!(reduced.sequence("C"), Some(&b"TT"[..]));
    }

    #[test]
    fn test_ragged_alignment_fails() {
        assert!(matches!(parse(">A\nACGT\n>B\nAC\n"), Err(WalkError::MalformedAlignment { .. })));
    }

    #[test]
    fn test_sequence_before_header_fails() {
        assert!(matches!(parse("ACGT\n>A\nACGT\n"), Err(WalkError::MalformedAlignment { .. })));
    }

    #[test]
    fn test_write_fasta_round_trip() {
        let aln = parse(">A desc\nAC\n>B\nAG\n").unwrap();
        let mut buf = Vec::new();
        aln.write_fasta(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), ">A\nAC\n>B\nAG\n");
    }
}
