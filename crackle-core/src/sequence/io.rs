use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::types::CrackleError;

/// One named sequence from a multi-record FASTA stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceBlock {
    /// Header line without the leading `>`, trimmed
    pub header: String,
    /// All sequence lines of the block concatenated
    pub sequence: Vec<u8>,
}

/// Streaming FASTA reader yielding one [`SequenceBlock`] at a time.
///
/// The reader is deliberately lenient: sequence lines that appear before any
/// header form a block with an empty header, blank lines are ignored and a
/// header without sequence yields an empty block.
///
/// # Examples
///
/// ```rust
/// use crackle_core::sequence::io::SequenceReader;
///
/// let input = b">chr1\nACGT\nACGT\n>chr2\nTTTT\n";
/// let blocks: Vec<_> = SequenceReader::new(&input[..])
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(blocks.len(), 2);
/// assert_eq!(blocks[0].header, "chr1");
/// assert_eq!(blocks[0].sequence, b"ACGTACGT");
/// ```
pub struct SequenceReader<R> {
    reader: R,
    line: String,
    next_header: Option<String>,
    finished: bool,
}

impl<R: BufRead> SequenceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            next_header: None,
            finished: false,
        }
    }

    fn read_block(&mut self) -> Result<Option<SequenceBlock>, CrackleError> {
        let mut header = self.next_header.take();
        let mut sequence = Vec::new();

        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                self.finished = true;
                return Ok(header.map(|header| SequenceBlock { header, sequence }));
            }

            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(name) = line.strip_prefix('>') {
                let name = name.trim().to_string();
                match header {
                    Some(header) => {
                        self.next_header = Some(name);
                        return Ok(Some(SequenceBlock { header, sequence }));
                    }
                    None => header = Some(name),
                }
            } else {
                header.get_or_insert_with(String::new);
                sequence.extend_from_slice(line.as_bytes());
            }
        }
    }
}

impl<R: BufRead> Iterator for SequenceReader<R> {
    type Item = Result<SequenceBlock, CrackleError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_block() {
            Ok(block) => block.map(Ok),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Open a FASTA file for streaming.
///
/// # Errors
///
/// Returns [`CrackleError::Io`] if the file cannot be opened.
pub fn open_fasta<P: AsRef<Path>>(path: P) -> Result<SequenceReader<BufReader<File>>, CrackleError> {
    let file = File::open(path.as_ref())?;
    Ok(SequenceReader::new(BufReader::new(file)))
}

/// Expand configured inputs into the ordered list of files to scan.
///
/// Files are kept in the given order; a directory contributes its regular
/// files sorted by name.
///
/// # Errors
///
/// Returns [`CrackleError::Io`] if a path does not exist or a directory
/// cannot be listed.
pub fn expand_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, CrackleError> {
    let mut files = Vec::new();
    for path in paths {
        if fs::metadata(path)?.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|p| p.is_file())
                .collect();
            entries.sort();
            files.extend(entries);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}
