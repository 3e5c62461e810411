use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::batch::registry::DedupRegistry;
use crate::constants::BATCH_FILE_PREFIX;
use crate::guide::GuideRecord;
use crate::sequence::packed::PackedGuide;
use crate::sequence::scanner::GuideCandidate;
use crate::types::{CrackleError, parse_strand, strand_symbol};

const BATCH_COLUMNS: usize = 5;

/// A spilled batch of first-seen candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    /// Position in creation order, starting at 0
    pub index: usize,
    pub path: PathBuf,
    /// Number of rows written
    pub records: usize,
}

struct OpenBatch {
    writer: csv::Writer<File>,
    file: BatchFile,
}

/// Disk-backed staging area for candidate guides.
///
/// Candidates are appended to the open batch file until it holds
/// `batch_size` rows, at which point it is closed and a new one is started.
/// Batch files are headerless delimited text with the columns
/// `sequence, header, start, end, strand`. The whole work area is removed
/// when the store is dropped.
///
/// # Examples
///
/// ```rust
/// use crackle_core::batch::{BatchStore, DedupRegistry};
/// use crackle_core::sequence::scan_sequence;
///
/// let mut store = BatchStore::new(None, 10, b',')?;
/// for candidate in scan_sequence("chr1", b"AACGTACGTACGTACGTACGTGGACGT") {
///     store.record(&candidate)?;
/// }
/// let batches = store.finish()?;
/// let records = store.load(&batches[0], &DedupRegistry::new())?;
/// assert_eq!(records.len(), 1);
/// # Ok::<(), crackle_core::types::CrackleError>(())
/// ```
pub struct BatchStore {
    dir: TempDir,
    batch_size: usize,
    delimiter: u8,
    open: Option<OpenBatch>,
    closed: Vec<BatchFile>,
}

impl BatchStore {
    /// Create a store in a fresh temporary directory, under `work_dir` when
    /// given.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::Io`] if the directory cannot be created.
    pub fn new(work_dir: Option<&Path>, batch_size: usize, delimiter: u8) -> Result<Self, CrackleError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("crackle_");
        let dir = match work_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        debug!("Batch work area at {}", dir.path().display());
        Ok(Self {
            dir,
            batch_size: batch_size.max(1),
            delimiter,
            open: None,
            closed: Vec::new(),
        })
    }

    /// Root of the work area.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Batches closed so far.
    #[must_use]
    pub fn closed(&self) -> &[BatchFile] {
        &self.closed
    }

    fn open_batch(&self) -> Result<OpenBatch, CrackleError> {
        let index = self.closed.len();
        let path = self
            .dir
            .path()
            .join(format!("{BATCH_FILE_PREFIX}{index:06}.csv"));
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .from_path(&path)
            .map_err(|source| CrackleError::Batch {
                path: path.clone(),
                source,
            })?;
        Ok(OpenBatch {
            writer,
            file: BatchFile {
                index,
                path,
                records: 0,
            },
        })
    }

    fn close_batch(&mut self, mut batch: OpenBatch) -> Result<(), CrackleError> {
        batch.writer.flush().map_err(|e| CrackleError::Batch {
            path: batch.file.path.clone(),
            source: e.into(),
        })?;
        debug!(
            "Closed batch {} with {} records",
            batch.file.index, batch.file.records
        );
        self.closed.push(batch.file);
        Ok(())
    }

    /// Append a first-seen candidate to the open batch.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::Batch`] if the row cannot be written.
    pub fn record(&mut self, candidate: &GuideCandidate) -> Result<(), CrackleError> {
        let mut batch = match self.open.take() {
            Some(batch) => batch,
            None => self.open_batch()?,
        };

        let start = candidate.start.to_string();
        let end = candidate.end.to_string();
        batch
            .writer
            .write_record([
                candidate.sequence.as_slice(),
                candidate.header.as_bytes(),
                start.as_bytes(),
                end.as_bytes(),
                strand_symbol(candidate.strand).as_bytes(),
            ])
            .map_err(|source| CrackleError::Batch {
                path: batch.file.path.clone(),
                source,
            })?;
        batch.file.records += 1;

        if batch.file.records >= self.batch_size {
            self.close_batch(batch)?;
        } else {
            self.open = Some(batch);
        }
        Ok(())
    }

    /// Close the partial final batch and return every batch in creation
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::Batch`] if the open batch cannot be flushed.
    pub fn finish(&mut self) -> Result<Vec<BatchFile>, CrackleError> {
        if let Some(batch) = self.open.take() {
            self.close_batch(batch)?;
        }
        Ok(self.closed.clone())
    }

    /// Rebuild the records of one batch.
    ///
    /// Guides the registry marks as duplicates lose their position and are
    /// flagged not unique.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::Batch`] if the file cannot be read and
    /// [`CrackleError::CorruptBatch`] if a row does not parse.
    pub fn load(&self, batch: &BatchFile, registry: &DedupRegistry) -> Result<Vec<GuideRecord>, CrackleError> {
        let batch_error = |source: csv::Error| CrackleError::Batch {
            path: batch.path.clone(),
            source,
        };
        let corrupt = |row: usize, reason: String| CrackleError::CorruptBatch {
            path: batch.path.clone(),
            row,
            reason,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .from_path(&batch.path)
            .map_err(batch_error)?;

        let mut records = Vec::with_capacity(batch.records);
        for (row, result) in reader.records().enumerate() {
            let fields = result.map_err(batch_error)?;
            if fields.len() != BATCH_COLUMNS {
                return Err(corrupt(
                    row,
                    format!("expected {BATCH_COLUMNS} fields, found {}", fields.len()),
                ));
            }

            let sequence = &fields[0];
            let key = PackedGuide::from_bases(sequence.as_bytes())
                .ok_or_else(|| corrupt(row, format!("invalid guide {sequence:?}")))?;

            if registry.is_duplicate(&key) {
                records.push(GuideRecord::duplicate(sequence));
                continue;
            }

            let start = fields[2]
                .parse()
                .map_err(|_| corrupt(row, format!("invalid start {:?}", &fields[2])))?;
            let end = fields[3]
                .parse()
                .map_err(|_| corrupt(row, format!("invalid end {:?}", &fields[3])))?;
            let strand = parse_strand(&fields[4])
                .ok_or_else(|| corrupt(row, format!("invalid strand {:?}", &fields[4])))?;
            records.push(GuideRecord::located(sequence, &fields[1], start, end, strand));
        }
        Ok(records)
    }
}
