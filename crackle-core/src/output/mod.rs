//! Result table writer.
//!
//! One row per distinct guide, in batch order, preceded by a single header
//! row. Outcomes are written as `1` (accepted), `0` (rejected) or `?`
//! (not assessed). Duplicated guides write `-` in every positional column.
//! Scores are left empty when the stage produced none.
//!
//! ## Examples
//!
//! ```rust
//! use crackle_core::config::CrackleConfig;
//! use crackle_core::guide::GuideRecord;
//! use crackle_core::output::GuideWriter;
//!
//! let config = CrackleConfig::default();
//! let mut writer = GuideWriter::new(Vec::new(), config.delimiter());
//! writer.write_header()?;
//! writer.write_record(&GuideRecord::duplicate("ACGTACGTACGTACGTACGGAGG"), &config)?;
//!
//! let text = String::from_utf8(writer.into_inner()?).unwrap();
//! assert!(text.lines().nth(1).unwrap().starts_with("ACGTACGTACGTACGTACGGAGG,0,-,-,-,-,"));
//! # Ok::<(), crackle_core::types::CrackleError>(())
//! ```

use std::io::Write;

use crate::config::CrackleConfig;
use crate::guide::GuideRecord;
use crate::types::{ConsensusModule, CrackleError, Outcome, Provenance, Stage, strand_symbol};

/// Output columns, in order.
pub const GUIDE_COLUMNS: [&str; 21] = [
    "seq",
    "isUnique",
    "header",
    "start",
    "end",
    "strand",
    "passedAvoidLeadingT",
    "AT",
    "passedATPercent",
    "passedTTTT",
    "ssEnergy",
    "passedSecondaryStructure",
    "acceptedByMm10db",
    "passedG20",
    "sgrnascorer2score",
    "acceptedBySgRnaScorer",
    "consensusCount",
    "passedBowtie",
    "offtargetscore",
    "passedOffTargetScore",
    "finalAccepted",
];

fn score(record: &GuideRecord, stage: Stage) -> String {
    record
        .result(stage)
        .score
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn code(record: &GuideRecord, stage: Stage) -> String {
    record.outcome(stage).code().to_string()
}

/// Delimited writer for [`GuideRecord`] rows.
pub struct GuideWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> GuideWriter<W> {
    pub fn new(inner: W, delimiter: u8) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .from_writer(inner);
        Self { writer }
    }

    /// Write the column names.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::Output`] if the write fails.
    pub fn write_header(&mut self) -> Result<(), CrackleError> {
        self.writer.write_record(GUIDE_COLUMNS)?;
        Ok(())
    }

    /// Write one guide row.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::Output`] if the write fails.
    pub fn write_record(&mut self, record: &GuideRecord, config: &CrackleConfig) -> Result<(), CrackleError> {
        let ambiguous = Outcome::Ambiguous.code();
        let (header, start, end, strand) = match &record.provenance {
            Provenance::Located {
                header,
                start,
                end,
                strand,
            } => (
                header.clone(),
                start.to_string(),
                end.to_string(),
                strand_symbol(*strand).to_string(),
            ),
            Provenance::Ambiguous => (
                ambiguous.to_string(),
                ambiguous.to_string(),
                ambiguous.to_string(),
                ambiguous.to_string(),
            ),
        };

        let final_accepted = Outcome::from_pass(record.final_accepted(config));
        let row: [String; GUIDE_COLUMNS.len()] = [
            record.sequence.clone(),
            record.is_unique.code().to_string(),
            header,
            start,
            end,
            strand,
            code(record, Stage::LeadingT),
            score(record, Stage::AtPercent),
            code(record, Stage::AtPercent),
            code(record, Stage::Tttt),
            score(record, Stage::SecondaryStructure),
            code(record, Stage::SecondaryStructure),
            record.module_outcome(ConsensusModule::Mm10db).code().to_string(),
            code(record, Stage::Chopchop),
            score(record, Stage::SgRnaScorer2),
            code(record, Stage::SgRnaScorer2),
            record.consensus_count(&config.consensus).to_string(),
            code(record, Stage::Bowtie),
            score(record, Stage::OffTarget),
            code(record, Stage::OffTarget),
            final_accepted.code().to_string(),
        ];
        self.writer.write_record(&row)?;
        Ok(())
    }

    /// Flush buffered rows to the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::Io`] if the flush fails.
    pub fn flush(&mut self) -> Result<(), CrackleError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::Io`] if the final flush fails.
    pub fn into_inner(self) -> Result<W, CrackleError> {
        self.writer
            .into_inner()
            .map_err(|e| CrackleError::Io(e.into_error()))
    }
}
