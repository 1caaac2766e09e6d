// 🏗️ Record Parser - Latin-1, semicolon-separated people spreadsheets
// Pipeline: raw rows → coerce/validate → dedupe people → reshape phones

use crate::config::{MAX_COLUMNS, PERSON_COLUMN_COUNT, PHONE_COLUMNS_START, PHONE_MIN_DIGITS};
use crate::db::{PersonRecord, PhoneRecord};
use crate::error::{ImportError, ImportResult, RowDiagnostic};
use crate::fields::{apply_fields, FieldSpec, PERSON_FIELDS};
use crate::normalize::{decode_latin1, phone_number};
use csv::ReaderBuilder;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

// ============================================================================
// CORE TYPES
// ============================================================================

/// One data line split into decoded cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line in the source file
    pub line: u64,
    pub cells: Vec<String>,
}

impl RawRow {
    /// The fixed person columns
    pub fn person_cells(&self) -> &[String] {
        &self.cells[..PERSON_COLUMN_COUNT.min(self.cells.len())]
    }

    /// Everything after the person columns
    pub fn phone_cells(&self) -> &[String] {
        self.cells.get(PHONE_COLUMNS_START..).unwrap_or(&[])
    }
}

/// Parser output, ready for the bulk loader
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    /// One record per national identifier, first occurrence wins
    pub people: Vec<PersonRecord>,
    /// Distinct (owner, number) pairs
    pub phones: Vec<PhoneRecord>,
    /// Data rows that passed the field-count check
    pub rows_read: usize,
    /// Skipped or dropped rows
    pub diagnostics: Vec<RowDiagnostic>,
    /// Hex SHA-256 of the raw file, for the audit log
    pub source_sha256: String,
}

// ============================================================================
// STAGE 1: RAW ROWS
// ============================================================================

/// Lazily split the file into rows, discarding the first (label) row by
/// position and reporting lines with the wrong number of fields.
pub fn raw_rows(bytes: &[u8]) -> impl Iterator<Item = Result<RawRow, RowDiagnostic>> + '_ {
    let reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    reader.into_byte_records().skip(1).map(|result| {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(0);
            RowDiagnostic::new(line, format!("unreadable record: {}", e))
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.len() < PERSON_COLUMN_COUNT {
            return Err(RowDiagnostic::new(
                line,
                format!(
                    "expected at least {} fields, found {}",
                    PERSON_COLUMN_COUNT,
                    record.len()
                ),
            ));
        }
        if record.len() > MAX_COLUMNS {
            return Err(RowDiagnostic::new(
                line,
                format!("expected at most {} fields, found {}", MAX_COLUMNS, record.len()),
            ));
        }

        Ok(RawRow {
            line,
            cells: record.iter().map(decode_latin1).collect(),
        })
    })
}

// ============================================================================
// STAGE 3: PHONE RESHAPE
// ============================================================================

/// Wide-to-long: one candidate per phone cell that survives normalization
pub fn phone_candidates<'a>(
    owner_id: &'a str,
    cells: &'a [String],
    min_digits: usize,
) -> impl Iterator<Item = PhoneRecord> + 'a {
    cells
        .iter()
        .filter_map(move |cell| phone_number(cell, min_digits))
        .map(move |number| PhoneRecord::new(owner_id, number))
}

// ============================================================================
// PARSER
// ============================================================================

pub struct RecordParser {
    fields: &'static [FieldSpec],
    phone_min_digits: usize,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser {
    pub fn new() -> Self {
        RecordParser {
            fields: &PERSON_FIELDS,
            phone_min_digits: PHONE_MIN_DIGITS,
        }
    }

    /// Read the whole file and parse it
    pub fn parse_file(&self, path: &Path, affiliation: &str) -> ImportResult<ParsedBatch> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ImportError::NotFound(path.to_path_buf()),
            _ => ImportError::Io(e),
        })?;
        info!(path = %path.display(), bytes = bytes.len(), "Read spreadsheet");

        self.parse_bytes(&bytes, affiliation)
    }

    pub fn parse_bytes(&self, bytes: &[u8], affiliation: &str) -> ImportResult<ParsedBatch> {
        let affiliation = affiliation.trim();
        if affiliation.is_empty() {
            return Err(ImportError::MissingAffiliation);
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ImportError::EmptyInput("file has no content".to_string()));
        }

        let mut batch = ParsedBatch {
            source_sha256: format!("{:x}", Sha256::digest(bytes)),
            ..Default::default()
        };
        let mut seen_people = HashSet::new();
        let mut seen_phones = HashSet::new();

        for row in raw_rows(bytes) {
            let row = match row {
                Ok(row) => row,
                Err(diag) => {
                    warn!("Skipping malformed {}", diag);
                    batch.diagnostics.push(diag);
                    continue;
                }
            };
            batch.rows_read += 1;

            let person = match self.build_person(&row, affiliation) {
                Ok(person) => person,
                Err(diag) => {
                    debug!("Dropping {}", diag);
                    batch.diagnostics.push(diag);
                    continue;
                }
            };

            for phone in phone_candidates(&person.national_id, row.phone_cells(), self.phone_min_digits) {
                if seen_phones.insert(phone.clone()) {
                    batch.phones.push(phone);
                }
            }

            if seen_people.insert(person.national_id.clone()) {
                batch.people.push(person);
            } else {
                debug!(line = row.line, national_id = %person.national_id, "Duplicate identifier, keeping first occurrence");
            }
        }

        if batch.rows_read == 0 {
            return Err(ImportError::EmptyInput(format!(
                "no data row has the expected {} fields",
                PERSON_COLUMN_COUNT
            )));
        }

        info!(
            rows_read = batch.rows_read,
            people = batch.people.len(),
            phones = batch.phones.len(),
            skipped = batch.diagnostics.len(),
            "Parsed spreadsheet"
        );

        Ok(batch)
    }

    /// Coerce and validate one row into a person
    pub fn build_person(&self, row: &RawRow, affiliation: &str) -> Result<PersonRecord, RowDiagnostic> {
        apply_fields(self.fields, row.person_cells(), affiliation).map_err(|missing| {
            RowDiagnostic::new(
                row.line,
                format!("required field(s) empty after normalization: {}", missing.join(", ")),
            )
        })
    }
}
