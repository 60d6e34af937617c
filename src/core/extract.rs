// LogSieve - core/extract.rs
//
// Structured field extraction from one log file, independent of filtering.
//
// Each field is extracted on its own: a failure on one field yields
// `FieldValue::Failed` for that field plus an `ExtractionError` for the
// caller to report, and never prevents extraction of the others.

use crate::core::model::{ExtractedFields, FieldValue, LogFileRef};
use crate::platform::fs;
use crate::util::constants::{CREATION_DATE_FORMAT, LOT_MARKER, START_MARKER};
use crate::util::error::ExtractionError;

/// Extracts marker lines, the file name and the creation date.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    start_prefix: String,
    lot_prefix: String,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(START_MARKER, LOT_MARKER)
    }
}

impl FieldExtractor {
    pub fn new(start_prefix: impl Into<String>, lot_prefix: impl Into<String>) -> Self {
        Self {
            start_prefix: start_prefix.into(),
            lot_prefix: lot_prefix.into(),
        }
    }

    /// First line of `file` starting with `prefix`; `NotFound` if none.
    pub fn extract_marker_line(
        &self,
        file: &LogFileRef,
        prefix: &str,
    ) -> Result<FieldValue, ExtractionError> {
        let lines = fs::read_lines(&file.path).map_err(|source| ExtractionError::Read {
            file: file.path.clone(),
            field: "marker line",
            source,
        })?;
        Ok(find_marker_line(&lines, prefix))
    }

    /// File name component of the path.
    pub fn extract_file_name(&self, file: &LogFileRef) -> Result<FieldValue, ExtractionError> {
        match file.path.file_name() {
            Some(name) => Ok(FieldValue::Found(name.to_string_lossy().into_owned())),
            None => Err(ExtractionError::NoFileName {
                file: file.path.clone(),
            }),
        }
    }

    /// Creation timestamp rendered as `YYYY-MM-DD HH:MM:SS`.
    pub fn extract_creation_date(&self, file: &LogFileRef) -> FieldValue {
        FieldValue::Found(file.created.format(CREATION_DATE_FORMAT).to_string())
    }

    /// Extract all fields, reading the file once for both marker lines.
    pub fn extract(&self, file: &LogFileRef) -> (ExtractedFields, Vec<ExtractionError>) {
        match fs::read_lines(&file.path) {
            Ok(lines) => self.extract_from_lines(file, &lines),
            Err(source) => {
                let mut errors = vec![ExtractionError::Read {
                    file: file.path.clone(),
                    field: "marker lines",
                    source,
                }];
                let file_name = self.file_name_or_failed(file, &mut errors);
                let fields = ExtractedFields {
                    file_name,
                    creation_date: self.extract_creation_date(file),
                    start_line: FieldValue::Failed,
                    lot_line: FieldValue::Failed,
                };
                (fields, errors)
            }
        }
    }

    /// Extract all fields from already-read `lines` of `file`.
    pub fn extract_from_lines(
        &self,
        file: &LogFileRef,
        lines: &[String],
    ) -> (ExtractedFields, Vec<ExtractionError>) {
        let mut errors = Vec::new();
        let file_name = self.file_name_or_failed(file, &mut errors);
        let fields = ExtractedFields {
            file_name,
            creation_date: self.extract_creation_date(file),
            start_line: find_marker_line(lines, &self.start_prefix),
            lot_line: find_marker_line(lines, &self.lot_prefix),
        };
        (fields, errors)
    }

    pub fn start_prefix(&self) -> &str {
        &self.start_prefix
    }

    pub fn lot_prefix(&self) -> &str {
        &self.lot_prefix
    }

    fn file_name_or_failed(
        &self,
        file: &LogFileRef,
        errors: &mut Vec<ExtractionError>,
    ) -> FieldValue {
        match self.extract_file_name(file) {
            Ok(v) => v,
            Err(e) => {
                errors.push(e);
                FieldValue::Failed
            }
        }
    }
}

/// First line starting with `prefix`.
pub fn find_marker_line<S: AsRef<str>>(lines: &[S], prefix: &str) -> FieldValue {
    lines
        .iter()
        .map(AsRef::as_ref)
        .find(|l| l.starts_with(prefix))
        .map(|l| FieldValue::Found(l.to_string()))
        .unwrap_or(FieldValue::NotFound)
}
