// LogSieve - core/report.rs
//
// Report assembly. Turns the accepted lines of a run (structured schema)
// or the list of matched files (flat schemas) into rows and hands them to
// one workbook sink per enabled output format.
//
// Schemas:
//   ICT            22 fixed columns, styled frozen header. Used for the
//                  ICT, EOL and CDMC report types. Rows are added during
//                  the scan, one per accepted line.
//   Custom         File Name, Creation Date, START Line, LOT Line; header.
//   Concatenation  Same four columns, no header row.
//
// Every row is normalised to its schema's column count before writing;
// missing values are rendered as "N/A" rather than omitted.

use crate::core::export::{writers_for, SheetSpec, WorkbookWriter};
use crate::core::extract::FieldExtractor;
use crate::core::model::{
    ExtractedFields, FieldValue, LogFileRef, OutputFormats, ReportRow, ReportType, ReportVariant,
};
use crate::util::constants::{
    CREATION_DATE_FORMAT, FIELD_SEPARATOR, NOT_AVAILABLE, REPORT_FILE_TIMESTAMP_FORMAT,
};
use crate::util::error::{ExtractionError, ReportError};
use chrono::{DateTime, Local, NaiveDateTime};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Header of the structured schema.
pub const ICT_HEADER: [&str; 22] = [
    "Machine",
    "Log Date",
    "Batch",
    "Product",
    "Variant",
    "DMC",
    "Test Date",
    "Test Time",
    "Test Type",
    "PCB",
    "Component",
    "Test Step",
    "Result",
    "Description",
    "Category",
    "Status",
    "Measured",
    "Min",
    "Max",
    "Unit",
    "Test Points",
    "Guarding",
];

/// Header of the flat schemas (written for Custom only).
pub const FILE_HEADER: [&str; 4] = ["File Name", "Creation Date", "START Line", "LOT Line"];

/// Column count every row of `variant` must have.
pub fn column_count(variant: ReportVariant) -> usize {
    match variant {
        ReportVariant::Ict => ICT_HEADER.len(),
        ReportVariant::Custom | ReportVariant::Concatenation => FILE_HEADER.len(),
    }
}

/// `<Tag>_<YYYY-MM-DD_HH-MM-SS>.<ext>`
pub fn report_file_name(report_type: ReportType, now: DateTime<Local>, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        report_type.tag(),
        now.format(REPORT_FILE_TIMESTAMP_FORMAT),
        extension
    )
}

/// Result of one `generate_report` call.
#[derive(Debug, Default)]
pub struct ReportOutcome {
    /// Artifacts written, in writer order.
    pub written: Vec<PathBuf>,
    /// Non-error conditions (empty input).
    pub warnings: Vec<String>,
    /// Per-file extraction failures hit while building flat rows.
    pub extraction_errors: Vec<ExtractionError>,
}

/// Builds and writes the report for one run.
pub struct ReportAssembler {
    report_type: ReportType,
    report_dir: PathBuf,
    date_format: String,
    extractor: FieldExtractor,
    writers: Vec<Box<dyn WorkbookWriter>>,
    rows: Vec<ReportRow>,
}

impl std::fmt::Debug for ReportAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportAssembler")
            .field("report_type", &self.report_type)
            .field("report_dir", &self.report_dir)
            .field("date_format", &self.date_format)
            .field("writers", &self.writers.len())
            .field("rows", &self.rows.len())
            .finish()
    }
}

impl ReportAssembler {
    pub fn new(
        report_type: ReportType,
        report_dir: impl Into<PathBuf>,
        date_format: impl Into<String>,
        formats: OutputFormats,
    ) -> Self {
        Self {
            report_type,
            report_dir: report_dir.into(),
            date_format: date_format.into(),
            extractor: FieldExtractor::default(),
            writers: writers_for(formats),
            rows: Vec::new(),
        }
    }

    /// Replace the sinks selected from the output formats.
    pub fn with_writers(mut self, writers: Vec<Box<dyn WorkbookWriter>>) -> Self {
        self.writers = writers;
        self
    }

    pub fn with_extractor(mut self, extractor: FieldExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn report_type(&self) -> ReportType {
        self.report_type
    }

    pub fn variant(&self) -> ReportVariant {
        self.report_type.variant()
    }

    /// Record one accepted line of a file (structured schema only; a no-op
    /// for the flat schemas, which are built from the matched file list).
    pub fn add_processed_line(&mut self, line: &str, fields: &ExtractedFields) {
        if self.variant() != ReportVariant::Ict {
            return;
        }
        self.rows.push(ict_row(line, fields, &self.date_format));
    }

    /// Rows accumulated by `add_processed_line`.
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// One flat row per matched file. Extraction failures degrade the
    /// affected cells and are returned for reporting.
    pub fn build_file_rows(&self, matched: &[LogFileRef]) -> (Vec<ReportRow>, Vec<ExtractionError>) {
        let mut rows = Vec::with_capacity(matched.len());
        let mut errors = Vec::new();
        for file in matched {
            let (fields, mut file_errors) = self.extractor.extract(file);
            errors.append(&mut file_errors);
            rows.push(file_row(
                &fields,
                self.extractor.start_prefix(),
                self.extractor.lot_prefix(),
            ));
        }
        (rows, errors)
    }

    /// Write one artifact per enabled output format.
    ///
    /// Empty input writes nothing and returns a warning. The first sink
    /// failure aborts this call.
    pub fn generate_report(
        &self,
        matched: &[LogFileRef],
        now: DateTime<Local>,
    ) -> Result<ReportOutcome, ReportError> {
        let variant = self.variant();
        let mut outcome = ReportOutcome::default();

        let built;
        let rows: &[ReportRow] = match variant {
            ReportVariant::Ict => &self.rows,
            ReportVariant::Custom | ReportVariant::Concatenation => {
                let (rows, errors) = self.build_file_rows(matched);
                outcome.extraction_errors = errors;
                built = rows;
                &built
            }
        };

        if rows.is_empty() {
            let message = format!("No data to write for the {} report", self.report_type);
            tracing::warn!(report_type = %self.report_type, "{message}");
            outcome.warnings.push(message);
            return Ok(outcome);
        }

        check_columns(rows, column_count(variant))?;

        let sheet_name = format!("{} Report", self.report_type.tag());
        let sheet = SheetSpec {
            name: &sheet_name,
            header: match variant {
                ReportVariant::Ict => Some(&ICT_HEADER[..]),
                ReportVariant::Custom => Some(&FILE_HEADER[..]),
                ReportVariant::Concatenation => None,
            },
            styled_header: variant == ReportVariant::Ict,
            freeze_header: variant == ReportVariant::Ict,
            rows,
        };

        for writer in &self.writers {
            let path = self
                .report_dir
                .join(report_file_name(self.report_type, now, writer.extension()));
            writer.write(&path, &sheet)?;
            tracing::info!(
                report_type = %self.report_type,
                rows = rows.len(),
                path = %path.display(),
                "Report written"
            );
            outcome.written.push(path);
        }

        Ok(outcome)
    }
}

// =============================================================================
// Row builders
// =============================================================================

/// Structured row for one accepted `line`.
pub fn ict_row(line: &str, fields: &ExtractedFields, date_format: &str) -> ReportRow {
    let file_name = fields.file_name.as_found().unwrap_or_default();
    let start: Vec<&str> = split_fields(&fields.start_line);
    let lot: Vec<&str> = split_fields(&fields.lot_line);

    let mut row = Vec::with_capacity(ICT_HEADER.len());
    row.push(machine_id(file_name));
    row.push(log_date(&fields.creation_date, date_format));
    row.push(field_at(&lot, 1));
    row.push(field_at(&start, 2));
    row.push(field_at(&start, 4));
    row.push(dmc(file_name));
    row.push(field_at(&start, 6));
    row.push(field_at(&start, 7));
    row.extend(line.split(FIELD_SEPARATOR).map(str::to_string));

    normalize_columns(row, ICT_HEADER.len())
}

/// Flat row: file name, creation date, START line, LOT line.
pub fn file_row(fields: &ExtractedFields, start_prefix: &str, lot_prefix: &str) -> ReportRow {
    vec![
        plain(&fields.file_name),
        plain(&fields.creation_date),
        marker(&fields.start_line, start_prefix),
        marker(&fields.lot_line, lot_prefix),
    ]
}

/// Pad with "N/A" up to `columns`; fold any surplus into the last column.
pub fn normalize_columns(mut row: ReportRow, columns: usize) -> ReportRow {
    if columns == 0 {
        row.clear();
        return row;
    }
    if row.len() > columns {
        let surplus = row.split_off(columns - 1);
        row.push(surplus.join(&FIELD_SEPARATOR.to_string()));
    }
    row.resize(columns, NOT_AVAILABLE.to_string());
    row
}

fn check_columns(rows: &[ReportRow], expected: usize) -> Result<(), ReportError> {
    match rows.iter().position(|r| r.len() != expected) {
        Some(idx) => Err(ReportError::ColumnMismatch {
            row: idx,
            expected,
            actual: rows[idx].len(),
        }),
        None => Ok(()),
    }
}

fn split_fields(value: &FieldValue) -> Vec<&str> {
    value
        .as_found()
        .map(|l| l.split(FIELD_SEPARATOR).collect())
        .unwrap_or_default()
}

fn field_at(fields: &[&str], idx: usize) -> String {
    fields
        .get(idx)
        .map(|s| s.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// First 8 characters of the file name.
fn machine_id(file_name: &str) -> String {
    if file_name.chars().count() >= 8 {
        file_name.chars().take(8).collect()
    } else {
        NOT_AVAILABLE.to_string()
    }
}

/// 6 characters starting 10 from the end of the file name.
fn dmc(file_name: &str) -> String {
    let len = file_name.chars().count();
    if len >= 10 {
        file_name.chars().skip(len - 10).take(6).collect()
    } else {
        NOT_AVAILABLE.to_string()
    }
}

/// Creation date re-rendered in the report date format.
fn log_date(value: &FieldValue, date_format: &str) -> String {
    let Some(raw) = value.as_found() else {
        return NOT_AVAILABLE.to_string();
    };
    let Ok(parsed) = NaiveDateTime::parse_from_str(raw, CREATION_DATE_FORMAT) else {
        return NOT_AVAILABLE.to_string();
    };
    // An invalid format string makes Display fail; write! surfaces that
    // as an error instead of a panic.
    let mut out = String::new();
    match write!(out, "{}", parsed.format(date_format)) {
        Ok(()) => out,
        Err(_) => NOT_AVAILABLE.to_string(),
    }
}

fn plain(value: &FieldValue) -> String {
    match value {
        FieldValue::Found(s) => s.clone(),
        FieldValue::NotFound | FieldValue::Failed => NOT_AVAILABLE.to_string(),
    }
}

fn marker(value: &FieldValue, prefix: &str) -> String {
    match value {
        FieldValue::Found(s) => s.clone(),
        FieldValue::NotFound => format!("{prefix} line not found"),
        FieldValue::Failed => NOT_AVAILABLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::export::DelimitedWriter;
    use std::path::Path;
    use chrono::TimeZone;
    use std::fs;
    use std::sync::{Arc, Mutex};

    /// Sink capturing what would be written.
    #[derive(Default, Clone)]
    struct CaptureWriter {
        sheets: Arc<Mutex<Vec<(PathBuf, Option<Vec<String>>, Vec<ReportRow>)>>>,
    }

    impl WorkbookWriter for CaptureWriter {
        fn extension(&self) -> &'static str {
            "cap"
        }

        fn write(&self, path: &Path, sheet: &SheetSpec<'_>) -> Result<(), ReportError> {
            self.sheets.lock().unwrap().push((
                path.to_path_buf(),
                sheet
                    .header
                    .map(|h| h.iter().map(|s| s.to_string()).collect()),
                sheet.rows.to_vec(),
            ));
            Ok(())
        }
    }

    fn fields(name: &str, start: FieldValue, lot: FieldValue) -> ExtractedFields {
        ExtractedFields {
            file_name: FieldValue::Found(name.to_string()),
            creation_date: FieldValue::Found("2024-03-05 14:07:09".to_string()),
            start_line: start,
            lot_line: lot,
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 6, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_ict_row_layout() {
        let f = fields(
            "MACHINE1_ABC123XYZ9.log",
            FieldValue::Found("START;0;PROD;3;VAR;5;2024-03-05;14:00:00".to_string()),
            FieldValue::Found("LOT;BATCH7".to_string()),
        );
        let row = ict_row("BLOCK;PCB1;C12;S3;PASS", &f, "%m/%d/%Y");

        assert_eq!(row.len(), 22);
        assert_eq!(row[0], "MACHINE1");
        assert_eq!(row[1], "03/05/2024");
        assert_eq!(row[2], "BATCH7");
        assert_eq!(row[3], "PROD");
        assert_eq!(row[4], "VAR");
        assert_eq!(row[5], "23XYZ9");
        assert_eq!(row[6], "2024-03-05");
        assert_eq!(row[7], "14:00:00");
        assert_eq!(&row[8..13], &["BLOCK", "PCB1", "C12", "S3", "PASS"]);
        assert!(row[13..].iter().all(|c| c == "N/A"));
    }

    #[test]
    fn test_dmc_takes_six_chars_ten_from_end() {
        // "0123456789" -> starts at index 0, takes "012345".
        assert_eq!(dmc("0123456789"), "012345");
        assert_eq!(dmc("XX0123456789"), "012345");
        assert_eq!(dmc("short"), "N/A");
    }

    #[test]
    fn test_machine_id_needs_eight_chars() {
        assert_eq!(machine_id("ABCDEFGH.log"), "ABCDEFGH");
        assert_eq!(machine_id("ABC.log"), "N/A");
    }

    #[test]
    fn test_ict_row_missing_markers_degrade_to_na() {
        let f = fields("x.log", FieldValue::NotFound, FieldValue::Failed);
        let row = ict_row("A;B", &f, "%m/%d/%Y");
        assert_eq!(row.len(), 22);
        assert_eq!(&row[0..8], &["N/A", "03/05/2024", "N/A", "N/A", "N/A", "N/A", "N/A", "N/A"]);
        assert_eq!(row[8], "A");
        assert_eq!(row[9], "B");
    }

    #[test]
    fn test_ict_row_folds_surplus_fields() {
        let f = fields("x.log", FieldValue::NotFound, FieldValue::NotFound);
        let line: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        let row = ict_row(&line.join(";"), &f, "%m/%d/%Y");
        assert_eq!(row.len(), 22);
        // 8 derived columns, then fields 0..=12, then "13;...;19" folded.
        assert_eq!(row[20], "12");
        assert_eq!(row[21], "13;14;15;16;17;18;19");
    }

    #[test]
    fn test_invalid_date_format_yields_na() {
        let value = FieldValue::Found("2024-03-05 14:07:09".to_string());
        assert_eq!(log_date(&value, "%Y-%Q"), "N/A");
        assert_eq!(log_date(&value, "%d.%m.%Y"), "05.03.2024");
        assert_eq!(log_date(&FieldValue::Failed, "%d"), "N/A");
    }

    #[test]
    fn test_file_row_marker_rendering() {
        let f = ExtractedFields {
            file_name: FieldValue::Found("a.log".to_string()),
            creation_date: FieldValue::Found("2024-03-05 14:07:09".to_string()),
            start_line: FieldValue::NotFound,
            lot_line: FieldValue::Failed,
        };
        assert_eq!(
            file_row(&f, "START", "LOT"),
            vec!["a.log", "2024-03-05 14:07:09", "START line not found", "N/A"]
        );
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(
            report_file_name(ReportType::Eol, now(), "xlsx"),
            "EOL_2024-03-06_08-30-00.xlsx"
        );
    }

    #[test]
    fn test_empty_input_is_warning_noop() {
        let capture = CaptureWriter::default();
        let assembler =
            ReportAssembler::new(ReportType::Ict, "/tmp", "%m/%d/%Y", OutputFormats::default())
                .with_writers(vec![Box::new(capture.clone())]);
        let outcome = assembler.generate_report(&[], now()).unwrap();
        assert!(outcome.written.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(capture.sheets.lock().unwrap().is_empty());
    }

    #[test]
    fn test_flat_variants_ignore_processed_lines() {
        let mut assembler = ReportAssembler::new(
            ReportType::Custom,
            "/tmp",
            "%m/%d/%Y",
            OutputFormats::default(),
        );
        let f = fields("a.log", FieldValue::NotFound, FieldValue::NotFound);
        assembler.add_processed_line("x", &f);
        assert!(assembler.rows().is_empty());
    }

    #[test]
    fn test_custom_report_has_header_concatenation_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station01.log");
        fs::write(&path, "START;1;P\nLOT;B\n").unwrap();
        let matched = vec![LogFileRef::new(&path, now())];

        for (rt, expect_header) in [
            (ReportType::Custom, true),
            (ReportType::Concatenation, false),
        ] {
            let capture = CaptureWriter::default();
            let assembler =
                ReportAssembler::new(rt, dir.path(), "%m/%d/%Y", OutputFormats::default())
                    .with_writers(vec![Box::new(capture.clone())]);
            let outcome = assembler.generate_report(&matched, now()).unwrap();
            assert_eq!(outcome.written.len(), 1);

            let sheets = capture.sheets.lock().unwrap();
            let (written_path, header, rows) = &sheets[0];
            assert_eq!(header.is_some(), expect_header);
            assert_eq!(rows[0][0], "station01.log");
            assert_eq!(rows[0][2], "START;1;P");
            assert_eq!(rows[0][3], "LOT;B");
            assert!(written_path
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(rt.tag()));
        }
    }

    #[test]
    fn test_custom_marker_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station02.log");
        fs::write(&path, "BEGIN;7\nLOT;B\n").unwrap();
        let matched = vec![LogFileRef::new(&path, now())];

        let capture = CaptureWriter::default();
        let assembler = ReportAssembler::new(
            ReportType::Custom,
            dir.path(),
            "%m/%d/%Y",
            OutputFormats::default(),
        )
        .with_writers(vec![Box::new(capture.clone())])
        .with_extractor(FieldExtractor::new("BEGIN", "BATCH"));
        assembler.generate_report(&matched, now()).unwrap();

        let sheets = capture.sheets.lock().unwrap();
        let rows = &sheets[0].2;
        assert_eq!(rows[0][2], "BEGIN;7");
        assert_eq!(rows[0][3], "BATCH line not found");
    }

    #[test]
    fn test_ict_generation_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let f = fields(
            "MACHINE1_ABC123XYZ9.log",
            FieldValue::Found("START;0;PROD;3;VAR;5;D;T".to_string()),
            FieldValue::Found("LOT;B7".to_string()),
        );

        let mut outputs = Vec::new();
        for sub in ["first", "second"] {
            let out_dir = dir.path().join(sub);
            fs::create_dir(&out_dir).unwrap();
            let mut assembler =
                ReportAssembler::new(ReportType::Ict, &out_dir, "%m/%d/%Y", OutputFormats::default())
                    .with_writers(vec![Box::new(DelimitedWriter::default())]);
            assembler.add_processed_line("BLOCK;1;PASS", &f);
            assembler.add_processed_line("BLOCK;2;FAIL", &f);
            let outcome = assembler.generate_report(&[], now()).unwrap();
            outputs.push(fs::read_to_string(&outcome.written[0]).unwrap());
        }
        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(outputs[0].lines().count(), 3, "header plus two rows");
    }

    #[test]
    fn test_sink_failure_aborts_call() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let mut assembler =
            ReportAssembler::new(ReportType::Ict, &missing, "%m/%d/%Y", OutputFormats::default())
                .with_writers(vec![Box::new(DelimitedWriter::default())]);
        let f = fields("a.log", FieldValue::NotFound, FieldValue::NotFound);
        assembler.add_processed_line("x", &f);
        assert!(assembler.generate_report(&[], now()).is_err());
    }

    #[test]
    fn test_normalize_columns() {
        let short = normalize_columns(vec!["a".to_string()], 3);
        assert_eq!(short, vec!["a", "N/A", "N/A"]);
        let long = normalize_columns(
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            2,
        );
        assert_eq!(long, vec!["a", "b;c;d"]);
    }
}
