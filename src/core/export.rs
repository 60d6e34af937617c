// LogSieve - core/export.rs
//
// Workbook sinks. A sink accepts one named sheet (optional header row,
// optionally styled and frozen, followed by string rows) and produces one
// single-sheet file. The whole artifact is rendered in memory and then
// written atomically, so a failing write never leaves a partial report.

use crate::core::model::{OutputFormats, ReportRow};
use crate::platform::fs::write_atomic;
use crate::util::constants::{HEADER_BACKGROUND_RGB, HEADER_ROW_HEIGHT, TEXT_REPORT_DELIMITER};
use crate::util::error::ReportError;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatPattern, Workbook, XlsxError};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// One sheet handed to a sink.
#[derive(Debug, Clone, Copy)]
pub struct SheetSpec<'a> {
    pub name: &'a str,
    pub header: Option<&'a [&'a str]>,
    /// Bold white-on-blue centred header with a fixed row height.
    pub styled_header: bool,
    /// Keep the header row visible while scrolling.
    pub freeze_header: bool,
    pub rows: &'a [ReportRow],
}

/// Produces one report artifact from a sheet.
pub trait WorkbookWriter: Send + Sync {
    /// File extension of the artifact, without the dot.
    fn extension(&self) -> &'static str;

    /// Render `sheet` and write it to `path`.
    fn write(&self, path: &Path, sheet: &SheetSpec<'_>) -> Result<(), ReportError>;
}

/// Builds the sinks of one report from the enabled formats.
pub type WriterFactory = Arc<dyn Fn(OutputFormats) -> Vec<Box<dyn WorkbookWriter>> + Send + Sync>;

/// Sinks for every enabled output format, xlsx first.
pub fn writers_for(formats: OutputFormats) -> Vec<Box<dyn WorkbookWriter>> {
    let mut writers: Vec<Box<dyn WorkbookWriter>> = Vec::new();
    if formats.xlsx {
        writers.push(Box::new(XlsxWriter));
    }
    if formats.txt {
        writers.push(Box::new(DelimitedWriter::default()));
    }
    writers
}

// =============================================================================
// xlsx
// =============================================================================

/// `.xlsx` workbook sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxWriter;

impl XlsxWriter {
    /// Render the sheet to workbook bytes.
    pub fn render(sheet: &SheetSpec<'_>) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name)?;

        let mut first_row: u32 = 0;

        if let Some(header) = sheet.header {
            let format = if sheet.styled_header {
                header_format()
            } else {
                Format::new()
            };
            for (col, title) in header.iter().enumerate() {
                worksheet.write_string_with_format(0, col_num(col), *title, &format)?;
            }
            if sheet.styled_header {
                worksheet.set_row_height(0, HEADER_ROW_HEIGHT)?;
            }
            if sheet.freeze_header {
                worksheet.set_freeze_panes(1, 0)?;
            }
            first_row = 1;
        }

        for (idx, row) in sheet.rows.iter().enumerate() {
            let row_num = first_row.saturating_add(u32::try_from(idx).unwrap_or(u32::MAX));
            for (col, cell) in row.iter().enumerate() {
                worksheet.write_string(row_num, col_num(col), cell)?;
            }
        }

        workbook.save_to_buffer()
    }
}

impl WorkbookWriter for XlsxWriter {
    fn extension(&self) -> &'static str {
        "xlsx"
    }

    fn write(&self, path: &Path, sheet: &SheetSpec<'_>) -> Result<(), ReportError> {
        let bytes = Self::render(sheet).map_err(|source| ReportError::Xlsx {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomic(path, &bytes).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_BACKGROUND_RGB))
        .set_pattern(FormatPattern::Solid)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
}

fn col_num(col: usize) -> u16 {
    u16::try_from(col).unwrap_or(u16::MAX)
}

// =============================================================================
// Delimited text
// =============================================================================

/// Delimited `.txt` sink. Headers are written unstyled.
#[derive(Debug, Clone, Copy)]
pub struct DelimitedWriter {
    delimiter: u8,
}

impl Default for DelimitedWriter {
    fn default() -> Self {
        Self {
            delimiter: TEXT_REPORT_DELIMITER,
        }
    }
}

impl DelimitedWriter {
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Write the sheet as delimited records to any writer.
    ///
    /// Returns the number of data rows written.
    pub fn render<W: Write>(
        &self,
        sheet: &SheetSpec<'_>,
        writer: W,
        path: &Path,
    ) -> Result<usize, ReportError> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_writer(writer);

        if let Some(header) = sheet.header {
            csv_writer
                .write_record(header)
                .map_err(|e| ReportError::Csv {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }

        let mut count = 0;
        for row in sheet.rows {
            csv_writer.write_record(row).map_err(|e| ReportError::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;
            count += 1;
        }

        csv_writer.flush().map_err(|e| ReportError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(count)
    }
}

impl WorkbookWriter for DelimitedWriter {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn write(&self, path: &Path, sheet: &SheetSpec<'_>) -> Result<(), ReportError> {
        let mut buf = Vec::new();
        self.render(sheet, &mut buf, path)?;
        write_atomic(path, &buf).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
