// LogSieve - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Every error carries the path or key it concerns so that both the
// notification channel and the durable error log receive an actionable
// message.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all LogSieve operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LogSieveError {
    /// Settings loading or validation failed.
    Config(ConfigError),

    /// Directory scan failed.
    Discovery(DiscoveryError),

    /// A log file could not be read.
    Read(ReadError),

    /// A structured field could not be extracted.
    Extraction(ExtractionError),

    /// Writing a report artifact failed.
    Report(ReportError),

    /// The run controller refused a request.
    Run(RunError),
}

impl fmt::Display for LogSieveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Discovery(e) => write!(f, "Scan error: {e}"),
            Self::Read(e) => write!(f, "Read error: {e}"),
            Self::Extraction(e) => write!(f, "Extraction error: {e}"),
            Self::Report(e) => write!(f, "Report error: {e}"),
            Self::Run(e) => write!(f, "Run error: {e}"),
        }
    }
}

impl std::error::Error for LogSieveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Discovery(e) => Some(e),
            Self::Read(e) => Some(e),
            Self::Extraction(e) => Some(e),
            Self::Report(e) => Some(e),
            Self::Run(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to settings loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A report type tag is not one of the known types. Unknown tags are
    /// rejected, never mapped to a default type.
    UnknownReportType { tag: String },

    /// A config value is malformed or out of the allowed range.
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading the config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::UnknownReportType { tag } => write!(
                f,
                "Unknown report type '{tag}'. Expected one of: ICT, EOL, Custom, Concatenation, CDMC"
            ),
            Self::InvalidValue {
                field,
                value,
                expected,
            } => write!(f, "Config '{field}' = '{value}' is invalid. Expected: {expected}"),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for LogSieveError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Discovery errors
// ---------------------------------------------------------------------------

/// Errors related to the directory scan. A scan either lists every
/// candidate file or fails; partial listings are never returned.
#[derive(Debug)]
pub enum DiscoveryError {
    /// The log directory does not exist.
    PathNotFound { path: PathBuf },

    /// The log path exists but is not a directory.
    NotADirectory { path: PathBuf },

    /// Enumeration was interrupted.
    Traversal {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// Metadata for a listed entry could not be read.
    Metadata { path: PathBuf, source: io::Error },
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathNotFound { path } => {
                write!(f, "Log path '{}' does not exist", path.display())
            }
            Self::NotADirectory { path } => {
                write!(f, "Log path '{}' is not a directory", path.display())
            }
            Self::Traversal { path, source } => {
                write!(f, "Error listing '{}': {source}", path.display())
            }
            Self::Metadata { path, source } => {
                write!(f, "Cannot read metadata for '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for DiscoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Traversal { source, .. } => Some(source),
            Self::Metadata { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DiscoveryError> for LogSieveError {
    fn from(e: DiscoveryError) -> Self {
        Self::Discovery(e)
    }
}

// ---------------------------------------------------------------------------
// Read errors
// ---------------------------------------------------------------------------

/// A log file could not be read during filtering. Isolated per file.
#[derive(Debug)]
pub struct ReadError {
    pub file: PathBuf,
    pub source: io::Error,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot read '{}': {}", self.file.display(), self.source)
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl From<ReadError> for LogSieveError {
    fn from(e: ReadError) -> Self {
        Self::Read(e)
    }
}

// ---------------------------------------------------------------------------
// Extraction errors
// ---------------------------------------------------------------------------

/// A single field could not be extracted. Non-fatal: the field becomes
/// `FieldValue::Failed` and the other fields are still extracted.
#[derive(Debug)]
pub enum ExtractionError {
    /// Reading the file contents for a marker line failed.
    Read {
        file: PathBuf,
        field: &'static str,
        source: io::Error,
    },

    /// The path has no usable file name component.
    NoFileName { file: PathBuf },
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read {
                file,
                field,
                source,
            } => write!(
                f,
                "Cannot extract {field} from '{}': {source}",
                file.display()
            ),
            Self::NoFileName { file } => {
                write!(f, "'{}' has no file name component", file.display())
            }
        }
    }
}

impl std::error::Error for ExtractionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::NoFileName { .. } => None,
        }
    }
}

impl From<ExtractionError> for LogSieveError {
    fn from(e: ExtractionError) -> Self {
        Self::Extraction(e)
    }
}

// ---------------------------------------------------------------------------
// Report errors
// ---------------------------------------------------------------------------

/// Errors writing a report artifact. Aborts only the report call that
/// produced it.
#[derive(Debug)]
pub enum ReportError {
    /// The workbook library rejected the sheet or failed to serialise it.
    Xlsx {
        path: PathBuf,
        source: rust_xlsxwriter::XlsxError,
    },

    /// Delimited text serialisation error.
    Csv { path: PathBuf, source: csv::Error },

    /// I/O error writing the artifact.
    Io { path: PathBuf, source: io::Error },

    /// A row does not have the column count its schema declares.
    ColumnMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xlsx { path, source } => {
                write!(f, "Workbook error '{}': {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "Text report error '{}': {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "Report I/O error '{}': {source}", path.display())
            }
            Self::ColumnMismatch {
                row,
                expected,
                actual,
            } => write!(
                f,
                "Report row {row} has {actual} columns, schema declares {expected}"
            ),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Xlsx { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::ColumnMismatch { .. } => None,
        }
    }
}

impl From<ReportError> for LogSieveError {
    fn from(e: ReportError) -> Self {
        Self::Report(e)
    }
}

// ---------------------------------------------------------------------------
// Run errors
// ---------------------------------------------------------------------------

/// Requests refused by the run controller.
#[derive(Debug)]
pub enum RunError {
    /// Validation found one or more problems; the full list is attached.
    ConfigurationInvalid { reasons: Vec<String> },

    /// A run is already active on this pipeline.
    AlreadyRunning,

    /// A stop was requested but no run is active.
    NotRunning,

    /// The worker thread could not be spawned.
    WorkerSpawn { source: io::Error },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigurationInvalid { reasons } => {
                write!(f, "Configuration is invalid: {}", reasons.join("; "))
            }
            Self::AlreadyRunning => write!(f, "Processing is already running"),
            Self::NotRunning => write!(f, "There is no running process to stop"),
            Self::WorkerSpawn { source } => {
                write!(f, "Cannot start processing worker: {source}")
            }
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WorkerSpawn { source } => Some(source),
            _ => None,
        }
    }
}

impl From<RunError> for LogSieveError {
    fn from(e: RunError) -> Self {
        Self::Run(e)
    }
}

/// Convenience type alias for LogSieve results.
pub type Result<T> = std::result::Result<T, LogSieveError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_configuration_invalid_lists_every_reason() {
        let err = RunError::ConfigurationInvalid {
            reasons: vec!["log path missing".to_string(), "no rules".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("log path missing"));
        assert!(text.contains("no rules"));
    }

    #[test]
    fn test_read_error_preserves_source() {
        let err: LogSieveError = ReadError {
            file: PathBuf::from("a.log"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        }
        .into();
        let source = err.source().and_then(|s| s.source());
        assert!(source.is_some(), "io::Error should stay in the chain");
        assert!(err.to_string().contains("a.log"));
    }

    #[test]
    fn test_unknown_report_type_names_tag() {
        let err = ConfigError::UnknownReportType {
            tag: "XYZ".to_string(),
        };
        assert!(err.to_string().contains("'XYZ'"));
    }
}
