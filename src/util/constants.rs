// LogSieve - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LogSieve";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "LogSieve";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Scanning
// =============================================================================

/// Extensions accepted when `[general] compatible_extensions` is absent.
pub const DEFAULT_COMPATIBLE_EXTENSIONS: &[&str] = &["log", "txt"];

/// File size in bytes above which log files are read through a memory map
/// instead of a heap buffer.
pub const LARGE_FILE_THRESHOLD: u64 = 64 * 1024 * 1024; // 64 MB

/// Retry limits for transient I/O errors while reading a log file.
pub const MAX_READ_RETRIES: u32 = 3;
pub const READ_RETRY_DELAYS_MS: [u64; 3] = [50, 100, 200];

// =============================================================================
// Field extraction
// =============================================================================

/// Prefix identifying the start-of-test marker line.
pub const START_MARKER: &str = "START";

/// Prefix identifying the lot marker line.
pub const LOT_MARKER: &str = "LOT";

/// Canonical rendering of a file's creation timestamp.
pub const CREATION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cell text used for any value that could not be produced.
pub const NOT_AVAILABLE: &str = "N/A";

/// Field separator inside marker lines and matched ICT lines.
pub const FIELD_SEPARATOR: char = ';';

// =============================================================================
// Reports
// =============================================================================

/// Default chrono format for the "log date" column of structured reports.
pub const DEFAULT_REPORT_DATE_FORMAT: &str = "%m/%d/%Y";

/// Timestamp embedded in report file names (second resolution).
pub const REPORT_FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Header row height (points) for styled report headers.
pub const HEADER_ROW_HEIGHT: f64 = 20.0;

/// Background colour (RGB) of styled report header cells.
pub const HEADER_BACKGROUND_RGB: u32 = 0x00_33_66;

/// Delimiter used by the plain-text report output.
pub const TEXT_REPORT_DELIMITER: u8 = b';';

// =============================================================================
// Period (time window) settings
// =============================================================================

/// Date format accepted in `[period] start_date` / `end_date`.
pub const PERIOD_DATE_FORMAT: &str = "%m/%d/%Y";

/// Time format accepted in `[period] start_time` / `end_time`.
pub const PERIOD_TIME_FORMAT: &str = "%H:%M:%S";

/// Start-of-day time used when `[period] start_time` is absent.
pub const DEFAULT_PERIOD_START_TIME: &str = "00:00:00";

/// End-of-day time used when `[period] end_time` is absent.
pub const DEFAULT_PERIOD_END_TIME: &str = "23:59:59";

// =============================================================================
// Error log
// =============================================================================

/// Durable error log file name.
pub const ERROR_LOG_FILE_NAME: &str = "error.log";

/// Rotated error log file name.
pub const ERROR_LOG_BACKUP_FILE_NAME: &str = "error_old.log";

/// Size in bytes after which the error log is rotated.
pub const ERROR_LOG_MAX_SIZE: u64 = 1024 * 1024; // 1 MiB

/// Write attempts for one error log line before giving up.
pub const ERROR_LOG_WRITE_ATTEMPTS: u32 = 3;

/// Delay between error log write attempts (ms).
pub const ERROR_LOG_RETRY_DELAY_MS: u64 = 100;

/// Timestamp format of error log lines.
pub const ERROR_LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in debug output.
/// Prevents accidental exposure of sensitive data in long lines.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
