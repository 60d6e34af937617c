// LogSieve - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no
// platform dependencies. These types are the shared vocabulary across
// all layers.

use crate::util::error::ConfigError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Report type
// =============================================================================

/// Named mode selecting the active rule set and the report schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReportType {
    Ict,
    Eol,
    Custom,
    Concatenation,
    Cdmc,
}

impl ReportType {
    /// Returns all variants in display order.
    pub fn all() -> &'static [ReportType] {
        &[
            ReportType::Ict,
            ReportType::Eol,
            ReportType::Custom,
            ReportType::Concatenation,
            ReportType::Cdmc,
        ]
    }

    /// Tag used in settings sections and report file names.
    pub fn tag(&self) -> &'static str {
        match self {
            ReportType::Ict => "ICT",
            ReportType::Eol => "EOL",
            ReportType::Custom => "Custom",
            ReportType::Concatenation => "Concatenation",
            ReportType::Cdmc => "CDMC",
        }
    }

    /// Parse a tag case-insensitively, accepting the short aliases used by
    /// older configuration files. Unknown tags are an error.
    pub fn parse(tag: &str) -> Result<Self, ConfigError> {
        match tag.trim().to_uppercase().as_str() {
            "I" | "ICT" => Ok(ReportType::Ict),
            "E" | "EOL" => Ok(ReportType::Eol),
            "C" | "CUSTOM" => Ok(ReportType::Custom),
            "CON" | "CONCATENATION" | "CONCATENARE" => Ok(ReportType::Concatenation),
            "CDMC" => Ok(ReportType::Cdmc),
            _ => Err(ConfigError::UnknownReportType {
                tag: tag.to_string(),
            }),
        }
    }

    /// Report assembler variant producing this type's artifact.
    pub fn variant(&self) -> ReportVariant {
        match self {
            ReportType::Ict | ReportType::Eol | ReportType::Cdmc => ReportVariant::Ict,
            ReportType::Custom => ReportVariant::Custom,
            ReportType::Concatenation => ReportVariant::Concatenation,
        }
    }

    /// Whether this type scans without a time window.
    pub fn is_unbounded(&self) -> bool {
        matches!(self, ReportType::Concatenation)
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for ReportType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Report schema families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportVariant {
    /// Structured rows built per accepted line during the scan.
    Ict,
    /// One row per matched file, with a header row.
    Custom,
    /// One row per matched file, no header row.
    Concatenation,
}

// =============================================================================
// Filter rules
// =============================================================================

/// Rule semantics. The kind is fixed per rule index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleKind {
    /// Index 1: line starts with or ends with the pattern.
    StartsOrEndsWith,
    /// Index 2: line contains the pattern.
    OrContains,
    /// Index 3: pattern is one of the whitespace-delimited tokens.
    AndContainsToken,
    /// Index 4: line does not contain the pattern.
    AndNotContains,
}

impl RuleKind {
    /// All kinds in index order.
    pub fn all() -> &'static [RuleKind] {
        &[
            RuleKind::StartsOrEndsWith,
            RuleKind::OrContains,
            RuleKind::AndContainsToken,
            RuleKind::AndNotContains,
        ]
    }

    /// Rule index (1-4).
    pub fn index(&self) -> u8 {
        match self {
            RuleKind::StartsOrEndsWith => 1,
            RuleKind::OrContains => 2,
            RuleKind::AndContainsToken => 3,
            RuleKind::AndNotContains => 4,
        }
    }

    /// Kind for a rule index; `None` outside 1-4.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::all().get(usize::from(index).checked_sub(1)?).copied()
    }
}

/// Structured lookup key for a configured rule pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    pub kind: RuleKind,
    pub report_type: ReportType,
}

impl RuleKey {
    pub fn new(kind: RuleKind, report_type: ReportType) -> Self {
        Self { kind, report_type }
    }
}

/// One configured rule. A rule is enabled exactly when its pattern is
/// non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    pub kind: RuleKind,
    pub pattern: String,
}

impl FilterRule {
    pub fn new(kind: RuleKind, pattern: impl Into<String>) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
        }
    }

    pub fn index(&self) -> u8 {
        self.kind.index()
    }

    pub fn is_enabled(&self) -> bool {
        !self.pattern.trim().is_empty()
    }
}

/// The active rules for one report type, at most one per kind.
///
/// Only enabled rules are stored: inserting a blank pattern removes the
/// rule for that kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<FilterRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(kind, pattern)` pairs; blank patterns are skipped.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = (RuleKind, S)>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for (kind, pattern) in patterns {
            set.insert(FilterRule::new(kind, pattern));
        }
        set
    }

    /// Insert or replace the rule for `rule.kind`. A disabled rule clears
    /// that kind instead.
    pub fn insert(&mut self, rule: FilterRule) {
        self.rules.retain(|r| r.kind != rule.kind);
        if rule.is_enabled() {
            self.rules.push(rule);
            self.rules.sort_by_key(|r| r.kind);
        }
    }

    pub fn get(&self, kind: RuleKind) -> Option<&FilterRule> {
        self.rules.iter().find(|r| r.kind == kind)
    }

    /// Enabled rules in index order.
    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }
}

// =============================================================================
// Time window
// =============================================================================

/// Inclusive creation-time range restricting which files are scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// No restriction (Concatenation reports).
    Unbounded,
    /// Inclusive `[start, end]`.
    Bounded {
        start: DateTime<Local>,
        end: DateTime<Local>,
    },
}

impl TimeWindow {
    pub fn bounded(start: DateTime<Local>, end: DateTime<Local>) -> Self {
        Self::Bounded { start, end }
    }

    /// Window that applies to `report_type`: unbounded for Concatenation,
    /// the configured range otherwise.
    pub fn for_report_type(
        report_type: ReportType,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> Self {
        if report_type.is_unbounded() {
            Self::Unbounded
        } else {
            Self::bounded(start, end)
        }
    }

    /// `start <= end`, or unbounded.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Bounded { start, end } => start <= end,
        }
    }

    pub fn contains(&self, instant: &DateTime<Local>) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Bounded { start, end } => start <= instant && instant <= end,
        }
    }
}

// =============================================================================
// Files and extracted fields
// =============================================================================

/// Read-only view over one scanned log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileRef {
    pub path: PathBuf,
    pub created: DateTime<Local>,
}

impl LogFileRef {
    pub fn new(path: impl Into<PathBuf>, created: DateTime<Local>) -> Self {
        Self {
            path: path.into(),
            created,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name as UTF-8 (lossy), empty if the path has none.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Outcome of extracting one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// The field was extracted.
    Found(String),
    /// Extraction ran but the marker was absent.
    NotFound,
    /// Extraction failed (I/O or metadata error).
    Failed,
}

impl FieldValue {
    pub fn as_found(&self) -> Option<&str> {
        match self {
            FieldValue::Found(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldValue::Found(_))
    }
}

/// Structured fields pulled from one file, independent of filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    pub file_name: FieldValue,
    pub creation_date: FieldValue,
    pub start_line: FieldValue,
    pub lot_line: FieldValue,
}

/// Ordered cells of one report row.
pub type ReportRow = Vec<String>;

/// Enabled report output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFormats {
    /// Semicolon-delimited `.txt` artifact.
    pub txt: bool,
    /// `.xlsx` workbook artifact.
    pub xlsx: bool,
}

impl Default for OutputFormats {
    fn default() -> Self {
        Self {
            txt: false,
            xlsx: true,
        }
    }
}

impl OutputFormats {
    pub fn any(&self) -> bool {
        self.txt || self.xlsx
    }
}

// =============================================================================
// Run lifecycle
// =============================================================================

/// Phase of the pipeline's current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Idle,
    Validating,
    Scanning,
    Cancelled,
    Completed,
    Failed,
}

/// Terminal state of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Failed,
}

/// Statistics left behind after a run ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub report_type: ReportType,
    /// Files finished (matched or not, including unreadable ones).
    pub processed: usize,
    /// Candidate files listed by the scan.
    pub total: usize,
    /// Files with at least one accepted line.
    pub matched: usize,
    /// Errors reported during the run.
    pub errors: usize,
    /// Report artifacts written.
    pub reports: Vec<PathBuf>,
    /// Wall-clock run duration.
    pub duration: Duration,
}

/// Notifications sent from the run worker to every subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// Scanning finished and per-file filtering begins.
    Started {
        report_type: ReportType,
        total_files: usize,
    },

    /// A file was finished (matched or not).
    Progress { processed: usize, total: usize },

    /// A file had at least one accepted line. Sent once per file.
    FileMatched { path: PathBuf },

    /// A non-fatal error; the run continues.
    Error { message: String },

    /// A condition worth reporting that is not an error.
    Warning { message: String },

    /// A report artifact was written.
    ReportWritten { path: PathBuf },

    /// The run finished normally.
    Completed { summary: RunSummary },

    /// The run stopped at a file boundary after a cancel request.
    Cancelled { summary: RunSummary },

    /// The run could not proceed (scan failure).
    Failed { error: String, summary: RunSummary },
}

impl RunEvent {
    /// True for the last event of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEvent::Completed { .. } | RunEvent::Cancelled { .. } | RunEvent::Failed { .. }
        )
    }

    /// Summary carried by a terminal event.
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunEvent::Completed { summary }
            | RunEvent::Cancelled { summary }
            | RunEvent::Failed { summary, .. } => Some(summary),
            _ => None,
        }
    }
}
