// LogSieve - platform/config.rs
//
// Platform directory resolution and config.toml loading with startup
// validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.
//
// The pipeline reads settings only through the `SettingsProvider` trait;
// `Settings` is the TOML-backed implementation. Settings are never
// written back.

use crate::core::discovery::{normalize_extensions, parse_extension_list};
use crate::core::model::{OutputFormats, ReportType, RuleKey, RuleKind, RuleSet};
use crate::util::constants;
use crate::util::error::ConfigError;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use directories::ProjectDirs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Resolved platform paths for LogSieve configuration and data.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logsieve/ or %APPDATA%\LogSieve\config\)
    pub config_dir: PathBuf,

    /// Data directory for the durable error log.
    pub data_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            let data_dir = proj_dirs.data_dir().to_path_buf();

            tracing::debug!(
                config = %config_dir.display(),
                data = %data_dir.display(),
                "Platform paths resolved"
            );

            Self {
                config_dir,
                data_dir,
            }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            let fallback = PathBuf::from(".");
            Self {
                config_dir: fallback.clone(),
                data_dir: fallback,
            }
        }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }

    /// Default location of the durable error log.
    pub fn error_log_file(&self) -> PathBuf {
        self.data_dir.join(constants::ERROR_LOG_FILE_NAME)
    }
}

// =============================================================================
// Settings provider seam
// =============================================================================

/// Read-only access to the configuration store.
pub trait SettingsProvider: Send + Sync {
    fn log_path(&self) -> Option<PathBuf>;

    fn report_path(&self) -> Option<PathBuf>;

    /// Normalised extensions (lower-case, no leading dot).
    fn compatible_extensions(&self) -> Vec<String>;

    /// Configured report type; `None` when absent or unrecognised.
    fn report_type(&self) -> Option<ReportType>;

    /// Pattern stored under `key`; `None` when the rule is disabled.
    fn filter_pattern(&self, key: RuleKey) -> Option<String>;

    /// Inclusive period used as the time window.
    fn period(&self) -> (DateTime<Local>, DateTime<Local>);

    /// chrono format of the structured report's date column.
    fn date_format(&self) -> String;

    fn output_formats(&self) -> OutputFormats;

    /// Free-text value associated with the CDMC report type.
    fn cdmc_value(&self) -> Option<String>;

    /// Active rule set for `report_type`, resolved through the rule lookup
    /// table.
    fn rules_for(&self, report_type: ReportType) -> RuleSet {
        RuleSet::from_patterns(RuleKind::all().iter().filter_map(|kind| {
            self.filter_pattern(RuleKey::new(*kind, report_type))
                .map(|p| (*kind, p))
        }))
    }
}

/// Validated settings derived from config.toml.
#[derive(Debug, Clone)]
pub struct Settings {
    // -- Paths --
    pub log_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,

    // -- General --
    pub compatible_extensions: Vec<String>,

    // -- Report types --
    pub report_type: Option<ReportType>,
    pub cdmc_value: Option<String>,

    /// Rule lookup table. Only non-blank patterns are stored.
    pub filters: HashMap<RuleKey, String>,

    // -- Period --
    pub period_start: DateTime<Local>,
    pub period_end: DateTime<Local>,

    // -- Output --
    pub date_format: String,
    pub output_formats: OutputFormats,

    // -- Logging --
    pub log_level: Option<String>,
    pub error_log_enabled: bool,
    pub error_log_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_day(Local::now().date_naive())
    }
}

impl Settings {
    /// Defaults with the period covering the whole of `day`.
    pub fn for_day(day: NaiveDate) -> Self {
        Self {
            log_path: None,
            report_path: None,
            compatible_extensions: constants::DEFAULT_COMPATIBLE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            report_type: Some(ReportType::Ict),
            cdmc_value: None,
            filters: HashMap::new(),
            period_start: local_instant(day.and_time(NaiveTime::default())),
            period_end: local_instant(day.and_time(end_of_day())),
            date_format: constants::DEFAULT_REPORT_DATE_FORMAT.to_string(),
            output_formats: OutputFormats::default(),
            log_level: None,
            error_log_enabled: true,
            error_log_path: None,
        }
    }

    /// Store `pattern` under `key`; a blank pattern disables the rule.
    pub fn set_filter(&mut self, key: RuleKey, pattern: impl Into<String>) {
        let pattern = pattern.into();
        if pattern.trim().is_empty() {
            self.filters.remove(&key);
        } else {
            self.filters.insert(key, pattern);
        }
    }
}

impl SettingsProvider for Settings {
    fn log_path(&self) -> Option<PathBuf> {
        self.log_path.clone()
    }

    fn report_path(&self) -> Option<PathBuf> {
        self.report_path.clone()
    }

    fn compatible_extensions(&self) -> Vec<String> {
        self.compatible_extensions.clone()
    }

    fn report_type(&self) -> Option<ReportType> {
        self.report_type
    }

    fn filter_pattern(&self, key: RuleKey) -> Option<String> {
        self.filters.get(&key).cloned()
    }

    fn period(&self) -> (DateTime<Local>, DateTime<Local>) {
        (self.period_start, self.period_end)
    }

    fn date_format(&self) -> String {
        self.date_format.clone()
    }

    fn output_formats(&self) -> OutputFormats {
        self.output_formats
    }

    fn cdmc_value(&self) -> Option<String> {
        self.cdmc_value.clone()
    }
}

// =============================================================================
// config.toml shape
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawSettings {
    pub paths: PathsSection,
    pub general: GeneralSection,
    pub report_types: ReportTypesSection,
    /// `[filters.<tag>]` tables keyed by report type tag.
    pub filters: HashMap<String, FilterSection>,
    pub period: PeriodSection,
    pub output_formats: OutputFormatsSection,
    pub format: FormatSection,
    pub logging: LoggingSection,
}

/// `[paths]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub log_path: Option<String>,
    pub report_path: Option<String>,
}

/// `[general]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct GeneralSection {
    /// Either a list or a comma-separated string.
    pub compatible_extensions: Option<ExtensionList>,
}

/// Extension list as written in config.toml.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
pub enum ExtensionList {
    Joined(String),
    List(Vec<String>),
}

/// `[report_types]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ReportTypesSection {
    pub report_type: Option<String>,
    pub cdmc_value: Option<String>,
}

/// `[filters.<tag>]` config section. One key per rule index.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct FilterSection {
    /// Rule 1.
    pub starts_or_ends_with: Option<String>,
    /// Rule 2.
    pub contains: Option<String>,
    /// Rule 3.
    pub token: Option<String>,
    /// Rule 4.
    pub exclude: Option<String>,
}

impl FilterSection {
    fn patterns(&self) -> [(RuleKind, Option<&String>); 4] {
        [
            (RuleKind::StartsOrEndsWith, self.starts_or_ends_with.as_ref()),
            (RuleKind::OrContains, self.contains.as_ref()),
            (RuleKind::AndContainsToken, self.token.as_ref()),
            (RuleKind::AndNotContains, self.exclude.as_ref()),
        ]
    }
}

/// `[period]` config section (`MM/DD/YYYY`, `HH:MM:SS`).
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct PeriodSection {
    pub start_date: Option<String>,
    pub start_time: Option<String>,
    pub end_date: Option<String>,
    pub end_time: Option<String>,
}

/// `[output_formats]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct OutputFormatsSection {
    pub txt: Option<bool>,
    pub xlsx: Option<bool>,
}

/// `[format]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct FormatSection {
    pub date_format: Option<String>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Enable the durable error log (default true).
    pub error_log: Option<bool>,
    /// Error log file path (default: platform data dir).
    pub error_log_path: Option<String>,
}

// =============================================================================
// Loading and validation
// =============================================================================

/// Load and validate the settings file at `path`.
///
/// Returns validated settings and a list of non-fatal warnings. A missing
/// file yields defaults with no warnings (first run); an unreadable or
/// unparseable file yields defaults with a warning.
pub fn load_settings(path: &Path) -> (Settings, Vec<String>) {
    let today = Local::now().date_naive();

    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config.toml found; using defaults");
        return (Settings::for_day(today), Vec::new());
    }

    let raw = match read_raw_settings(path) {
        Ok(r) => r,
        Err(e) => {
            let msg = format!("{e}. Using defaults.");
            tracing::warn!("{}", msg);
            return (Settings::for_day(today), vec![msg]);
        }
    };

    tracing::info!(path = %path.display(), "Loaded config.toml");

    validate(raw, today)
}

/// Read and parse config.toml without validating any value.
pub fn read_raw_settings(path: &Path) -> Result<RawSettings, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Validate a parsed config against `today` (used for period defaults),
/// accumulating every warning.
pub fn validate(raw: RawSettings, today: NaiveDate) -> (Settings, Vec<String>) {
    let mut settings = Settings::for_day(today);
    let mut warnings: Vec<String> = Vec::new();

    // -- Paths --
    settings.log_path = non_blank(raw.paths.log_path).map(PathBuf::from);
    settings.report_path = non_blank(raw.paths.report_path).map(PathBuf::from);

    // -- General: compatible_extensions --
    if let Some(list) = raw.general.compatible_extensions {
        let exts = match list {
            ExtensionList::Joined(s) => parse_extension_list(&s),
            ExtensionList::List(v) => normalize_extensions(&v),
        };
        if exts.is_empty() {
            warnings.push(
                "[general] compatible_extensions is empty. No files will be scanned until \
                 at least one extension is configured."
                    .to_string(),
            );
        }
        settings.compatible_extensions = exts;
    }

    // -- Report types --
    if let Some(tag) = non_blank(raw.report_types.report_type) {
        match ReportType::parse(&tag) {
            Ok(rt) => settings.report_type = Some(rt),
            Err(e) => {
                warnings.push(format!("[report_types] {e}"));
                settings.report_type = None;
            }
        }
    }
    settings.cdmc_value = non_blank(raw.report_types.cdmc_value);
    if settings.report_type == Some(ReportType::Cdmc) && settings.cdmc_value.is_none() {
        warnings.push("[report_types] cdmc_value is empty for the CDMC report type.".to_string());
    }

    // -- Filters --
    let mut tags: Vec<&String> = raw.filters.keys().collect();
    tags.sort();
    let mut seen: HashMap<ReportType, &String> = HashMap::new();
    for tag in tags {
        let report_type = match ReportType::parse(tag) {
            Ok(rt) => rt,
            Err(e) => {
                warnings.push(format!("[filters.{tag}] ignored: {e}"));
                continue;
            }
        };
        if let Some(first) = seen.get(&report_type) {
            warnings.push(format!(
                "[filters.{tag}] ignored: [filters.{first}] already sets the {report_type} rules."
            ));
            continue;
        }
        seen.insert(report_type, tag);
        if let Some(section) = raw.filters.get(tag) {
            for (kind, pattern) in section.patterns() {
                if let Some(p) = pattern {
                    settings.set_filter(RuleKey::new(kind, report_type), p.as_str());
                }
            }
        }
    }

    // -- Period --
    let p = &raw.period;
    if let Some(start) = parse_period(
        "start",
        p.start_date.as_deref(),
        p.start_time.as_deref(),
        constants::DEFAULT_PERIOD_START_TIME,
        today,
        &mut warnings,
    ) {
        settings.period_start = start;
    }
    if let Some(end) = parse_period(
        "end",
        p.end_date.as_deref(),
        p.end_time.as_deref(),
        constants::DEFAULT_PERIOD_END_TIME,
        today,
        &mut warnings,
    ) {
        settings.period_end = end;
    }

    // -- Output formats --
    if let Some(txt) = raw.output_formats.txt {
        settings.output_formats.txt = txt;
    }
    if let Some(xlsx) = raw.output_formats.xlsx {
        settings.output_formats.xlsx = xlsx;
    }

    // -- Format: date_format --
    if let Some(fmt) = non_blank(raw.format.date_format) {
        if is_valid_date_format(&fmt) {
            settings.date_format = fmt;
        } else {
            warnings.push(format!(
                "[format] date_format = \"{fmt}\" is not a valid strftime format. \
                 Using default ({}).",
                constants::DEFAULT_REPORT_DATE_FORMAT
            ));
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            settings.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    // -- Logging: error log --
    if let Some(enabled) = raw.logging.error_log {
        settings.error_log_enabled = enabled;
    }
    settings.error_log_path = non_blank(raw.logging.error_log_path).map(PathBuf::from);

    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "Config validation produced warnings"
        );
    }

    (settings, warnings)
}

/// True when `fmt` contains no unknown strftime specifiers.
pub fn is_valid_date_format(fmt: &str) -> bool {
    !StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error))
}

fn parse_period(
    which: &str,
    date: Option<&str>,
    time: Option<&str>,
    default_time: &str,
    today: NaiveDate,
    warnings: &mut Vec<String>,
) -> Option<DateTime<Local>> {
    if date.is_none() && time.is_none() {
        return None;
    }

    let day = match date.map(str::trim).filter(|s| !s.is_empty()) {
        Some(d) => match NaiveDate::parse_from_str(d, constants::PERIOD_DATE_FORMAT) {
            Ok(d) => d,
            Err(_) => {
                warnings.push(format!(
                    "[period] {which}_date = \"{d}\" is invalid. Expected MM/DD/YYYY. Using today."
                ));
                today
            }
        },
        None => today,
    };

    let time_text = time
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_time);
    let clock = match NaiveTime::parse_from_str(time_text, constants::PERIOD_TIME_FORMAT) {
        Ok(t) => t,
        Err(_) => {
            warnings.push(format!(
                "[period] {which}_time = \"{time_text}\" is invalid. Expected HH:MM:SS. \
                 Using {default_time}."
            ));
            NaiveTime::parse_from_str(default_time, constants::PERIOD_TIME_FORMAT)
                .unwrap_or(NaiveTime::default())
        }
    };

    Some(local_instant(day.and_time(clock)))
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::default())
}

/// Interpret a wall-clock time in the local zone. Ambiguous times take the
/// earlier instant; times skipped by a DST jump fall back to UTC.
fn local_instant(naive: NaiveDateTime) -> DateTime<Local> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
