// LogSieve - app/pipeline.rs
//
// Run controller. Validates the configuration, then lists, filters and
// reports on a dedicated worker thread, broadcasting `RunEvent`s to every
// subscriber.
//
// Architecture:
//   - `LogProcessingPipeline` owns the mutable configuration and at most one
//     active `ProcessingRun`. `start()` snapshots the configuration, so
//     setters called during a run only affect the next one.
//   - The worker communicates only through `RunEvent`s fanned out over mpsc
//     channels, one per subscriber. Dropped receivers are pruned.
//   - Cancellation is a cooperative `AtomicBool` checked at every file
//     boundary.
//   - The active slot is claimed before validation, so a run is visible in
//     the Validating phase, and released right before the terminal event is
//     broadcast. Observers reacting to `Completed`, `Cancelled` or `Failed`
//     already see the pipeline idle.
//   - A drop guard releases the slot on every worker exit path. When the
//     worker panics it also broadcasts `Failed`, so no subscriber waits on a
//     run that will never finish.
//
// Error routing:
//   - Start/stop refusals are returned to the caller and appended to the
//     durable error log; no event is emitted for them.
//   - Every in-run error is broadcast as `RunEvent::Error` and appended to
//     the durable error log. The two sinks are independent: a failing error
//     log never suppresses the event.
//   - Per-file read and extraction errors never stop the run; the file still
//     counts as processed.

use crate::core::discovery;
use crate::core::export::{writers_for, WriterFactory};
use crate::core::extract::FieldExtractor;
use crate::core::filter;
use crate::core::model::{
    LogFileRef, OutputFormats, ReportType, ReportVariant, RuleSet, RunEvent, RunOutcome,
    RunPhase, RunSummary, TimeWindow,
};
use crate::core::report::ReportAssembler;
use crate::platform::config::SettingsProvider;
use crate::platform::error_log::{ErrorSink, Severity};
use crate::platform::fs;
use crate::util::error::{ConfigError, ReadError, RunError};
use crate::util::logging::preview;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Event fan-out
// =============================================================================

/// Receives the events of a run.
pub trait EventSink {
    fn emit(&self, event: RunEvent);
}

#[derive(Clone)]
enum Subscriber {
    Unbounded(mpsc::Sender<RunEvent>),
    /// Blocks the worker when full.
    Bounded(mpsc::SyncSender<RunEvent>),
}

impl Subscriber {
    /// False once the receiver has been dropped.
    fn send(&self, event: RunEvent) -> bool {
        match self {
            Subscriber::Unbounded(tx) => tx.send(event).is_ok(),
            Subscriber::Bounded(tx) => tx.send(event).is_ok(),
        }
    }
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    subscribers: Vec<(u64, Subscriber)>,
}

/// Broadcasts every event to all live subscribers, in emission order per
/// subscriber.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe with an unbounded queue.
    pub fn subscribe(&self) -> mpsc::Receiver<RunEvent> {
        let (tx, rx) = mpsc::channel();
        self.add(Subscriber::Unbounded(tx));
        rx
    }

    /// Subscribe with a queue of `capacity` events. The worker waits while
    /// the queue is full; capacity 0 hands over each event synchronously.
    pub fn subscribe_with_capacity(&self, capacity: usize) -> mpsc::Receiver<RunEvent> {
        let (tx, rx) = mpsc::sync_channel(capacity);
        self.add(Subscriber::Bounded(tx));
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }

    fn add(&self, subscriber: Subscriber) {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, subscriber));
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: RunEvent) {
        // Send outside the lock: a full bounded subscriber must not block
        // new subscriptions.
        let targets = lock(&self.inner).subscribers.clone();

        let mut dead: Vec<u64> = Vec::new();
        for (id, subscriber) in &targets {
            if !subscriber.send(event.clone()) {
                dead.push(*id);
            }
        }

        if !dead.is_empty() {
            lock(&self.inner)
                .subscribers
                .retain(|(id, _)| !dead.contains(id));
            tracing::debug!(dropped = dead.len(), "Pruned closed subscribers");
        }
    }
}

// =============================================================================
// Run state
// =============================================================================

/// Live state of the active run. Shared between the controller and the
/// worker; dropped when the run ends.
#[derive(Debug)]
pub struct ProcessingRun {
    processed: AtomicUsize,
    total: AtomicUsize,
    cancel_requested: AtomicBool,
    phase: Mutex<RunPhase>,
}

impl ProcessingRun {
    fn new() -> Self {
        Self {
            processed: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            cancel_requested: AtomicBool::new(false),
            phase: Mutex::new(RunPhase::Validating),
        }
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> RunPhase {
        *lock(&self.phase)
    }

    fn set_phase(&self, phase: RunPhase) {
        *lock(&self.phase) = phase;
    }
}

type ActiveSlot = Arc<Mutex<Option<Arc<ProcessingRun>>>>;

/// Clear `slot` if it still holds `run`.
fn release_slot(slot: &ActiveSlot, run: &Arc<ProcessingRun>) {
    let mut slot = lock(slot);
    if slot.as_ref().is_some_and(|r| Arc::ptr_eq(r, run)) {
        *slot = None;
    }
}

/// The worker's view of its run: forwards events to the bus and releases
/// the active slot when the run ends, however it ends.
struct RunGuard {
    slot: ActiveSlot,
    last_summary: Arc<Mutex<Option<RunSummary>>>,
    bus: EventBus,
    error_log: Arc<dyn ErrorSink>,
    run: Arc<ProcessingRun>,
    report_type: ReportType,
    started: Instant,
    released: AtomicBool,
}

impl RunGuard {
    /// Record the summary and give up the active slot. Only the first call
    /// has an effect.
    fn release(&self, summary: &RunSummary) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        *lock(&self.last_summary) = Some(summary.clone());
        release_slot(&self.slot, &self.run);
    }
}

impl EventSink for RunGuard {
    fn emit(&self, event: RunEvent) {
        if let Some(summary) = event.summary() {
            self.release(summary);
        }
        self.bus.emit(event);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.released.load(Ordering::SeqCst) {
            return;
        }
        if !std::thread::panicking() {
            // Worker never started.
            release_slot(&self.slot, &self.run);
            return;
        }

        let error = "Processing worker stopped unexpectedly".to_string();
        tracing::error!(report_type = %self.report_type, "Processing worker panicked");
        if let Err(e) = self.error_log.append(Severity::Error, &error) {
            tracing::warn!(error = %e, "Error log append failed");
        }
        self.run.set_phase(RunPhase::Failed);
        let summary = RunSummary {
            outcome: RunOutcome::Failed,
            report_type: self.report_type,
            processed: self.run.processed(),
            total: self.run.total(),
            matched: 0,
            errors: 1,
            reports: Vec::new(),
            duration: self.started.elapsed(),
        };
        self.emit(RunEvent::Failed { error, summary });
    }
}

/// Handle to a started run.
pub struct RunHandle {
    handle: JoinHandle<RunSummary>,
    run: Arc<ProcessingRun>,
}

impl RunHandle {
    /// Request cancellation of this run.
    pub fn cancel(&self) {
        self.run.request_cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker. `None` if it panicked.
    pub fn join(self) -> Option<RunSummary> {
        self.handle.join().ok()
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Mutable pipeline configuration. Copied at `start()`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub log_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub report_type: Option<ReportType>,
    pub rules: RuleSet,
    pub period_start: DateTime<Local>,
    pub period_end: DateTime<Local>,
    pub extensions: Vec<String>,
    pub date_format: String,
    pub output_formats: OutputFormats,
}

impl PipelineConfig {
    pub fn from_settings(settings: &dyn SettingsProvider) -> Self {
        let report_type = settings.report_type();
        let (period_start, period_end) = settings.period();
        Self {
            log_path: settings.log_path(),
            report_path: settings.report_path(),
            report_type,
            rules: report_type
                .map(|rt| settings.rules_for(rt))
                .unwrap_or_default(),
            period_start,
            period_end,
            extensions: discovery::normalize_extensions(&settings.compatible_extensions()),
            date_format: settings.date_format(),
            output_formats: settings.output_formats(),
        }
    }

    /// Window applied to the scan: unbounded for Concatenation.
    pub fn window(&self) -> TimeWindow {
        match self.report_type {
            Some(rt) => TimeWindow::for_report_type(rt, self.period_start, self.period_end),
            None => TimeWindow::bounded(self.period_start, self.period_end),
        }
    }

    /// Every problem that blocks a run, in one list.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        check_dir("Log path", self.log_path.as_deref(), &mut problems);
        check_dir("Report path", self.report_path.as_deref(), &mut problems);

        match self.report_type {
            Some(rt) if self.rules.is_empty() => {
                problems.push(format!("No filter rule is enabled for the {rt} report"));
            }
            Some(_) => {}
            None => {
                problems.push("Report type is not set".to_string());
                if self.rules.is_empty() {
                    problems.push("No filter rule is enabled".to_string());
                }
            }
        }

        if !self.window().is_valid() {
            problems.push(format!(
                "Period start ({}) is after period end ({})",
                self.period_start.format("%m/%d/%Y %H:%M:%S"),
                self.period_end.format("%m/%d/%Y %H:%M:%S")
            ));
        }

        if self.extensions.is_empty() {
            problems.push("No compatible file extension is configured".to_string());
        }

        if !self.output_formats.any() {
            problems.push("No output format is enabled".to_string());
        }

        problems
    }

    fn snapshot(&self, writers: WriterFactory) -> Option<RunConfig> {
        Some(RunConfig {
            log_path: self.log_path.clone()?,
            report_path: self.report_path.clone()?,
            report_type: self.report_type?,
            rules: self.rules.clone(),
            window: self.window(),
            extensions: self.extensions.clone(),
            date_format: self.date_format.clone(),
            output_formats: self.output_formats,
            writers,
        })
    }
}

fn check_dir(label: &str, path: Option<&Path>, problems: &mut Vec<String>) {
    match path {
        None => problems.push(format!("{label} is not set")),
        Some(p) if !p.is_dir() => {
            problems.push(format!("{label} '{}' does not exist", p.display()));
        }
        Some(_) => {}
    }
}

/// Resolved configuration of one run.
#[derive(Clone)]
struct RunConfig {
    log_path: PathBuf,
    report_path: PathBuf,
    report_type: ReportType,
    rules: RuleSet,
    window: TimeWindow,
    extensions: Vec<String>,
    date_format: String,
    output_formats: OutputFormats,
    writers: WriterFactory,
}

// =============================================================================
// LogProcessingPipeline
// =============================================================================

/// Validates, runs and observes processing runs. At most one run is active
/// at a time.
pub struct LogProcessingPipeline {
    settings: Arc<dyn SettingsProvider>,
    error_sink: Arc<dyn ErrorSink>,
    config: Mutex<PipelineConfig>,
    bus: EventBus,
    active: ActiveSlot,
    last_summary: Arc<Mutex<Option<RunSummary>>>,
    writers: WriterFactory,
}

impl LogProcessingPipeline {
    pub fn new(settings: Arc<dyn SettingsProvider>, error_sink: Arc<dyn ErrorSink>) -> Self {
        let config = PipelineConfig::from_settings(settings.as_ref());
        tracing::debug!(config = ?config, "Pipeline configured");
        Self {
            settings,
            error_sink,
            config: Mutex::new(config),
            bus: EventBus::new(),
            active: Arc::new(Mutex::new(None)),
            last_summary: Arc::new(Mutex::new(None)),
            writers: Arc::new(writers_for),
        }
    }

    /// Replace the report sinks built for each run.
    pub fn with_writer_factory(mut self, writers: WriterFactory) -> Self {
        self.writers = writers;
        self
    }

    /// Copy of the current configuration.
    pub fn config(&self) -> PipelineConfig {
        lock(&self.config).clone()
    }

    pub fn validate_configuration(&self) -> Vec<String> {
        lock(&self.config).validate()
    }

    pub fn is_ready(&self) -> bool {
        self.validate_configuration().is_empty()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Start a run on a worker thread.
    ///
    /// Refused with `AlreadyRunning` while a run is active and with
    /// `ConfigurationInvalid` when validation fails. A refusal emits no
    /// event.
    pub fn start(&self) -> Result<RunHandle, RunError> {
        let run = self.reserve()?;

        let config = self.config();
        let problems = config.validate();
        let snapshot = if problems.is_empty() {
            config.snapshot(Arc::clone(&self.writers))
        } else {
            None
        };
        let Some(snapshot) = snapshot else {
            release_slot(&self.active, &run);
            let reasons = if problems.is_empty() {
                vec!["Configuration is incomplete".to_string()]
            } else {
                problems
            };
            return Err(self.refuse(RunError::ConfigurationInvalid { reasons }));
        };

        let report_type = snapshot.report_type;
        let guard = RunGuard {
            slot: Arc::clone(&self.active),
            last_summary: Arc::clone(&self.last_summary),
            bus: self.bus.clone(),
            error_log: Arc::clone(&self.error_sink),
            run: Arc::clone(&run),
            report_type,
            started: Instant::now(),
            released: AtomicBool::new(false),
        };

        let spawned = std::thread::Builder::new()
            .name("logsieve-run".to_string())
            .spawn(move || {
                run_scan(&snapshot, &guard, &guard.run, guard.error_log.as_ref())
            });

        match spawned {
            Ok(handle) => {
                tracing::info!(report_type = %report_type, "Processing run started");
                Ok(RunHandle { handle, run })
            }
            Err(source) => {
                release_slot(&self.active, &run);
                Err(self.refuse(RunError::WorkerSpawn { source }))
            }
        }
    }

    /// Claim the active slot for a new run in the Validating phase.
    fn reserve(&self) -> Result<Arc<ProcessingRun>, RunError> {
        let mut active = lock(&self.active);
        if active.is_some() {
            drop(active);
            return Err(self.refuse(RunError::AlreadyRunning));
        }
        let run = Arc::new(ProcessingRun::new());
        *active = Some(Arc::clone(&run));
        Ok(run)
    }

    /// Request cancellation of the active run. The worker stops at the next
    /// file boundary.
    pub fn stop(&self) -> Result<(), RunError> {
        match lock(&self.active).as_ref() {
            Some(run) => {
                run.request_cancel();
                tracing::info!("Cancellation requested");
                Ok(())
            }
            None => Err(self.refuse(RunError::NotRunning)),
        }
    }

    fn refuse(&self, err: RunError) -> RunError {
        tracing::warn!(error = %err, "Request refused");
        if let Err(e) = self.error_sink.append(Severity::Error, &err.to_string()) {
            tracing::warn!(error = %e, "Error log append failed");
        }
        err
    }

    // -------------------------------------------------------------------------
    // Setters (affect the next run only)
    // -------------------------------------------------------------------------

    /// Select the report type and reload its rules from the settings.
    pub fn set_report_type(&self, report_type: ReportType) {
        let rules = self.settings.rules_for(report_type);
        let mut config = lock(&self.config);
        config.report_type = Some(report_type);
        config.rules = rules;
        tracing::debug!(
            report_type = %report_type,
            rules = config.rules.rules().len(),
            "Report type selected"
        );
    }

    /// Set the log directory. A path that is not an existing directory is
    /// rejected and the previous value kept.
    pub fn set_log_path(&self, path: impl Into<PathBuf>) -> Result<(), ConfigError> {
        let path = existing_dir("log_path", path.into())?;
        lock(&self.config).log_path = Some(path);
        Ok(())
    }

    /// Set the report directory. Same rules as `set_log_path`.
    pub fn set_report_path(&self, path: impl Into<PathBuf>) -> Result<(), ConfigError> {
        let path = existing_dir("report_path", path.into())?;
        lock(&self.config).report_path = Some(path);
        Ok(())
    }

    pub fn set_rules(&self, rules: RuleSet) {
        lock(&self.config).rules = rules;
    }

    /// Set the period. Validity is checked at `start()`.
    pub fn set_window(&self, start: DateTime<Local>, end: DateTime<Local>) {
        let mut config = lock(&self.config);
        config.period_start = start;
        config.period_end = end;
    }

    pub fn set_extensions(&self, extensions: &[String]) {
        lock(&self.config).extensions = discovery::normalize_extensions(extensions);
    }

    pub fn set_output_formats(&self, formats: OutputFormats) {
        lock(&self.config).output_formats = formats;
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    pub fn subscribe(&self) -> mpsc::Receiver<RunEvent> {
        self.bus.subscribe()
    }

    pub fn subscribe_with_capacity(&self, capacity: usize) -> mpsc::Receiver<RunEvent> {
        self.bus.subscribe_with_capacity(capacity)
    }

    pub fn is_running(&self) -> bool {
        lock(&self.active).is_some()
    }

    pub fn phase(&self) -> RunPhase {
        lock(&self.active)
            .as_ref()
            .map(|r| r.phase())
            .unwrap_or(RunPhase::Idle)
    }

    /// `(processed, total)` of the active run.
    pub fn progress(&self) -> Option<(usize, usize)> {
        lock(&self.active)
            .as_ref()
            .map(|r| (r.processed(), r.total()))
    }

    /// Summary of the most recently finished run.
    pub fn last_summary(&self) -> Option<RunSummary> {
        lock(&self.last_summary).clone()
    }
}

fn existing_dir(field: &str, path: PathBuf) -> Result<PathBuf, ConfigError> {
    if path.is_dir() {
        Ok(path)
    } else {
        let err = ConfigError::InvalidValue {
            field: field.to_string(),
            value: path.display().to_string(),
            expected: "an existing directory".to_string(),
        };
        tracing::warn!(error = %err, "Path rejected");
        Err(err)
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Counters accumulated during a run.
struct Tally {
    started: Instant,
    report_type: ReportType,
    total: usize,
    matched: usize,
    errors: usize,
    reports: Vec<PathBuf>,
}

impl Tally {
    fn new(report_type: ReportType) -> Self {
        Self {
            started: Instant::now(),
            report_type,
            total: 0,
            matched: 0,
            errors: 0,
            reports: Vec::new(),
        }
    }

    fn summary(&self, outcome: RunOutcome, run: &ProcessingRun) -> RunSummary {
        RunSummary {
            outcome,
            report_type: self.report_type,
            processed: run.processed(),
            total: self.total,
            matched: self.matched,
            errors: self.errors,
            reports: self.reports.clone(),
            duration: self.started.elapsed(),
        }
    }
}

/// Broadcast an error and append it to the durable log.
fn report_error(sink: &dyn EventSink, error_log: &dyn ErrorSink, tally: &mut Tally, message: String) {
    tally.errors += 1;
    tracing::warn!(error = %message, "Run error");
    if let Err(e) = error_log.append(Severity::Error, &message) {
        tracing::warn!(error = %e, "Error log append failed");
    }
    sink.emit(RunEvent::Error { message });
}

fn report_warning(sink: &dyn EventSink, error_log: &dyn ErrorSink, message: String) {
    tracing::warn!(warning = %message, "Run warning");
    if let Err(e) = error_log.append(Severity::Warning, &message) {
        tracing::warn!(error = %e, "Error log append failed");
    }
    sink.emit(RunEvent::Warning { message });
}

fn finish_cancelled(sink: &dyn EventSink, run: &ProcessingRun, tally: &Tally) -> RunSummary {
    run.set_phase(RunPhase::Cancelled);
    let summary = tally.summary(RunOutcome::Cancelled, run);
    tracing::info!(
        processed = summary.processed,
        total = summary.total,
        "Processing run cancelled"
    );
    sink.emit(RunEvent::Cancelled {
        summary: summary.clone(),
    });
    summary
}

/// List the candidate files, then process them.
fn run_scan(
    config: &RunConfig,
    sink: &dyn EventSink,
    run: &ProcessingRun,
    error_log: &dyn ErrorSink,
) -> RunSummary {
    run.set_phase(RunPhase::Scanning);
    let mut tally = Tally::new(config.report_type);

    let files = match discovery::list_files(&config.log_path, &config.extensions, Some(&config.window)) {
        Ok(files) => files,
        Err(e) => {
            let error = e.to_string();
            tally.errors += 1;
            if let Err(log_err) = error_log.append(Severity::Error, &error) {
                tracing::warn!(error = %log_err, "Error log append failed");
            }
            run.set_phase(RunPhase::Failed);
            let summary = tally.summary(RunOutcome::Failed, run);
            tracing::error!(error = %error, "Processing run failed");
            sink.emit(RunEvent::Failed {
                error,
                summary: summary.clone(),
            });
            return summary;
        }
    };

    process_files(config, &files, sink, run, error_log, tally)
}

/// Filter every file in order, then generate the report.
fn process_files(
    config: &RunConfig,
    files: &[LogFileRef],
    sink: &dyn EventSink,
    run: &ProcessingRun,
    error_log: &dyn ErrorSink,
    mut tally: Tally,
) -> RunSummary {
    let total = files.len();
    tally.total = total;
    run.total.store(total, Ordering::SeqCst);

    sink.emit(RunEvent::Started {
        report_type: config.report_type,
        total_files: total,
    });

    if files.is_empty() {
        report_warning(
            sink,
            error_log,
            format!(
                "No compatible files found in '{}'",
                config.log_path.display()
            ),
        );
    }

    let structured = config.report_type.variant() == ReportVariant::Ict;
    let extractor = FieldExtractor::default();
    let mut assembler = ReportAssembler::new(
        config.report_type,
        &config.report_path,
        config.date_format.clone(),
        config.output_formats,
    )
    .with_writers((config.writers)(config.output_formats));
    let mut matched_files: Vec<LogFileRef> = Vec::new();

    for file in files {
        if run.is_cancel_requested() {
            return finish_cancelled(sink, run, &tally);
        }

        match fs::read_lines(&file.path) {
            Ok(lines) => {
                let accepted: Vec<&String> = lines
                    .iter()
                    .filter(|line| filter::evaluate(line, &config.rules))
                    .collect();

                if let Some(first) = accepted.first() {
                    tally.matched += 1;
                    tracing::debug!(
                        file = %file.path.display(),
                        lines = accepted.len(),
                        first = preview(first),
                        "File matched"
                    );
                    sink.emit(RunEvent::FileMatched {
                        path: file.path.clone(),
                    });

                    if structured {
                        let (fields, errors) = extractor.extract_from_lines(file, &lines);
                        for e in errors {
                            report_error(sink, error_log, &mut tally, e.to_string());
                        }
                        for line in &accepted {
                            assembler.add_processed_line(line, &fields);
                        }
                    }
                    matched_files.push(file.clone());
                } else {
                    tracing::trace!(file = %file.path.display(), "No accepted line");
                }
            }
            Err(source) => {
                let err = ReadError {
                    file: file.path.clone(),
                    source,
                };
                report_error(sink, error_log, &mut tally, err.to_string());
            }
        }

        let processed = run.processed.fetch_add(1, Ordering::SeqCst) + 1;
        sink.emit(RunEvent::Progress { processed, total });
    }

    if run.is_cancel_requested() {
        return finish_cancelled(sink, run, &tally);
    }

    // -------------------------------------------------------------------------
    // Report
    // -------------------------------------------------------------------------
    if total > 0 {
        match assembler.generate_report(&matched_files, Local::now()) {
            Ok(outcome) => {
                for message in outcome.warnings {
                    report_warning(sink, error_log, message);
                }
                for e in outcome.extraction_errors {
                    report_error(sink, error_log, &mut tally, e.to_string());
                }
                for path in outcome.written {
                    sink.emit(RunEvent::ReportWritten { path: path.clone() });
                    tally.reports.push(path);
                }
            }
            Err(e) => {
                report_error(
                    sink,
                    error_log,
                    &mut tally,
                    format!("Report generation failed: {e}"),
                );
            }
        }
    }

    run.set_phase(RunPhase::Completed);
    let summary = tally.summary(RunOutcome::Completed, run);
    tracing::info!(
        files = summary.total,
        matched = summary.matched,
        errors = summary.errors,
        reports = summary.reports.len(),
        "Processing run complete"
    );
    sink.emit(RunEvent::Completed {
        summary: summary.clone(),
    });
    summary
}

// =============================================================================
// Tests
// =============================================================================
