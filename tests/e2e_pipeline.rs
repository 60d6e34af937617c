// LogSieve - tests/e2e_pipeline.rs
//
// End-to-end tests for the processing pipeline.
//
// These tests exercise the real filesystem, real directory listing, real
// worker threads and real report files: a directory of log files goes in,
// events and report artifacts come out. No mocks besides the in-memory
// error sink.

use chrono::{Duration, Local};
use logsieve::app::pipeline::LogProcessingPipeline;
use logsieve::app::stats::RunStatistics;
use logsieve::core::model::{
    OutputFormats, ReportType, RuleKey, RuleKind, RunEvent, RunOutcome, RunSummary,
};
use logsieve::platform::config::Settings;
use logsieve::platform::error_log::{ErrorLog, ErrorSink, MemoryErrorSink};
use logsieve::util::error::RunError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

struct Fixture {
    _root: TempDir,
    logs: PathBuf,
    reports: PathBuf,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().expect("tempdir");
    let logs = root.path().join("logs");
    let reports = root.path().join("reports");
    fs::create_dir(&logs).unwrap();
    fs::create_dir(&reports).unwrap();
    Fixture {
        _root: root,
        logs,
        reports,
    }
}

/// Write `count` ICT-style log files. Odd-numbered files contain a FAIL
/// block, even-numbered ones only PASS blocks.
fn write_station_logs(dir: &Path, count: usize) {
    for i in 0..count {
        let verdict = if i % 2 == 1 { "FAIL" } else { "PASS" };
        let content = format!(
            "HEADER line\n\
             START;0;PRODUCT-{i};3;VAR-A;5;2024-03-0{d};08:15:00\n\
             LOT;LOT{i:03};extra\n\
             BLOCK;PCB1;R{i};STEP1;{verdict};Resistance;ANALOG;OK;10.1;9.5;10.5;Ohm;TP1;G0\n\
             BLOCK;PCB1;C{i};STEP2;PASS;Capacitance;ANALOG;OK;1.0;0.9;1.1;uF;TP2;G0\n\
             END\n",
            d = (i % 9) + 1
        );
        fs::write(dir.join(format!("ICT00{i:03}_20240305SN{i:04}.log")), content).unwrap();
    }
    // Never listed: wrong extension and nested directory.
    fs::write(dir.join("notes.md"), "BLOCK;ignored\n").unwrap();
    fs::create_dir_all(dir.join("archive")).unwrap();
    fs::write(dir.join("archive").join("old.log"), "BLOCK;ignored\n").unwrap();
}

fn settings_for(fx: &Fixture, report_type: ReportType) -> Settings {
    let mut settings = Settings::default();
    settings.log_path = Some(fx.logs.clone());
    settings.report_path = Some(fx.reports.clone());
    settings.report_type = Some(report_type);
    settings.compatible_extensions = vec!["log".to_string()];
    settings.output_formats = OutputFormats {
        txt: true,
        xlsx: true,
    };
    settings.period_start = Local::now() - Duration::days(1);
    settings.period_end = Local::now() + Duration::days(1);
    for rt in ReportType::all() {
        settings.set_filter(RuleKey::new(RuleKind::StartsOrEndsWith, *rt), "BLOCK");
    }
    settings
}

fn pipeline_with(settings: Settings) -> (LogProcessingPipeline, Arc<MemoryErrorSink>) {
    let errors = Arc::new(MemoryErrorSink::new());
    let pipeline = LogProcessingPipeline::new(Arc::new(settings), errors.clone());
    (pipeline, errors)
}

/// Drain events until the terminal one.
fn collect(rx: &Receiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    for event in rx.iter() {
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }
    events
}

fn run_to_end(pipeline: &LogProcessingPipeline) -> (Vec<RunEvent>, RunSummary) {
    let rx = pipeline.subscribe();
    let handle = pipeline.start().expect("start");
    let events = collect(&rx);
    let summary = handle.join().expect("worker");
    (events, summary)
}

fn report_with_extension(summary: &RunSummary, ext: &str) -> PathBuf {
    summary
        .reports
        .iter()
        .find(|p| p.extension().and_then(|e| e.to_str()) == Some(ext))
        .cloned()
        .unwrap_or_else(|| panic!("no .{ext} report in {:?}", summary.reports))
}

// =============================================================================
// Full runs
// =============================================================================

#[test]
fn e2e_ict_run_processes_every_file_and_writes_reports() {
    let fx = fixture();
    write_station_logs(&fx.logs, 6);
    let (pipeline, errors) = pipeline_with(settings_for(&fx, ReportType::Ict));

    let (events, summary) = run_to_end(&pipeline);

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.total, 6, "notes.md and archive/old.log are not listed");
    assert_eq!(summary.processed, 6);
    assert_eq!(summary.matched, 6);
    assert_eq!(summary.errors, 0);
    assert!(errors.is_empty());

    assert!(matches!(
        events.first(),
        Some(RunEvent::Started {
            report_type: ReportType::Ict,
            total_files: 6
        })
    ));
    let progress: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Progress { processed, total } => Some((*processed, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(progress.len(), 6);
    assert_eq!(progress.last(), Some(&(6, 6)));

    // One artifact per enabled format.
    assert_eq!(summary.reports.len(), 2);
    let xlsx = report_with_extension(&summary, "xlsx");
    let bytes = fs::read(&xlsx).unwrap();
    assert!(bytes.starts_with(b"PK"));
    assert!(xlsx
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("ICT_"));

    let txt = fs::read_to_string(report_with_extension(&summary, "txt")).unwrap();
    let lines: Vec<&str> = txt.lines().collect();
    assert_eq!(lines.len(), 1 + 6 * 2, "header plus two BLOCK lines per file");
    assert!(lines[0].starts_with("Machine;Log Date;Batch;Product;Variant;DMC"));

    let first: Vec<&str> = lines[1].split(';').collect();
    assert_eq!(first.len(), 22);
    assert_eq!(first[0], "ICT00000");
    assert_eq!(first[1], Local::now().format("%m/%d/%Y").to_string());
    assert_eq!(first[2], "LOT000");
    assert_eq!(first[3], "PRODUCT-0");
    assert_eq!(first[4], "VAR-A");
    assert_eq!(first[5], "SN0000");
    assert_eq!(first[6], "2024-03-01");
    assert_eq!(first[7], "08:15:00");
    assert_eq!(first[8], "BLOCK");
    assert_eq!(first[12], "PASS");

    assert!(!pipeline.is_running());
    assert_eq!(pipeline.last_summary(), Some(summary));
}

#[test]
fn e2e_filter_rules_select_matching_files() {
    let fx = fixture();
    write_station_logs(&fx.logs, 4);
    let mut settings = settings_for(&fx, ReportType::Custom);
    settings.set_filter(RuleKey::new(RuleKind::StartsOrEndsWith, ReportType::Custom), "");
    settings.set_filter(RuleKey::new(RuleKind::OrContains, ReportType::Custom), ";FAIL;");
    let (pipeline, _) = pipeline_with(settings);

    let (events, summary) = run_to_end(&pipeline);

    // Files 1 and 3 contain a FAIL block.
    assert_eq!(summary.matched, 2);
    let matched: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::FileMatched { path } => {
                Some(path.file_name().unwrap().to_string_lossy().into_owned())
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        matched,
        vec!["ICT00001_20240305SN0001.log", "ICT00003_20240305SN0003.log"]
    );
}

#[test]
fn e2e_custom_report_has_header_and_marker_lines() {
    let fx = fixture();
    write_station_logs(&fx.logs, 2);
    fs::write(fx.logs.join("zz_no_markers.log"), "BLOCK;only\n").unwrap();
    let (pipeline, _) = pipeline_with(settings_for(&fx, ReportType::Custom));

    let (_, summary) = run_to_end(&pipeline);
    assert_eq!(summary.matched, 3);

    let txt = fs::read_to_string(report_with_extension(&summary, "txt")).unwrap();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_reader(txt.as_bytes());
    let header: Vec<String> = reader
        .headers()
        .unwrap()
        .iter()
        .map(str::to_string)
        .collect();
    assert_eq!(
        header,
        vec!["File Name", "Creation Date", "START Line", "LOT Line"]
    );

    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[0][0], "ICT00000_20240305SN0000.log");
    assert!(rows[0][2].starts_with("START;0;PRODUCT-0"));
    assert_eq!(&rows[0][3], "LOT;LOT000;extra");
    assert_eq!(&rows[2][2], "START line not found");
    assert_eq!(&rows[2][3], "LOT line not found");
}

#[test]
fn e2e_concatenation_has_no_header_and_ignores_period() {
    let fx = fixture();
    write_station_logs(&fx.logs, 3);
    let mut settings = settings_for(&fx, ReportType::Concatenation);
    // A period in the past would exclude every file for other types.
    settings.period_start = Local::now() - Duration::days(30);
    settings.period_end = Local::now() - Duration::days(40);
    let (pipeline, _) = pipeline_with(settings);

    let (_, summary) = run_to_end(&pipeline);
    assert_eq!(summary.total, 3);

    let txt = fs::read_to_string(report_with_extension(&summary, "txt")).unwrap();
    let lines: Vec<&str> = txt.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("ICT00000_20240305SN0000.log;"));
    assert!(report_with_extension(&summary, "xlsx")
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("Concatenation_"));
}

#[test]
fn e2e_period_excludes_files_outside_window() {
    let fx = fixture();
    write_station_logs(&fx.logs, 3);
    let mut settings = settings_for(&fx, ReportType::Ict);
    settings.period_start = Local::now() - Duration::days(10);
    settings.period_end = Local::now() - Duration::days(9);
    let (pipeline, errors) = pipeline_with(settings);

    let (events, summary) = run_to_end(&pipeline);
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.total, 0);
    assert!(summary.reports.is_empty());
    assert!(events
        .iter()
        .any(|e| matches!(e, RunEvent::Warning { .. })));
    assert_eq!(errors.len(), 1, "the warning is also logged");
}

#[test]
fn e2e_ict_rows_identical_across_runs() {
    let fx = fixture();
    write_station_logs(&fx.logs, 5);
    let mut settings = settings_for(&fx, ReportType::Ict);
    settings.output_formats = OutputFormats {
        txt: true,
        xlsx: false,
    };
    let (pipeline, _) = pipeline_with(settings);

    let (_, first) = run_to_end(&pipeline);

    // Separate directory: two runs within one second share a file name.
    let second_dir = fx.reports.join("second");
    fs::create_dir(&second_dir).unwrap();
    pipeline.set_report_path(&second_dir).unwrap();
    let (_, second) = run_to_end(&pipeline);

    let a = fs::read_to_string(&first.reports[0]).unwrap();
    let b = fs::read_to_string(&second.reports[0]).unwrap();
    assert_eq!(a, b);
}

// =============================================================================
// Refusals and cancellation
// =============================================================================

#[test]
fn e2e_empty_report_path_refuses_start_without_events() {
    let fx = fixture();
    write_station_logs(&fx.logs, 2);
    let mut settings = settings_for(&fx, ReportType::Ict);
    settings.report_path = None;

    let error_log_path = fx.reports.join("error.log");
    let error_log: Arc<dyn ErrorSink> = Arc::new(ErrorLog::new(&error_log_path));
    let pipeline = LogProcessingPipeline::new(Arc::new(settings), error_log);

    let problems = pipeline.validate_configuration();
    assert_eq!(problems, vec!["Report path is not set".to_string()]);

    let rx = pipeline.subscribe();
    match pipeline.start() {
        Err(RunError::ConfigurationInvalid { reasons }) => assert_eq!(reasons, problems),
        Err(other) => panic!("unexpected refusal: {other}"),
        Ok(_) => panic!("start should be refused"),
    }
    assert!(rx.try_recv().is_err(), "no notification on refusal");
    assert!(!pipeline.is_running());

    let logged = fs::read_to_string(&error_log_path).unwrap();
    assert!(logged.contains("[ERROR]"));
    assert!(logged.contains("Report path is not set"));
}

#[test]
fn e2e_stop_cancels_at_file_boundary() {
    let fx = fixture();
    write_station_logs(&fx.logs, 10);
    let (pipeline, _) = pipeline_with(settings_for(&fx, ReportType::Ict));

    // Rendezvous subscription: the worker waits for every event to be taken.
    let rx = pipeline.subscribe_with_capacity(0);
    let handle = pipeline.start().unwrap();

    let mut stats = RunStatistics::new();
    let mut events = Vec::new();
    for event in rx.iter() {
        stats.apply(&event);
        if matches!(event, RunEvent::Progress { processed: 3, .. }) {
            pipeline.stop().unwrap();
        }
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }

    let summary = handle.join().unwrap();
    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert!(summary.processed < 10, "processed {}", summary.processed);
    assert!(summary.reports.is_empty());
    assert_eq!(stats.outcome, Some(RunOutcome::Cancelled));
    assert!(matches!(events.last(), Some(RunEvent::Cancelled { .. })));

    // No run left behind.
    assert!(matches!(pipeline.stop(), Err(RunError::NotRunning)));
}
