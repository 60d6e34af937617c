// LogSieve - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. Settings loading and logging initialisation (debug mode support)
// 3. One pipeline run, with events logged and aggregated
// 4. Summary output (text or JSON) and exit status

use clap::Parser;
use logsieve::app::pipeline::LogProcessingPipeline;
use logsieve::app::stats::RunStatistics;
use logsieve::core::model::{ReportType, RunEvent, RunOutcome};
use logsieve::platform::config::{load_settings, PlatformPaths};
use logsieve::platform::error_log::{ErrorLog, ErrorSink};
use logsieve::util;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "logsieve", version, about)]
struct Cli {
    /// Settings file (defaults to config.toml in the platform config directory).
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Directory of log files to scan (overrides [paths] log_path).
    #[arg(short = 'l', long = "log-path")]
    log_path: Option<PathBuf>,

    /// Directory reports are written to (overrides [paths] report_path).
    #[arg(short = 'r', long = "report-path")]
    report_path: Option<PathBuf>,

    /// Report type: ICT, EOL, Custom, Concatenation or CDMC.
    #[arg(short = 't', long = "report-type")]
    report_type: Option<String>,

    /// Enable debug logging.
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Only validate the configuration and list every problem.
    #[arg(long = "validate")]
    validate: bool,

    /// Print the run summary as JSON.
    #[arg(long = "json")]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    let platform_paths = PlatformPaths::resolve();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| platform_paths.config_file());
    let (mut settings, config_warnings) = load_settings(&config_path);

    util::logging::init(cli.debug, settings.log_level.as_deref());

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        config = %config_path.display(),
        "LogSieve starting"
    );

    for warning in &config_warnings {
        tracing::warn!(warning = %warning, "Config warning");
    }

    // -- CLI overrides --
    if let Some(tag) = cli.report_type.as_deref() {
        match ReportType::parse(tag) {
            Ok(rt) => settings.report_type = Some(rt),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(2);
            }
        }
    }
    if let Some(path) = cli.log_path.clone() {
        settings.log_path = Some(path);
    }
    if let Some(path) = cli.report_path.clone() {
        settings.report_path = Some(path);
    }

    let error_log_path = settings
        .error_log_path
        .clone()
        .unwrap_or_else(|| platform_paths.error_log_file());
    let error_sink: Arc<dyn ErrorSink> =
        Arc::new(ErrorLog::new(error_log_path).with_enabled(settings.error_log_enabled));

    let pipeline = LogProcessingPipeline::new(Arc::new(settings), error_sink);

    if cli.validate {
        let problems = pipeline.validate_configuration();
        if problems.is_empty() {
            println!("Configuration is valid.");
            return;
        }
        for problem in &problems {
            println!("- {problem}");
        }
        std::process::exit(1);
    }

    std::process::exit(run(&pipeline, cli.json));
}

/// Run once and report. Returns the process exit code.
fn run(pipeline: &LogProcessingPipeline, json: bool) -> i32 {
    let events = pipeline.subscribe();

    let handle = match pipeline.start() {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };

    let mut stats = RunStatistics::new();
    for event in events.iter() {
        stats.apply(&event);
        log_event(&event, &stats);
        if event.is_terminal() {
            break;
        }
    }

    let Some(summary) = handle.join() else {
        eprintln!("Error: processing worker stopped unexpectedly");
        return 1;
    };

    if json {
        let output = serde_json::json!({
            "summary": summary,
            "statistics": stats,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error: cannot serialise summary: {e}");
                return 1;
            }
        }
    } else {
        println!(
            "{} report: {} of {} files processed, {} matched, {} errors, {:.1}s",
            summary.report_type,
            summary.processed,
            summary.total,
            summary.matched,
            summary.errors,
            summary.duration.as_secs_f64()
        );
        for path in &summary.reports {
            println!("  wrote {}", path.display());
        }
    }

    match summary.outcome {
        RunOutcome::Completed => 0,
        RunOutcome::Cancelled | RunOutcome::Failed => 1,
    }
}

fn log_event(event: &RunEvent, stats: &RunStatistics) {
    match event {
        RunEvent::Started {
            report_type,
            total_files,
        } => tracing::info!(report_type = %report_type, files = total_files, "Run started"),
        RunEvent::Progress { processed, total } => tracing::debug!(
            processed,
            total,
            percent = stats.percent(),
            "Progress"
        ),
        RunEvent::FileMatched { path } => {
            tracing::info!(file = %path.display(), "File matched")
        }
        RunEvent::Error { message } => tracing::error!(error = %message, "Error"),
        RunEvent::Warning { message } => tracing::warn!(warning = %message, "Warning"),
        RunEvent::ReportWritten { path } => {
            tracing::info!(path = %path.display(), "Report written")
        }
        RunEvent::Completed { summary } => tracing::info!(
            matched = summary.matched,
            errors = summary.errors,
            "Run completed"
        ),
        RunEvent::Cancelled { summary } => {
            tracing::warn!(processed = summary.processed, "Run cancelled")
        }
        RunEvent::Failed { error, .. } => tracing::error!(error = %error, "Run failed"),
    }
}
