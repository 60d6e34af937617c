// LogSieve - app/stats.rs
//
// Run statistics aggregated from the event stream. Any subscriber can feed
// events into a `RunStatistics`; it never touches the pipeline directly.

use crate::core::model::{RunEvent, RunOutcome};
use serde::Serialize;
use std::path::PathBuf;

/// Counters for one run as seen by an observer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStatistics {
    pub total: usize,
    pub processed: usize,
    pub matched: usize,
    pub errors: usize,
    pub warnings: usize,
    pub reports: Vec<PathBuf>,
    pub outcome: Option<RunOutcome>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the counters.
    pub fn apply(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Started { total_files, .. } => {
                *self = Self {
                    total: *total_files,
                    ..Self::default()
                };
            }
            RunEvent::Progress { processed, total } => {
                self.processed = *processed;
                self.total = *total;
            }
            RunEvent::FileMatched { .. } => self.matched += 1,
            RunEvent::Error { .. } => self.errors += 1,
            RunEvent::Warning { .. } => self.warnings += 1,
            RunEvent::ReportWritten { path } => self.reports.push(path.clone()),
            RunEvent::Completed { .. } => self.outcome = Some(RunOutcome::Completed),
            RunEvent::Cancelled { .. } => self.outcome = Some(RunOutcome::Cancelled),
            RunEvent::Failed { .. } => {
                self.errors += 1;
                self.outcome = Some(RunOutcome::Failed);
            }
        }
    }

    /// Processed share of total, 0-100. An empty run counts as complete.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return if self.outcome.is_some() { 100.0 } else { 0.0 };
        }
        (self.processed as f64 / self.total as f64) * 100.0
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ReportType;

    #[test]
    fn test_counts_follow_events() {
        let mut stats = RunStatistics::new();
        let events = [
            RunEvent::Started {
                report_type: ReportType::Ict,
                total_files: 4,
            },
            RunEvent::FileMatched {
                path: PathBuf::from("a.log"),
            },
            RunEvent::Progress {
                processed: 1,
                total: 4,
            },
            RunEvent::Error {
                message: "Cannot read 'b.log'".to_string(),
            },
            RunEvent::Progress {
                processed: 2,
                total: 4,
            },
        ];
        for e in &events {
            stats.apply(e);
        }
        assert_eq!(stats.total, 4);
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.errors, 1);
        assert!((stats.percent() - 50.0).abs() < f64::EPSILON);
        assert!(!stats.is_finished());
    }

    #[test]
    fn test_started_resets_previous_run() {
        let mut stats = RunStatistics::new();
        stats.apply(&RunEvent::Error {
            message: "old".to_string(),
        });
        stats.apply(&RunEvent::Started {
            report_type: ReportType::Custom,
            total_files: 0,
        });
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.percent(), 0.0);
    }

    #[test]
    fn test_failed_counts_as_error() {
        let mut stats = RunStatistics::new();
        let summary = crate::core::model::RunSummary {
            outcome: RunOutcome::Failed,
            report_type: ReportType::Ict,
            processed: 0,
            total: 0,
            matched: 0,
            errors: 1,
            reports: Vec::new(),
            duration: std::time::Duration::ZERO,
        };
        stats.apply(&RunEvent::Failed {
            error: "Log path '/x' does not exist".to_string(),
            summary,
        });
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.outcome, Some(RunOutcome::Failed));
        assert_eq!(stats.percent(), 100.0);
    }
}
