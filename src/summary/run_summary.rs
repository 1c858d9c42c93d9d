//! Run summary written as JSON and printed after a successful run

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::steps::StepOutcome;

/// Schema version for the summary file
pub const RUN_SUMMARY_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for the summary file
pub const RUN_SUMMARY_SCHEMA_ID: &str = "harbor-modifier/run_summary@1";

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Step identifier
    pub step: String,

    /// Human description
    pub description: String,

    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl StepReport {
    pub fn new(step: &str, description: &str, outcome: StepOutcome) -> Self {
        Self {
            step: step.to_string(),
            description: description.to_string(),
            outcome,
        }
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u32,

    pub schema_id: String,

    /// Random v4 UUID
    pub run_id: String,

    pub created_at: DateTime<Utc>,

    /// Chart version that was patched
    pub version: String,

    pub chart_dir: PathBuf,

    /// Step results in pipeline order
    pub steps: Vec<StepReport>,

    /// Count of steps that changed the chart
    pub applied: usize,

    /// Count of steps with nothing to do
    pub skipped: usize,

    /// Wall-clock duration of the entire run in milliseconds
    pub duration_ms: u64,

    /// Human-readable summary
    pub human_summary: String,
}

impl RunSummary {
    /// Aggregate step reports into a summary
    pub fn from_reports(
        version: impl Into<String>,
        chart_dir: impl Into<PathBuf>,
        steps: Vec<StepReport>,
        duration_ms: u64,
    ) -> Self {
        let applied = steps.iter().filter(|r| r.outcome.is_applied()).count();
        let skipped = steps.len() - applied;
        let human_summary = Self::generate_human_summary(steps.len(), applied, skipped);

        Self {
            schema_version: RUN_SUMMARY_SCHEMA_VERSION,
            schema_id: RUN_SUMMARY_SCHEMA_ID.to_string(),
            run_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            version: version.into(),
            chart_dir: chart_dir.into(),
            steps,
            applied,
            skipped,
            duration_ms,
            human_summary,
        }
    }

    fn generate_human_summary(step_count: usize, applied: usize, skipped: usize) -> String {
        match (step_count, applied) {
            (0, _) => "No steps executed".to_string(),
            (_, 0) => format!("Chart already up to date: {} step(s) skipped", skipped),
            _ => format!(
                "{} step(s): {} applied, {} skipped",
                step_count, applied, skipped
            ),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Harbor chart {} at {}", self.version, self.chart_dir.display())?;
        let width = self.steps.iter().map(|r| r.step.len()).max().unwrap_or(0);
        for report in &self.steps {
            let marker = if report.outcome.is_applied() { "applied" } else { "skipped" };
            writeln!(
                f,
                "  [{:<7}] {:<width$}  {}",
                marker,
                report.step,
                report.outcome.detail(),
                width = width
            )?;
        }
        write!(f, "{} ({} ms)", self.human_summary, self.duration_ms)
    }
}
