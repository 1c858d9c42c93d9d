//! Idempotent patch steps
//!
//! Each step owns a read-modify-write cycle on one or more files of the
//! chart. Before mutating anything a step consults its [`Detection`]; if the
//! change is already present the step is skipped without touching the file.
//! An apply action that ends up changing nothing also reports
//! [`StepOutcome::Skipped`] and does not rewrite its target.
//!
//! Steps in pipeline order:
//! 1. `apply-helpers`
//! 2. `patch-database-templates`
//! 3. `remove-redundant-template`
//! 4. `remove-legacy-database-files`
//! 5. `apply-templates`
//! 6. `merge-values`
//! 7. `cleanup-obsolete-section`
//! 8. `update-metadata`
//! 9. `update-ignore-file`
//! 10. `apply-overlays`

mod append;
mod database;
mod detect;
mod metadata;
mod templates;
mod values;

pub use append::{helper_marker, ApplyHelpers, UpdateIgnoreFile, IGNORE_MARKER};
pub use database::{
    PatchDatabaseTemplates, RemoveLegacyDatabaseFiles, RemoveRedundantTemplate,
    DATABASE_SUBSTITUTIONS, LEGACY_DATABASE_FILES, REDUNDANT_TEMPLATE,
};
pub use detect::Detection;
pub use metadata::UpdateMetadata;
pub use templates::{ApplyOverlays, ApplyTemplates};
pub use values::{CleanupObsoleteSection, MergeValues, DATABASE_VALUES_KEY};

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chart_document::DocumentError;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::StepToggles;
use crate::copier::CopyError;

/// Paths of the chart being patched and of the modifications tree
#[derive(Debug, Clone)]
pub struct ChartLayout {
    pub chart_dir: PathBuf,
    pub modifications_dir: PathBuf,
}

impl ChartLayout {
    pub fn new(chart_dir: impl Into<PathBuf>, modifications_dir: impl Into<PathBuf>) -> Self {
        Self {
            chart_dir: chart_dir.into(),
            modifications_dir: modifications_dir.into(),
        }
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.chart_dir.join("templates")
    }

    pub fn helpers_file(&self) -> PathBuf {
        self.templates_dir().join("_helpers.tpl")
    }

    pub fn values_file(&self) -> PathBuf {
        self.chart_dir.join("values.yaml")
    }

    pub fn chart_file(&self) -> PathBuf {
        self.chart_dir.join("Chart.yaml")
    }

    pub fn ignore_file(&self) -> PathBuf {
        self.chart_dir.join(".helmignore")
    }

    /// A subdirectory or file of the modifications tree
    pub fn modifications(&self, name: &str) -> PathBuf {
        self.modifications_dir.join(name)
    }
}

/// Errors raised by a step. Logical no-ops are never errors.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("failed to {op} {}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Copy(#[from] CopyError),
}

impl StepError {
    pub(crate) fn io(op: &'static str, path: &Path) -> impl FnOnce(io::Error) -> StepError {
        let path = path.to_path_buf();
        move |source| StepError::Io { op, path, source }
    }
}

/// Terminal state of a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "lowercase")]
pub enum StepOutcome {
    /// The step mutated the chart
    Applied(String),
    /// Nothing to do: already applied, or nothing to apply
    Skipped(String),
}

impl StepOutcome {
    pub fn applied(detail: impl Into<String>) -> Self {
        StepOutcome::Applied(detail.into())
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped(reason.into())
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, StepOutcome::Applied(_))
    }

    pub fn detail(&self) -> &str {
        match self {
            StepOutcome::Applied(d) | StepOutcome::Skipped(d) => d,
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Applied(d) => write!(f, "applied: {}", d),
            StepOutcome::Skipped(d) => write!(f, "skipped: {}", d),
        }
    }
}

/// A named, idempotent modification of the chart
pub trait PatchStep {
    /// Stable identifier, used in logs, reports and errors
    fn name(&self) -> &'static str;

    /// One-line human description
    fn description(&self) -> &'static str;

    /// Predicate answering "has this step already been applied?"
    fn detection(&self, layout: &ChartLayout) -> Result<Detection, StepError>;

    /// Perform the mutation. Must be safe to call on an already patched chart.
    fn apply(&self, layout: &ChartLayout) -> Result<StepOutcome, StepError>;

    /// Detect, then apply only if needed
    fn run(&self, layout: &ChartLayout) -> Result<StepOutcome, StepError> {
        let detection = self.detection(layout)?;
        if detection.is_applied()? {
            return Ok(StepOutcome::skipped(format!("already applied ({})", detection)));
        }
        self.apply(layout)
    }
}

/// The ordered step list, gated by `toggles`
pub fn pipeline_steps(toggles: &StepToggles) -> Vec<Box<dyn PatchStep>> {
    let mut steps: Vec<Box<dyn PatchStep>> = vec![Box::new(ApplyHelpers)];

    if toggles.database_substitution {
        steps.push(Box::new(PatchDatabaseTemplates));
        steps.push(Box::new(RemoveRedundantTemplate));
        steps.push(Box::new(RemoveLegacyDatabaseFiles));
    }

    steps.push(Box::new(ApplyTemplates));
    steps.push(Box::new(MergeValues::new(toggles.database_substitution)));

    if toggles.database_substitution {
        steps.push(Box::new(CleanupObsoleteSection));
    }

    steps.push(Box::new(UpdateMetadata));
    steps.push(Box::new(UpdateIgnoreFile));

    if toggles.overlays {
        steps.push(Box::new(ApplyOverlays));
    }

    steps
}

/// Files directly inside `dir` with the given extension, sorted by name.
///
/// A missing directory has no files.
pub(crate) fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, StepError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = entry.map_err(|e| StepError::Io {
            op: "list",
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        let is_match = entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some(extension);
        if is_match {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
