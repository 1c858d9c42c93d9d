//! Pipeline orchestration
//!
//! A run has three phases:
//! - Fetch: recreate the chart dir from the configured repository
//! - Patch: run every enabled step in order, stopping at the first failure
//! - Validate: `helm dependency build`, then `helm lint` if enabled
//!
//! Steps are never rolled back. Re-running the pipeline against a partly
//! patched chart picks up where the failed run stopped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, EffectiveConfig};
use crate::helm::{ChartTool, HelmError, BENIGN_DEPENDENCY_OUTPUT};
use crate::steps::{pipeline_steps, ChartLayout, PatchStep, StepError};
use crate::summary::{RunSummary, StepReport};

/// Failures while recreating the chart dir
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to {action}")]
    Helm {
        action: &'static str,
        #[source]
        source: HelmError,
    },

    #[error("failed to {op} {}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("helm pull did not produce {}", .path.display())]
    NotPulled { path: PathBuf },
}

/// Pipeline errors, one variant per phase
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration")]
    Config(#[from] ConfigError),

    #[error("fetch")]
    Fetch(#[from] FetchError),

    #[error("chart directory {} does not exist, fetch it first", .path.display())]
    ChartMissing { path: PathBuf },

    #[error("step {step}")]
    Step {
        step: &'static str,
        #[source]
        source: StepError,
    },

    #[error("validate")]
    Validate(#[source] HelmError),
}

impl PipelineError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 1,
            PipelineError::Fetch(_) | PipelineError::ChartMissing { .. } => 20,
            PipelineError::Step { .. } => 30,
            PipelineError::Validate(_) => 40,
        }
    }

    /// Name of the failed step, if a step failed
    pub fn step(&self) -> Option<&'static str> {
        match self {
            PipelineError::Step { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Detection result of one step, without applying it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStatus {
    pub step: &'static str,
    pub description: &'static str,
    /// Rendered detection predicate
    pub detection: String,
    pub applied: bool,
}

fn helm(action: &'static str) -> impl FnOnce(HelmError) -> FetchError {
    move |source| FetchError::Helm { action, source }
}

fn io_err(op: &'static str, path: &Path) -> impl FnOnce(io::Error) -> FetchError {
    let path = path.to_path_buf();
    move |source| FetchError::Io { op, path, source }
}

/// Whether `name` appears in the first column of a `helm repo list` table
fn repo_listed(listing: &str, name: &str) -> bool {
    let mut lines = listing.lines().filter(|l| !l.trim().is_empty()).peekable();
    if lines
        .peek()
        .is_some_and(|header| header.split_whitespace().next() == Some("NAME"))
    {
        lines.next();
    }
    lines
        .filter_map(|l| l.split_whitespace().next())
        .any(|repo| repo == name)
}

/// Fetch, patch and validate one chart
#[derive(Debug)]
pub struct Pipeline<T: ChartTool> {
    config: EffectiveConfig,
    tool: T,
}

impl<T: ChartTool> Pipeline<T> {
    pub fn new(config: EffectiveConfig, tool: T) -> Self {
        Self { config, tool }
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn layout(&self) -> ChartLayout {
        self.config.layout()
    }

    /// Enabled steps in execution order
    pub fn steps(&self) -> Vec<Box<dyn PatchStep>> {
        pipeline_steps(&self.config.config.steps)
    }

    /// Fetch, patch, validate
    pub fn run(&self) -> PipelineResult<RunSummary> {
        let start = Instant::now();
        self.fetch()?;
        let reports = self.patch()?;
        self.validate()?;
        Ok(self.summarize(reports, start))
    }

    /// Patch an already fetched chart. No helm calls.
    pub fn run_patch_only(&self) -> PipelineResult<RunSummary> {
        let start = Instant::now();
        self.ensure_chart()?;
        let reports = self.patch()?;
        Ok(self.summarize(reports, start))
    }

    fn summarize(&self, reports: Vec<StepReport>, start: Instant) -> RunSummary {
        RunSummary::from_reports(
            self.config.config.version.clone(),
            self.config.chart_dir(),
            reports,
            start.elapsed().as_millis() as u64,
        )
    }

    fn ensure_chart(&self) -> PipelineResult<()> {
        let chart_dir = self.config.chart_dir();
        if !chart_dir.is_dir() {
            return Err(PipelineError::ChartMissing { path: chart_dir });
        }
        Ok(())
    }

    /// Replace the chart dir with a fresh copy of the configured version
    pub fn fetch(&self) -> PipelineResult<()> {
        let config = &self.config.config;
        let chart_ref = config.chart_ref();
        let chart_dir = self.config.chart_dir();
        let project_dir = &self.config.project_dir;
        info!("Pulling {} chart version {}", chart_ref, config.version);

        if chart_dir.exists() {
            debug!("removing {}", chart_dir.display());
            fs::remove_dir_all(&chart_dir).map_err(io_err("remove", &chart_dir))?;
        }

        let listing = self.tool.repo_list().map_err(helm("list repositories"))?;
        if repo_listed(&listing, &config.repo.name) {
            debug!("repository {} already configured", config.repo.name);
        } else {
            info!("Adding {} repository ({})", config.repo.name, config.repo.url);
            self.tool
                .repo_add(&config.repo.name, &config.repo.url)
                .map_err(helm("add repository"))?;
        }

        self.tool
            .repo_update(&config.repo.name)
            .map_err(helm("update repository"))?;

        fs::create_dir_all(project_dir).map_err(io_err("create directory", project_dir))?;
        self.tool
            .pull(&chart_ref, &config.version, project_dir)
            .map_err(helm("pull chart"))?;

        let pulled = project_dir.join(&config.chart);
        if !pulled.is_dir() {
            return Err(FetchError::NotPulled { path: pulled }.into());
        }
        if pulled != chart_dir {
            if let Some(parent) = chart_dir.parent() {
                fs::create_dir_all(parent).map_err(io_err("create directory", parent))?;
            }
            fs::rename(&pulled, &chart_dir).map_err(io_err("rename", &pulled))?;
        }

        info!("Chart ready at {}", chart_dir.display());
        Ok(())
    }

    /// Run every enabled step in order. The first failure aborts.
    pub fn patch(&self) -> PipelineResult<Vec<StepReport>> {
        let layout = self.layout();
        info!("Applying modifications from {}", layout.modifications_dir.display());

        let mut reports = Vec::new();
        for step in self.steps() {
            info!("{}...", step.description());
            let outcome = step.run(&layout).map_err(|source| PipelineError::Step {
                step: step.name(),
                source,
            })?;
            info!("  {}: {}", step.name(), outcome);
            reports.push(StepReport::new(step.name(), step.description(), outcome));
        }
        Ok(reports)
    }

    /// Build dependencies, tolerating sub-charts that are not vendored
    pub fn validate(&self) -> PipelineResult<()> {
        let chart_dir = self.config.chart_dir();
        info!("Validating chart dependencies");

        match self.tool.dependency_build(&chart_dir) {
            Ok(()) => {}
            Err(e) if e.is_benign(BENIGN_DEPENDENCY_OUTPUT) => {
                warn!("dependency build reported missing conditional sub-charts, continuing");
                debug!("{}", e);
            }
            Err(e) => return Err(PipelineError::Validate(e)),
        }

        if self.config.config.lint {
            let output = self.tool.lint(&chart_dir).map_err(PipelineError::Validate)?;
            for line in output.lines().filter(|l| !l.trim().is_empty()) {
                debug!("lint: {}", line);
            }
            info!("Lint passed");
        }

        info!("Dependencies validated");
        Ok(())
    }

    /// Evaluate every step's detection without applying anything
    pub fn status(&self) -> PipelineResult<Vec<StepStatus>> {
        self.ensure_chart()?;
        let layout = self.layout();
        let steps = self.steps();

        steps
            .iter()
            .map(|step| {
                let detect = || -> Result<StepStatus, StepError> {
                    let detection = step.detection(&layout)?;
                    Ok(StepStatus {
                        step: step.name(),
                        description: step.description(),
                        applied: detection.is_applied()?,
                        detection: detection.to_string(),
                    })
                };
                detect().map_err(|source| PipelineError::Step {
                    step: step.name(),
                    source,
                })
            })
            .collect()
    }
}
