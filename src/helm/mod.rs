//! Boundary to the external `helm` packaging CLI
//!
//! Every chart operation the pipeline needs goes through the [`ChartTool`]
//! trait. [`HelmCli`] shells out to the real binary; tests substitute
//! [`crate::mock::MockChartTool`].

mod cli;

pub use cli::HelmCli;

use std::path::Path;

/// Output printed by `helm dependency build` for conditional dependencies
/// that are not vendored. Not fatal.
pub const BENIGN_DEPENDENCY_OUTPUT: &[&str] = &["missing in charts/ directory"];

/// Output printed by `helm repo list` on a host with no repositories.
pub const EMPTY_REPO_LIST_OUTPUT: &str = "no repositories to show";

/// Errors from packaging CLI invocations
#[derive(Debug, thiserror::Error)]
pub enum HelmError {
    #[error("failed to spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {}", one_line(.output))]
    Failed {
        command: String,
        status: String,
        output: String,
    },
}

impl HelmError {
    /// Captured combined output, if the process ran
    pub fn output(&self) -> Option<&str> {
        match self {
            HelmError::Failed { output, .. } => Some(output),
            HelmError::Spawn { .. } => None,
        }
    }

    /// Whether the captured output contains any of the allow-listed substrings
    pub fn is_benign(&self, allowed: &[&str]) -> bool {
        self.output()
            .map(|out| allowed.iter().any(|needle| out.contains(needle)))
            .unwrap_or(false)
    }
}

/// Collapse multi-line process output for single-line error messages
fn one_line(output: &str) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        "(no output)".to_string()
    } else {
        lines.join(" | ")
    }
}

/// Operations on the packaging CLI used by the fetch and validate phases
pub trait ChartTool {
    /// Raw `repo list` output
    fn repo_list(&self) -> Result<String, HelmError>;

    fn repo_add(&self, name: &str, url: &str) -> Result<(), HelmError>;

    fn repo_update(&self, name: &str) -> Result<(), HelmError>;

    /// Pull `chart_ref` at `version` and untar it under `untar_dir`
    fn pull(&self, chart_ref: &str, version: &str, untar_dir: &Path) -> Result<(), HelmError>;

    /// Resolve and vendor sub-chart dependencies
    fn dependency_build(&self, chart_dir: &Path) -> Result<(), HelmError>;

    /// Lint the chart, returning the lint report
    fn lint(&self, chart_dir: &Path) -> Result<String, HelmError>;
}
