//! Mock chart tool
//!
//! In-process stand-in for the `helm` CLI used by tests of the fetch and
//! validate phases. Records every invocation, materializes a chart on
//! `pull` through a caller-provided writer, and supports failure injection
//! per operation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;

use crate::helm::{ChartTool, HelmError};

type ChartWriter = Box<dyn Fn(&Path) -> io::Result<()>>;

/// Operation names used for call recording and failure injection
pub mod ops {
    pub const REPO_LIST: &str = "repo list";
    pub const REPO_ADD: &str = "repo add";
    pub const REPO_UPDATE: &str = "repo update";
    pub const PULL: &str = "pull";
    pub const DEPENDENCY_BUILD: &str = "dependency build";
    pub const LINT: &str = "lint";
}

/// Configurable [`ChartTool`] double
pub struct MockChartTool {
    repos: RefCell<Vec<String>>,
    chart_writer: Option<ChartWriter>,
    failures: HashMap<&'static str, String>,
    calls: RefCell<Vec<String>>,
}

impl Default for MockChartTool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockChartTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockChartTool")
            .field("repos", &self.repos)
            .field("failures", &self.failures)
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}

impl MockChartTool {
    pub fn new() -> Self {
        Self {
            repos: RefCell::new(Vec::new()),
            chart_writer: None,
            failures: HashMap::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Pretend `name` is already a configured repository
    pub fn with_repo(self, name: &str) -> Self {
        self.repos.borrow_mut().push(name.to_string());
        self
    }

    /// Called with the untarred chart directory on `pull`
    pub fn with_chart<F>(mut self, writer: F) -> Self
    where
        F: Fn(&Path) -> io::Result<()> + 'static,
    {
        self.chart_writer = Some(Box::new(writer));
        self
    }

    /// Make `op` fail with the given combined output
    pub fn fail_on(mut self, op: &'static str, output: &str) -> Self {
        self.failures.insert(op, output.to_string());
        self
    }

    /// Recorded invocations, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Whether any recorded invocation starts with `op`
    pub fn was_called(&self, op: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.starts_with(op))
    }

    fn record(&self, op: &'static str, detail: &str) -> Result<(), HelmError> {
        let command = if detail.is_empty() {
            op.to_string()
        } else {
            format!("{} {}", op, detail)
        };
        self.calls.borrow_mut().push(command.clone());

        match self.failures.get(op) {
            Some(output) => Err(HelmError::Failed {
                command: format!("helm {}", command),
                status: "exit status: 1".to_string(),
                output: output.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl ChartTool for MockChartTool {
    fn repo_list(&self) -> Result<String, HelmError> {
        self.record(ops::REPO_LIST, "")?;
        let mut listing = String::from("NAME\tURL\n");
        for repo in self.repos.borrow().iter() {
            listing.push_str(&format!("{}\thttps://charts.example.com/{}\n", repo, repo));
        }
        Ok(listing)
    }

    fn repo_add(&self, name: &str, url: &str) -> Result<(), HelmError> {
        self.record(ops::REPO_ADD, &format!("{} {}", name, url))?;
        self.repos.borrow_mut().push(name.to_string());
        Ok(())
    }

    fn repo_update(&self, name: &str) -> Result<(), HelmError> {
        self.record(ops::REPO_UPDATE, name)
    }

    fn pull(&self, chart_ref: &str, version: &str, untar_dir: &Path) -> Result<(), HelmError> {
        self.record(ops::PULL, &format!("{} --version {}", chart_ref, version))?;

        let chart_name = chart_ref.rsplit('/').next().unwrap_or(chart_ref);
        let target = untar_dir.join(chart_name);
        if let Some(writer) = &self.chart_writer {
            writer(&target).map_err(|source| HelmError::Spawn {
                command: format!("helm pull {}", chart_ref),
                source,
            })?;
        }
        Ok(())
    }

    fn dependency_build(&self, chart_dir: &Path) -> Result<(), HelmError> {
        self.record(ops::DEPENDENCY_BUILD, &chart_dir.display().to_string())
    }

    fn lint(&self, chart_dir: &Path) -> Result<String, HelmError> {
        self.record(ops::LINT, &chart_dir.display().to_string())?;
        Ok("1 chart(s) linted, 0 chart(s) failed".to_string())
    }
}
