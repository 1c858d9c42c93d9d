//! `helm` subprocess implementation of [`ChartTool`]

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{ChartTool, HelmError, EMPTY_REPO_LIST_OUTPUT};

/// Runs the `helm` binary, capturing combined stdout/stderr
#[derive(Debug, Clone)]
pub struct HelmCli {
    binary: PathBuf,
}

impl HelmCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run<I, S>(&self, args: I) -> Result<String, HelmError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let command = self.render(&args);
        debug!("running {}", command);

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .map_err(|source| HelmError::Spawn {
                command: command.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(HelmError::Failed {
                command,
                status: output.status.to_string(),
                output: combined,
            });
        }

        Ok(combined)
    }

    fn render(&self, args: &[OsString]) -> String {
        let mut parts = vec![self.binary.to_string_lossy().into_owned()];
        parts.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

impl ChartTool for HelmCli {
    fn repo_list(&self) -> Result<String, HelmError> {
        match self.run(["repo", "list"]) {
            Ok(out) => Ok(out),
            // helm exits non-zero when nothing is configured yet
            Err(err) if err.is_benign(&[EMPTY_REPO_LIST_OUTPUT]) => Ok(String::new()),
            Err(err) => Err(err),
        }
    }

    fn repo_add(&self, name: &str, url: &str) -> Result<(), HelmError> {
        self.run(["repo", "add", name, url]).map(|_| ())
    }

    fn repo_update(&self, name: &str) -> Result<(), HelmError> {
        self.run(["repo", "update", name]).map(|_| ())
    }

    fn pull(&self, chart_ref: &str, version: &str, untar_dir: &Path) -> Result<(), HelmError> {
        let args: [&OsStr; 7] = [
            OsStr::new("pull"),
            OsStr::new(chart_ref),
            OsStr::new("--version"),
            OsStr::new(version),
            OsStr::new("--untar"),
            OsStr::new("--untardir"),
            untar_dir.as_os_str(),
        ];
        self.run(args).map(|_| ())
    }

    fn dependency_build(&self, chart_dir: &Path) -> Result<(), HelmError> {
        let args: [&OsStr; 3] = [
            OsStr::new("dependency"),
            OsStr::new("build"),
            chart_dir.as_os_str(),
        ];
        self.run(args).map(|_| ())
    }

    fn lint(&self, chart_dir: &Path) -> Result<String, HelmError> {
        let args: [&OsStr; 2] = [OsStr::new("lint"), chart_dir.as_os_str()];
        self.run(args)
    }
}
