//! Built-in defaults (layer 1)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Chart version fetched when nothing else is configured
pub const DEFAULT_VERSION: &str = "1.18.0";

/// Config file picked up from the project dir when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "harbor-modifier.toml";

/// Chart repository registered with helm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Local repository name (default: "harbor")
    pub name: String,

    /// Repository URL (default: "https://helm.goharbor.io")
    pub url: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            name: "harbor".to_string(),
            url: "https://helm.goharbor.io".to_string(),
        }
    }
}

/// Optional step groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepToggles {
    /// Swap the bundled database for the relizapostgresql sub-chart
    pub database_substitution: bool,

    /// Copy `template-overlays/` over upstream templates
    pub overlays: bool,
}

impl Default for StepToggles {
    fn default() -> Self {
        Self {
            database_substitution: true,
            overlays: true,
        }
    }
}

/// Resolved pipeline settings.
///
/// Relative directories are interpreted against the project dir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Chart version to pull (default: "1.18.0")
    pub version: String,

    pub repo: RepoConfig,

    /// Chart name inside the repository (default: "harbor")
    pub chart: String,

    /// Where the patched chart lives (default: "harbor-helm")
    pub chart_dir: PathBuf,

    /// Modifications tree (default: "modifications")
    pub modifications_dir: PathBuf,

    /// helm executable (default: "helm", resolved via PATH)
    pub helm: PathBuf,

    pub steps: StepToggles,

    /// Run `helm lint` after the dependency build (default: false)
    pub lint: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            repo: RepoConfig::default(),
            chart: "harbor".to_string(),
            chart_dir: PathBuf::from("harbor-helm"),
            modifications_dir: PathBuf::from("modifications"),
            helm: PathBuf::from("helm"),
            steps: StepToggles::default(),
            lint: false,
        }
    }
}

impl PipelineConfig {
    /// `<repo>/<chart>` as passed to `helm pull`
    pub fn chart_ref(&self) -> String {
        format!("{}/{}", self.repo.name, self.chart)
    }
}
