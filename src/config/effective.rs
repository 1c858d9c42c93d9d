//! Effective configuration with provenance

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chart_document::{deep_merge, Mapping, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::defaults::{PipelineConfig, DEFAULT_CONFIG_FILE};
use crate::steps::ChartLayout;

/// Origin of a configuration layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Step toggles set from the command line
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_substitution: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlays: Option<bool>,
}

impl StepOverrides {
    fn is_empty(&self) -> bool {
        self.database_substitution.is_none() && self.overlays.is_none()
    }
}

/// Layer 3: values given on the command line. Unset fields fall through.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "StepOverrides::is_empty")]
    pub steps: StepOverrides,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lint: Option<bool>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration")]
    Invalid(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Merged settings plus the layers that produced them
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    /// Directory relative paths are resolved against
    pub project_dir: PathBuf,

    pub config: PipelineConfig,

    /// Contributing layers in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Resolve configuration for `project_dir`.
    ///
    /// An explicit `config_path` must exist; without one, the default file in
    /// the project dir is used only if present.
    pub fn build(
        project_dir: &Path,
        config_path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut merged = serde_yaml::to_value(PipelineConfig::default())?;
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
        }];

        let file = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => Some(project_dir.join(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
        };
        if let Some(path) = file {
            debug!("loading config from {}", path.display());
            deep_merge(&mut merged, Self::load_toml_file(&path)?);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path),
            });
        }

        let cli = serde_yaml::to_value(overrides)?;
        if cli.as_mapping().is_some_and(|m| !m.is_empty()) {
            deep_merge(&mut merged, cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
            });
        }

        let config: PipelineConfig = serde_yaml::from_value(merged)?;
        Self::validate_config(&config)?;

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            config,
            sources,
        })
    }

    /// Load a TOML file as a YAML value so it can join the merge
    fn load_toml_file(path: &Path) -> Result<Value, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let table: Mapping = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Value::Mapping(table))
    }

    fn validate_config(config: &PipelineConfig) -> Result<(), ConfigError> {
        if config.version.trim().is_empty() {
            return Err(ConfigError::Validation("version must not be empty".to_string()));
        }
        if config.version.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "version {:?} must not contain whitespace",
                config.version
            )));
        }
        if config.repo.name.is_empty() || config.chart.is_empty() {
            return Err(ConfigError::Validation(
                "repo.name and chart must not be empty".to_string(),
            ));
        }
        if config.repo.url.is_empty() {
            return Err(ConfigError::Validation("repo.url must not be empty".to_string()));
        }
        Ok(())
    }

    /// Chart directory, resolved against the project dir
    pub fn chart_dir(&self) -> PathBuf {
        self.project_dir.join(&self.config.chart_dir)
    }

    /// Modifications tree, resolved against the project dir
    pub fn modifications_dir(&self) -> PathBuf {
        self.project_dir.join(&self.config.modifications_dir)
    }

    pub fn layout(&self) -> ChartLayout {
        ChartLayout::new(self.chart_dir(), self.modifications_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_with_defaults_only() {
        let dir = TempDir::new().unwrap();
        let config = EffectiveConfig::build(dir.path(), None, &ConfigOverrides::default()).unwrap();

        assert_eq!(config.config, PipelineConfig::default());
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].origin, ConfigOrigin::Builtin);
        assert_eq!(config.chart_dir(), dir.path().join("harbor-helm"));
        assert_eq!(config.modifications_dir(), dir.path().join("modifications"));
    }

    #[test]
    fn test_default_file_picked_up() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "version = \"1.17.1\"\n\n[repo]\nname = \"goharbor\"\n",
        )
        .unwrap();

        let config = EffectiveConfig::build(dir.path(), None, &ConfigOverrides::default()).unwrap();

        assert_eq!(config.config.version, "1.17.1");
        assert_eq!(config.config.repo.name, "goharbor");
        assert_eq!(config.config.repo.url, "https://helm.goharbor.io");
        assert_eq!(config.sources[1].origin, ConfigOrigin::File);
    }

    #[test]
    fn test_cli_wins_over_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "version = \"1.17.1\"\nlint = true\n\n[steps]\noverlays = false\n").unwrap();

        let overrides = ConfigOverrides {
            version: Some("1.18.1".to_string()),
            steps: StepOverrides {
                database_substitution: Some(false),
                overlays: None,
            },
            lint: None,
        };
        let config = EffectiveConfig::build(dir.path(), Some(&path), &overrides).unwrap();

        assert_eq!(config.config.version, "1.18.1");
        assert!(config.config.lint);
        assert!(!config.config.steps.overlays);
        assert!(!config.config.steps.database_substitution);
        let origins: Vec<_> = config.sources.iter().map(|s| s.origin).collect();
        assert_eq!(origins, vec![ConfigOrigin::Builtin, ConfigOrigin::File, ConfigOrigin::Cli]);
    }

    #[test]
    fn test_absolute_chart_dir_kept() {
        let dir = TempDir::new().unwrap();
        let elsewhere = dir.path().join("elsewhere");
        fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            format!("chart_dir = {:?}\n", elsewhere.to_str().unwrap()),
        )
        .unwrap();

        let config = EffectiveConfig::build(
            &dir.path().join("project"),
            Some(&dir.path().join(DEFAULT_CONFIG_FILE)),
            &ConfigOverrides::default(),
        )
        .unwrap();
        assert_eq!(config.chart_dir(), elsewhere);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = EffectiveConfig::build(
            dir.path(),
            Some(&dir.path().join("absent.toml")),
            &ConfigOverrides::default(),
        );
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "version = \n").unwrap();
        let result = EffectiveConfig::build(dir.path(), None, &ConfigOverrides::default());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_empty_version_rejected() {
        let dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            version: Some(String::new()),
            ..Default::default()
        };
        let err = EffectiveConfig::build(dir.path(), None, &overrides).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "helm_bin = \"/usr/bin/helm\"\n").unwrap();
        let result = EffectiveConfig::build(dir.path(), None, &ConfigOverrides::default());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
