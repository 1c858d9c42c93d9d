//! Configuration layering
//!
//! Settings are resolved from three layers, later layers winning:
//! 1. Built-in defaults
//! 2. Config file (`--config`, or `harbor-modifier.toml` in the project dir)
//! 3. CLI flags
//!
//! Each layer is turned into a YAML value and folded with the same deep
//! merge the patch steps use on chart documents.

mod defaults;
mod effective;

pub use defaults::{PipelineConfig, RepoConfig, StepToggles, DEFAULT_CONFIG_FILE, DEFAULT_VERSION};
pub use effective::{ConfigError, ConfigOrigin, ConfigOverrides, ConfigSource, EffectiveConfig, StepOverrides};
