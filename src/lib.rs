//! Harbor chart modifier
//!
//! Pulls the upstream Harbor Helm chart and reshapes it with a tree of
//! file-based modifications: helper templates, custom templates, values and
//! metadata merges, and template overlays. Every patch step is idempotent, so
//! re-running against an already patched chart is a no-op.

pub mod config;
pub mod copier;
pub mod helm;
pub mod mock;
pub mod pipeline;
pub mod steps;
pub mod substitute;
pub mod summary;

pub use config::{ConfigError, ConfigOverrides, EffectiveConfig, PipelineConfig, StepToggles};
pub use helm::{ChartTool, HelmCli, HelmError};
pub use pipeline::{FetchError, Pipeline, PipelineError, PipelineResult, StepStatus};
pub use steps::{ChartLayout, PatchStep, StepError, StepOutcome};
pub use summary::{RunSummary, StepReport};
