//! `Chart.yaml` step

use chart_document::{append_dependencies, Document, Value, DEPENDENCIES_KEY};
use tracing::debug;

use super::{list_files, ChartLayout, Detection, PatchStep, StepError, StepOutcome};

const API_VERSION_KEY: &str = "apiVersion";

/// Upgrades `apiVersion` to v2 and merges `modifications/chart/*.yaml`.
///
/// Dependency lists are appended to the existing list instead of replacing
/// it; every other key is deep-merged.
#[derive(Debug, Clone, Copy)]
pub struct UpdateMetadata;

impl PatchStep for UpdateMetadata {
    fn name(&self) -> &'static str {
        "update-metadata"
    }

    fn description(&self) -> &'static str {
        "Updating Chart.yaml"
    }

    fn detection(&self, layout: &ChartLayout) -> Result<Detection, StepError> {
        let target = layout.chart_file();
        if !target.exists() {
            return Ok(Detection::FileExists { path: target });
        }
        let (expected, _) = merged_chart(layout)?;
        Ok(Detection::DocumentEquals {
            path: target,
            expected,
        })
    }

    fn apply(&self, layout: &ChartLayout) -> Result<StepOutcome, StepError> {
        let target = layout.chart_file();
        let original = Document::load(&target)?;
        let (chart, changes) = merged_chart(layout)?;

        if chart == original {
            return Ok(StepOutcome::skipped("Chart.yaml already up to date"));
        }

        chart.save(&target)?;
        Ok(StepOutcome::applied(changes.join(", ")))
    }
}

/// `Chart.yaml` with every modification applied, and what changed
fn merged_chart(layout: &ChartLayout) -> Result<(Document, Vec<String>), StepError> {
    let mut chart = Document::load(&layout.chart_file())?;
    let mut changes = Vec::new();

    if chart.get(API_VERSION_KEY).and_then(Value::as_str) == Some("v1") {
        chart.insert(API_VERSION_KEY, Value::String("v2".to_string()));
        changes.push("apiVersion v2".to_string());
    }

    let sources = list_files(&layout.modifications("chart"), "yaml")?;
    let mut appended = 0;
    for source in &sources {
        debug!("merging {}", source.display());
        let mut modification = Document::load(source)?;

        if matches!(modification.get(DEPENDENCIES_KEY), Some(Value::Sequence(_))) {
            if let Some(Value::Sequence(deps)) = modification.remove(DEPENDENCIES_KEY) {
                appended += append_dependencies(chart.root_mut(), deps);
            }
        }
        chart.merge(modification);
    }
    if appended > 0 {
        changes.push(format!("{} dependency(ies) appended", appended));
    }
    if changes.is_empty() {
        changes.push(format!("applied {} chart modification(s)", sources.len()));
    }

    Ok((chart, changes))
}
