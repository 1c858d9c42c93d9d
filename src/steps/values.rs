//! `values.yaml` steps

use chart_document::{Document, Value};
use tracing::debug;

use super::{list_files, ChartLayout, Detection, PatchStep, StepError, StepOutcome};

/// Top-level values key introduced by the database modifications
pub const DATABASE_VALUES_KEY: &str = "relizaPostgresql";

/// Exposure defaults inserted under `expose.traefik` when absent
const TRAEFIK_DEFAULTS: &str = r#"
enabled: false
host: harbor.example.com
middlewares: []
tls:
  enabled: true
  certResolver: ""
  secretName: ""
httpsRedirect:
  enabled: true
"#;

fn traefik_defaults() -> Result<Value, StepError> {
    let doc = Document::parse(TRAEFIK_DEFAULTS, "traefik defaults")?;
    Ok(Value::Mapping(doc.into_mapping()))
}

/// Deep-merges `modifications/values/*.yaml` into `values.yaml`
#[derive(Debug, Clone, Copy)]
pub struct MergeValues {
    /// Skip once this top-level key exists
    marker_key: Option<&'static str>,
}

impl MergeValues {
    /// With database substitution the `relizaPostgresql` key marks a merged
    /// document; without it the merged result is compared with the file.
    pub fn new(database_substitution: bool) -> Self {
        Self {
            marker_key: database_substitution.then_some(DATABASE_VALUES_KEY),
        }
    }
}

impl PatchStep for MergeValues {
    fn name(&self) -> &'static str {
        "merge-values"
    }

    fn description(&self) -> &'static str {
        "Merging values"
    }

    fn detection(&self, layout: &ChartLayout) -> Result<Detection, StepError> {
        let target = layout.values_file();
        if let Some(key) = self.marker_key {
            return Ok(Detection::key_present(target, &[key]));
        }
        if !target.exists() {
            return Ok(Detection::FileExists { path: target });
        }
        let (expected, _) = merged_values(layout)?;
        Ok(Detection::DocumentEquals {
            path: target,
            expected,
        })
    }

    fn apply(&self, layout: &ChartLayout) -> Result<StepOutcome, StepError> {
        let target = layout.values_file();
        let original = Document::load(&target)?;
        let (values, merged) = merged_values(layout)?;

        if values == original {
            return Ok(StepOutcome::skipped("values already up to date"));
        }

        values.save(&target)?;
        Ok(StepOutcome::applied(format!("merged {} values file(s)", merged)))
    }
}

/// `values.yaml` with every values file merged in, and how many were merged
fn merged_values(layout: &ChartLayout) -> Result<(Document, usize), StepError> {
    let mut values = Document::load(&layout.values_file())?;

    let sources = list_files(&layout.modifications("values"), "yaml")?;
    for source in &sources {
        debug!("merging {}", source.display());
        values.merge(Document::load(source)?);
    }

    if let Some(expose) = values.get_mapping_mut(&["expose"]) {
        if !expose.contains_key("traefik") {
            expose.insert(Value::String("traefik".to_string()), traefik_defaults()?);
        }
    }

    Ok((values, sources.len()))
}

/// Removes the obsolete `database.internal` section
#[derive(Debug, Clone, Copy)]
pub struct CleanupObsoleteSection;

const OBSOLETE_SECTION: [&str; 2] = ["database", "internal"];

impl PatchStep for CleanupObsoleteSection {
    fn name(&self) -> &'static str {
        "cleanup-obsolete-section"
    }

    fn description(&self) -> &'static str {
        "Cleaning up obsolete database.internal section"
    }

    fn detection(&self, layout: &ChartLayout) -> Result<Detection, StepError> {
        Ok(Detection::key_absent(layout.values_file(), &OBSOLETE_SECTION))
    }

    fn apply(&self, layout: &ChartLayout) -> Result<StepOutcome, StepError> {
        let target = layout.values_file();
        let mut values = Document::load(&target)?;

        if values.remove_path(&OBSOLETE_SECTION).is_none() {
            return Ok(StepOutcome::skipped("database.internal not found"));
        }

        values.save(&target)?;
        Ok(StepOutcome::applied("removed database.internal"))
    }
}
