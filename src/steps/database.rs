//! Database substitution steps
//!
//! Points the upstream `harbor.database*` helper definitions at the
//! `relizapostgresql` sub-chart and removes the bundled `harbor-db`
//! templates it replaces.

use std::fs;
use std::io;

use tracing::debug;

use crate::substitute::{apply_all, Substitution, SubstitutionOutcome};

use super::{ChartLayout, Detection, PatchStep, StepError, StepOutcome};

const OLD_DATABASE: &str = r#"{{- define "harbor.database" -}}
  {{- printf "%s-database" (include "harbor.fullname" .) -}}
{{- end -}}"#;

const NEW_DATABASE: &str = r#"{{- define "harbor.database" -}}
  {{- printf "%s-relizapostgresql" (include "harbor.fullname" .) -}}
{{- end -}}"#;

const OLD_USERNAME: &str = r#"{{- define "harbor.database.username" -}}
  {{- if eq .Values.database.type "internal" -}}
    {{- printf "%s" "postgres" -}}
  {{- else -}}
    {{- .Values.database.external.username -}}
  {{- end -}}
{{- end -}}"#;

const NEW_USERNAME: &str = r#"{{- define "harbor.database.username" -}}
  {{- if eq .Values.database.type "internal" -}}
    {{- .Values.relizapostgresql.auth.username -}}
  {{- else -}}
    {{- .Values.database.external.username -}}
  {{- end -}}
{{- end -}}"#;

const OLD_PASSWORD: &str = r#"{{- define "harbor.database.rawPassword" -}}
  {{- if eq .Values.database.type "internal" -}}
    {{- $existingSecret := lookup "v1" "Secret" .Release.Namespace (include "harbor.database" .) -}}
    {{- if and (not (empty $existingSecret)) (hasKey $existingSecret.data "POSTGRES_PASSWORD") -}}
      {{- .Values.database.internal.password | default (index $existingSecret.data "POSTGRES_PASSWORD" | b64dec) -}}
    {{- else -}}
      {{- .Values.database.internal.password -}}
    {{- end -}}
  {{- else -}}
    {{- .Values.database.external.password -}}
  {{- end -}}
{{- end -}}"#;

const NEW_PASSWORD: &str = r#"{{- define "harbor.database.rawPassword" -}}
  {{- if eq .Values.database.type "internal" -}}
    {{- .Values.relizapostgresql.auth.password -}}
  {{- else -}}
    {{- .Values.database.external.password -}}
  {{- end -}}
{{- end -}}"#;

const OLD_CORE_DATABASE: &str = r#"{{- define "harbor.database.coreDatabase" -}}
  {{- if eq .Values.database.type "internal" -}}
    {{- printf "%s" "registry" -}}
  {{- else -}}
    {{- .Values.database.external.coreDatabase -}}
  {{- end -}}
{{- end -}}"#;

const NEW_CORE_DATABASE: &str = r#"{{- define "harbor.database.coreDatabase" -}}
  {{- if eq .Values.database.type "internal" -}}
    {{- .Values.relizapostgresql.auth.database -}}
  {{- else -}}
    {{- .Values.database.external.coreDatabase -}}
  {{- end -}}
{{- end -}}"#;

/// Upstream helper definitions rewritten to use `relizapostgresql`
pub const DATABASE_SUBSTITUTIONS: [Substitution; 4] = [
    Substitution::new("harbor.database", OLD_DATABASE, NEW_DATABASE),
    Substitution::new("harbor.database.username", OLD_USERNAME, NEW_USERNAME),
    Substitution::new("harbor.database.rawPassword", OLD_PASSWORD, NEW_PASSWORD),
    Substitution::new("harbor.database.coreDatabase", OLD_CORE_DATABASE, NEW_CORE_DATABASE),
];

/// Service-name helper added by the helpers step. Redundant once
/// `harbor.database` itself resolves to the relizapostgresql service.
pub const REDUNDANT_TEMPLATE: Substitution = Substitution::removal(
    "harbor.relizapostgresql",
    r#"{{/*
Reliza PostgreSQL service name
Returns the service name for relizapostgresql when enabled
*/}}
{{- define "harbor.relizapostgresql" -}}
  {{- printf "%s-relizapostgresql" (include "harbor.fullname" .) -}}
{{- end -}}
"#,
);

/// Upstream `harbor-db` templates under `templates/database/`
pub const LEGACY_DATABASE_FILES: [&str; 3] = [
    "database-ss.yaml",
    "database-svc.yaml",
    "database-secret.yaml",
];

fn substitute_helpers(
    layout: &ChartLayout,
    substitutions: &[Substitution],
) -> Result<usize, StepError> {
    let target = layout.helpers_file();
    let content = fs::read_to_string(&target).map_err(StepError::io("read", &target))?;

    let (patched, outcomes) = apply_all(&content, substitutions);
    let replaced = outcomes
        .iter()
        .filter(|(_, o)| *o == SubstitutionOutcome::Replaced)
        .count();

    if replaced > 0 {
        fs::write(&target, patched).map_err(StepError::io("write", &target))?;
    }
    Ok(replaced)
}

/// Rewrites the four `harbor.database*` helper definitions
#[derive(Debug, Clone, Copy)]
pub struct PatchDatabaseTemplates;

impl PatchStep for PatchDatabaseTemplates {
    fn name(&self) -> &'static str {
        "patch-database-templates"
    }

    fn description(&self) -> &'static str {
        "Patching database templates for relizapostgresql"
    }

    fn detection(&self, layout: &ChartLayout) -> Result<Detection, StepError> {
        let helpers = layout.helpers_file();
        Ok(Detection::AllOf(
            DATABASE_SUBSTITUTIONS
                .iter()
                .map(|sub| Detection::marker(&helpers, sub.new))
                .collect(),
        ))
    }

    fn apply(&self, layout: &ChartLayout) -> Result<StepOutcome, StepError> {
        match substitute_helpers(layout, &DATABASE_SUBSTITUTIONS)? {
            0 => Ok(StepOutcome::skipped("no upstream database templates to patch")),
            n => Ok(StepOutcome::applied(format!("{} template(s) updated", n))),
        }
    }
}

/// Removes the `harbor.relizapostgresql` helper
#[derive(Debug, Clone, Copy)]
pub struct RemoveRedundantTemplate;

impl PatchStep for RemoveRedundantTemplate {
    fn name(&self) -> &'static str {
        "remove-redundant-template"
    }

    fn description(&self) -> &'static str {
        "Removing redundant harbor.relizapostgresql template"
    }

    fn detection(&self, layout: &ChartLayout) -> Result<Detection, StepError> {
        Ok(Detection::text_absent(layout.helpers_file(), REDUNDANT_TEMPLATE.old))
    }

    fn apply(&self, layout: &ChartLayout) -> Result<StepOutcome, StepError> {
        match substitute_helpers(layout, &[REDUNDANT_TEMPLATE])? {
            0 => Ok(StepOutcome::skipped(
                "template not found (already removed or not added)",
            )),
            _ => Ok(StepOutcome::applied("redundant template removed")),
        }
    }
}

/// Deletes the bundled `harbor-db` templates
#[derive(Debug, Clone, Copy)]
pub struct RemoveLegacyDatabaseFiles;

impl PatchStep for RemoveLegacyDatabaseFiles {
    fn name(&self) -> &'static str {
        "remove-legacy-database-files"
    }

    fn description(&self) -> &'static str {
        "Removing harbor-db templates"
    }

    fn detection(&self, layout: &ChartLayout) -> Result<Detection, StepError> {
        let database_dir = layout.templates_dir().join("database");
        Ok(Detection::AllOf(
            LEGACY_DATABASE_FILES
                .iter()
                .map(|f| Detection::FileAbsent {
                    path: database_dir.join(f),
                })
                .collect(),
        ))
    }

    fn apply(&self, layout: &ChartLayout) -> Result<StepOutcome, StepError> {
        let database_dir = layout.templates_dir().join("database");
        let mut removed = 0;

        for file in LEGACY_DATABASE_FILES {
            let path = database_dir.join(file);
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("removed {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(StepError::Io {
                        op: "remove",
                        path,
                        source,
                    })
                }
            }
        }

        if removed == 0 {
            Ok(StepOutcome::skipped("harbor-db templates already removed"))
        } else {
            Ok(StepOutcome::applied(format!("removed {} harbor-db template(s)", removed)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout_with_helpers(content: &str) -> (TempDir, ChartLayout) {
        let dir = TempDir::new().unwrap();
        let layout = ChartLayout::new(dir.path().join("chart"), dir.path().join("mods"));
        fs::create_dir_all(layout.templates_dir()).unwrap();
        fs::write(layout.helpers_file(), content).unwrap();
        (dir, layout)
    }

    fn upstream_helpers() -> String {
        format!(
            "{{{{/* upstream */}}}}\n{}\n\n{}\n\n{}\n\n{}\n",
            OLD_DATABASE, OLD_USERNAME, OLD_PASSWORD, OLD_CORE_DATABASE
        )
    }

    #[test]
    fn test_patches_all_four_templates() {
        let (_dir, layout) = layout_with_helpers(&upstream_helpers());

        let outcome = PatchDatabaseTemplates.run(&layout).unwrap();
        assert_eq!(outcome, StepOutcome::applied("4 template(s) updated"));

        let content = fs::read_to_string(layout.helpers_file()).unwrap();
        assert!(content.contains("%s-relizapostgresql"));
        assert!(content.contains(".Values.relizapostgresql.auth.username"));
        assert!(content.contains(".Values.relizapostgresql.auth.password"));
        assert!(content.contains(".Values.relizapostgresql.auth.database"));
        assert!(!content.contains("lookup \"v1\" \"Secret\""));
    }

    #[test]
    fn test_patch_twice_equals_once() {
        let (_dir, layout) = layout_with_helpers(&upstream_helpers());

        PatchDatabaseTemplates.run(&layout).unwrap();
        let once = fs::read_to_string(layout.helpers_file()).unwrap();
        let second = PatchDatabaseTemplates.run(&layout).unwrap();

        assert!(!second.is_applied());
        assert_eq!(fs::read_to_string(layout.helpers_file()).unwrap(), once);
        assert!(PatchDatabaseTemplates.detection(&layout).unwrap().is_applied().unwrap());
    }

    #[test]
    fn test_detection_pending_on_upstream_helpers() {
        let (_dir, layout) = layout_with_helpers(&upstream_helpers());
        assert!(!PatchDatabaseTemplates.detection(&layout).unwrap().is_applied().unwrap());
        assert!(RemoveRedundantTemplate.detection(&layout).unwrap().is_applied().unwrap());
    }

    #[test]
    fn test_drifted_upstream_is_silent_noop() {
        let drifted = upstream_helpers().replace("%s-database", "%s-db");
        let (_dir, layout) = layout_with_helpers(&drifted);

        let outcome = PatchDatabaseTemplates.run(&layout).unwrap();
        assert_eq!(outcome, StepOutcome::applied("3 template(s) updated"));
        let content = fs::read_to_string(layout.helpers_file()).unwrap();
        assert!(content.contains("%s-db\""));
    }

    #[test]
    fn test_removes_redundant_template_once() {
        let content = format!("before\n{}after\n", REDUNDANT_TEMPLATE.old);
        let (_dir, layout) = layout_with_helpers(&content);

        let first = RemoveRedundantTemplate.run(&layout).unwrap();
        assert!(first.is_applied());
        assert_eq!(fs::read_to_string(layout.helpers_file()).unwrap(), "before\nafter\n");

        let second = RemoveRedundantTemplate.run(&layout).unwrap();
        assert_eq!(second, StepOutcome::skipped("already applied (_helpers.tpl already rewritten)"));
        assert_eq!(fs::read_to_string(layout.helpers_file()).unwrap(), "before\nafter\n");
    }

    #[test]
    fn test_removes_legacy_files() {
        let (_dir, layout) = layout_with_helpers("");
        let database_dir = layout.templates_dir().join("database");
        fs::create_dir_all(&database_dir).unwrap();
        fs::write(database_dir.join("database-ss.yaml"), "kind: StatefulSet").unwrap();
        fs::write(database_dir.join("database-svc.yaml"), "kind: Service").unwrap();
        fs::write(database_dir.join("keep.yaml"), "kind: ConfigMap").unwrap();

        let first = RemoveLegacyDatabaseFiles.run(&layout).unwrap();
        assert_eq!(first, StepOutcome::applied("removed 2 harbor-db template(s)"));
        assert!(!database_dir.join("database-ss.yaml").exists());
        assert!(database_dir.join("keep.yaml").exists());

        let second = RemoveLegacyDatabaseFiles.run(&layout).unwrap();
        assert!(!second.is_applied());
    }
}
