//! Template and overlay copy steps

use crate::copier::{Placement, TreeCopier};

use super::{ChartLayout, Detection, PatchStep, StepError, StepOutcome};

/// Adds `modifications/templates/**/*.yaml` where the chart has no such file
#[derive(Debug, Clone, Copy)]
pub struct ApplyTemplates;

impl PatchStep for ApplyTemplates {
    fn name(&self) -> &'static str {
        "apply-templates"
    }

    fn description(&self) -> &'static str {
        "Adding custom templates"
    }

    fn detection(&self, layout: &ChartLayout) -> Result<Detection, StepError> {
        let target = layout.templates_dir();
        Ok(Detection::AllOf(
            template_copier(layout)?
                .entries()?
                .into_iter()
                .map(|entry| Detection::FileExists {
                    path: target.join(entry.relative_path),
                })
                .collect(),
        ))
    }

    fn apply(&self, layout: &ChartLayout) -> Result<StepOutcome, StepError> {
        let report = template_copier(layout)?.copy()?;

        if report.copied.is_empty() {
            if report.skipped.is_empty() {
                return Ok(StepOutcome::skipped("no custom templates"));
            }
            return Ok(StepOutcome::skipped(format!(
                "{} template(s) already present",
                report.skipped.len()
            )));
        }

        Ok(StepOutcome::applied(format!(
            "added {} template(s), {} already present",
            report.copied.len(),
            report.skipped.len()
        )))
    }
}

fn template_copier(layout: &ChartLayout) -> Result<TreeCopier, StepError> {
    let copier = TreeCopier::new(
        layout.modifications("templates"),
        layout.templates_dir(),
        Placement::SkipIfExists,
    )
    .with_filter(&["**/*.yaml"])?;
    Ok(copier)
}

fn overlay_copier(layout: &ChartLayout) -> TreeCopier {
    TreeCopier::new(
        layout.modifications("template-overlays"),
        layout.templates_dir(),
        Placement::Overwrite,
    )
}

/// Copies `modifications/template-overlays/**` over the chart's templates
#[derive(Debug, Clone, Copy)]
pub struct ApplyOverlays;

impl PatchStep for ApplyOverlays {
    fn name(&self) -> &'static str {
        "apply-overlays"
    }

    fn description(&self) -> &'static str {
        "Applying template overlays"
    }

    fn detection(&self, layout: &ChartLayout) -> Result<Detection, StepError> {
        let target = layout.templates_dir();
        Ok(Detection::AllOf(
            overlay_copier(layout)
                .entries()?
                .into_iter()
                .map(|entry| Detection::FileContent {
                    path: target.join(entry.relative_path),
                    content: entry.content,
                })
                .collect(),
        ))
    }

    fn apply(&self, layout: &ChartLayout) -> Result<StepOutcome, StepError> {
        let report = overlay_copier(layout).copy()?;
        if report.copied.is_empty() {
            if report.unchanged.is_empty() {
                return Ok(StepOutcome::skipped("no template overlays"));
            }
            return Ok(StepOutcome::skipped(format!(
                "{} template overlay(s) already applied",
                report.unchanged.len()
            )));
        }
        Ok(StepOutcome::applied(format!(
            "applied {} template overlay(s)",
            report.copied.len()
        )))
    }
}
