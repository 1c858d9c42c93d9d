//! Steps that append raw text under a marker

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::debug;

use super::{list_files, ChartLayout, Detection, PatchStep, StepError, StepOutcome};

/// Marker line written above appended `.helmignore` rules
pub const IGNORE_MARKER: &str = "# harbor-modifier: appended ignore rules";

/// Marker comment written above an appended helper template
pub fn helper_marker(file_name: &str) -> String {
    format!("{{{{/* harbor-modifier: {} */}}}}", file_name)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn append(path: &Path, text: &str, create: bool) -> Result<(), StepError> {
    let mut file = OpenOptions::new()
        .append(true)
        .create(create)
        .open(path)
        .map_err(StepError::io("open", path))?;
    file.write_all(text.as_bytes())
        .map_err(StepError::io("append to", path))
}

/// Appends `modifications/helpers/*.tpl` to `templates/_helpers.tpl`
#[derive(Debug, Clone, Copy)]
pub struct ApplyHelpers;

impl PatchStep for ApplyHelpers {
    fn name(&self) -> &'static str {
        "apply-helpers"
    }

    fn description(&self) -> &'static str {
        "Adding helper templates"
    }

    fn detection(&self, layout: &ChartLayout) -> Result<Detection, StepError> {
        let helpers = list_files(&layout.modifications("helpers"), "tpl")?;
        if helpers.is_empty() {
            return Ok(Detection::AllOf(Vec::new()));
        }

        let target = layout.helpers_file();
        Ok(Detection::AllOf(
            helpers
                .iter()
                .map(|h| Detection::marker(&target, helper_marker(&file_name(h))))
                .collect(),
        ))
    }

    fn apply(&self, layout: &ChartLayout) -> Result<StepOutcome, StepError> {
        let helpers = list_files(&layout.modifications("helpers"), "tpl")?;
        if helpers.is_empty() {
            return Ok(StepOutcome::skipped("no helper templates"));
        }

        let target = layout.helpers_file();
        let existing = fs::read_to_string(&target).map_err(StepError::io("read", &target))?;

        let mut appended = Vec::new();
        for helper in &helpers {
            let name = file_name(helper);
            let marker = helper_marker(&name);
            if existing.contains(&marker) {
                debug!("{} already appended", name);
                continue;
            }

            let content = fs::read_to_string(helper).map_err(StepError::io("read", helper))?;
            append(&target, &format!("\n{}\n{}", marker, content), false)?;
            appended.push(name);
        }

        if appended.is_empty() {
            Ok(StepOutcome::skipped("all helper templates already present"))
        } else {
            Ok(StepOutcome::applied(format!("appended {}", appended.join(", "))))
        }
    }
}

/// Appends `modifications/.helmignore` to the chart's `.helmignore`
#[derive(Debug, Clone, Copy)]
pub struct UpdateIgnoreFile;

impl PatchStep for UpdateIgnoreFile {
    fn name(&self) -> &'static str {
        "update-ignore-file"
    }

    fn description(&self) -> &'static str {
        "Updating .helmignore"
    }

    fn detection(&self, layout: &ChartLayout) -> Result<Detection, StepError> {
        if !layout.modifications(".helmignore").is_file() {
            return Ok(Detection::AllOf(Vec::new()));
        }
        Ok(Detection::marker(layout.ignore_file(), IGNORE_MARKER))
    }

    fn apply(&self, layout: &ChartLayout) -> Result<StepOutcome, StepError> {
        let source = layout.modifications(".helmignore");
        if !source.is_file() {
            return Ok(StepOutcome::skipped("no .helmignore modifications"));
        }

        let rules = fs::read_to_string(&source).map_err(StepError::io("read", &source))?;
        append(
            &layout.ignore_file(),
            &format!("\n{}\n{}", IGNORE_MARKER, rules),
            true,
        )?;

        let count = rules
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
            .count();
        Ok(StepOutcome::applied(format!("appended {} ignore rule(s)", count)))
    }
}
