//! Run summary (`--summary <path>`)

mod run_summary;

pub use run_summary::{RunSummary, StepReport, RUN_SUMMARY_SCHEMA_ID, RUN_SUMMARY_SCHEMA_VERSION};
