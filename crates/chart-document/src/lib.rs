//! Nested YAML documents for chart values and metadata.
//!
//! A [`Document`] is a parsed `values.yaml` or `Chart.yaml`: a top-level
//! mapping whose values are arbitrary YAML. Documents are merged with a
//! right-biased deep merge where only mapping-into-mapping recurses.

mod document;
mod merge;

pub use document::{Document, DocumentError};
pub use merge::{append_dependencies, deep_merge, dependency_identity, merge_mappings, DEPENDENCIES_KEY};

pub use serde_yaml::{Mapping, Value};
