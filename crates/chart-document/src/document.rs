//! YAML documents backed by a top-level mapping

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_yaml::{Mapping, Value};

use crate::merge::merge_mappings;

/// Errors for document load/save
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to {op} {}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {origin}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{origin}: expected a mapping at the top level, found {found}")]
    NotAMapping { origin: String, found: &'static str },

    #[error("failed to serialize document")]
    Serialize(#[source] serde_yaml::Error),
}

/// A parsed values or metadata document.
///
/// The top level is always a mapping. An empty file is an empty document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    root: Mapping,
}

impl Document {
    /// Parse YAML text, naming `origin` in errors
    pub fn parse(text: &str, origin: &str) -> Result<Self, DocumentError> {
        let value: Value = serde_yaml::from_str(text).map_err(|source| DocumentError::Parse {
            origin: origin.to_string(),
            source,
        })?;

        match value {
            Value::Mapping(root) => Ok(Self { root }),
            Value::Null => Ok(Self::default()),
            other => Err(DocumentError::NotAMapping {
                origin: origin.to_string(),
                found: kind_of(&other),
            }),
        }
    }

    /// Load and parse a YAML file
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let text = fs::read_to_string(path).map_err(|source| DocumentError::Io {
            op: "read",
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Serialize to YAML text
    pub fn to_yaml_string(&self) -> Result<String, DocumentError> {
        serde_yaml::to_string(&self.root).map_err(DocumentError::Serialize)
    }

    /// Serialize and overwrite `path`
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let text = self.to_yaml_string()?;
        fs::write(path, text).map_err(|source| DocumentError::Io {
            op: "write",
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn root_mut(&mut self) -> &mut Mapping {
        &mut self.root
    }

    pub fn into_mapping(self) -> Mapping {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Get a top-level value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.root.contains_key(key)
    }

    /// Walk nested mappings along `path`
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.root.get(*first)?;
        for key in rest {
            current = current.as_mapping()?.get(*key)?;
        }
        Some(current)
    }

    pub fn contains_path(&self, path: &[&str]) -> bool {
        self.get_path(path).is_some()
    }

    /// Mutable access to the mapping at `path`. An empty path is the root.
    ///
    /// Returns `None` if any segment is missing or not a mapping.
    pub fn get_mapping_mut(&mut self, path: &[&str]) -> Option<&mut Mapping> {
        let mut current = &mut self.root;
        for key in path {
            current = current.get_mut(*key)?.as_mapping_mut()?;
        }
        Some(current)
    }

    /// Insert or replace a top-level value
    pub fn insert(&mut self, key: &str, value: Value) -> Option<Value> {
        self.root.insert(Value::String(key.to_string()), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.root.shift_remove(key)
    }

    /// Remove the value at `path`, leaving its parent mapping in place
    pub fn remove_path(&mut self, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;
        self.get_mapping_mut(parents)?.shift_remove(*last)
    }

    /// Right-biased deep merge of `source` into this document
    pub fn merge(&mut self, source: Document) {
        merge_mappings(&mut self.root, source.root);
    }
}

impl FromStr for Document {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, "<inline>")
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_mapping() {
        let doc: Document = "a: 1\nb: {c: true}".parse().unwrap();
        assert!(doc.contains_key("a"));
        assert_eq!(doc.get_path(&["b", "c"]), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_empty_text_is_empty_document() {
        let doc: Document = "".parse().unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_top_level_sequence_rejected() {
        let err = "- a\n- b".parse::<Document>().unwrap_err();
        assert!(matches!(err, DocumentError::NotAMapping { found: "sequence", .. }));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let err = "a: [unclosed".parse::<Document>().unwrap_err();
        assert!(matches!(err, DocumentError::Parse { .. }));
    }

    #[test]
    fn test_get_path_through_scalar_is_none() {
        let doc: Document = "a: 1".parse().unwrap();
        assert!(doc.get_path(&["a", "b"]).is_none());
        assert!(doc.get_path(&[]).is_none());
    }

    #[test]
    fn test_remove_path() {
        let mut doc: Document = "database:\n  type: internal\n  internal: {password: x}\n"
            .parse()
            .unwrap();
        assert!(doc.remove_path(&["database", "internal"]).is_some());
        assert!(!doc.contains_path(&["database", "internal"]));
        assert!(doc.contains_path(&["database", "type"]));
        assert!(doc.remove_path(&["database", "internal"]).is_none());
    }

    #[test]
    fn test_merge_documents() {
        let mut dest: Document = "a: {b: 1, c: 2}".parse().unwrap();
        let source: Document = "a: {b: 5, d: 6}".parse().unwrap();
        dest.merge(source);
        let expected: Document = "a: {b: 5, c: 2, d: 6}".parse().unwrap();
        assert_eq!(dest, expected);
    }

    #[test]
    fn test_save_load_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("values.yaml");
        let doc: Document = "z: 1\na:\n  nested: [1, 2]\n".parse().unwrap();

        doc.save(&path).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        Document::load(&path).unwrap().save(&path).unwrap();
        let second = fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Document::load(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, DocumentError::Io { op: "read", .. }));
    }
}
