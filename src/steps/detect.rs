//! "Already applied?" predicates

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chart_document::Document;

use super::StepError;

/// Pluggable detection strategy for a patch step
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// Applied if the file contains `marker`
    MarkerText { path: PathBuf, marker: String },
    /// Applied if the file exists and does not contain `text`
    TextAbsent { path: PathBuf, text: String },
    /// Applied if the document has a value at `key`
    KeyPresent { path: PathBuf, key: Vec<String> },
    /// Applied if the document has no value at `key`
    KeyAbsent { path: PathBuf, key: Vec<String> },
    /// Applied if the file exists
    FileExists { path: PathBuf },
    /// Applied if the file does not exist
    FileAbsent { path: PathBuf },
    /// Applied if the file holds exactly `content`
    FileContent { path: PathBuf, content: Vec<u8> },
    /// Applied if the file parses to a document equal to `expected`
    DocumentEquals { path: PathBuf, expected: Document },
    /// Applied if every predicate holds
    AllOf(Vec<Detection>),
}

impl Detection {
    pub fn marker(path: impl Into<PathBuf>, marker: impl Into<String>) -> Self {
        Detection::MarkerText {
            path: path.into(),
            marker: marker.into(),
        }
    }

    pub fn text_absent(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Detection::TextAbsent {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn key_present(path: impl Into<PathBuf>, key: &[&str]) -> Self {
        Detection::KeyPresent {
            path: path.into(),
            key: key.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn key_absent(path: impl Into<PathBuf>, key: &[&str]) -> Self {
        Detection::KeyAbsent {
            path: path.into(),
            key: key.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Evaluate the predicate.
    ///
    /// A missing target file means "not applied" for text and key checks so
    /// that the apply action surfaces the I/O error. Malformed documents are
    /// errors.
    pub fn is_applied(&self) -> Result<bool, StepError> {
        match self {
            Detection::MarkerText { path, marker } => {
                Ok(read_text(path)?.is_some_and(|content| content.contains(marker.as_str())))
            }
            Detection::TextAbsent { path, text } => {
                Ok(read_text(path)?.is_some_and(|content| !content.contains(text.as_str())))
            }
            Detection::KeyPresent { path, key } => {
                if !path.exists() {
                    return Ok(false);
                }
                let doc = Document::load(path)?;
                Ok(doc.contains_path(&segments(key)))
            }
            Detection::KeyAbsent { path, key } => {
                if !path.exists() {
                    return Ok(false);
                }
                let doc = Document::load(path)?;
                Ok(!doc.contains_path(&segments(key)))
            }
            Detection::FileExists { path } => Ok(path.exists()),
            Detection::FileAbsent { path } => Ok(!path.exists()),
            Detection::FileContent { path, content } => match fs::read(path) {
                Ok(existing) => Ok(existing == *content),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(source) => Err(StepError::Io {
                    op: "read",
                    path: path.clone(),
                    source,
                }),
            },
            Detection::DocumentEquals { path, expected } => {
                if !path.exists() {
                    return Ok(false);
                }
                Ok(Document::load(path)? == *expected)
            }
            Detection::AllOf(all) => {
                for detection in all {
                    if !detection.is_applied()? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

/// File content, or `None` if the file does not exist
fn read_text(path: &Path) -> Result<Option<String>, StepError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StepError::Io {
            op: "read",
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn segments(key: &[String]) -> Vec<&str> {
    key.iter().map(String::as_str).collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detection::MarkerText { path, .. } => write!(f, "marker present in {}", file_name(path)),
            Detection::TextAbsent { path, .. } => write!(f, "{} already rewritten", file_name(path)),
            Detection::KeyPresent { path, key } => {
                write!(f, "{} has {}", file_name(path), key.join("."))
            }
            Detection::KeyAbsent { path, key } => {
                write!(f, "{} has no {}", file_name(path), key.join("."))
            }
            Detection::FileExists { path } => write!(f, "{} exists", file_name(path)),
            Detection::FileAbsent { path } => write!(f, "{} absent", file_name(path)),
            Detection::FileContent { path, .. } => write!(f, "{} up to date", file_name(path)),
            Detection::DocumentEquals { path, .. } => write!(f, "{} up to date", file_name(path)),
            Detection::AllOf(all) if all.is_empty() => write!(f, "nothing to apply"),
            Detection::AllOf(all) if all.len() == 1 => write!(f, "{}", all[0]),
            Detection::AllOf(all) => write!(f, "{} checks passed", all.len()),
        }
    }
}
