//! Exact-match literal substitution
//!
//! Replaces known upstream text blocks verbatim. When the expected block is
//! not present the substitution does nothing and is not an error: either it
//! was already applied on an earlier run, or upstream drifted. The two cases
//! are told apart by looking for the replacement text.

use std::fmt;

use tracing::{debug, warn};

/// A literal block to replace
#[derive(Debug, Clone, Copy)]
pub struct Substitution {
    /// Short name for logs
    pub name: &'static str,
    /// Text expected verbatim in the upstream file
    pub old: &'static str,
    /// Replacement text. Empty removes the block.
    pub new: &'static str,
}

/// What happened to one substitution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstitutionOutcome {
    /// First occurrence of `old` replaced
    Replaced,
    /// `old` absent and `new` present (or `new` is a removal)
    AlreadyApplied,
    /// Neither text present
    NotFound,
}

impl fmt::Display for SubstitutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstitutionOutcome::Replaced => write!(f, "replaced"),
            SubstitutionOutcome::AlreadyApplied => write!(f, "already applied"),
            SubstitutionOutcome::NotFound => write!(f, "not found"),
        }
    }
}

impl Substitution {
    pub const fn new(name: &'static str, old: &'static str, new: &'static str) -> Self {
        Self { name, old, new }
    }

    /// A substitution that deletes `old`
    pub const fn removal(name: &'static str, old: &'static str) -> Self {
        Self { name, old, new: "" }
    }

    /// Apply to `content`, replacing at most one occurrence
    pub fn apply(&self, content: &str) -> (String, SubstitutionOutcome) {
        if content.contains(self.old) {
            return (content.replacen(self.old, self.new, 1), SubstitutionOutcome::Replaced);
        }

        let outcome = if self.new.is_empty() || content.contains(self.new) {
            SubstitutionOutcome::AlreadyApplied
        } else {
            SubstitutionOutcome::NotFound
        };
        (content.to_string(), outcome)
    }
}

/// Apply substitutions in order.
///
/// Returns the new content and the outcome of each substitution. Blocks
/// that are neither present nor already replaced are logged as warnings.
pub fn apply_all(
    content: &str,
    substitutions: &[Substitution],
) -> (String, Vec<(&'static str, SubstitutionOutcome)>) {
    let mut current = content.to_string();
    let mut outcomes = Vec::with_capacity(substitutions.len());

    for sub in substitutions {
        let (next, outcome) = sub.apply(&current);
        match outcome {
            SubstitutionOutcome::Replaced => debug!("{}: replaced", sub.name),
            SubstitutionOutcome::AlreadyApplied => debug!("{}: already applied", sub.name),
            SubstitutionOutcome::NotFound => {
                warn!("{}: expected text not found, upstream template may have changed", sub.name)
            }
        }
        current = next;
        outcomes.push((sub.name, outcome));
    }

    (current, outcomes)
}
