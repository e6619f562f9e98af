//! Action rules: what to do when a file of a given type changes.
//!
//! Rules are loaded once from configuration and immutable at run time.
//! Matching picks the numerically lowest priority; ties go to the rule
//! declared first.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::watcher::NotificationKind;

/// What a matched rule does with the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Move the file into the rule's destination directory.
    Move,
    /// Copy the file into the rule's destination directory.
    Copy,
    /// Only emit an observability record.
    Log,
}

/// One configured `(file type, event) -> action` rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRule {
    /// Short type code the rule applies to (`jpg`, `pdf`, `UNK`, …).
    pub file_type: String,
    /// Event kind the rule fires on.
    pub event: NotificationKind,
    pub action: ActionKind,
    /// Destination directory for move/copy. Ignored for log rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// Lower value wins.
    #[serde(default)]
    pub priority: i32,
}

/// Ordered rule list with priority matching.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ActionRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<ActionRule>) -> Self {
        Self { rules }
    }

    /// Best matching rule for a classified event, or `None`.
    ///
    /// `min_by_key` keeps the first of equal keys, which gives the
    /// declaration-order tie-break for free.
    pub fn best_match(&self, type_code: &str, event: NotificationKind) -> Option<&ActionRule> {
        self.rules
            .iter()
            .filter(|r| r.event == event && r.file_type.eq_ignore_ascii_case(type_code))
            .min_by_key(|r| r.priority)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionRule> {
        self.rules.iter()
    }
}
