//! Memory type definitions.
//!
//! A fact is a plain string with no identifier of its own. [`MemoryUpdate`] is
//! the edit set the model emits at the end of an evaluation; edits address
//! facts by their text (whole or a fragment).

use serde::{Deserialize, Serialize};

/// Key of the JSON object that carries a [`MemoryUpdate`] inside a reply.
pub const MEMORY_UPDATE_KEY: &str = "memory_updates";

/// Additive, subtractive and replace-in-place edits, applied in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryUpdate {
    /// New facts; exact duplicates of stored facts are ignored.
    pub add: Vec<String>,
    /// Whole facts or fragments of exactly one fact to delete.
    pub remove: Vec<String>,
    pub update: Vec<FactEdit>,
}

impl MemoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.update.is_empty()
    }
}

/// Replace `old` (a whole fact or a fragment of exactly one fact) with `new`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactEdit {
    pub old: String,
    pub new: String,
}

/// Counts from applying one [`MemoryUpdate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    /// Edits abandoned because their target was missing or ambiguous.
    pub skipped: usize,
}

impl UpdateSummary {
    pub fn changed(&self) -> bool {
        self.added + self.removed + self.updated > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_default_to_empty() {
        let update: MemoryUpdate =
            serde_json::from_str(r#"{"add": ["Has a cat named Miso"]}"#).unwrap();
        assert_eq!(update.add.len(), 1);
        assert!(update.remove.is_empty());
        assert!(update.update.is_empty());
        assert!(!update.is_empty());
    }

    #[test]
    fn edit_without_new_text_parses_as_empty() {
        let edit: FactEdit = serde_json::from_str(r#"{"old": "lives in Lyon"}"#).unwrap();
        assert_eq!(edit.old, "lives in Lyon");
        assert!(edit.new.is_empty());
    }
}
