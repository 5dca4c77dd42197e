//! Pull a [`MemoryUpdate`] out of a model reply.
//!
//! The model is asked to end its reply with a fenced JSON block of the form
//! `{"memory_updates": {...}}`. The last such block is parsed and cut from the
//! narrative exactly once. Anything that does not parse leaves the reply as it
//! was.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, error};

use super::types::{MemoryUpdate, MEMORY_UPDATE_KEY};

/// A reply split into the text shown to the user and the memory edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub narrative: String,
    pub update: Option<MemoryUpdate>,
}

impl Extracted {
    fn unchanged(content: &str) -> Self {
        Self {
            narrative: content.to_string(),
            update: None,
        }
    }
}

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```")
            .expect("fenced block pattern is valid")
    })
}

/// Split `content` into narrative and memory update.
pub fn extract(content: &str) -> Extracted {
    let marker = format!("\"{MEMORY_UPDATE_KEY}\"");
    let Some(block) = fenced_block()
        .captures_iter(content)
        .filter(|c| c[1].contains(&marker))
        .last()
    else {
        return Extracted::unchanged(content);
    };

    let whole = block.get(0).map_or(0..0, |m| m.range());
    let body = block[1].trim();

    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "memory update block is not valid JSON, leaving reply untouched");
            return Extracted::unchanged(content);
        }
    };
    let Some(raw) = value.get(MEMORY_UPDATE_KEY) else {
        debug!("fenced block mentions the memory key but does not carry it at top level");
        return Extracted::unchanged(content);
    };
    let update: MemoryUpdate = match serde_json::from_value(raw.clone()) {
        Ok(update) => update,
        Err(e) => {
            error!(error = %e, "memory update has an unexpected shape, leaving reply untouched");
            return Extracted::unchanged(content);
        }
    };

    let narrative = format!("{}{}", &content[..whole.start], &content[whole.end..])
        .trim()
        .to_string();
    Extracted {
        narrative,
        update: Some(update),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = "You slept better this week.\n\n```json\n{\n  \"memory_updates\": {\n    \"add\": [\"Started running on 2025-03-02\"],\n    \"remove\": [\"smokes\"],\n    \"update\": [{\"old\": \"Lyon\", \"new\": \"Paris\"}]\n  }\n}\n```\n";

    #[test]
    fn extracts_and_strips_block() {
        let out = extract(REPLY);
        assert_eq!(out.narrative, "You slept better this week.");
        let update = out.update.unwrap();
        assert_eq!(update.add, vec!["Started running on 2025-03-02"]);
        assert_eq!(update.remove, vec!["smokes"]);
        assert_eq!(update.update[0].old, "Lyon");
        assert_eq!(update.update[0].new, "Paris");
    }

    #[test]
    fn reply_without_block_is_untouched() {
        let out = extract("Just a nice evaluation.");
        assert_eq!(out.narrative, "Just a nice evaluation.");
        assert!(out.update.is_none());
    }

    #[test]
    fn malformed_json_leaves_reply_untouched() {
        let reply = "Good day.\n```json\n{\"memory_updates\": {\"add\": [\"x\",]}\n```";
        let out = extract(reply);
        assert_eq!(out.narrative, reply);
        assert!(out.update.is_none());
    }

    #[test]
    fn other_code_blocks_are_kept() {
        let reply = "Try this:\n```\nrun 5k\n```\nDone.\n```json\n{\"memory_updates\": {\"add\": [\"runs\"]}}\n```";
        let out = extract(reply);
        assert_eq!(out.narrative, "Try this:\n```\nrun 5k\n```\nDone.");
        assert_eq!(out.update.unwrap().add, vec!["runs"]);
    }

    #[test]
    fn only_the_last_block_is_removed() {
        let block = "```json\n{\"memory_updates\": {\"add\": [\"a\"]}}\n```";
        let reply = format!("{block}\nmiddle\n{block}");
        let out = extract(&reply);
        assert_eq!(out.narrative, format!("{block}\nmiddle"));
        assert!(out.update.is_some());
    }

    #[test]
    fn block_without_json_tag_is_accepted() {
        let reply = "Fine.\n```\n{\"memory_updates\": {}}\n```";
        let out = extract(reply);
        assert_eq!(out.narrative, "Fine.");
        assert!(out.update.unwrap().is_empty());
    }
}
