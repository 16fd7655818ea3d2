//! Line-level configuration diffing.
//!
//! Configuration is treated as opaque line-oriented text. Normalization
//! strips everything that is not a semantic config line (prompts, echoed
//! commands, informational banners, pagination residue), and the diff is a
//! set difference over the normalized lines.
//!
//! Known limitation: because the comparison is set-based, duplicate lines
//! collapse to one element and reordering without content change is
//! invisible.

use std::collections::BTreeSet;

use crate::session::transcript;

/// The command verb whose echo lines are dropped during normalization when
/// they appear together with the word "configuration".
const COMMAND_KEYWORD: &str = "display";

/// Lines present on one side but not the other, per direction.
///
/// `BTreeSet` keeps rendering deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineDiff {
    /// Lines present in the second text but not the first.
    pub added: BTreeSet<String>,

    /// Lines present in the first text but not the second.
    pub removed: BTreeSet<String>,
}

impl LineDiff {
    /// True when both directions are empty.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Normalize a configuration text into its semantic lines, in order.
///
/// A line is dropped when, after scrubbing and trimming, it:
/// - starts with a nested-prompt marker (`<`),
/// - ends with a shell-prompt character (`#` or `>`),
/// - contains both the command keyword and the word "configuration"
///   (an echoed fetch command),
/// - starts with an informational banner marker (`Info:`), or
/// - is empty.
pub fn normalize(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.lines() {
        let line = transcript::scrub_line(raw);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('<') {
            continue;
        }
        if trimmed.ends_with('#') || trimmed.ends_with('>') {
            continue;
        }
        if trimmed.contains(COMMAND_KEYWORD) && trimmed.contains("configuration") {
            continue;
        }
        if trimmed.starts_with("Info:") {
            continue;
        }
        lines.push(trimmed.to_string());
    }
    lines
}

/// Compute the line-set difference between two configuration texts.
///
/// `added` holds lines of `b` missing from `a`; `removed` holds lines of `a`
/// missing from `b`. Both inputs may be raw or already-scrubbed output.
pub fn diff(a: &str, b: &str) -> LineDiff {
    let a_lines: BTreeSet<String> = normalize(a).into_iter().collect();
    let b_lines: BTreeSet<String> = normalize(b).into_iter().collect();

    LineDiff {
        added: b_lines.difference(&a_lines).cloned().collect(),
        removed: a_lines.difference(&b_lines).cloned().collect(),
    }
}
