//! Transcript cleanup for raw interactive shell output.
//!
//! Interactive shells interleave the real command output with pagination
//! markers and cursor-repositioning escape codes. This module strips both so
//! downstream consumers (the snapshot store and the diff engine) only ever
//! see configuration text. The scrub is idempotent: already-clean text
//! passes through unchanged.

use std::sync::OnceLock;

use regex::Regex;

/// Pagination markers emitted by Huawei and H3C devices, longest first so a
/// single replace pass never leaves a partial marker behind.
pub const PAGING_MARKERS: [&str; 3] = ["  ---- More ----", " ---- More ----", "--More--"];

/// Cursor-repositioning codes H3C emits after a pagination continuation.
///
/// These arrive without the ESC byte (the PTY already consumed it), so the
/// ANSI stripper at the channel layer cannot catch them; they look like
/// `[42D  [42D` in the transcript.
fn cursor_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\d+D\s*\[\d+D").expect("valid cursor-code pattern"))
}

/// Check whether a received chunk contains a pagination prompt.
pub fn contains_paging_marker(chunk: &str) -> bool {
    PAGING_MARKERS.iter().any(|m| chunk.contains(m))
}

/// Strip pagination markers and cursor-repositioning codes from `text`.
pub fn scrub(text: &str) -> String {
    let mut out = text.to_string();
    for marker in PAGING_MARKERS {
        out = out.replace(marker, "");
    }
    cursor_code().replace_all(&out, "").into_owned()
}

/// Strip markers and cursor codes from a single line.
///
/// Used by the diff engine's normalization so it stays robust to raw input
/// that never went through [`scrub`].
pub fn scrub_line(line: &str) -> String {
    let mut out = line.to_string();
    for marker in PAGING_MARKERS {
        out = out.replace(marker, "");
    }
    cursor_code().replace_all(&out, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_all_marker_variants() {
        let raw = "line one  ---- More ----\nline two ---- More ----\nline three--More--\n";
        let clean = scrub(raw);
        assert_eq!(clean, "line one\nline two\nline three\n");
    }

    #[test]
    fn test_strips_cursor_codes() {
        let raw = "[42D                                          [42Dinterface Vlanif10";
        assert_eq!(scrub(raw), "interface Vlanif10");
    }

    #[test]
    fn test_scrub_is_idempotent() {
        let clean = "sysname core-sw1\ninterface GigabitEthernet0/0/1\n";
        assert_eq!(scrub(clean), clean);
        assert_eq!(scrub(&scrub(clean)), clean);
    }

    #[test]
    fn test_detects_paging_marker() {
        assert!(contains_paging_marker("some output  ---- More ----"));
        assert!(contains_paging_marker("partial--More--"));
        assert!(!contains_paging_marker("ordinary config line"));
    }
}
