//! Buffer transformations applied before handing a snapshot to clang.
//!
//! Two passes: stripping `#include` directives (their targets are folded
//! into the PCH instead, so the truncated completion buffer compiles fast)
//! and peeling the partial identifier off the buffer tail so clang sees a
//! clean completion point.

use std::sync::LazyLock;

use regex::Regex;

/// Upper bound on the number of logical lines scanned for include
/// directives. Includes past this point are left in place; the cap keeps
/// the per-keystroke cost bounded on pathological files.
pub const MAX_SCANNED_LINES: usize = 300;

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[ \t]*#[ \t]*include[ \t]*["<]([^">]+)[">]"#).expect("include pattern")
});

/// Remove `#include` directives from the first [`MAX_SCANNED_LINES`] lines.
///
/// Returns the stripped buffer and the removed include paths in discovery
/// order (duplicates preserved). Only the directive text is deleted; the
/// rest of each line, and every line beyond the scan cap, passes through
/// verbatim. Running the pass over its own output is a no-op.
#[must_use]
pub fn strip_includes(buffer: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(buffer.len());
    let mut removed = Vec::new();

    for (idx, line) in buffer.split_inclusive('\n').enumerate() {
        if idx >= MAX_SCANNED_LINES {
            out.push_str(line);
            continue;
        }

        let trimmed = line.trim();
        // Cheap prefilter: the pattern can only match preprocessor lines.
        if trimmed.starts_with('#')
            && let Some(caps) = INCLUDE_RE.captures(line)
        {
            let matched = caps.get(0).expect("whole match");
            // Recorded with forward slashes so the path suffix-matches the
            // normalized preprocessor output.
            removed.push(caps[1].replace('\\', "/"));
            out.push_str(&line[..matched.start()]);
            out.push_str(&line[matched.end()..]);
        } else {
            out.push_str(line);
        }
    }

    (out, removed)
}

/// Peel the partial identifier off the end of the buffer.
///
/// Walks backward until the remaining text ends with `->`, `.` or `::`;
/// every character consumed becomes part of the filter word. When no
/// separator exists the entire buffer is consumed — callers must tolerate
/// that. Returns `(truncated_buffer, filter_word)`.
#[must_use]
pub fn extract_filter_word(buffer: &str) -> (String, String) {
    let mut truncated = buffer.to_string();
    let mut word = String::new();

    while !truncated.is_empty() {
        if truncated.ends_with("->") || truncated.ends_with('.') || truncated.ends_with("::") {
            break;
        }
        let ch = truncated.pop().expect("non-empty");
        word.insert(0, ch);
    }

    (truncated, word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_includes_is_identity() {
        let buffer = "int main() {\n    return 0;\n}\n";
        let (out, removed) = strip_includes(buffer);
        assert_eq!(out, buffer);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_strip_records_in_discovery_order() {
        let buffer = "#include \"a.h\"\n#include <b/c.h>\nint x;\n#include \"a.h\"\n";
        let (out, removed) = strip_includes(buffer);
        assert_eq!(removed, vec!["a.h", "b/c.h", "a.h"]);
        assert_eq!(out, "\n\nint x;\n\n");
    }

    #[test]
    fn test_strip_preserves_rest_of_line() {
        let buffer = "#include \"a.h\" // keep me\n";
        let (out, removed) = strip_includes(buffer);
        assert_eq!(removed, vec!["a.h"]);
        assert_eq!(out, " // keep me\n");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let buffer = "#include <vector>\nstd::vector<int> v;\n";
        let (first, removed) = strip_includes(buffer);
        assert_eq!(removed, vec!["vector"]);
        let (second, removed_again) = strip_includes(&first);
        assert_eq!(second, first);
        assert!(removed_again.is_empty());
    }

    #[test]
    fn test_non_include_preprocessor_lines_untouched() {
        let buffer = "#define FOO 1\n#pragma once\n# if 0\n";
        let (out, removed) = strip_includes(buffer);
        assert_eq!(out, buffer);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_scan_cap_passes_late_includes_through() {
        let mut buffer = String::new();
        for _ in 0..MAX_SCANNED_LINES {
            buffer.push_str("int x;\n");
        }
        buffer.push_str("#include \"late.h\"\n");
        let (out, removed) = strip_includes(&buffer);
        assert!(removed.is_empty());
        assert_eq!(out, buffer);
    }

    #[test]
    fn test_indented_include_with_spaces() {
        let buffer = "  #  include  \"deep/path.h\"\n";
        let (out, removed) = strip_includes(buffer);
        assert_eq!(removed, vec!["deep/path.h"]);
        assert_eq!(out, "\n");
    }

    #[test]
    fn test_backslash_include_recorded_with_forward_slashes() {
        let buffer = "#include \"dir\\sub\\a.h\"\n";
        let (out, removed) = strip_includes(buffer);
        assert_eq!(removed, vec!["dir/sub/a.h"]);
        assert_eq!(out, "\n");
    }

    #[test]
    fn test_filter_word_after_dot() {
        let (truncated, word) = extract_filter_word("foo.bar");
        assert_eq!(truncated, "foo.");
        assert_eq!(word, "bar");
    }

    #[test]
    fn test_filter_word_after_arrow() {
        let (truncated, word) = extract_filter_word("foo->bar");
        assert_eq!(truncated, "foo->");
        assert_eq!(word, "bar");
    }

    #[test]
    fn test_filter_word_after_scope() {
        let (truncated, word) = extract_filter_word("std::ve");
        assert_eq!(truncated, "std::");
        assert_eq!(word, "ve");
    }

    #[test]
    fn test_filter_word_consumes_whole_buffer_without_separator() {
        let (truncated, word) = extract_filter_word("identifier");
        assert_eq!(truncated, "");
        assert_eq!(word, "identifier");
    }

    #[test]
    fn test_filter_word_empty_at_separator() {
        let (truncated, word) = extract_filter_word("obj->");
        assert_eq!(truncated, "obj->");
        assert_eq!(word, "");
    }

    #[test]
    fn test_filter_word_empty_buffer() {
        let (truncated, word) = extract_filter_word("");
        assert_eq!(truncated, "");
        assert_eq!(word, "");
    }
}
