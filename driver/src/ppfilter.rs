//! Preprocessor output filter.
//!
//! Clang's `-E` output carries GNU-style line markers (`# <num> "<path>"`)
//! naming every file the preprocessor entered. Scanning those recovers the
//! real header set behind the stripped includes, which becomes the content
//! of the generated PCH umbrella header.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::types::SourceKind;

static LINE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^#[ \t]*[0-9]+[ \t]*"([^"]+)""#).expect("line-marker pattern"));

/// Lexical path normalization: drops `.` components and resolves `..`
/// without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = Vec::new();
    for c in path.components() {
        match c {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Extract the files named by line markers in raw preprocessor output.
///
/// Paths are unescaped (doubled backslashes), normalized against the
/// source file's directory, and deduplicated in insertion order. C/C++
/// source files whose name equals the request's source file are excluded
/// so a file never includes itself through the umbrella header.
#[must_use]
pub fn collect_headers(raw: &str, source_path: &Path) -> Vec<PathBuf> {
    let base_dir = source_path.parent().unwrap_or_else(|| Path::new("."));
    let source_name = source_path.file_name();

    let mut seen = HashSet::new();
    let mut ordered = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || !line.starts_with('#') {
            continue;
        }
        let Some(caps) = LINE_MARKER_RE.captures(line) else {
            continue;
        };

        let path = PathBuf::from(caps[1].replace("\\\\", "\\"));
        if SourceKind::of(&path).is_source() && path.file_name() == source_name {
            continue;
        }

        let full = if path.is_absolute() {
            normalize(&path)
        } else {
            normalize(&base_dir.join(&path))
        };

        if seen.insert(full.clone()) {
            ordered.push(full);
        }
    }

    ordered
}

/// Keep the headers the original buffer actually referenced.
///
/// Matching is by path suffix against the stripped include directives, to
/// tolerate normalization differences between what the buffer said and
/// what the preprocessor reports. Suffix matching can accept an unrelated
/// header that happens to share a trailing path; this is a known
/// approximation of the include-tracking behavior, kept as-is.
#[must_use]
pub fn select_for_pch(headers: &[PathBuf], removed_includes: &[String]) -> Vec<PathBuf> {
    headers
        .iter()
        .filter(|h| should_include(h, removed_includes))
        .cloned()
        .collect()
}

fn should_include(header: &Path, removed_includes: &[String]) -> bool {
    let text = header.to_string_lossy();
    removed_includes.iter().any(|r| text.ends_with(r.as_str()))
}

/// Render the umbrella header: one `#include "<path>"` line per selected
/// header, in discovery order.
#[must_use]
pub fn umbrella_content(headers: &[PathBuf]) -> String {
    let mut out = String::new();
    for header in headers {
        out.push_str(&format!("#include \"{}\"\n", header.display()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_marker_paths_in_order() {
        let raw = "# 1 \"/usr/include/stdio.h\"\nint x;\n# 330 \"/usr/include/stdlib.h\"\n";
        let headers = collect_headers(raw, Path::new("/proj/main.cpp"));
        assert_eq!(
            headers,
            [
                PathBuf::from("/usr/include/stdio.h"),
                PathBuf::from("/usr/include/stdlib.h"),
            ]
        );
    }

    #[test]
    fn test_deduplicates_repeated_markers() {
        let raw = "# 1 \"a.h\"\n# 5 \"a.h\"\n# 9 \"b.h\"\n";
        let headers = collect_headers(raw, Path::new("/proj/main.cpp"));
        assert_eq!(headers, [PathBuf::from("/proj/a.h"), PathBuf::from("/proj/b.h")]);
    }

    #[test]
    fn test_relative_paths_normalized_against_source_dir() {
        let raw = "# 1 \"../include/./util.h\"\n";
        let headers = collect_headers(raw, Path::new("/proj/src/main.cpp"));
        assert_eq!(headers, [PathBuf::from("/proj/include/util.h")]);
    }

    #[test]
    fn test_source_file_excludes_itself() {
        let raw = "# 1 \"main.cpp\"\n# 2 \"other.cpp\"\n# 3 \"main.h\"\n";
        let headers = collect_headers(raw, Path::new("/proj/main.cpp"));
        // main.cpp (self) is excluded; other.cpp has a different name;
        // main.h is a header, not a source file.
        assert_eq!(
            headers,
            [PathBuf::from("/proj/other.cpp"), PathBuf::from("/proj/main.h")]
        );
    }

    #[test]
    fn test_skips_non_marker_lines() {
        let raw = "not a marker\n#define X 1\n#pragma GCC\n\n   \n# 1 \"a.h\"\n";
        let headers = collect_headers(raw, Path::new("/proj/main.cpp"));
        assert_eq!(headers, [PathBuf::from("/proj/a.h")]);
    }

    #[test]
    fn test_unescapes_doubled_backslashes() {
        let raw = "# 330 \"c:\\\\mingw\\\\include/stdio.h\"\n";
        let headers = collect_headers(raw, Path::new("/proj/main.cpp"));
        assert_eq!(headers.len(), 1);
        assert!(headers[0].to_string_lossy().contains("c:\\mingw\\include/stdio.h"));
    }

    #[test]
    fn test_select_keeps_only_removed_suffix_matches() {
        let headers = vec![
            PathBuf::from("/usr/include/stdio.h"),
            PathBuf::from("/proj/include/b.h"),
        ];
        let selected = select_for_pch(&headers, &["b.h".to_string()]);
        assert_eq!(selected, [PathBuf::from("/proj/include/b.h")]);
    }

    #[test]
    fn test_select_with_nothing_removed_is_empty() {
        let headers = vec![PathBuf::from("/usr/include/stdio.h")];
        assert!(select_for_pch(&headers, &[]).is_empty());
    }

    #[test]
    fn test_umbrella_content_renders_in_order() {
        let headers = vec![PathBuf::from("/inc/a.h"), PathBuf::from("/inc/b.h")];
        assert_eq!(
            umbrella_content(&headers),
            "#include \"/inc/a.h\"\n#include \"/inc/b.h\"\n"
        );
    }

    #[test]
    fn test_umbrella_content_empty() {
        assert_eq!(umbrella_content(&[]), "");
    }
}
