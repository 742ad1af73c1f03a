//! Compiler argument assembly.
//!
//! Combines the standard system include paths (from the locator), the
//! project's include paths, compile options, and preprocessor defines into
//! the flag string passed to every stage. Backtick / `$(shell ...)`
//! options are expanded through a blocking subprocess call, memoized for
//! the lifetime of the builder. All caches live on the builder instance;
//! nothing is static, and `clear` resets everything.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use compass_config::Workspace;
use tracing::{debug, warn};

/// Flags that break the clang front-end when forwarded from a gcc-oriented
/// build configuration. Stripped token-wise after assembly.
const CONFLICTING_FLAGS: &[&str] = &[
    "-fno-strict-aliasing",
    "-mthreads",
    "-pipe",
    "-fmessage-length=0",
    "-g",
    "-fPIC",
];

/// Locates the compiler's standard system include directories.
///
/// The result depends only on the compiler binary, so the builder caches
/// it after the first call.
pub trait IncludePathLocator: Send + Sync {
    fn locate(&self, clang_binary: &Path) -> Vec<PathBuf>;
}

/// A fixed list of system include directories, for embedders that already
/// know them (and for tests).
#[derive(Debug, Default)]
pub struct FixedIncludePaths {
    paths: Vec<PathBuf>,
}

impl FixedIncludePaths {
    #[must_use]
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl IncludePathLocator for FixedIncludePaths {
    fn locate(&self, _clang_binary: &Path) -> Vec<PathBuf> {
        self.paths.clone()
    }
}

/// Peel a backtick or `$(shell ...)` wrapper off an option, returning the
/// inner command when present.
fn shell_expr(option: &str) -> Option<&str> {
    if let Some(rest) = option.strip_prefix("$(shell ") {
        return Some(rest.strip_suffix(')').unwrap_or(rest));
    }
    if let Some(rest) = option.strip_prefix('`') {
        return Some(rest.strip_suffix('`').unwrap_or(rest));
    }
    None
}

/// Run a shell expression synchronously and join its stdout lines with
/// spaces. This is the one blocking subprocess call in the driver; it runs
/// inline during argument assembly.
fn run_shell_expr(expr: &str) -> String {
    #[cfg(unix)]
    let output = Command::new("sh").arg("-c").arg(expr).output();
    #[cfg(windows)]
    let output = Command::new("cmd").arg("/C").arg(expr).output();

    match output {
        Ok(out) => String::from_utf8_lossy(&out.stdout)
            .lines()
            .collect::<Vec<_>>()
            .join(" "),
        Err(e) => {
            warn!(expr, "Shell expansion failed: {e}");
            String::new()
        }
    }
}

/// Builds and memoizes the compiler flag string for completion requests.
pub struct ArgsBuilder {
    /// Per-request memo: the assembled flag string. Cleared at the start
    /// of every top-level request, never recomputed within one.
    args: Option<String>,
    /// `-I` flags for the standard system include paths. Computed once per
    /// builder lifetime.
    std_include_args: Option<Vec<String>>,
    /// Expanded shell expressions, keyed by the inner command text.
    backticks: HashMap<String, String>,
}

impl Default for ArgsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArgsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            args: None,
            std_include_args: None,
            backticks: HashMap::new(),
        }
    }

    /// Drop the per-request memo. Must be called when a new top-level
    /// completion request starts; the long-lived caches survive.
    pub fn clear_request(&mut self) {
        self.args = None;
    }

    /// Drop everything, including the standard-include and backtick caches.
    pub fn clear(&mut self) {
        self.args = None;
        self.std_include_args = None;
        self.backticks.clear();
    }

    /// Assemble the flag string for `project`.
    ///
    /// Returns the memoized value when one exists for the current request.
    /// Returns `None` when the project is unknown, has no configuration
    /// matching the build matrix, or is a custom-build project — the
    /// caller must treat that as "cannot compile, skip".
    pub fn build(
        &mut self,
        workspace: &Workspace,
        project: &str,
        locator: &dyn IncludePathLocator,
        clang_binary: &Path,
    ) -> Option<String> {
        if let Some(args) = &self.args {
            return Some(args.clone());
        }

        let config = workspace.build_config_for(project)?;
        if config.is_custom_build() {
            debug!(project, "Custom-build project, cannot derive compiler args");
            return None;
        }

        let mut parts: Vec<String> = self.std_include_args(locator, clang_binary).to_vec();
        for path in config.include_paths() {
            parts.push(format!("-I{path}"));
        }
        for option in config.compile_options() {
            parts.push(self.expand_option(option.trim()));
        }
        for define in config.preprocessor() {
            parts.push(format!("-D{define}"));
        }

        let assembled: String = parts
            .join(" ")
            .split_whitespace()
            .filter(|token| !CONFLICTING_FLAGS.contains(token))
            .collect::<Vec<_>>()
            .join(" ");

        debug!(project, args = %assembled, "Assembled compiler args");
        self.args = Some(assembled.clone());
        Some(assembled)
    }

    fn std_include_args(&mut self, locator: &dyn IncludePathLocator, clang: &Path) -> &[String] {
        self.std_include_args.get_or_insert_with(|| {
            locator
                .locate(clang)
                .into_iter()
                .map(|p| format!("-I{}", p.display()))
                .collect()
        })
    }

    fn expand_option(&mut self, option: &str) -> String {
        let Some(expr) = shell_expr(option) else {
            return option.to_string();
        };
        if let Some(cached) = self.backticks.get(expr) {
            return cached.clone();
        }
        let expanded = run_shell_expr(expr);
        debug!(expr, expanded = %expanded, "Expanded shell option");
        self.backticks.insert(expr.to_string(), expanded.clone());
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn workspace(compile_options: &str) -> Workspace {
        toml::from_str(&format!(
            r#"
            [matrix]
            selected_configuration = "Debug"

            [[projects]]
            name = "editor"

            [[projects.configurations]]
            name = "Debug"
            include_paths = "src;include"
            compile_options = "{compile_options}"
            preprocessor = "DEBUG;_UNICODE"
            "#
        ))
        .unwrap()
    }

    fn locator() -> FixedIncludePaths {
        FixedIncludePaths::new(vec![PathBuf::from("/usr/include/c++/12")])
    }

    #[test]
    fn test_assembles_all_sections() {
        let mut builder = ArgsBuilder::new();
        let args = builder
            .build(
                &workspace("-Wall;-std=c++11"),
                "editor",
                &locator(),
                Path::new("clang"),
            )
            .unwrap();
        assert_eq!(
            args,
            "-I/usr/include/c++/12 -Isrc -Iinclude -Wall -std=c++11 -DDEBUG -D_UNICODE"
        );
    }

    #[test]
    fn test_conflicting_flags_stripped() {
        let mut builder = ArgsBuilder::new();
        let args = builder
            .build(
                &workspace("-Wall;-g;-pipe;-fPIC;-ggdb"),
                "editor",
                &locator(),
                Path::new("clang"),
            )
            .unwrap();
        // -g, -pipe, -fPIC go; -ggdb is a different token and stays.
        assert!(!args.split_whitespace().any(|t| t == "-g"));
        assert!(!args.contains("-pipe"));
        assert!(!args.contains("-fPIC"));
        assert!(args.contains("-ggdb"));
        assert!(args.contains("-Wall"));
    }

    #[test]
    fn test_unknown_project_is_none() {
        let mut builder = ArgsBuilder::new();
        assert!(
            builder
                .build(&workspace(""), "missing", &locator(), Path::new("clang"))
                .is_none()
        );
    }

    #[test]
    fn test_custom_build_is_none() {
        let ws: Workspace = toml::from_str(
            r#"
            [matrix]
            selected_configuration = "Debug"

            [[projects]]
            name = "gen"

            [[projects.configurations]]
            name = "Debug"
            custom_build = true
            "#,
        )
        .unwrap();
        let mut builder = ArgsBuilder::new();
        assert!(
            builder
                .build(&ws, "gen", &locator(), Path::new("clang"))
                .is_none()
        );
    }

    #[test]
    fn test_request_memo_survives_until_cleared() {
        let mut builder = ArgsBuilder::new();
        let first = builder
            .build(&workspace("-Wall"), "editor", &locator(), Path::new("clang"))
            .unwrap();
        // A different workspace is ignored while the memo holds.
        let second = builder
            .build(&workspace("-Wextra"), "editor", &locator(), Path::new("clang"))
            .unwrap();
        assert_eq!(first, second);

        builder.clear_request();
        let third = builder
            .build(&workspace("-Wextra"), "editor", &locator(), Path::new("clang"))
            .unwrap();
        assert!(third.contains("-Wextra"));
    }

    #[test]
    fn test_shell_expr_forms() {
        assert_eq!(shell_expr("`pkg-config --cflags x`"), Some("pkg-config --cflags x"));
        assert_eq!(shell_expr("$(shell pkg-config --cflags x)"), Some("pkg-config --cflags x"));
        assert_eq!(shell_expr("-Wall"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_backtick_expansion_and_memoization() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("calls");
        let expr = format!("echo run >> {} && echo -Ifoo", marker.display());

        let mut builder = ArgsBuilder::new();
        let first = builder.expand_option(&format!("`{expr}`"));
        assert_eq!(first, "-Ifoo");

        // Second expansion of the same expression must come from the memo.
        let second = builder.expand_option(&format!("`{expr}`"));
        assert_eq!(second, "-Ifoo");

        let calls = fs::read_to_string(&marker).unwrap();
        assert_eq!(calls.lines().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_multiline_expansion_joined_with_spaces() {
        let mut builder = ArgsBuilder::new();
        let expanded = builder.expand_option("`printf -- '-Ia\\n-Ib\\n'`");
        assert_eq!(expanded, "-Ia -Ib");
    }
}
