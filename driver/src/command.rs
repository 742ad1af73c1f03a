//! Clang invocation builder.
//!
//! Each pipeline stage has a fixed command shape; the variants carry the
//! concrete paths and flags and [`CompileCommand::render`] produces the
//! final shell line. Building commands from typed fields (instead of
//! placeholder substitution into a template string) makes an unresolved
//! placeholder unrepresentable.

use std::path::PathBuf;

use crate::types::DriverState;

/// `file:line:column` argument for `-code-completion-at`.
#[derive(Debug, Clone)]
pub struct Location {
    /// File name as clang should see it: the temp-file basename for
    /// translation units, the original full path for headers completed
    /// through a synthetic wrapper.
    pub file: String,
    /// 1-indexed.
    pub line: usize,
    /// 1-indexed, already reduced by the filter-word length.
    pub column: usize,
}

#[derive(Debug, Clone)]
pub enum CompileCommand {
    /// Run the preprocessor over the full source file, redirecting output
    /// (including stderr) into `pp_output_file` for line-marker scanning.
    PreProcess {
        clang: PathBuf,
        args: String,
        source_file: PathBuf,
        pp_output_file: PathBuf,
    },
    /// Compile the generated umbrella header into a PCH.
    CreatePch {
        clang: PathBuf,
        args: String,
        umbrella_header: PathBuf,
        pch_file: PathBuf,
    },
    /// Ask for completions at `location` with the PCH preloaded.
    CodeComplete {
        clang: PathBuf,
        args: String,
        pch_file: PathBuf,
        location: Location,
        source_file: String,
    },
}

impl CompileCommand {
    /// The driver state this command drives.
    #[must_use]
    pub fn stage(&self) -> DriverState {
        match self {
            Self::PreProcess { .. } => DriverState::PreProcessing,
            Self::CreatePch { .. } => DriverState::CreatingPch,
            Self::CodeComplete { .. } => DriverState::CompletingCode,
        }
    }

    /// Render the single-line shell command.
    ///
    /// Compiler args may contain newlines (backtick expansions preserve
    /// the subprocess output verbatim); those are collapsed to spaces so
    /// the shell sees one command.
    #[must_use]
    pub fn render(&self) -> String {
        let raw = match self {
            Self::PreProcess {
                clang,
                args,
                source_file,
                pp_output_file,
            } => format!(
                "\"{}\" -cc1 {} -w \"{}\" -E 1> \"{}\" 2>&1",
                clang.display(),
                args,
                source_file.display(),
                pp_output_file.display()
            ),
            Self::CreatePch {
                clang,
                args,
                umbrella_header,
                pch_file,
            } => format!(
                "\"{}\" -cc1 -x c++-header {} -w \"{}\" -emit-pch -o \"{}\"",
                clang.display(),
                args,
                umbrella_header.display(),
                pch_file.display()
            ),
            Self::CodeComplete {
                clang,
                args,
                pch_file,
                location,
                source_file,
            } => format!(
                "\"{}\" -cc1 {} -w -fsyntax-only -include-pch \"{}\" -code-completion-at={}:{}:{} \"{}\"",
                clang.display(),
                args,
                pch_file.display(),
                location.file,
                location.line,
                location.column,
                source_file
            ),
        };
        raw.replace(['\n', '\r'], " ")
    }
}
