//! Public types consumed by driver embedders.

use std::path::{Path, PathBuf};

/// Which pipeline stage, if any, is currently running.
///
/// Exactly one child process may be outstanding; a new completion request
/// arriving while the state is not [`DriverState::Idle`] is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    PreProcessing,
    CreatingPch,
    CompletingCode,
}

impl DriverState {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PreProcessing => "preprocess",
            Self::CreatingPch => "create-pch",
            Self::CompletingCode => "code-completion",
        }
    }
}

/// Rough classification of a file by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    CSource,
    CppSource,
    Header,
    Other,
}

impl SourceKind {
    #[must_use]
    pub fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("c") => Self::CSource,
            Some("cc" | "cpp" | "cxx" | "c++") => Self::CppSource,
            Some("h" | "hh" | "hpp" | "hxx") => Self::Header,
            _ => Self::Other,
        }
    }

    /// Whether this is a C or C++ translation unit (as opposed to a header
    /// or anything else).
    #[must_use]
    pub fn is_source(self) -> bool {
        matches!(self, Self::CSource | Self::CppSource)
    }
}

/// Where a completion request was issued, carried along the pipeline and
/// handed to the consumer together with the raw clang output.
#[derive(Debug, Clone)]
pub struct CompletionContext {
    source: PathBuf,
    /// 1-indexed line.
    line: usize,
    /// 1-indexed column, already reduced by the filter-word length.
    column: usize,
    /// Partial identifier preceding the cursor, for candidate filtering.
    filter_word: String,
}

impl CompletionContext {
    #[must_use]
    pub fn new(source: PathBuf, line: usize, column: usize, filter_word: String) -> Self {
        Self {
            source,
            line,
            column,
            filter_word,
        }
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    #[must_use]
    pub fn column(&self) -> usize {
        self.column
    }

    #[must_use]
    pub fn filter_word(&self) -> &str {
        &self.filter_word
    }
}

/// An event emitted by the driver toward its consumer.
#[derive(Debug)]
pub enum DriverEvent {
    /// A completion pipeline finished; `raw` is the unparsed clang output.
    /// Emitted exactly once per successful pipeline, never for an aborted
    /// or failed one.
    Completed {
        raw: String,
        context: CompletionContext,
    },
}
