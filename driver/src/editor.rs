//! Editor seam.
//!
//! The driver reads the active buffer through this trait; the hosting
//! editor implements it. [`StringEditor`] is a plain in-memory
//! implementation for embedders without an editor widget and for tests.

use std::path::{Path, PathBuf};

/// The editor-side view of the buffer a completion request targets.
///
/// Positions are byte offsets into the buffer; lines are zero-based.
pub trait Editor {
    /// Text between two byte offsets.
    fn text_range(&self, start: usize, end: usize) -> String;
    /// Byte offset of the cursor.
    fn current_position(&self) -> usize;
    /// Zero-based line the cursor is on.
    fn current_line(&self) -> usize;
    /// Byte offset where `line` (zero-based) starts.
    fn position_from_line(&self, line: usize) -> usize;
    /// Full path of the file being edited.
    fn file_path(&self) -> &Path;
    /// Name of the project the file belongs to.
    fn project_name(&self) -> &str;
}

/// Everything the driver needs from the editor, captured when a request
/// arrives so the pipeline never touches the live buffer again.
#[derive(Debug, Clone)]
pub(crate) struct Activation {
    pub path: PathBuf,
    pub project: String,
    /// Buffer content from the start to the cursor.
    pub buffer: String,
    /// Byte offset of the cursor.
    pub cursor: usize,
    /// Zero-based cursor line.
    pub line: usize,
    /// Byte offset where the cursor line starts.
    pub line_start: usize,
}

impl Activation {
    pub fn capture(editor: &dyn Editor) -> Self {
        let cursor = editor.current_position();
        let line = editor.current_line();
        Self {
            path: editor.file_path().to_path_buf(),
            project: editor.project_name().to_string(),
            buffer: editor.text_range(0, cursor),
            cursor,
            line,
            line_start: editor.position_from_line(line),
        }
    }
}

/// In-memory editor over a string buffer.
#[derive(Debug, Clone)]
pub struct StringEditor {
    text: String,
    cursor: usize,
    path: PathBuf,
    project: String,
}

impl StringEditor {
    #[must_use]
    pub fn new(text: impl Into<String>, path: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.len();
        Self {
            text,
            cursor,
            path: path.into(),
            project: project.into(),
        }
    }

    /// Move the cursor to a byte offset (clamped to the buffer length).
    #[must_use]
    pub fn with_cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor.min(self.text.len());
        self
    }
}

impl Editor for StringEditor {
    fn text_range(&self, start: usize, end: usize) -> String {
        let end = end.min(self.text.len());
        let start = start.min(end);
        self.text[start..end].to_string()
    }

    fn current_position(&self) -> usize {
        self.cursor
    }

    fn current_line(&self) -> usize {
        self.text[..self.cursor].matches('\n').count()
    }

    fn position_from_line(&self, line: usize) -> usize {
        if line == 0 {
            return 0;
        }
        self.text
            .match_indices('\n')
            .nth(line - 1)
            .map_or(self.text.len(), |(idx, _)| idx + 1)
    }

    fn file_path(&self) -> &Path {
        &self.path
    }

    fn project_name(&self) -> &str {
        &self.project
    }
}
