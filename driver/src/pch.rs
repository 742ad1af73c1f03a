//! Precompiled-header cache.
//!
//! One entry per source file, recording the compiled PCH artifact, the
//! headers folded into it, and the include directives that were stripped
//! from the buffer when it was built. An entry is stale as soon as the
//! stripped-include set of the current buffer differs in membership from
//! the recorded one.

use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Append a suffix to a path without touching its existing extension.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

/// A cached PCH artifact for one source file.
#[derive(Debug, Clone)]
pub struct PchEntry {
    pch_file: PathBuf,
    headers: Vec<PathBuf>,
    removed_includes: Vec<String>,
}

impl PchEntry {
    #[must_use]
    pub fn pch_file(&self) -> &Path {
        &self.pch_file
    }

    /// Headers the PCH was built from, in discovery order.
    #[must_use]
    pub fn headers(&self) -> &[PathBuf] {
        &self.headers
    }

    #[must_use]
    pub fn removed_includes(&self) -> &[String] {
        &self.removed_includes
    }

    /// True when the current stripped-include set differs in membership
    /// from the recorded one. Order and duplicates are ignored; any added
    /// or removed element counts.
    #[must_use]
    pub fn needs_regeneration(&self, current_removed: &[String]) -> bool {
        let recorded: BTreeSet<&str> = self.removed_includes.iter().map(String::as_str).collect();
        let current: BTreeSet<&str> = current_removed.iter().map(String::as_str).collect();
        recorded != current
    }
}

/// PCH entries keyed by source path, plus the derived artifact paths under
/// the cache directory.
#[derive(Debug)]
pub struct PchCache {
    cache_dir: PathBuf,
    entries: HashMap<PathBuf, PchEntry>,
}

impl PchCache {
    #[must_use]
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            entries: HashMap::new(),
        }
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    #[must_use]
    pub fn entry(&self, source: &Path) -> Option<&PchEntry> {
        self.entries.get(source)
    }

    /// Whether the pipeline must regenerate the PCH for `source` given the
    /// includes stripped from the current buffer. Always true when no
    /// entry exists.
    #[must_use]
    pub fn needs_regeneration(&self, source: &Path, current_removed: &[String]) -> bool {
        self.entries
            .get(source)
            .is_none_or(|entry| entry.needs_regeneration(current_removed))
    }

    /// Replace the entry for `source`. Replacement is whole-entry; a prior
    /// entry is discarded only when the new one is installed.
    pub fn upsert(
        &mut self,
        source: PathBuf,
        pch_file: PathBuf,
        removed_includes: Vec<String>,
        headers: Vec<PathBuf>,
    ) {
        self.entries.insert(
            source,
            PchEntry {
                pch_file,
                headers,
                removed_includes,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// `<cache dir>/<stem>__H__.h` — the generated umbrella header.
    #[must_use]
    pub fn umbrella_header(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.cache_dir.join(format!("{stem}__H__.h"))
    }

    /// The compiled PCH: umbrella path + `.pch`.
    #[must_use]
    pub fn pch_file(&self, source: &Path) -> PathBuf {
        with_suffix(&self.umbrella_header(source), ".pch")
    }

    /// Raw preprocessor output capture: umbrella path + `.1`.
    #[must_use]
    pub fn pp_output_file(&self, source: &Path) -> PathBuf {
        with_suffix(&self.umbrella_header(source), ".1")
    }
}
