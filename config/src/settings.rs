//! Driver settings: the clang binary, the PCH cache directory, and the
//! enable switch.

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    /// Master switch. When false the driver drops every request.
    enabled: bool,
    /// Explicit clang executable. When unset the driver resolves `clang`
    /// from `PATH`.
    clang_binary: Option<PathBuf>,
    /// Directory for generated PCH artifacts. Defaults to the platform
    /// cache directory.
    cache_dir: Option<PathBuf>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            clang_binary: None,
            cache_dir: None,
        }
    }
}

impl DriverSettings {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn clang_binary(&self) -> Option<&Path> {
        self.clang_binary.as_deref()
    }

    /// The PCH cache directory, falling back to
    /// `<platform cache dir>/compass` and finally to the temp directory.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("compass")
    }

    /// Settings with an explicit cache directory (used by embedders and
    /// tests that pin the cache location).
    #[must_use]
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    #[must_use]
    pub fn with_clang_binary(mut self, binary: PathBuf) -> Self {
        self.clang_binary = Some(binary);
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s: DriverSettings = toml::from_str("").unwrap();
        assert!(s.enabled());
        assert!(s.clang_binary().is_none());
        assert!(s.cache_dir().ends_with("compass"));
    }

    #[test]
    fn test_explicit_values() {
        let s: DriverSettings = toml::from_str(
            r#"
            enabled = false
            clang_binary = "/opt/llvm/bin/clang"
            cache_dir = "/var/cache/compass"
            "#,
        )
        .unwrap();
        assert!(!s.enabled());
        assert_eq!(s.clang_binary(), Some(Path::new("/opt/llvm/bin/clang")));
        assert_eq!(s.cache_dir(), PathBuf::from("/var/cache/compass"));
    }

    #[test]
    fn test_builder_helpers() {
        let s = DriverSettings::default()
            .with_cache_dir(PathBuf::from("/tmp/pch"))
            .with_enabled(false);
        assert_eq!(s.cache_dir(), PathBuf::from("/tmp/pch"));
        assert!(!s.enabled());
    }
}
