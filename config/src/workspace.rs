//! Workspace, project, and build-configuration model.
//!
//! Mirrors the build system's configuration matrix: the workspace selects a
//! configuration name (e.g. "Debug"), each project may override it, and the
//! resolved per-project configuration carries the compile flags the driver
//! needs. List-valued fields are stored as `;`-separated strings, the
//! format the build system emits.

use serde::Deserialize;
use std::collections::HashMap;

/// Split a `;`-separated list into trimmed, non-empty items.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// A single build configuration of a project.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    name: String,
    /// `;`-separated include directories.
    #[serde(default)]
    include_paths: String,
    /// `;`-separated compiler options. Items may be backtick or
    /// `$(shell ...)` expressions the driver expands.
    #[serde(default)]
    compile_options: String,
    /// `;`-separated preprocessor defines (without the `-D`).
    #[serde(default)]
    preprocessor: String,
    /// Custom-build projects drive their own compiler invocations; the
    /// driver cannot derive flags for them and skips them entirely.
    #[serde(default)]
    custom_build: bool,
}

impl BuildConfig {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn include_paths(&self) -> Vec<String> {
        split_list(&self.include_paths)
    }

    #[must_use]
    pub fn compile_options(&self) -> Vec<String> {
        split_list(&self.compile_options)
    }

    #[must_use]
    pub fn preprocessor(&self) -> Vec<String> {
        split_list(&self.preprocessor)
    }

    #[must_use]
    pub fn is_custom_build(&self) -> bool {
        self.custom_build
    }
}

/// A project and its build configurations.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    name: String,
    #[serde(default)]
    configurations: Vec<BuildConfig>,
}

impl Project {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self, name: &str) -> Option<&BuildConfig> {
        self.configurations.iter().find(|c| c.name == name)
    }
}

/// The build matrix: which configuration is selected, workspace-wide and
/// per project.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildMatrix {
    #[serde(default)]
    selected_configuration: String,
    /// Per-project overrides, keyed by project name.
    #[serde(default)]
    project_configurations: HashMap<String, String>,
}

impl BuildMatrix {
    #[must_use]
    pub fn selected_configuration(&self) -> &str {
        &self.selected_configuration
    }

    /// The configuration name selected for `project`: the per-project
    /// override when present, the workspace selection otherwise.
    #[must_use]
    pub fn project_selected_config(&self, project: &str) -> &str {
        self.project_configurations
            .get(project)
            .map_or(&self.selected_configuration, String::as_str)
    }
}

/// An open workspace: projects plus the active build matrix.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    matrix: BuildMatrix,
}

impl Workspace {
    #[must_use]
    pub fn find_project(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn matrix(&self) -> &BuildMatrix {
        &self.matrix
    }

    /// Resolve the build configuration currently selected for a project.
    ///
    /// Returns `None` when the project is unknown or has no configuration
    /// matching the matrix selection.
    #[must_use]
    pub fn build_config_for(&self, project_name: &str) -> Option<&BuildConfig> {
        let project = self.find_project(project_name)?;
        let selected = self.matrix.project_selected_config(project_name);
        project.config(selected)
    }
}
