//! Workspace model and driver settings for Compass.
//!
//! The completion driver consumes the build system's view of the world
//! through this crate: which projects exist, which build configuration is
//! selected for each, and what include paths / compile options /
//! preprocessor defines that configuration carries. Both the workspace
//! model and the driver settings deserialize from TOML.

pub mod loader;
pub mod settings;
pub mod workspace;

pub use loader::{ConfigError, load_settings, load_workspace};
pub use settings::DriverSettings;
pub use workspace::{BuildConfig, BuildMatrix, Project, Workspace};
