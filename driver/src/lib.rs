//! Clang-backed code-completion driver.
//!
//! The driver snapshots an editor buffer, maintains a precompiled-header
//! (PCH) cache per source file, and runs a three-stage clang pipeline:
//! preprocess the source to discover the real header set, build a PCH from
//! an umbrella header, then ask clang for completions at the cursor with
//! the PCH loaded. Child processes run asynchronously; their output and
//! termination arrive as events the driver drains from a channel.

pub mod args;
pub mod command;
pub mod editor;
pub mod pch;
pub mod ppfilter;
pub mod process;
pub mod transform;
pub mod types;

mod driver;

pub use args::{ArgsBuilder, FixedIncludePaths, IncludePathLocator};
pub use driver::CompletionDriver;
pub use editor::{Editor, StringEditor};
pub use pch::{PchCache, PchEntry};
pub use process::{ProcessEvent, RunningProcess, ShellSpawner, Spawner};
pub use types::{CompletionContext, DriverEvent, DriverState, SourceKind};
