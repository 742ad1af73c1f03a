//! The completion driver facade and its stage state machine.
//!
//! One driver instance owns at most one outstanding clang process. A
//! request either reuses a fresh PCH and jumps straight to the completion
//! stage, or walks the full pipeline: preprocess the source, fold the
//! discovered headers into an umbrella header, compile that to a PCH,
//! then complete. Stage transitions are driven entirely by the
//! [`ProcessEvent`]s of the outstanding process, drained via
//! [`CompletionDriver::poll_events`].

use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use compass_config::{DriverSettings, Workspace};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::args::{ArgsBuilder, IncludePathLocator};
use crate::command::{CompileCommand, Location};
use crate::editor::{Activation, Editor};
use crate::pch::PchCache;
use crate::ppfilter;
use crate::process::{ProcessEvent, RunningProcess, Spawner};
use crate::transform;
use crate::types::{CompletionContext, DriverEvent, DriverState, SourceKind};

/// Capacity of the per-process event channel. Output chunks accumulate
/// here between polls; preprocessor output goes to a file, so the stream
/// volume stays small.
const PROCESS_CHANNEL_CAPACITY: usize = 256;

pub struct CompletionDriver {
    settings: DriverSettings,
    workspace: Option<Workspace>,
    spawner: Arc<dyn Spawner>,
    locator: Arc<dyn IncludePathLocator>,
    events_out: mpsc::Sender<DriverEvent>,

    state: DriverState,
    /// The single outstanding process slot.
    process: Option<Box<dyn RunningProcess>>,
    /// Event channel of the outstanding process. Replaced on every spawn,
    /// so events from a killed process land in a closed channel instead of
    /// advancing a newer pipeline.
    proc_rx: Option<mpsc::Receiver<ProcessEvent>>,
    /// Accumulated output of the current stage.
    output: String,

    activation: Option<Activation>,
    pending_context: Option<CompletionContext>,
    /// Include directives stripped from the buffer when this pipeline
    /// started; consumed by the header filter and the cache entry.
    removed_includes: Vec<String>,
    /// Headers selected for the PCH umbrella, awaiting the cache upsert.
    pch_headers: Vec<PathBuf>,

    cache: PchCache,
    args: ArgsBuilder,
}

impl CompletionDriver {
    /// `events_out` carries one [`DriverEvent::Completed`] per finished
    /// pipeline. The consumer must drain it; when the channel is full the
    /// result of a finished pipeline is dropped with a warning instead of
    /// blocking the driver. Size it for at least one event per pipeline
    /// completed between drains.
    #[must_use]
    pub fn new(
        settings: DriverSettings,
        workspace: Option<Workspace>,
        spawner: Arc<dyn Spawner>,
        locator: Arc<dyn IncludePathLocator>,
        events_out: mpsc::Sender<DriverEvent>,
    ) -> Self {
        let cache = PchCache::new(settings.cache_dir());
        Self {
            settings,
            workspace,
            spawner,
            locator,
            events_out,
            state: DriverState::Idle,
            process: None,
            proc_rx: None,
            output: String::new(),
            activation: None,
            pending_context: None,
            removed_includes: Vec::new(),
            pch_headers: Vec::new(),
            cache,
            args: ArgsBuilder::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state
    }

    #[must_use]
    pub fn cache(&self) -> &PchCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut PchCache {
        &mut self.cache
    }

    /// Replace the workspace model (e.g. after the host reloads it).
    pub fn set_workspace(&mut self, workspace: Option<Workspace>) {
        self.workspace = workspace;
    }

    /// Drop the long-lived argument caches (standard include paths and
    /// backtick expansions), e.g. after a toolchain change.
    pub fn clear_arg_caches(&mut self) {
        self.args.clear();
    }

    /// Start a completion pipeline for the editor's current cursor.
    ///
    /// Precondition failures (driver disabled, busy, no workspace, empty
    /// buffer, no usable build configuration) drop the request with a log
    /// line; nothing is queued and nothing is reported to the caller.
    pub fn request_completion(&mut self, editor: &dyn Editor) {
        debug!("Completion request started");
        if !self.settings.enabled() {
            debug!("Completion driver is disabled");
            return;
        }
        if self.state != DriverState::Idle || self.process.is_some() {
            debug!(state = self.state.label(), "Another completion is in progress, dropping request");
            return;
        }
        if self.workspace.is_none() {
            debug!("No workspace open");
            return;
        }

        // A new top-level request always starts from freshly computed
        // compiler args.
        self.args.clear_request();

        let activation = Activation::capture(editor);
        if activation.buffer.is_empty() {
            debug!("Empty buffer, nothing to complete");
            return;
        }

        let (_, removed) = transform::strip_includes(&activation.buffer);
        let fresh = !self.cache.needs_regeneration(&activation.path, &removed);

        if fresh {
            debug!(source = %activation.path.display(), "Valid PCH cache entry found");
            self.removed_includes.clear();
            self.activation = Some(activation);
            self.launch(DriverState::CompletingCode);
        } else {
            debug!(source = %activation.path.display(), "PCH missing or stale, running full pipeline");
            self.removed_includes = removed;
            self.activation = Some(activation);
            self.launch(DriverState::PreProcessing);
        }
    }

    /// Drain pending process events, up to `budget`. Non-blocking; stage
    /// transitions run synchronously on the calling thread.
    pub fn poll_events(&mut self, budget: usize) -> usize {
        let mut count = 0;
        while count < budget {
            let event = match self.proc_rx.as_mut() {
                Some(rx) => match rx.try_recv() {
                    Ok(event) => event,
                    Err(_) => break,
                },
                None => break,
            };
            self.handle_event(event);
            count += 1;
        }
        count
    }

    /// Kill any outstanding process and return to idle. Safe in any state.
    pub fn abort(&mut self) {
        if let Some(mut process) = self.process.take() {
            debug!(state = self.state.label(), "Aborting completion pipeline");
            process.kill();
        }
        self.reset();
    }

    fn handle_event(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::Output(chunk) => self.output.push_str(&chunk),
            ProcessEvent::Terminated => match self.state {
                DriverState::Idle => debug!("Stray process event while idle"),
                DriverState::PreProcessing => self.on_preprocess_done(),
                DriverState::CreatingPch => self.on_pch_done(),
                DriverState::CompletingCode => self.on_completion_done(),
            },
        }
    }

    fn launch(&mut self, stage: DriverState) {
        match self.try_launch(stage) {
            Ok(true) => {}
            Ok(false) => self.reset(),
            Err(e) => {
                error!(stage = stage.label(), "Completion stage failed to start: {e:#}");
                self.reset();
            }
        }
    }

    /// Build and spawn the command for `stage`. `Ok(false)` is a
    /// precondition failure already logged at debug level; `Err` is a
    /// resource failure the caller reports.
    fn try_launch(&mut self, stage: DriverState) -> Result<bool> {
        let Some(activation) = self.activation.clone() else {
            return Ok(false);
        };
        let Some(workspace) = self.workspace.clone() else {
            return Ok(false);
        };
        let Some(clang) = self.resolve_clang() else {
            return Ok(false);
        };

        let locator = Arc::clone(&self.locator);
        let Some(args) = self
            .args
            .build(&workspace, &activation.project, locator.as_ref(), &clang)
        else {
            debug!(project = %activation.project, "No usable build configuration, skipping request");
            return Ok(false);
        };

        let command = match stage {
            DriverState::PreProcessing => {
                fs::create_dir_all(self.cache.cache_dir()).with_context(|| {
                    format!("creating cache dir {}", self.cache.cache_dir().display())
                })?;
                CompileCommand::PreProcess {
                    clang,
                    args,
                    source_file: activation.path.clone(),
                    pp_output_file: self.cache.pp_output_file(&activation.path),
                }
            }
            DriverState::CreatingPch => CompileCommand::CreatePch {
                clang,
                args,
                umbrella_header: self.cache.umbrella_header(&activation.path),
                pch_file: self.cache.pch_file(&activation.path),
            },
            DriverState::CompletingCode => self.completion_command(&activation, clang, args)?,
            DriverState::Idle => return Ok(false),
        };

        let cwd = activation
            .path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        self.spawn_stage(&command, &cwd)?;
        Ok(true)
    }

    /// Write the completion input file and build the completion command.
    ///
    /// Translation units get the cursor-truncated buffer; headers get a
    /// synthetic `#include <name>` wrapper and the completion location
    /// points back at the original file.
    fn completion_command(
        &mut self,
        activation: &Activation,
        clang: PathBuf,
        args: String,
    ) -> Result<CompileCommand> {
        let (truncated, filter_word) = transform::extract_filter_word(&activation.buffer);
        let filter_len = filter_word.chars().count();

        let line = activation.line + 1;
        let raw_column = activation.cursor - activation.line_start + 1;
        let column = raw_column.saturating_sub(filter_len).max(1);

        let stem = activation
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_name = format!("{stem}_clang_tmp.cpp");
        let tmp_path = activation
            .path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&tmp_name);

        let location_file = if SourceKind::of(&activation.path).is_source() {
            fs::write(&tmp_path, &truncated)
                .with_context(|| format!("writing completion input {}", tmp_path.display()))?;
            tmp_name.clone()
        } else {
            let name = activation
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            fs::write(&tmp_path, format!("#include <{name}>\n"))
                .with_context(|| format!("writing completion input {}", tmp_path.display()))?;
            activation.path.display().to_string()
        };

        debug!(line, column, filter = %filter_word, "Completion point");
        self.pending_context = Some(CompletionContext::new(
            activation.path.clone(),
            line,
            column,
            filter_word,
        ));

        Ok(CompileCommand::CodeComplete {
            clang,
            args,
            pch_file: self.cache.pch_file(&activation.path),
            location: Location {
                file: location_file,
                line,
                column,
            },
            source_file: tmp_name,
        })
    }

    fn spawn_stage(&mut self, command: &CompileCommand, cwd: &Path) -> Result<()> {
        let line = command.render();
        let stage = command.stage();
        debug!(stage = stage.label(), command = %line, "Launching clang");

        let (tx, rx) = mpsc::channel(PROCESS_CHANNEL_CAPACITY);
        let handle = self
            .spawner
            .spawn(&line, cwd, tx)
            .context("failed to start clang process")?;

        self.process = Some(handle);
        self.proc_rx = Some(rx);
        self.output.clear();
        self.state = stage;
        Ok(())
    }

    fn on_preprocess_done(&mut self) {
        debug!("Preprocess stage finished");
        let Some(activation) = self.activation.clone() else {
            self.reset();
            return;
        };
        self.finish_process();

        let pp_file = self.cache.pp_output_file(&activation.path);
        let raw = fs::read_to_string(&pp_file).unwrap_or_default();
        let _ = fs::remove_file(&pp_file);

        let discovered = ppfilter::collect_headers(&raw, &activation.path);
        let selected = ppfilter::select_for_pch(&discovered, &self.removed_includes);
        debug!(
            discovered = discovered.len(),
            selected = selected.len(),
            "Filtered headers from preprocessor output"
        );

        let umbrella = self.cache.umbrella_header(&activation.path);
        if let Err(e) = fs::write(&umbrella, ppfilter::umbrella_content(&selected)) {
            error!(path = %umbrella.display(), "Failed to write umbrella header: {e}");
            self.reset();
            return;
        }

        self.pch_headers = selected;
        self.launch(DriverState::CreatingPch);
    }

    fn on_pch_done(&mut self) {
        debug!("PCH build stage finished");
        let Some(activation) = self.activation.clone() else {
            self.reset();
            return;
        };
        self.finish_process();

        let pch_file = self.cache.pch_file(&activation.path);
        debug!(source = %activation.path.display(), pch = %pch_file.display(), "Caching PCH");
        let removed = mem::take(&mut self.removed_includes);
        let headers = mem::take(&mut self.pch_headers);
        self.cache
            .upsert(activation.path.clone(), pch_file, removed, headers);

        let _ = fs::remove_file(self.cache.umbrella_header(&activation.path));
        self.launch(DriverState::CompletingCode);
    }

    fn on_completion_done(&mut self) {
        debug!("Code-completion stage finished");
        let raw = mem::take(&mut self.output);
        let context = self.pending_context.take();
        self.reset();

        if let Some(context) = context
            && let Err(e) = self
                .events_out
                .try_send(DriverEvent::Completed { raw, context })
        {
            warn!("Dropping completion result: {e}");
        }
    }

    fn finish_process(&mut self) {
        self.process = None;
        self.proc_rx = None;
        self.output.clear();
    }

    fn reset(&mut self) {
        self.finish_process();
        self.activation = None;
        self.pending_context = None;
        self.removed_includes.clear();
        self.pch_headers.clear();
        self.state = DriverState::Idle;
    }

    fn resolve_clang(&self) -> Option<PathBuf> {
        if let Some(binary) = self.settings.clang_binary() {
            return Some(binary.to_path_buf());
        }
        match which::which("clang") {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Could not locate a clang binary: {e}");
                None
            }
        }
    }
}
