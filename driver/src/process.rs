//! Child process abstraction.
//!
//! The driver never talks to a process directly: it hands a command line
//! to a [`Spawner`] together with an event sender, and drives its state
//! machine from the [`ProcessEvent`]s that come back — incremental output
//! chunks followed by a single termination signal. Tests substitute a fake
//! spawner through the trait.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::debug;

/// What a running child process reports back to the driver.
#[derive(Debug)]
pub enum ProcessEvent {
    /// A chunk of combined stdout/stderr output.
    Output(String),
    /// The process is done. Sent exactly once, after the last output
    /// chunk. The exit status is deliberately not carried: the pipeline
    /// advances on termination regardless, and a failed compile surfaces
    /// as empty or unparsable completion output.
    Terminated,
}

/// Handle to an outstanding child process. Dropping it without `kill` is
/// safe; the underlying child is killed on drop as well.
pub trait RunningProcess: Send {
    fn kill(&mut self);
}

/// Launches shell command lines. The one seam between the driver and the
/// operating system.
pub trait Spawner: Send + Sync {
    fn spawn(
        &self,
        command_line: &str,
        working_dir: &Path,
        events: mpsc::Sender<ProcessEvent>,
    ) -> Result<Box<dyn RunningProcess>>;
}

/// Real spawner: runs the command line through the platform shell with
/// piped stdout/stderr, forwarding output chunks as they arrive.
#[derive(Debug, Default)]
pub struct ShellSpawner;

struct ShellChild {
    child: Child,
}

impl RunningProcess for ShellChild {
    fn kill(&mut self) {
        let _ = self.child.start_kill();
    }
}

async fn pump_stream<R: AsyncRead + Unpin>(mut stream: R, events: mpsc::Sender<ProcessEvent>) {
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                if events.send(ProcessEvent::Output(chunk)).await.is_err() {
                    // Receiver gone: the request was aborted or superseded.
                    break;
                }
            }
        }
    }
}

impl Spawner for ShellSpawner {
    fn spawn(
        &self,
        command_line: &str,
        working_dir: &Path,
        events: mpsc::Sender<ProcessEvent>,
    ) -> Result<Box<dyn RunningProcess>> {
        #[cfg(unix)]
        let mut cmd = Command::new("sh");
        #[cfg(unix)]
        cmd.arg("-c");
        #[cfg(windows)]
        let mut cmd = Command::new("cmd");
        #[cfg(windows)]
        cmd.arg("/C");

        cmd.arg(command_line)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning: {command_line}"))?;

        let stdout = child.stdout.take().context("no stdout from child")?;
        let stderr = child.stderr.take().context("no stderr from child")?;

        tokio::spawn(async move {
            let out = pump_stream(stdout, events.clone());
            let err = pump_stream(stderr, events.clone());
            tokio::join!(out, err);
            if events.send(ProcessEvent::Terminated).await.is_err() {
                debug!("Process terminated after its request was dropped");
            }
        });

        Ok(Box::new(ShellChild { child }))
    }
}
