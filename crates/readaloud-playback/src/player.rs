//! External player process.
//!
//! The player is any program that plays the file named on its command line
//! (`ffplay`, `afplay`, `mpv`, ...). Its stderr is captured so a failed exit
//! can say why.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use readaloud_core::{AudioPlayer, PlaybackError, PlaybackHandle, PlayerCommand};

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Grace period between SIGTERM and SIGKILL when stopping a player.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(500);

/// How long to wait for stderr to reach EOF after the player exited.
const STDERR_DRAIN: Duration = Duration::from_millis(250);

/// Starts the configured player program.
#[derive(Debug, Clone)]
pub struct ProcessPlayer {
    command: PlayerCommand,
    stop_grace: Duration,
}

impl ProcessPlayer {
    pub const fn new(command: PlayerCommand) -> Self {
        Self {
            command,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    #[must_use]
    pub const fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }
}

impl AudioPlayer for ProcessPlayer {
    fn start(&self, path: &Path) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(self.command.args_for(path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| PlaybackError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;

        info!(
            program = %self.command.program,
            pid = ?child.id(),
            path = %path.display(),
            "Player started"
        );

        let stderr_task = child.stderr.take().map(spawn_stderr_tail);

        Ok(Box::new(ProcessPlayback {
            program: self.command.program.clone(),
            child,
            exit: None,
            stderr_task,
            reported: false,
            stop_grace: self.stop_grace,
        }))
    }
}

/// Keep the last non-empty stderr line.
fn spawn_stderr_tail(stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut last = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if !line.is_empty() {
                debug!(line, "player stderr");
                last = line.to_string();
            }
        }
        last
    })
}

/// One running player process.
struct ProcessPlayback {
    program: String,
    child: Child,
    exit: Option<ExitStatus>,
    stderr_task: Option<JoinHandle<String>>,
    reported: bool,
    stop_grace: Duration,
}

impl ProcessPlayback {
    async fn stderr_tail(&mut self) -> String {
        let Some(task) = self.stderr_task.as_mut() else {
            return String::new();
        };
        let tail = match timeout(STDERR_DRAIN, &mut *task).await {
            Ok(Ok(tail)) => tail,
            Ok(Err(e)) => {
                debug!(error = %e, "stderr reader task failed");
                String::new()
            }
            Err(_) => {
                task.abort();
                String::new()
            }
        };
        self.stderr_task = None;
        tail
    }
}

#[async_trait]
impl PlaybackHandle for ProcessPlayback {
    async fn wait(&mut self) -> Result<(), PlaybackError> {
        if self.reported {
            return Ok(());
        }

        let status = match self.exit {
            Some(status) => status,
            None => {
                let status = self.child.wait().await?;
                self.exit = Some(status);
                status
            }
        };

        let stderr = self.stderr_tail().await;
        self.reported = true;

        if status.success() {
            info!(program = %self.program, "Player finished");
            Ok(())
        } else {
            warn!(program = %self.program, status = %status, stderr = %stderr, "Player failed");
            Err(PlaybackError::Exited {
                code: status.code(),
                stderr,
            })
        }
    }

    async fn stop(&mut self) {
        self.reported = true;
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        if self.exit.is_some() {
            return;
        }
        match shutdown_child(&mut self.child, self.stop_grace).await {
            Ok(status) => {
                debug!(program = %self.program, status = %status, "Player stopped");
                self.exit = Some(status);
            }
            Err(e) => warn!(program = %self.program, error = %e, "Failed to stop player"),
        }
    }
}

/// Terminate a child with SIGTERM, escalating to SIGKILL after `grace`,
/// and reap it.
///
/// Non-Unix platforms have no SIGTERM and kill immediately.
pub async fn shutdown_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        shutdown_unix(child, grace).await
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        child.kill().await?;
        child.wait().await
    }
}

#[cfg(unix)]
async fn shutdown_unix(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    // Already reaped
    let Some(pid) = child.id() else {
        return child.wait().await;
    };
    let pid = i32::try_from(pid).map_err(io::Error::other)?;

    if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await;
        }
        return Err(io::Error::other(e));
    }

    if let Ok(result) = timeout(grace, child.wait()).await {
        return result;
    }

    child.kill().await?;
    child.wait().await
}
