//! Scripted fakes for the pipeline ports.
//!
//! Available to this crate's tests and, through the `test-utils` feature, to
//! downstream crates. Nothing here touches the network, audio hardware, or a
//! real player binary.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::{PlaybackError, TransportError};
use crate::events::PipelineEvent;
use crate::ports::{
    AudioPlayer, CloseInfo, ConnectTarget, Frame, PlaybackHandle, ProgressEmitter,
    SpeechConnection, SpeechConnector,
};

// ── Frame helpers ──────────────────────────────────────────────────

/// Inbound message carrying base64 audio.
pub fn audio_frame(base64_audio: &str) -> Frame {
    Frame::Text(format!(r#"{{"audio":"{base64_audio}","isFinal":null}}"#))
}

/// Inbound message carrying base64 audio and the final flag.
pub fn final_audio_frame(base64_audio: &str) -> Frame {
    Frame::Text(format!(r#"{{"audio":"{base64_audio}","isFinal":true}}"#))
}

/// Inbound final message without audio.
pub fn final_frame() -> Frame {
    Frame::Text(r#"{"isFinal":true}"#.to_string())
}

/// Inbound message without audio (protocol acknowledgment).
pub fn ack_frame() -> Frame {
    Frame::Text(r#"{"alignment":null,"isFinal":false}"#.to_string())
}

/// Normal close frame.
pub fn normal_close() -> Frame {
    Frame::Close(Some(CloseInfo::new(1000, "")))
}

// ── Scripted connector ─────────────────────────────────────────────

/// One scripted inbound step.
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver a frame.
    Frame(Frame),
    /// Deliver a transport error.
    Fail(TransportError),
    /// Sleep, then continue with the next step.
    Delay(Duration),
    /// Never deliver anything again.
    Hang,
}

impl From<Frame> for Step {
    fn from(frame: Frame) -> Self {
        Self::Frame(frame)
    }
}

/// How one `connect` call behaves.
#[derive(Debug, Clone)]
pub enum ConnectScript {
    Accept(Vec<Step>),
    Refuse(TransportError),
    /// The handshake never completes.
    Hang,
}

/// What the fake backend observed.
#[derive(Debug, Default, Clone)]
pub struct ConnectionLog {
    /// Number of `connect` calls.
    pub connects: usize,
    /// Targets passed to `connect`.
    pub targets: Vec<String>,
    /// Credentials passed to `connect`.
    pub api_keys: Vec<String>,
    /// Outbound text messages, in order.
    pub sent: Vec<String>,
    /// Whether `close` was called.
    pub closed_by_client: bool,
    /// Whether the connection object was dropped.
    pub dropped: bool,
}

/// Connector that replays scripted connections, one per `connect` call.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    scripts: Arc<Mutex<VecDeque<ConnectScript>>>,
    log: Arc<Mutex<ConnectionLog>>,
    close_delay: Option<Duration>,
}

impl ScriptedConnector {
    pub fn new(scripts: impl IntoIterator<Item = ConnectScript>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into_iter().collect())),
            log: Arc::default(),
            close_delay: None,
        }
    }

    /// Make every client-side `close` take `delay` before it completes.
    #[must_use]
    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = Some(delay);
        self
    }

    /// A single accepted connection delivering `steps`.
    pub fn accepting(steps: impl IntoIterator<Item = Step>) -> Self {
        Self::new([ConnectScript::Accept(steps.into_iter().collect())])
    }

    /// A single refused handshake.
    pub fn refusing(err: TransportError) -> Self {
        Self::new([ConnectScript::Refuse(err)])
    }

    /// Snapshot of what was observed so far.
    pub fn log(&self) -> ConnectionLog {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechConnector for ScriptedConnector {
    async fn connect(
        &self,
        target: &ConnectTarget,
    ) -> Result<Box<dyn SpeechConnection>, TransportError> {
        {
            let mut log = self.log.lock().unwrap();
            log.connects += 1;
            log.targets.push(target.url.clone());
            log.api_keys.push(target.api_key.clone());
        }
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(ConnectScript::Accept(steps)) => Ok(Box::new(ScriptedConnection {
                steps: steps.into(),
                log: Arc::clone(&self.log),
                close_delay: self.close_delay,
            })),
            Some(ConnectScript::Refuse(err)) => Err(err),
            Some(ConnectScript::Hang) => std::future::pending().await,
            None => Err(TransportError::Other("no scripted connection left".to_string())),
        }
    }
}

struct ScriptedConnection {
    steps: VecDeque<Step>,
    log: Arc<Mutex<ConnectionLog>>,
    close_delay: Option<Duration>,
}

#[async_trait]
impl SpeechConnection for ScriptedConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.log.lock().unwrap().sent.push(text);
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            match self.steps.pop_front()? {
                Step::Frame(frame) => return Some(Ok(frame)),
                Step::Fail(err) => return Some(Err(err)),
                Step::Delay(duration) => tokio::time::sleep(duration).await,
                Step::Hang => {
                    self.steps.push_front(Step::Hang);
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        self.log.lock().unwrap().closed_by_client = true;
        Ok(())
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.log.lock().unwrap().dropped = true;
    }
}

// ── Recording player ───────────────────────────────────────────────

/// How the fake player behaves once started.
#[derive(Debug, Clone)]
pub enum PlayerBehavior {
    /// Exit successfully as soon as waited on.
    Succeed,
    /// Exit successfully once the handle has been waited on for this long.
    SucceedAfter(Duration),
    /// Exit with a nonzero status.
    Fail { code: i32, stderr: String },
    /// Fail to start at all.
    SpawnError,
    /// Exit successfully once the notify is triggered.
    UntilNotified(Arc<Notify>),
    /// Run until stopped.
    Forever,
}

/// What the fake player observed.
#[derive(Debug, Default, Clone)]
pub struct PlayerLog {
    /// Paths passed to `start`, in order.
    pub starts: Vec<PathBuf>,
    /// File size at each `start` call.
    pub bytes_at_start: Vec<u64>,
    /// Number of `stop` calls on running handles.
    pub stops: usize,
    /// Number of completed waits.
    pub exits: usize,
}

/// Player fake that records invocations instead of playing audio.
#[derive(Debug, Clone)]
pub struct RecordingPlayer {
    behavior: PlayerBehavior,
    log: Arc<Mutex<PlayerLog>>,
}

impl RecordingPlayer {
    pub fn new(behavior: PlayerBehavior) -> Self {
        Self {
            behavior,
            log: Arc::default(),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(PlayerBehavior::Succeed)
    }

    pub fn log(&self) -> PlayerLog {
        self.log.lock().unwrap().clone()
    }
}

impl AudioPlayer for RecordingPlayer {
    fn start(&self, path: &Path) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        {
            let mut log = self.log.lock().unwrap();
            log.starts.push(path.to_path_buf());
            log.bytes_at_start.push(size);
        }
        if matches!(self.behavior, PlayerBehavior::SpawnError) {
            return Err(PlaybackError::Spawn {
                program: "fake-player".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "not installed"),
            });
        }
        Ok(Box::new(RecordingHandle {
            behavior: self.behavior.clone(),
            finished: false,
            log: Arc::clone(&self.log),
        }))
    }
}

struct RecordingHandle {
    behavior: PlayerBehavior,
    finished: bool,
    log: Arc<Mutex<PlayerLog>>,
}

#[async_trait]
impl PlaybackHandle for RecordingHandle {
    async fn wait(&mut self) -> Result<(), PlaybackError> {
        if self.finished {
            return Ok(());
        }
        let result = match &self.behavior {
            PlayerBehavior::Succeed | PlayerBehavior::SpawnError => Ok(()),
            PlayerBehavior::Fail { code, stderr } => Err(PlaybackError::Exited {
                code: Some(*code),
                stderr: stderr.clone(),
            }),
            PlayerBehavior::SucceedAfter(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            PlayerBehavior::UntilNotified(notify) => {
                notify.notified().await;
                Ok(())
            }
            PlayerBehavior::Forever => std::future::pending().await,
        };
        self.finished = true;
        self.log.lock().unwrap().exits += 1;
        result
    }

    async fn stop(&mut self) {
        if !self.finished {
            self.finished = true;
            self.log.lock().unwrap().stops += 1;
        }
    }
}

// ── Recording emitter ──────────────────────────────────────────────

/// Emitter that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn terminal_count(&self) -> usize {
        self.events().iter().filter(|e| e.is_terminal()).count()
    }
}

impl ProgressEmitter for RecordingEmitter {
    fn emit(&self, event: PipelineEvent) {
        self.events.lock().unwrap().push(event);
    }
}
