use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::timer::TimerSpec;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SelectFace(String),
    ClearOverride,
    SetPower(bool),
    Reload,
    CreateTimer(TimerSpec),
    StartTimer,
    PauseTimer,
    CancelTimer,
    ResetTimer,
    ListFaces,
    RefreshWeather,
    Status,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Done,
    FaceSelected { name: String, found: bool },
    FaceNames { names: Vec<String> },
    Status(StatusSnapshot),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub face: String,
    pub override_active: bool,
    pub power_on: bool,
    pub face_count: usize,
    pub timer: Option<TimerStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerStatus {
    pub mode: &'static str,
    pub display: String,
    pub started: bool,
    pub paused: bool,
    pub in_hold_period: bool,
    pub ended: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("no timer is active")]
    NoTimer,
    #[error("timer has already ended; reset or create a new one")]
    TimerEnded,
    #[error("timer has not been started")]
    TimerNotStarted,
    #[error("invalid timer duration: {0}")]
    InvalidDuration(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("configuration reload failed: {0}")]
    ReloadFailed(String),
    #[error("timer has completed; wait for it to end or reset it")]
    TimerCompleted,
    #[error("clock runtime is not running")]
    Disconnected,
    #[error("clock runtime did not answer in time; the command may still be applied")]
    Timeout,
    #[error("no route for {0}")]
    UnknownRoute(String),
}

pub type CommandResult = Result<Reply, CommandError>;

/// A queued command plus the slot its answer goes back through.
pub struct Envelope {
    pub command: Command,
    reply: SyncSender<CommandResult>,
}

impl Envelope {
    pub fn respond(self, result: CommandResult) {
        // The sender may have timed out and gone away.
        let _ = self.reply.send(result);
    }
}

/// Sending side, cloned into every control surface.
#[derive(Clone)]
pub struct ControlHandle {
    commands: Sender<Envelope>,
}

impl ControlHandle {
    /// Enqueues `command` and waits for the tick loop to answer it.
    pub fn send(&self, command: Command) -> CommandResult {
        self.send_with_timeout(command, REPLY_TIMEOUT)
    }

    /// A `Timeout` leaves the command queued; the tick loop still applies it.
    fn send_with_timeout(&self, command: Command, timeout: Duration) -> CommandResult {
        let (reply, answer) = mpsc::sync_channel(1);
        self.commands
            .send(Envelope { command, reply })
            .map_err(|_| CommandError::Disconnected)?;
        match answer.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CommandError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(CommandError::Disconnected),
        }
    }
}

/// Receiving side, drained once per tick.
pub struct ControlInbox {
    commands: Receiver<Envelope>,
}

impl ControlInbox {
    pub fn drain(&self) -> Vec<Envelope> {
        let mut pending = Vec::new();
        loop {
            match self.commands.try_recv() {
                Ok(envelope) => pending.push(envelope),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return pending,
            }
        }
    }
}

pub fn control_channel() -> (ControlHandle, ControlInbox) {
    let (commands, inbox) = mpsc::channel();
    (
        ControlHandle { commands },
        ControlInbox { commands: inbox },
    )
}
