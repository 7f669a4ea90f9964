// SPDX-License-Identifier: Apache-2.0 OR MIT
// Control protocol between the logger dispatcher and recorder actors

use crate::debug::DebugEvent;
use crate::errors::{internal_critical, LogError};
use crate::message::LogMessage;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Control channel depth. Control traffic is sparse.
pub const CTL_CAPACITY: usize = 32;
/// Message channel depth. Producers block when the recorder falls behind;
/// this is the only back-pressure in the engine.
pub const MSG_CAPACITY: usize = 64;
/// Error tap depth.
pub const ERR_TAP_CAPACITY: usize = 256;
/// Debug tap depth.
pub const DBG_TAP_CAPACITY: usize = 64;

/// A control signal accepted by every recorder actor. Variants are the
/// wire format: a tag plus an optional payload channel.
#[derive(Debug)]
pub enum ControlSignal {
    /// Open the sink if this is the first reference, bump the reference
    /// counter and report the outcome on the reply channel.
    Init(oneshot::Sender<Result<(), LogError>>),
    /// Drop one reference; physically close the sink when the last
    /// reference goes away.
    Close,
    /// Terminate the actor loop. Further channel sends will fail;
    /// callers must stop writing first.
    Stop,
    /// Install a channel on which write errors are published.
    SetErrorTap(mpsc::Sender<LogError>),
    /// Remove the error tap. The channel itself is never closed by the
    /// actor.
    DropErrorTap,
    /// Install a channel receiving actor trace events.
    SetDebugTap(mpsc::Sender<DebugEvent>),
    /// Remove the debug tap.
    DropDebugTap,
}

/// The inbound side of a recorder: a control channel and a message
/// channel, plus an identity used to match the handle back to its
/// recorder object during health-checked initialisation.
///
/// Handles are cheap to clone; all clones address the same actor.
#[derive(Debug, Clone)]
pub struct RecorderHandle {
    ctl: mpsc::Sender<ControlSignal>,
    msg: mpsc::Sender<LogMessage>,
    uid: Uuid,
}

impl RecorderHandle {
    pub(crate) fn new(ctl: mpsc::Sender<ControlSignal>, msg: mpsc::Sender<LogMessage>) -> Self {
        Self {
            ctl,
            msg,
            uid: Uuid::new_v4(),
        }
    }

    /// Identity shared by every clone of this handle.
    pub fn uid(&self) -> Uuid {
        self.uid
    }

    /// Send a raw control signal. Fails with `NotListening` when the
    /// actor is gone.
    pub async fn control(&self, signal: ControlSignal) -> Result<(), LogError> {
        self.ctl
            .send(signal)
            .await
            .map_err(|_| LogError::NotListening)
    }

    /// Deliver a message to the recorder. Blocks while the message
    /// channel is full.
    pub async fn send(&self, msg: LogMessage) -> Result<(), LogError> {
        self.msg.send(msg).await.map_err(|_| LogError::NotListening)
    }

    /// Synchronous round-trip: ask the actor to initialise its sink and
    /// wait for the outcome.
    pub async fn init(&self) -> Result<(), LogError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control(ControlSignal::Init(reply_tx)).await?;
        match reply_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(internal_critical!("init reply channel dropped without an answer")),
        }
    }

    /// Release one sink reference.
    pub async fn close(&self) -> Result<(), LogError> {
        self.control(ControlSignal::Close).await
    }

    /// Terminate the recorder actor.
    pub async fn stop(&self) -> Result<(), LogError> {
        self.control(ControlSignal::Stop).await
    }

    /// Install a fresh error tap and return its receiving end. The
    /// caller must drain it or drop the tap again.
    pub async fn error_tap(&self) -> Result<mpsc::Receiver<LogError>, LogError> {
        let (tx, rx) = mpsc::channel(ERR_TAP_CAPACITY);
        self.control(ControlSignal::SetErrorTap(tx)).await?;
        Ok(rx)
    }

    /// Detach the error tap; write errors are discarded afterwards.
    pub async fn drop_error_tap(&self) -> Result<(), LogError> {
        self.control(ControlSignal::DropErrorTap).await
    }

    /// Attach a debug tap carrying actor trace events.
    pub async fn set_debug_tap(&self, tap: mpsc::Sender<DebugEvent>) -> Result<(), LogError> {
        self.control(ControlSignal::SetDebugTap(tap)).await
    }

    /// Detach the debug tap.
    pub async fn drop_debug_tap(&self) -> Result<(), LogError> {
        self.control(ControlSignal::DropDebugTap).await
    }
}

impl PartialEq for RecorderHandle {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for RecorderHandle {}
