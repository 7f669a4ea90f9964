// SPDX-License-Identifier: Apache-2.0 OR MIT
// Recorder actors: one long-lived consumer task per sink

mod actor;
mod memory;
mod stream;
mod syslog;

pub use actor::RecorderActor;
pub use memory::MemoryRecorder;
pub use stream::{default_stream_format, StreamRecorder};
pub use syslog::{facility, priority, SyslogRecorder};

use crate::errors::LogError;
use crate::message::LogMessage;
use crate::signal::{RecorderHandle, CTL_CAPACITY, MSG_CAPACITY};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Formatter hook turning a message into the final sink output.
pub type FormatFunc = Arc<dyn Fn(&LogMessage) -> String + Send + Sync>;

/// The capability a recorder actor drives: open/write/close on some
/// logging destination. The sink formats its own output (formatter hooks
/// live inside the sink implementations).
pub trait Sink: Send + 'static {
    /// Physically open the destination. Called when the recorder's
    /// reference counter goes 0 -> 1.
    fn open(&mut self) -> Result<(), LogError>;

    /// Write one message. Only called while the sink is open.
    fn write(&mut self, msg: &LogMessage) -> Result<(), LogError>;

    /// Physically close the destination. Called when the reference
    /// counter goes 1 -> 0.
    fn close(&mut self);
}

/// Minimal capability every recorder object exposes to the logger: start
/// its listener, report whether it is consuming its channels, and hand
/// out the channel pair.
pub trait Recorder: Send + Sync {
    /// Spawn the actor loop on the current Tokio runtime. A second call
    /// is a no-op; a call after `Stop` does nothing (the actor is gone).
    fn listen(&self);

    /// True while the actor loop is running.
    fn is_listening(&self) -> bool;

    /// The recorder's inbound channels. Clones address the same actor.
    fn interface(&self) -> RecorderHandle;
}

/// Shared plumbing for the concrete recorders: owns the channel pair and
/// the not-yet-started actor, hands the actor to a task on first listen.
pub(crate) struct ActorHost<S: Sink> {
    handle: RecorderHandle,
    listening: Arc<AtomicBool>,
    actor: Mutex<Option<RecorderActor<S>>>,
}

impl<S: Sink> ActorHost<S> {
    pub(crate) fn new(sink: S) -> Self {
        let (ctl_tx, ctl_rx) = mpsc::channel(CTL_CAPACITY);
        let (msg_tx, msg_rx) = mpsc::channel(MSG_CAPACITY);
        let listening = Arc::new(AtomicBool::new(false));
        let actor = RecorderActor::new(ctl_rx, msg_rx, Arc::clone(&listening), sink);
        Self {
            handle: RecorderHandle::new(ctl_tx, msg_tx),
            listening,
            actor: Mutex::new(Some(actor)),
        }
    }

    pub(crate) fn listen(&self) {
        // The lock serializes concurrent listen() calls; the actor slot
        // is emptied exactly once.
        let mut slot = self.actor.lock().unwrap();
        if self.listening.load(Ordering::SeqCst) {
            return;
        }
        if let Some(actor) = slot.take() {
            self.listening.store(true, Ordering::SeqCst);
            tokio::spawn(actor.run());
        }
    }

    pub(crate) fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub(crate) fn handle(&self) -> RecorderHandle {
        self.handle.clone()
    }
}
