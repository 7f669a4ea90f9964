// SPDX-License-Identifier: Apache-2.0 OR MIT
// In-memory recorder: captures delivered messages for tests and embedding

use super::{ActorHost, Recorder, Sink};
use crate::errors::LogError;
use crate::message::LogMessage;
use crate::signal::RecorderHandle;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MemoryState {
    records: Vec<LogMessage>,
    open: bool,
    opens: u32,
    closes: u32,
    fail_open: bool,
}

struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl Sink for MemorySink {
    fn open(&mut self) -> Result<(), LogError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(LogError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory sink refused to open",
            )));
        }
        state.open = true;
        state.opens += 1;
        Ok(())
    }

    fn write(&mut self, msg: &LogMessage) -> Result<(), LogError> {
        self.state.lock().unwrap().records.push(msg.clone());
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.open = false;
        state.closes += 1;
    }
}

/// Recorder whose sink is a message buffer. Exposes what a real sink
/// would observe: the delivered messages and the open/close transitions.
pub struct MemoryRecorder {
    host: ActorHost<MemorySink>,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// A recorder whose sink rejects every open. Initialisation against
    /// it always fails; useful for exercising partial-init paths.
    pub fn failing() -> Self {
        Self::build(true)
    }

    fn build(fail_open: bool) -> Self {
        let state = Arc::new(Mutex::new(MemoryState {
            fail_open,
            ..MemoryState::default()
        }));
        let sink = MemorySink {
            state: Arc::clone(&state),
        };
        Self {
            host: ActorHost::new(sink),
            state,
        }
    }

    /// Snapshot of the messages delivered so far.
    pub fn records(&self) -> Vec<LogMessage> {
        self.state.lock().unwrap().records.clone()
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        self.state.lock().unwrap().records.clear();
    }

    /// True between the 0 -> 1 open and the 1 -> 0 close.
    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    pub fn open_count(&self) -> u32 {
        self.state.lock().unwrap().opens
    }

    pub fn close_count(&self) -> u32 {
        self.state.lock().unwrap().closes
    }
}

impl Default for MemoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for MemoryRecorder {
    fn listen(&self) {
        self.host.listen();
    }

    fn is_listening(&self) -> bool {
        self.host.is_listening()
    }

    fn interface(&self) -> RecorderHandle {
        self.host.handle()
    }
}
