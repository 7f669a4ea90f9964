// Debug tap: out-of-band trace stream from recorder actors
//
// Attach the sender obtained from DebugLog::sender() to a recorder via
// SetDebugTap to collect its control and write traffic. The collector
// stops when every sender clone is dropped.

use crate::signal::DBG_TAP_CAPACITY;
use chrono::{DateTime, Local};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One trace event emitted by a recorder actor (or by user code).
#[derive(Debug, Clone)]
pub struct DebugEvent {
    time: DateTime<Local>,
    text: String,
}

impl DebugEvent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            time: Local::now(),
            text: text.into(),
        }
    }

    pub fn time(&self) -> DateTime<Local> {
        self.time
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Collector for debug events. Owns the receiving end of the tap and
/// writes timestamped lines to the given writer.
pub struct DebugLog {
    tx: mpsc::Sender<DebugEvent>,
    rx: Mutex<Option<mpsc::Receiver<DebugEvent>>>,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    listening: Arc<AtomicBool>,
}

impl DebugLog {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel(DBG_TAP_CAPACITY);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            writer: Mutex::new(Some(Box::new(writer))),
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A sender suitable for `ControlSignal::SetDebugTap` or for user
    /// messages.
    pub fn sender(&self) -> mpsc::Sender<DebugEvent> {
        self.tx.clone()
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Spawn the collector task. A second call is a no-op. The task ends
    /// once every sender (including the one held by this object) is gone.
    pub fn listen(&self) {
        let mut rx_slot = self.rx.lock().unwrap();
        if self.listening.load(Ordering::SeqCst) {
            return;
        }
        let (Some(mut rx), Some(mut writer)) =
            (rx_slot.take(), self.writer.lock().unwrap().take())
        else {
            return;
        };
        self.listening.store(true, Ordering::SeqCst);
        let listening = Arc::clone(&self.listening);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let mut line = format!(
                    "[{}] {}",
                    event.time().format("%H:%M:%S%.9f"),
                    event.text()
                );
                if !line.ends_with('\n') {
                    line.push('\n');
                }
                if writer.write_all(line.as_bytes()).is_err() {
                    break;
                }
            }
            let _ = writer.flush();
            listening.store(false, Ordering::SeqCst);
        });
    }
}
