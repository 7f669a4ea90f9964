// SPDX-License-Identifier: Apache-2.0 OR MIT
// The generic recorder consumer loop

use super::Sink;
use crate::debug::DebugEvent;
use crate::errors::LogError;
use crate::message::LogMessage;
use crate::signal::ControlSignal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Long-running consumer owning one sink. Serializes every write and
/// lifecycle operation on that sink; the only way in is the control and
/// message channels.
///
/// The reference counter tracks how many loggers initialised this
/// recorder. The sink is physically opened on the 0 -> 1 transition and
/// closed on 1 -> 0, so several loggers can share one recorder without
/// external coordination.
pub struct RecorderActor<S: Sink> {
    ctl_rx: mpsc::Receiver<ControlSignal>,
    msg_rx: mpsc::Receiver<LogMessage>,
    err_tap: Option<mpsc::Sender<LogError>>,
    dbg_tap: Option<mpsc::Sender<DebugEvent>>,
    listening: Arc<AtomicBool>,
    ref_count: u32,
    sink: S,
}

impl<S: Sink> RecorderActor<S> {
    pub(crate) fn new(
        ctl_rx: mpsc::Receiver<ControlSignal>,
        msg_rx: mpsc::Receiver<LogMessage>,
        listening: Arc<AtomicBool>,
        sink: S,
    ) -> Self {
        Self {
            ctl_rx,
            msg_rx,
            err_tap: None,
            dbg_tap: None,
            listening,
            ref_count: 0,
            sink,
        }
    }

    /// The actor loop. Picks whichever channel is ready (no priority)
    /// and handles one item at a time; exits on `Stop` or when both
    /// channels are closed.
    pub async fn run(mut self) {
        self.trace("recorder listener started").await;
        loop {
            tokio::select! {
                signal = self.ctl_rx.recv() => {
                    match signal {
                        Some(signal) => {
                            if self.handle_signal(signal).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                msg = self.msg_rx.recv() => {
                    match msg {
                        Some(msg) => self.handle_message(msg).await,
                        None => break,
                    }
                }
            }
        }
        self.listening.store(false, Ordering::SeqCst);
        self.trace("recorder listener stopped").await;
    }

    /// Returns true when the loop must terminate.
    async fn handle_signal(&mut self, signal: ControlSignal) -> bool {
        match signal {
            ControlSignal::Init(reply) => {
                self.trace("received init signal").await;
                let outcome = self.initialise();
                // A dropped reply sender is the caller's problem.
                let _ = reply.send(outcome);
            }
            ControlSignal::Close => {
                self.trace("received close signal").await;
                self.close();
            }
            ControlSignal::Stop => {
                self.trace("received stop signal").await;
                return true;
            }
            ControlSignal::SetErrorTap(tap) => {
                self.trace("error tap attached").await;
                self.err_tap = Some(tap);
            }
            ControlSignal::DropErrorTap => {
                self.trace("error tap detached").await;
                self.err_tap = None;
            }
            ControlSignal::SetDebugTap(tap) => {
                self.dbg_tap = Some(tap);
                self.trace("debug tap attached").await;
            }
            ControlSignal::DropDebugTap => {
                self.dbg_tap = None;
            }
        }
        false
    }

    async fn handle_message(&mut self, msg: LogMessage) {
        self.trace("received message").await;
        if let Err(err) = self.write(&msg) {
            self.trace(&format!("write error: {err}")).await;
            if let Some(tap) = self.err_tap.clone() {
                // Observational only; a stalled tap stalls this actor,
                // never the producers.
                let _ = tap.send(err).await;
            }
        }
    }

    fn initialise(&mut self) -> Result<(), LogError> {
        if self.ref_count == 0 {
            self.sink.open()?;
        }
        self.ref_count += 1;
        Ok(())
    }

    fn close(&mut self) {
        if self.ref_count == 0 {
            return;
        }
        if self.ref_count == 1 {
            self.sink.close();
        }
        self.ref_count -= 1;
    }

    fn write(&mut self, msg: &LogMessage) -> Result<(), LogError> {
        if self.ref_count == 0 {
            return Err(LogError::NotInitialised);
        }
        self.sink.write(msg)
    }

    fn trace(&self, text: &str) -> impl std::future::Future<Output = ()> + Send + 'static {
        let dbg_tap = self.dbg_tap.clone();
        let text = text.to_string();
        async move {
            if let Some(tap) = dbg_tap {
                let _ = tap.send(DebugEvent::new(&text)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::MsgFlags;
    use crate::signal::{RecorderHandle, CTL_CAPACITY, MSG_CAPACITY};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct SinkLog {
        opens: u32,
        closes: u32,
        written: Vec<String>,
        fail_open: bool,
        fail_write: bool,
    }

    #[derive(Clone, Default)]
    struct TestSink(Arc<Mutex<SinkLog>>);

    impl Sink for TestSink {
        fn open(&mut self) -> Result<(), LogError> {
            let mut log = self.0.lock().unwrap();
            if log.fail_open {
                return Err(LogError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "injected open failure",
                )));
            }
            log.opens += 1;
            Ok(())
        }

        fn write(&mut self, msg: &LogMessage) -> Result<(), LogError> {
            let mut log = self.0.lock().unwrap();
            if log.fail_write {
                return Err(LogError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "injected write failure",
                )));
            }
            log.written.push(msg.content().to_string());
            Ok(())
        }

        fn close(&mut self) {
            self.0.lock().unwrap().closes += 1;
        }
    }

    fn spawn_actor(sink: TestSink) -> (RecorderHandle, Arc<AtomicBool>) {
        let (ctl_tx, ctl_rx) = mpsc::channel(CTL_CAPACITY);
        let (msg_tx, msg_rx) = mpsc::channel(MSG_CAPACITY);
        let listening = Arc::new(AtomicBool::new(true));
        let actor = RecorderActor::new(ctl_rx, msg_rx, Arc::clone(&listening), sink);
        tokio::spawn(actor.run());
        (RecorderHandle::new(ctl_tx, msg_tx), listening)
    }

    fn message(text: &str) -> LogMessage {
        let mut msg = LogMessage::with_text(text);
        msg.set_flags(MsgFlags::INFO);
        msg
    }

    #[tokio::test]
    async fn test_init_opens_sink_once() {
        let sink = TestSink::default();
        let (handle, _) = spawn_actor(sink.clone());

        handle.init().await.unwrap();
        handle.init().await.unwrap();

        assert_eq!(sink.0.lock().unwrap().opens, 1);
    }

    #[tokio::test]
    async fn test_close_matches_refs() {
        let sink = TestSink::default();
        let (handle, _) = spawn_actor(sink.clone());

        handle.init().await.unwrap();
        handle.init().await.unwrap();
        handle.close().await.unwrap();
        // still one reference held, sink stays open
        handle.send(message("still alive")).await.unwrap();
        handle.close().await.unwrap();
        handle.close().await.unwrap(); // extra close is a no-op
        handle.stop().await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let log = sink.0.lock().unwrap();
        assert_eq!(log.closes, 1);
        assert_eq!(log.written, vec!["still alive".to_string()]);
    }

    #[tokio::test]
    async fn test_open_failure_reported_on_reply() {
        let sink = TestSink::default();
        sink.0.lock().unwrap().fail_open = true;
        let (handle, _) = spawn_actor(sink.clone());

        let err = handle.init().await.unwrap_err();
        assert!(matches!(err, LogError::Io(_)));
        // failed open leaves the counter at zero
        sink.0.lock().unwrap().fail_open = false;
        handle.init().await.unwrap();
        assert_eq!(sink.0.lock().unwrap().opens, 1);
    }

    #[tokio::test]
    async fn test_write_before_init_hits_error_tap() {
        let sink = TestSink::default();
        let (handle, _) = spawn_actor(sink.clone());
        let mut errors = handle.error_tap().await.unwrap();
        // control and message channels are separate; give the actor a
        // moment to install the tap before the write races it
        tokio::time::sleep(Duration::from_millis(20)).await;

        handle.send(message("dropped")).await.unwrap();

        let err = tokio::time::timeout(Duration::from_secs(1), errors.recv())
            .await
            .expect("tap event")
            .expect("tap open");
        assert!(matches!(err, LogError::NotInitialised));
        assert!(sink.0.lock().unwrap().written.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_does_not_stop_actor() {
        let sink = TestSink::default();
        let (handle, _) = spawn_actor(sink.clone());
        let mut errors = handle.error_tap().await.unwrap();
        handle.init().await.unwrap();

        sink.0.lock().unwrap().fail_write = true;
        handle.send(message("boom")).await.unwrap();
        let err = tokio::time::timeout(Duration::from_secs(1), errors.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(err, LogError::Io(_)));

        sink.0.lock().unwrap().fail_write = false;
        handle.send(message("recovered")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.0.lock().unwrap().written, vec!["recovered".to_string()]);
    }

    #[tokio::test]
    async fn test_dropped_error_tap_discards_errors() {
        let sink = TestSink::default();
        let (handle, _) = spawn_actor(sink.clone());
        let _errors = handle.error_tap().await.unwrap();
        handle.drop_error_tap().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // no tap: the write error is swallowed and the actor keeps going
        handle.send(message("no tap")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.init().await.unwrap();
        handle.send(message("after init")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            sink.0.lock().unwrap().written,
            vec!["after init".to_string()]
        );
    }

    #[tokio::test]
    async fn test_stop_clears_listening_flag() {
        let sink = TestSink::default();
        let (handle, listening) = spawn_actor(sink);
        handle.stop().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!listening.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_debug_tap_sees_control_traffic() {
        let sink = TestSink::default();
        let (handle, _) = spawn_actor(sink);
        let (tap_tx, mut tap_rx) = mpsc::channel(crate::signal::DBG_TAP_CAPACITY);
        handle.set_debug_tap(tap_tx).await.unwrap();
        handle.init().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(200), tap_rx.recv()).await
        {
            seen.push(event.text().to_string());
        }
        assert!(seen.iter().any(|t| t.contains("debug tap attached")));
        assert!(seen.iter().any(|t| t.contains("init signal")));
    }
}
