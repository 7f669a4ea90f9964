// SPDX-License-Identifier: Apache-2.0 OR MIT
// Recorder over an arbitrary byte stream

use super::{ActorHost, FormatFunc, Recorder, Sink};
use crate::errors::LogError;
use crate::message::LogMessage;
use crate::signal::RecorderHandle;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Default line layout: short date/time, severity name, content.
pub fn default_stream_format(msg: &LogMessage) -> String {
    format!(
        "{} {} {}",
        msg.time().format("%Y/%m/%d %H:%M:%S"),
        msg.flags().severity(),
        msg.content()
    )
}

struct StreamShared {
    prefix: String,
    format: FormatFunc,
    on_close: Option<Box<dyn FnMut() + Send>>,
}

struct StreamSink {
    writer: Box<dyn Write + Send>,
    shared: Arc<Mutex<StreamShared>>,
}

impl Sink for StreamSink {
    fn open(&mut self) -> Result<(), LogError> {
        // The writer arrives pre-opened; nothing to acquire here.
        Ok(())
    }

    fn write(&mut self, msg: &LogMessage) -> Result<(), LogError> {
        let mut line = {
            let shared = self.shared.lock().unwrap();
            let rendered = (shared.format)(msg);
            if shared.prefix.is_empty() {
                rendered
            } else {
                format!("{} {}", shared.prefix, rendered)
            }
        };
        if !line.ends_with('\n') {
            line.push('\n');
        }
        self.writer.write_all(line.as_bytes())?;
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.writer.flush();
        if let Some(hook) = self.shared.lock().unwrap().on_close.as_mut() {
            hook();
        }
    }
}

/// Recorder writing formatted lines to any `Write` destination (file,
/// stdout, an in-memory buffer). Lines always end with a newline.
pub struct StreamRecorder {
    host: ActorHost<StreamSink>,
    shared: Arc<Mutex<StreamShared>>,
}

impl StreamRecorder {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self::with_prefix(writer, "")
    }

    /// Recorder whose every line is preceded by `prefix`.
    pub fn with_prefix(writer: impl Write + Send + 'static, prefix: impl Into<String>) -> Self {
        let shared = Arc::new(Mutex::new(StreamShared {
            prefix: prefix.into(),
            format: Arc::new(default_stream_format),
            on_close: None,
        }));
        let sink = StreamSink {
            writer: Box::new(writer),
            shared: Arc::clone(&shared),
        };
        Self {
            host: ActorHost::new(sink),
            shared,
        }
    }

    /// Replace the formatter. Takes effect for the next written message.
    pub fn set_format(&self, format: impl Fn(&LogMessage) -> String + Send + Sync + 'static) {
        self.shared.lock().unwrap().format = Arc::new(format);
    }

    /// Replace the line prefix on the fly.
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.shared.lock().unwrap().prefix = prefix.into();
    }

    /// Hook executed when the last sink reference is closed.
    pub fn on_close(&self, hook: impl FnMut() + Send + 'static) {
        self.shared.lock().unwrap().on_close = Some(Box::new(hook));
    }
}

impl Recorder for StreamRecorder {
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
