// Log message value passed from producers to recorders

use crate::flags::MsgFlags;
use chrono::{DateTime, Local};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A single log message: timestamp, flag set, text content and an
/// optional opaque payload for non-default sink handling.
///
/// The timestamp is captured at construction. Mutators are available
/// until the message is handed to a recorder; after hand-off every
/// recipient sees its own immutable copy.
#[derive(Clone)]
pub struct LogMessage {
    time: DateTime<Local>,
    flags: MsgFlags,
    content: String,
    /// Extra data for non-default handling; ignored by the built-in sinks.
    pub data: Option<Arc<dyn Any + Send + Sync>>,
}

impl LogMessage {
    /// New empty message stamped with the current time.
    pub fn new() -> Self {
        Self {
            time: Local::now(),
            flags: MsgFlags::empty(),
            content: String::new(),
            data: None,
        }
    }

    /// New message with content, default severity (unset).
    pub fn with_text(content: impl Into<String>) -> Self {
        let mut msg = Self::new();
        msg.content = content.into();
        msg
    }

    /// Set severity and attribute flags.
    pub fn set_flags(&mut self, flags: MsgFlags) -> &mut Self {
        self.flags = flags;
        self
    }

    /// Re-stamp the message with the current time.
    pub fn update_time(&mut self) -> &mut Self {
        self.time = Local::now();
        self
    }

    /// Replace the message text.
    pub fn set(&mut self, content: impl Into<String>) -> &mut Self {
        self.content = content.into();
        self
    }

    /// Attach text to the end of the existing message.
    pub fn append(&mut self, content: impl AsRef<str>) -> &mut Self {
        self.content.push_str(content.as_ref());
        self
    }

    /// Attach text to the existing message as a new line.
    pub fn append_line(&mut self, content: impl AsRef<str>) -> &mut Self {
        self.content.push('\n');
        self.content.push_str(content.as_ref());
        self
    }

    pub fn time(&self) -> DateTime<Local> {
        self.time
    }

    pub fn flags(&self) -> MsgFlags {
        self.flags
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl Default for LogMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogMessage")
            .field("time", &self.time)
            .field("flags", &self.flags)
            .field("content", &self.content)
            .field("data", &self.data.is_some())
            .finish()
    }
}
