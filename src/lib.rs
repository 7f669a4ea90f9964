// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structured, multi-sink logging engine.
//!
//! A [`Logger`] accepts messages from any number of concurrent producers
//! and fans them out to a set of independently-running recorders — actor
//! tasks that each own one sink (a byte stream, the system log daemon,
//! an in-memory buffer). Per recorder, the logger applies a severity
//! mask and a severity *order* that reduces a multi-severity message to
//! exactly one flag before delivery.
//!
//! Messages travel over bounded channels; a slow recorder back-pressures
//! its producers and nothing else. Write errors never surface on the
//! write path — attach an error tap to a recorder to observe them.
//!
//! ```no_run
//! use fanlog::{Logger, MsgFlags, Recorder, StreamRecorder};
//!
//! # async fn demo() -> Result<(), fanlog::LogError> {
//! let logger = Logger::new();
//! let console = StreamRecorder::new(std::io::stdout());
//! console.listen();
//!
//! logger.register_recorder("console", console.interface(), true).await?;
//! logger.initialise(&[]).await?;
//! logger.write(MsgFlags::INFO, "engine up").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod debug;
mod errors;
mod flags;
mod logger;
mod message;
mod recorder;
mod signal;

pub use debug::{DebugEvent, DebugLog};
pub use errors::{BatchResult, InternalClass, InternalError, LogError};
pub use flags::{
    default_severity_order, Direction, MsgFlags, DEFAULT_SEVERITY, DEFAULT_SEVERITY_ORDER,
};
pub use logger::Logger;
pub use message::LogMessage;
pub use recorder::{
    default_stream_format, facility, priority, FormatFunc, MemoryRecorder, Recorder,
    RecorderActor, Sink, StreamRecorder, SyslogRecorder,
};
pub use signal::{
    ControlSignal, RecorderHandle, CTL_CAPACITY, DBG_TAP_CAPACITY, ERR_TAP_CAPACITY, MSG_CAPACITY,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier a logger knows a recorder by. Opaque, non-empty, unique
/// within one logger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecorderId(String);

impl RecorderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for RecorderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecorderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for RecorderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecorderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
