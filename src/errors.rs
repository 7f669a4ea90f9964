// SPDX-License-Identifier: Apache-2.0 OR MIT
// Error taxonomy, internal-error capture and the partial-success container

use crate::RecorderId;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Errors produced by the logger, the recorders and the sinks.
#[derive(Debug, Error)]
pub enum LogError {
    /// Recorder id unknown, or already used at registration.
    #[error("wrong recorder id")]
    WrongRecorderId,

    /// Write attempted on an uninitialised logger or recorder.
    #[error("not initialised")]
    NotInitialised,

    /// A severity flag was not recognized, or source equals target in an
    /// order edit.
    #[error("wrong flag value")]
    WrongFlagValue,

    /// A passed parameter is invalid, e.g. an empty recorder id.
    #[error("wrong parameter")]
    WrongParameter,

    /// The operation needs a non-empty recorder registry.
    #[error("the logger has no registered recorders")]
    NoRecorders,

    /// The logger has no default recorders and no custom recorders were
    /// specified.
    #[error("no default recorders, and custom recorders are not specified")]
    NotWhereToWrite,

    /// The recorder is not consuming its channels yet.
    #[error("recorder is not listening")]
    NotListening,

    /// A severity binding was given an unsupported priority code.
    #[error("wrong priority value")]
    WrongPriority,

    /// A sink-level i/o failure.
    #[error("sink i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// An invariant was violated inside the engine.
    #[error(transparent)]
    Internal(InternalError),

    /// Partial success over a set of recorders.
    #[error(transparent)]
    Batch(BatchResult),
}

impl LogError {
    /// Batch payload, if this error is a partial-success report.
    pub fn as_batch(&self) -> Option<&BatchResult> {
        match self {
            LogError::Batch(br) => Some(br),
            _ => None,
        }
    }

    /// Internal-error payload, if any.
    pub fn as_internal(&self) -> Option<&InternalError> {
        match self {
            LogError::Internal(err) => Some(err),
            _ => None,
        }
    }
}

/// Classification of an internal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalClass {
    /// Likely a bug; reported as an error value.
    Critical,
    /// Must not happen; continuing risks data corruption, so the
    /// observing call site panics.
    Unreachable,
}

/// An engine invariant violation, carrying the observing call site.
#[derive(Debug)]
pub struct InternalError {
    pub class: InternalClass,
    pub message: String,
    pub module: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl InternalError {
    pub fn new(
        class: InternalClass,
        message: String,
        module: &'static str,
        file: &'static str,
        line: u32,
    ) -> Self {
        Self {
            class,
            message,
            module,
            file,
            line,
        }
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "internal error ({:?}) in {} at {}:{}: {}",
            self.class, self.module, self.file, self.line, self.message
        )
    }
}

impl std::error::Error for InternalError {}

/// Builds a `LogError::Internal` of class `Critical` capturing the call
/// site. The caller should return it.
macro_rules! internal_critical {
    ($($arg:tt)*) => {
        $crate::errors::LogError::Internal($crate::errors::InternalError::new(
            $crate::errors::InternalClass::Critical,
            format!($($arg)*),
            module_path!(),
            file!(),
            line!(),
        ))
    };
}

/// Panics with an `Unreachable` internal error capturing the call site.
macro_rules! internal_unreachable {
    ($($arg:tt)*) => {
        panic!(
            "{}",
            $crate::errors::InternalError::new(
                $crate::errors::InternalClass::Unreachable,
                format!($($arg)*),
                module_path!(),
                file!(),
                line!(),
            )
        )
    };
}

pub(crate) use internal_critical;
pub(crate) use internal_unreachable;

/// Accumulates the outcome of an operation applied to several recorders.
/// Used as a partial error when some recorders succeed and some fail,
/// e.g. during initialisation.
#[derive(Debug, Default)]
pub struct BatchResult {
    errors: HashMap<RecorderId, LogError>,
    successful: Vec<RecorderId>,
    message: String,
}

impl BatchResult {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Record a failure for `id`. Removes `id` from the success list if
    /// it was previously marked ok.
    pub fn fail(&mut self, id: RecorderId, err: LogError) -> &mut Self {
        self.successful.retain(|s| *s != id);
        self.errors.insert(id, err);
        self
    }

    /// Record a success for `id`. Removes `id` from the failure map if it
    /// was previously marked failed; duplicates are suppressed.
    pub fn ok(&mut self, id: RecorderId) -> &mut Self {
        if self.successful.contains(&id) {
            return self;
        }
        self.errors.remove(&id);
        self.successful.push(id);
        self
    }

    pub fn errors(&self) -> &HashMap<RecorderId, LogError> {
        &self.errors
    }

    pub fn successful(&self) -> &[RecorderId] {
        &self.successful
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Ok on full success, the accumulated batch otherwise.
    pub(crate) fn into_result(self) -> Result<(), LogError> {
        if self.has_errors() {
            Err(LogError::Batch(self))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("successful, no errors");
        }
        let msg = if self.message.is_empty() {
            "unknown errors"
        } else {
            &self.message
        };
        let mut failed: Vec<&str> = self.errors.keys().map(|id| id.as_str()).collect();
        failed.sort_unstable();
        write!(f, "{} ({})", msg, failed.join(", "))
    }
}

impl std::error::Error for BatchResult {}
