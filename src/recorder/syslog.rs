// SPDX-License-Identifier: Apache-2.0 OR MIT
// Recorder for the local system log daemon
//
// Speaks the BSD datagram protocol directly (<pri>tag: body) instead of
// the POSIX syslog() API, so several recorders can coexist in one
// process without clobbering each other's openlog state.

use super::{ActorHost, FormatFunc, Recorder, Sink};
use crate::errors::{internal_critical, LogError};
use crate::flags::MsgFlags;
use crate::message::LogMessage;
use crate::signal::RecorderHandle;
use std::collections::HashMap;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// The eight system-log priority codes (RFC 5424 severity values).
pub mod priority {
    pub const EMERG: u8 = 0;
    pub const ALERT: u8 = 1;
    pub const CRIT: u8 = 2;
    pub const ERR: u8 = 3;
    pub const WARNING: u8 = 4;
    pub const NOTICE: u8 = 5;
    pub const INFO: u8 = 6;
    pub const DEBUG: u8 = 7;
}

/// Common facility codes (pre-shifted).
pub mod facility {
    pub const USER: u8 = 1 << 3;
    pub const DAEMON: u8 = 3 << 3;
    pub const LOCAL0: u8 = 16 << 3;
    pub const LOCAL1: u8 = 17 << 3;
    pub const LOCAL2: u8 = 18 << 3;
    pub const LOCAL3: u8 = 19 << 3;
    pub const LOCAL4: u8 = 20 << 3;
    pub const LOCAL5: u8 = 21 << 3;
    pub const LOCAL6: u8 = 22 << 3;
    pub const LOCAL7: u8 = 23 << 3;
}

const DEFAULT_SOCKET: &str = "/dev/log";

fn default_bindings() -> HashMap<u16, u8> {
    let mut bindings = HashMap::new();
    bindings.insert(MsgFlags::EMERG.bits(), priority::EMERG);
    bindings.insert(MsgFlags::ALERT.bits(), priority::ALERT);
    bindings.insert(MsgFlags::CRITICAL.bits(), priority::CRIT);
    bindings.insert(MsgFlags::ERROR.bits(), priority::ERR);
    bindings.insert(MsgFlags::WARNING.bits(), priority::WARNING);
    bindings.insert(MsgFlags::NOTICE.bits(), priority::NOTICE);
    bindings.insert(MsgFlags::INFO.bits(), priority::INFO);
    bindings.insert(MsgFlags::DEBUG.bits(), priority::DEBUG);
    bindings.insert(MsgFlags::CUSTOM_B1.bits(), priority::INFO);
    bindings.insert(MsgFlags::CUSTOM_B2.bits(), priority::INFO);
    bindings
}

struct SyslogShared {
    /// Severity bit -> priority code.
    bindings: HashMap<u16, u8>,
    format: Option<FormatFunc>,
}

struct SyslogSink {
    tag: String,
    facility: u8,
    socket_path: PathBuf,
    socket: Option<UnixDatagram>,
    shared: Arc<Mutex<SyslogShared>>,
}

impl SyslogSink {
    /// One write entry per priority code; the bindings table decides
    /// which one a severity lands on.
    fn dispatch(&self, code: u8, body: &str) -> Result<(), LogError> {
        match code {
            priority::EMERG => self.emerg(body),
            priority::ALERT => self.alert(body),
            priority::CRIT => self.crit(body),
            priority::ERR => self.err(body),
            priority::WARNING => self.warning(body),
            priority::NOTICE => self.notice(body),
            priority::INFO => self.info(body),
            priority::DEBUG => self.debug(body),
            other => Err(internal_critical!("unexpected priority code {other}")),
        }
    }

    fn emerg(&self, body: &str) -> Result<(), LogError> {
        self.send(priority::EMERG, body)
    }

    fn alert(&self, body: &str) -> Result<(), LogError> {
        self.send(priority::ALERT, body)
    }

    fn crit(&self, body: &str) -> Result<(), LogError> {
        self.send(priority::CRIT, body)
    }

    fn err(&self, body: &str) -> Result<(), LogError> {
        self.send(priority::ERR, body)
    }

    fn warning(&self, body: &str) -> Result<(), LogError> {
        self.send(priority::WARNING, body)
    }

    fn notice(&self, body: &str) -> Result<(), LogError> {
        self.send(priority::NOTICE, body)
    }

    fn info(&self, body: &str) -> Result<(), LogError> {
        self.send(priority::INFO, body)
    }

    fn debug(&self, body: &str) -> Result<(), LogError> {
        self.send(priority::DEBUG, body)
    }

    fn send(&self, code: u8, body: &str) -> Result<(), LogError> {
        let socket = self.socket.as_ref().ok_or(LogError::NotInitialised)?;
        let frame = format!("<{}>{}: {}", self.facility | code, self.tag, body);
        socket.send(frame.as_bytes())?;
        Ok(())
    }
}

impl Sink for SyslogSink {
    fn open(&mut self) -> Result<(), LogError> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(&self.socket_path)?;
        self.socket = Some(socket);
        Ok(())
    }

    fn write(&mut self, msg: &LogMessage) -> Result<(), LogError> {
        let (body, code) = {
            let shared = self.shared.lock().unwrap();
            let body = match &shared.format {
                Some(format) => format(msg),
                None => msg.content().to_string(),
            };
            let bits = msg.flags().severity().bits();
            let code = shared
                .bindings
                .get(&bits)
                .copied()
                .ok_or(LogError::WrongFlagValue)?;
            (body, code)
        };
        self.dispatch(code, &body)
    }

    fn close(&mut self) {
        self.socket = None;
    }
}

/// Recorder forwarding messages to the local syslog daemon, one datagram
/// per message, priority chosen by the per-severity bindings.
pub struct SyslogRecorder {
    host: ActorHost<SyslogSink>,
    shared: Arc<Mutex<SyslogShared>>,
}

impl SyslogRecorder {
    /// Recorder targeting the system socket with the `user` facility.
    pub fn new(tag: impl Into<String>) -> Self {
        Self::with_socket_path(tag, DEFAULT_SOCKET)
    }

    /// Recorder targeting an explicit datagram socket path.
    pub fn with_socket_path(tag: impl Into<String>, path: impl AsRef<Path>) -> Self {
        let shared = Arc::new(Mutex::new(SyslogShared {
            bindings: default_bindings(),
            format: None,
        }));
        let sink = SyslogSink {
            tag: tag.into(),
            facility: facility::USER,
            socket_path: path.as_ref().to_path_buf(),
            socket: None,
            shared: Arc::clone(&shared),
        };
        Self {
            host: ActorHost::new(sink),
            shared,
        }
    }

    /// Rebind a severity flag to another priority code. Only the eight
    /// system-log codes are accepted; the severity must already be known
    /// to the bindings table.
    pub fn bind_severity(&self, severity: MsgFlags, priority_code: u8) -> Result<(), LogError> {
        if priority_code > priority::DEBUG {
            return Err(LogError::WrongPriority);
        }
        let mut shared = self.shared.lock().unwrap();
        match shared.bindings.get_mut(&severity.severity().bits()) {
            Some(slot) => {
                *slot = priority_code;
                Ok(())
            }
            None => Err(LogError::WrongFlagValue),
        }
    }

    /// Replace the body formatter; the raw content is sent otherwise.
    pub fn set_format(&self, format: impl Fn(&LogMessage) -> String + Send + Sync + 'static) {
        self.shared.lock().unwrap().format = Some(Arc::new(format));
    }
}

impl Recorder for SyslogRecorder {
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
