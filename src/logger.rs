// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logger dispatcher: recorder registry, filtering and fan-out

use crate::config;
use crate::errors::{internal_critical, internal_unreachable, BatchResult, LogError};
use crate::flags::{default_severity_order, Direction, MsgFlags, DEFAULT_SEVERITY};
use crate::message::LogMessage;
use crate::recorder::Recorder;
use crate::signal::RecorderHandle;
use crate::RecorderId;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Dispatcher state. The four per-recorder maps always share one key set;
/// `defaults` only holds registered ids. All access goes through the
/// logger's read/write lock: `write_msg` and `number_of_recorders` read,
/// everything else writes, so registration can run concurrently with
/// message traffic but never with initialise/close.
#[derive(Default)]
struct LoggerState {
    /// True only while every registered recorder is initialised here.
    /// Initialise and close must not interleave, or the recorders'
    /// reference counters drift.
    initialised: bool,

    recorders: HashMap<RecorderId, RecorderHandle>,
    recorders_init: HashMap<RecorderId, bool>,

    /// Which severities each recorder accepts from this logger.
    severity_masks: HashMap<RecorderId, MsgFlags>,

    /// Per-recorder severity precedence used by the severity protector.
    severity_order: HashMap<RecorderId, Vec<MsgFlags>>,

    /// Recorders addressed when a writer does not name recipients.
    defaults: Vec<RecorderId>,
}

/// Routes structured messages from any number of producer tasks to a set
/// of independently-running recorders, applying per-recorder severity
/// filtering and normalization on the way.
#[derive(Default)]
pub struct Logger {
    state: RwLock<LoggerState>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn number_of_recorders(&self) -> usize {
        self.state.read().await.recorders.len()
    }

    /// Register a recorder interface under `id`. With `as_default` the
    /// recorder also joins the default recipient set.
    pub async fn register_recorder(
        &self,
        id: impl Into<RecorderId>,
        interface: RecorderHandle,
        as_default: bool,
    ) -> Result<(), LogError> {
        if config::global_disable() {
            return Ok(());
        }
        let id = id.into();
        if id.is_empty() {
            return Err(LogError::WrongParameter);
        }

        let mut st = self.state.write().await;
        if st.recorders.contains_key(&id) {
            return Err(LogError::WrongRecorderId);
        }
        st.recorders.insert(id.clone(), interface);
        st.recorders_init.insert(id.clone(), false);
        st.severity_masks.insert(id.clone(), MsgFlags::SEVERITY_ALL);
        st.severity_order.insert(id.clone(), default_severity_order());
        if as_default {
            st.defaults.push(id);
        }
        st.initialised = false;
        Ok(())
    }

    /// Disconnect the recorder (close signal if it was initialised here)
    /// and remove it from the registry.
    pub async fn unregister_recorder(&self, id: &RecorderId) -> Result<(), LogError> {
        if config::global_disable() {
            return Ok(());
        }
        if id.is_empty() {
            return Err(LogError::WrongParameter);
        }

        let mut st = self.state.write().await;
        if st.recorders.is_empty() {
            return Err(LogError::NoRecorders);
        }
        let Some(interface) = st.recorders.get(id).cloned() else {
            return Err(LogError::WrongRecorderId);
        };
        let initialised_here = match st.recorders_init.get(id) {
            Some(state) => *state,
            None => internal_unreachable!("id {id} registered but missing in init states"),
        };
        if initialised_here {
            // A recorder that stopped listening since is removed anyway.
            let _ = interface.close().await;
        }

        st.defaults.retain(|d| d != id);
        if st.recorders.len() == 1 {
            st.initialised = false;
        }
        st.recorders.remove(id);
        st.recorders_init.remove(id);
        st.severity_masks.remove(id);
        st.severity_order.remove(id);
        Ok(())
    }

    /// Send an initialisation signal to every recorder not yet
    /// initialised by this logger and wait for each outcome.
    ///
    /// `health` optionally carries the recorder objects themselves; a
    /// recorder found there that is not consuming its channels is either
    /// started (auto-start enabled) or reported as `NotListening`.
    ///
    /// Full success flips the logger to initialised; any failure leaves
    /// it uninitialised and returns the per-recorder `BatchResult`.
    pub async fn initialise(&self, health: &[&dyn Recorder]) -> Result<(), LogError> {
        if config::global_disable() {
            return Ok(());
        }

        let mut st = self.state.write().await;
        if st.initialised {
            return Ok(());
        }
        if st.recorders.is_empty() {
            return Err(LogError::NoRecorders);
        }

        let mut br = BatchResult::new("some of the given recorders are not initialised");
        let ids: Vec<RecorderId> = st.recorders.keys().cloned().collect();
        'recorders: for id in ids {
            let interface = match st.recorders.get(&id) {
                Some(interface) => interface.clone(),
                None => internal_unreachable!("registry changed under the write lock"),
            };
            match st.recorders_init.get(&id).copied() {
                Some(true) => continue,
                Some(false) => {}
                None => internal_unreachable!("id {id} registered but missing in init states"),
            }

            for recorder in health {
                if recorder.interface().uid() != interface.uid() {
                    continue;
                }
                if !recorder.is_listening() {
                    if config::auto_start_listening() {
                        recorder.listen();
                    } else {
                        br.fail(id.clone(), LogError::NotListening);
                        continue 'recorders;
                    }
                }
                break;
            }

            match interface.init().await {
                Ok(()) => {
                    st.recorders_init.insert(id.clone(), true);
                    br.ok(id);
                }
                Err(err) => {
                    br.fail(id, err);
                }
            }
        }

        // all recorders must succeed before the logger counts as initialised
        if br.has_errors() {
            return Err(LogError::Batch(br));
        }
        st.initialised = true;
        Ok(())
    }

    /// Send a close signal to every recorder initialised by this logger
    /// and mark the logger uninitialised. Recorders stay registered.
    pub async fn close(&self) {
        if config::global_disable() {
            return;
        }

        let mut st = self.state.write().await;
        if !st.initialised {
            return;
        }
        if st.recorders.is_empty() {
            return;
        }
        let ids: Vec<RecorderId> = st.recorders.keys().cloned().collect();
        for id in ids {
            let initialised_here = st.recorders_init.get(&id).copied().unwrap_or(false);
            if !initialised_here {
                continue;
            }
            if let Some(interface) = st.recorders.get(&id) {
                let _ = interface.close().await;
            }
            st.recorders_init.insert(id, false);
        }
        st.initialised = false;
    }

    /// Replace the default recipient set. Unknown ids are collected into
    /// a `BatchResult`; known ones are installed (duplicates suppressed).
    pub async fn defaults_set(&self, recorders: &[RecorderId]) -> Result<(), LogError> {
        if config::global_disable() {
            return Ok(());
        }

        let mut st = self.state.write().await;
        if st.recorders.is_empty() {
            return Err(LogError::NoRecorders);
        }

        let mut br = BatchResult::new("some of given recorder ids are invalid");
        let mut defaults = Vec::new();
        for id in recorders {
            if !st.recorders.contains_key(id) {
                br.fail(id.clone(), LogError::WrongRecorderId);
                continue;
            }
            if !defaults.contains(id) {
                defaults.push(id.clone());
            }
            br.ok(id.clone());
        }
        st.defaults = defaults;
        br.into_result()
    }

    /// Add the given recorders to the default set, skipping ids that are
    /// already default.
    pub async fn defaults_add(&self, recorders: &[RecorderId]) -> Result<(), LogError> {
        if config::global_disable() {
            return Ok(());
        }

        let mut st = self.state.write().await;
        if st.recorders.is_empty() {
            return Err(LogError::NoRecorders);
        }

        let mut br = BatchResult::new("some of given recorder ids are invalid");
        for id in recorders {
            if !st.recorders.contains_key(id) {
                br.fail(id.clone(), LogError::WrongRecorderId);
                continue;
            }
            if st.defaults.contains(id) {
                continue;
            }
            st.defaults.push(id.clone());
            br.ok(id.clone());
        }
        br.into_result()
    }

    /// Remove the given recorders from the default set.
    pub async fn defaults_remove(&self, recorders: &[RecorderId]) -> Result<(), LogError> {
        if config::global_disable() {
            return Ok(());
        }

        let mut st = self.state.write().await;
        if st.recorders.is_empty() {
            return Err(LogError::NoRecorders);
        }

        let mut br = BatchResult::new("some of given recorder ids are invalid");
        for id in recorders {
            if !st.recorders.contains_key(id) {
                br.fail(id.clone(), LogError::WrongRecorderId);
                continue;
            }
            let before = st.defaults.len();
            st.defaults.retain(|d| d != id);
            if st.defaults.len() != before {
                br.ok(id.clone());
            }
        }
        br.into_result()
    }

    /// Set which severities the recorder accepts from this logger.
    /// Attribute bits are stripped; zero is legal and mutes the recorder.
    pub async fn set_severity_mask(
        &self,
        recorder: &RecorderId,
        flags: MsgFlags,
    ) -> Result<(), LogError> {
        if config::global_disable() {
            return Ok(());
        }
        if recorder.is_empty() {
            return Err(LogError::WrongParameter);
        }

        let mut st = self.state.write().await;
        if st.recorders.is_empty() {
            return Err(LogError::NoRecorders);
        }
        match st.severity_masks.get_mut(recorder) {
            Some(mask) => {
                *mask = flags.severity();
                Ok(())
            }
            None => {
                if st.recorders.contains_key(recorder) {
                    internal_unreachable!("id {recorder} registered but missing in severity masks");
                }
                Err(LogError::WrongRecorderId)
            }
        }
    }

    /// Move `src_flag` directly before or after `target_flag` in the
    /// recorder's severity order. Both must be single recognized severity
    /// flags and must differ.
    pub async fn change_severity_order(
        &self,
        recorder: &RecorderId,
        src_flag: MsgFlags,
        dir: Direction,
        target_flag: MsgFlags,
    ) -> Result<(), LogError> {
        if config::global_disable() {
            return Ok(());
        }
        if recorder.is_empty() {
            return Err(LogError::WrongParameter);
        }

        let mut st = self.state.write().await;
        if st.recorders.is_empty() {
            return Err(LogError::NoRecorders);
        }
        if !st.recorders.contains_key(recorder) {
            return Err(LogError::WrongRecorderId);
        }

        let src = src_flag.severity();
        let target = target_flag.severity();
        if !src.is_single_severity() || !target.is_single_severity() {
            return Err(LogError::WrongFlagValue);
        }
        if src == target {
            return Err(LogError::WrongFlagValue);
        }

        let Some(order) = st.severity_order.get_mut(recorder) else {
            internal_unreachable!("id {recorder} registered but missing in severity order");
        };
        let Some(src_pos) = order.iter().position(|f| *f == src) else {
            internal_unreachable!("severity {src} absent from order list of {recorder}");
        };
        order.remove(src_pos);
        let Some(target_pos) = order.iter().position(|f| *f == target) else {
            internal_unreachable!("severity {target} absent from order list of {recorder}");
        };
        match dir {
            Direction::Before => order.insert(target_pos, src),
            Direction::After => order.insert(target_pos + 1, src),
        }
        Ok(())
    }

    /// Build a message with the given flags and text and dispatch it to
    /// the default recorders.
    pub async fn write(
        &self,
        flags: MsgFlags,
        content: impl Into<String>,
    ) -> Result<(), LogError> {
        if config::global_disable() {
            return Ok(());
        }
        let mut msg = LogMessage::with_text(content);
        msg.set_flags(flags);
        self.write_msg(&[], msg).await
    }

    /// Dispatch a message to the named recorders, or to the defaults when
    /// `recorders` is empty.
    ///
    /// Unknown recipients are dropped and reported in the returned
    /// `BatchResult`; delivery itself is fire-and-forget (write errors
    /// surface on the recorder's error tap).
    pub async fn write_msg(
        &self,
        recorders: &[RecorderId],
        mut msg: LogMessage,
    ) -> Result<(), LogError> {
        if config::global_disable() {
            return Ok(());
        }

        let st = self.state.read().await;
        if !st.initialised {
            return Err(LogError::NotInitialised);
        }
        if st.recorders.is_empty() {
            return Err(LogError::NoRecorders);
        }
        if st.defaults.is_empty() && recorders.is_empty() {
            // The registry may be populated while nobody is addressable.
            return Err(LogError::NotWhereToWrite);
        }

        let mut br = BatchResult::new("an error occurred in some of the given recorders");

        let targets: Vec<RecorderId> = if recorders.is_empty() {
            st.defaults.clone()
        } else {
            let mut targets = Vec::with_capacity(recorders.len());
            for id in recorders {
                if st.recorders.contains_key(id) {
                    targets.push(id.clone());
                } else {
                    br.fail(id.clone(), LogError::WrongRecorderId);
                }
            }
            targets
        };

        // Attach trace attributes once, before fan-out, so every
        // recipient sees the same content.
        if msg.flags().intersects(MsgFlags::STACK_TRACE_SHORT) {
            msg.append_line(stack_trace_block(true));
        } else if msg.flags().intersects(MsgFlags::STACK_TRACE) {
            msg.append_line(stack_trace_block(false));
        }

        if msg.flags().severity().is_empty() {
            msg.set_flags(msg.flags() | DEFAULT_SEVERITY);
        }

        for id in targets {
            let Some(order) = st.severity_order.get(&id) else {
                internal_unreachable!("id {id} registered but missing in severity order");
            };
            let flags = match severity_protector(order, msg.flags()) {
                Ok(flags) => flags,
                Err(err) => {
                    br.fail(id, err);
                    continue;
                }
            };
            let Some(mask) = st.severity_masks.get(&id) else {
                internal_unreachable!("id {id} registered but missing in severity masks");
            };
            if !flags.severity().intersects(*mask) {
                continue; // filtered out, not an error
            }
            let Some(interface) = st.recorders.get(&id) else {
                internal_unreachable!("id {id} validated but missing in registry");
            };
            let mut copy = msg.clone();
            copy.set_flags(flags);
            let _ = interface.send(copy).await;
            br.ok(id);
        }

        br.into_result()
    }
}

/// Reduces a severity set to exactly one flag: the first entry of the
/// recorder's order list present in the message wins. Guarantees the
/// single-severity-bit post-condition every sink relies on.
fn severity_protector(order: &[MsgFlags], flags: MsgFlags) -> Result<MsgFlags, LogError> {
    if order.is_empty() {
        return Err(internal_critical!("empty severity order list"));
    }
    let severity = flags.severity();
    for candidate in order {
        if severity.intersects(*candidate) {
            return Ok(flags.attributes() | *candidate);
        }
    }
    internal_unreachable!("severity {severity} not present in order list");
}

fn stack_trace_block(short: bool) -> String {
    let trace = std::backtrace::Backtrace::force_capture().to_string();
    let mut block = String::from("---------- stack trace ----------\n");
    if short {
        // keep the frame-name lines, drop the location lines
        for line in trace.lines().step_by(2) {
            block.push_str(line);
            block.push('\n');
        }
    } else {
        block.push_str(&trace);
        if !block.ends_with('\n') {
            block.push('\n');
        }
    }
    block.push_str("---------------------------------");
    block
}
