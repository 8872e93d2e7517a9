// Copyright (C) 2026 The Render Farm Client Contributors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Observable record of one render node: identity, capability, per-session
//! sync state, current activity, and the last error seen. Every mutating
//! setter emits a [`NodeEvent::Changed`] on the node's broadcast channel —
//! this is the entire coupling surface a UI layer needs; nothing here
//! assumes a GUI toolkit.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::error::{RenderNodeError, Result};
use crate::ids::{SessionId, TaskId};
use crate::protocol::RenderType;

/// One property of [`NodeState`] changing. Carried as a string value for the
/// scalar fields so a generic UI subscriber can render a plain key/value
/// changelog without knowing every field's Rust type; typed accessors on
/// [`NodeState`] remain the source of truth for callers that need more than
/// a display string.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    Changed { field: &'static str, value: String },
    ConsoleLine(String),
    BatchResult { task_id: TaskId, frame: i32, success: bool },
}

#[derive(Debug, Clone)]
struct Inner {
    name: String,
    address: SocketAddr,
    computer_name: String,
    os: String,
    cores: i32,
    render_type: RenderType,
    performance: f64,
    performance_score_pp: f64,
    pass: String,
    mac: Option<[u8; 6]>,
    selected_session_id: Option<SessionId>,
    synced_map: HashMap<SessionId, bool>,
    last_file_id: HashMap<SessionId, i64>,
    available_versions: HashSet<String>,
    activity: String,
    activity_progress: f64,
    exception: String,
    last_status: String,
    current_task_id: Option<TaskId>,
    is_prepared: bool,
    connected: bool,
    console_log: VecDeque<String>,
    console_cap: usize,
}

/// Constructor parameters for a detached [`NodeState`]. Mirrors the
/// `PastClient` shape persisted in `settings`, since both describe the same
/// identity/auth facts about a node.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub name: String,
    pub address: SocketAddr,
    pub render_type: RenderType,
    pub performance: f64,
    pub pass: String,
    pub mac: Option<[u8; 6]>,
}

/// The observable state of one node, guarded by a single non-async mutex.
/// The mutex is held only across synchronous field updates, never across an
/// `.await`, so it cannot deadlock the runtime it is read from concurrently
/// (e.g. a UI task holding a clone of this `Arc`).
pub struct NodeState {
    inner: Mutex<Inner>,
    events: broadcast::Sender<NodeEvent>,
}

impl NodeState {
    pub fn new(identity: NodeIdentity, console_cap: usize) -> Self {
        let (events, _rx) = broadcast::channel(256);
        NodeState {
            inner: Mutex::new(Inner {
                name: identity.name,
                address: identity.address,
                computer_name: String::new(),
                os: String::new(),
                cores: -1,
                render_type: identity.render_type,
                performance: identity.performance,
                performance_score_pp: 0.0,
                pass: identity.pass,
                mac: identity.mac,
                selected_session_id: None,
                synced_map: HashMap::new(),
                last_file_id: HashMap::new(),
                available_versions: HashSet::new(),
                activity: String::new(),
                activity_progress: 0.0,
                exception: String::new(),
                last_status: String::new(),
                current_task_id: None,
                is_prepared: false,
                connected: false,
                console_log: VecDeque::new(),
                console_cap,
            }),
            events,
        }
    }

    /// Subscribes to the node's change-notification stream. Each call
    /// returns an independent receiver; a slow or absent subscriber never
    /// blocks the writer (broadcast drops oldest entries under backpressure
    /// rather than stalling).
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    fn emit(&self, field: &'static str, value: impl ToString) {
        let _ = self.events.send(NodeEvent::Changed {
            field,
            value: value.to_string(),
        });
    }

    // --- identity / capability -------------------------------------------------

    pub fn name(&self) -> String {
        self.inner.lock().unwrap().name.clone()
    }

    pub fn address(&self) -> SocketAddr {
        self.inner.lock().unwrap().address
    }

    pub fn mac(&self) -> Option<[u8; 6]> {
        self.inner.lock().unwrap().mac
    }

    pub fn pass(&self) -> String {
        self.inner.lock().unwrap().pass.clone()
    }

    pub fn computer_name(&self) -> String {
        self.inner.lock().unwrap().computer_name.clone()
    }

    pub fn os(&self) -> String {
        self.inner.lock().unwrap().os.clone()
    }

    pub fn cores(&self) -> i32 {
        self.inner.lock().unwrap().cores
    }

    /// Folds the handshake's `ComputerInfo` reply into state, emitting one
    /// change notification per field.
    pub fn set_computer_info(&self, name: String, os: String, cores: i32) {
        let mut inner = self.inner.lock().unwrap();
        inner.computer_name = name.clone();
        inner.os = os.clone();
        inner.cores = cores;
        drop(inner);
        self.emit("computer_name", name);
        self.emit("os", os);
        self.emit("cores", cores);
    }

    pub fn render_type(&self) -> RenderType {
        self.inner.lock().unwrap().render_type.clone()
    }

    pub fn performance(&self) -> f64 {
        self.inner.lock().unwrap().performance
    }

    pub fn performance_score_pp(&self) -> f64 {
        self.inner.lock().unwrap().performance_score_pp
    }

    /// Sets `performance_score_pp = pixels / ms`. Rejects `ms <= 0.0`: the
    /// ratio is undefined there, not merely large.
    pub fn update_performance(&self, pixels: f64, ms: f64) -> Result<()> {
        if ms <= 0.0 {
            return Err(RenderNodeError::InvalidPerformanceSample);
        }
        let score = pixels / ms;
        self.inner.lock().unwrap().performance_score_pp = score;
        self.emit("performance_score_pp", score);
        Ok(())
    }

    // --- connection lifecycle ---------------------------------------------------

    pub fn connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }

    /// Marks the node connected. Does not clear `exception` by itself —
    /// callers clear it once the handshake actually succeeds.
    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().unwrap().connected = connected;
        self.emit("connected", connected);
    }

    /// Clears every `synced_map` entry to false. Invariant 2 (§8): this runs
    /// on every disconnect, surprise or requested, never just "sometimes".
    pub fn on_disconnected(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        for synced in inner.synced_map.values_mut() {
            *synced = false;
        }
        inner.available_versions.clear();
        drop(inner);
        self.emit("connected", false);
    }

    pub fn clear_exception(&self) {
        self.inner.lock().unwrap().exception.clear();
        self.emit("exception", "");
    }

    pub fn exception(&self) -> String {
        self.inner.lock().unwrap().exception.clone()
    }

    pub fn set_exception(&self, message: impl Into<String>) {
        let message = message.into();
        self.inner.lock().unwrap().exception = message.clone();
        self.emit("exception", message);
    }

    pub fn last_status(&self) -> String {
        self.inner.lock().unwrap().last_status.clone()
    }

    pub fn set_last_status(&self, status: impl Into<String>) {
        let status = status.into();
        self.inner.lock().unwrap().last_status = status.clone();
        self.emit("last_status", status);
    }

    // --- session / sync -----------------------------------------------------

    pub fn selected_session_id(&self) -> Option<SessionId> {
        self.inner.lock().unwrap().selected_session_id.clone()
    }

    pub fn select_session(&self, session_id: Option<SessionId>) {
        self.inner.lock().unwrap().selected_session_id = session_id.clone();
        self.emit(
            "selected_session_id",
            session_id.map(|s| s.0).unwrap_or_default(),
        );
    }

    pub fn is_session_synced(&self, session_id: &SessionId) -> bool {
        self.inner
            .lock()
            .unwrap()
            .synced_map
            .get(session_id)
            .copied()
            .unwrap_or(false)
    }

    /// `is_synced()` per §4.D: derived from the currently selected session.
    pub fn is_synced(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        match &inner.selected_session_id {
            Some(s) => inner.synced_map.get(s).copied().unwrap_or(false),
            None => false,
        }
    }

    pub fn set_session_synced(&self, session_id: SessionId, synced: bool) {
        self.inner
            .lock()
            .unwrap()
            .synced_map
            .insert(session_id.clone(), synced);
        self.emit("synced_map", format!("{session_id}={synced}"));
    }

    pub fn last_file_id(&self, session_id: &SessionId) -> Option<i64> {
        self.inner.lock().unwrap().last_file_id.get(session_id).copied()
    }

    /// Records a verified sync: sets `synced_map[s] = true` and
    /// `last_file_id[s] = file_id`. Only ever called after a successful
    /// `CheckSync`, per Invariant 3 — never optimistically from the upload
    /// loop itself.
    pub fn record_verified_sync(&self, session_id: SessionId, file_id: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.synced_map.insert(session_id.clone(), true);
        inner.last_file_id.insert(session_id.clone(), file_id);
        drop(inner);
        self.emit("synced_map", format!("{session_id}=true"));
        self.emit("last_file_id", format!("{session_id}={file_id}"));
    }

    pub fn available_versions(&self) -> HashSet<String> {
        self.inner.lock().unwrap().available_versions.clone()
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.inner.lock().unwrap().available_versions.contains(version)
    }

    pub fn record_available_version(&self, version: impl Into<String>) {
        let version = version.into();
        self.inner.lock().unwrap().available_versions.insert(version.clone());
        self.emit("available_versions", version);
    }

    pub fn is_prepared(&self) -> bool {
        self.inner.lock().unwrap().is_prepared
    }

    pub fn set_is_prepared(&self, prepared: bool) {
        self.inner.lock().unwrap().is_prepared = prepared;
        self.emit("is_prepared", prepared);
    }

    // --- activity / task -----------------------------------------------------

    pub fn activity(&self) -> String {
        self.inner.lock().unwrap().activity.clone()
    }

    pub fn activity_progress(&self) -> f64 {
        self.inner.lock().unwrap().activity_progress
    }

    pub fn is_idle(&self) -> bool {
        self.inner.lock().unwrap().activity.is_empty()
    }

    pub fn has_activity_progress(&self) -> bool {
        self.inner.lock().unwrap().activity_progress > 0.0
    }

    pub fn set_activity(&self, activity: impl Into<String>, progress: f64) {
        let activity = activity.into();
        let mut inner = self.inner.lock().unwrap();
        inner.activity = activity.clone();
        inner.activity_progress = progress;
        drop(inner);
        self.emit("activity", activity);
        self.emit("activity_progress", progress);
    }

    pub fn clear_activity(&self) {
        self.set_activity(String::new(), 0.0);
    }

    pub fn current_task_id(&self) -> Option<TaskId> {
        self.inner.lock().unwrap().current_task_id.clone()
    }

    /// Atomically checks-and-sets `current_task_id`: returns `Err` without
    /// mutating anything if a task is already in flight. This is the
    /// serialization point behind Invariant 1 — the check and the set
    /// happen under the same lock acquisition, so two concurrent callers can
    /// never both win.
    pub fn try_start_task(&self, task_id: TaskId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.current_task_id.is_some() {
            return Err(RenderNodeError::AlreadyRendering);
        }
        inner.current_task_id = Some(task_id.clone());
        drop(inner);
        self.emit("current_task_id", task_id.0);
        Ok(())
    }

    pub fn finish_task(&self) {
        self.inner.lock().unwrap().current_task_id = None;
        self.emit("current_task_id", "");
    }

    // --- console log ---------------------------------------------------------

    pub fn push_console_line(&self, line: impl Into<String>) {
        let line = line.into();
        let mut inner = self.inner.lock().unwrap();
        if inner.console_log.len() >= inner.console_cap {
            inner.console_log.pop_front();
        }
        inner.console_log.push_back(line.clone());
        drop(inner);
        let _ = self.events.send(NodeEvent::ConsoleLine(line));
    }

    /// Fans a batch-result event out to subscribers untouched, per §4.F.
    pub fn emit_batch_result(&self, task_id: TaskId, frame: i32, success: bool) {
        let _ = self.events.send(NodeEvent::BatchResult {
            task_id,
            frame,
            success,
        });
    }

    pub fn console_snapshot(&self) -> Vec<String> {
        self.inner.lock().unwrap().console_log.iter().cloned().collect()
    }
}

/// Clears activity on drop, regardless of which path out of the scope is
/// taken. This is the idiomatic-Rust shape of the spec's "scoped activity
/// release" design note (§9) and is how Invariant 4 (§8) is enforced
/// structurally rather than by remembering to clean up on every branch.
pub struct ActivityGuard<'a> {
    state: &'a NodeState,
}

impl<'a> ActivityGuard<'a> {
    pub fn enter(state: &'a NodeState, activity: impl Into<String>, progress: f64) -> Self {
        state.set_activity(activity, progress);
        ActivityGuard { state }
    }
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.state.clear_activity();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> NodeState {
        NodeState::new(
            NodeIdentity {
                name: "node-a".into(),
                address: "127.0.0.1:9999".parse().unwrap(),
                render_type: RenderType::Cpu,
                performance: 0.0,
                pass: String::new(),
                mac: None,
            },
            4,
        )
    }

    #[test]
    fn fresh_node_is_idle_and_unsynced() {
        let s = state();
        assert!(s.is_idle());
        assert!(!s.is_synced());
        assert_eq!(s.current_task_id(), None);
    }

    #[test]
    fn try_start_task_is_exclusive() {
        let s = state();
        s.try_start_task(TaskId::from("t1")).unwrap();
        let err = s.try_start_task(TaskId::from("t2")).unwrap_err();
        assert!(matches!(err, RenderNodeError::AlreadyRendering));
        s.finish_task();
        s.try_start_task(TaskId::from("t2")).unwrap();
    }

    #[test]
    fn verified_sync_sets_both_fields_together() {
        let s = state();
        let sid = SessionId::from("s1");
        assert!(!s.is_session_synced(&sid));
        s.record_verified_sync(sid.clone(), 42);
        assert!(s.is_session_synced(&sid));
        assert_eq!(s.last_file_id(&sid), Some(42));
    }

    #[test]
    fn disconnect_clears_every_synced_flag() {
        let s = state();
        let sid = SessionId::from("s1");
        s.record_verified_sync(sid.clone(), 42);
        assert!(s.is_session_synced(&sid));
        s.on_disconnected();
        assert!(!s.is_session_synced(&sid));
        assert_eq!(s.last_file_id(&sid), Some(42), "file id tag itself is not rolled back");
    }

    #[test]
    fn update_performance_rejects_zero_ms() {
        let s = state();
        let err = s.update_performance(100.0, 0.0).unwrap_err();
        assert!(matches!(err, RenderNodeError::InvalidPerformanceSample));
    }

    #[test]
    fn update_performance_divides_pixels_by_ms() {
        let s = state();
        s.update_performance(2_000_000.0, 500.0).unwrap();
        assert_eq!(s.performance_score_pp(), 4_000.0);
    }

    #[test]
    fn activity_guard_clears_on_drop_even_on_early_return() {
        let s = state();
        {
            let _guard = ActivityGuard::enter(&s, "Syncing (10.0%)", 10.0);
            assert_eq!(s.activity(), "Syncing (10.0%)");
        }
        assert_eq!(s.activity(), "");
        assert_eq!(s.activity_progress(), 0.0);
    }

    #[test]
    fn console_log_evicts_oldest_past_cap() {
        let s = state();
        for i in 0..6 {
            s.push_console_line(format!("line {i}"));
        }
        let snapshot = s.console_snapshot();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.first().unwrap(), "line 2");
    }
}
