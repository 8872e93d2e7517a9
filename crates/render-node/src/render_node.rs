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

//! The public façade: one `RenderNode` per remote node, wiring the
//! Connection, Node state, handshake, sync pipeline, and task controller
//! together the way a caller actually drives a session.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::io::AsyncRead;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::RenderNodeConfig;
use crate::connection::{ConnEvent, Connection};
use crate::error::Result;
use crate::handshake;
use crate::ids::{SessionId, TaskId};
use crate::node::{NodeEvent, NodeIdentity, NodeState};
use crate::protocol::{ClientRequest, Compression, ServerEvent, ServerReply};
use crate::sync;
use crate::task::{self, BatchOutcome, PeekOutcome, RenderOutcome, TaskCancellation};
use tokio_util::sync::CancellationToken;

/// One client session against one remote render node. Cheap to clone
/// (everything inside is `Arc`-backed); clones share the same underlying
/// connection and state.
#[derive(Clone)]
pub struct RenderNode {
    state: Arc<NodeState>,
    conn: Arc<Connection>,
    config: RenderNodeConfig,
    cancellation: Arc<TaskCancellation>,
    dispatcher: Arc<StdMutex<Option<JoinHandle<()>>>>,
}

impl RenderNode {
    pub fn new(identity: NodeIdentity, config: RenderNodeConfig) -> Self {
        let state = Arc::new(NodeState::new(identity.clone(), config.console_lines));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Connection::new(identity.address, identity.mac, events_tx));
        let dispatcher = spawn_dispatcher(state.clone(), events_rx);
        RenderNode {
            state,
            conn,
            config,
            cancellation: Arc::new(TaskCancellation::new()),
            dispatcher: Arc::new(StdMutex::new(Some(dispatcher))),
        }
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.state.subscribe()
    }

    /// Opens the transport (a no-op if already connected — see
    /// [`Connection::connect`]) and runs the protocol handshake.
    pub async fn connect(&self) -> Result<()> {
        self.conn.connect().await?;
        let info = match handshake::handshake(&self.conn, &self.state.pass()).await {
            Ok(info) => info,
            Err(e) => {
                self.conn.disconnect().await;
                return Err(e);
            }
        };
        self.state.set_computer_info(info.name, info.os, info.cores);
        self.state.set_connected(true);
        self.state.clear_exception();
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.conn.disconnect().await;
    }

    pub fn connected(&self) -> bool {
        self.conn.is_connected()
    }

    pub async fn prepare(&self, version: &str) -> Result<bool> {
        let cancel = CancellationToken::new();
        let _activity = crate::node::ActivityGuard::enter(&self.state, "Preparing..", -1.0);
        let reply = self
            .conn
            .send_request(
                ClientRequest::Prepare {
                    version: version.to_string(),
                },
                &cancel,
            )
            .await?;
        match reply {
            ServerReply::Prepare { success } => {
                if success {
                    self.state.record_available_version(version);
                    self.state.set_is_prepared(true);
                }
                Ok(success)
            }
            other => Err(self.unexpected_reply("Prepare", &other).await),
        }
    }

    pub async fn is_version_available(&self, version: &str) -> Result<bool> {
        let cancel = CancellationToken::new();
        let reply = self
            .conn
            .send_request(
                ClientRequest::IsVersionAvailable {
                    version: version.to_string(),
                },
                &cancel,
            )
            .await?;
        match reply {
            ServerReply::Bool { success } => {
                if success {
                    self.state.record_available_version(version);
                }
                Ok(success)
            }
            other => Err(self.unexpected_reply("IsVersionAvailable", &other).await),
        }
    }

    pub async fn is_busy(&self) -> Result<bool> {
        let cancel = CancellationToken::new();
        let reply = self.conn.send_request(ClientRequest::IsBusy, &cancel).await?;
        match reply {
            ServerReply::IsBusy { is_busy } => Ok(is_busy),
            other => Err(self.unexpected_reply("IsBusy", &other).await),
        }
    }

    pub async fn sync_file<R: AsyncRead + Unpin>(
        &self,
        session_id: SessionId,
        file_id: i64,
        reader: R,
        total_len: Option<u64>,
        compression: Compression,
    ) -> Result<()> {
        sync::sync_file(&self.conn, &self.state, session_id, file_id, reader, total_len, compression).await
    }

    pub async fn sync_network_file(
        &self,
        session_id: SessionId,
        file_id: i64,
        windows_path: Option<String>,
        linux_path: Option<String>,
        mac_path: Option<String>,
    ) -> Result<()> {
        sync::sync_network_file(
            &self.conn,
            &self.state,
            session_id,
            file_id,
            windows_path,
            linux_path,
            mac_path,
        )
        .await
    }

    pub async fn render(&self, session_id: SessionId, task_id: TaskId, frame: i32) -> Result<RenderOutcome> {
        task::render(
            &self.conn,
            &self.state,
            &self.cancellation,
            self.config.recovery,
            self.config.render_retry_policy,
            session_id,
            task_id,
            frame,
        )
        .await
    }

    pub async fn render_batch(
        &self,
        session_id: SessionId,
        task_id: TaskId,
        frames: Vec<i32>,
    ) -> Result<BatchOutcome> {
        task::render_batch(
            &self.conn,
            &self.state,
            &self.cancellation,
            self.config.recovery,
            self.config.batch_retry_policy,
            session_id,
            task_id,
            frames,
        )
        .await
    }

    pub async fn peek(&self, session_id: SessionId, task_id: TaskId) -> Result<PeekOutcome> {
        task::peek(
            &self.conn,
            &self.state,
            &self.cancellation,
            self.config.recovery,
            self.config.render_retry_policy,
            session_id,
            task_id,
        )
        .await
    }

    pub async fn cancel_render(&self, session_id: SessionId) {
        task::cancel_render(&self.conn, &self.state, &self.cancellation, session_id).await
    }

    /// A reply of the wrong type is a protocol error that terminates the
    /// Connection (spec.md §4.A, §7): id correlation on this transport can no
    /// longer be trusted, so the connection is torn down before the error is
    /// handed back to the caller.
    async fn unexpected_reply(&self, expected: &str, got: &ServerReply) -> crate::error::RenderNodeError {
        self.conn.disconnect().await;
        crate::error::RenderNodeError::ProtocolError(format!("expected reply to {expected}, got {got:?}"))
    }
}

impl Drop for RenderNode {
    fn drop(&mut self) {
        if Arc::strong_count(&self.conn) == 1 {
            if let Ok(mut guard) = self.dispatcher.lock() {
                if let Some(handle) = guard.take() {
                    handle.abort();
                }
            }
        }
    }
}

/// Drains `Connection`'s event channel, folding connect/disconnect/server
/// events into `NodeState`. This is the "handlers update D and forward
/// typed events to F" arrow in the data-flow diagram — F doesn't need to
/// watch the channel itself since it reads `current_task_id` back out of D.
fn spawn_dispatcher(
    state: Arc<NodeState>,
    mut events_rx: mpsc::UnboundedReceiver<ConnEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                ConnEvent::Connected => {
                    state.set_connected(true);
                }
                ConnEvent::Disconnected { is_error, reason } => {
                    state.on_disconnected();
                    if is_error {
                        state.set_exception(reason);
                    }
                }
                ConnEvent::Server(ServerEvent::RenderInfo {
                    task_id,
                    tiles_finished,
                    tiles_total,
                }) => {
                    if state.current_task_id().as_ref() == Some(&task_id) {
                        let pct = if tiles_total > 0 {
                            tiles_finished as f64 / tiles_total as f64 * 100.0
                        } else {
                            0.0
                        };
                        state.set_activity(format!("Rendering ({tiles_finished}/{tiles_total})"), pct);
                    }
                }
                ConnEvent::Server(ServerEvent::RenderBatchResult {
                    task_id,
                    frame,
                    success,
                }) => {
                    debug!(%task_id, frame, success, "batch frame result");
                    state.emit_batch_result(task_id, frame, success);
                }
                ConnEvent::Server(ServerEvent::ActivityRequest { activity, progress }) => {
                    state.set_activity(activity, progress);
                }
                ConnEvent::Server(ServerEvent::ConsoleActivity { output }) => {
                    state.push_console_line(output);
                }
                ConnEvent::Server(ServerEvent::Disconnected { is_error, reason }) => {
                    state.on_disconnected();
                    if is_error {
                        state.set_exception(reason);
                    }
                }
            }
        }
    })
}
