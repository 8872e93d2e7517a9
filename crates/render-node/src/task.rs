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

//! Serializes render/peek requests onto a node, attaches a cancellation
//! handle, and retries transparently across disconnects up to a bounded
//! budget per [`crate::config::RetryPolicy`].

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::config::{RecoveryConfig, RetryPolicy};
use crate::connection::Connection;
use crate::error::{RenderNodeError, Result};
use crate::ids::{SessionId, TaskId};
use crate::node::{ActivityGuard, NodeState};
use crate::protocol::{ClientRequest, ServerReply};
use crate::recovery::connect_recover;

/// Holds the cancellation token for whichever render/peek is currently in
/// flight on a node, so `cancel_render` (called from outside the task's own
/// call stack) has something to trigger.
#[derive(Default)]
pub struct TaskCancellation {
    current: Mutex<Option<CancellationToken>>,
}

impl TaskCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock().unwrap() = Some(token.clone());
        token
    }

    fn clear(&self) {
        *self.current.lock().unwrap() = None;
    }

    /// Triggers whatever cancellation token is currently active, if any.
    /// Returns whether a task was actually in flight to cancel.
    pub fn cancel(&self) -> bool {
        match self.current.lock().unwrap().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

pub struct RenderOutcome {
    pub pixels: f64,
    pub render_ms: f64,
}

pub struct BatchOutcome {
    pub completed_frames: Vec<i32>,
}

pub struct PeekOutcome {
    pub resolution_x: i32,
    pub resolution_y: i32,
    pub frame_start: i32,
    pub frame_end: i32,
}

/// The send-with-recovery loop shared by `render`, `render_batch`, and
/// `peek` (§4.F): send, and on a `Disconnected` error run `connect_recover`
/// before trying again, up to `retry_policy`'s budget.
async fn send_with_recovery(
    conn: &Connection,
    state: &NodeState,
    recovery_cfg: RecoveryConfig,
    retry_policy: RetryPolicy,
    session_id: &SessionId,
    cancel: &CancellationToken,
    mut build_request: impl FnMut() -> ClientRequest,
) -> Result<ServerReply> {
    let mut attempts: u32 = 0;
    loop {
        match conn.send_request(build_request(), cancel).await {
            Ok(reply) => return Ok(reply),
            Err(RenderNodeError::Disconnected) => {
                attempts += 1;
                if let Some(max) = retry_policy.max_attempts {
                    if attempts > max {
                        return Err(RenderNodeError::RecoverExhausted);
                    }
                }
                connect_recover(conn, state, recovery_cfg, std::slice::from_ref(session_id)).await?;
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}

pub async fn render(
    conn: &Connection,
    state: &NodeState,
    cancellation: &TaskCancellation,
    recovery_cfg: RecoveryConfig,
    retry_policy: RetryPolicy,
    session_id: SessionId,
    task_id: TaskId,
    frame: i32,
) -> Result<RenderOutcome> {
    state.try_start_task(task_id.clone())?;
    let _activity = ActivityGuard::enter(state, "Render Loading..", -1.0);
    let cancel = cancellation.start();

    let result = send_with_recovery(conn, state, recovery_cfg, retry_policy, &session_id, &cancel, || {
        ClientRequest::Render {
            task_id: task_id.clone(),
            session_id: session_id.clone(),
            frame,
        }
    })
    .await;

    cancellation.clear();
    state.finish_task();

    match result? {
        ServerReply::Render { pixels, render_ms, .. } => Ok(RenderOutcome { pixels, render_ms }),
        other => Err(unexpected_reply(conn, "Render", &other).await),
    }
}

pub async fn render_batch(
    conn: &Connection,
    state: &NodeState,
    cancellation: &TaskCancellation,
    recovery_cfg: RecoveryConfig,
    retry_policy: RetryPolicy,
    session_id: SessionId,
    task_id: TaskId,
    frames: Vec<i32>,
) -> Result<BatchOutcome> {
    state.try_start_task(task_id.clone())?;
    let _activity = ActivityGuard::enter(state, "Render Loading..", -1.0);
    let cancel = cancellation.start();

    let result = send_with_recovery(conn, state, recovery_cfg, retry_policy, &session_id, &cancel, || {
        ClientRequest::RenderBatch {
            task_id: task_id.clone(),
            session_id: session_id.clone(),
            frames: frames.clone(),
        }
    })
    .await;

    cancellation.clear();
    state.finish_task();

    match result? {
        ServerReply::RenderBatch { completed_frames, .. } => Ok(BatchOutcome { completed_frames }),
        other => Err(unexpected_reply(conn, "RenderBatch", &other).await),
    }
}

pub async fn peek(
    conn: &Connection,
    state: &NodeState,
    cancellation: &TaskCancellation,
    recovery_cfg: RecoveryConfig,
    retry_policy: RetryPolicy,
    session_id: SessionId,
    task_id: TaskId,
) -> Result<PeekOutcome> {
    state.try_start_task(task_id.clone())?;
    let _activity = ActivityGuard::enter(state, "Peeking..", -1.0);
    let cancel = cancellation.start();

    let result = send_with_recovery(conn, state, recovery_cfg, retry_policy, &session_id, &cancel, || {
        ClientRequest::BlenderPeek {
            task_id: task_id.clone(),
            session_id: session_id.clone(),
        }
    })
    .await;

    cancellation.clear();
    state.finish_task();

    match result? {
        ServerReply::BlenderPeek {
            resolution_x,
            resolution_y,
            frame_start,
            frame_end,
            ..
        } => Ok(PeekOutcome {
            resolution_x,
            resolution_y,
            frame_start,
            frame_end,
        }),
        other => Err(unexpected_reply(conn, "BlenderPeek", &other).await),
    }
}

/// Triggers the in-flight task's cancellation token (if any) and sends a
/// best-effort `CancelRender` oneway. No attempt is made to rescind the
/// request on the server beyond this notice; the caller's own `.await` on
/// `render`/`peek` is what actually unwinds. Leaves `activity_progress` at
/// -1 (indeterminate) to signal the in-flight cancellation; the activity
/// label itself is cleared once the cancelled call actually returns.
pub async fn cancel_render(
    conn: &Connection,
    state: &NodeState,
    cancellation: &TaskCancellation,
    session_id: SessionId,
) {
    if cancellation.cancel() {
        state.set_activity(state.activity(), -1.0);
    }
    let _ = conn.send_oneway(ClientRequest::CancelRender { session_id }).await;
}

/// A reply of the wrong type is a protocol error that terminates the
/// Connection (spec.md §4.A, §7): the caller can no longer trust id
/// correlation on this transport, so the connection is torn down before the
/// error is handed back.
async fn unexpected_reply(conn: &Connection, expected: &str, got: &ServerReply) -> RenderNodeError {
    conn.disconnect().await;
    RenderNodeError::ProtocolError(format!("expected reply to {expected}, got {got:?}"))
}
