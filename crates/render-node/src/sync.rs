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

//! File-sync pipeline: direct chunked upload and network-share pointer,
//! each terminated by the server's `CheckSync` verification probe.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::config::CHUNK_SIZE;
use crate::connection::Connection;
use crate::error::{RenderNodeError, Result};
use crate::ids::SessionId;
use crate::node::{ActivityGuard, NodeState};
use crate::protocol::{ClientRequest, Compression, ServerReply};

/// Uploads `reader`'s contents to the node in fixed 10 MiB chunks, then
/// verifies the result. `total_len`, when known, drives the `"Syncing
/// (P%)"` activity label; when `None` (a streaming source of unknown
/// length), activity reads `"Syncing"` with indeterminate progress.
pub async fn sync_file<R: AsyncRead + Unpin>(
    conn: &Connection,
    state: &NodeState,
    session_id: SessionId,
    file_id: i64,
    mut reader: R,
    total_len: Option<u64>,
    compression: Compression,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let _activity = ActivityGuard::enter(state, "Syncing", -1.0);

    let reply = conn
        .send_request(
            ClientRequest::SyncStart {
                session_id: session_id.clone(),
                file_id,
                compression,
            },
            &cancel,
        )
        .await?;
    let upload_id = match reply {
        ServerReply::Sync {
            success: false,
            message,
            ..
        } => return Err(RenderNodeError::SyncFailed(message)),
        ServerReply::Sync {
            success: true,
            same_file: true,
            ..
        } => {
            state.record_verified_sync(session_id, file_id);
            return Ok(());
        }
        ServerReply::Sync {
            success: true,
            same_file: false,
            upload_id,
            ..
        } => upload_id,
        other => return Err(unexpected_reply(conn, "SyncStart", &other).await),
    };

    let mut written: u64 = 0;
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let mut filled = 0usize;
        while filled < chunk.len() {
            let n = reader.read(&mut chunk[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }

        let reply = conn
            .send_request(
                ClientRequest::SyncUpload {
                    upload_id,
                    data: chunk[..filled].to_vec(),
                },
                &cancel,
            )
            .await?;
        match reply {
            ServerReply::BoolMessage { success: true, .. } => {}
            ServerReply::BoolMessage { success: false, message } => {
                return Err(RenderNodeError::SyncFailed(message));
            }
            other => return Err(unexpected_reply(conn, "SyncUpload", &other).await),
        }

        written += filled as u64;
        match total_len {
            Some(total) if total > 0 => {
                let pct = (written as f64 / total as f64 * 100.0 * 10.0).round() / 10.0;
                state.set_activity(format!("Syncing ({pct:.1}%)"), pct);
            }
            _ => state.set_activity("Syncing", -1.0),
        }

        if filled < chunk.len() {
            break;
        }
    }

    let reply = conn
        .send_request(ClientRequest::SyncComplete { upload_id }, &cancel)
        .await?;
    match reply {
        ServerReply::Ack => {}
        other => return Err(unexpected_reply(conn, "SyncComplete", &other).await),
    }

    verify_sync(conn, state, session_id, file_id, &cancel).await
}

/// Single-request network-share sync: the node is told where to find the
/// file itself (one path per OS) rather than receiving it byte-for-byte.
pub async fn sync_network_file(
    conn: &Connection,
    state: &NodeState,
    session_id: SessionId,
    file_id: i64,
    windows_path: Option<String>,
    linux_path: Option<String>,
    mac_path: Option<String>,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let _activity = ActivityGuard::enter(state, "Syncing", -1.0);

    let reply = conn
        .send_request(
            ClientRequest::SyncNetwork {
                session_id: session_id.clone(),
                file_id,
                windows_path,
                linux_path,
                mac_path,
            },
            &cancel,
        )
        .await?;
    match reply {
        ServerReply::Sync {
            success: false,
            message,
            ..
        } => Err(RenderNodeError::SyncFailed(message)),
        ServerReply::Sync {
            success: true,
            same_file: true,
            ..
        } => {
            state.record_verified_sync(session_id, file_id);
            Ok(())
        }
        ServerReply::Sync {
            success: true,
            same_file: false,
            ..
        } => verify_sync(conn, state, session_id, file_id, &cancel).await,
        other => Err(unexpected_reply(conn, "SyncNetwork", &other).await),
    }
}

async fn verify_sync(
    conn: &Connection,
    state: &NodeState,
    session_id: SessionId,
    file_id: i64,
    cancel: &CancellationToken,
) -> Result<()> {
    let reply = conn
        .send_request(
            ClientRequest::CheckSync {
                session_id: session_id.clone(),
                file_id,
            },
            cancel,
        )
        .await?;
    match reply {
        ServerReply::Bool { success: true } => {
            state.record_verified_sync(session_id, file_id);
            Ok(())
        }
        ServerReply::Bool { success: false } => {
            state.set_session_synced(session_id, false);
            Err(RenderNodeError::SyncFailed(
                "server could not verify the synced file".to_string(),
            ))
        }
        other => Err(unexpected_reply(conn, "CheckSync", &other).await),
    }
}

/// A reply of the wrong type is a protocol error that terminates the
/// Connection (spec.md §4.A, §7): the caller can no longer trust id
/// correlation on this transport, so the connection is torn down before the
/// error is handed back.
async fn unexpected_reply(conn: &Connection, expected: &str, got: &ServerReply) -> RenderNodeError {
    conn.disconnect().await;
    RenderNodeError::ProtocolError(format!("expected reply to {expected}, got {got:?}"))
}
