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

//! An in-process mock node daemon, speaking exactly the wire protocol
//! `render_node::protocol` defines, used to exercise the client's
//! handshake/sync/render/recovery paths end to end without a real Blender
//! farm node.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use render_node::protocol::{
    read_frame, write_frame, ClientRequest, Compression, Frame, ServerEvent, ServerReply, WireMessage,
    CLIENT_PROTOCOL_VERSION,
};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What one connection *attempt* to the mock server should do. A fresh
/// `ConnectionPlan` is consumed per accepted TCP connection, so a test can
/// give the Nth reconnect different behavior than the first (e.g. "drop
/// right after the render request" then "behave normally").
#[derive(Clone)]
pub struct ConnectionPlan {
    pub require_auth: bool,
    pub auth_ok: bool,
    /// Close the socket (no reply) the first time a request of this variant
    /// name is seen, simulating a mid-operation transport drop.
    pub drop_on_request: Option<&'static str>,
    pub protocol_version: u32,
    /// When set, `SyncStart` replies `same_file: true` and skips the upload
    /// round-trip entirely — flip this from a test after a first sync
    /// completes to exercise the fast path (§8 scenario 5).
    pub sync_same_file: Arc<AtomicBool>,
    /// Counts `SyncUpload` requests seen across every connection sharing
    /// this plan, so a test can assert the `same_file` fast path sent zero.
    pub upload_count: Arc<AtomicUsize>,
}

impl Default for ConnectionPlan {
    fn default() -> Self {
        ConnectionPlan {
            require_auth: false,
            auth_ok: true,
            drop_on_request: None,
            protocol_version: CLIENT_PROTOCOL_VERSION,
            sync_same_file: Arc::new(AtomicBool::new(false)),
            upload_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl MockServer {
    /// `plans` is consumed one-per-accepted-connection, in order; once
    /// exhausted, further connections reuse the last plan (or the default,
    /// "everything succeeds" plan, if `plans` was empty).
    pub async fn start(plans: Vec<ConnectionPlan>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let attempt = Arc::new(AtomicUsize::new(0));
        let plans = Arc::new(plans);

        let accept_task = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                let idx = attempt.fetch_add(1, Ordering::SeqCst);
                let plan = plans
                    .get(idx)
                    .cloned()
                    .or_else(|| plans.last().cloned())
                    .unwrap_or_default();
                tokio::spawn(async move {
                    let _ = drive_connection(stream, plan).await;
                });
            }
        });

        MockServer { addr, accept_task }
    }

    pub fn stop(self) {
        self.accept_task.abort();
    }
}

fn request_name(req: &ClientRequest) -> &'static str {
    match req {
        ClientRequest::CheckProtocol { .. } => "CheckProtocol",
        ClientRequest::Auth { .. } => "Auth",
        ClientRequest::ComputerInfo => "ComputerInfo",
        ClientRequest::Prepare { .. } => "Prepare",
        ClientRequest::IsVersionAvailable { .. } => "IsVersionAvailable",
        ClientRequest::SyncStart { .. } => "SyncStart",
        ClientRequest::SyncUpload { .. } => "SyncUpload",
        ClientRequest::SyncComplete { .. } => "SyncComplete",
        ClientRequest::SyncNetwork { .. } => "SyncNetwork",
        ClientRequest::CheckSync { .. } => "CheckSync",
        ClientRequest::Render { .. } => "Render",
        ClientRequest::RenderBatch { .. } => "RenderBatch",
        ClientRequest::BlenderPeek { .. } => "BlenderPeek",
        ClientRequest::IsBusy => "IsBusy",
        ClientRequest::CancelRender { .. } => "CancelRender",
        ClientRequest::Recover { .. } => "Recover",
    }
}

async fn drive_connection(mut stream: TcpStream, plan: ConnectionPlan) -> std::io::Result<()> {
    loop {
        let frame = match read_frame(&mut stream).await {
            Ok(f) => f,
            Err(_) => return Ok(()),
        };
        let WireMessage::Request(req) = frame.message else {
            continue;
        };

        if plan.drop_on_request == Some(request_name(&req)) {
            return Ok(());
        }

        if req.is_oneway() {
            continue;
        }

        let reply = match req {
            ClientRequest::CheckProtocol { .. } => ServerReply::CheckProtocol {
                protocol_version: plan.protocol_version,
                require_auth: plan.require_auth,
            },
            ClientRequest::Auth { .. } => ServerReply::Auth {
                is_authenticated: plan.auth_ok,
            },
            ClientRequest::ComputerInfo => ServerReply::ComputerInfo {
                name: "mock-node".to_string(),
                os: "linux".to_string(),
                cores: 16,
            },
            ClientRequest::Prepare { .. } => ServerReply::Prepare { success: true },
            ClientRequest::IsVersionAvailable { .. } => ServerReply::Bool { success: true },
            ClientRequest::SyncStart { .. } => ServerReply::Sync {
                success: true,
                same_file: plan.sync_same_file.load(Ordering::SeqCst),
                upload_id: 1,
                message: String::new(),
            },
            ClientRequest::SyncUpload { .. } => {
                plan.upload_count.fetch_add(1, Ordering::SeqCst);
                ServerReply::BoolMessage {
                    success: true,
                    message: String::new(),
                }
            }
            ClientRequest::SyncComplete { .. } => ServerReply::Ack,
            ClientRequest::SyncNetwork { .. } => ServerReply::Sync {
                success: true,
                same_file: false,
                upload_id: 0,
                message: String::new(),
            },
            ClientRequest::CheckSync { .. } => ServerReply::Bool { success: true },
            ClientRequest::Render { task_id, .. } => {
                write_frame(
                    &mut stream,
                    &Frame::event(ServerEvent::RenderInfo {
                        task_id: task_id.clone(),
                        tiles_finished: 1,
                        tiles_total: 4,
                    }),
                )
                .await?;
                write_frame(
                    &mut stream,
                    &Frame::event(ServerEvent::RenderInfo {
                        task_id: task_id.clone(),
                        tiles_finished: 4,
                        tiles_total: 4,
                    }),
                )
                .await?;
                ServerReply::Render {
                    task_id,
                    pixels: 2_073_600.0,
                    render_ms: 1000.0,
                }
            }
            ClientRequest::RenderBatch { task_id, frames, .. } => ServerReply::RenderBatch {
                task_id,
                completed_frames: frames,
            },
            ClientRequest::BlenderPeek { task_id, .. } => ServerReply::BlenderPeek {
                task_id,
                resolution_x: 1920,
                resolution_y: 1080,
                frame_start: 1,
                frame_end: 10,
            },
            ClientRequest::IsBusy => ServerReply::IsBusy { is_busy: false },
            ClientRequest::Recover { .. } => ServerReply::Recover {
                success: true,
                message: String::new(),
            },
            ClientRequest::CancelRender { .. } => unreachable!("oneway filtered above"),
        };

        write_frame(&mut stream, &Frame::reply(frame.id, reply)).await?;
    }
}

/// A plain in-memory buffer implementing `tokio::io::AsyncRead`, standing in
/// for a real file handle in sync tests — `std::io::Cursor` only implements
/// the synchronous `std::io::Read`, not tokio's trait.
pub struct InMemoryReader {
    data: Vec<u8>,
    pos: usize,
}

impl AsyncRead for InMemoryReader {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// Convenience: a 1 MiB in-memory reader for sync tests, avoiding a real
/// temp file when the content doesn't matter.
pub fn one_mib_of(byte: u8) -> InMemoryReader {
    InMemoryReader {
        data: vec![byte; 1024 * 1024],
        pos: 0,
    }
}

pub fn default_compression() -> Compression {
    Compression::None
}
