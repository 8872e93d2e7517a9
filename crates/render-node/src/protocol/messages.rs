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

//! Typed request/reply payloads exchanged with a render node daemon.
//!
//! Wire compatibility is whatever `bincode` gives us for these shapes; there
//! is no separate schema compiler (the renders-farm wire format is simple
//! enough not to need one).

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, TaskId};

/// The protocol version this client implements. Bumped whenever a
/// request/reply shape changes in a way that isn't backward compatible.
pub const CLIENT_PROTOCOL_VERSION: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct ClientVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

/// Compute device a node renders with. Opaque to the core: forwarded to the
/// server verbatim, never interpreted locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum RenderType {
    #[default]
    Cpu,
    Cuda,
    Optix,
    Hip,
    Metal,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum Compression {
    None,
    Zip,
}

/// Every message a client can send to a node.
#[derive(Debug, Clone, Encode, Decode)]
pub enum ClientRequest {
    CheckProtocol {
        client_version: ClientVersion,
        protocol_version: u32,
    },
    Auth {
        pass: String,
    },
    ComputerInfo,
    Prepare {
        version: String,
    },
    IsVersionAvailable {
        version: String,
    },
    SyncStart {
        session_id: SessionId,
        file_id: i64,
        compression: Compression,
    },
    SyncUpload {
        upload_id: u64,
        data: Vec<u8>,
    },
    SyncComplete {
        upload_id: u64,
    },
    SyncNetwork {
        session_id: SessionId,
        file_id: i64,
        windows_path: Option<String>,
        linux_path: Option<String>,
        mac_path: Option<String>,
    },
    CheckSync {
        session_id: SessionId,
        file_id: i64,
    },
    Render {
        task_id: TaskId,
        session_id: SessionId,
        frame: i32,
    },
    RenderBatch {
        task_id: TaskId,
        session_id: SessionId,
        frames: Vec<i32>,
    },
    BlenderPeek {
        task_id: TaskId,
        session_id: SessionId,
    },
    IsBusy,
    /// Oneway: no reply is awaited for this request.
    CancelRender {
        session_id: SessionId,
    },
    Recover {
        session_ids: Vec<SessionId>,
    },
}

impl ClientRequest {
    /// Requests sent without waiting for a matching reply.
    pub fn is_oneway(&self) -> bool {
        matches!(self, ClientRequest::CancelRender { .. })
    }
}

/// Every reply a node can send back, keyed to its request by correlation id.
#[derive(Debug, Clone, Encode, Decode)]
pub enum ServerReply {
    CheckProtocol {
        protocol_version: u32,
        require_auth: bool,
    },
    Auth {
        is_authenticated: bool,
    },
    ComputerInfo {
        name: String,
        os: String,
        cores: i32,
    },
    Prepare {
        success: bool,
    },
    Bool {
        success: bool,
    },
    Sync {
        success: bool,
        same_file: bool,
        upload_id: u64,
        message: String,
    },
    BoolMessage {
        success: bool,
        message: String,
    },
    Ack,
    Render {
        task_id: TaskId,
        pixels: f64,
        render_ms: f64,
    },
    RenderBatch {
        task_id: TaskId,
        completed_frames: Vec<i32>,
    },
    BlenderPeek {
        task_id: TaskId,
        resolution_x: i32,
        resolution_y: i32,
        frame_start: i32,
        frame_end: i32,
    },
    IsBusy {
        is_busy: bool,
    },
    Recover {
        success: bool,
        message: String,
    },
}
