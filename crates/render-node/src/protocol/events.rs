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

//! Unsolicited, node-initiated messages. These never correlate to a pending
//! request; they arrive on the event side of the [`crate::connection::Connection`]
//! demultiplexer.

use bincode::{Decode, Encode};

use crate::ids::TaskId;

#[derive(Debug, Clone, Encode, Decode)]
pub enum ServerEvent {
    RenderInfo {
        task_id: TaskId,
        tiles_finished: u32,
        tiles_total: u32,
    },
    RenderBatchResult {
        task_id: TaskId,
        frame: i32,
        success: bool,
    },
    ActivityRequest {
        activity: String,
        progress: f64,
    },
    ConsoleActivity {
        output: String,
    },
    Disconnected {
        is_error: bool,
        reason: String,
    },
}
