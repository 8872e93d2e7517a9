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

//! Client-side coordination core for a single remote Blender render node:
//! protocol handshake, authentication, chunked file sync, render-task
//! dispatch, and automatic reconnect-and-resume.
//!
//! [`RenderNode`] is the entry point. Everything else in this crate exists
//! to make that type correct under disconnects: [`connection`] owns the
//! transport and the reply-correlation table, [`node`] is the observable
//! state a UI layer would subscribe to, [`sync`] and [`task`] are the two
//! operations that actually move data, and [`recovery`] is what glues a
//! broken connection back together mid-task.

pub mod config;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod ids;
pub mod node;
pub mod protocol;
pub mod recovery;
pub mod render_node;
pub mod settings;
pub mod sync;
pub mod task;
pub mod wol;

pub use config::{RecoveryConfig, RenderNodeConfig, RetryPolicy};
pub use error::{RenderNodeError, Result};
pub use ids::{SessionId, TaskId};
pub use node::{NodeEvent, NodeIdentity, NodeState};
pub use render_node::RenderNode;
