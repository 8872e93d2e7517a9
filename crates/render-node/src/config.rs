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

//! Tunable knobs that the abstract spec left as constants. Kept as explicit
//! configuration rather than hard-coded so the render/batch retry asymmetry
//! (see [`RetryPolicy`]) is a documented choice, not a magic number buried in
//! [`crate::task`].

use std::time::Duration;

/// How many outer disconnect-and-recover cycles a task kind tolerates before
/// giving up with [`crate::error::RenderNodeError::RecoverExhausted`].
/// `None` means unbounded: the task keeps recovering across disconnects
/// forever, one `connect_recover` per observed drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub const fn bounded(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts: Some(max_attempts),
        }
    }

    pub const fn unbounded() -> Self {
        RetryPolicy { max_attempts: None }
    }
}

/// How `connect_recover` paces reconnect attempts.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryConfig {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        RecoveryConfig {
            attempts: 5,
            interval: Duration::from_millis(1000),
        }
    }
}

/// Size of each chunk written during a direct file upload. Fixed by the wire
/// protocol at 10 MiB; the last chunk of a file is simply shorter.
pub const CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Maximum number of lines retained in a node's remote console buffer
/// before the oldest lines are evicted.
pub const DEFAULT_CONSOLE_LINES: usize = 2000;

/// Knobs for one [`crate::node::Node`]. Cheap to clone; shared by value.
#[derive(Debug, Clone, Copy)]
pub struct RenderNodeConfig {
    /// Retry policy for `render` and `peek`: bounded, per §4.F / Open Questions.
    pub render_retry_policy: RetryPolicy,
    /// Retry policy for `render_batch`: deliberately unbounded outer attempts
    /// (a batch may legitimately survive several reconnect flaps) — preserved
    /// from the source rather than unified with `render_retry_policy`.
    pub batch_retry_policy: RetryPolicy,
    pub recovery: RecoveryConfig,
    pub console_lines: usize,
}

impl Default for RenderNodeConfig {
    fn default() -> Self {
        RenderNodeConfig {
            render_retry_policy: RetryPolicy::bounded(3),
            batch_retry_policy: RetryPolicy::unbounded(),
            recovery: RecoveryConfig::default(),
            console_lines: DEFAULT_CONSOLE_LINES,
        }
    }
}
