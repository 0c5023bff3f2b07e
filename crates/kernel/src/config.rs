// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use serde::{Deserialize, Serialize};

/// Config for the execution core.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Number of worker threads servicing the background verb task queue.
    pub workers: usize,
    /// Bound on the task queue. Submissions past this block the submitter
    /// until a worker drains, rather than growing without limit.
    pub queue_depth: usize,
    /// Name of the direct exchange user messages are published through.
    pub exchange: String,
}

impl Default for Config {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get().min(8))
            .unwrap_or(4);
        Self {
            workers,
            queue_depth: 256,
            exchange: "moo".to_string(),
        }
    }
}
