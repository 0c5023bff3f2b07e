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

//! The execution core of the world: the task-local execution context, the
//! object factory, the background verb task queue, and the per-user message
//! publisher. Persistence and transport are collaborators behind the
//! `WorldState`, `Session`, and `MessageBroker` contracts in `moo-common`.

pub mod config;
pub mod factory;
pub mod messaging;
pub mod task_context;
pub mod tasks;

pub use config::Config;
pub use factory::{CreateSpec, OwnerSpec, create_object};
pub use messaging::{MESSAGE_LAYOUT_VERSION, MessageEnvelope, MessagePublisher};
pub use task_context::{ContextGuard, Parser, TaskContext};
pub use tasks::{Task, TaskResult, VerbRef, task_q::TaskQ};
