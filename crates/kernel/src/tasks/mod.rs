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

//! Asynchronous verb invocation: tasks, their results, and the worker queue
//! that executes them off the submitting thread.

use std::collections::HashMap;

use moo_common::tasks::TaskId;
use moo_var::{Obj, Var};

pub mod task_q;

/// A verb named by its holder and its name, resolvable at execution time
/// rather than at submission time.
#[derive(Clone, Debug, PartialEq)]
pub struct VerbRef {
    pub obj: Obj,
    pub name: String,
}

impl VerbRef {
    pub fn new(obj: Obj, name: impl Into<String>) -> Self {
        Self {
            obj,
            name: name.into(),
        }
    }
}

/// One queued unit of work: a verb to run, on whose behalf, with what
/// arguments, and optionally a verb to chain after success.
#[derive(Clone, Debug)]
pub struct Task {
    pub task_id: TaskId,
    /// Propagated into the execution context of the task, so the verb sees
    /// the submitter as its caller even though it runs on another thread.
    pub caller: Option<Obj>,
    pub verb: VerbRef,
    pub args: Vec<Var>,
    pub kwargs: HashMap<String, Var>,
    /// Chained after the verb completes without error, with the same caller
    /// and no arguments. Never run when the verb fails.
    pub callback: Option<VerbRef>,
}

/// Terminal outcome of a task.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskResult {
    Success(Var),
    Failure(moo_var::Error),
}
