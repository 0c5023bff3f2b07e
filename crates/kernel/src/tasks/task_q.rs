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

//! The background verb task queue: a bounded channel feeding a pool of named
//! worker threads. Each worker installs a fresh execution context frame
//! before running a verb, so concurrent tasks never see each other's caller
//! or arguments.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use ahash::AHasher;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::task_context::{ContextGuard, TaskContext};
use crate::tasks::{Task, TaskResult, VerbRef};
use moo_common::model::WorldState;
use moo_common::tasks::{NoopClientSession, SchedulerError, Session, SessionFactory, TaskId};
use moo_var::{E_INVARG, Obj, Var};

/// Completed-task results, keyed by task id, plus the condvar waiters park on.
struct ResultsTable {
    entries: Mutex<HashMap<TaskId, TaskResult, BuildHasherDefault<AHasher>>>,
    done: Condvar,
}

/// Handle on the worker pool. Submission is cheap; the queue is bounded, so
/// a full queue blocks the submitter until a worker drains.
pub struct TaskQ {
    sender: Mutex<Option<flume::Sender<Task>>>,
    results: Arc<ResultsTable>,
    next_id: AtomicUsize,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskQ {
    /// Spin up the worker pool against the given world state and session
    /// factory.
    pub fn new(
        config: &Config,
        world: Arc<dyn WorldState>,
        session_factory: Arc<dyn SessionFactory>,
    ) -> Result<Self, SchedulerError> {
        let (sender, receiver) = flume::bounded::<Task>(config.queue_depth);
        let results = Arc::new(ResultsTable {
            entries: Mutex::new(HashMap::default()),
            done: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(config.workers);
        for i in 0..config.workers {
            let receiver = receiver.clone();
            let world = world.clone();
            let session_factory = session_factory.clone();
            let results = results.clone();
            let handle = std::thread::Builder::new()
                .name(format!("moo-task-worker-{i}"))
                .spawn(move || worker_loop(receiver, world, session_factory, results))
                .map_err(|e| {
                    error!(error = %e, "could not spawn task worker");
                    SchedulerError::CouldNotStartTask
                })?;
            workers.push(handle);
        }

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            results,
            next_id: AtomicUsize::new(0),
            workers: Mutex::new(workers),
        })
    }

    /// Queue a verb for asynchronous execution and return its task id. The
    /// verb resolves on the worker, so a missing verb surfaces as the task's
    /// failure result, not here.
    pub fn invoke_verb(
        &self,
        caller: Option<Obj>,
        verb: VerbRef,
        args: Vec<Var>,
        kwargs: HashMap<String, Var>,
        callback: Option<VerbRef>,
    ) -> Result<TaskId, SchedulerError> {
        let task_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let task = Task {
            task_id,
            caller,
            verb,
            args,
            kwargs,
            callback,
        };
        let sender = self.sender.lock().unwrap();
        let Some(sender) = sender.as_ref() else {
            return Err(SchedulerError::SchedulerNotResponding);
        };
        sender
            .send(task)
            .map_err(|_| SchedulerError::CouldNotStartTask)?;
        Ok(task_id)
    }

    /// Block until the given task has a result, or the timeout lapses with
    /// `TaskNotFound`. The result is consumed by the first waiter to claim
    /// it.
    pub fn wait_for_task(
        &self,
        task_id: TaskId,
        timeout: Duration,
    ) -> Result<TaskResult, SchedulerError> {
        let deadline = Instant::now() + timeout;
        let mut entries = self.results.entries.lock().unwrap();
        loop {
            if let Some(result) = entries.remove(&task_id) {
                return Ok(result);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SchedulerError::TaskNotFound(task_id));
            }
            let (guard, _) = self
                .results
                .done
                .wait_timeout(entries, deadline - now)
                .unwrap();
            entries = guard;
        }
    }

    /// Stop accepting work, run the queue dry, and join the workers.
    /// Idempotent.
    pub fn shutdown(&self) {
        let Some(sender) = self.sender.lock().unwrap().take() else {
            return;
        };
        // Workers hold no senders; dropping the last one disconnects the
        // channel and they exit once the remaining queued tasks are drained.
        drop(sender);
        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for handle in workers {
            if handle.join().is_err() {
                warn!("task worker panicked during shutdown");
            }
        }
    }
}

impl Drop for TaskQ {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    receiver: flume::Receiver<Task>,
    world: Arc<dyn WorldState>,
    session_factory: Arc<dyn SessionFactory>,
    results: Arc<ResultsTable>,
) {
    while let Ok(task) = receiver.recv() {
        let task_id = task.task_id;
        let callback = task.callback.clone();
        let caller = task.caller;

        let result = execute_task(task, &world, &session_factory);
        let succeeded = matches!(result, TaskResult::Success(_));

        // Record before chaining: a waiter on the primary must never be held
        // up by its callback.
        {
            let mut entries = results.entries.lock().unwrap();
            entries.insert(task_id, result);
            results.done.notify_all();
        }

        if succeeded && let Some(callback) = callback {
            // Chained inline on the same worker, with the submitter's caller
            // and no arguments. Re-entering the bounded queue from a worker
            // can wedge the pool when the queue is full, and inline execution
            // keeps the verb-then-callback ordering for free. Nobody holds
            // the callback's id, so its outcome is logged, not recorded.
            let cb_task = Task {
                task_id,
                caller,
                verb: callback,
                args: vec![],
                kwargs: HashMap::new(),
                callback: None,
            };
            match execute_task(cb_task, &world, &session_factory) {
                TaskResult::Success(_) => debug!(task_id, "callback completed"),
                TaskResult::Failure(e) => warn!(task_id, error = %e, "callback failed"),
            }
        }
    }
}

/// Run one task under its own context frame. Never unwinds: a panicking verb
/// body is caught and reported as the task's failure.
fn execute_task(
    task: Task,
    world: &Arc<dyn WorldState>,
    session_factory: &Arc<dyn SessionFactory>,
) -> TaskResult {
    let session: Arc<dyn Session> = match &task.caller {
        Some(caller) => match session_factory.clone().mk_background_session(caller) {
            Ok(session) => session,
            Err(e) => {
                debug!(caller = %caller, error = %e, "no session for caller, output discarded");
                Arc::new(NoopClientSession::new())
            }
        },
        None => Arc::new(NoopClientSession::new()),
    };

    let resolved = match world.find_method_verb_on(&task.verb.obj, &task.verb.name) {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(task_id = task.task_id, verb = %verb_desc(&task.verb), error = %e,
                "could not resolve verb for task");
            return TaskResult::Failure(e.to_error());
        }
    };

    let _guard = ContextGuard::enter(TaskContext {
        caller: task.caller,
        session,
        args: task.args.clone(),
        kwargs: task.kwargs,
        parser: None,
        world: world.clone(),
    });

    let outcome = catch_unwind(AssertUnwindSafe(|| resolved.program.call(&task.args)));
    match outcome {
        Ok(Ok(value)) => TaskResult::Success(value),
        Ok(Err(e)) => TaskResult::Failure(e),
        Err(_) => {
            error!(task_id = task.task_id, verb = %verb_desc(&task.verb), "task panicked");
            TaskResult::Failure(E_INVARG.msg("task aborted"))
        }
    }
}

fn verb_desc(verb: &VerbRef) -> String {
    format!("{}:{}", verb.obj, verb.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moo_common::model::{ObjAttrs, VerbDef};
    use moo_db::MemDb;
    use moo_var::{Error, v_none, v_str};
    use pretty_assertions::assert_eq;

    const WAIT: Duration = Duration::from_secs(5);

    fn mk_world() -> Arc<dyn WorldState> {
        Arc::new(MemDb::new())
    }

    fn mk_q(world: &Arc<dyn WorldState>, workers: usize, queue_depth: usize) -> TaskQ {
        let config = Config {
            workers,
            queue_depth,
            ..Config::default()
        };
        TaskQ::new(&config, world.clone(), Arc::new(NoopClientSession::new())).unwrap()
    }

    fn add_chained_verbs(world: &Arc<dyn WorldState>, holder: &Obj) {
        world
            .add_verb(
                holder,
                VerbDef::new("work", *holder),
                Arc::new(|_args: &[Var]| -> Result<Var, Error> { Ok(v_str("done")) }),
            )
            .unwrap();
        world
            .add_verb(
                holder,
                VerbDef::new("on_done", *holder),
                Arc::new(|_args: &[Var]| -> Result<Var, Error> { Ok(v_none()) }),
            )
            .unwrap();
    }

    #[test]
    fn test_callback_outcome_not_retained() {
        let world = mk_world();
        let holder = world.create_object(ObjAttrs::new("holder")).unwrap();
        add_chained_verbs(&world, &holder);

        let q = mk_q(&world, 1, 8);
        let task_id = q
            .invoke_verb(
                None,
                VerbRef::new(holder, "work"),
                vec![],
                HashMap::new(),
                Some(VerbRef::new(holder, "on_done")),
            )
            .unwrap();
        assert_eq!(
            q.wait_for_task(task_id, WAIT).unwrap(),
            TaskResult::Success(v_str("done"))
        );
        q.shutdown();

        // The claimed primary was removed and the chained callback never
        // left an entry behind; the table does not grow over time.
        assert!(q.results.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn test_wait_timeout_is_task_not_found() {
        let world = mk_world();
        let q = mk_q(&world, 1, 8);
        assert_eq!(
            q.wait_for_task(12345, Duration::from_millis(10)),
            Err(SchedulerError::TaskNotFound(12345))
        );
    }
}
