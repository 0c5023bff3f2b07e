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

//! End-to-end exercises of the execution core: factory plus task queue plus
//! publisher, wired to the in-memory world state the way a host process
//! would wire the real ones.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use moo_common::messaging::{BrokerError, MessageBroker, UserId};
use moo_common::model::{
    OWNERSHIP_QUOTA_PROP, PropFlag, PropPerms, VerbDef, WorldState, WorldStateError,
};
use moo_common::tasks::{MockClientSession, NoopClientSession, Session};
use moo_db::MemDb;
use moo_kernel::{
    Config, ContextGuard, CreateSpec, MessageEnvelope, MessagePublisher, TaskContext, TaskQ,
    TaskResult, VerbRef, create_object, task_context,
};
use moo_var::{E_INVARG, Error, ErrorCode, Obj, Var, v_int, v_none, v_str};
use pretty_assertions::assert_eq;

const WAIT: Duration = Duration::from_secs(5);

fn mk_world() -> Arc<dyn WorldState> {
    Arc::new(MemDb::new())
}

fn mk_q(world: &Arc<dyn WorldState>, workers: usize) -> TaskQ {
    let config = Config {
        workers,
        ..Config::default()
    };
    TaskQ::new(&config, world.clone(), Arc::new(NoopClientSession::new())).unwrap()
}

fn enter_as(world: &Arc<dyn WorldState>, caller: Obj) -> ContextGuard {
    ContextGuard::enter(TaskContext {
        caller: Some(caller),
        session: Arc::new(NoopClientSession::new()),
        args: vec![],
        kwargs: HashMap::new(),
        parser: None,
        world: world.clone(),
    })
}

/// K players racing to create against a shared quota of N ends with exactly
/// N creations and a quota of zero, never negative.
#[test]
fn test_concurrent_creation_respects_quota() {
    let world = mk_world();
    let player = create_object(&world, CreateSpec::new("player")).unwrap();
    world
        .define_property(
            &player,
            OWNERSHIP_QUOTA_PROP,
            v_int(5),
            PropPerms::new(player, PropFlag::rw()),
        )
        .unwrap();

    let mut handles = vec![];
    for i in 0..8 {
        let world = world.clone();
        handles.push(std::thread::spawn(move || {
            let _guard = enter_as(&world, player);
            create_object(&world, CreateSpec::new(format!("thing-{i}")))
        }));
    }
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 5);
    for failed in outcomes.iter().filter(|r| r.is_err()) {
        assert_eq!(
            failed.clone().unwrap_err(),
            WorldStateError::QuotaExhausted(player)
        );
    }
    assert_eq!(
        world
            .retrieve_property(&player, OWNERSHIP_QUOTA_PROP)
            .unwrap()
            .0,
        v_int(0)
    );
}

/// The verb and its chained callback both run, in that order, and both see
/// the original submitter as their caller.
#[test]
fn test_callback_chains_after_success() {
    let world = mk_world();
    let player = create_object(&world, CreateSpec::new("player")).unwrap();
    let holder = create_object(&world, CreateSpec::new("holder")).unwrap();

    let events: Arc<Mutex<Vec<(String, Option<Obj>)>>> = Arc::new(Mutex::new(vec![]));
    let work_events = events.clone();
    world
        .add_verb(
            &holder,
            VerbDef::new("work", holder),
            Arc::new(move |_args: &[Var]| -> Result<Var, Error> {
                work_events
                    .lock()
                    .unwrap()
                    .push(("work".into(), task_context::current_caller()));
                Ok(v_str("did the work"))
            }),
        )
        .unwrap();
    let done_events = events.clone();
    world
        .add_verb(
            &holder,
            VerbDef::new("on_done", holder),
            Arc::new(move |args: &[Var]| -> Result<Var, Error> {
                assert!(args.is_empty());
                done_events
                    .lock()
                    .unwrap()
                    .push(("on_done".into(), task_context::current_caller()));
                Ok(v_none())
            }),
        )
        .unwrap();

    let q = mk_q(&world, 2);
    let task_id = q
        .invoke_verb(
            Some(player),
            VerbRef::new(holder, "work"),
            vec![v_int(1)],
            HashMap::new(),
            Some(VerbRef::new(holder, "on_done")),
        )
        .unwrap();

    let result = q.wait_for_task(task_id, WAIT).unwrap();
    assert_eq!(result, TaskResult::Success(v_str("did the work")));

    // Shutdown drains the queue, so the chained callback has run by the time
    // it returns.
    q.shutdown();
    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            ("work".into(), Some(player)),
            ("on_done".into(), Some(player)),
        ]
    );
}

/// A single worker over a single-slot queue, fed a chained task plus a
/// pending one: both tasks and the callback complete instead of the pool
/// wedging on its own chain.
#[test]
fn test_chaining_survives_full_queue() {
    let world = mk_world();
    let player = create_object(&world, CreateSpec::new("player")).unwrap();
    let holder = create_object(&world, CreateSpec::new("holder")).unwrap();

    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(vec![]));
    for name in ["work", "on_done", "other"] {
        let log = events.clone();
        world
            .add_verb(
                &holder,
                VerbDef::new(name, holder),
                Arc::new(move |_args: &[Var]| -> Result<Var, Error> {
                    log.lock().unwrap().push(name.to_string());
                    Ok(v_none())
                }),
            )
            .unwrap();
    }

    let config = Config {
        workers: 1,
        queue_depth: 1,
        ..Config::default()
    };
    let q = TaskQ::new(&config, world.clone(), Arc::new(NoopClientSession::new())).unwrap();

    let chained = q
        .invoke_verb(
            Some(player),
            VerbRef::new(holder, "work"),
            vec![],
            HashMap::new(),
            Some(VerbRef::new(holder, "on_done")),
        )
        .unwrap();
    let pending = q
        .invoke_verb(
            Some(player),
            VerbRef::new(holder, "other"),
            vec![],
            HashMap::new(),
            None,
        )
        .unwrap();

    assert!(q.wait_for_task(chained, WAIT).is_ok());
    assert!(q.wait_for_task(pending, WAIT).is_ok());
    q.shutdown();

    let events = events.lock().unwrap();
    assert!(events.contains(&"on_done".to_string()));
    // The callback never overtakes its own verb.
    let work_at = events.iter().position(|e| e == "work").unwrap();
    let done_at = events.iter().position(|e| e == "on_done").unwrap();
    assert!(work_at < done_at);
    assert_eq!(events.iter().filter(|e| *e == "other").count(), 1);
}

/// A verb's writes through its ambient session land in the submitter's
/// session buffer.
#[test]
fn test_verb_output_reaches_caller_session() {
    let world = mk_world();
    let player = create_object(&world, CreateSpec::new("player")).unwrap();
    let holder = create_object(&world, CreateSpec::new("holder")).unwrap();

    world
        .add_verb(
            &holder,
            VerbDef::new("greet", holder),
            Arc::new(move |_args: &[Var]| -> Result<Var, Error> {
                let who = task_context::current_caller().unwrap();
                task_context::current_session()
                    .present(&who, &v_str("welcome back"))
                    .unwrap();
                Ok(v_none())
            }),
        )
        .unwrap();

    let session = Arc::new(MockClientSession::new());
    let q = TaskQ::new(&Config::default(), world.clone(), session.clone()).unwrap();
    let task_id = q
        .invoke_verb(
            Some(player),
            VerbRef::new(holder, "greet"),
            vec![],
            HashMap::new(),
            None,
        )
        .unwrap();
    q.wait_for_task(task_id, WAIT).unwrap();
    q.shutdown();

    assert_eq!(session.received(), vec![(player, v_str("welcome back"))]);
}

#[test]
fn test_callback_skipped_on_failure() {
    let world = mk_world();
    let player = create_object(&world, CreateSpec::new("player")).unwrap();
    let holder = create_object(&world, CreateSpec::new("holder")).unwrap();

    let callback_ran = Arc::new(Mutex::new(false));
    world
        .add_verb(
            &holder,
            VerbDef::new("work", holder),
            Arc::new(|_args: &[Var]| -> Result<Var, Error> {
                Err(E_INVARG.msg("nope"))
            }),
        )
        .unwrap();
    let flag = callback_ran.clone();
    world
        .add_verb(
            &holder,
            VerbDef::new("on_done", holder),
            Arc::new(move |_args: &[Var]| -> Result<Var, Error> {
                *flag.lock().unwrap() = true;
                Ok(v_none())
            }),
        )
        .unwrap();

    let q = mk_q(&world, 2);
    let task_id = q
        .invoke_verb(
            Some(player),
            VerbRef::new(holder, "work"),
            vec![],
            HashMap::new(),
            Some(VerbRef::new(holder, "on_done")),
        )
        .unwrap();

    let result = q.wait_for_task(task_id, WAIT).unwrap();
    assert_eq!(result, TaskResult::Failure(E_INVARG.msg("nope")));

    q.shutdown();
    assert!(!*callback_ran.lock().unwrap());
}

/// A verb that does not resolve anywhere up the parent chain fails the task;
/// nothing panics and nothing hangs.
#[test]
fn test_unresolvable_verb_fails_task() {
    let world = mk_world();
    let holder = create_object(&world, CreateSpec::new("holder")).unwrap();

    let q = mk_q(&world, 1);
    let task_id = q
        .invoke_verb(
            None,
            VerbRef::new(holder, "nonesuch"),
            vec![],
            HashMap::new(),
            None,
        )
        .unwrap();

    match q.wait_for_task(task_id, WAIT).unwrap() {
        TaskResult::Failure(e) => assert_eq!(e.err_type, ErrorCode::E_VERBNF),
        other => panic!("expected failure, got {other:?}"),
    }
}

/// Tasks running concurrently on different workers each see their own
/// caller and arguments; frames never bleed across threads.
#[test]
fn test_context_isolation_across_workers() {
    let world = mk_world();
    let holder = create_object(&world, CreateSpec::new("holder")).unwrap();

    let seen: Arc<Mutex<Vec<(Option<Obj>, Vec<Var>)>>> = Arc::new(Mutex::new(vec![]));
    let seen_in_verb = seen.clone();
    world
        .add_verb(
            &holder,
            VerbDef::new("observe", holder),
            Arc::new(move |_args: &[Var]| -> Result<Var, Error> {
                seen_in_verb
                    .lock()
                    .unwrap()
                    .push((task_context::current_caller(), task_context::current_args()));
                Ok(v_none())
            }),
        )
        .unwrap();

    let q = mk_q(&world, 4);
    let mut task_ids = vec![];
    for i in 0..32i64 {
        let caller = Obj::mk_id(1000 + i as i32);
        let id = q
            .invoke_verb(
                Some(caller),
                VerbRef::new(holder, "observe"),
                vec![v_int(i)],
                HashMap::new(),
                None,
            )
            .unwrap();
        task_ids.push(id);
    }
    for id in task_ids {
        q.wait_for_task(id, WAIT).unwrap();
    }
    q.shutdown();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 32);
    // Whatever the interleaving, each observation pairs the caller with the
    // argument submitted alongside it.
    for (caller, args) in seen.iter() {
        let caller = caller.unwrap();
        assert_eq!(args, &vec![v_int((caller.id() - 1000) as i64)]);
    }
}

/// A panicking verb body fails its own task and leaves the worker alive for
/// the next one.
#[test]
fn test_panicking_verb_does_not_kill_worker() {
    let world = mk_world();
    let holder = create_object(&world, CreateSpec::new("holder")).unwrap();
    world
        .add_verb(
            &holder,
            VerbDef::new("explode", holder),
            Arc::new(|_args: &[Var]| -> Result<Var, Error> { panic!("kaboom") }),
        )
        .unwrap();
    world
        .add_verb(
            &holder,
            VerbDef::new("survive", holder),
            Arc::new(|_args: &[Var]| -> Result<Var, Error> { Ok(v_str("still here")) }),
        )
        .unwrap();

    let q = mk_q(&world, 1);
    let boom = q
        .invoke_verb(None, VerbRef::new(holder, "explode"), vec![], HashMap::new(), None)
        .unwrap();
    let after = q
        .invoke_verb(None, VerbRef::new(holder, "survive"), vec![], HashMap::new(), None)
        .unwrap();

    assert!(matches!(
        q.wait_for_task(boom, WAIT).unwrap(),
        TaskResult::Failure(_)
    ));
    assert_eq!(
        q.wait_for_task(after, WAIT).unwrap(),
        TaskResult::Success(v_str("still here"))
    );
}

struct CapturingBroker {
    published: Mutex<Vec<(String, String, Vec<u8>, bool)>>,
}

impl MessageBroker for CapturingBroker {
    fn publish(
        &self,
        queue: &str,
        exchange: &str,
        payload: &[u8],
        retry: bool,
    ) -> Result<(), BrokerError> {
        self.published.lock().unwrap().push((
            queue.to_string(),
            exchange.to_string(),
            payload.to_vec(),
            retry,
        ));
        Ok(())
    }
}

/// A verb running on a worker messages a user: exactly one envelope lands on
/// that user's queue, stamped with the verb's caller; messaging an unmapped
/// object delivers nothing.
#[test]
fn test_verb_messages_user_through_publisher() {
    let world = mk_world();
    let player = create_object(&world, CreateSpec::new("player")).unwrap();
    let npc = create_object(&world, CreateSpec::new("npc")).unwrap();
    let avatar = create_object(&world, CreateSpec::new("avatar")).unwrap();
    world.set_user_of(&avatar, UserId(17)).unwrap();

    let broker = Arc::new(CapturingBroker {
        published: Mutex::new(vec![]),
    });
    let publisher = Arc::new(MessagePublisher::new(world.clone(), broker.clone(), "moo"));

    let holder = create_object(&world, CreateSpec::new("holder")).unwrap();
    let verb_publisher = publisher.clone();
    world
        .add_verb(
            &holder,
            VerbDef::new("announce", holder),
            Arc::new(move |_args: &[Var]| -> Result<Var, Error> {
                verb_publisher.message_user(&avatar, v_str("the hall falls silent"));
                verb_publisher.message_user(&npc, v_str("unheard"));
                Ok(v_none())
            }),
        )
        .unwrap();

    let q = mk_q(&world, 2);
    let task_id = q
        .invoke_verb(
            Some(player),
            VerbRef::new(holder, "announce"),
            vec![],
            HashMap::new(),
            None,
        )
        .unwrap();
    q.wait_for_task(task_id, WAIT).unwrap();
    q.shutdown();

    let published = broker.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    let (queue, exchange, payload, retry) = &published[0];
    assert_eq!(queue, "user-17");
    assert_eq!(exchange, "moo");
    assert!(retry);
    let envelope: MessageEnvelope = serde_json::from_slice(payload).unwrap();
    assert_eq!(envelope.version, moo_kernel::MESSAGE_LAYOUT_VERSION);
    assert_eq!(envelope.message, v_str("the hall falls silent"));
    assert_eq!(envelope.caller, Some(player));
}
