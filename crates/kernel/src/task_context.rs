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

//! Thread-local task context for eliminating parameter threading.
//! Verb bodies get implicit access to the caller, the writer session, the
//! call arguments, and the active world state, without any of it being
//! passed explicitly down the call chain.

use std::{cell::RefCell, collections::HashMap, sync::Arc};

use moo_common::model::WorldState;
use moo_common::tasks::Session;
use moo_var::{Obj, Var};

/// The command-parser handle a context may carry. Narrowed to the one thing
/// verb code ever asks a parser for: the raw command it is chewing on.
pub trait Parser: Send + Sync {
    fn command(&self) -> &str;
}

/// Complete execution context for one call chain: the slots that are
/// implicitly visible to any verb executing "inside" the call.
pub struct TaskContext {
    /// The object on whose behalf this call chain runs, if any.
    pub caller: Option<Obj>,
    /// The writer capable of presenting values to the caller.
    pub session: Arc<dyn Session>,
    /// Positional arguments of the in-flight call.
    pub args: Vec<Var>,
    /// Keyword arguments of the in-flight call.
    pub kwargs: HashMap<String, Var>,
    /// The parser that produced this call, if it came from a command line.
    pub parser: Option<Arc<dyn Parser>>,
    /// The world state this call chain operates against.
    pub world: Arc<dyn WorldState>,
}

thread_local! {
    // A stack, not a single slot: a nested call may install a replacement
    // frame for its own duration, and the previous frame must come back when
    // it ends, error or not.
    static CONTEXT_STACK: RefCell<Vec<TaskContext>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard holding one installed context frame. Dropping it (normal exit,
/// error propagation, or unwind) restores the previous frame.
pub struct ContextGuard(());

impl ContextGuard {
    /// Install a context frame on the current thread.
    pub fn enter(ctx: TaskContext) -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(ctx));
        ContextGuard(())
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert!(popped.is_some(), "Context stack underflow");
        });
    }
}

/// Is any context frame active on the current thread?
pub fn has_context() -> bool {
    CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
}

fn with_top<R>(f: impl FnOnce(&TaskContext) -> R) -> R {
    CONTEXT_STACK.with(|stack| {
        let stack = stack.borrow();
        let top = stack
            .last()
            .expect("No active task context on this thread");
        f(top)
    })
}

/// The caller slot of the active frame.
/// Panics if no context is active.
pub fn current_caller() -> Option<Obj> {
    with_top(|ctx| ctx.caller)
}

/// Get a clone of the active frame's session writer.
/// Panics if no context is active.
pub fn current_session() -> Arc<dyn Session> {
    with_top(|ctx| ctx.session.clone())
}

/// The positional arguments of the active frame.
/// Panics if no context is active.
pub fn current_args() -> Vec<Var> {
    with_top(|ctx| ctx.args.clone())
}

/// The keyword arguments of the active frame.
/// Panics if no context is active.
pub fn current_kwargs() -> HashMap<String, Var> {
    with_top(|ctx| ctx.kwargs.clone())
}

/// The parser reference of the active frame, if any.
/// Panics if no context is active.
pub fn current_parser() -> Option<Arc<dyn Parser>> {
    with_top(|ctx| ctx.parser.clone())
}

/// Get a handle on the world state the active frame runs against.
/// Panics if no context is active.
pub fn current_world() -> Arc<dyn WorldState> {
    with_top(|ctx| ctx.world.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use moo_common::tasks::NoopClientSession;
    use moo_db::MemDb;
    use moo_var::v_int;

    fn mk_ctx(caller: Option<Obj>, args: Vec<Var>) -> TaskContext {
        TaskContext {
            caller,
            session: Arc::new(NoopClientSession::new()),
            args,
            kwargs: HashMap::new(),
            parser: None,
            world: Arc::new(MemDb::new()),
        }
    }

    #[test]
    fn test_no_context_initially() {
        assert!(!has_context());
    }

    #[test]
    #[should_panic(expected = "No active task context")]
    fn test_panic_on_no_context() {
        current_caller();
    }

    #[test]
    fn test_enter_and_restore() {
        let caller = Obj::mk_id(2);
        {
            let _guard = ContextGuard::enter(mk_ctx(Some(caller), vec![v_int(1)]));
            assert!(has_context());
            assert_eq!(current_caller(), Some(caller));
            assert_eq!(current_args(), vec![v_int(1)]);
        }
        assert!(!has_context());
    }

    #[test]
    fn test_nested_frames_shadow_and_restore() {
        let outer = Obj::mk_id(2);
        let inner = Obj::mk_id(3);
        let _outer_guard = ContextGuard::enter(mk_ctx(Some(outer), vec![v_int(1)]));
        {
            let _inner_guard = ContextGuard::enter(mk_ctx(Some(inner), vec![]));
            assert_eq!(current_caller(), Some(inner));
            assert_eq!(current_args(), Vec::<Var>::new());
        }
        assert_eq!(current_caller(), Some(outer));
        assert_eq!(current_args(), vec![v_int(1)]);
    }

    #[test]
    fn test_restore_on_panic() {
        let outer = Obj::mk_id(2);
        let _outer_guard = ContextGuard::enter(mk_ctx(Some(outer), vec![]));
        let result = std::panic::catch_unwind(|| {
            let _inner_guard = ContextGuard::enter(mk_ctx(Some(Obj::mk_id(3)), vec![]));
            panic!("verb blew up");
        });
        assert!(result.is_err());
        // The inner frame was popped by the unwind; the outer survives.
        assert_eq!(current_caller(), Some(outer));
    }

    #[test]
    fn test_threads_do_not_share_frames() {
        let _guard = ContextGuard::enter(mk_ctx(Some(Obj::mk_id(2)), vec![]));
        std::thread::spawn(|| {
            assert!(!has_context());
        })
        .join()
        .unwrap();
    }
}
