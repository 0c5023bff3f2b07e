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

use std::sync::{Arc, Mutex};

use moo_var::{Obj, Var};
use thiserror::Error;

/// The "writer" capability the execution context carries: one method,
/// present a value to the recipient. Implementations live in the host layer
/// (interactive shell session, web socket) or in tests (capture buffer); the
/// core never cares which.
pub trait Session: Send + Sync {
    fn present(&self, player: &Obj, value: &Var) -> Result<(), SessionError>;
}

/// How the task queue obtains a writer for verbs invoked asynchronously on
/// behalf of a player who has no interactive call chain of their own.
pub trait SessionFactory: Send + Sync {
    fn mk_background_session(
        self: Arc<Self>,
        player: &Obj,
    ) -> Result<Arc<dyn Session>, SessionError>;
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No connection for player {0}")]
    NoConnectionForPlayer(Obj),
    #[error("Could not deliver session message")]
    DeliveryError,
}

/// A simple no-op implementation of the Session trait, for use in unit tests
/// and for background tasks whose output nobody is watching.
pub struct NoopClientSession {}

impl NoopClientSession {
    pub fn new() -> Self {
        NoopClientSession {}
    }
}

impl Default for NoopClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Session for NoopClientSession {
    fn present(&self, _player: &Obj, _value: &Var) -> Result<(), SessionError> {
        Ok(())
    }
}

impl SessionFactory for NoopClientSession {
    fn mk_background_session(
        self: Arc<Self>,
        _player: &Obj,
    ) -> Result<Arc<dyn Session>, SessionError> {
        Ok(self)
    }
}

/// A mock session which just stores everything presented to it, for tests
/// that assert on output.
pub struct MockClientSession {
    received: Mutex<Vec<(Obj, Var)>>,
}

impl MockClientSession {
    pub fn new() -> Self {
        Self {
            received: Mutex::new(vec![]),
        }
    }

    pub fn received(&self) -> Vec<(Obj, Var)> {
        self.received.lock().unwrap().clone()
    }
}

impl Default for MockClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Session for MockClientSession {
    fn present(&self, player: &Obj, value: &Var) -> Result<(), SessionError> {
        self.received.lock().unwrap().push((*player, value.clone()));
        Ok(())
    }
}

impl SessionFactory for MockClientSession {
    fn mk_background_session(
        self: Arc<Self>,
        _player: &Obj,
    ) -> Result<Arc<dyn Session>, SessionError> {
        Ok(self)
    }
}
