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

//! The contract the core expects from the message-broker collaborator. The
//! actual transport (AMQP, in-process, whatever) lives outside this tree.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Id of a user account behind an avatar object. Per-user inbox queues are
/// addressed as `user-<id>`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A broker which can append payloads to durable, per-user queues bound to a
/// fixed direct exchange. `retry` requests at-least-once semantics: the
/// broker retries transient publish failures before reporting an error.
/// Payloads published to the same queue are delivered in publish order.
pub trait MessageBroker: Send + Sync {
    fn publish(
        &self,
        queue: &str,
        exchange: &str,
        payload: &[u8],
        retry: bool,
    ) -> Result<(), BrokerError>;
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Could not publish to queue {0}: {1}")]
    PublishFailed(String, String),
    #[error("Could not encode payload: {0}")]
    EncodingFailed(String),
}
