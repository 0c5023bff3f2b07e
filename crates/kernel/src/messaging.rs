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

//! Publishing messages to per-user inbox queues through the broker.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::task_context;
use moo_common::messaging::MessageBroker;
use moo_common::model::{WorldState, WorldStateError};
use moo_var::{Obj, Var};

/// Version stamp on every published envelope, so consumers can reject or
/// migrate payloads from an older layout.
pub const MESSAGE_LAYOUT_VERSION: u8 = 1;

/// The wire layout of one user message. Self-describing JSON; `caller` is
/// whoever was on the context when the message was sent, if anyone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub version: u8,
    pub message: Var,
    pub caller: Option<Obj>,
}

/// Publishes messages addressed to avatar objects onto the durable per-user
/// queues their accounts consume from.
pub struct MessagePublisher {
    world: Arc<dyn WorldState>,
    broker: Arc<dyn MessageBroker>,
    exchange: String,
}

impl MessagePublisher {
    pub fn new(
        world: Arc<dyn WorldState>,
        broker: Arc<dyn MessageBroker>,
        exchange: impl Into<String>,
    ) -> Self {
        Self {
            world,
            broker,
            exchange: exchange.into(),
        }
    }

    /// Send a message to the user behind the given avatar object. A target
    /// with no user mapping, or one that does not exist at all, is a no-op:
    /// world code messages NPCs and players alike without caring which is
    /// which. Broker failures are logged, never raised back into verb code.
    pub fn message_user(&self, target: &Obj, message: Var) {
        let user = match self.world.user_of(target) {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!(target = %target, "no user behind target, message dropped");
                return;
            }
            Err(WorldStateError::ObjectNotFound(_)) => {
                debug!(target = %target, "message target does not exist, dropped");
                return;
            }
            Err(e) => {
                error!(target = %target, error = %e, "could not resolve message target");
                return;
            }
        };

        let caller = if task_context::has_context() {
            task_context::current_caller()
        } else {
            None
        };
        let envelope = MessageEnvelope {
            version: MESSAGE_LAYOUT_VERSION,
            message,
            caller,
        };
        let payload = match serde_json::to_vec(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                error!(target = %target, error = %e, "could not encode message envelope");
                return;
            }
        };

        let queue = format!("user-{user}");
        // retry = true: transient broker trouble must not lose user messages.
        if let Err(e) = self.broker.publish(&queue, &self.exchange, &payload, true) {
            error!(queue, error = %e, "could not publish user message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moo_common::messaging::{BrokerError, UserId};
    use moo_common::model::ObjAttrs;
    use moo_db::MemDb;
    use moo_var::v_str;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Captures everything published, in order.
    struct CapturingBroker {
        published: Mutex<Vec<(String, String, Vec<u8>, bool)>>,
    }

    impl CapturingBroker {
        fn new() -> Self {
            Self {
                published: Mutex::new(vec![]),
            }
        }
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

    fn setup() -> (Arc<MemDb>, Arc<CapturingBroker>, MessagePublisher) {
        let world = Arc::new(MemDb::new());
        let broker = Arc::new(CapturingBroker::new());
        let publisher = MessagePublisher::new(world.clone(), broker.clone(), "moo");
        (world, broker, publisher)
    }

    #[test]
    fn test_publishes_to_user_queue() {
        let (world, broker, publisher) = setup();
        let avatar = world
            .create_object(ObjAttrs::new("avatar"))
            .unwrap();
        world.set_user_of(&avatar, UserId(42)).unwrap();

        publisher.message_user(&avatar, v_str("hello"));

        let published = broker.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        let (queue, exchange, payload, retry) = &published[0];
        assert_eq!(queue, "user-42");
        assert_eq!(exchange, "moo");
        assert!(retry);
        let envelope: MessageEnvelope = serde_json::from_slice(payload).unwrap();
        assert_eq!(
            envelope,
            MessageEnvelope {
                version: MESSAGE_LAYOUT_VERSION,
                message: v_str("hello"),
                caller: None,
            }
        );
    }

    #[test]
    fn test_unmapped_target_is_silent() {
        let (world, broker, publisher) = setup();
        let npc = world.create_object(ObjAttrs::new("npc")).unwrap();

        publisher.message_user(&npc, v_str("boo"));

        assert!(broker.published.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missing_target_is_silent() {
        let (_world, broker, publisher) = setup();

        publisher.message_user(&moo_var::Obj::mk_id(999), v_str("void"));

        assert!(broker.published.lock().unwrap().is_empty());
    }

    #[test]
    fn test_broker_failure_not_raised() {
        struct BrokenBroker;
        impl MessageBroker for BrokenBroker {
            fn publish(
                &self,
                queue: &str,
                _exchange: &str,
                _payload: &[u8],
                _retry: bool,
            ) -> Result<(), BrokerError> {
                Err(BrokerError::PublishFailed(
                    queue.to_string(),
                    "connection refused".to_string(),
                ))
            }
        }

        let world = Arc::new(MemDb::new());
        let avatar = world.create_object(ObjAttrs::new("avatar")).unwrap();
        world.set_user_of(&avatar, UserId(1)).unwrap();
        let publisher = MessagePublisher::new(world, Arc::new(BrokenBroker), "moo");

        // Logged, swallowed; verb code never sees broker trouble.
        publisher.message_user(&avatar, v_str("lost"));
    }

    #[test]
    fn test_caller_stamped_from_context() {
        use crate::task_context::{ContextGuard, TaskContext};
        use moo_common::tasks::NoopClientSession;
        use std::collections::HashMap;

        let (world, broker, publisher) = setup();
        let avatar = world.create_object(ObjAttrs::new("avatar")).unwrap();
        world.set_user_of(&avatar, UserId(7)).unwrap();

        let caller = moo_var::Obj::mk_id(3);
        {
            let _guard = ContextGuard::enter(TaskContext {
                caller: Some(caller),
                session: Arc::new(NoopClientSession::new()),
                args: vec![],
                kwargs: HashMap::new(),
                parser: None,
                world: world.clone(),
            });
            publisher.message_user(&avatar, v_str("hi"));
        }

        let published = broker.published.lock().unwrap();
        let envelope: MessageEnvelope = serde_json::from_slice(&published[0].2).unwrap();
        assert_eq!(envelope.caller, Some(caller));
    }
}
