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

//! Object creation: ownership resolution, derive/wizard permission checks,
//! quota enforcement, property inheritance, and the `initialize` dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::task_context::{self, ContextGuard, TaskContext};
use moo_common::model::{
    INITIALIZE_VERB, OWNERSHIP_QUOTA_PROP, ObjAttrs, ObjFlag, PropFlag, PropPerms, WorldState,
    WorldStateError,
};
use moo_common::tasks::NoopClientSession;
use moo_common::util::BitEnum;
use moo_var::{NOTHING, Obj, Var, v_int};

/// Who the new object should belong to. Models the upstream tri-state owner
/// argument: not given, given-as-nothing, or given.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OwnerSpec {
    /// Owner not specified: the current caller from the execution context.
    #[default]
    Caller,
    /// Owner explicitly absent: the new object owns itself.
    Itself,
    /// A specific owner. Anyone but the caller requires wizard privilege.
    Explicit(Obj),
}

/// The request handed to [`create_object`].
#[derive(Clone, Debug, Default)]
pub struct CreateSpec {
    pub name: String,
    pub owner: OwnerSpec,
    pub location: Option<Obj>,
    pub parent: Option<Obj>,
    pub flags: BitEnum<ObjFlag>,
}

impl CreateSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn owner(mut self, owner: OwnerSpec) -> Self {
        self.owner = owner;
        self
    }

    #[must_use]
    pub fn location(mut self, location: Obj) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn parent(mut self, parent: Obj) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: BitEnum<ObjFlag>) -> Self {
        self.flags = flags;
        self
    }
}

/// Create a new object in the world.
///
/// Permission rule: deriving from a parent requires the parent's `Derive`
/// flag, ownership of the parent, or wizard privilege; naming an owner other
/// than the caller requires wizard privilege. Creation driven from outside
/// any call chain (no active context, or a context with no caller) is
/// system-internal and skips the checks.
///
/// If the resolved owner carries an integer `ownership_quota`, it is
/// decremented-and-checked in a single atomic store update; zero or less
/// fails with `QuotaExhausted` and creates nothing.
///
/// All properties on the parent are copied to the new object; a copied
/// property whose `Inherit` bit is set becomes owned by the new object's
/// owner, otherwise it keeps the parent's property owner. Flags are copied
/// unchanged.
///
/// After creation the new object's `initialize` verb, if any, runs with no
/// arguments under a nested context frame. The store only guarantees per-call
/// atomicity, so a failure after the row was written is compensated: the new
/// object is recycled and the quota decrement reversed before the error
/// propagates.
pub fn create_object(
    world: &Arc<dyn WorldState>,
    spec: CreateSpec,
) -> Result<Obj, WorldStateError> {
    let caller = if task_context::has_context() {
        task_context::current_caller()
    } else {
        None
    };

    if let Some(caller) = &caller {
        let perms = world.perms(caller)?;
        if let Some(parent) = &spec.parent {
            let (parent_flags, parent_owner) = (world.flags_of(parent)?, world.owner_of(parent)?);
            perms.check_object_allows(
                &parent_owner,
                parent_flags,
                BitEnum::new_with(ObjFlag::Derive),
            )?;
        }
        if let OwnerSpec::Explicit(owner) = &spec.owner
            && owner != caller
        {
            perms.check_wizard()?;
        }
    }

    let owner: Option<Obj> = match spec.owner {
        OwnerSpec::Explicit(o) => Some(o),
        OwnerSpec::Itself => None,
        OwnerSpec::Caller => caller,
    };

    // Location defaults to the resolved owner's location. A self-owned object
    // does not exist yet, so it can have no location-by-owner.
    let location = match spec.location {
        Some(loc) => loc,
        None => match &owner {
            Some(o) => world.location_of(o)?,
            None => NOTHING,
        },
    };

    let quota_consumed = match &owner {
        Some(owner) => consume_quota(world, owner)?,
        None => false,
    };

    let attrs = ObjAttrs {
        name: spec.name,
        owner,
        location,
        parent: spec.parent.unwrap_or(NOTHING),
        flags: spec.flags,
    };
    let new_obj = match world.create_object(attrs) {
        Ok(o) => o,
        Err(e) => {
            if quota_consumed && let Some(owner) = &owner {
                restore_quota(world, owner);
            }
            return Err(e);
        }
    };
    debug!(obj = %new_obj, "created object");

    let result = inherit_properties(world, &new_obj, spec.parent)
        .and_then(|()| run_initialize(world, &new_obj, caller));
    if let Err(e) = result {
        // Compensation: undo the row and the quota consumption, then let the
        // original error propagate as creation failure.
        warn!(obj = %new_obj, error = %e, "creation failed after persistence, recycling");
        if let Err(recycle_err) = world.recycle_object(&new_obj) {
            warn!(obj = %new_obj, error = %recycle_err, "could not recycle failed creation");
        }
        if quota_consumed && let Some(owner) = &owner {
            restore_quota(world, owner);
        }
        return Err(e);
    }

    Ok(new_obj)
}

/// Atomic decrement-and-check of `ownership_quota` on the owner. Returns
/// whether a decrement actually happened. Absent or non-integer quota means
/// unlimited.
fn consume_quota(world: &Arc<dyn WorldState>, owner: &Obj) -> Result<bool, WorldStateError> {
    let mut consumed = false;
    let owner = *owner;
    world.update_property_atomic(&owner, OWNERSHIP_QUOTA_PROP, &mut |value| match value {
        Some(Var::Int(n)) if *n <= 0 => Err(WorldStateError::QuotaExhausted(owner)),
        Some(Var::Int(n)) => {
            consumed = true;
            Ok(Some(v_int(n - 1)))
        }
        _ => Ok(None),
    })?;
    Ok(consumed)
}

/// Reverse a consumed quota unit. Best effort; failure here is logged, not
/// raised, since we are already on an error path.
fn restore_quota(world: &Arc<dyn WorldState>, owner: &Obj) {
    let res = world.update_property_atomic(owner, OWNERSHIP_QUOTA_PROP, &mut |value| {
        match value {
            Some(Var::Int(n)) => Ok(Some(v_int(n + 1))),
            _ => Ok(None),
        }
    });
    if let Err(e) = res {
        warn!(%owner, error = %e, "could not restore quota");
    }
}

fn inherit_properties(
    world: &Arc<dyn WorldState>,
    new_obj: &Obj,
    parent: Option<Obj>,
) -> Result<(), WorldStateError> {
    let Some(parent) = parent else {
        return Ok(());
    };
    let new_owner = world.owner_of(new_obj)?;
    for def in world.properties(&parent)? {
        let (value, perms) = world.retrieve_property(&parent, def.name())?;
        let copy_owner = if perms.flags().contains(PropFlag::Inherit) {
            new_owner
        } else {
            perms.owner()
        };
        world.define_property(
            new_obj,
            def.name(),
            value,
            PropPerms::new(copy_owner, perms.flags()),
        )?;
    }
    Ok(())
}

/// Invoke `initialize` on the new object with no arguments, if it resolves.
/// Runs under a nested context frame so the previous call's args do not leak
/// into it, and so creation works from outside any call chain too.
fn run_initialize(
    world: &Arc<dyn WorldState>,
    new_obj: &Obj,
    caller: Option<Obj>,
) -> Result<(), WorldStateError> {
    let resolved = match world.find_method_verb_on(new_obj, INITIALIZE_VERB) {
        Ok(resolved) => resolved,
        Err(WorldStateError::VerbNotFound(_, _)) => return Ok(()),
        Err(e) => return Err(e),
    };

    let session = if task_context::has_context() {
        task_context::current_session()
    } else {
        Arc::new(NoopClientSession::new())
    };
    let _guard = ContextGuard::enter(TaskContext {
        caller,
        session,
        args: vec![],
        kwargs: HashMap::new(),
        parser: None,
        world: world.clone(),
    });
    resolved
        .program
        .call(&[])
        .map(|_| ())
        .map_err(WorldStateError::VerbExecutionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moo_common::model::{PropFlag, VerbDef};
    use moo_db::MemDb;
    use moo_var::{Error, v_int, v_str};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn mk_world() -> Arc<dyn WorldState> {
        Arc::new(MemDb::new())
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

    #[test]
    fn test_system_creation_without_context() {
        let world = mk_world();
        let o = create_object(&world, CreateSpec::new("genesis")).unwrap();
        // No caller anywhere: self-owned, located nowhere.
        assert_eq!(world.owner_of(&o).unwrap(), o);
        assert_eq!(world.location_of(&o).unwrap(), NOTHING);
        assert_eq!(world.name_of(&o).unwrap(), "genesis");
    }

    #[test]
    fn test_owner_and_location_default_from_caller() {
        let world = mk_world();
        let room = create_object(&world, CreateSpec::new("room")).unwrap();
        let player = create_object(&world, CreateSpec::new("player").location(room)).unwrap();

        let _guard = enter_as(&world, player);
        let thing = create_object(&world, CreateSpec::new("thing")).unwrap();
        assert_eq!(world.owner_of(&thing).unwrap(), player);
        assert_eq!(world.location_of(&thing).unwrap(), room);
    }

    #[test]
    fn test_self_owned_object() {
        let world = mk_world();
        let player = create_object(&world, CreateSpec::new("player")).unwrap();

        let _guard = enter_as(&world, player);
        let orb = create_object(&world, CreateSpec::new("orb").owner(OwnerSpec::Itself)).unwrap();
        assert_eq!(world.owner_of(&orb).unwrap(), orb);
        assert_eq!(world.location_of(&orb).unwrap(), NOTHING);
    }

    #[test]
    fn test_explicit_owner_needs_wizard() {
        let world = mk_world();
        let mortal = create_object(&world, CreateSpec::new("mortal")).unwrap();
        let wizard = create_object(
            &world,
            CreateSpec::new("wizard").flags(BitEnum::new_with(ObjFlag::Wizard)),
        )
        .unwrap();
        let other = create_object(&world, CreateSpec::new("other")).unwrap();

        {
            let _guard = enter_as(&world, mortal);
            let err = create_object(
                &world,
                CreateSpec::new("gift").owner(OwnerSpec::Explicit(other)),
            )
            .unwrap_err();
            assert_eq!(err, WorldStateError::ObjectPermissionDenied);
            // Naming yourself is not a privilege escalation.
            let mine = create_object(
                &world,
                CreateSpec::new("mine").owner(OwnerSpec::Explicit(mortal)),
            )
            .unwrap();
            assert_eq!(world.owner_of(&mine).unwrap(), mortal);
        }

        let _guard = enter_as(&world, wizard);
        let gift = create_object(
            &world,
            CreateSpec::new("gift").owner(OwnerSpec::Explicit(other)),
        )
        .unwrap();
        assert_eq!(world.owner_of(&gift).unwrap(), other);
    }

    #[test]
    fn test_derive_requires_flag_or_ownership() {
        let world = mk_world();
        let stranger = create_object(&world, CreateSpec::new("stranger")).unwrap();
        let closed = create_object(&world, CreateSpec::new("closed parent")).unwrap();
        let open = create_object(
            &world,
            CreateSpec::new("open parent").flags(BitEnum::new_with(ObjFlag::Derive)),
        )
        .unwrap();

        let _guard = enter_as(&world, stranger);
        let err = create_object(&world, CreateSpec::new("child").parent(closed)).unwrap_err();
        assert_eq!(err, WorldStateError::ObjectPermissionDenied);

        let child = create_object(&world, CreateSpec::new("child").parent(open)).unwrap();
        assert_eq!(world.parent_of(&child).unwrap(), open);
    }

    #[test]
    fn test_quota_zero_creates_nothing() {
        let world = mk_world();
        let player = create_object(&world, CreateSpec::new("player")).unwrap();
        world
            .define_property(
                &player,
                OWNERSHIP_QUOTA_PROP,
                v_int(0),
                PropPerms::new(player, PropFlag::rw()),
            )
            .unwrap();

        let _guard = enter_as(&world, player);
        let err = create_object(&world, CreateSpec::new("denied")).unwrap_err();
        assert_eq!(err, WorldStateError::QuotaExhausted(player));
        // Nothing was allocated and the quota is untouched.
        assert_eq!(
            world
                .retrieve_property(&player, OWNERSHIP_QUOTA_PROP)
                .unwrap()
                .0,
            v_int(0)
        );
        assert!(!world.valid(&Obj::mk_id(1)).unwrap());
    }

    #[test]
    fn test_quota_decrements() {
        let world = mk_world();
        let player = create_object(&world, CreateSpec::new("player")).unwrap();
        world
            .define_property(
                &player,
                OWNERSHIP_QUOTA_PROP,
                v_int(2),
                PropPerms::new(player, PropFlag::rw()),
            )
            .unwrap();

        let _guard = enter_as(&world, player);
        create_object(&world, CreateSpec::new("one")).unwrap();
        assert_eq!(
            world
                .retrieve_property(&player, OWNERSHIP_QUOTA_PROP)
                .unwrap()
                .0,
            v_int(1)
        );
        create_object(&world, CreateSpec::new("two")).unwrap();
        let err = create_object(&world, CreateSpec::new("three")).unwrap_err();
        assert_eq!(err, WorldStateError::QuotaExhausted(player));
    }

    #[test]
    fn test_inherit_bit_rewrites_property_owner() {
        let world = mk_world();
        let builder = create_object(&world, CreateSpec::new("builder")).unwrap();
        let parent = create_object(
            &world,
            CreateSpec::new("parent").flags(BitEnum::new_with(ObjFlag::Derive)),
        )
        .unwrap();
        world
            .define_property(
                &parent,
                "description",
                v_str("plain"),
                PropPerms::new(parent, PropFlag::ri()),
            )
            .unwrap();
        world
            .define_property(
                &parent,
                "blueprint",
                v_str("secret"),
                PropPerms::new(parent, PropFlag::r()),
            )
            .unwrap();

        let _guard = enter_as(&world, builder);
        let child = create_object(&world, CreateSpec::new("child").parent(parent)).unwrap();

        let (desc, desc_perms) = world.retrieve_property(&child, "description").unwrap();
        assert_eq!(desc, v_str("plain"));
        assert_eq!(desc_perms.owner(), builder);
        assert_eq!(desc_perms.flags(), PropFlag::ri());

        let (_, bp_perms) = world.retrieve_property(&child, "blueprint").unwrap();
        assert_eq!(bp_perms.owner(), parent);
    }

    #[test]
    fn test_initialize_runs_with_fresh_frame() {
        let world = mk_world();
        let player = create_object(&world, CreateSpec::new("player")).unwrap();
        let parent = create_object(
            &world,
            CreateSpec::new("parent").flags(BitEnum::new_with(ObjFlag::Derive)),
        )
        .unwrap();

        let observed = Arc::new(Mutex::new(vec![]));
        let observed_in_verb = observed.clone();
        world
            .add_verb(
                &parent,
                VerbDef::new(INITIALIZE_VERB, parent),
                Arc::new(move |args: &[Var]| -> Result<Var, Error> {
                    observed_in_verb
                        .lock()
                        .unwrap()
                        .push((task_context::current_caller(), args.to_vec()));
                    Ok(moo_var::v_none())
                }),
            )
            .unwrap();

        let _guard = ContextGuard::enter(TaskContext {
            caller: Some(player),
            session: Arc::new(NoopClientSession::new()),
            args: vec![v_int(99)],
            kwargs: HashMap::new(),
            parser: None,
            world: world.clone(),
        });
        create_object(&world, CreateSpec::new("child").parent(parent)).unwrap();

        let observed = observed.lock().unwrap();
        assert_eq!(observed.len(), 1);
        // Same caller, but the submitting frame's arguments do not leak in.
        assert_eq!(observed[0], (Some(player), vec![]));
        // And the outer frame is back.
        assert_eq!(task_context::current_args(), vec![v_int(99)]);
    }

    #[test]
    fn test_failed_initialize_recycles_and_restores_quota() {
        let world = mk_world();
        let player = create_object(&world, CreateSpec::new("player")).unwrap();
        world
            .define_property(
                &player,
                OWNERSHIP_QUOTA_PROP,
                v_int(1),
                PropPerms::new(player, PropFlag::rw()),
            )
            .unwrap();
        let parent = create_object(
            &world,
            CreateSpec::new("parent").flags(BitEnum::new_with(ObjFlag::Derive)),
        )
        .unwrap();
        world
            .add_verb(
                &parent,
                VerbDef::new(INITIALIZE_VERB, parent),
                Arc::new(|_args: &[Var]| -> Result<Var, Error> {
                    Err(moo_var::E_INVARG.msg("bad birth"))
                }),
            )
            .unwrap();

        let _guard = enter_as(&world, player);
        let err = create_object(&world, CreateSpec::new("doomed").parent(parent)).unwrap_err();
        assert!(matches!(err, WorldStateError::VerbExecutionFailed(_)));
        // The half-made object is gone and the quota unit came back.
        assert!(!world.valid(&Obj::mk_id(2)).unwrap());
        assert_eq!(
            world
                .retrieve_property(&player, OWNERSHIP_QUOTA_PROP)
                .unwrap()
                .0,
            v_int(1)
        );
    }
}
