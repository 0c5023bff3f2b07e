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

use crate::messaging::UserId;
use crate::model::objects::{ObjAttrs, ObjFlag};
use crate::model::permissions::Perms;
use crate::model::props::{PropDef, PropPerms};
use crate::model::verbs::{ResolvedVerb, VerbDef, VerbProgram};
use crate::util::BitEnum;
use moo_var::{E_INVARG, E_INVIND, E_PERM, E_PROPNF, E_QUOTA, E_VERBNF, Error, Obj, Var};
use std::sync::Arc;
use thiserror::Error;

/// Errors related to the world state and operations on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorldStateError {
    #[error("Object not found: {0}")]
    ObjectNotFound(Obj),

    #[error("Object permission denied")]
    ObjectPermissionDenied,

    #[error("Ownership quota exhausted for {0}")]
    QuotaExhausted(Obj),

    #[error("Property not found: {0}.{1}")]
    PropertyNotFound(Obj, String),
    #[error("Property permission denied")]
    PropertyPermissionDenied,
    #[error("Duplicate property definition: {0}.{1}")]
    DuplicatePropertyDefinition(Obj, String),
    #[error("Property type mismatch")]
    PropertyTypeMismatch,

    #[error("Verb not found: {0}:{1}")]
    VerbNotFound(Obj, String),
    #[error("Verb already exists: {0}:{1}")]
    DuplicateVerb(Obj, String),
    #[error("Verb execution failed: {0}")]
    VerbExecutionFailed(moo_var::Error),

    // Catch-all for system level object DB errors.
    #[error("DB communications/internal error: {0}")]
    DatabaseError(String),
}

/// Translations from WorldStateError to MOO error codes.
impl WorldStateError {
    pub fn to_error(&self) -> Error {
        let err_code = match self {
            Self::ObjectNotFound(_) => E_INVIND,
            Self::ObjectPermissionDenied | Self::PropertyPermissionDenied => E_PERM,
            Self::QuotaExhausted(_) => E_QUOTA,
            Self::PropertyNotFound(_, _) => E_PROPNF,
            Self::VerbNotFound(_, _) => E_VERBNF,
            Self::PropertyTypeMismatch => moo_var::E_TYPE,
            Self::DuplicatePropertyDefinition(_, _) | Self::DuplicateVerb(_, _) => E_INVARG,
            Self::VerbExecutionFailed(e) => return e.clone(),
            Self::DatabaseError(_) => E_INVARG,
        };

        err_code.msg(self.to_string())
    }
}

impl From<WorldStateError> for Error {
    fn from(val: WorldStateError) -> Self {
        val.to_error()
    }
}

/// The contract the execution core needs from the durable object/property
/// store. Implementations are their own synchronizers: every method is atomic
/// per call, and `update_property_atomic` must make its read-modify-write
/// indivisible with respect to all other calls touching the same object.
pub trait WorldState: Send + Sync {
    /// Create a new object with the given attributes and return its id.
    /// `attrs.owner == None` means the object owns itself. No permission
    /// checks happen here; those belong to the factory above.
    fn create_object(&self, attrs: ObjAttrs) -> Result<Obj, WorldStateError>;

    /// Destroy an object, irrevocably. Used by the factory's compensation
    /// path when creation fails after the row was written.
    fn recycle_object(&self, obj: &Obj) -> Result<(), WorldStateError>;

    /// Does the given object exist (created and not yet recycled)?
    fn valid(&self, obj: &Obj) -> Result<bool, WorldStateError>;

    fn name_of(&self, obj: &Obj) -> Result<String, WorldStateError>;
    fn owner_of(&self, obj: &Obj) -> Result<Obj, WorldStateError>;
    fn location_of(&self, obj: &Obj) -> Result<Obj, WorldStateError>;
    fn parent_of(&self, obj: &Obj) -> Result<Obj, WorldStateError>;
    fn flags_of(&self, obj: &Obj) -> Result<BitEnum<ObjFlag>, WorldStateError>;

    /// The properties defined directly on the given object.
    fn properties(&self, obj: &Obj) -> Result<Vec<PropDef>, WorldStateError>;

    /// Retrieve a property's value and permissions, from the object itself.
    fn retrieve_property(&self, obj: &Obj, name: &str)
    -> Result<(Var, PropPerms), WorldStateError>;

    fn update_property(&self, obj: &Obj, name: &str, value: &Var)
    -> Result<(), WorldStateError>;

    fn define_property(
        &self,
        obj: &Obj,
        name: &str,
        value: Var,
        perms: PropPerms,
    ) -> Result<(), WorldStateError>;

    /// Single atomic read-modify-write against one property. The closure sees
    /// the current value (`None` if the property is not defined) and returns
    /// the new value to store, or `None` to leave the store untouched. An
    /// error from the closure aborts with no mutation. This is the quota
    /// contract: decrement-and-check must not interleave with another update.
    fn update_property_atomic(
        &self,
        obj: &Obj,
        name: &str,
        f: &mut dyn FnMut(Option<&Var>) -> Result<Option<Var>, WorldStateError>,
    ) -> Result<(), WorldStateError>;

    /// Method-style verb resolution: look for the named verb on the object,
    /// then up its parent chain.
    fn find_method_verb_on(&self, obj: &Obj, name: &str)
    -> Result<ResolvedVerb, WorldStateError>;

    fn add_verb(
        &self,
        obj: &Obj,
        def: VerbDef,
        program: Arc<dyn VerbProgram>,
    ) -> Result<(), WorldStateError>;

    /// The session-owning user account mapped to the given avatar object, if
    /// any. `None` is not an error; it just means nobody is behind the object.
    fn user_of(&self, obj: &Obj) -> Result<Option<UserId>, WorldStateError>;

    fn set_user_of(&self, obj: &Obj, user: UserId) -> Result<(), WorldStateError>;

    /// Permissions record for the given actor, derived from its flags.
    fn perms(&self, who: &Obj) -> Result<Perms, WorldStateError> {
        Ok(Perms::new(who, self.flags_of(who)?))
    }
}
