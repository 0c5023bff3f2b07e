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

//! The shared object/property/verb model, permission checks, and the contract
//! the core expects from the object store.

mod objects;
mod permissions;
mod props;
mod verbs;
mod world_state;

pub use objects::{ObjAttrs, ObjFlag};
pub use permissions::Perms;
pub use props::{PropDef, PropFlag, PropPerms, prop_flags_string};
pub use verbs::{ResolvedVerb, VerbDef, VerbProgram};
pub use world_state::{WorldState, WorldStateError};

/// The property name consulted (on the prospective owner) for the consumable
/// object-creation quota.
pub const OWNERSHIP_QUOTA_PROP: &str = "ownership_quota";

/// The verb invoked, with no arguments, on a freshly created object.
pub const INITIALIZE_VERB: &str = "initialize";
