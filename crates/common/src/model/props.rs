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

use crate::util::BitEnum;
use enum_primitive_derive::Primitive;
use moo_var::Obj;
use serde::{Deserialize, Serialize};

/// Flags on a property. `Inherit` drives the ownership rewrite when the
/// property is copied onto a freshly created child: set, the copy is owned by
/// the child's owner; clear, it keeps the parent's property owner.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Primitive, Serialize, Deserialize,
)]
pub enum PropFlag {
    Read = 0,
    Write = 1,
    Inherit = 2,
}

impl PropFlag {
    pub fn parse_str(s: &str) -> Option<BitEnum<PropFlag>> {
        let mut flags = BitEnum::new();
        for c in s.chars() {
            match c {
                'r' => flags.set(PropFlag::Read),
                'w' => flags.set(PropFlag::Write),
                'i' => flags.set(PropFlag::Inherit),
                _ => return None,
            }
        }
        Some(flags)
    }

    pub fn rw() -> BitEnum<PropFlag> {
        BitEnum::new_with(PropFlag::Read) | PropFlag::Write
    }

    pub fn ri() -> BitEnum<PropFlag> {
        BitEnum::new_with(PropFlag::Read) | PropFlag::Inherit
    }

    pub fn rwi() -> BitEnum<PropFlag> {
        BitEnum::new_with(PropFlag::Read) | PropFlag::Write | PropFlag::Inherit
    }

    pub fn r() -> BitEnum<PropFlag> {
        BitEnum::new_with(PropFlag::Read)
    }
}

pub fn prop_flags_string(flags: BitEnum<PropFlag>) -> String {
    let mut s = String::new();
    if flags.contains(PropFlag::Read) {
        s.push('r');
    }
    if flags.contains(PropFlag::Write) {
        s.push('w');
    }
    if flags.contains(PropFlag::Inherit) {
        s.push('i');
    }
    s
}

/// Who a property belongs to, and what its flags are.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropPerms {
    owner: Obj,
    flags: BitEnum<PropFlag>,
}

impl PropPerms {
    #[must_use]
    pub fn new(owner: Obj, flags: BitEnum<PropFlag>) -> Self {
        Self { owner, flags }
    }

    #[must_use]
    pub fn owner(&self) -> Obj {
        self.owner
    }

    #[must_use]
    pub fn flags(&self) -> BitEnum<PropFlag> {
        self.flags
    }

    #[must_use]
    pub fn with_owner(self, owner: Obj) -> Self {
        Self::new(owner, self.flags)
    }

    #[must_use]
    pub fn with_flags(self, flags: BitEnum<PropFlag>) -> Self {
        Self::new(self.owner, flags)
    }
}

/// The definition of a property on an object, minus its value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropDef {
    name: String,
    perms: PropPerms,
}

impl PropDef {
    pub fn new(name: impl Into<String>, perms: PropPerms) -> Self {
        Self {
            name: name.into(),
            perms,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn perms(&self) -> PropPerms {
        self.perms
    }
}
