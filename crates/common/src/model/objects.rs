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
use moo_var::{NOTHING, Obj};
use serde::{Deserialize, Serialize};

/// Flags on an object.
///
/// `Wizard` is the elevated privilege that bypasses ordinary ownership checks;
/// `Derive` grants others the right to use the object as a parent (LambdaMOO
/// spells this one `fertile`).
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Primitive, Serialize, Deserialize,
)]
pub enum ObjFlag {
    User = 0,
    Programmer = 1,
    Wizard = 2,
    Read = 3,
    Write = 4,
    Derive = 5,
}

/// The creation attributes handed to the object store by the factory.
/// `owner: None` means the new object owns itself.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjAttrs {
    pub name: String,
    pub owner: Option<Obj>,
    pub location: Obj,
    pub parent: Obj,
    pub flags: BitEnum<ObjFlag>,
}

impl ObjAttrs {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
            location: NOTHING,
            parent: NOTHING,
            flags: BitEnum::new(),
        }
    }

    #[must_use]
    pub fn owner(mut self, owner: Obj) -> Self {
        self.owner = Some(owner);
        self
    }

    #[must_use]
    pub fn location(mut self, location: Obj) -> Self {
        self.location = location;
        self
    }

    #[must_use]
    pub fn parent(mut self, parent: Obj) -> Self {
        self.parent = parent;
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: BitEnum<ObjFlag>) -> Self {
        self.flags = flags;
        self
    }
}
