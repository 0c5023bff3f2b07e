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

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// An object id in the object graph. Negative ids are reserved for sentinels.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Default,
)]
pub struct Obj(i32);

/// The "nothing" object, used where LambdaMOO uses #-1: no location, no parent, etc.
pub const NOTHING: Obj = Obj(-1);

/// The system object, #0.
pub const SYSTEM_OBJECT: Obj = Obj(0);

impl Obj {
    #[must_use]
    pub fn mk_id(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn id(&self) -> i32 {
        self.0
    }

    #[must_use]
    pub fn is_nothing(&self) -> bool {
        *self == NOTHING
    }

    /// Positive ids are the only ones that can name real objects in the store.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 >= 0
    }
}

impl Display for Obj {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Obj::mk_id(2)), "#2");
        assert_eq!(format!("{NOTHING}"), "#-1");
    }

    #[test]
    fn test_sentinels() {
        assert!(NOTHING.is_nothing());
        assert!(!NOTHING.is_positive());
        assert!(SYSTEM_OBJECT.is_positive());
    }
}
