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

use std::marker::PhantomData;
use std::ops::{BitOr, BitOrAssign};

use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A barebones minimal custom bitset enum, covering the flag sets the object
/// model needs without pulling in a full enum-set crate.
#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct BitEnum<T: ToPrimitive> {
    value: u16,
    phantom: PhantomData<T>,
}

impl<T: ToPrimitive> BitEnum<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: 0,
            phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn to_u16(&self) -> u16 {
        self.value
    }

    #[must_use]
    pub fn from_u16(value: u16) -> Self {
        Self {
            value,
            phantom: PhantomData,
        }
    }

    pub fn new_with(value: T) -> Self {
        let mut s = Self {
            value: 0,
            phantom: PhantomData,
        };
        s.set(value);
        s
    }

    #[must_use]
    pub fn all() -> Self {
        Self {
            value: u16::MAX,
            phantom: PhantomData,
        }
    }

    pub fn set(&mut self, value: T) {
        self.value |= 1 << value.to_u64().unwrap();
    }

    pub fn clear(&mut self, value: T) {
        self.value &= !(1 << value.to_u64().unwrap());
    }

    pub fn contains(&self, value: T) -> bool {
        self.value & (1 << value.to_u64().unwrap()) != 0
    }

    pub fn contains_all(&self, values: BitEnum<T>) -> bool {
        values.value & self.value == values.value
    }
}

impl<T: ToPrimitive> BitOr for BitEnum<T> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self {
            value: self.value | rhs.value,
            phantom: PhantomData,
        }
    }
}

impl<T: ToPrimitive> BitOr<T> for BitEnum<T> {
    type Output = Self;

    fn bitor(self, rhs: T) -> Self::Output {
        let mut s = self;
        s.set(rhs);
        s
    }
}

impl<T: ToPrimitive> BitOrAssign<T> for BitEnum<T> {
    fn bitor_assign(&mut self, rhs: T) {
        self.set(rhs);
    }
}

impl<T: ToPrimitive> Default for BitEnum<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enum_primitive_derive::Primitive;

    #[derive(Clone, Copy, Debug, Eq, PartialEq, Primitive)]
    enum TestFlag {
        A = 0,
        B = 1,
        C = 2,
    }

    #[test]
    fn test_set_clear_contains() {
        let mut flags = BitEnum::new_with(TestFlag::A);
        assert!(flags.contains(TestFlag::A));
        assert!(!flags.contains(TestFlag::B));
        flags.set(TestFlag::B);
        assert!(flags.contains(TestFlag::B));
        flags.clear(TestFlag::A);
        assert!(!flags.contains(TestFlag::A));
    }

    #[test]
    fn test_contains_all() {
        let flags = BitEnum::new_with(TestFlag::A) | TestFlag::C;
        assert!(flags.contains_all(BitEnum::new_with(TestFlag::A)));
        assert!(flags.contains_all(BitEnum::new_with(TestFlag::A) | TestFlag::C));
        assert!(!flags.contains_all(BitEnum::new_with(TestFlag::B)));
    }
}
