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

use crate::model::WorldStateError;
use crate::model::objects::ObjFlag;
use crate::model::props::{PropFlag, PropPerms};
use crate::util::BitEnum;
use moo_var::Obj;

/// Combination of who a set of permissions is for, and what permissions they have.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Perms {
    // "Who" the permissions are for
    pub who: Obj,
    // What flags apply for those permissions.
    pub flags: BitEnum<ObjFlag>,
}

impl Perms {
    #[must_use]
    pub fn new(obj: &Obj, flags: BitEnum<ObjFlag>) -> Self {
        Self { who: *obj, flags }
    }

    pub fn check_property_allows(
        &self,
        property_permissions: &PropPerms,
        allows: PropFlag,
    ) -> Result<(), WorldStateError> {
        if self.who == property_permissions.owner() {
            return Ok(());
        }
        if self.flags.contains(ObjFlag::Wizard) {
            return Ok(());
        }
        if !property_permissions.flags().contains(allows) {
            return Err(WorldStateError::PropertyPermissionDenied);
        }
        Ok(())
    }

    /// Owner and wizards always pass; everyone else needs all of `allows` set
    /// on the object itself.
    pub fn check_object_allows(
        &self,
        object_owner: &Obj,
        object_flags: BitEnum<ObjFlag>,
        allows: BitEnum<ObjFlag>,
    ) -> Result<(), WorldStateError> {
        if self.who.eq(object_owner) {
            return Ok(());
        }
        if self.flags.contains(ObjFlag::Wizard) {
            return Ok(());
        }
        if !object_flags.contains_all(allows) {
            return Err(WorldStateError::ObjectPermissionDenied);
        }
        Ok(())
    }

    pub fn check_obj_owner_perms(&self, object_owner: &Obj) -> Result<(), WorldStateError> {
        if self.who.eq(object_owner) {
            return Ok(());
        }
        if self.flags.contains(ObjFlag::Wizard) {
            return Ok(());
        }
        Err(WorldStateError::ObjectPermissionDenied)
    }

    pub fn check_wizard(&self) -> Result<(), WorldStateError> {
        if self.check_is_wizard()? {
            return Ok(());
        }
        Err(WorldStateError::ObjectPermissionDenied)
    }

    pub fn check_is_wizard(&self) -> Result<bool, WorldStateError> {
        Ok(self.flags.contains(ObjFlag::Wizard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_always_allowed() {
        let owner = Obj::mk_id(2);
        let perms = Perms::new(&owner, BitEnum::new());
        assert!(
            perms
                .check_object_allows(&owner, BitEnum::new(), BitEnum::new_with(ObjFlag::Derive))
                .is_ok()
        );
    }

    #[test]
    fn test_wizard_always_allowed() {
        let perms = Perms::new(&Obj::mk_id(2), BitEnum::new_with(ObjFlag::Wizard));
        assert!(
            perms
                .check_object_allows(
                    &Obj::mk_id(3),
                    BitEnum::new(),
                    BitEnum::new_with(ObjFlag::Derive)
                )
                .is_ok()
        );
        assert!(perms.check_obj_owner_perms(&Obj::mk_id(3)).is_ok());
    }

    #[test]
    fn test_stranger_needs_flag() {
        let perms = Perms::new(&Obj::mk_id(2), BitEnum::new());
        let derive = BitEnum::new_with(ObjFlag::Derive);
        assert_eq!(
            perms.check_object_allows(&Obj::mk_id(3), BitEnum::new(), derive),
            Err(WorldStateError::ObjectPermissionDenied)
        );
        assert!(
            perms
                .check_object_allows(&Obj::mk_id(3), derive, derive)
                .is_ok()
        );
    }
}
