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

use ahash::AHasher;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::sync::{Arc, Mutex};
use tracing::trace;

use moo_common::messaging::UserId;
use moo_common::model::{
    ObjAttrs, ObjFlag, PropDef, PropPerms, ResolvedVerb, VerbDef, VerbProgram, WorldState,
    WorldStateError,
};
use moo_common::util::BitEnum;
use moo_var::{Obj, Var};

struct VerbRecord {
    def: VerbDef,
    program: Arc<dyn VerbProgram>,
}

struct ObjectRecord {
    name: String,
    owner: Obj,
    location: Obj,
    parent: Obj,
    flags: BitEnum<ObjFlag>,
    // Ordered: property copy order at creation is the parent's definition order.
    properties: Vec<(PropDef, Var)>,
    verbs: Vec<VerbRecord>,
    user: Option<UserId>,
}

struct Inner {
    objects: HashMap<Obj, ObjectRecord, BuildHasherDefault<AHasher>>,
    next_id: i32,
}

/// An entire world state held behind one lock. Every `WorldState` call is a
/// single critical section, which is what gives `update_property_atomic` its
/// indivisible read-modify-write.
pub struct MemDb {
    inner: Mutex<Inner>,
}

impl MemDb {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                objects: HashMap::default(),
                next_id: 0,
            }),
        }
    }
}

impl Default for MemDb {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn object(&self, obj: &Obj) -> Result<&ObjectRecord, WorldStateError> {
        self.objects
            .get(obj)
            .ok_or(WorldStateError::ObjectNotFound(*obj))
    }

    fn object_mut(&mut self, obj: &Obj) -> Result<&mut ObjectRecord, WorldStateError> {
        self.objects
            .get_mut(obj)
            .ok_or(WorldStateError::ObjectNotFound(*obj))
    }
}

impl WorldState for MemDb {
    fn create_object(&self, attrs: ObjAttrs) -> Result<Obj, WorldStateError> {
        let mut inner = self.inner.lock().unwrap();
        if !attrs.parent.is_nothing() {
            inner.object(&attrs.parent)?;
        }
        if !attrs.location.is_nothing() {
            inner.object(&attrs.location)?;
        }
        let id = Obj::mk_id(inner.next_id);
        inner.next_id += 1;
        let owner = attrs.owner.unwrap_or(id);
        trace!(obj = %id, %owner, "create object");
        inner.objects.insert(
            id,
            ObjectRecord {
                name: attrs.name,
                owner,
                location: attrs.location,
                parent: attrs.parent,
                flags: attrs.flags,
                properties: vec![],
                verbs: vec![],
                user: None,
            },
        );
        Ok(id)
    }

    fn recycle_object(&self, obj: &Obj) -> Result<(), WorldStateError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .objects
            .remove(obj)
            .map(|_| ())
            .ok_or(WorldStateError::ObjectNotFound(*obj))
    }

    fn valid(&self, obj: &Obj) -> Result<bool, WorldStateError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.objects.contains_key(obj))
    }

    fn name_of(&self, obj: &Obj) -> Result<String, WorldStateError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.object(obj)?.name.clone())
    }

    fn owner_of(&self, obj: &Obj) -> Result<Obj, WorldStateError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.object(obj)?.owner)
    }

    fn location_of(&self, obj: &Obj) -> Result<Obj, WorldStateError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.object(obj)?.location)
    }

    fn parent_of(&self, obj: &Obj) -> Result<Obj, WorldStateError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.object(obj)?.parent)
    }

    fn flags_of(&self, obj: &Obj) -> Result<BitEnum<ObjFlag>, WorldStateError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.object(obj)?.flags)
    }

    fn properties(&self, obj: &Obj) -> Result<Vec<PropDef>, WorldStateError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .object(obj)?
            .properties
            .iter()
            .map(|(def, _)| def.clone())
            .collect())
    }

    fn retrieve_property(
        &self,
        obj: &Obj,
        name: &str,
    ) -> Result<(Var, PropPerms), WorldStateError> {
        let inner = self.inner.lock().unwrap();
        let record = inner.object(obj)?;
        record
            .properties
            .iter()
            .find(|(def, _)| def.name() == name)
            .map(|(def, value)| (value.clone(), def.perms()))
            .ok_or_else(|| WorldStateError::PropertyNotFound(*obj, name.to_string()))
    }

    fn update_property(
        &self,
        obj: &Obj,
        name: &str,
        value: &Var,
    ) -> Result<(), WorldStateError> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.object_mut(obj)?;
        let slot = record
            .properties
            .iter_mut()
            .find(|(def, _)| def.name() == name)
            .ok_or_else(|| WorldStateError::PropertyNotFound(*obj, name.to_string()))?;
        slot.1 = value.clone();
        Ok(())
    }

    fn define_property(
        &self,
        obj: &Obj,
        name: &str,
        value: Var,
        perms: PropPerms,
    ) -> Result<(), WorldStateError> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.object_mut(obj)?;
        if record.properties.iter().any(|(def, _)| def.name() == name) {
            return Err(WorldStateError::DuplicatePropertyDefinition(
                *obj,
                name.to_string(),
            ));
        }
        record.properties.push((PropDef::new(name, perms), value));
        Ok(())
    }

    fn update_property_atomic(
        &self,
        obj: &Obj,
        name: &str,
        f: &mut dyn FnMut(Option<&Var>) -> Result<Option<Var>, WorldStateError>,
    ) -> Result<(), WorldStateError> {
        // The whole read-modify-write happens under the table lock.
        let mut inner = self.inner.lock().unwrap();
        let record = inner.object_mut(obj)?;
        let slot = record
            .properties
            .iter_mut()
            .find(|(def, _)| def.name() == name);
        match slot {
            Some((_, value)) => {
                if let Some(new_value) = f(Some(value))? {
                    *value = new_value;
                }
                Ok(())
            }
            None => {
                // Absent property: the closure still decides, but there is
                // nowhere to write back to.
                f(None)?;
                Ok(())
            }
        }
    }

    fn find_method_verb_on(
        &self,
        obj: &Obj,
        name: &str,
    ) -> Result<ResolvedVerb, WorldStateError> {
        let inner = self.inner.lock().unwrap();
        let mut search = *obj;
        while !search.is_nothing() {
            let record = inner.object(&search)?;
            if let Some(vr) = record.verbs.iter().find(|vr| vr.def.name() == name) {
                return Ok(ResolvedVerb {
                    location: search,
                    def: vr.def.clone(),
                    program: vr.program.clone(),
                });
            }
            search = record.parent;
        }
        Err(WorldStateError::VerbNotFound(*obj, name.to_string()))
    }

    fn add_verb(
        &self,
        obj: &Obj,
        def: VerbDef,
        program: Arc<dyn VerbProgram>,
    ) -> Result<(), WorldStateError> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.object_mut(obj)?;
        if record.verbs.iter().any(|vr| vr.def.name() == def.name()) {
            return Err(WorldStateError::DuplicateVerb(
                *obj,
                def.name().to_string(),
            ));
        }
        record.verbs.push(VerbRecord { def, program });
        Ok(())
    }

    fn user_of(&self, obj: &Obj) -> Result<Option<UserId>, WorldStateError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.object(obj)?.user)
    }

    fn set_user_of(&self, obj: &Obj, user: UserId) -> Result<(), WorldStateError> {
        let mut inner = self.inner.lock().unwrap();
        inner.object_mut(obj)?.user = Some(user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moo_common::model::PropFlag;
    use moo_var::{Error, NOTHING, v_int, v_str};
    use pretty_assertions::assert_eq;

    fn mk_db() -> MemDb {
        MemDb::new()
    }

    #[test]
    fn test_create_and_attrs() {
        let db = mk_db();
        let o = db
            .create_object(ObjAttrs::new("thing"))
            .unwrap();
        assert_eq!(db.name_of(&o).unwrap(), "thing");
        // No explicit owner: self-owned.
        assert_eq!(db.owner_of(&o).unwrap(), o);
        assert_eq!(db.location_of(&o).unwrap(), NOTHING);
        assert!(db.valid(&o).unwrap());

        db.recycle_object(&o).unwrap();
        assert!(!db.valid(&o).unwrap());
        assert_eq!(
            db.name_of(&o),
            Err(WorldStateError::ObjectNotFound(o))
        );
    }

    #[test]
    fn test_create_rejects_bad_parent() {
        let db = mk_db();
        let attrs = ObjAttrs::new("orphan").parent(Obj::mk_id(99));
        assert_eq!(
            db.create_object(attrs),
            Err(WorldStateError::ObjectNotFound(Obj::mk_id(99)))
        );
    }

    #[test]
    fn test_property_define_retrieve_update() {
        let db = mk_db();
        let o = db.create_object(ObjAttrs::new("thing")).unwrap();
        let perms = PropPerms::new(o, PropFlag::rw());
        db.define_property(&o, "description", v_str("dusty"), perms)
            .unwrap();
        assert_eq!(
            db.define_property(&o, "description", v_str("dup"), perms),
            Err(WorldStateError::DuplicatePropertyDefinition(
                o,
                "description".into()
            ))
        );
        let (value, got_perms) = db.retrieve_property(&o, "description").unwrap();
        assert_eq!(value, v_str("dusty"));
        assert_eq!(got_perms, perms);

        db.update_property(&o, "description", &v_str("clean")).unwrap();
        assert_eq!(db.retrieve_property(&o, "description").unwrap().0, v_str("clean"));
    }

    #[test]
    fn test_update_property_atomic() {
        let db = mk_db();
        let o = db.create_object(ObjAttrs::new("thing")).unwrap();
        db.define_property(&o, "counter", v_int(3), PropPerms::new(o, PropFlag::rw()))
            .unwrap();

        db.update_property_atomic(&o, "counter", &mut |v| {
            let n = v.and_then(Var::as_int).unwrap();
            Ok(Some(v_int(n - 1)))
        })
        .unwrap();
        assert_eq!(db.retrieve_property(&o, "counter").unwrap().0, v_int(2));

        // Closure error: no mutation.
        let res = db.update_property_atomic(&o, "counter", &mut |_| {
            Err(WorldStateError::QuotaExhausted(o))
        });
        assert_eq!(res, Err(WorldStateError::QuotaExhausted(o)));
        assert_eq!(db.retrieve_property(&o, "counter").unwrap().0, v_int(2));

        // Absent property: closure runs, nothing stored.
        db.update_property_atomic(&o, "missing", &mut |v| {
            assert!(v.is_none());
            Ok(None)
        })
        .unwrap();
        assert_eq!(
            db.retrieve_property(&o, "missing"),
            Err(WorldStateError::PropertyNotFound(o, "missing".into()))
        );
    }

    #[test]
    fn test_verb_resolution_walks_parents() {
        let db = mk_db();
        let grandparent = db.create_object(ObjAttrs::new("gp")).unwrap();
        let parent = db
            .create_object(ObjAttrs::new("p").parent(grandparent))
            .unwrap();
        let child = db
            .create_object(ObjAttrs::new("c").parent(parent))
            .unwrap();

        db.add_verb(
            &grandparent,
            VerbDef::new("describe", grandparent),
            Arc::new(|_args: &[Var]| -> Result<Var, Error> { Ok(v_str("from gp")) }),
        )
        .unwrap();

        let resolved = db.find_method_verb_on(&child, "describe").unwrap();
        assert_eq!(resolved.location, grandparent);
        assert_eq!(resolved.program.call(&[]).unwrap(), v_str("from gp"));

        let err = db.find_method_verb_on(&child, "nonesuch").unwrap_err();
        assert_eq!(err, WorldStateError::VerbNotFound(child, "nonesuch".into()));
    }

    #[test]
    fn test_user_mapping() {
        let db = mk_db();
        let avatar = db.create_object(ObjAttrs::new("avatar")).unwrap();
        assert_eq!(db.user_of(&avatar).unwrap(), None);
        db.set_user_of(&avatar, UserId(42)).unwrap();
        assert_eq!(db.user_of(&avatar).unwrap(), Some(UserId(42)));
    }
}
