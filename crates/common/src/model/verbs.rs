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

use moo_var::{Error, Obj, Var};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// The definition of a verb on an object. Verb *bodies* are opaque to this
/// core (there is no scripting language surface here); see [`VerbProgram`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerbDef {
    name: String,
    owner: Obj,
}

impl VerbDef {
    pub fn new(name: impl Into<String>, owner: Obj) -> Self {
        Self {
            name: name.into(),
            owner,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn owner(&self) -> Obj {
        self.owner
    }
}

/// An opaque, invokable verb body. Implementations read the ambient execution
/// context (caller, writer, world) rather than taking it as parameters.
pub trait VerbProgram: Send + Sync {
    fn call(&self, args: &[Var]) -> Result<Var, Error>;
}

impl<F> VerbProgram for F
where
    F: Fn(&[Var]) -> Result<Var, Error> + Send + Sync,
{
    fn call(&self, args: &[Var]) -> Result<Var, Error> {
        self(args)
    }
}

/// The result of method-style verb resolution: where on the parent chain the
/// verb was found, its definition, and its program.
#[derive(Clone)]
pub struct ResolvedVerb {
    pub location: Obj,
    pub def: VerbDef,
    pub program: Arc<dyn VerbProgram>,
}

impl Debug for ResolvedVerb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedVerb")
            .field("location", &self.location)
            .field("def", &self.def)
            .finish_non_exhaustive()
    }
}
