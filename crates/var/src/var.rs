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

use crate::error::Error;
use crate::obj::Obj;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The dynamically-typed value everything in the world speaks: property values,
/// verb arguments and results, and message payloads.
///
/// Serialization uses serde's externally-tagged representation, which is
/// self-describing; the broker envelope relies on that.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum Var {
    #[default]
    None,
    Int(i64),
    Float(f64),
    Str(String),
    Obj(Obj),
    Err(Error),
    List(Vec<Var>),
}

impl Var {
    /// MOO truthiness: zero, empty, and none are false.
    #[must_use]
    pub fn is_true(&self) -> bool {
        match self {
            Var::None => false,
            Var::Int(i) => *i != 0,
            Var::Float(f) => *f != 0.0,
            Var::Str(s) => !s.is_empty(),
            Var::Obj(_) => true,
            Var::Err(_) => false,
            Var::List(l) => !l.is_empty(),
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Var::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_obj(&self) -> Option<Obj> {
        match self {
            Var::Obj(o) => Some(*o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Var::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Display for Var {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Var::None => write!(f, "none"),
            Var::Int(i) => write!(f, "{i}"),
            Var::Float(fl) => write!(f, "{fl}"),
            Var::Str(s) => write!(f, "{s:?}"),
            Var::Obj(o) => write!(f, "{o}"),
            Var::Err(e) => write!(f, "{e}"),
            Var::List(l) => {
                write!(f, "{{")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

pub fn v_none() -> Var {
    Var::None
}

pub fn v_int(i: i64) -> Var {
    Var::Int(i)
}

pub fn v_float(f: f64) -> Var {
    Var::Float(f)
}

pub fn v_bool(b: bool) -> Var {
    Var::Int(i64::from(b))
}

pub fn v_str(s: &str) -> Var {
    Var::Str(s.to_string())
}

pub fn v_string(s: String) -> Var {
    Var::Str(s)
}

pub fn v_obj(o: Obj) -> Var {
    Var::Obj(o)
}

pub fn v_err(e: Error) -> Var {
    Var::Err(e)
}

pub fn v_list(l: &[Var]) -> Var {
    Var::List(l.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::E_PERM;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truthiness() {
        assert!(!v_none().is_true());
        assert!(!v_int(0).is_true());
        assert!(v_int(5).is_true());
        assert!(!v_str("").is_true());
        assert!(v_str("x").is_true());
        assert!(v_obj(Obj::mk_id(1)).is_true());
        assert!(!v_err(E_PERM.into()).is_true());
        assert!(!v_list(&[]).is_true());
        assert!(v_list(&[v_int(1)]).is_true());
    }

    #[test]
    fn test_json_round_trip_is_tagged() {
        let v = v_list(&[v_int(1), v_str("hi"), v_obj(Obj::mk_id(3))]);
        let encoded = serde_json::to_string(&v).unwrap();
        // Externally tagged: variant names appear in the wire form.
        assert!(encoded.contains("List"));
        assert!(encoded.contains("Int"));
        let decoded: Var = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, v);
    }
}
