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
use std::fmt::{Debug, Display, Formatter};
use strum::Display as StrumDisplay;

/// A MOO-level error value, as raised into (and caught by) verb code.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Error {
    pub err_type: ErrorCode,
    pub msg: Option<Box<String>>,
}

impl Error {
    pub fn new(err_type: ErrorCode, msg: Option<String>) -> Self {
        Self {
            err_type,
            msg: msg.map(Box::new),
        }
    }

    pub fn message(&self) -> String {
        match &self.msg {
            Some(msg) => msg.as_ref().clone(),
            None => self.err_type.default_message().to_string(),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err_type)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.msg.is_some() {
            write!(f, "{} ({})", self.err_type, self.message())
        } else {
            write!(f, "{}", self.err_type)
        }
    }
}

impl std::error::Error for Error {}

impl From<ErrorCode> for Error {
    fn from(err_type: ErrorCode) -> Self {
        Self::new(err_type, None)
    }
}

#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, StrumDisplay, Serialize, Deserialize,
)]
#[allow(non_camel_case_types)]
pub enum ErrorCode {
    E_NONE,
    E_TYPE,
    E_PERM,
    E_PROPNF,
    E_VERBNF,
    E_INVIND,
    E_ARGS,
    E_NACC,
    E_INVARG,
    E_QUOTA,
}

impl ErrorCode {
    /// Attach a message to this code, producing a full error value.
    pub fn msg<S: ToString>(self, s: S) -> Error {
        Error::new(self, Some(s.to_string()))
    }

    pub fn default_message(&self) -> &'static str {
        use ErrorCode::*;
        match self {
            E_NONE => "No error",
            E_TYPE => "Type mismatch",
            E_PERM => "Permission denied",
            E_PROPNF => "Property not found",
            E_VERBNF => "Verb not found",
            E_INVIND => "Invalid indirection",
            E_ARGS => "Incorrect number of arguments",
            E_NACC => "Move refused by destination",
            E_INVARG => "Invalid argument",
            E_QUOTA => "Resource limit exceeded",
        }
    }
}
