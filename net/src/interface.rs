// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Linux interface names.

use std::fmt::{Display, Formatter};

/// The name of a Linux network interface.
///
/// Construction enforces the kernel's naming constraints: non-empty, at most
/// [`InterfaceName::MAX_LEN`] bytes, leading ASCII letter, remaining
/// characters alphanumeric or one of `.`, `_`, `-`.
///
/// The same grammar is applied to user-supplied VRF, NIC and bridge-master
/// names before any of them reach netlink.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct InterfaceName(String);

impl InterfaceName {
    /// Maximum length of an interface name (`IFNAMSIZ - 1`).
    pub const MAX_LEN: usize = 15;

    fn check(name: &str) -> Result<(), IllegalInterfaceName> {
        if name.is_empty() {
            return Err(IllegalInterfaceName::Empty);
        }
        if name.len() > Self::MAX_LEN {
            return Err(IllegalInterfaceName::TooLong(name.to_string()));
        }
        let mut chars = name.chars();
        let first = chars.next().unwrap_or_else(|| unreachable!());
        if !first.is_ascii_alphabetic() {
            return Err(IllegalInterfaceName::IllegalCharacters(name.to_string()));
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')) {
            return Err(IllegalInterfaceName::IllegalCharacters(name.to_string()));
        }
        Ok(())
    }
}

impl AsRef<str> for InterfaceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for InterfaceName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for InterfaceName {
    type Error = IllegalInterfaceName;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::check(name)?;
        Ok(InterfaceName(name.to_string()))
    }
}

impl TryFrom<String> for InterfaceName {
    type Error = IllegalInterfaceName;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::check(&name)?;
        Ok(InterfaceName(name))
    }
}

impl From<InterfaceName> for String {
    fn from(name: InterfaceName) -> String {
        name.0
    }
}

/// Errors that can occur when validating an [`InterfaceName`]
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IllegalInterfaceName {
    #[error("interface name cannot be empty")]
    Empty,
    #[error("interface name {0} can't be longer than {MAX} characters", MAX = InterfaceName::MAX_LEN)]
    TooLong(String),
    #[error("interface name {0} contains invalid characters")]
    IllegalCharacters(String),
}
