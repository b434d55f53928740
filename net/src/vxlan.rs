// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! VXLAN network identifiers.

use std::fmt::{Display, Formatter};
use std::num::NonZero;

/// A [VXLAN][RFC7348] Network Identifier.
///
/// A `Vni` is a 24-bit value identifying one VXLAN overlay segment.
/// Value `0` is reserved by many implementations and is rejected, as is
/// anything above 2<sup>24</sup> - 1.
///
/// It is deliberately not possible to create a `Vni` from a `u32` directly;
/// use [`Vni::new`] so that illegal values cannot circulate through the
/// configuration model.
///
/// [RFC7348]: https://datatracker.ietf.org/doc/html/rfc7348#section-5
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(transparent)]
pub struct Vni(NonZero<u32>);

impl Vni {
    /// The minimum legal [`Vni`] value (1).
    pub const MIN: u32 = 1;
    /// The maximum legal [`Vni`] value (2<sup>24</sup> - 1).
    pub const MAX: u32 = 0x00_FF_FF_FF;

    /// Create a new [`Vni`] from a `u32`.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidVni`] error if the value is 0 or greater than
    /// [`Vni::MAX`].
    pub fn new(vni: u32) -> Result<Vni, InvalidVni> {
        match NonZero::<u32>::new(vni) {
            None => Err(InvalidVni::ReservedZero),
            _ if vni > Vni::MAX => Err(InvalidVni::TooLarge(vni)),
            Some(vni) => Ok(Vni(vni)),
        }
    }

    /// Get the value of the [`Vni`] as a `u32`.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0.get()
    }
}

impl Display for Vni {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

impl From<Vni> for u32 {
    fn from(vni: Vni) -> u32 {
        vni.as_u32()
    }
}

impl TryFrom<u32> for Vni {
    type Error = InvalidVni;

    fn try_from(vni: u32) -> Result<Vni, Self::Error> {
        Vni::new(vni)
    }
}

/// Errors that can occur when converting a `u32` to a [`Vni`]
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum InvalidVni {
    /// Zero is reserved in most EVPN / VXLAN implementations.
    #[error("Zero is not a legal Vni")]
    ReservedZero,
    /// Carries the (illegal) value used to attempt creation of a [`Vni`].
    #[error("The value {0} is too large to be a Vni (max is {MAX})", MAX = Vni::MAX)]
    TooLarge(u32),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;

    #[test]
    fn zero_is_not_a_legal_vni() {
        assert_eq!(Vni::new(0).unwrap_err(), InvalidVni::ReservedZero);
    }

    #[test]
    fn boundary_values() {
        assert_eq!(Vni::new(Vni::MIN).unwrap().as_u32(), 1);
        assert_eq!(Vni::new(Vni::MAX).unwrap().as_u32(), Vni::MAX);
        assert_eq!(
            Vni::new(Vni::MAX + 1).unwrap_err(),
            InvalidVni::TooLarge(Vni::MAX + 1)
        );
        assert_eq!(
            Vni::new(u32::MAX).unwrap_err(),
            InvalidVni::TooLarge(u32::MAX)
        );
    }

    #[test]
    fn serde_round_trip() {
        let vni = Vni::new(110).unwrap();
        let json = serde_json::to_string(&vni).unwrap();
        assert_eq!(json, "110");
        assert_eq!(serde_json::from_str::<Vni>(&json).unwrap(), vni);
        assert!(serde_json::from_str::<Vni>("0").is_err());
    }
}
