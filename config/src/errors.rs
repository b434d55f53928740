// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

use net::{IllegalInterfaceName, InvalidVni};

/// Alias for validation/conversion results.
pub type ConfigResult = Result<(), ConfigError>;

/// Errors raised while validating the declared resource set or converting
/// it into host configuration.
///
/// Validation errors name the offending resource; the same text is
/// reported into the per-resource status, so messages are written for the
/// user who declared the object.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("can't have more than one underlay")]
    MoreThanOneUnderlay,

    #[error("can't have more than one l3passthrough")]
    MoreThanOnePassthrough,

    #[error("underlay {0} must have a valid ASN")]
    InvalidUnderlayAsn(String),

    #[error("underlay {underlay} local ASN {asn} must be different from remote ASN {remote}")]
    UnderlayAsnClash {
        underlay: String,
        asn: u32,
        remote: u32,
    },

    #[error("invalid neighbor address {address} for underlay {underlay}")]
    InvalidNeighborAddress { underlay: String, address: String },

    #[error("invalid vtep CIDR format for underlay {underlay}: {cidr}")]
    InvalidVtepCidr { underlay: String, cidr: String },

    #[error("underlay {0} can only have one nic, found {1}")]
    TooManyNics(String, usize),

    #[error("invalid nic name for underlay {underlay}: {err}")]
    InvalidNicName {
        underlay: String,
        #[source]
        err: IllegalInterfaceName,
    },

    #[error("invalid vni for {name}: {err}")]
    InvalidVniValue {
        name: String,
        #[source]
        err: InvalidVni,
    },

    #[error("invalid vrf name for vni {name}: {err}")]
    InvalidVrfName {
        name: String,
        #[source]
        err: IllegalInterfaceName,
    },

    #[error("duplicate vrf {vrf}: {first} - {second}")]
    DuplicateVrf {
        vrf: String,
        first: String,
        second: String,
    },

    #[error("duplicate vni {vni}: {first} - {second}")]
    DuplicateVni {
        vni: u32,
        first: String,
        second: String,
    },

    #[error("vni {name} references vrf {vrf} but no l3vni declares it")]
    NoSuchVrf { name: String, vrf: String },

    #[error("invalid hostmaster name for vni {name}: {master} - {err}")]
    InvalidHostMasterName {
        name: String,
        master: String,
        #[source]
        err: IllegalInterfaceName,
    },

    #[error("invalid l2gatewayips for vni {name}: {reason}")]
    InvalidGatewayIps { name: String, reason: String },

    #[error("{session} local ASN {asn} must be different from remote ASN {remote}")]
    SessionAsnClash {
        session: String,
        asn: u32,
        remote: u32,
    },

    #[error("invalid local CIDR {cidr} for {session}")]
    InvalidSessionCidr { session: String, cidr: String },

    #[error("at least one local CIDR (IPv4 or IPv6) must be provided for {0}")]
    MissingLocalCidr(String),

    #[error("overlapping cidrs {first_cidr} - {second_cidr} for {first} - {second}")]
    OverlappingCidrs {
        first_cidr: String,
        second_cidr: String,
        first: String,
        second: String,
    },

    #[error("cidr {cidr} has no room for node index {index}")]
    CidrExhausted { cidr: String, index: u32 },

    /// Inconsistencies that validation should have ruled out.  Reaching
    /// this is a bug, not a user error.
    #[error("internal error: {0}")]
    Internal(String),
}
