//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::error::Error;

// Multicast MAC address used by point-to-point hellos.
pub const ALL_P2P_ISS: Snpa = [0x09, 0x00, 0x2b, 0x00, 0x00, 0x05];

// Subnetwork point of attachment (MAC address).
pub type Snpa = [u8; 6];

// Represents an IS-IS System ID.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct SystemId([u8; 6]);

// Represents an IS-IS LSP ID.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct LspId {
    pub system_id: SystemId,
    pub pseudonode: u8,
    pub fragment: u8,
}

// Decoded IS-IS PDU, as handed over by the packet collaborator.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Pdu {
    P2pHello(P2pHello),
    Lsp(Lsp),
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct P2pHello {
    pub source: SystemId,
    pub holdtime: u16,
    pub three_way: Option<ThreeWayTlv>,
    pub ipv4_addrs: Vec<Ipv4Addr>,
    pub ipv6_addrs: Vec<Ipv6Addr>,
}

// Point-to-Point Three-Way Adjacency TLV (RFC 5303).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ThreeWayTlv {
    pub state: ThreeWayState,
    pub neighbor: Option<SystemId>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ThreeWayState {
    Up = 0,
    Initializing = 1,
    Down = 2,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Lsp {
    pub lsp_id: LspId,
    pub seqno: u32,
    pub ip_reach: Vec<IpReach>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct IpReach {
    pub prefix: IpNetwork,
    pub metric: u32,
}

// ===== impl SystemId =====

impl SystemId {
    pub const fn from_bytes(bytes: [u8; 6]) -> SystemId {
        SystemId(bytes)
    }
}

impl AsRef<[u8; 6]> for SystemId {
    fn as_ref(&self) -> &[u8; 6] {
        &self.0
    }
}

impl From<[u8; 6]> for SystemId {
    fn from(bytes: [u8; 6]) -> SystemId {
        SystemId(bytes)
    }
}

impl FromStr for SystemId {
    type Err = Error;

    // Parses the dotted "xxxx.xxxx.xxxx" notation.
    fn from_str(s: &str) -> Result<SystemId, Error> {
        let invalid = || Error::InvalidSystemId(s.to_owned());

        let groups = s.split('.').collect::<Vec<_>>();
        if groups.len() != 3 {
            return Err(invalid());
        }

        let mut bytes = [0; 6];
        for (i, group) in groups.iter().enumerate() {
            if group.len() != 4 {
                return Err(invalid());
            }
            let value = u16::from_str_radix(group, 16).map_err(|_| invalid())?;
            bytes[i * 2..i * 2 + 2].copy_from_slice(&value.to_be_bytes());
        }
        Ok(SystemId(bytes))
    }
}

impl TryFrom<String> for SystemId {
    type Error = Error;

    fn try_from(s: String) -> Result<SystemId, Error> {
        s.parse()
    }
}

impl From<SystemId> for String {
    fn from(system_id: SystemId) -> String {
        system_id.to_string()
    }
}

impl std::fmt::Display for SystemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}.{:02x}{:02x}.{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

// ===== impl LspId =====

impl LspId {
    pub fn new(system_id: SystemId) -> LspId {
        LspId {
            system_id,
            pseudonode: 0,
            fragment: 0,
        }
    }
}

// ===== unit tests =====
