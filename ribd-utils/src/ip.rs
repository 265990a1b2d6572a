//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

// Address of a single family.
pub trait IpAddrKind:
    std::fmt::Debug
    + std::fmt::Display
    + Copy
    + Ord
    + std::hash::Hash
    + Send
    + Sync
    + DeserializeOwned
    + Serialize
    + Into<IpAddr>
{
    const ADDRESS_FAMILY: AddressFamily;
}

// Prefix of a single family, usable as a routing table key.
pub trait IpNetworkKind<I: IpAddrKind>:
    std::fmt::Debug
    + std::fmt::Display
    + Copy
    + Ord
    + std::hash::Hash
    + Send
    + Sync
    + DeserializeOwned
    + Serialize
    + Into<IpNetwork>
{
    // Narrows a prefix of any family down to this one.
    fn get(prefix: IpNetwork) -> Option<Self>;

    // Canonical form of the prefix, with all host bits cleared.
    #[must_use]
    fn apply_mask(&self) -> Self;

    // Host prefix (/32 or /128) of the given address.
    fn host(addr: I) -> Self;

    // Immediate supernet of the prefix, or `None` for the default route.
    fn supernet(&self) -> Option<Self>;
}

// ===== impl AddressFamily =====

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

// ===== impl IpAddrKind / IpNetworkKind =====

macro_rules! ip_kind {
    ($addr:ty, $network:ident, $af:ident, $variant:ident) => {
        impl IpAddrKind for $addr {
            const ADDRESS_FAMILY: AddressFamily = AddressFamily::$af;
        }

        impl IpNetworkKind<$addr> for $network {
            fn get(prefix: IpNetwork) -> Option<Self> {
                match prefix {
                    IpNetwork::$variant(prefix) => Some(prefix),
                    _ => None,
                }
            }

            fn apply_mask(&self) -> Self {
                // The network address always fits the prefix length.
                $network::new(self.network(), self.prefix()).unwrap_or(*self)
            }

            fn host(addr: $addr) -> Self {
                $network::from(addr)
            }

            fn supernet(&self) -> Option<Self> {
                let plen = self.prefix().checked_sub(1)?;
                $network::new(self.ip(), plen)
                    .ok()
                    .map(|prefix| prefix.apply_mask())
            }
        }
    };
}

ip_kind!(Ipv4Addr, Ipv4Network, Ipv4, V4);
ip_kind!(Ipv6Addr, Ipv6Network, Ipv6, V6);

// ===== unit tests =====
