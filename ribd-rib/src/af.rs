//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{Ipv4Addr, Ipv6Addr};

use ipnetwork::{Ipv4Network, Ipv6Network};
use ribd_utils::ip::{self, IpAddrKind, IpNetworkKind};

// Address-family specific types used to key routing tables.
pub trait AddressFamily:
    std::fmt::Debug + Clone + Copy + Eq + Send + Sync + 'static
{
    const ADDRESS_FAMILY: ip::AddressFamily =
        <Self::IpAddr as IpAddrKind>::ADDRESS_FAMILY;

    // The type of IP address used by this address family.
    type IpAddr: IpAddrKind;
    // The type of IP network used by this address family.
    type IpNetwork: IpNetworkKind<Self::IpAddr> + prefix_trie::Prefix;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv4Unicast;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv6Unicast;

// ===== impl Ipv4Unicast =====

impl AddressFamily for Ipv4Unicast {
    type IpAddr = Ipv4Addr;
    type IpNetwork = Ipv4Network;
}

// ===== impl Ipv6Unicast =====

impl AddressFamily for Ipv6Unicast {
    type IpAddr = Ipv6Addr;
    type IpNetwork = Ipv6Network;
}
