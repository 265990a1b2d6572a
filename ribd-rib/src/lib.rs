//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod af;
pub mod attribute;
pub mod client;
pub mod debug;
pub mod path;
pub mod selection;
pub mod table;

pub use af::{AddressFamily, Ipv4Unicast, Ipv6Unicast};
pub use attribute::{AttrSet, AttrStore, Attrs};
pub use client::{ChannelClient, ClientOptions, RouteTableClient, RouteUpdate};
pub use path::{Path, SourceId, SourceIdAllocator};
pub use table::RoutingTable;
