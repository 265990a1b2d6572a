//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use ribd_rib::selection::BgpSelection;
use ribd_rib::{AttrStore, Ipv4Unicast, Ipv6Unicast, RoutingTable, SourceId};
use ribd_utils::protocol::Protocol;

use crate::session::PeerType;

// Routing state shared by every session of a BGP instance.
#[derive(Debug)]
pub struct Rib {
    pub attr_store: Arc<AttrStore>,
    pub ipv4_unicast: Arc<RoutingTable<Ipv4Unicast>>,
    pub ipv6_unicast: Arc<RoutingTable<Ipv6Unicast>>,
    pub(crate) peer_types: Arc<PeerTypes>,
}

// Peer type of every known path source.
#[derive(Debug, Default)]
pub struct PeerTypes(RwLock<BTreeMap<SourceId, PeerType>>);

// ===== impl Rib =====

impl Rib {
    pub fn peer_type(&self, source: SourceId) -> Option<PeerType> {
        self.peer_types.get(source)
    }
}

impl Default for Rib {
    fn default() -> Rib {
        Rib {
            attr_store: Default::default(),
            ipv4_unicast: Arc::new(RoutingTable::new(
                Protocol::BGP,
                "loc-rib ipv4-unicast",
                BgpSelection,
            )),
            ipv6_unicast: Arc::new(RoutingTable::new(
                Protocol::BGP,
                "loc-rib ipv6-unicast",
                BgpSelection,
            )),
            peer_types: Default::default(),
        }
    }
}

// ===== impl PeerTypes =====

impl PeerTypes {
    pub(crate) fn insert(&self, source: SourceId, peer_type: PeerType) {
        self.0.write().unwrap().insert(source, peer_type);
    }

    pub(crate) fn remove(&self, source: SourceId) {
        self.0.write().unwrap().remove(&source);
    }

    pub(crate) fn get(&self, source: SourceId) -> Option<PeerType> {
        self.0.read().unwrap().get(&source).copied()
    }
}
