//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ribd_bgp::packet::UpdateMsg;
use ribd_rib::selection::BgpSelection;
use ribd_rib::{
    AddressFamily, AttrStore, Ipv4Unicast, Ipv6Unicast, Path,
    RouteTableClient, RoutingTable, SourceId, SourceIdAllocator,
};
use ribd_utils::ip::IpNetworkKind;
use ribd_utils::protocol::Protocol;

use crate::debug::Debug;
use crate::error::Error;
use crate::packet::{
    BmpMsg, InitiationMsg, MirroringInfo, MirroringTlv, PeerDownMsg,
    PeerDownReason, PeerKey, PeerUpMsg, RouteMirroringMsg,
    RouteMonitoringMsg,
};

// Monitoring station: the set of routers currently connected to it.
#[derive(Debug, Default)]
pub struct BmpStation {
    routers: BTreeMap<IpAddr, BmpRouter>,
}

// State kept for one monitored router.
//
// Every monitored peer owns one Adj-RIB-In per address family. Paths carry
// the peer's source identifier, which is unique within the router.
#[derive(Debug)]
pub struct BmpRouter {
    pub address: IpAddr,
    pub sys_name: Option<String>,
    pub sys_descr: Option<String>,
    initiated: bool,
    attr_store: Arc<AttrStore>,
    peers: BTreeMap<PeerKey, MonitoredPeer>,
    sources: SourceIdAllocator,
}

#[derive(Debug)]
pub struct MonitoredPeer {
    pub source: SourceId,
    pub peer_as: u32,
    pub peer_bgp_id: Ipv4Addr,
    pub up_since: DateTime<Utc>,
    pub ipv4_unicast: Arc<RoutingTable<Ipv4Unicast>>,
    pub ipv6_unicast: Arc<RoutingTable<Ipv6Unicast>>,
    pub statistics: PeerStatistics,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PeerStatistics {
    pub route_monitoring: u64,
    pub mirrored_messages: u64,
    pub lost_messages: u64,
}

// BMP address-family specific code.
pub trait BmpAddressFamily: AddressFamily {
    // Returns the Adj-RIB-In of this address family.
    fn table(peer: &MonitoredPeer) -> &Arc<RoutingTable<Self>>;
}

// ===== impl BmpStation =====

impl BmpStation {
    // Starts monitoring a newly connected router.
    pub fn router_add(&mut self, address: IpAddr) -> Result<(), Error> {
        if self.routers.contains_key(&address) {
            return Err(Error::RouterExists(address));
        }

        self.routers.insert(address, BmpRouter::new(address));
        Ok(())
    }

    // Stops monitoring a router whose connection went down.
    //
    // Every route learned through the router is withdrawn.
    pub fn router_remove(&mut self, address: IpAddr) -> Result<(), Error> {
        let mut router = self
            .routers
            .remove(&address)
            .ok_or(Error::RouterNotFound(address))?;
        router.peers_stop();
        Debug::RouterDelete(&address).log();
        Ok(())
    }

    // Processes a message received from a monitored router.
    pub fn process(
        &mut self,
        address: IpAddr,
        msg: BmpMsg,
    ) -> Result<(), Error> {
        let router = self
            .routers
            .get_mut(&address)
            .ok_or(Error::RouterNotFound(address))?;

        let terminate = matches!(msg, BmpMsg::Termination(_));
        router.process(msg)?;
        if terminate {
            self.router_remove(address)?;
        }
        Ok(())
    }

    pub fn router(&self, address: IpAddr) -> Option<&BmpRouter> {
        self.routers.get(&address)
    }

    pub fn routers(&self) -> impl Iterator<Item = &BmpRouter> + '_ {
        self.routers.values()
    }
}

// ===== impl BmpRouter =====

impl BmpRouter {
    pub fn new(address: IpAddr) -> BmpRouter {
        Debug::RouterCreate(&address).log();
        BmpRouter {
            address,
            sys_name: None,
            sys_descr: None,
            initiated: false,
            attr_store: Default::default(),
            peers: Default::default(),
            sources: Default::default(),
        }
    }

    // Processes a message received from the router.
    //
    // The Initiation message must come first.
    pub fn process(&mut self, msg: BmpMsg) -> Result<(), Error> {
        Debug::MsgRx(&self.address, &msg).log();

        match msg {
            BmpMsg::Initiation(msg) => {
                self.initiation(msg);
                Ok(())
            }
            _ if !self.initiated => Err(Error::NotInitiated(self.address)),
            BmpMsg::PeerUp(msg) => self.peer_up(msg),
            BmpMsg::RouteMonitoring(msg) => self.route_monitoring(msg),
            BmpMsg::PeerDown(msg) => self.peer_down(msg),
            BmpMsg::RouteMirroring(msg) => self.route_mirroring(msg),
            BmpMsg::Termination(_) => {
                self.peers_stop();
                Ok(())
            }
        }
    }

    pub fn peer(&self, key: &PeerKey) -> Option<&MonitoredPeer> {
        self.peers.get(key)
    }

    pub fn peers(&self) -> impl Iterator<Item = (&PeerKey, &MonitoredPeer)> {
        self.peers.iter()
    }

    pub fn attr_store(&self) -> &Arc<AttrStore> {
        &self.attr_store
    }

    // Registers a client on the Adj-RIB-In of a monitored peer.
    pub fn register<A>(
        &self,
        key: &PeerKey,
        client: Arc<dyn RouteTableClient<A>>,
    ) -> Result<bool, Error>
    where
        A: BmpAddressFamily,
    {
        let peer = self.peer_get(key)?;
        Ok(A::table(peer).register(client))
    }

    pub fn unregister<A>(
        &self,
        key: &PeerKey,
        client: &Arc<dyn RouteTableClient<A>>,
    ) -> Result<bool, Error>
    where
        A: BmpAddressFamily,
    {
        let peer = self.peer_get(key)?;
        Ok(A::table(peer).unregister(client))
    }

    fn initiation(&mut self, msg: InitiationMsg) {
        Debug::RouterInitiated(&self.address, msg.sys_name.as_deref()).log();
        self.initiated = true;
        self.sys_name = msg.sys_name;
        self.sys_descr = msg.sys_descr;
    }

    fn peer_up(&mut self, msg: PeerUpMsg) -> Result<(), Error> {
        let header = msg.peer_header;
        let key = header.key();
        if self.peers.contains_key(&key) {
            return Err(Error::PeerExists(self.address, key));
        }

        let source = self.sources.allocate();
        let peer = MonitoredPeer {
            source,
            peer_as: header.peer_as,
            peer_bgp_id: header.peer_bgp_id,
            up_since: header.timestamp.unwrap_or_else(Utc::now),
            ipv4_unicast: adj_rib_in(self.address, &key),
            ipv6_unicast: adj_rib_in(self.address, &key),
            statistics: Default::default(),
        };
        Debug::PeerUp(&self.address, &key, source).log();
        self.peers.insert(key, peer);
        Ok(())
    }

    fn route_monitoring(
        &mut self,
        msg: RouteMonitoringMsg,
    ) -> Result<(), Error> {
        let key = msg.peer_header.key();
        let peer = self
            .peers
            .get_mut(&key)
            .ok_or(Error::PeerNotFound(self.address, key))?;

        peer.statistics.route_monitoring += 1;
        update_apply::<Ipv4Unicast>(peer, &self.attr_store, &msg.update);
        update_apply::<Ipv6Unicast>(peer, &self.attr_store, &msg.update);
        Ok(())
    }

    fn peer_down(&mut self, msg: PeerDownMsg) -> Result<(), Error> {
        let key = msg.peer_header.key();
        let peer = self
            .peers
            .remove(&key)
            .ok_or(Error::PeerNotFound(self.address, key))?;

        self.sources.release(peer.source);
        peer.stop();
        self.attr_store.purge();
        Debug::PeerDown(&self.address, &key, &msg.reason).log();
        Ok(())
    }

    // Mirrored messages are only accounted.
    fn route_mirroring(
        &mut self,
        msg: RouteMirroringMsg,
    ) -> Result<(), Error> {
        let key = msg.peer_header.key();
        let peer = self
            .peers
            .get_mut(&key)
            .ok_or(Error::PeerNotFound(self.address, key))?;

        for tlv in &msg.tlvs {
            match tlv {
                MirroringTlv::BgpMessage(_) => {
                    peer.statistics.mirrored_messages += 1;
                }
                MirroringTlv::Information(MirroringInfo::MessagesLost) => {
                    peer.statistics.lost_messages += 1;
                    Debug::MessagesLost(&self.address, &key).log();
                }
                MirroringTlv::Information(MirroringInfo::ErroredPdu) => {}
            }
        }
        Ok(())
    }

    // Drops every monitored peer along with its routes.
    fn peers_stop(&mut self) {
        for (key, peer) in std::mem::take(&mut self.peers) {
            self.sources.release(peer.source);
            peer.stop();
            Debug::PeerDown(
                &self.address,
                &key,
                &PeerDownReason::RemoteNoNotification,
            )
            .log();
        }
        self.attr_store.purge();
    }

    fn peer_get(&self, key: &PeerKey) -> Result<&MonitoredPeer, Error> {
        self.peers
            .get(key)
            .ok_or(Error::PeerNotFound(self.address, *key))
    }
}

// ===== impl MonitoredPeer =====

impl MonitoredPeer {
    // Withdraws every route learned from the peer.
    fn stop(self) {
        self.ipv4_unicast.remove_source(self.source);
        self.ipv6_unicast.remove_source(self.source);
    }

    pub fn route_count(&self) -> usize {
        self.ipv4_unicast.route_count() + self.ipv6_unicast.route_count()
    }
}

// ===== impl Ipv4Unicast =====

impl BmpAddressFamily for Ipv4Unicast {
    fn table(peer: &MonitoredPeer) -> &Arc<RoutingTable<Self>> {
        &peer.ipv4_unicast
    }
}

// ===== impl Ipv6Unicast =====

impl BmpAddressFamily for Ipv6Unicast {
    fn table(peer: &MonitoredPeer) -> &Arc<RoutingTable<Self>> {
        &peer.ipv6_unicast
    }
}

// ===== helper functions =====

fn adj_rib_in<A>(router: IpAddr, key: &PeerKey) -> Arc<RoutingTable<A>>
where
    A: AddressFamily,
{
    let name = format!(
        "bmp {} adj-rib-in {} {}",
        router,
        key,
        A::ADDRESS_FAMILY
    );
    Arc::new(RoutingTable::new(Protocol::BMP, name, BgpSelection))
}

fn update_apply<A>(
    peer: &MonitoredPeer,
    attr_store: &AttrStore,
    msg: &UpdateMsg,
) where
    A: BmpAddressFamily,
{
    let table = A::table(peer);

    let unreach = msg.unreach.iter().filter_map(|prefix| {
        <A::IpNetwork as IpNetworkKind<A::IpAddr>>::get(*prefix)
    });
    for prefix in unreach {
        table.remove_path(prefix, peer.source);
    }
    for (prefix, attrs) in &msg.reach {
        let Some(prefix) =
            <A::IpNetwork as IpNetworkKind<A::IpAddr>>::get(*prefix)
        else {
            continue;
        };
        let path = Path::new(peer.source, attr_store.get(attrs.clone()));
        table.add_path(prefix, path);
    }
}
