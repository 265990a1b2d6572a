//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;
use std::sync::Arc;

use ribd_rib::selection::BgpSelection;
use ribd_rib::{
    AddressFamily, ChannelClient, Ipv4Unicast, Ipv6Unicast, RouteTableClient,
    RouteUpdate, RoutingTable, SourceId,
};
use ribd_utils::UnboundedSender;
use ribd_utils::protocol::Protocol;
use ribd_utils::task::Task;

use crate::export::{ExportFilter, ExportPolicy};
use crate::packet::{Afi, Safi};
use crate::rib::Rib;
use crate::tasks;
use crate::tasks::messages::SessionMsg;

// BGP address-family specific code.
pub trait BgpAddressFamily: AddressFamily {
    const AFI: Afi;
    const SAFI: Safi;

    // Returns the Loc-RIB of this address family.
    fn loc_rib(rib: &Rib) -> &Arc<RoutingTable<Self>>;

    // Returns the session state of this address family.
    fn fsm_af(afs: &mut SessionAfs) -> &mut Option<FsmAddressFamily<Self>>;

    // Wraps an Adj-RIB-Out notification for the session mailbox.
    fn export_update(update: RouteUpdate<Self>) -> ExportUpdate;
}

// Per address-family session state, present once the family has been
// negotiated and the session is established.
#[derive(Debug, Default)]
pub struct SessionAfs {
    pub ipv4_unicast: Option<FsmAddressFamily<Ipv4Unicast>>,
    pub ipv6_unicast: Option<FsmAddressFamily<Ipv6Unicast>>,
}

#[derive(Debug)]
pub struct FsmAddressFamily<A: BgpAddressFamily> {
    pub adj_rib_in: Arc<RoutingTable<A>>,
    pub adj_rib_out: Arc<RoutingTable<A>>,
    pub updates_received: u64,
    pub updates_sent: u64,
    export: Arc<ExportFilter<A>>,
    forwarder: Task<()>,
}

#[derive(Debug)]
pub enum ExportUpdate {
    Ipv4Unicast(RouteUpdate<Ipv4Unicast>),
    Ipv6Unicast(RouteUpdate<Ipv6Unicast>),
}

// ===== impl FsmAddressFamily =====

impl<A> FsmAddressFamily<A>
where
    A: BgpAddressFamily,
{
    // Creates the session tables of this address family and hooks them to
    // the Loc-RIB.
    //
    // Registering the export filter replays the Loc-RIB, which produces the
    // initial routing update towards the peer.
    pub(crate) fn new(
        remote_addr: IpAddr,
        rib: &Rib,
        policy: ExportPolicy,
        generation: u64,
        session_msgp: &UnboundedSender<SessionMsg>,
    ) -> FsmAddressFamily<A> {
        let loc_rib = A::loc_rib(rib);

        let adj_rib_in = Arc::new(RoutingTable::new(
            Protocol::BGP,
            format!("adj-rib-in {} {}", remote_addr, A::AFI),
            BgpSelection,
        ));
        adj_rib_in.register(loc_rib.clone());

        let adj_rib_out = Arc::new(RoutingTable::new(
            Protocol::BGP,
            format!("adj-rib-out {} {}", remote_addr, A::AFI),
            BgpSelection,
        ));
        let (out_client, out_rx) = ChannelClient::channel();
        adj_rib_out.register(out_client);
        let forwarder =
            tasks::export_forwarder::<A>(out_rx, generation, session_msgp);

        let export = Arc::new(ExportFilter::new(
            policy,
            rib.peer_types.clone(),
            rib.attr_store.clone(),
            adj_rib_out.clone(),
        ));
        loc_rib.register(export.clone());

        FsmAddressFamily {
            adj_rib_in,
            adj_rib_out,
            updates_received: 0,
            updates_sent: 0,
            export,
            forwarder,
        }
    }

    // Detaches this address family from the Loc-RIB and withdraws every
    // route learned from the session.
    //
    // Once this returns, nothing originated by this address family can
    // reach the session or the Loc-RIB anymore.
    pub(crate) async fn stop(self, rib: &Rib, source: SourceId) {
        let loc_rib = A::loc_rib(rib);

        let export: Arc<dyn RouteTableClient<A>> = self.export;
        loc_rib.unregister(&export);
        self.forwarder.cancel().await;

        self.adj_rib_in.remove_source(source);
        let loc_rib_client: Arc<dyn RouteTableClient<A>> = loc_rib.clone();
        self.adj_rib_in.unregister(&loc_rib_client);

        drop(export);
        drop(self.adj_rib_in);
        drop(self.adj_rib_out);
        rib.attr_store.purge();
    }
}

// ===== impl Ipv4Unicast =====

impl BgpAddressFamily for Ipv4Unicast {
    const AFI: Afi = Afi::Ipv4;
    const SAFI: Safi = Safi::Unicast;

    fn loc_rib(rib: &Rib) -> &Arc<RoutingTable<Self>> {
        &rib.ipv4_unicast
    }

    fn fsm_af(afs: &mut SessionAfs) -> &mut Option<FsmAddressFamily<Self>> {
        &mut afs.ipv4_unicast
    }

    fn export_update(update: RouteUpdate<Self>) -> ExportUpdate {
        ExportUpdate::Ipv4Unicast(update)
    }
}

// ===== impl Ipv6Unicast =====

impl BgpAddressFamily for Ipv6Unicast {
    const AFI: Afi = Afi::Ipv6;
    const SAFI: Safi = Safi::Unicast;

    fn loc_rib(rib: &Rib) -> &Arc<RoutingTable<Self>> {
        &rib.ipv6_unicast
    }

    fn fsm_af(afs: &mut SessionAfs) -> &mut Option<FsmAddressFamily<Self>> {
        &mut afs.ipv6_unicast
    }

    fn export_update(update: RouteUpdate<Self>) -> ExportUpdate {
        ExportUpdate::Ipv6Unicast(update)
    }
}
