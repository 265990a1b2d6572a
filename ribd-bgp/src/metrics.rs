//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use ribd_rib::{AddressFamily, RoutingTable};
use serde::Serialize;

use crate::packet::{Afi, Safi};
use crate::session::{SessionStatus, fsm};

// Table whose route count can be sampled.
pub trait RouteCount: std::fmt::Debug + Send + Sync {
    fn route_count(&self) -> usize;
}

// Snapshot of the BGP instance, one entry per active session.
#[derive(Debug, Default)]
#[derive(Serialize)]
pub struct BgpMetrics {
    pub peers: Vec<BgpPeerMetrics>,
}

#[derive(Debug)]
#[derive(Serialize)]
pub struct BgpPeerMetrics {
    pub asn: u32,
    pub local_asn: u32,
    pub address: IpAddr,
    pub state: fsm::State,
    pub msgs_received: u64,
    pub msgs_sent: u64,
    pub updates_received: u64,
    pub updates_sent: u64,
    pub afs: Vec<BgpAfMetrics>,
}

#[derive(Debug)]
#[derive(Serialize)]
pub struct BgpAfMetrics {
    pub afi: Afi,
    pub safi: Safi,
    pub routes_received: usize,
    pub routes_sent: usize,
}

// ===== impl RoutingTable =====

impl<A> RouteCount for RoutingTable<A>
where
    A: AddressFamily,
{
    fn route_count(&self) -> usize {
        RoutingTable::route_count(self)
    }
}

// ===== impl BgpPeerMetrics =====

impl BgpPeerMetrics {
    // Returns the metrics of a session, or `None` if it's idle.
    pub(crate) fn new(
        address: IpAddr,
        asn: u32,
        local_asn: u32,
        status: &SessionStatus,
    ) -> Option<BgpPeerMetrics> {
        if status.state == fsm::State::Idle {
            return None;
        }

        let statistics = &status.statistics;
        let afs = status
            .afs
            .iter()
            .map(|af| BgpAfMetrics {
                afi: af.afi,
                safi: af.safi,
                routes_received: af.adj_rib_in.route_count(),
                routes_sent: af.adj_rib_out.route_count(),
            })
            .collect();

        Some(BgpPeerMetrics {
            asn,
            local_asn,
            address,
            state: status.state,
            msgs_received: statistics.msgs_rcvd.total(),
            msgs_sent: statistics.msgs_sent.total(),
            updates_received: statistics.msgs_rcvd.updates,
            updates_sent: statistics.msgs_sent.updates,
            afs,
        })
    }
}
