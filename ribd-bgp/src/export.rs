//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;
use std::sync::Arc;

use ribd_rib::{AttrStore, Path, RouteTableClient, RoutingTable, SourceId};

use crate::af::BgpAddressFamily;
use crate::rib::PeerTypes;
use crate::session::PeerType;

// Outbound parameters of one session.
#[derive(Clone, Debug)]
pub struct ExportPolicy {
    pub source: SourceId,
    pub peer_type: PeerType,
    pub peer_as: u32,
    pub local_as: u32,
    pub local_addr: IpAddr,
}

// Loc-RIB client that feeds the Adj-RIB-Out of one session.
//
// Only routes eligible for distribution to the session's peer are
// re-propagated, with their attributes rewritten for advertisement. Every
// path in the Adj-RIB-Out carries the session's own source identifier.
#[derive(Debug)]
pub struct ExportFilter<A: BgpAddressFamily> {
    policy: ExportPolicy,
    peer_types: Arc<PeerTypes>,
    attr_store: Arc<AttrStore>,
    adj_rib_out: Arc<RoutingTable<A>>,
}

// ===== impl ExportPolicy =====

impl ExportPolicy {
    // Determines whether the given path is eligible for distribution.
    pub(crate) fn distribute_filter(
        &self,
        path: &Path,
        origin_type: Option<PeerType>,
    ) -> bool {
        // Split horizon.
        if path.source == self.source {
            return false;
        }

        // Suppress advertisements to peers if their AS number is present in
        // the AS path of the route.
        if path.attrs.value.as_path.contains(self.peer_as) {
            return false;
        }

        // RFC 4271 - Section 9.2:
        // "When a BGP speaker receives an UPDATE message from an internal
        // peer, the receiving BGP speaker SHALL NOT re-distribute the
        // routing information contained in that UPDATE message to other
        // internal peers".
        if self.peer_type == PeerType::Internal
            && origin_type == Some(PeerType::Internal)
        {
            return false;
        }

        true
    }
}

// ===== impl ExportFilter =====

impl<A> ExportFilter<A>
where
    A: BgpAddressFamily,
{
    pub(crate) fn new(
        policy: ExportPolicy,
        peer_types: Arc<PeerTypes>,
        attr_store: Arc<AttrStore>,
        adj_rib_out: Arc<RoutingTable<A>>,
    ) -> ExportFilter<A> {
        ExportFilter {
            policy,
            peer_types,
            attr_store,
            adj_rib_out,
        }
    }

    // Returns the path to advertise for the given Loc-RIB best path, if any.
    fn export(&self, path: &Path) -> Option<Path> {
        let origin_type = self.peer_types.get(path.source);
        if !self.policy.distribute_filter(path, origin_type) {
            return None;
        }

        let mut attrs = path.attrs.value.clone();
        match self.policy.peer_type {
            PeerType::External => {
                attrs.as_path.prepend(self.policy.local_as);
                attrs.nexthop = Some(self.policy.local_addr);
                attrs.local_pref = None;
            }
            PeerType::Internal => {
                attrs.local_pref = Some(attrs.local_pref());
                attrs.nexthop.get_or_insert(self.policy.local_addr);
            }
        }

        let attrs = self.attr_store.get(attrs);
        Some(Path::new(self.policy.source, attrs))
    }
}

impl<A> RouteTableClient<A> for ExportFilter<A>
where
    A: BgpAddressFamily,
{
    fn path_added(&self, prefix: A::IpNetwork, path: Path) {
        if let Some(path) = self.export(&path) {
            self.adj_rib_out.add_path(prefix, path);
        }
    }

    fn path_removed(&self, prefix: A::IpNetwork, _path: Path) {
        self.adj_rib_out.remove_path(prefix, self.policy.source);
    }

    fn path_replaced(&self, prefix: A::IpNetwork, _old: Path, new: Path) {
        match self.export(&new) {
            Some(path) => self.adj_rib_out.add_path(prefix, path),
            None => {
                self.adj_rib_out.remove_path(prefix, self.policy.source);
            }
        }
    }
}

// ===== unit tests =====
