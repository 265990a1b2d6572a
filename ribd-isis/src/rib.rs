//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use ipnetwork::IpNetwork;
use ribd_rib::selection::IsisSelection;
use ribd_rib::{
    AddressFamily, AttrStore, Attrs, Ipv4Unicast, Ipv6Unicast, Path,
    RouteTableClient, RoutingTable, SourceId,
};
use ribd_utils::protocol::Protocol;

use crate::packet::{Lsp, LspId, SystemId};

// Routing tables of an IS-IS instance.
#[derive(Debug)]
pub struct IsisRib {
    pub attr_store: Arc<AttrStore>,
    pub ipv4_unicast: Arc<RoutingTable<Ipv4Unicast>>,
    pub ipv6_unicast: Arc<RoutingTable<Ipv6Unicast>>,
}

// Routes learned over a single adjacency.
//
// Both tables are registered into the instance tables while the adjacency is
// up, and every path carries the adjacency's source identifier.
#[derive(Debug)]
pub struct AdjRibIn {
    pub source: SourceId,
    pub ipv4_unicast: Arc<RoutingTable<Ipv4Unicast>>,
    pub ipv6_unicast: Arc<RoutingTable<Ipv6Unicast>>,
    lsps: BTreeMap<LspId, LspState>,
}

// Last applied version of an LSP.
#[derive(Debug)]
struct LspState {
    seqno: u32,
    prefixes: BTreeSet<IpNetwork>,
}

// ===== impl IsisRib =====

impl Default for IsisRib {
    fn default() -> IsisRib {
        IsisRib {
            attr_store: Default::default(),
            ipv4_unicast: Arc::new(RoutingTable::new(
                Protocol::ISIS,
                "isis ipv4-unicast",
                IsisSelection,
            )),
            ipv6_unicast: Arc::new(RoutingTable::new(
                Protocol::ISIS,
                "isis ipv6-unicast",
                IsisSelection,
            )),
        }
    }
}

// ===== impl AdjRibIn =====

impl AdjRibIn {
    pub(crate) fn new(
        rib: &IsisRib,
        device: &str,
        system_id: &SystemId,
        source: SourceId,
    ) -> AdjRibIn {
        let ipv4_unicast = adj_table(device, system_id, &rib.ipv4_unicast);
        let ipv6_unicast = adj_table(device, system_id, &rib.ipv6_unicast);

        AdjRibIn {
            source,
            ipv4_unicast,
            ipv6_unicast,
            lsps: Default::default(),
        }
    }

    // Applies the IP reachability of an LSP.
    //
    // An LSP describes the complete reachability of its originator, so
    // prefixes absent from a newer version are withdrawn. Versions not newer
    // than the last applied one are ignored.
    pub(crate) fn lsp_apply(
        &mut self,
        rib: &IsisRib,
        lsp: &Lsp,
        link_metric: u32,
        nexthop4: Option<Ipv4Addr>,
        nexthop6: Option<Ipv6Addr>,
    ) -> bool {
        if let Some(state) = self.lsps.get(&lsp.lsp_id)
            && lsp.seqno <= state.seqno
        {
            return false;
        }

        let prefixes: BTreeSet<_> =
            lsp.ip_reach.iter().map(|reach| reach.prefix).collect();
        let old = self.lsps.insert(
            lsp.lsp_id,
            LspState {
                seqno: lsp.seqno,
                prefixes: prefixes.clone(),
            },
        );

        // Withdraw prefixes no longer advertised.
        if let Some(old) = old {
            for prefix in old.prefixes.difference(&prefixes) {
                self.withdraw(*prefix);
            }
        }

        for reach in &lsp.ip_reach {
            let nexthop = match reach.prefix {
                IpNetwork::V4(_) => nexthop4.map(IpAddr::from),
                IpNetwork::V6(_) => nexthop6.map(IpAddr::from),
            };
            let attrs = rib.attr_store.get(Attrs {
                nexthop,
                metric: Some(reach.metric.saturating_add(link_metric)),
                ..Default::default()
            });
            let path = Path::new(self.source, attrs);
            match reach.prefix {
                IpNetwork::V4(prefix) => {
                    self.ipv4_unicast.add_path(prefix, path)
                }
                IpNetwork::V6(prefix) => {
                    self.ipv6_unicast.add_path(prefix, path)
                }
            }
        }

        true
    }

    // Number of destinations learned over the adjacency.
    pub fn route_count(&self) -> usize {
        self.ipv4_unicast.route_count() + self.ipv6_unicast.route_count()
    }

    // Withdraws every route learned over the adjacency and detaches its
    // tables from the instance tables.
    pub(crate) fn stop(self, rib: &IsisRib) {
        self.ipv4_unicast.remove_source(self.source);
        self.ipv6_unicast.remove_source(self.source);
        adj_table_detach(&self.ipv4_unicast, &rib.ipv4_unicast);
        adj_table_detach(&self.ipv6_unicast, &rib.ipv6_unicast);
        drop(self);
        rib.attr_store.purge();
    }

    fn withdraw(&self, prefix: IpNetwork) {
        match prefix {
            IpNetwork::V4(prefix) => {
                self.ipv4_unicast.remove_path(prefix, self.source);
            }
            IpNetwork::V6(prefix) => {
                self.ipv6_unicast.remove_path(prefix, self.source);
            }
        }
    }
}

// ===== helper functions =====

fn adj_table<A>(
    device: &str,
    system_id: &SystemId,
    instance_table: &Arc<RoutingTable<A>>,
) -> Arc<RoutingTable<A>>
where
    A: AddressFamily,
{
    let name = format!(
        "adj-rib-in {} {} {}",
        device,
        system_id,
        A::ADDRESS_FAMILY
    );
    let table =
        Arc::new(RoutingTable::new(Protocol::ISIS, name, IsisSelection));
    table.register(instance_table.clone());
    table
}

fn adj_table_detach<A>(
    table: &RoutingTable<A>,
    instance_table: &Arc<RoutingTable<A>>,
) where
    A: AddressFamily,
{
    let client: Arc<dyn RouteTableClient<A>> = instance_table.clone();
    table.unregister(&client);
}
