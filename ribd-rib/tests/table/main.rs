//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod lookup;
mod propagation;

use std::sync::Arc;

use ipnetwork::Ipv4Network;
use ribd_rib::attribute::AsPath;
use ribd_rib::selection::BgpSelection;
use ribd_rib::{
    AttrStore, Attrs, ChannelClient, Ipv4Unicast, Path, RouteUpdate,
    RoutingTable, SourceId,
};
use ribd_utils::UnboundedReceiver;
use ribd_utils::protocol::Protocol;

type Update = RouteUpdate<Ipv4Unicast>;

//
// Helper functions.
//

fn table(name: &str) -> Arc<RoutingTable<Ipv4Unicast>> {
    Arc::new(RoutingTable::new(Protocol::BGP, name, BgpSelection))
}

fn path(store: &AttrStore, source: u32, local_pref: u32) -> Path {
    let attrs = store.get(Attrs {
        local_pref: Some(local_pref),
        as_path: AsPath::from_sequence([65000 + source]),
        ..Default::default()
    });
    Path::new(SourceId(source), attrs)
}

fn client(
    table: &RoutingTable<Ipv4Unicast>,
) -> (Arc<ChannelClient<Ipv4Unicast>>, UnboundedReceiver<Update>) {
    let (client, rx) = ChannelClient::channel();
    assert!(table.register(client.clone()));
    (client, rx)
}

// Returns every update queued so far.
fn drain(rx: &mut UnboundedReceiver<Update>) -> Vec<Update> {
    let mut updates = vec![];
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    updates
}

fn add(prefix: Ipv4Network, path: &Path) -> Update {
    RouteUpdate::Add {
        prefix,
        path: path.clone(),
    }
}

fn remove(prefix: Ipv4Network, path: &Path) -> Update {
    RouteUpdate::Remove {
        prefix,
        path: path.clone(),
    }
}

fn replace(prefix: Ipv4Network, old: &Path, new: &Path) -> Update {
    RouteUpdate::Replace {
        prefix,
        old: old.clone(),
        new: new.clone(),
    }
}
