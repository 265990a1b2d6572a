//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use const_addrs::net4;
use ribd_rib::{ChannelClient, ClientOptions, RouteTableClient};

use super::*;

#[test]
fn single_path_replayed_to_new_client() {
    let store = AttrStore::default();
    let table = table("loc-rib");
    let p1 = path(&store, 1, 100);

    table.add_path(net4!("10.0.0.0/24"), p1.clone());
    assert_eq!(table.lookup(&net4!("10.0.0.0/24")), Some(p1.clone()));
    assert_eq!(table.route_count(), 1);

    let (_client, mut rx) = client(&table);
    assert_eq!(drain(&mut rx), vec![add(net4!("10.0.0.0/24"), &p1)]);
}

#[test]
fn better_path_replaces_best() {
    let store = AttrStore::default();
    let table = table("loc-rib");
    let (_client, mut rx) = client(&table);
    let p1 = path(&store, 1, 100);
    let p2 = path(&store, 2, 200);

    table.add_path(net4!("10.0.0.0/24"), p1.clone());
    table.add_path(net4!("10.0.0.0/24"), p2.clone());

    assert_eq!(table.lookup(&net4!("10.0.0.0/24")), Some(p2.clone()));
    assert_eq!(
        drain(&mut rx),
        vec![
            add(net4!("10.0.0.0/24"), &p1),
            replace(net4!("10.0.0.0/24"), &p1, &p2),
        ]
    );

    // A late client only sees the current winner.
    let (_late, mut late_rx) = client(&table);
    assert_eq!(drain(&mut late_rx), vec![add(net4!("10.0.0.0/24"), &p2)]);
}

#[test]
fn remove_source_falls_back_without_transient_withdrawal() {
    let store = AttrStore::default();
    let table = table("loc-rib");
    let p1 = path(&store, 1, 100);
    let p2 = path(&store, 2, 200);
    table.add_path(net4!("10.0.0.0/24"), p1.clone());
    table.add_path(net4!("10.0.0.0/24"), p2.clone());
    let (_client, mut rx) = client(&table);
    drain(&mut rx);

    assert_eq!(table.remove_source(SourceId(2)), 1);

    assert_eq!(table.lookup(&net4!("10.0.0.0/24")), Some(p1.clone()));
    assert_eq!(
        drain(&mut rx),
        vec![replace(net4!("10.0.0.0/24"), &p2, &p1)]
    );
}

#[test]
fn remove_source_withdraws_every_path() {
    let store = AttrStore::default();
    let table = table("adj-rib-in");
    for i in 0..10u8 {
        let prefix = Ipv4Network::new([10, 0, i, 0].into(), 24).unwrap();
        table.add_path(prefix, path(&store, 1, 100));
        if i % 2 == 0 {
            table.add_path(prefix, path(&store, 2, 50));
        }
    }
    assert_eq!(table.route_count(), 10);
    let (_client, mut rx) = client(&table);
    drain(&mut rx);

    assert_eq!(table.remove_source(SourceId(1)), 10);

    // Prefixes only known by source 1 are gone entirely.
    assert_eq!(table.route_count(), 5);
    for (_, dest) in table.dump() {
        assert!(!dest.paths.contains_key(&SourceId(1)));
        assert_eq!(dest.best.map(|p| p.source), Some(SourceId(2)));
    }

    let updates = drain(&mut rx);
    assert_eq!(updates.len(), 10);
    let withdrawals = updates
        .iter()
        .filter(|update| matches!(update, RouteUpdate::Remove { .. }))
        .count();
    let replacements = updates
        .iter()
        .filter(|update| matches!(update, RouteUpdate::Replace { .. }))
        .count();
    assert_eq!(withdrawals, 5);
    assert_eq!(replacements, 5);

    // Nothing left to remove.
    assert_eq!(table.remove_source(SourceId(1)), 0);
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn replay_is_exact() {
    let store = AttrStore::default();
    let table = table("loc-rib");
    for i in 0..50u8 {
        let prefix = Ipv4Network::new([172, 16, i, 0].into(), 24).unwrap();
        table.add_path(prefix, path(&store, 1, 100));
        table.add_path(prefix, path(&store, 2, 100));
    }

    let (_client, mut rx) = client(&table);
    let updates = drain(&mut rx);
    assert_eq!(updates.len(), 50);
    assert!(updates.iter().all(|update| {
        matches!(update, RouteUpdate::Add { path, .. } if path.source == SourceId(1))
    }));

    // Then only genuine changes.
    table.add_path(net4!("172.16.0.0/24"), path(&store, 3, 300));
    table.add_path(net4!("172.16.1.0/24"), path(&store, 3, 50));
    assert_eq!(drain(&mut rx).len(), 1);
}

#[test]
fn registration_is_idempotent() {
    let store = AttrStore::default();
    let table = table("loc-rib");
    let p1 = path(&store, 1, 100);
    table.add_path(net4!("10.0.0.0/24"), p1.clone());

    let (client, mut rx) = client(&table);
    assert!(!table.register(client.clone()));
    assert_eq!(table.client_count(), 1);
    assert_eq!(drain(&mut rx), vec![add(net4!("10.0.0.0/24"), &p1)]);

    table.remove_path(net4!("10.0.0.0/24"), SourceId(1));
    assert_eq!(drain(&mut rx), vec![remove(net4!("10.0.0.0/24"), &p1)]);
}

#[test]
fn unregistered_client_gets_nothing() {
    let store = AttrStore::default();
    let table = table("loc-rib");
    let (client, mut rx) = client(&table);
    let client: Arc<dyn RouteTableClient<Ipv4Unicast>> = client;

    assert!(table.unregister(&client));
    assert!(!table.unregister(&client));
    table.add_path(net4!("10.0.0.0/24"), path(&store, 1, 100));
    assert!(drain(&mut rx).is_empty());
    assert!(table.clients().is_empty());
}

#[test]
fn unchanged_best_is_not_renotified() {
    let store = AttrStore::default();
    let table = table("loc-rib");
    let (_client, mut rx) = client(&table);

    table.add_path(net4!("10.0.0.0/24"), path(&store, 1, 200));
    drain(&mut rx);

    // Same value interns to the same attribute set.
    table.add_path(net4!("10.0.0.0/24"), path(&store, 1, 200));
    // A losing candidate does not affect the best path.
    table.add_path(net4!("10.0.0.0/24"), path(&store, 2, 100));
    table.remove_path(net4!("10.0.0.0/24"), SourceId(2));
    assert!(drain(&mut rx).is_empty());

    // New attributes from the same source are a change.
    let updated = path(&store, 1, 300);
    table.add_path(net4!("10.0.0.0/24"), updated.clone());
    assert!(matches!(
        drain(&mut rx).as_slice(),
        [RouteUpdate::Replace { new, .. }] if *new == updated
    ));
}

#[test]
fn all_paths_client_sees_candidates() {
    let store = AttrStore::default();
    let table = table("adj-rib-in");
    let p1 = path(&store, 1, 100);
    table.add_path(net4!("10.0.0.0/24"), p1.clone());

    let (client, mut rx) = ChannelClient::channel();
    assert!(table.register_with_options(client, ClientOptions::AllPaths));
    assert_eq!(drain(&mut rx), vec![add(net4!("10.0.0.0/24"), &p1)]);

    let p2 = path(&store, 2, 50);
    let p2_new = path(&store, 2, 60);
    table.add_path(net4!("10.0.0.0/24"), p2.clone());
    table.add_path(net4!("10.0.0.0/24"), p2_new.clone());
    table.remove_path(net4!("10.0.0.0/24"), SourceId(2));
    assert_eq!(
        drain(&mut rx),
        vec![
            add(net4!("10.0.0.0/24"), &p2),
            replace(net4!("10.0.0.0/24"), &p2, &p2_new),
            remove(net4!("10.0.0.0/24"), &p2_new),
        ]
    );
}

#[test]
fn clear_withdraws_everything() {
    let store = AttrStore::default();
    let table = table("loc-rib");
    let p1 = path(&store, 1, 100);
    table.add_path(net4!("10.0.0.0/24"), p1.clone());
    table.add_path(net4!("10.0.0.0/24"), path(&store, 2, 50));
    table.add_path(net4!("10.1.0.0/24"), p1.clone());
    let (_client, mut rx) = client(&table);
    drain(&mut rx);

    table.clear();
    assert_eq!(table.route_count(), 0);
    assert!(table.dump().is_empty());

    let mut updates = drain(&mut rx);
    updates.sort_by_key(|update| update.prefix());
    assert_eq!(
        updates,
        vec![
            remove(net4!("10.0.0.0/24"), &p1),
            remove(net4!("10.1.0.0/24"), &p1),
        ]
    );

    // Nothing stale remains for the old sources.
    assert_eq!(table.remove_source(SourceId(2)), 0);
}

#[test]
fn pipeline_propagates_net_effect() {
    let store = AttrStore::default();
    let adj_in1 = table("adj-rib-in-1");
    let adj_in2 = table("adj-rib-in-2");
    let loc_rib = table("loc-rib");
    assert!(adj_in1.register(loc_rib.clone()));
    assert!(adj_in2.register(loc_rib.clone()));
    let (_client, mut rx) = client(&loc_rib);

    let p1 = path(&store, 1, 100);
    let p2 = path(&store, 2, 200);
    adj_in1.add_path(net4!("10.0.0.0/24"), p1.clone());
    adj_in2.add_path(net4!("10.0.0.0/24"), p2.clone());
    assert_eq!(loc_rib.lookup(&net4!("10.0.0.0/24")), Some(p2.clone()));
    assert_eq!(loc_rib.lookup_paths(&net4!("10.0.0.0/24")).len(), 2);

    // Session 2 goes down.
    adj_in2.remove_source(SourceId(2));
    assert_eq!(loc_rib.lookup(&net4!("10.0.0.0/24")), Some(p1.clone()));
    assert_eq!(
        drain(&mut rx),
        vec![
            add(net4!("10.0.0.0/24"), &p1),
            replace(net4!("10.0.0.0/24"), &p1, &p2),
            replace(net4!("10.0.0.0/24"), &p2, &p1),
        ]
    );

    // Session 1 goes down too.
    adj_in1.remove_source(SourceId(1));
    assert_eq!(loc_rib.route_count(), 0);
    assert_eq!(drain(&mut rx), vec![remove(net4!("10.0.0.0/24"), &p1)]);
}

#[test]
fn table_registered_late_is_synchronized() {
    let store = AttrStore::default();
    let adj_in = table("adj-rib-in");
    let loc_rib = table("loc-rib");
    for i in 0..8u8 {
        let prefix = Ipv4Network::new([192, 168, i, 0].into(), 24).unwrap();
        adj_in.add_path(prefix, path(&store, 4, 100));
    }

    assert!(adj_in.register(loc_rib.clone()));
    assert_eq!(loc_rib.route_count(), 8);
    let loc = loc_rib.dump();
    let adj = adj_in.dump();
    assert_eq!(loc.len(), adj.len());
    for ((loc_prefix, loc_dest), (adj_prefix, adj_dest)) in loc.iter().zip(&adj)
    {
        assert_eq!(loc_prefix, adj_prefix);
        assert_eq!(loc_dest.best, adj_dest.best);
    }
}
