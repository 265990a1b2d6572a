//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use const_addrs::{ip4, net4};
use ribd_rib::path::IneligibleReason;

use super::*;

#[test]
fn longest_match() {
    let store = AttrStore::default();
    let table = table("loc-rib");
    let wide = path(&store, 1, 100);
    let narrow = path(&store, 2, 100);
    table.add_path(net4!("10.0.0.0/8"), wide.clone());
    table.add_path(net4!("10.1.0.0/16"), narrow.clone());

    assert_eq!(
        table.lookup_longest_match(ip4!("10.1.2.3")),
        Some((net4!("10.1.0.0/16"), narrow))
    );
    assert_eq!(
        table.lookup_longest_match(ip4!("10.2.0.1")),
        Some((net4!("10.0.0.0/8"), wide))
    );
    assert_eq!(table.lookup_longest_match(ip4!("11.0.0.1")), None);
}

#[test]
fn longest_match_skips_entries_without_best() {
    let store = AttrStore::default();
    let table = table("loc-rib");
    let wide = path(&store, 1, 100);
    let looped = Path::ineligible(
        SourceId(2),
        store.get(Attrs::default()),
        IneligibleReason::AsLoop,
    );
    table.add_path(net4!("10.0.0.0/8"), wide.clone());
    table.add_path(net4!("10.1.0.0/16"), looped);

    // The ineligible candidate is still a destination.
    assert_eq!(table.route_count(), 2);
    assert_eq!(table.lookup(&net4!("10.1.0.0/16")), None);
    assert_eq!(
        table.lookup_longest_match(ip4!("10.1.2.3")),
        Some((net4!("10.0.0.0/8"), wide))
    );
}

#[test]
fn prefixes_are_normalized() {
    let store = AttrStore::default();
    let table = table("loc-rib");
    let p1 = path(&store, 1, 100);

    table.add_path(net4!("10.0.0.77/24"), p1.clone());
    assert_eq!(table.lookup(&net4!("10.0.0.0/24")), Some(p1.clone()));
    assert_eq!(table.dump()[0].0, net4!("10.0.0.0/24"));

    table.remove_path(net4!("10.0.0.1/24"), SourceId(1));
    assert_eq!(table.route_count(), 0);
}

#[test]
fn empty_entries_are_deleted() {
    let store = AttrStore::default();
    let table = table("loc-rib");
    table.add_path(net4!("10.0.0.0/24"), path(&store, 1, 100));
    table.add_path(net4!("10.0.0.0/24"), path(&store, 2, 100));

    assert!(table.remove_path(net4!("10.0.0.0/24"), SourceId(3)).is_none());
    assert!(table.remove_path(net4!("10.0.0.0/24"), SourceId(1)).is_some());
    assert_eq!(table.route_count(), 1);
    assert!(table.remove_path(net4!("10.0.0.0/24"), SourceId(2)).is_some());
    assert_eq!(table.route_count(), 0);
    assert!(table.dump().is_empty());
    assert!(table.lookup_paths(&net4!("10.0.0.0/24")).is_empty());
}
