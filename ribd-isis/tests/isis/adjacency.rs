//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::IpAddr;

use const_addrs::{net4, net6};
use ribd_rib::SourceId;

use super::*;

const OTHER_ID: SystemId = SystemId::from_bytes([0, 0, 0, 0, 0, 3]);

#[tokio::test(start_paused = true)]
async fn three_way_handshake() {
    let (handle, mut link) = instance(DeviceCfg::new(DEVICE)).await;
    sent_hello(&mut link).await;

    inject(&link, hello_three_way(ThreeWayState::Down, None));
    let status =
        wait_adj_state(&handle, Some(AdjacencyState::Initializing)).await;
    let adj = status.adjacency.unwrap();
    assert_eq!(adj.system_id, NEIGHBOR_ID);
    assert_eq!(adj.source, None);

    // The neighbor is reported back in the next hello.
    let hello = sent_hello(&mut link).await;
    assert_eq!(
        hello.three_way,
        Some(ThreeWayTlv {
            state: ThreeWayState::Initializing,
            neighbor: Some(NEIGHBOR_ID),
        })
    );

    inject(
        &link,
        hello_three_way(ThreeWayState::Initializing, Some(LOCAL_ID)),
    );
    let status = wait_adj_state(&handle, Some(AdjacencyState::Up)).await;
    assert_eq!(status.adjacency.unwrap().source, Some(SourceId(1)));
    let hello = sent_hello(&mut link).await;
    assert_eq!(
        hello.three_way,
        Some(ThreeWayTlv {
            state: ThreeWayState::Up,
            neighbor: Some(NEIGHBOR_ID),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn neighbor_without_three_way_support() {
    let (handle, link) = instance(DeviceCfg::new(DEVICE)).await;
    inject(&link, hello(None));
    wait_adj_state(&handle, Some(AdjacencyState::Up)).await;
}

#[tokio::test(start_paused = true)]
async fn hello_for_other_system_is_rejected() {
    let (handle, link) = instance(DeviceCfg::new(DEVICE)).await;
    inject(&link, hello_three_way(ThreeWayState::Up, Some(OTHER_ID)));
    tokio::time::sleep(Duration::from_secs(1)).await;
    let status = handle.device_status(DEVICE).await.unwrap();
    assert!(status.adjacency.is_none());
}

#[tokio::test(start_paused = true)]
async fn hello_with_own_system_id_is_rejected() {
    let (handle, link) = instance(DeviceCfg::new(DEVICE)).await;
    inject(
        &link,
        Pdu::P2pHello(P2pHello {
            source: LOCAL_ID,
            holdtime: 30,
            three_way: None,
            ipv4_addrs: vec![NEIGHBOR_ADDR],
            ipv6_addrs: vec![],
        }),
    );
    tokio::time::sleep(Duration::from_secs(1)).await;
    let status = handle.device_status(DEVICE).await.unwrap();
    assert!(status.adjacency.is_none());
}

#[tokio::test(start_paused = true)]
async fn neighbor_addrs_outside_device_subnets_are_ignored() {
    let (handle, link) = instance(DeviceCfg::new(DEVICE)).await;
    inject(
        &link,
        Pdu::P2pHello(P2pHello {
            source: NEIGHBOR_ID,
            holdtime: 30,
            three_way: None,
            ipv4_addrs: vec![ip4!("192.168.1.1"), NEIGHBOR_ADDR],
            ipv6_addrs: vec![],
        }),
    );
    let status = wait_adj_state(&handle, Some(AdjacencyState::Up)).await;
    assert_eq!(
        status.adjacency.unwrap().ipv4_addrs,
        BTreeSet::from([NEIGHBOR_ADDR])
    );
}

#[tokio::test(start_paused = true)]
async fn lsp_routes_are_installed() {
    let (handle, link) = instance(DeviceCfg::new(DEVICE)).await;
    adjacency_up(&handle, &link).await;

    inject(
        &link,
        lsp(1, &[(net!("10.9.0.0/16"), 5), (net!("2001:db8::/32"), 1)]),
    );
    let ipv4 = handle.rib().ipv4_unicast.clone();
    let ipv6 = handle.rib().ipv6_unicast.clone();
    wait_for(|| ipv4.route_count() == 1 && ipv6.route_count() == 1).await;

    // Route metric is the advertised metric plus the link metric.
    let path = ipv4.lookup(&net4!("10.9.0.0/16")).unwrap();
    assert_eq!(path.source, SourceId(1));
    assert_eq!(path.attrs.value.metric, Some(15));
    assert_eq!(path.attrs.value.nexthop, Some(IpAddr::from(NEIGHBOR_ADDR)));
    let path = ipv6.lookup(&net6!("2001:db8::/32")).unwrap();
    assert_eq!(path.attrs.value.metric, Some(11));
    assert_eq!(path.attrs.value.nexthop, Some(IpAddr::from(NEIGHBOR_ADDR6)));

    let status = handle.device_status(DEVICE).await.unwrap();
    assert_eq!(status.adjacency.unwrap().route_count, 2);
}

#[tokio::test(start_paused = true)]
async fn newer_lsp_replaces_reachability() {
    let (handle, link) = instance(DeviceCfg::new(DEVICE)).await;
    adjacency_up(&handle, &link).await;
    let table = handle.rib().ipv4_unicast.clone();

    inject(
        &link,
        lsp(1, &[(net!("10.9.0.0/16"), 5), (net!("10.10.0.0/16"), 5)]),
    );
    wait_for(|| table.route_count() == 2).await;

    inject(&link, lsp(2, &[(net!("10.9.0.0/16"), 7)]));
    wait_for(|| table.route_count() == 1).await;
    let path = table.lookup(&net4!("10.9.0.0/16")).unwrap();
    assert_eq!(path.attrs.value.metric, Some(17));

    // Versions not newer than the applied one are ignored.
    inject(&link, lsp(2, &[(net!("10.11.0.0/16"), 5)]));
    inject(&link, lsp(1, &[(net!("10.12.0.0/16"), 5)]));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(table.route_count(), 1);
    assert!(table.lookup(&net4!("10.9.0.0/16")).is_some());
}

#[tokio::test(start_paused = true)]
async fn lsp_ignored_without_adjacency() {
    let (handle, link) = instance(DeviceCfg::new(DEVICE)).await;
    inject(&link, hello_three_way(ThreeWayState::Down, None));
    wait_adj_state(&handle, Some(AdjacencyState::Initializing)).await;

    inject(&link, lsp(1, &[(net!("10.9.0.0/16"), 5)]));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.rib().ipv4_unicast.route_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn hold_timer_expiry_withdraws_routes() {
    let (handle, mut link) = instance(DeviceCfg::new(DEVICE)).await;
    adjacency_up(&handle, &link).await;
    inject(&link, lsp(1, &[(net!("10.9.0.0/16"), 5)]));
    let table = handle.rib().ipv4_unicast.clone();
    wait_for(|| table.route_count() == 1).await;

    // The neighbor goes silent.
    tokio::time::sleep(Duration::from_secs(31)).await;
    wait_adj_state(&handle, None).await;
    assert_eq!(table.route_count(), 0);

    // Hellos no longer report the neighbor.
    while link.sent_rx.try_recv().is_ok() {}
    let hello = sent_hello(&mut link).await;
    assert_eq!(
        hello.three_way,
        Some(ThreeWayTlv {
            state: ThreeWayState::Down,
            neighbor: None,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn hellos_keep_adjacency_up() {
    let (handle, link) = instance(DeviceCfg::new(DEVICE)).await;
    adjacency_up(&handle, &link).await;

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(10)).await;
        inject(&link, hello_three_way(ThreeWayState::Up, Some(LOCAL_ID)));
    }
    let status = handle.device_status(DEVICE).await.unwrap();
    assert_eq!(status.adjacency.unwrap().state, AdjacencyState::Up);
}

#[tokio::test(start_paused = true)]
async fn new_neighbor_replaces_adjacency() {
    let (handle, link) = instance(DeviceCfg::new(DEVICE)).await;
    adjacency_up(&handle, &link).await;
    inject(&link, lsp(1, &[(net!("10.9.0.0/16"), 5)]));
    let table = handle.rib().ipv4_unicast.clone();
    wait_for(|| table.route_count() == 1).await;

    inject(
        &link,
        Pdu::P2pHello(P2pHello {
            source: OTHER_ID,
            holdtime: 30,
            three_way: Some(ThreeWayTlv {
                state: ThreeWayState::Down,
                neighbor: None,
            }),
            ipv4_addrs: vec![NEIGHBOR_ADDR],
            ipv6_addrs: vec![],
        }),
    );
    let status = wait_status(&handle, |status| {
        status
            .adjacency
            .as_ref()
            .is_some_and(|adj| adj.system_id == OTHER_ID)
    })
    .await;
    assert_eq!(status.adjacency.unwrap().state, AdjacencyState::Initializing);
    assert_eq!(table.route_count(), 0);
}
