//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::IpAddr;

use const_addrs::{ip, ip4, net, net4, net6};
use ipnetwork::IpNetwork;
use ribd_bgp::packet::{BGP_VERSION, NotificationMsg, OpenMsg, UpdateMsg};
use ribd_bmp::error::Error;
use ribd_bmp::packet::{
    BmpMsg, InitiationMsg, MirroringInfo, MirroringTlv, PeerDownMsg,
    PeerDownReason, PeerKey, PeerType, PeerUpMsg, PerPeerHeader,
    RouteMirroringMsg, RouteMonitoringMsg, TerminationMsg,
};
use ribd_bmp::router::PeerStatistics;
use ribd_bmp::{BmpRouter, BmpStation};
use ribd_rib::attribute::AsPath;
use ribd_rib::{Attrs, ChannelClient, Ipv4Unicast, RouteUpdate, SourceId};

const ROUTER: IpAddr = ip!("192.0.2.1");
const PEER: IpAddr = ip!("10.0.0.2");

//
// Helper functions.
//

fn header(address: IpAddr, distinguisher: u64) -> PerPeerHeader {
    PerPeerHeader {
        peer_type: if distinguisher == 0 {
            PeerType::Global
        } else {
            PeerType::RdInstance
        },
        post_policy: false,
        distinguisher,
        address,
        peer_as: 65001,
        peer_bgp_id: ip4!("2.2.2.2"),
        timestamp: None,
    }
}

fn open(asn: u16) -> OpenMsg {
    OpenMsg {
        version: BGP_VERSION,
        my_as: asn,
        holdtime: 90,
        identifier: ip4!("2.2.2.2"),
        capabilities: BTreeSet::new(),
    }
}

fn initiation() -> BmpMsg {
    BmpMsg::Initiation(InitiationMsg {
        sys_name: Some("r1".to_owned()),
        sys_descr: None,
    })
}

fn peer_up(distinguisher: u64) -> BmpMsg {
    BmpMsg::PeerUp(PeerUpMsg {
        peer_header: header(PEER, distinguisher),
        local_addr: ip!("10.0.0.1"),
        local_port: 179,
        remote_port: 34567,
        sent_open: open(65000),
        received_open: open(65001),
    })
}

fn peer_down(distinguisher: u64) -> BmpMsg {
    BmpMsg::PeerDown(PeerDownMsg {
        peer_header: header(PEER, distinguisher),
        reason: PeerDownReason::RemoteNotification(NotificationMsg {
            error_code: 6,
            error_subcode: 2,
            data: vec![],
        }),
    })
}

fn route_monitoring(
    distinguisher: u64,
    reach: &[IpNetwork],
    unreach: &[IpNetwork],
) -> BmpMsg {
    let attrs = Attrs {
        as_path: AsPath::from_sequence([65001]),
        nexthop: Some(PEER),
        ..Default::default()
    };
    BmpMsg::RouteMonitoring(RouteMonitoringMsg {
        peer_header: header(PEER, distinguisher),
        update: UpdateMsg {
            reach: reach
                .iter()
                .map(|prefix| (*prefix, attrs.clone()))
                .collect(),
            unreach: unreach.to_vec(),
        },
    })
}

// Router with one monitored peer in the global instance.
fn router() -> BmpRouter {
    let mut router = BmpRouter::new(ROUTER);
    router.process(initiation()).unwrap();
    router.process(peer_up(0)).unwrap();
    router
}

fn key(distinguisher: u64) -> PeerKey {
    PeerKey::new(PEER, distinguisher)
}

//
// Tests.
//

#[test]
fn messages_before_initiation_are_rejected() {
    let mut router = BmpRouter::new(ROUTER);
    let result = router.process(peer_up(0));
    assert!(
        matches!(result, Err(Error::NotInitiated(addr)) if addr == ROUTER)
    );
    assert!(router.peer(&key(0)).is_none());

    router.process(initiation()).unwrap();
    assert_eq!(router.sys_name.as_deref(), Some("r1"));
    router.process(peer_up(0)).unwrap();
    assert!(router.peer(&key(0)).is_some());
}

#[test]
fn route_monitoring_updates_adj_rib_in() {
    let mut router = router();
    router
        .process(route_monitoring(
            0,
            &[
                net!("10.1.0.0/16"),
                net!("10.2.0.0/16"),
                net!("2001:db8::/32"),
            ],
            &[],
        ))
        .unwrap();

    let peer = router.peer(&key(0)).unwrap();
    assert_eq!(peer.source, SourceId(1));
    assert_eq!(peer.ipv4_unicast.route_count(), 2);
    assert_eq!(peer.ipv6_unicast.route_count(), 1);
    let path = peer.ipv4_unicast.lookup(&net4!("10.1.0.0/16")).unwrap();
    assert_eq!(path.source, SourceId(1));
    assert_eq!(path.attrs.value.nexthop, Some(PEER));
    assert!(peer.ipv6_unicast.lookup(&net6!("2001:db8::/32")).is_some());

    router
        .process(route_monitoring(0, &[], &[net!("10.1.0.0/16")]))
        .unwrap();
    let peer = router.peer(&key(0)).unwrap();
    assert_eq!(peer.ipv4_unicast.route_count(), 1);
    assert!(peer.ipv4_unicast.lookup(&net4!("10.1.0.0/16")).is_none());
    assert_eq!(peer.statistics.route_monitoring, 2);
}

#[test]
fn unknown_and_duplicate_peers() {
    let mut router = router();

    let result =
        router.process(route_monitoring(7, &[net!("10.1.0.0/16")], &[]));
    assert!(matches!(
        result,
        Err(Error::PeerNotFound(_, key)) if key.distinguisher == 7
    ));

    let result = router.process(peer_up(0));
    assert!(matches!(result, Err(Error::PeerExists(..))));

    let result = router.process(peer_down(7));
    assert!(matches!(result, Err(Error::PeerNotFound(..))));
}

#[test]
fn peers_are_keyed_by_distinguisher() {
    let mut router = router();
    router.process(peer_up(100)).unwrap();
    router
        .process(route_monitoring(100, &[net!("10.1.0.0/16")], &[]))
        .unwrap();

    assert_eq!(router.peers().count(), 2);
    assert_eq!(router.peer(&key(0)).unwrap().route_count(), 0);
    let peer = router.peer(&key(100)).unwrap();
    assert_eq!(peer.source, SourceId(2));
    assert_eq!(peer.route_count(), 1);
}

#[test]
fn peer_down_withdraws_routes() {
    let mut router = router();
    router
        .process(route_monitoring(0, &[net!("10.1.0.0/16")], &[]))
        .unwrap();

    let (client, mut rx) = ChannelClient::<Ipv4Unicast>::channel();
    assert!(router.register::<Ipv4Unicast>(&key(0), client).unwrap());
    // Registration replays the existing routes.
    assert!(matches!(rx.try_recv(), Ok(RouteUpdate::Add { .. })));

    router.process(peer_down(0)).unwrap();
    match rx.try_recv() {
        Ok(RouteUpdate::Remove { prefix, path }) => {
            assert_eq!(prefix, net4!("10.1.0.0/16"));
            assert_eq!(path.source, SourceId(1));
        }
        update => panic!("unexpected update: {update:?}"),
    }
    assert!(router.peer(&key(0)).is_none());

    // The peer may come back with a new source identifier.
    router.process(peer_up(0)).unwrap();
    assert_eq!(router.peer(&key(0)).unwrap().source, SourceId(2));
}

#[test]
fn peer_down_releases_attribute_sets() {
    let mut router = router();
    router
        .process(route_monitoring(
            0,
            &[net!("10.1.0.0/16"), net!("10.2.0.0/16")],
            &[],
        ))
        .unwrap();
    assert_eq!(router.attr_store().len(), 1);

    router.process(peer_down(0)).unwrap();
    assert!(router.attr_store().is_empty());
    assert_eq!(router.attr_store().stale_count(), 0);
}

#[test]
fn route_mirroring_is_accounted() {
    let mut router = router();
    let msg = BmpMsg::RouteMirroring(RouteMirroringMsg {
        peer_header: header(PEER, 0),
        tlvs: vec![
            MirroringTlv::Information(MirroringInfo::ErroredPdu),
            MirroringTlv::BgpMessage(vec![0xff; 19]),
            MirroringTlv::Information(MirroringInfo::MessagesLost),
        ],
    });
    router.process(msg.clone()).unwrap();
    router.process(msg).unwrap();

    let peer = router.peer(&key(0)).unwrap();
    assert_eq!(
        peer.statistics,
        PeerStatistics {
            route_monitoring: 0,
            mirrored_messages: 2,
            lost_messages: 2,
        }
    );
    assert_eq!(peer.route_count(), 0);
}

#[test]
fn termination_removes_router() {
    let mut station = BmpStation::default();
    station.router_add(ROUTER).unwrap();
    station.process(ROUTER, initiation()).unwrap();
    station.process(ROUTER, peer_up(0)).unwrap();
    station
        .process(ROUTER, route_monitoring(0, &[net!("10.1.0.0/16")], &[]))
        .unwrap();

    let (client, mut rx) = ChannelClient::<Ipv4Unicast>::channel();
    let router = station.router(ROUTER).unwrap();
    router.register::<Ipv4Unicast>(&key(0), client).unwrap();
    let _ = rx.try_recv();

    let msg = BmpMsg::Termination(TerminationMsg {
        reason: Some(0),
        string: None,
    });
    station.process(ROUTER, msg).unwrap();
    assert!(matches!(rx.try_recv(), Ok(RouteUpdate::Remove { .. })));
    assert!(station.router(ROUTER).is_none());
    assert_eq!(station.routers().count(), 0);

    let result = station.process(ROUTER, initiation());
    assert!(matches!(result, Err(Error::RouterNotFound(_))));
}

#[test]
fn router_disconnect_withdraws_routes() {
    let mut station = BmpStation::default();
    station.router_add(ROUTER).unwrap();
    assert!(matches!(
        station.router_add(ROUTER),
        Err(Error::RouterExists(_))
    ));
    station.process(ROUTER, initiation()).unwrap();
    station.process(ROUTER, peer_up(0)).unwrap();
    station
        .process(ROUTER, route_monitoring(0, &[net!("2001:db8::/32")], &[]))
        .unwrap();
    let table = station
        .router(ROUTER)
        .unwrap()
        .peer(&key(0))
        .unwrap()
        .ipv6_unicast
        .clone();
    assert_eq!(table.route_count(), 1);

    station.router_remove(ROUTER).unwrap();
    assert_eq!(table.route_count(), 0);
    assert!(matches!(
        station.router_remove(ROUTER),
        Err(Error::RouterNotFound(_))
    ));
}
