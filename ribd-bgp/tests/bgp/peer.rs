//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use const_addrs::{ip, net4};
use ipnetwork::IpNetwork;
use ribd_bgp::config::InstanceCfg;
use ribd_bgp::error::{Error, TimersCfgError};
use ribd_bgp::packet::{CeaseSubcode, ErrorCode, UpdateMsg};
use ribd_rib::Attrs;

use super::*;

// Establishes a session and feeds it a couple of routes.
async fn established_with_routes(
    manager: &mut PeerManager,
    remote_rx: &mut UnboundedReceiver<RemoteEnd>,
) -> RemoteEnd {
    manager.add_peer(neighbor(65001)).unwrap();
    let mut remote = remote_rx.recv().await.unwrap();
    establish(manager, &mut remote, open(65001, 90)).await;

    let attrs = Attrs {
        nexthop: Some(ip!("10.0.0.2")),
        ..Default::default()
    };
    let msg = UpdateMsg {
        reach: vec![
            (IpNetwork::V4(net4!("10.1.0.0/16")), attrs.clone()),
            (IpNetwork::V4(net4!("10.2.0.0/16")), attrs),
        ],
        unreach: vec![],
    };
    remote.tx.send(Ok(Message::Update(msg))).unwrap();
    let loc_rib = manager.rib().ipv4_unicast.clone();
    wait_for(|| loc_rib.route_count() == 2).await;
    remote
}

fn cease(msg: &NotificationMsg) -> u8 {
    assert_eq!(msg.error_code, ErrorCode::Cease as u8);
    msg.error_subcode
}

#[tokio::test(start_paused = true)]
async fn disable_peer() {
    let (connector, mut remote_rx) = connector(false);
    let mut manager = manager(&connector);
    let mut remote =
        established_with_routes(&mut manager, &mut remote_rx).await;

    manager.disable_peer(PEER_ADDR).await.unwrap();

    // Everything is torn down by the time the command returns.
    let status = manager.status(PEER_ADDR).unwrap();
    assert_eq!(status.state, fsm::State::Idle);
    assert!(!status.enabled);
    assert_eq!(manager.rib().ipv4_unicast.route_count(), 0);
    assert!(remote.tx.send(Ok(Message::Keepalive)).is_err());

    let msg = recv_notification(&mut remote).await;
    assert_eq!(cease(&msg), CeaseSubcode::AdministrativeShutdown as u8);
    assert_eq!(remote.rx.recv().await, None);

    // No automatic restart.
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(connector.attempts.lock().unwrap().len(), 1);

    manager.enable_peer(PEER_ADDR).await.unwrap();
    let mut remote = remote_rx.recv().await.unwrap();
    establish(&manager, &mut remote, open(65001, 90)).await;
    assert_eq!(
        manager
            .status(PEER_ADDR)
            .unwrap()
            .statistics
            .established_transitions,
        2
    );
}

#[tokio::test(start_paused = true)]
async fn clear_peer_restarts_session() {
    let (connector, mut remote_rx) = connector(false);
    let mut manager = manager(&connector);
    let mut remote =
        established_with_routes(&mut manager, &mut remote_rx).await;

    manager.clear_peer(PEER_ADDR).await.unwrap();
    assert_eq!(manager.rib().ipv4_unicast.route_count(), 0);
    let msg = recv_notification(&mut remote).await;
    assert_eq!(cease(&msg), CeaseSubcode::AdministrativeReset as u8);

    // Reconnection after the idle hold time.
    let start = Instant::now();
    let mut remote = remote_rx.recv().await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(30));
    establish(&manager, &mut remote, open(65001, 90)).await;
}

#[tokio::test(start_paused = true)]
async fn remove_peer() {
    let (connector, mut remote_rx) = connector(false);
    let mut manager = manager(&connector);
    let mut remote =
        established_with_routes(&mut manager, &mut remote_rx).await;
    let source = manager.source(PEER_ADDR).unwrap();

    manager.remove_peer(PEER_ADDR).await.unwrap();
    assert_eq!(manager.rib().ipv4_unicast.route_count(), 0);
    assert!(manager.status(PEER_ADDR).is_none());
    assert!(manager.rib().peer_type(source).is_none());
    assert_eq!(manager.peers().count(), 0);

    let msg = recv_notification(&mut remote).await;
    assert_eq!(cease(&msg), CeaseSubcode::PeerDeConfigured as u8);

    assert!(matches!(
        manager.remove_peer(PEER_ADDR).await,
        Err(Error::PeerNotFound(addr)) if addr == PEER_ADDR
    ));
}

#[tokio::test(start_paused = true)]
async fn duplicate_peer() {
    let (connector, _remote_rx) = connector(true);
    let mut manager = manager(&connector);
    let source = manager.add_peer(neighbor(65001)).unwrap();

    assert!(matches!(
        manager.add_peer(neighbor(65002)),
        Err(Error::PeerExists(addr)) if addr == PEER_ADDR
    ));
    assert_eq!(manager.source(PEER_ADDR), Some(source));
}

#[tokio::test(start_paused = true)]
async fn invalid_timers_are_rejected() {
    let (connector, _remote_rx) = connector(true);
    let mut manager = manager(&connector);

    let mut config = neighbor(65001);
    config.timers.idle_hold_time = 0;
    assert!(matches!(
        manager.add_peer(config),
        Err(Error::TimersCfgError(addr, TimersCfgError::IdleHoldTimeZero))
            if addr == PEER_ADDR
    ));

    let mut config = neighbor(65001);
    config.timers.connect_retry_interval = 0;
    assert!(matches!(
        manager.add_peer(config),
        Err(Error::TimersCfgError(
            _,
            TimersCfgError::ConnectRetryIntervalZero
        ))
    ));

    let mut config = neighbor(65001);
    config.timers.holdtime = 2;
    assert!(matches!(
        manager.add_peer(config),
        Err(Error::TimersCfgError(_, TimersCfgError::HoldTimeInvalid(2)))
    ));

    // Nothing was started for the rejected configurations.
    assert!(manager.status(PEER_ADDR).is_none());
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(connector.attempts.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn passive_peer_accepts_connection() {
    let (connector, _remote_rx) = connector(false);
    let mut manager = manager(&connector);
    let mut config = neighbor(65001);
    config.passive = true;
    manager.add_peer(config).unwrap();
    wait_state(&manager, fsm::State::Active).await;

    let (conn, _) = connection_pair(ip!("10.0.0.99"));
    assert!(!manager.accept(conn));

    let (conn, mut remote) = connection_pair(PEER_ADDR);
    assert!(manager.accept(conn));
    establish(&manager, &mut remote, open(65001, 90)).await;
    assert!(connector.attempts.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn metrics_skip_idle_peers() {
    let (connector, mut remote_rx) = connector(false);
    let mut manager = manager(&connector);
    let mut disabled = NeighborCfg::new(ip!("10.0.0.3"), 65003);
    disabled.enabled = false;
    manager.add_peer(disabled).unwrap();
    let _remote = established_with_routes(&mut manager, &mut remote_rx).await;

    let metrics = manager.metrics();
    assert_eq!(metrics.peers.len(), 1);
    let peer = &metrics.peers[0];
    assert_eq!(peer.address, PEER_ADDR);
    assert_eq!(peer.asn, 65001);
    assert_eq!(peer.local_asn, LOCAL_AS);
    assert_eq!(peer.state, fsm::State::Established);
    assert_eq!(peer.updates_received, 1);
    assert_eq!(peer.afs.len(), 1);
    assert_eq!(peer.afs[0].routes_received, 2);
    assert_eq!(peer.afs[0].routes_sent, 0);

    let data = serde_json::to_value(&metrics).unwrap();
    assert_eq!(data["peers"][0]["afs"][0]["routes_received"], 2);
}

#[tokio::test(start_paused = true)]
async fn instance_from_config() {
    let config = InstanceCfg::from_toml_str(
        r#"
        asn = 65000
        router_id = "1.1.1.1"

        [[neighbors]]
        remote_addr = "10.0.0.2"
        peer_as = 65001

        [[neighbors]]
        remote_addr = "10.0.0.3"
        peer_as = 65000
        enabled = false
        "#,
    )
    .unwrap();
    let (connector, _remote_rx) = connector(true);
    let manager = PeerManager::from_config(&config, connector).unwrap();

    assert_eq!(manager.asn(), LOCAL_AS);
    assert_eq!(manager.peers().collect::<Vec<_>>(), [PEER_ADDR, ip!("10.0.0.3")]);
    let status = manager.status(ip!("10.0.0.3")).unwrap();
    assert!(!status.enabled);
    assert_eq!(status.peer_type, ribd_bgp::session::PeerType::Internal);
}
