//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ribd_isis::config::{DFLT_HOLDTIME, InstanceCfg};
use ribd_isis::error::Error;
use ribd_isis::packet::ALL_P2P_ISS;
use tokio::time::Instant;

use super::*;

#[tokio::test(start_paused = true)]
async fn device_up_sends_hellos() {
    let start = Instant::now();
    let (handle, mut link) = instance(DeviceCfg::new(DEVICE)).await;
    assert_eq!(
        *link.sys.calls.lock().unwrap(),
        [SysCall::Open, SysCall::Join(ALL_P2P_ISS)]
    );

    let hello = sent_hello(&mut link).await;
    assert_eq!(hello.source, LOCAL_ID);
    assert_eq!(hello.holdtime, DFLT_HOLDTIME);
    assert_eq!(
        hello.three_way,
        Some(ThreeWayTlv {
            state: ThreeWayState::Down,
            neighbor: None,
        })
    );
    assert_eq!(hello.ipv4_addrs, [ip4!("10.0.1.1")]);

    // Hellos are repeated every hello interval.
    sent_hello(&mut link).await;
    assert!(start.elapsed() >= Duration::from_secs(10));

    let status = handle.device_status(DEVICE).await.unwrap();
    assert!(status.up);
    assert!(status.adjacency.is_none());
}

#[tokio::test(start_paused = true)]
async fn device_down_withdraws_routes() {
    let (handle, link) = instance(DeviceCfg::new(DEVICE)).await;
    adjacency_up(&handle, &link).await;
    inject(&link, lsp(1, &[(net!("10.9.0.0/16"), 5)]));
    let table = handle.rib().ipv4_unicast.clone();
    wait_for(|| table.route_count() == 1).await;

    handle.device_update(phy(false)).await.unwrap();
    assert_eq!(table.route_count(), 0);
    assert_eq!(link.sys.calls.lock().unwrap().last(), Some(&SysCall::Close));

    let status = handle.device_status(DEVICE).await.unwrap();
    assert!(!status.up);
    assert!(status.adjacency.is_none());
}

#[tokio::test(start_paused = true)]
async fn device_restart_reopens_socket() {
    let (handle, mut link) = instance(DeviceCfg::new(DEVICE)).await;
    handle.device_update(phy(false)).await.unwrap();
    while link.sent_rx.try_recv().is_ok() {}

    handle.device_update(phy(true)).await.unwrap();
    assert_eq!(
        *link.sys.calls.lock().unwrap(),
        [
            SysCall::Open,
            SysCall::Join(ALL_P2P_ISS),
            SysCall::Close,
            SysCall::Open,
            SysCall::Join(ALL_P2P_ISS),
        ]
    );

    // PDUs are processed again after the restart.
    sent_hello(&mut link).await;
    adjacency_up(&handle, &link).await;
}

#[tokio::test(start_paused = true)]
async fn passive_device_forms_no_adjacency() {
    let mut config = DeviceCfg::new(DEVICE);
    config.passive = true;
    let (handle, mut link) = instance(config).await;

    inject(&link, hello_three_way(ThreeWayState::Up, Some(LOCAL_ID)));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(link.sent_rx.try_recv().is_err());
    let status = handle.device_status(DEVICE).await.unwrap();
    assert!(status.up);
    assert!(status.adjacency.is_none());
}

#[tokio::test(start_paused = true)]
async fn device_without_level_forms_no_adjacency() {
    let mut config = DeviceCfg::new(DEVICE);
    config.level2 = None;
    let (handle, mut link) = instance(config).await;

    inject(&link, hello_three_way(ThreeWayState::Up, Some(LOCAL_ID)));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(link.sent_rx.try_recv().is_err());
    let status = handle.device_status(DEVICE).await.unwrap();
    assert!(status.adjacency.is_none());
}

#[tokio::test(start_paused = true)]
async fn device_management_errors() {
    let (handle, link) = instance(DeviceCfg::new(DEVICE)).await;

    let result = handle
        .add_device(DeviceCfg::new(DEVICE), link.sys.clone())
        .await;
    assert!(matches!(result, Err(Error::DeviceExists(name)) if name == DEVICE));

    let mut unknown = phy(true);
    unknown.name = "eth1".to_owned();
    let result = handle.device_update(unknown).await;
    assert!(
        matches!(result, Err(Error::DeviceNotFound(name)) if name == "eth1")
    );

    let result = handle.remove_device("eth1").await;
    assert!(matches!(result, Err(Error::DeviceNotFound(_))));
    assert!(handle.device_status("eth1").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn remove_device_withdraws_routes() {
    let (handle, link) = instance(DeviceCfg::new(DEVICE)).await;
    adjacency_up(&handle, &link).await;
    inject(&link, lsp(1, &[(net!("2001:db8::/32"), 1)]));
    let table = handle.rib().ipv6_unicast.clone();
    wait_for(|| table.route_count() == 1).await;

    handle.remove_device(DEVICE).await.unwrap();
    assert_eq!(table.route_count(), 0);
    assert!(handle.device_status(DEVICE).await.is_none());
    assert_eq!(link.sys.calls.lock().unwrap().last(), Some(&SysCall::Close));
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_devices() {
    let (handle, link) = instance(DeviceCfg::new(DEVICE)).await;
    adjacency_up(&handle, &link).await;
    inject(&link, lsp(1, &[(net!("10.9.0.0/16"), 5)]));
    let table = handle.rib().ipv4_unicast.clone();
    wait_for(|| table.route_count() == 1).await;

    handle.shutdown().await;
    assert_eq!(table.route_count(), 0);
    assert_eq!(link.sys.calls.lock().unwrap().last(), Some(&SysCall::Close));
}

#[tokio::test(start_paused = true)]
async fn instance_from_config() {
    let config = InstanceCfg::from_toml_str(
        r#"
        system_id = "0000.0000.0001"

        [[devices]]
        name = "eth0"
        [devices.level2]
        hello_interval = 5
        "#,
    )
    .unwrap();

    let mut link = link();
    let sys: Arc<dyn DeviceSys> = link.sys.clone();
    let handle = InstanceHandle::from_config(&config, |device| {
        assert_eq!(device.name, DEVICE);
        sys.clone()
    });
    handle.device_update(phy(true)).await.unwrap();

    let start = Instant::now();
    assert_eq!(sent_hello(&mut link).await.source, LOCAL_ID);
    sent_hello(&mut link).await;
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(start.elapsed() < Duration::from_secs(10));
}
