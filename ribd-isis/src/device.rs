//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use async_trait::async_trait;
use derive_new::new;
use ipnetwork::IpNetwork;
use ribd_rib::SourceId;
use ribd_utils::task::{IntervalTask, Task};
use tokio::sync::oneshot;

use crate::adjacency::{Adjacency, AdjacencyEvent, AdjacencyState};
use crate::config::DeviceCfg;
use crate::debug::Debug;
use crate::error::{AdjacencyRejectError, Error, IoError};
use crate::instance::InstanceView;
use crate::packet::{
    ALL_P2P_ISS, Lsp, P2pHello, Pdu, Snpa, SystemId, ThreeWayState,
    ThreeWayTlv,
};
use crate::tasks;

// Packet I/O for a single device.
//
// Implemented by the socket collaborator, which owns the raw packet socket
// and PDU encoding.
#[async_trait]
pub trait DeviceSys: std::fmt::Debug + Send + Sync {
    async fn open_packet_socket(&self) -> Result<(), IoError>;

    async fn close_packet_socket(&self) -> Result<(), IoError>;

    async fn mcast_join(&self, addr: Snpa) -> Result<(), IoError>;

    async fn send(&self, pdu: Pdu) -> Result<(), IoError>;

    // Waits for the next decoded PDU. Fails once the socket is closed.
    async fn recv(&self) -> Result<(Snpa, Pdu), IoError>;
}

// Per-PDU processing hooks of a device.
pub trait DeviceHandler {
    fn process_p2p_hello(
        &mut self,
        view: &mut InstanceView<'_>,
        hello: P2pHello,
        src: Snpa,
    ) -> Result<(), Error>;

    fn process_lsp(
        &mut self,
        view: &mut InstanceView<'_>,
        lsp: Lsp,
        src: Snpa,
    ) -> Result<(), Error>;
}

// Physical interface state reported by the interface collaborator.
#[derive(Clone, Debug, new)]
pub struct PhyDevice {
    pub name: String,
    pub oper_up: bool,
    pub addrs: Vec<IpNetwork>,
}

#[derive(Debug)]
pub struct Device {
    pub name: String,
    pub config: DeviceCfg,
    pub phy: Option<PhyDevice>,
    pub state: DeviceState,
    pub adjacency: Option<Adjacency>,
    sys: Arc<dyn DeviceSys>,
}

#[derive(Debug, Default)]
pub struct DeviceState {
    pub up: bool,
    // Incremented every time the device goes up or down.
    pub generation: u64,
    tasks: Option<DeviceTasks>,
}

#[derive(Debug)]
struct DeviceTasks {
    done: oneshot::Sender<()>,
    receiver: Task<()>,
    hello: Option<IntervalTask>,
}

// Read-only view of a device.
#[derive(Clone, Debug)]
pub struct DeviceStatus {
    pub name: String,
    pub up: bool,
    pub adjacency: Option<AdjacencyStatus>,
}

#[derive(Clone, Debug)]
pub struct AdjacencyStatus {
    pub system_id: SystemId,
    pub state: AdjacencyState,
    pub ipv4_addrs: BTreeSet<Ipv4Addr>,
    pub source: Option<SourceId>,
    pub route_count: usize,
}

// ===== impl Device =====

impl Device {
    pub(crate) fn new(config: DeviceCfg, sys: Arc<dyn DeviceSys>) -> Device {
        Debug::DeviceCreate(&config.name).log();
        Device {
            name: config.name.clone(),
            config,
            phy: None,
            state: Default::default(),
            adjacency: None,
            sys,
        }
    }

    // Updates the physical interface state, enabling IS-IS when the
    // interface is operationally up and disabling it otherwise.
    pub(crate) async fn device_update(
        &mut self,
        view: &mut InstanceView<'_>,
        phy: PhyDevice,
    ) -> Result<(), Error> {
        let oper_up = phy.oper_up;
        self.phy = Some(phy);

        if oper_up {
            if self.state.up {
                // Addresses may have changed.
                self.hello_interval_start(view);
                return Ok(());
            }
            self.enable(view).await.map_err(|error| {
                Error::DeviceStartError(self.name.clone(), Box::new(error))
            })
        } else {
            self.disable(view).await.map_err(|error| {
                Error::DeviceStopError(self.name.clone(), Box::new(error))
            })
        }
    }

    async fn enable(
        &mut self,
        view: &mut InstanceView<'_>,
    ) -> Result<(), Error> {
        self.sys.open_packet_socket().await?;
        if let Err(error) = self.sys.mcast_join(ALL_P2P_ISS).await {
            let _ = self.sys.close_packet_socket().await;
            return Err(error.into());
        }

        self.state.generation += 1;
        let (done_tx, done_rx) = oneshot::channel();
        let receiver = tasks::receiver(
            &self.name,
            self.state.generation,
            self.sys.clone(),
            done_rx,
            view.instance_msgp,
        );
        self.state.tasks = Some(DeviceTasks {
            done: done_tx,
            receiver,
            hello: None,
        });
        self.state.up = true;
        self.hello_interval_start(view);

        Debug::DeviceUp(&self.name).log();
        Ok(())
    }

    // Stops the device tasks and waits for them to finish.
    //
    // Once this returns, no PDU received on the device can be processed
    // anymore and the adjacency routes are gone.
    pub(crate) async fn disable(
        &mut self,
        view: &mut InstanceView<'_>,
    ) -> Result<(), Error> {
        let Some(tasks) = self.state.tasks.take() else {
            return Ok(());
        };
        self.state.up = false;
        self.state.generation += 1;

        let _ = tasks.done.send(());
        let result = self.sys.close_packet_socket().await;
        if let Some(hello) = tasks.hello {
            hello.cancel().await;
        }
        let _ = tasks.receiver.await;

        if let Some(adj) = self.adjacency.take() {
            adj.stop(&self.name, view, AdjacencyEvent::LinkDown);
        }

        Debug::DeviceDown(&self.name).log();
        result.map_err(Error::from)
    }

    // Handles a received PDU.
    pub(crate) fn pdu_rx(
        &mut self,
        view: &mut InstanceView<'_>,
        generation: u64,
        src: Snpa,
        pdu: Pdu,
    ) {
        if generation != self.state.generation {
            Debug::StalePdu(&self.name, generation).log();
            return;
        }

        Debug::PduRx(&self.name, &src, &pdu).log();
        let result = match pdu {
            Pdu::P2pHello(hello) => self.process_p2p_hello(view, hello, src),
            Pdu::Lsp(lsp) => self.process_lsp(view, lsp, src),
        };
        if let Err(error) = result {
            error.log();
        }
    }

    // Handles the expiry of an adjacency hold timer.
    pub(crate) fn holdtimer_expiry(
        &mut self,
        view: &mut InstanceView<'_>,
        generation: u64,
        system_id: SystemId,
    ) {
        if generation != self.state.generation
            || self.adjacency.as_ref().map(|adj| adj.system_id)
                != Some(system_id)
        {
            return;
        }

        if let Some(adj) = self.adjacency.take() {
            adj.stop(&self.name, view, AdjacencyEvent::HoldtimeExpired);
        }
        self.hello_interval_start(view);
    }

    // (Re)starts sending hellos reflecting the current adjacency state.
    pub(crate) fn hello_interval_start(&mut self, view: &InstanceView<'_>) {
        if self.config.passive {
            return;
        }

        let hello = self.hello_build(view);
        let interval =
            self.config.level2.as_ref().map(|level| level.hello_interval);
        let Some(device_tasks) = &mut self.state.tasks else {
            return;
        };
        device_tasks.hello = hello.zip(interval).map(|(hello, interval)| {
            tasks::hello_interval(&self.name, self.sys.clone(), hello, interval)
        });
    }

    fn hello_build(&self, view: &InstanceView<'_>) -> Option<P2pHello> {
        let level = self.config.level2.as_ref()?;
        let three_way = match &self.adjacency {
            Some(adj) => ThreeWayTlv {
                state: adj.three_way_state(),
                neighbor: Some(adj.system_id),
            },
            None => ThreeWayTlv {
                state: ThreeWayState::Down,
                neighbor: None,
            },
        };

        let addrs = self
            .phy
            .as_ref()
            .map(|phy| phy.addrs.as_slice())
            .unwrap_or_default();
        let ipv4_addrs = addrs
            .iter()
            .filter_map(|addr| match addr {
                IpNetwork::V4(addr) => Some(addr.ip()),
                IpNetwork::V6(_) => None,
            })
            .collect();
        let ipv6_addrs = addrs
            .iter()
            .filter_map(|addr| match addr {
                IpNetwork::V6(addr) => Some(addr.ip()),
                IpNetwork::V4(_) => None,
            })
            .collect();

        Some(P2pHello {
            source: view.system_id,
            holdtime: level.holdtime,
            three_way: Some(three_way),
            ipv4_addrs,
            ipv6_addrs,
        })
    }

    // Keeps only the neighbor addresses that belong to one of the device's
    // subnets.
    pub(crate) fn validate_neighbor_addrs(
        &self,
        addrs: &[Ipv4Addr],
    ) -> BTreeSet<Ipv4Addr> {
        let networks = self
            .phy
            .as_ref()
            .map(|phy| phy.addrs.as_slice())
            .unwrap_or_default();

        addrs
            .iter()
            .filter(|addr| {
                let covered = networks
                    .iter()
                    .any(|network| network.contains(IpAddr::V4(**addr)));
                if !covered {
                    Debug::NeighborAddrIgnored(&self.name, addr).log();
                }
                covered
            })
            .copied()
            .collect()
    }

    pub(crate) fn status(&self) -> DeviceStatus {
        DeviceStatus {
            name: self.name.clone(),
            up: self.state.up,
            adjacency: self.adjacency.as_ref().map(|adj| AdjacencyStatus {
                system_id: adj.system_id,
                state: adj.state,
                ipv4_addrs: adj.ipv4_addrs.clone(),
                source: adj.rib_in.as_ref().map(|rib_in| rib_in.source),
                route_count: adj
                    .rib_in
                    .as_ref()
                    .map(|rib_in| rib_in.route_count())
                    .unwrap_or(0),
            }),
        }
    }
}

impl DeviceHandler for Device {
    fn process_p2p_hello(
        &mut self,
        view: &mut InstanceView<'_>,
        hello: P2pHello,
        src: Snpa,
    ) -> Result<(), Error> {
        // Passive devices don't form adjacencies.
        if self.config.passive {
            return Ok(());
        }

        let reject = |error| {
            Error::AdjacencyReject(self.name.clone(), hello.source, error)
        };
        let Some(level) = &self.config.level2 else {
            return Err(reject(AdjacencyRejectError::LevelNotConfigured));
        };
        if hello.source == view.system_id {
            return Err(reject(AdjacencyRejectError::DuplicateSystemId));
        }
        if let Some(tlv) = &hello.three_way
            && let Some(neighbor) = tlv.neighbor
            && neighbor != view.system_id
        {
            return Err(reject(AdjacencyRejectError::WrongSystem));
        }
        let holdtime = if hello.holdtime != 0 {
            hello.holdtime
        } else {
            level.holdtime
        };

        // A different system on the link replaces the current adjacency.
        if let Some(adj) = self
            .adjacency
            .take_if(|adj| adj.system_id != hello.source)
        {
            adj.stop(&self.name, view, AdjacencyEvent::Kill);
        }

        let ipv4_addrs = self.validate_neighbor_addrs(&hello.ipv4_addrs);
        let generation = self.state.generation;
        let adj = self.adjacency.get_or_insert_with(|| {
            Adjacency::new(&self.name, hello.source, src)
        });
        adj.snpa = src;
        adj.ipv4_addrs = ipv4_addrs;
        adj.ipv6_addrs = hello.ipv6_addrs.iter().copied().collect();
        adj.holdtimer_reset(&self.name, generation, holdtime, view);

        // RFC 5303 three-way handshake.
        let (event, new_state) = match hello.three_way {
            Some(ThreeWayTlv {
                state: ThreeWayState::Initializing | ThreeWayState::Up,
                neighbor: Some(_),
            }) => (AdjacencyEvent::HelloTwoWayRcvd, AdjacencyState::Up),
            Some(_) => (
                AdjacencyEvent::HelloOneWayRcvd,
                AdjacencyState::Initializing,
            ),
            // Neighbor without three-way support.
            None => (AdjacencyEvent::HelloTwoWayRcvd, AdjacencyState::Up),
        };
        let old_state = adj.state;
        adj.state_change(&self.name, view, event, new_state);

        if old_state != new_state {
            self.hello_interval_start(view);
        }
        Ok(())
    }

    fn process_lsp(
        &mut self,
        view: &mut InstanceView<'_>,
        lsp: Lsp,
        _src: Snpa,
    ) -> Result<(), Error> {
        let link_metric = self
            .config
            .level2
            .as_ref()
            .map(|level| level.metric)
            .unwrap_or_default();
        let Some(adj) = &mut self.adjacency else {
            return Ok(());
        };
        let Some(rib_in) = &mut adj.rib_in else {
            return Ok(());
        };

        let nexthop4 = adj.ipv4_addrs.first().copied();
        let nexthop6 = adj.ipv6_addrs.first().copied();
        if !rib_in.lsp_apply(view.rib, &lsp, link_metric, nexthop4, nexthop6) {
            Debug::LspIgnored(&self.name, &lsp.lsp_id.system_id, lsp.seqno)
                .log();
        }
        Ok(())
    }
}
