//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

use ribd_rib::{SourceId, SourceIdAllocator};
use ribd_utils::UnboundedSender;
use ribd_utils::task::Task;
use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug_span};

use crate::config::{InstanceCfg, NeighborCfg};
use crate::error::Error;
use crate::metrics::{BgpMetrics, BgpPeerMetrics};
use crate::rib::Rib;
use crate::session::{InstanceCxt, PeerType, Session, SessionStatus};
use crate::tasks::messages::{AdminCmd, AdminMsg, SessionMsg};
use crate::transport::{Connection, Connector};

// Owner of all BGP sessions of an instance.
#[derive(Debug)]
pub struct PeerManager {
    instance: InstanceCxt,
    peers: BTreeMap<IpAddr, PeerHandle>,
    sources: SourceIdAllocator,
}

// Handle to a running session task.
#[derive(Debug)]
struct PeerHandle {
    peer_as: u32,
    source: SourceId,
    session_msgp: UnboundedSender<SessionMsg>,
    status: Arc<Mutex<SessionStatus>>,
    task: Task<()>,
}

// ===== impl PeerManager =====

impl PeerManager {
    pub fn new(
        asn: u32,
        router_id: Ipv4Addr,
        connector: Arc<dyn Connector>,
    ) -> PeerManager {
        PeerManager {
            instance: InstanceCxt {
                asn,
                router_id,
                rib: Default::default(),
                connector,
            },
            peers: Default::default(),
            sources: Default::default(),
        }
    }

    // Creates an instance and starts a session for every configured
    // neighbor.
    pub fn from_config(
        config: &InstanceCfg,
        connector: Arc<dyn Connector>,
    ) -> Result<PeerManager, Error> {
        let mut manager =
            PeerManager::new(config.asn, config.router_id, connector);
        for neighbor in &config.neighbors {
            manager.add_peer(neighbor.clone())?;
        }
        Ok(manager)
    }

    pub fn rib(&self) -> &Arc<Rib> {
        &self.instance.rib
    }

    pub fn asn(&self) -> u32 {
        self.instance.asn
    }

    // Creates a session for the given neighbor, returning the source
    // identifier of the paths it will contribute.
    pub fn add_peer(&mut self, config: NeighborCfg) -> Result<SourceId, Error> {
        let remote_addr = config.remote_addr;
        if self.peers.contains_key(&remote_addr) {
            return Err(Error::PeerExists(remote_addr));
        }
        config.validate()?;

        let source = self.sources.allocate();
        let peer_as = config.peer_as;
        let peer_type = PeerType::new(self.instance.asn, peer_as);
        self.instance.rib.peer_types.insert(source, peer_type);

        let (session_msgp, session_msgc) = mpsc::unbounded_channel();
        let status = Arc::new(Mutex::new(SessionStatus::new(
            &config,
            self.instance.asn,
        )));
        let session = Session::new(
            config,
            source,
            self.instance.clone(),
            session_msgp.clone(),
            status.clone(),
        );
        let span = debug_span!("bgp", asn = self.instance.asn);
        let task = Task::spawn(session.run(session_msgc).instrument(span));

        self.peers.insert(
            remote_addr,
            PeerHandle {
                peer_as,
                source,
                session_msgp,
                status,
                task,
            },
        );
        Ok(source)
    }

    // Stops the session with the given neighbor and deletes it.
    //
    // Every route learned from the neighbor is withdrawn before this
    // returns.
    pub async fn remove_peer(&mut self, remote_addr: IpAddr) -> Result<(), Error> {
        let peer = self
            .peers
            .remove(&remote_addr)
            .ok_or(Error::PeerNotFound(remote_addr))?;
        peer.admin(AdminCmd::Shutdown).await;
        let _ = peer.task.await;
        self.instance.rib.peer_types.remove(peer.source);
        self.sources.release(peer.source);
        Ok(())
    }

    pub async fn enable_peer(&self, remote_addr: IpAddr) -> Result<(), Error> {
        self.admin(remote_addr, AdminCmd::Enable).await
    }

    pub async fn disable_peer(&self, remote_addr: IpAddr) -> Result<(), Error> {
        self.admin(remote_addr, AdminCmd::Disable).await
    }

    // Resets the session, which restarts automatically afterwards.
    pub async fn clear_peer(&self, remote_addr: IpAddr) -> Result<(), Error> {
        self.admin(remote_addr, AdminCmd::Clear).await
    }

    async fn admin(&self, remote_addr: IpAddr, cmd: AdminCmd) -> Result<(), Error> {
        let peer = self
            .peers
            .get(&remote_addr)
            .ok_or(Error::PeerNotFound(remote_addr))?;
        peer.admin(cmd).await;
        Ok(())
    }

    // Hands an inbound connection over to the matching session.
    //
    // Returns false if no session exists for the connection's remote
    // address, in which case the connection is dropped.
    pub fn accept(&self, conn: Connection) -> bool {
        match self.peers.get(&conn.remote_addr) {
            Some(peer) => peer.session_msgp.send(SessionMsg::Accept(conn)).is_ok(),
            None => false,
        }
    }

    pub fn status(&self, remote_addr: IpAddr) -> Option<SessionStatus> {
        self.peers
            .get(&remote_addr)
            .map(|peer| peer.status.lock().unwrap().clone())
    }

    pub fn source(&self, remote_addr: IpAddr) -> Option<SourceId> {
        self.peers.get(&remote_addr).map(|peer| peer.source)
    }

    pub fn peers(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.peers.keys().copied()
    }

    pub fn metrics(&self) -> BgpMetrics {
        let peers = self
            .peers
            .iter()
            .filter_map(|(addr, peer)| {
                let status = peer.status.lock().unwrap();
                BgpPeerMetrics::new(
                    *addr,
                    peer.peer_as,
                    self.instance.asn,
                    &status,
                )
            })
            .collect();
        BgpMetrics { peers }
    }
}

// ===== impl PeerHandle =====

impl PeerHandle {
    // Sends an administrative command and waits until it's processed.
    async fn admin(&self, cmd: AdminCmd) {
        let (responder_tx, responder_rx) = oneshot::channel();
        let msg = SessionMsg::Admin(AdminMsg {
            cmd,
            responder: Some(responder_tx),
        });
        if self.session_msgp.send(msg).is_ok() {
            let _ = responder_rx.await;
        }
    }
}
