//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr};

use chrono::{DateTime, Utc};
use derive_new::new;
use ribd_bgp::packet::{NotificationMsg, OpenMsg, UpdateMsg};
use serde::{Deserialize, Serialize};

// BMP messages, as handed over by the decoder.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum BmpMsg {
    Initiation(InitiationMsg),
    PeerUp(PeerUpMsg),
    RouteMonitoring(RouteMonitoringMsg),
    PeerDown(PeerDownMsg),
    RouteMirroring(RouteMirroringMsg),
    Termination(TerminationMsg),
}

// Identifies a monitored peer within a monitored router.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct PeerKey {
    pub address: IpAddr,
    pub distinguisher: u64,
}

// Per-peer header common to all peer-specific messages.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PerPeerHeader {
    pub peer_type: PeerType,
    pub post_policy: bool,
    pub distinguisher: u64,
    pub address: IpAddr,
    pub peer_as: u32,
    pub peer_bgp_id: Ipv4Addr,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PeerType {
    Global = 0,
    RdInstance = 1,
    Local = 2,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct InitiationMsg {
    pub sys_name: Option<String>,
    pub sys_descr: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PeerUpMsg {
    pub peer_header: PerPeerHeader,
    pub local_addr: IpAddr,
    pub local_port: u16,
    pub remote_port: u16,
    pub sent_open: OpenMsg,
    pub received_open: OpenMsg,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RouteMonitoringMsg {
    pub peer_header: PerPeerHeader,
    pub update: UpdateMsg,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PeerDownMsg {
    pub peer_header: PerPeerHeader,
    pub reason: PeerDownReason,
}

// RFC 7854 - Section 4.9.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PeerDownReason {
    LocalNotification(NotificationMsg),
    LocalNoNotification(u16),
    RemoteNotification(NotificationMsg),
    RemoteNoNotification,
    PeerDeconfigured,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RouteMirroringMsg {
    pub peer_header: PerPeerHeader,
    pub tlvs: Vec<MirroringTlv>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum MirroringTlv {
    // Mirrored BGP PDU, kept undecoded.
    BgpMessage(Vec<u8>),
    Information(MirroringInfo),
}

// RFC 7854 - Section 4.7.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum MirroringInfo {
    ErroredPdu = 0,
    MessagesLost = 1,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct TerminationMsg {
    pub reason: Option<u16>,
    pub string: Option<String>,
}

// ===== impl BmpMsg =====

impl BmpMsg {
    // Per-peer header of peer-specific messages.
    pub fn peer_header(&self) -> Option<&PerPeerHeader> {
        match self {
            BmpMsg::PeerUp(msg) => Some(&msg.peer_header),
            BmpMsg::RouteMonitoring(msg) => Some(&msg.peer_header),
            BmpMsg::PeerDown(msg) => Some(&msg.peer_header),
            BmpMsg::RouteMirroring(msg) => Some(&msg.peer_header),
            BmpMsg::Initiation(..) | BmpMsg::Termination(..) => None,
        }
    }
}

// ===== impl PerPeerHeader =====

impl PerPeerHeader {
    pub fn key(&self) -> PeerKey {
        PeerKey::new(self.address, self.distinguisher)
    }
}

// ===== impl PeerKey =====

impl std::fmt::Display for PeerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.distinguisher == 0 {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{}:{}", self.distinguisher, self.address)
        }
    }
}
