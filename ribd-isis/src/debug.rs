//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use tracing::{debug, debug_span};

use crate::adjacency::{AdjacencyEvent, AdjacencyState};
use crate::packet::{Pdu, Snpa, SystemId};

// IS-IS debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    InstanceStart(&'a SystemId),
    InstanceStop,
    DeviceCreate(&'a str),
    DeviceDelete(&'a str),
    DeviceUp(&'a str),
    DeviceDown(&'a str),
    AdjacencyCreate(&'a str, &'a SystemId),
    AdjacencyDelete(&'a str, &'a SystemId),
    AdjacencyStateChange(
        &'a str,
        &'a SystemId,
        AdjacencyState,
        AdjacencyState,
        AdjacencyEvent,
    ),
    NeighborAddrIgnored(&'a str, &'a Ipv4Addr),
    LspIgnored(&'a str, &'a SystemId, u32),
    PduRx(&'a str, &'a Snpa, &'a Pdu),
    PduTx(&'a str, &'a Pdu),
    StalePdu(&'a str, u64),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::InstanceStart(system_id) => {
                debug!(%system_id, "{}", self);
            }
            Debug::InstanceStop => {
                debug!("{}", self);
            }
            Debug::DeviceCreate(name)
            | Debug::DeviceDelete(name)
            | Debug::DeviceUp(name)
            | Debug::DeviceDown(name) => {
                debug_span!("device", %name).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::AdjacencyCreate(name, system_id)
            | Debug::AdjacencyDelete(name, system_id) => {
                debug_span!("device", %name).in_scope(|| {
                    debug_span!("adjacency", %system_id).in_scope(|| {
                        debug!("{}", self);
                    })
                });
            }
            Debug::AdjacencyStateChange(
                name,
                system_id,
                old_state,
                new_state,
                event,
            ) => {
                debug_span!("device", %name).in_scope(|| {
                    debug_span!("adjacency", %system_id).in_scope(|| {
                        debug!(?old_state, ?new_state, ?event, "{}", self);
                    })
                });
            }
            Debug::NeighborAddrIgnored(name, addr) => {
                debug_span!("device", %name).in_scope(|| {
                    debug!(%addr, "{}", self);
                });
            }
            Debug::LspIgnored(name, system_id, seqno) => {
                debug_span!("device", %name).in_scope(|| {
                    debug!(%system_id, %seqno, "{}", self);
                });
            }
            Debug::PduRx(name, source, pdu) => {
                debug_span!("device", %name).in_scope(|| {
                    debug_span!("input").in_scope(|| {
                        let data = serde_json::to_string(&pdu)
                            .unwrap_or_else(|error| error.to_string());
                        debug!(?source, %data, "{}", self);
                    })
                });
            }
            Debug::PduTx(name, pdu) => {
                debug_span!("device", %name).in_scope(|| {
                    debug_span!("output").in_scope(|| {
                        let data = serde_json::to_string(&pdu)
                            .unwrap_or_else(|error| error.to_string());
                        debug!(%data, "{}", self);
                    })
                });
            }
            Debug::StalePdu(name, generation) => {
                debug_span!("device", %name).in_scope(|| {
                    debug!(%generation, "{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InstanceStart(..) => {
                write!(f, "starting instance")
            }
            Debug::InstanceStop => {
                write!(f, "stopping instance")
            }
            Debug::DeviceCreate(..) => {
                write!(f, "device created")
            }
            Debug::DeviceDelete(..) => {
                write!(f, "device deleted")
            }
            Debug::DeviceUp(..) => {
                write!(f, "device is now up")
            }
            Debug::DeviceDown(..) => {
                write!(f, "device is now down")
            }
            Debug::AdjacencyCreate(..) => {
                write!(f, "adjacency created")
            }
            Debug::AdjacencyDelete(..) => {
                write!(f, "adjacency deleted")
            }
            Debug::AdjacencyStateChange(..) => {
                write!(f, "adjacency state change")
            }
            Debug::NeighborAddrIgnored(..) => {
                write!(f, "ignoring neighbor address outside device subnets")
            }
            Debug::LspIgnored(..) => {
                write!(f, "ignoring LSP that is not newer")
            }
            Debug::PduRx(..) | Debug::PduTx(..) => {
                write!(f, "pdu")
            }
            Debug::StalePdu(..) => {
                write!(f, "discarding packet received before device restart")
            }
        }
    }
}
