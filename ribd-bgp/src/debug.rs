//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;
use std::time::Duration;

use ribd_rib::SourceId;
use tracing::{debug, debug_span};

use crate::packet::{Afi, Message, Safi};
use crate::session::fsm;

// BGP debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    SessionCreate(&'a IpAddr, SourceId),
    SessionDelete(&'a IpAddr),
    FsmEvent(&'a IpAddr, &'a fsm::Event),
    FsmTransition(&'a IpAddr, &'a fsm::State, &'a fsm::State),
    MsgRx(&'a IpAddr, &'a Message),
    MsgTx(&'a IpAddr, &'a Message),
    StaleMsg(&'a IpAddr, u64),
    IdleHoldStart(&'a IpAddr, Duration),
    AfStart(&'a IpAddr, Afi, Safi),
    AfStop(&'a IpAddr, Afi, Safi),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::SessionCreate(addr, source) => {
                debug_span!("neighbor", %addr).in_scope(|| {
                    debug!(%source, "{}", self);
                });
            }
            Debug::SessionDelete(addr) => {
                debug_span!("neighbor", %addr).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::FsmEvent(addr, event) => {
                debug_span!("neighbor", %addr).in_scope(|| {
                    debug_span!("fsm").in_scope(|| {
                        debug!(?event, "{}", self);
                    })
                });
            }
            Debug::FsmTransition(addr, old_state, new_state) => {
                debug_span!("neighbor", %addr).in_scope(|| {
                    debug_span!("fsm").in_scope(|| {
                        debug!(?old_state, ?new_state, "{}", self);
                    })
                });
            }
            Debug::MsgRx(addr, msg) => {
                debug_span!("neighbor", %addr).in_scope(|| {
                    debug_span!("input").in_scope(|| {
                        let data = serde_json::to_string(&msg)
                            .unwrap_or_else(|error| error.to_string());
                        debug!(%data, "{}", self);
                    })
                });
            }
            Debug::MsgTx(addr, msg) => {
                debug_span!("neighbor", %addr).in_scope(|| {
                    debug_span!("output").in_scope(|| {
                        let data = serde_json::to_string(&msg)
                            .unwrap_or_else(|error| error.to_string());
                        debug!(%data, "{}", self);
                    })
                });
            }
            Debug::StaleMsg(addr, generation) => {
                debug_span!("neighbor", %addr).in_scope(|| {
                    debug!(%generation, "{}", self);
                });
            }
            Debug::IdleHoldStart(addr, timeout) => {
                debug_span!("neighbor", %addr).in_scope(|| {
                    debug_span!("fsm").in_scope(|| {
                        debug!(?timeout, "{}", self);
                    })
                });
            }
            Debug::AfStart(addr, afi, safi) | Debug::AfStop(addr, afi, safi) => {
                debug_span!("neighbor", %addr).in_scope(|| {
                    debug!(%afi, ?safi, "{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::SessionCreate(..) => {
                write!(f, "session created")
            }
            Debug::SessionDelete(..) => {
                write!(f, "session deleted")
            }
            Debug::FsmEvent(..) => {
                write!(f, "event")
            }
            Debug::FsmTransition(..) => {
                write!(f, "state transition")
            }
            Debug::MsgRx(..) | Debug::MsgTx(..) => {
                write!(f, "message")
            }
            Debug::StaleMsg(..) => {
                write!(f, "discarding message from previous connection")
            }
            Debug::IdleHoldStart(..) => {
                write!(f, "scheduling automatic restart")
            }
            Debug::AfStart(..) => {
                write!(f, "address family activated")
            }
            Debug::AfStop(..) => {
                write!(f, "address family deactivated")
            }
        }
    }
}
