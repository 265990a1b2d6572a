//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use ribd_rib::SourceId;
use tracing::{debug, debug_span};

use crate::packet::{BmpMsg, PeerDownReason, PeerKey};

// BMP debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    RouterCreate(&'a IpAddr),
    RouterDelete(&'a IpAddr),
    RouterInitiated(&'a IpAddr, Option<&'a str>),
    MsgRx(&'a IpAddr, &'a BmpMsg),
    PeerUp(&'a IpAddr, &'a PeerKey, SourceId),
    PeerDown(&'a IpAddr, &'a PeerKey, &'a PeerDownReason),
    MessagesLost(&'a IpAddr, &'a PeerKey),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::RouterCreate(router) | Debug::RouterDelete(router) => {
                debug_span!("router", %router).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::RouterInitiated(router, name) => {
                debug_span!("router", %router).in_scope(|| {
                    debug!(?name, "{}", self);
                });
            }
            Debug::MsgRx(router, msg) => {
                debug_span!("router", %router).in_scope(|| {
                    debug_span!("input").in_scope(|| {
                        let data = serde_json::to_string(&msg)
                            .unwrap_or_else(|error| error.to_string());
                        debug!(%data, "{}", self);
                    })
                });
            }
            Debug::PeerUp(router, peer, source) => {
                debug_span!("router", %router).in_scope(|| {
                    debug_span!("peer", %peer).in_scope(|| {
                        debug!(%source, "{}", self);
                    })
                });
            }
            Debug::PeerDown(router, peer, reason) => {
                debug_span!("router", %router).in_scope(|| {
                    debug_span!("peer", %peer).in_scope(|| {
                        debug!(?reason, "{}", self);
                    })
                });
            }
            Debug::MessagesLost(router, peer) => {
                debug_span!("router", %router).in_scope(|| {
                    debug_span!("peer", %peer).in_scope(|| {
                        debug!("{}", self);
                    })
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::RouterCreate(..) => {
                write!(f, "monitored router connected")
            }
            Debug::RouterDelete(..) => {
                write!(f, "monitored router disconnected")
            }
            Debug::RouterInitiated(..) => {
                write!(f, "monitoring session initiated")
            }
            Debug::MsgRx(..) => {
                write!(f, "message")
            }
            Debug::PeerUp(..) => {
                write!(f, "monitored peer is up")
            }
            Debug::PeerDown(..) => {
                write!(f, "monitored peer is down")
            }
            Debug::MessagesLost(..) => {
                write!(f, "router reported lost mirrored messages")
            }
        }
    }
}
