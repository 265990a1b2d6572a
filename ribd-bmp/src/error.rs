//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use tracing::{warn, warn_span};

use crate::packet::PeerKey;

// BMP errors.
#[derive(Debug)]
pub enum Error {
    RouterExists(IpAddr),
    RouterNotFound(IpAddr),
    PeerExists(IpAddr, PeerKey),
    PeerNotFound(IpAddr, PeerKey),
    // Message received before the router's Initiation message.
    NotInitiated(IpAddr),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::RouterExists(router) | Error::RouterNotFound(router) => {
                warn!(%router, "{}", self);
            }
            Error::PeerExists(router, peer)
            | Error::PeerNotFound(router, peer) => {
                warn_span!("router", %router).in_scope(|| {
                    warn!(%peer, "{}", self);
                });
            }
            Error::NotInitiated(router) => {
                warn!(%router, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::RouterExists(..) => {
                write!(f, "monitored router already exists")
            }
            Error::RouterNotFound(..) => {
                write!(f, "monitored router not found")
            }
            Error::PeerExists(..) => {
                write!(f, "peer up received for a peer that is already up")
            }
            Error::PeerNotFound(..) => {
                write!(f, "message received for an unknown peer")
            }
            Error::NotInitiated(..) => {
                write!(f, "message received before initiation")
            }
        }
    }
}

impl std::error::Error for Error {}
