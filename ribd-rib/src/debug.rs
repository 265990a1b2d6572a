//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::IpNetwork;
use tracing::{debug, debug_span};

use crate::client::ClientOptions;
use crate::path::{Path, SourceId};

// Routing table debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    BestPathFound(&'a str, IpNetwork, &'a Path),
    BestPathNotFound(&'a str, IpNetwork),
    SourceRemove(&'a str, SourceId, usize),
    TableClear(&'a str, usize),
    ClientRegister(&'a str, &'a dyn std::fmt::Debug, ClientOptions),
    ClientUnregister(&'a str, &'a dyn std::fmt::Debug),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::BestPathFound(table, prefix, path) => {
                debug_span!("table", name = %table).in_scope(|| {
                    debug!(%prefix, source = %path.source, attrs = path.attrs.index, "{}", self);
                });
            }
            Debug::BestPathNotFound(table, prefix) => {
                debug_span!("table", name = %table).in_scope(|| {
                    debug!(%prefix, "{}", self);
                });
            }
            Debug::SourceRemove(table, source, count) => {
                debug_span!("table", name = %table).in_scope(|| {
                    debug!(%source, %count, "{}", self);
                });
            }
            Debug::TableClear(table, count) => {
                debug_span!("table", name = %table).in_scope(|| {
                    debug!(%count, "{}", self);
                });
            }
            Debug::ClientRegister(table, client, options) => {
                debug_span!("table", name = %table).in_scope(|| {
                    debug!(?client, ?options, "{}", self);
                });
            }
            Debug::ClientUnregister(table, client) => {
                debug_span!("table", name = %table).in_scope(|| {
                    debug!(?client, "{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::BestPathFound(..) => {
                write!(f, "best path found")
            }
            Debug::BestPathNotFound(..) => {
                write!(f, "best path not found")
            }
            Debug::SourceRemove(..) => {
                write!(f, "removing paths from source")
            }
            Debug::TableClear(..) => {
                write!(f, "clearing table")
            }
            Debug::ClientRegister(..) => {
                write!(f, "client registered")
            }
            Debug::ClientUnregister(..) => {
                write!(f, "client unregistered")
            }
        }
    }
}
