//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod af;
pub mod config;
pub mod debug;
pub mod error;
pub mod export;
pub mod metrics;
pub mod packet;
pub mod peer;
pub mod rib;
pub mod session;
pub mod tasks;
pub mod transport;

pub use peer::PeerManager;
