//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod adjacency;
pub mod config;
pub mod debug;
pub mod device;
pub mod error;
pub mod instance;
pub mod packet;
pub mod rib;
pub mod tasks;

pub use instance::InstanceHandle;
