//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod debug;
pub mod error;
pub mod packet;
pub mod router;

pub use router::{BmpRouter, BmpStation};
