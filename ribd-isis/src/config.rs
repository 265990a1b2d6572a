//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::Deserialize;

use crate::error::Error;
use crate::packet::SystemId;

pub const DFLT_HELLO_INTERVAL: u16 = 10;
pub const DFLT_HOLDTIME: u16 = 30;
pub const DFLT_METRIC: u32 = 10;

// IS-IS instance configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstanceCfg {
    pub system_id: SystemId,
    pub devices: Vec<DeviceCfg>,
}

// Per-device (interface) configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceCfg {
    pub name: String,
    #[serde(default)]
    pub passive: bool,
    #[serde(default = "default_true")]
    pub p2p: bool,
    #[serde(default)]
    pub level2: Option<LevelCfg>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LevelCfg {
    pub hello_interval: u16,
    pub holdtime: u16,
    pub metric: u32,
}

// ===== impl InstanceCfg =====

impl InstanceCfg {
    pub fn from_toml_str(data: &str) -> Result<InstanceCfg, Error> {
        let config = toml::from_str(data)?;
        Ok(config)
    }
}

// ===== impl DeviceCfg =====

impl DeviceCfg {
    pub fn new(name: impl Into<String>) -> DeviceCfg {
        DeviceCfg {
            name: name.into(),
            passive: false,
            p2p: true,
            level2: Some(LevelCfg::default()),
        }
    }

    pub fn from_toml_str(data: &str) -> Result<DeviceCfg, Error> {
        let config = toml::from_str(data)?;
        Ok(config)
    }
}

// ===== impl LevelCfg =====

impl Default for LevelCfg {
    fn default() -> LevelCfg {
        LevelCfg {
            hello_interval: DFLT_HELLO_INTERVAL,
            holdtime: DFLT_HOLDTIME,
            metric: DFLT_METRIC,
        }
    }
}

// ===== helper functions =====

fn default_true() -> bool {
    true
}

// ===== unit tests =====
