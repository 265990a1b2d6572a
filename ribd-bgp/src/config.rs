//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};

use serde::Deserialize;

use crate::error::{Error, TimersCfgError};
use crate::packet::{Afi, Safi};

pub const DFLT_HOLDTIME: u16 = 90;
pub const DFLT_CONNECT_RETRY_INTERVAL: u16 = 120;
pub const DFLT_IDLE_HOLD_TIME: u16 = 1;
pub const DFLT_IDLE_HOLD_TIME_MAX: u16 = 60;

// BGP instance configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstanceCfg {
    pub asn: u32,
    pub router_id: Ipv4Addr,
    pub neighbors: Vec<NeighborCfg>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeighborCfg {
    pub remote_addr: IpAddr,
    pub peer_as: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub passive: bool,
    #[serde(default)]
    pub timers: TimersCfg,
    #[serde(default)]
    pub afi_safi: AfiSafiCfg,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimersCfg {
    pub holdtime: u16,
    // Defaults to one third of the negotiated hold time.
    pub keepalive: Option<u16>,
    pub connect_retry_interval: u16,
    pub idle_hold_time: u16,
    pub idle_hold_time_max: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AfiSafiCfg {
    pub ipv4_unicast: bool,
    pub ipv6_unicast: bool,
}

// ===== impl InstanceCfg =====

impl InstanceCfg {
    pub fn from_toml_str(data: &str) -> Result<InstanceCfg, Error> {
        let config: InstanceCfg = toml::from_str(data)?;
        for neighbor in &config.neighbors {
            neighbor.validate()?;
        }
        Ok(config)
    }
}

impl Default for InstanceCfg {
    fn default() -> InstanceCfg {
        InstanceCfg {
            asn: 0,
            router_id: Ipv4Addr::UNSPECIFIED,
            neighbors: Default::default(),
        }
    }
}

// ===== impl NeighborCfg =====

impl NeighborCfg {
    pub fn new(remote_addr: IpAddr, peer_as: u32) -> NeighborCfg {
        NeighborCfg {
            remote_addr,
            peer_as,
            enabled: true,
            passive: false,
            timers: Default::default(),
            afi_safi: Default::default(),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.timers
            .validate()
            .map_err(|error| Error::TimersCfgError(self.remote_addr, error))
    }
}

// ===== impl TimersCfg =====

impl TimersCfg {
    // The hold time must be zero or at least three seconds, and the retry
    // timers must be nonzero.
    pub fn validate(&self) -> Result<(), TimersCfgError> {
        if matches!(self.holdtime, 1 | 2) {
            return Err(TimersCfgError::HoldTimeInvalid(self.holdtime));
        }
        if self.connect_retry_interval == 0 {
            return Err(TimersCfgError::ConnectRetryIntervalZero);
        }
        if self.idle_hold_time == 0 {
            return Err(TimersCfgError::IdleHoldTimeZero);
        }
        if self.idle_hold_time > self.idle_hold_time_max {
            return Err(TimersCfgError::IdleHoldTimeAboveMax {
                idle_hold_time: self.idle_hold_time,
                idle_hold_time_max: self.idle_hold_time_max,
            });
        }
        Ok(())
    }
}

impl Default for TimersCfg {
    fn default() -> TimersCfg {
        TimersCfg {
            holdtime: DFLT_HOLDTIME,
            keepalive: None,
            connect_retry_interval: DFLT_CONNECT_RETRY_INTERVAL,
            idle_hold_time: DFLT_IDLE_HOLD_TIME,
            idle_hold_time_max: DFLT_IDLE_HOLD_TIME_MAX,
        }
    }
}

// ===== impl AfiSafiCfg =====

impl AfiSafiCfg {
    pub fn enabled(&self) -> BTreeSet<(Afi, Safi)> {
        let mut afs = BTreeSet::new();
        if self.ipv4_unicast {
            afs.insert((Afi::Ipv4, Safi::Unicast));
        }
        if self.ipv6_unicast {
            afs.insert((Afi::Ipv6, Safi::Unicast));
        }
        afs
    }
}

impl Default for AfiSafiCfg {
    fn default() -> AfiSafiCfg {
        AfiSafiCfg {
            ipv4_unicast: true,
            ipv6_unicast: false,
        }
    }
}

// ===== helper functions =====

fn default_true() -> bool {
    true
}

// ===== unit tests =====
