//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::{Ipv4Addr, Ipv6Addr};

use ribd_utils::task::TimeoutTask;
use serde::Serialize;
use tokio::time::Instant;

use crate::debug::Debug;
use crate::instance::InstanceView;
use crate::packet::{Snpa, SystemId, ThreeWayState};
use crate::rib::AdjRibIn;
use crate::tasks;

// Point-to-point adjacency.
#[derive(Debug)]
pub struct Adjacency {
    pub system_id: SystemId,
    pub snpa: Snpa,
    pub state: AdjacencyState,
    pub ipv4_addrs: BTreeSet<Ipv4Addr>,
    pub ipv6_addrs: BTreeSet<Ipv6Addr>,
    pub last_uptime: Option<Instant>,
    pub holdtimer: Option<TimeoutTask>,
    pub rib_in: Option<AdjRibIn>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Serialize)]
pub enum AdjacencyState {
    Down,
    Initializing,
    Up,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdjacencyEvent {
    HelloOneWayRcvd,
    HelloTwoWayRcvd,
    HoldtimeExpired,
    LinkDown,
    Kill,
}

// ===== impl Adjacency =====

impl Adjacency {
    pub(crate) fn new(
        device: &str,
        system_id: SystemId,
        snpa: Snpa,
    ) -> Adjacency {
        Debug::AdjacencyCreate(device, &system_id).log();
        Adjacency {
            system_id,
            snpa,
            state: AdjacencyState::Down,
            ipv4_addrs: Default::default(),
            ipv6_addrs: Default::default(),
            last_uptime: None,
            holdtimer: None,
            rib_in: None,
        }
    }

    // Transitions the adjacency state if different from the current one.
    //
    // Coming up attaches an Adj-RIB-In to the instance tables; leaving Up
    // withdraws everything learned over the adjacency.
    pub(crate) fn state_change(
        &mut self,
        device: &str,
        view: &mut InstanceView<'_>,
        event: AdjacencyEvent,
        new_state: AdjacencyState,
    ) {
        if self.state == new_state {
            return;
        }

        Debug::AdjacencyStateChange(
            device,
            &self.system_id,
            self.state,
            new_state,
            event,
        )
        .log();

        if new_state == AdjacencyState::Up {
            self.last_uptime = Some(Instant::now());
            let source = view.next_source();
            self.rib_in =
                Some(AdjRibIn::new(view.rib, device, &self.system_id, source));
        } else if let Some(rib_in) = self.rib_in.take() {
            view.release_source(rib_in.source);
            rib_in.stop(view.rib);
        }

        self.state = new_state;
    }

    // (Re)starts the hold timer.
    pub(crate) fn holdtimer_reset(
        &mut self,
        device: &str,
        generation: u64,
        holdtime: u16,
        view: &InstanceView<'_>,
    ) {
        self.holdtimer = Some(tasks::hold_timer(
            device,
            generation,
            self.system_id,
            holdtime,
            view.instance_msgp,
        ));
    }

    // Brings the adjacency down before it's deleted.
    pub(crate) fn stop(
        mut self,
        device: &str,
        view: &mut InstanceView<'_>,
        event: AdjacencyEvent,
    ) {
        self.state_change(device, view, event, AdjacencyState::Down);
        Debug::AdjacencyDelete(device, &self.system_id).log();
    }

    // State advertised in the Three-Way Adjacency TLV of outgoing hellos.
    pub(crate) fn three_way_state(&self) -> ThreeWayState {
        match self.state {
            AdjacencyState::Down => ThreeWayState::Down,
            AdjacencyState::Initializing => ThreeWayState::Initializing,
            AdjacencyState::Up => ThreeWayState::Up,
        }
    }
}
