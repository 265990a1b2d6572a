//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::ControlFlow;
use std::sync::atomic::{self, AtomicU64};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use ribd_rib::path::IneligibleReason;
use ribd_rib::{Ipv4Unicast, Ipv6Unicast, Path, RouteUpdate, SourceId};
use ribd_utils::ip::IpNetworkKind;
use ribd_utils::task::{IntervalTask, Task, TimeoutTask};
use ribd_utils::{UnboundedReceiver, UnboundedSender};
use serde::Serialize;
use tokio::time::Instant;

use crate::af::{BgpAddressFamily, ExportUpdate, FsmAddressFamily, SessionAfs};
use crate::config::NeighborCfg;
use crate::debug::Debug;
use crate::error::{Error, IoError, NegotiationError, SessionRxError};
use crate::export::ExportPolicy;
use crate::metrics::RouteCount;
use crate::packet::{
    AS_TRANS, Afi, BGP_VERSION, Capability, CeaseSubcode, ErrorCode,
    FsmErrorSubcode, Message, NotificationMsg, OpenMsg, Safi, UpdateMsg,
};
use crate::rib::Rib;
use crate::tasks;
use crate::tasks::messages::{AdminCmd, SessionMsg};
use crate::transport::{Connection, Connector};

// Large hold-time used during session initialization.
const LARGE_HOLDTIME: u16 = 240;

// BGP session with a single neighbor.
//
// Each session runs as an independent task that owns all of its state and
// processes one mailbox message at a time.
#[derive(Debug)]
pub struct Session {
    pub remote_addr: IpAddr,
    pub source: SourceId,
    pub config: NeighborCfg,
    pub state: fsm::State,
    pub peer_type: PeerType,
    pub generation: u64,
    pub conn: Option<SessionConn>,
    pub identifier: Option<Ipv4Addr>,
    pub holdtime_nego: Option<u16>,
    pub afs_nego: BTreeSet<(Afi, Safi)>,
    pub notification_sent: Option<(DateTime<Utc>, NotificationMsg)>,
    pub notification_rcvd: Option<(DateTime<Utc>, NotificationMsg)>,
    pub last_established: Option<DateTime<Utc>>,
    pub statistics: SessionStatistics,
    pub tasks: SessionTasks,
    pub afs: SessionAfs,
    idle_hold_time: u16,
    established_at: Option<Instant>,
    instance: InstanceCxt,
    session_msgp: UnboundedSender<SessionMsg>,
    status: Arc<Mutex<SessionStatus>>,
}

// Instance-wide context shared by every session.
#[derive(Clone, Debug)]
pub struct InstanceCxt {
    pub asn: u32,
    pub router_id: Ipv4Addr,
    pub rib: Arc<Rib>,
    pub connector: Arc<dyn Connector>,
}

// BGP peer type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Serialize)]
pub enum PeerType {
    Internal,
    External,
}

// Live transport connection.
#[derive(Debug)]
pub struct SessionConn {
    pub local_addr: IpAddr,
    pub msg_tx: UnboundedSender<Message>,
}

// Session statistics.
#[derive(Clone, Debug, Default)]
pub struct SessionStatistics {
    pub established_transitions: u32,
    pub msgs_rcvd: MessageStatistics,
    pub msgs_sent: MessageStatistics,
}

// Inbound/outbound message counters.
#[derive(Clone, Debug, Default)]
pub struct MessageStatistics {
    pub total: Arc<AtomicU64>,
    pub updates: u64,
    pub notifications: u64,
}

// Session child tasks.
#[derive(Debug, Default)]
pub struct SessionTasks {
    pub connect: Option<Task<()>>,
    pub rx: Option<Task<()>>,
    pub connect_retry: Option<TimeoutTask>,
    pub holdtime: Option<TimeoutTask>,
    pub keepalive: Option<IntervalTask>,
    pub idle_hold: Option<TimeoutTask>,
}

// Read-only view of a session, refreshed after every processed event.
#[derive(Clone, Debug)]
pub struct SessionStatus {
    pub state: fsm::State,
    pub peer_type: PeerType,
    pub enabled: bool,
    pub local_addr: Option<IpAddr>,
    pub identifier: Option<Ipv4Addr>,
    pub holdtime_nego: Option<u16>,
    pub afs_nego: BTreeSet<(Afi, Safi)>,
    pub statistics: SessionStatistics,
    pub notification_sent: Option<(DateTime<Utc>, NotificationMsg)>,
    pub notification_rcvd: Option<(DateTime<Utc>, NotificationMsg)>,
    pub last_established: Option<DateTime<Utc>>,
    pub afs: Vec<AfStatus>,
}

#[derive(Clone, Debug)]
pub struct AfStatus {
    pub afi: Afi,
    pub safi: Safi,
    pub updates_received: u64,
    pub updates_sent: u64,
    pub adj_rib_in: Arc<dyn RouteCount>,
    pub adj_rib_out: Arc<dyn RouteCount>,
}

// Finite State Machine.
pub mod fsm {
    use serde::{Deserialize, Serialize};

    use crate::packet::{NotificationMsg, OpenMsg};
    use crate::transport::Connection;

    #[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
    #[derive(Deserialize, Serialize)]
    pub enum State {
        Idle,
        Connect,
        Active,
        OpenSent,
        OpenConfirm,
        Established,
    }

    #[derive(Debug)]
    pub enum Event {
        Start,
        Stop(Option<NotificationMsg>),
        Connected(Connection),
        ConnFail,
        RcvdError(Option<NotificationMsg>),
        RcvdOpen(OpenMsg),
        RcvdNotif(NotificationMsg),
        RcvdKalive,
        RcvdUpdate,
        Timer(Timer),
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub enum Timer {
        ConnectRetry,
        Hold,
        IdleHold,
    }
}

// ===== impl Session =====

impl Session {
    pub(crate) fn new(
        config: NeighborCfg,
        source: SourceId,
        instance: InstanceCxt,
        session_msgp: UnboundedSender<SessionMsg>,
        status: Arc<Mutex<SessionStatus>>,
    ) -> Session {
        let remote_addr = config.remote_addr;
        let peer_type = PeerType::new(instance.asn, config.peer_as);
        let idle_hold_time = config.timers.idle_hold_time;
        Debug::SessionCreate(&remote_addr, source).log();

        Session {
            remote_addr,
            source,
            config,
            state: fsm::State::Idle,
            peer_type,
            generation: 0,
            conn: None,
            identifier: None,
            holdtime_nego: None,
            afs_nego: Default::default(),
            notification_sent: None,
            notification_rcvd: None,
            last_established: None,
            statistics: Default::default(),
            tasks: Default::default(),
            afs: Default::default(),
            idle_hold_time,
            established_at: None,
            instance,
            session_msgp,
            status,
        }
    }

    // Session main loop.
    pub(crate) async fn run(
        mut self,
        mut session_msgc: UnboundedReceiver<SessionMsg>,
    ) {
        if self.config.enabled {
            self.fsm_event(fsm::Event::Start).await;
        }
        self.publish();

        while let Some(msg) = session_msgc.recv().await {
            let mut responder = None;
            let flow = match msg {
                SessionMsg::Admin(msg) => {
                    responder = msg.responder;
                    self.admin_process(msg.cmd).await
                }
                msg => {
                    self.process_msg(msg).await;
                    ControlFlow::Continue(())
                }
            };
            self.publish();
            if let Some(responder) = responder {
                let _ = responder.send(());
            }
            if flow.is_break() {
                break;
            }
        }

        Debug::SessionDelete(&self.remote_addr).log();
    }

    async fn process_msg(&mut self, msg: SessionMsg) {
        // Discard anything originated by a previous connection.
        if let Some(generation) = msg.generation()
            && generation != self.generation
        {
            Debug::StaleMsg(&self.remote_addr, generation).log();
            return;
        }

        match msg {
            SessionMsg::Connect(msg) => match msg.result {
                Ok(conn) => {
                    self.fsm_event(fsm::Event::Connected(conn)).await;
                }
                Err(error) => {
                    Error::IoError(error).log();
                    self.fsm_event(fsm::Event::ConnFail).await;
                }
            },
            SessionMsg::Accept(conn) => {
                // Connections are accepted only while waiting for one.
                if matches!(self.state, fsm::State::Connect | fsm::State::Active)
                {
                    self.fsm_event(fsm::Event::Connected(conn)).await;
                }
            }
            SessionMsg::Rx(msg) => {
                self.rx_process(msg.msg).await;
            }
            SessionMsg::Timer(msg) => {
                self.fsm_event(fsm::Event::Timer(msg.timer)).await;
            }
            SessionMsg::Export(msg) => match msg.update {
                ExportUpdate::Ipv4Unicast(update) => {
                    self.export_send::<Ipv4Unicast>(update);
                }
                ExportUpdate::Ipv6Unicast(update) => {
                    self.export_send::<Ipv6Unicast>(update);
                }
            },
            SessionMsg::Admin(..) => {}
        }
    }

    async fn admin_process(&mut self, cmd: AdminCmd) -> ControlFlow<()> {
        match cmd {
            AdminCmd::Enable => {
                if !self.config.enabled {
                    self.config.enabled = true;
                    self.idle_hold_time = self.config.timers.idle_hold_time;
                    self.fsm_event(fsm::Event::Start).await;
                }
            }
            AdminCmd::Disable => {
                self.config.enabled = false;
                self.tasks.idle_hold = None;
                let msg = NotificationMsg::new(
                    ErrorCode::Cease,
                    CeaseSubcode::AdministrativeShutdown,
                );
                self.fsm_event(fsm::Event::Stop(Some(msg))).await;
            }
            AdminCmd::Clear => {
                let msg = NotificationMsg::new(
                    ErrorCode::Cease,
                    CeaseSubcode::AdministrativeReset,
                );
                self.fsm_event(fsm::Event::Stop(Some(msg))).await;
            }
            AdminCmd::Shutdown => {
                self.config.enabled = false;
                self.tasks.idle_hold = None;
                let msg = NotificationMsg::new(
                    ErrorCode::Cease,
                    CeaseSubcode::PeerDeConfigured,
                );
                self.fsm_event(fsm::Event::Stop(Some(msg))).await;
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    async fn rx_process(&mut self, msg: Result<Message, SessionRxError>) {
        match msg {
            Ok(msg) => {
                Debug::MsgRx(&self.remote_addr, &msg).log();
                self.statistics.msgs_rcvd.update(&msg);

                match msg {
                    Message::Open(msg) => {
                        self.fsm_event(fsm::Event::RcvdOpen(msg)).await;
                    }
                    Message::Update(msg) => {
                        self.fsm_event(fsm::Event::RcvdUpdate).await;
                        if self.state == fsm::State::Established {
                            self.update_process(&msg);
                        }
                    }
                    Message::Notification(msg) => {
                        self.fsm_event(fsm::Event::RcvdNotif(msg)).await;
                    }
                    Message::Keepalive => {
                        self.fsm_event(fsm::Event::RcvdKalive).await;
                    }
                }
            }
            Err(error) => {
                let event = match &error {
                    SessionRxError::ConnClosed => fsm::Event::ConnFail,
                    SessionRxError::MsgDecodeError(msg) => {
                        fsm::Event::RcvdError(Some(msg.clone()))
                    }
                };
                Error::SessionRxError(self.remote_addr, error).log();
                self.fsm_event(event).await;
            }
        }
    }

    // Injects an event into the session's FSM.
    pub(crate) async fn fsm_event(&mut self, event: fsm::Event) {
        Debug::FsmEvent(&self.remote_addr, &event).log();

        let next_state = match (self.state, event) {
            // Idle state
            (
                fsm::State::Idle,
                fsm::Event::Start | fsm::Event::Timer(fsm::Timer::IdleHold),
            ) => {
                if self.config.passive {
                    Some(fsm::State::Active)
                } else {
                    self.connect_start();
                    Some(fsm::State::Connect)
                }
            }
            (fsm::State::Idle, _) => None,
            // Connect and Active states
            (
                fsm::State::Connect | fsm::State::Active,
                fsm::Event::Connected(conn),
            ) => {
                self.connection_setup(conn);
                self.open_send();
                self.holdtime_start(LARGE_HOLDTIME);
                Some(fsm::State::OpenSent)
            }
            (fsm::State::Connect, fsm::Event::Timer(fsm::Timer::ConnectRetry)) => {
                self.connect_start();
                None
            }
            (
                fsm::State::Connect | fsm::State::Active,
                fsm::Event::Stop(_) | fsm::Event::ConnFail,
            ) => {
                self.session_close(None).await;
                Some(fsm::State::Idle)
            }
            (fsm::State::Connect | fsm::State::Active, _) => None,
            // OpenSent state
            (fsm::State::OpenSent, fsm::Event::RcvdOpen(msg)) => {
                match self.open_process(msg) {
                    Ok(()) => Some(fsm::State::OpenConfirm),
                    Err(error) => {
                        let msg = NotificationMsg::from(&error);
                        Error::NegotiationError(self.remote_addr, error).log();
                        self.session_close(Some(msg)).await;
                        Some(fsm::State::Idle)
                    }
                }
            }
            // OpenConfirm state
            (fsm::State::OpenConfirm, fsm::Event::RcvdKalive) => {
                self.holdtime_restart();
                Some(fsm::State::Established)
            }
            // Established state
            (
                fsm::State::Established,
                fsm::Event::RcvdKalive | fsm::Event::RcvdUpdate,
            ) => {
                self.holdtime_restart();
                None
            }
            // Events common to all states with a connection
            (_, fsm::Event::Stop(msg)) => {
                self.session_close(msg).await;
                Some(fsm::State::Idle)
            }
            (_, fsm::Event::ConnFail) => {
                self.session_close(None).await;
                Some(fsm::State::Idle)
            }
            (_, fsm::Event::RcvdError(msg)) => {
                self.session_close(msg).await;
                Some(fsm::State::Idle)
            }
            (_, fsm::Event::RcvdNotif(msg)) => {
                self.notification_rcvd = Some((Utc::now(), msg));
                self.session_close(None).await;
                Some(fsm::State::Idle)
            }
            (_, fsm::Event::Timer(fsm::Timer::Hold)) => {
                let msg = NotificationMsg::new(ErrorCode::HoldTimerExpired, 0);
                self.session_close(Some(msg)).await;
                Some(fsm::State::Idle)
            }
            (
                state,
                fsm::Event::RcvdOpen(_)
                | fsm::Event::RcvdKalive
                | fsm::Event::RcvdUpdate,
            ) => {
                let error_subcode = match state {
                    fsm::State::OpenSent => {
                        FsmErrorSubcode::UnexpectedMessageInOpenSent
                    }
                    fsm::State::OpenConfirm => {
                        FsmErrorSubcode::UnexpectedMessageInOpenConfirm
                    }
                    fsm::State::Established => {
                        FsmErrorSubcode::UnexpectedMessageInEstablished
                    }
                    _ => FsmErrorSubcode::UnspecifiedError,
                };
                let msg = NotificationMsg::new(
                    ErrorCode::FiniteStateMachineError,
                    error_subcode,
                );
                self.session_close(Some(msg)).await;
                Some(fsm::State::Idle)
            }
            _ => None,
        };

        if let Some(next_state) = next_state
            && next_state != self.state
        {
            self.fsm_state_change(next_state);
        }
    }

    // Updates the session's FSM state.
    fn fsm_state_change(&mut self, next_state: fsm::State) {
        Debug::FsmTransition(&self.remote_addr, &self.state, &next_state).log();

        // A session that stayed up long enough resets the restart backoff.
        if self.state == fsm::State::Established
            && let Some(established_at) = self.established_at.take()
            && established_at.elapsed()
                >= Duration::from_secs(
                    self.config.timers.idle_hold_time_max.into(),
                )
        {
            self.idle_hold_time = self.config.timers.idle_hold_time;
        }

        self.state = next_state;
        match next_state {
            fsm::State::Established => {
                self.statistics.established_transitions += 1;
                self.last_established = Some(Utc::now());
                self.established_at = Some(Instant::now());
                self.session_init();
            }
            fsm::State::Idle if self.config.enabled => {
                self.idle_hold_start();
            }
            _ => {}
        }
    }

    // Starts the per address-family state of a newly established session.
    fn session_init(&mut self) {
        for (afi, safi) in self.afs_nego.clone() {
            Debug::AfStart(&self.remote_addr, afi, safi).log();
            match afi {
                Afi::Ipv4 => self.af_init::<Ipv4Unicast>(),
                Afi::Ipv6 => self.af_init::<Ipv6Unicast>(),
            }
        }
    }

    fn af_init<A>(&mut self)
    where
        A: BgpAddressFamily,
    {
        let Some(conn) = &self.conn else {
            return;
        };
        let policy = ExportPolicy {
            source: self.source,
            peer_type: self.peer_type,
            peer_as: self.config.peer_as,
            local_as: self.instance.asn,
            local_addr: conn.local_addr,
        };
        let af = FsmAddressFamily::<A>::new(
            self.remote_addr,
            &self.instance.rib,
            policy,
            self.generation,
            &self.session_msgp,
        );
        *A::fsm_af(&mut self.afs) = Some(af);
    }

    // Tears the session down.
    //
    // Child tasks are cancelled and joined before the routes learned from
    // the peer are removed, so no message from the old connection can reach
    // the routing tables afterwards.
    async fn session_close(&mut self, send_notif: Option<NotificationMsg>) {
        if let Some(msg) = send_notif
            && self.conn.is_some()
        {
            self.message_send(Message::Notification(msg));
        }

        std::mem::take(&mut self.tasks).cancel().await;
        self.conn = None;
        self.generation += 1;

        if let Some(af) = self.afs.ipv4_unicast.take() {
            Debug::AfStop(&self.remote_addr, Afi::Ipv4, Safi::Unicast).log();
            af.stop(&self.instance.rib, self.source).await;
        }
        if let Some(af) = self.afs.ipv6_unicast.take() {
            Debug::AfStop(&self.remote_addr, Afi::Ipv6, Safi::Unicast).log();
            af.stop(&self.instance.rib, self.source).await;
        }

        self.identifier = None;
        self.holdtime_nego = None;
        self.afs_nego.clear();
    }

    fn connection_setup(&mut self, conn: Connection) {
        self.generation += 1;
        self.tasks.connect = None;
        self.tasks.connect_retry = None;

        let rx = tasks::session_rx(
            self.remote_addr,
            self.generation,
            conn.msg_rx,
            &self.session_msgp,
        );
        self.tasks.rx = Some(rx);
        self.conn = Some(SessionConn {
            local_addr: conn.local_addr,
            msg_tx: conn.msg_tx,
        });
    }

    pub(crate) fn message_send(&mut self, msg: Message) {
        Debug::MsgTx(&self.remote_addr, &msg).log();
        self.statistics.msgs_sent.update(&msg);
        if let Message::Notification(msg) = &msg {
            self.notification_sent = Some((Utc::now(), msg.clone()));
        }

        if let Some(conn) = &self.conn
            && conn.msg_tx.send(msg).is_err()
        {
            IoError::SendError(self.remote_addr).log();
        }
    }

    fn open_send(&mut self) {
        let my_as = u16::try_from(self.instance.asn).unwrap_or(AS_TRANS);
        let capabilities = self
            .config
            .afi_safi
            .enabled()
            .into_iter()
            .map(|(afi, safi)| Capability::MultiProtocol { afi, safi })
            .chain([
                Capability::FourOctetAsNumber {
                    asn: self.instance.asn,
                },
                Capability::RouteRefresh,
            ])
            .collect();

        let msg = Message::Open(OpenMsg {
            version: BGP_VERSION,
            my_as,
            holdtime: self.config.timers.holdtime,
            identifier: self.instance.router_id,
            capabilities,
        });
        self.message_send(msg);
    }

    fn open_process(&mut self, msg: OpenMsg) -> Result<(), NegotiationError> {
        let afs = self.open_validate(&msg)?;

        self.identifier = Some(msg.identifier);
        self.afs_nego = afs;

        // Calculate negotiated hold-time.
        let holdtime = std::cmp::min(msg.holdtime, self.config.timers.holdtime);
        self.holdtime_nego = Some(holdtime);
        self.holdtime_start(holdtime);

        // Keepalives are sent only if the hold timer is running.
        if holdtime != 0 {
            let interval = self.config.timers.keepalive.unwrap_or(holdtime / 3);
            self.keepalive_start(interval);
        }

        self.message_send(Message::Keepalive);
        Ok(())
    }

    // Validates a received OPEN, returning the negotiated address families.
    fn open_validate(
        &self,
        msg: &OpenMsg,
    ) -> Result<BTreeSet<(Afi, Safi)>, NegotiationError> {
        if msg.version != BGP_VERSION {
            return Err(NegotiationError::BadVersion(msg.version));
        }

        let received = msg.real_as();
        if received != self.config.peer_as {
            return Err(NegotiationError::BadPeerAs {
                received,
                expected: self.config.peer_as,
            });
        }

        if msg.identifier.is_unspecified()
            || msg.identifier == self.instance.router_id
        {
            return Err(NegotiationError::BadIdentifier(msg.identifier));
        }

        // RFC 4271 - Section 6.2: an implementation MUST reject hold time
        // values of one or two seconds.
        if msg.holdtime == 1 || msg.holdtime == 2 {
            return Err(NegotiationError::HoldTimeUnacceptable(msg.holdtime));
        }

        // A peer that doesn't support multiprotocol extensions only speaks
        // IPv4 unicast.
        let mut remote_afs = msg.address_families();
        if remote_afs.is_empty() {
            remote_afs.insert((Afi::Ipv4, Safi::Unicast));
        }
        let afs: BTreeSet<_> = self
            .config
            .afi_safi
            .enabled()
            .intersection(&remote_afs)
            .copied()
            .collect();
        if afs.is_empty() {
            return Err(NegotiationError::NoCommonAddressFamily);
        }

        Ok(afs)
    }

    // Applies a received UPDATE to the Adj-RIB-In tables.
    fn update_process(&mut self, msg: &UpdateMsg) {
        self.update_apply::<Ipv4Unicast>(msg);
        self.update_apply::<Ipv6Unicast>(msg);
    }

    fn update_apply<A>(&mut self, msg: &UpdateMsg)
    where
        A: BgpAddressFamily,
    {
        let reach = msg
            .reach
            .iter()
            .filter_map(|(prefix, attrs)| {
                <A::IpNetwork as IpNetworkKind<A::IpAddr>>::get(*prefix)
                    .map(|prefix| (prefix, attrs))
            })
            .collect::<Vec<_>>();
        let unreach = msg
            .unreach
            .iter()
            .filter_map(|prefix| {
                <A::IpNetwork as IpNetworkKind<A::IpAddr>>::get(*prefix)
            })
            .collect::<Vec<_>>();
        if reach.is_empty() && unreach.is_empty() {
            return;
        }

        let source = self.source;
        let local_as = self.instance.asn;
        let attr_store = self.instance.rib.attr_store.clone();

        // Ignore address families that weren't negotiated.
        let Some(af) = A::fsm_af(&mut self.afs) else {
            return;
        };
        af.updates_received += 1;

        for prefix in unreach {
            af.adj_rib_in.remove_path(prefix, source);
        }
        for (prefix, attrs) in reach {
            let as_loop = attrs.as_path.contains(local_as);
            let attrs = attr_store.get(attrs.clone());
            let path = if as_loop {
                Path::ineligible(source, attrs, IneligibleReason::AsLoop)
            } else {
                Path::new(source, attrs)
            };
            af.adj_rib_in.add_path(prefix, path);
        }
    }

    // Advertises an Adj-RIB-Out change to the peer.
    fn export_send<A>(&mut self, update: RouteUpdate<A>)
    where
        A: BgpAddressFamily,
    {
        if self.state != fsm::State::Established {
            return;
        }

        let prefix: IpNetwork = update.prefix().into();
        let msg = match update.current() {
            Some(path) => UpdateMsg {
                reach: vec![(prefix, path.attrs.value.clone())],
                unreach: vec![],
            },
            None => UpdateMsg {
                reach: vec![],
                unreach: vec![prefix],
            },
        };
        if let Some(af) = A::fsm_af(&mut self.afs) {
            af.updates_sent += 1;
        }
        self.message_send(Message::Update(msg));
    }

    fn connect_start(&mut self) {
        self.generation += 1;
        let task = tasks::connect(
            self.remote_addr,
            self.generation,
            &self.instance.connector,
            &self.session_msgp,
        );
        self.tasks.connect = Some(task);
        self.connect_retry_start();
    }

    fn connect_retry_start(&mut self) {
        let task = tasks::session_timer(
            fsm::Timer::ConnectRetry,
            self.config.timers.connect_retry_interval,
            self.generation,
            &self.session_msgp,
        );
        self.tasks.connect_retry = Some(task);
    }

    fn holdtime_start(&mut self, seconds: u16) {
        self.tasks.holdtime = (seconds != 0).then(|| {
            tasks::session_timer(
                fsm::Timer::Hold,
                seconds,
                self.generation,
                &self.session_msgp,
            )
        });
    }

    fn holdtime_restart(&mut self) {
        if let Some(holdtime_task) = self.tasks.holdtime.as_mut() {
            holdtime_task.reset(None);
        }
    }

    fn keepalive_start(&mut self, interval: u16) {
        let Some(conn) = &self.conn else {
            return;
        };
        self.tasks.keepalive = (interval != 0).then(|| {
            tasks::keepalive_interval(
                self.remote_addr,
                interval,
                &conn.msg_tx,
                &self.statistics.msgs_sent.total,
            )
        });
    }

    // Schedules an automatic restart, doubling the delay for the next one.
    fn idle_hold_start(&mut self) {
        let seconds = self.idle_hold_time;
        Debug::IdleHoldStart(
            &self.remote_addr,
            Duration::from_secs(seconds.into()),
        )
        .log();
        let task = tasks::session_timer(
            fsm::Timer::IdleHold,
            seconds,
            self.generation,
            &self.session_msgp,
        );
        self.tasks.idle_hold = Some(task);
        self.idle_hold_time = std::cmp::min(
            seconds.saturating_mul(2),
            self.config.timers.idle_hold_time_max,
        );
    }

    // Refreshes the published view of this session.
    fn publish(&self) {
        let mut afs = vec![];
        if let Some(af) = &self.afs.ipv4_unicast {
            afs.push(af.status());
        }
        if let Some(af) = &self.afs.ipv6_unicast {
            afs.push(af.status());
        }

        let mut status = self.status.lock().unwrap();
        *status = SessionStatus {
            state: self.state,
            peer_type: self.peer_type,
            enabled: self.config.enabled,
            local_addr: self.conn.as_ref().map(|conn| conn.local_addr),
            identifier: self.identifier,
            holdtime_nego: self.holdtime_nego,
            afs_nego: self.afs_nego.clone(),
            statistics: self.statistics.clone(),
            notification_sent: self.notification_sent.clone(),
            notification_rcvd: self.notification_rcvd.clone(),
            last_established: self.last_established,
            afs,
        };
    }
}

// ===== impl PeerType =====

impl PeerType {
    pub fn new(local_as: u32, peer_as: u32) -> PeerType {
        if local_as == peer_as {
            PeerType::Internal
        } else {
            PeerType::External
        }
    }
}

// ===== impl SessionTasks =====

impl SessionTasks {
    // Stops every child task, waiting until none of them can run anymore.
    async fn cancel(self) {
        if let Some(task) = self.connect {
            task.cancel().await;
        }
        if let Some(task) = self.rx {
            task.cancel().await;
        }
        for task in [self.connect_retry, self.holdtime, self.idle_hold]
            .into_iter()
            .flatten()
        {
            task.cancel().await;
        }
        if let Some(task) = self.keepalive {
            task.cancel().await;
        }
    }
}

// ===== impl MessageStatistics =====

impl MessageStatistics {
    pub(crate) fn update(&mut self, msg: &Message) {
        self.total.fetch_add(1, atomic::Ordering::Relaxed);
        match msg {
            Message::Update(_) => {
                self.updates += 1;
            }
            Message::Notification(_) => {
                self.notifications += 1;
            }
            _ => {}
        }
    }

    pub fn total(&self) -> u64 {
        self.total.load(atomic::Ordering::Relaxed)
    }
}

// ===== impl SessionStatus =====

impl SessionStatus {
    pub(crate) fn new(config: &NeighborCfg, local_as: u32) -> SessionStatus {
        SessionStatus {
            state: fsm::State::Idle,
            peer_type: PeerType::new(local_as, config.peer_as),
            enabled: config.enabled,
            local_addr: None,
            identifier: None,
            holdtime_nego: None,
            afs_nego: Default::default(),
            statistics: Default::default(),
            notification_sent: None,
            notification_rcvd: None,
            last_established: None,
            afs: vec![],
        }
    }
}

// ===== impl FsmAddressFamily =====

impl<A> FsmAddressFamily<A>
where
    A: BgpAddressFamily,
{
    fn status(&self) -> AfStatus {
        AfStatus {
            afi: A::AFI,
            safi: A::SAFI,
            updates_received: self.updates_received,
            updates_sent: self.updates_sent,
            adj_rib_in: self.adj_rib_in.clone(),
            adj_rib_out: self.adj_rib_out.clone(),
        }
    }
}
