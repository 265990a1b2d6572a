//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicU64};
use std::time::Duration;

use ribd_rib::RouteUpdate;
use ribd_utils::task::{IntervalTask, Task, TimeoutTask};
use ribd_utils::{UnboundedReceiver, UnboundedSender};
use tracing::{Instrument, debug_span};

use crate::af::BgpAddressFamily;
use crate::debug::Debug;
use crate::error::SessionRxError;
use crate::packet::Message;
use crate::session::fsm;
use crate::transport::Connector;

//
// BGP session tasks diagram:
//
//                   connect (0/1x) -> +--------------+
//                                     |              |
//                session_rx (0/1x) -> |              | -> (0/1x) keepalive_interval
//             session_timer (0/3x) -> |   session    |
//       export_forwarder (0/Nx AFs) -> |              |
//                                     |              |
//        peer manager (accept/admin) -> +--------------+
//

// BGP session inter-task message types.
pub mod messages {
    use ribd_utils::Responder;

    use super::*;
    use crate::af::ExportUpdate;
    use crate::error::IoError;
    use crate::transport::Connection;

    // Every message from a child task is stamped with the connection
    // generation that was current when the task was started.
    #[derive(Debug)]
    pub enum SessionMsg {
        Connect(ConnectMsg),
        Accept(Connection),
        Rx(RxMsg),
        Timer(TimerMsg),
        Export(ExportMsg),
        Admin(AdminMsg),
    }

    #[derive(Debug)]
    pub struct ConnectMsg {
        pub generation: u64,
        pub result: Result<Connection, IoError>,
    }

    #[derive(Debug)]
    pub struct RxMsg {
        pub generation: u64,
        pub msg: Result<Message, SessionRxError>,
    }

    #[derive(Debug)]
    pub struct TimerMsg {
        pub generation: u64,
        pub timer: fsm::Timer,
    }

    #[derive(Debug)]
    pub struct ExportMsg {
        pub generation: u64,
        pub update: ExportUpdate,
    }

    #[derive(Debug)]
    pub struct AdminMsg {
        pub cmd: AdminCmd,
        pub responder: Option<Responder<()>>,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum AdminCmd {
        Enable,
        Disable,
        Clear,
        Shutdown,
    }

    impl SessionMsg {
        // Connection generation of the message, if it belongs to one.
        pub fn generation(&self) -> Option<u64> {
            match self {
                SessionMsg::Connect(msg) => Some(msg.generation),
                SessionMsg::Rx(msg) => Some(msg.generation),
                SessionMsg::Timer(msg) => Some(msg.generation),
                SessionMsg::Export(msg) => Some(msg.generation),
                SessionMsg::Accept(..) | SessionMsg::Admin(..) => None,
            }
        }
    }
}

use messages::{ConnectMsg, ExportMsg, RxMsg, SessionMsg, TimerMsg};

// ===== BGP tasks =====

// Connection attempt task.
pub(crate) fn connect(
    remote_addr: IpAddr,
    generation: u64,
    connector: &Arc<dyn Connector>,
    session_msgp: &UnboundedSender<SessionMsg>,
) -> Task<()> {
    let span = debug_span!("neighbor", addr = %remote_addr);
    let _span_guard = span.enter();

    let connector = connector.clone();
    let session_msgp = session_msgp.clone();
    Task::spawn(
        async move {
            let result = connector.connect(remote_addr).await;
            let msg = SessionMsg::Connect(ConnectMsg { generation, result });
            let _ = session_msgp.send(msg);
        }
        .in_current_span(),
    )
}

// Session Rx task.
pub(crate) fn session_rx(
    remote_addr: IpAddr,
    generation: u64,
    mut msg_rx: UnboundedReceiver<Result<Message, SessionRxError>>,
    session_msgp: &UnboundedSender<SessionMsg>,
) -> Task<()> {
    let span1 = debug_span!("neighbor", addr = %remote_addr);
    let _span1_guard = span1.enter();
    let span2 = debug_span!("input");
    let _span2_guard = span2.enter();

    let session_msgp = session_msgp.clone();
    Task::spawn(
        async move {
            loop {
                let msg = msg_rx.recv().await;
                let closed = !matches!(msg, Some(Ok(_)));
                let msg = msg.unwrap_or(Err(SessionRxError::ConnClosed));
                let msg = SessionMsg::Rx(RxMsg { generation, msg });
                if session_msgp.send(msg).is_err() || closed {
                    return;
                }
            }
        }
        .in_current_span(),
    )
}

// Session timer task.
pub(crate) fn session_timer(
    timer: fsm::Timer,
    seconds: u16,
    generation: u64,
    session_msgp: &UnboundedSender<SessionMsg>,
) -> TimeoutTask {
    let session_msgp = session_msgp.clone();

    TimeoutTask::new(
        Duration::from_secs(seconds.into()),
        move || async move {
            let msg = SessionMsg::Timer(TimerMsg { generation, timer });
            let _ = session_msgp.send(msg);
        },
    )
}

// Send periodic keepalive messages.
pub(crate) fn keepalive_interval(
    remote_addr: IpAddr,
    interval: u16,
    msg_tx: &UnboundedSender<Message>,
    msg_counter: &Arc<AtomicU64>,
) -> IntervalTask {
    let msg_tx = msg_tx.clone();
    let msg_counter = msg_counter.clone();

    IntervalTask::new(
        Duration::from_secs(interval.into()),
        false,
        move || {
            let msg_tx = msg_tx.clone();
            let msg_counter = msg_counter.clone();

            async move {
                let msg = Message::Keepalive;
                Debug::MsgTx(&remote_addr, &msg).log();
                if msg_tx.send(msg).is_ok() {
                    msg_counter.fetch_add(1, atomic::Ordering::Relaxed);
                }
            }
        },
    )
}

// Relays Adj-RIB-Out changes to the session.
pub(crate) fn export_forwarder<A>(
    mut out_rx: UnboundedReceiver<RouteUpdate<A>>,
    generation: u64,
    session_msgp: &UnboundedSender<SessionMsg>,
) -> Task<()>
where
    A: BgpAddressFamily,
{
    let session_msgp = session_msgp.clone();
    Task::spawn(
        async move {
            while let Some(update) = out_rx.recv().await {
                let msg = SessionMsg::Export(ExportMsg {
                    generation,
                    update: A::export_update(update),
                });
                if session_msgp.send(msg).is_err() {
                    return;
                }
            }
        }
        .in_current_span(),
    )
}
