//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use async_trait::async_trait;
use ribd_utils::{UnboundedReceiver, UnboundedSender};

use crate::error::{IoError, SessionRxError};
use crate::packet::Message;

// Establishes outgoing transport connections.
//
// The transport owns sockets and message framing. The session only ever
// exchanges decoded messages with it.
#[async_trait]
pub trait Connector: std::fmt::Debug + Send + Sync {
    async fn connect(&self, remote_addr: IpAddr) -> Result<Connection, IoError>;
}

// An established transport connection.
//
// Dropping `msg_tx` closes the connection once pending messages are flushed.
// `msg_rx` yields `None` or `SessionRxError::ConnClosed` when the remote end
// goes away.
#[derive(Debug)]
pub struct Connection {
    pub local_addr: IpAddr,
    pub remote_addr: IpAddr,
    pub msg_tx: UnboundedSender<Message>,
    pub msg_rx: UnboundedReceiver<Result<Message, SessionRxError>>,
}
