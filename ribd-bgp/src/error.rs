//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};
use tracing::{error, warn, warn_span};

use crate::packet::{
    BGP_VERSION, ErrorCode, NotificationMsg, OpenMessageErrorSubcode,
};

// BGP errors.
#[derive(Debug)]
pub enum Error {
    // I/O errors
    IoError(IoError),
    // Network input
    SessionRxError(IpAddr, SessionRxError),
    // Message processing
    NegotiationError(IpAddr, NegotiationError),
    // Configuration
    PeerExists(IpAddr),
    PeerNotFound(IpAddr),
    ConfigError(toml::de::Error),
    TimersCfgError(IpAddr, TimersCfgError),
}

// BGP I/O errors.
#[derive(Debug)]
pub enum IoError {
    ConnectError(std::io::Error),
    SendError(IpAddr),
}

// Session Rx errors.
#[derive(Debug)]
#[derive(Deserialize, Serialize)]
pub enum SessionRxError {
    ConnClosed,
    // The decoder rejected a message; carries the NOTIFICATION to send back.
    MsgDecodeError(NotificationMsg),
}

// OPEN negotiation errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum NegotiationError {
    BadVersion(u8),
    BadPeerAs { received: u32, expected: u32 },
    BadIdentifier(Ipv4Addr),
    NoCommonAddressFamily,
    HoldTimeUnacceptable(u16),
}

// Timer configuration errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimersCfgError {
    HoldTimeInvalid(u16),
    ConnectRetryIntervalZero,
    IdleHoldTimeZero,
    IdleHoldTimeAboveMax { idle_hold_time: u16, idle_hold_time_max: u16 },
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::IoError(error) => {
                error.log();
            }
            Error::SessionRxError(addr, error) => {
                warn_span!("neighbor", %addr).in_scope(|| {
                    error.log();
                });
            }
            Error::NegotiationError(addr, error) => {
                warn_span!("neighbor", %addr).in_scope(|| {
                    warn!(reason = %error, "{}", self);
                });
            }
            Error::PeerExists(addr) | Error::PeerNotFound(addr) => {
                warn!(%addr, "{}", self);
            }
            Error::ConfigError(error) => {
                error!(error = %with_source(error), "{}", self);
            }
            Error::TimersCfgError(addr, error) => {
                warn!(%addr, reason = %error, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(error) => error.fmt(f),
            Error::SessionRxError(_, error) => error.fmt(f),
            Error::NegotiationError(..) => {
                write!(f, "session negotiation failed")
            }
            Error::PeerExists(..) => {
                write!(f, "neighbor already exists")
            }
            Error::PeerNotFound(..) => {
                write!(f, "neighbor not found")
            }
            Error::ConfigError(..) => {
                write!(f, "invalid configuration")
            }
            Error::TimersCfgError(..) => {
                write!(f, "invalid neighbor timers")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(error) => Some(error),
            Error::SessionRxError(_, error) => Some(error),
            Error::NegotiationError(_, error) => Some(error),
            Error::ConfigError(error) => Some(error),
            Error::TimersCfgError(_, error) => Some(error),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Error {
        Error::ConfigError(error)
    }
}

// ===== impl IoError =====

impl IoError {
    pub fn log(&self) {
        match self {
            IoError::ConnectError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            IoError::SendError(addr) => {
                warn!(%addr, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::ConnectError(..) => {
                write!(f, "failed to establish connection")
            }
            IoError::SendError(..) => {
                write!(f, "failed to send message")
            }
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::ConnectError(error) => Some(error),
            IoError::SendError(..) => None,
        }
    }
}

// ===== impl SessionRxError =====

impl SessionRxError {
    pub fn log(&self) {
        match self {
            SessionRxError::ConnClosed => {
                warn!("{}", self);
            }
            SessionRxError::MsgDecodeError(notif) => {
                warn!(%notif, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for SessionRxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRxError::ConnClosed => {
                write!(f, "connection closed by remote end")
            }
            SessionRxError::MsgDecodeError(..) => {
                write!(f, "failed to decode BGP message")
            }
        }
    }
}

impl std::error::Error for SessionRxError {}

// ===== impl NegotiationError =====

impl std::fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NegotiationError::BadVersion(version) => {
                write!(f, "unsupported version number {}", version)
            }
            NegotiationError::BadPeerAs { received, expected } => {
                write!(f, "bad peer AS {} (expected {})", received, expected)
            }
            NegotiationError::BadIdentifier(identifier) => {
                write!(f, "BGP identifier conflict ({})", identifier)
            }
            NegotiationError::NoCommonAddressFamily => {
                write!(f, "no common address family")
            }
            NegotiationError::HoldTimeUnacceptable(holdtime) => {
                write!(f, "unacceptable hold time {}", holdtime)
            }
        }
    }
}

impl std::error::Error for NegotiationError {}

impl From<&NegotiationError> for NotificationMsg {
    fn from(error: &NegotiationError) -> NotificationMsg {
        let subcode = match error {
            NegotiationError::BadVersion(..) => {
                OpenMessageErrorSubcode::UnsupportedVersionNumber
            }
            NegotiationError::BadPeerAs { .. } => {
                OpenMessageErrorSubcode::BadPeerAs
            }
            NegotiationError::BadIdentifier(..) => {
                OpenMessageErrorSubcode::BadBgpIdentifier
            }
            NegotiationError::NoCommonAddressFamily => {
                OpenMessageErrorSubcode::UnsupportedCapability
            }
            NegotiationError::HoldTimeUnacceptable(..) => {
                OpenMessageErrorSubcode::UnacceptableHoldTime
            }
        };
        let msg = NotificationMsg::new(ErrorCode::OpenMessageError, subcode);

        // RFC 4271 - Section 6.2: the data field of an unsupported version
        // error carries the largest locally supported version.
        match error {
            NegotiationError::BadVersion(..) => {
                msg.with_data(u16::from(BGP_VERSION).to_be_bytes())
            }
            _ => msg,
        }
    }
}

// ===== impl TimersCfgError =====

impl std::fmt::Display for TimersCfgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimersCfgError::HoldTimeInvalid(holdtime) => {
                write!(f, "hold time {} is below 3 seconds", holdtime)
            }
            TimersCfgError::ConnectRetryIntervalZero => {
                write!(f, "connect retry interval must be nonzero")
            }
            TimersCfgError::IdleHoldTimeZero => {
                write!(f, "idle hold time must be nonzero")
            }
            TimersCfgError::IdleHoldTimeAboveMax {
                idle_hold_time,
                idle_hold_time_max,
            } => {
                write!(
                    f,
                    "idle hold time {} exceeds its maximum {}",
                    idle_hold_time, idle_hold_time_max
                )
            }
        }
    }
}

impl std::error::Error for TimersCfgError {}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
