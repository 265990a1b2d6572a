//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{error, warn, warn_span};

use crate::packet::{Snpa, SystemId};

// IS-IS errors.
#[derive(Debug)]
pub enum Error {
    // I/O errors
    IoError(IoError),
    // Packet input
    AdjacencyReject(String, SystemId, AdjacencyRejectError),
    // Device management
    DeviceNotFound(String),
    DeviceExists(String),
    DeviceStartError(String, Box<Error>),
    DeviceStopError(String, Box<Error>),
    InstanceStopped,
    // Configuration
    InvalidSystemId(String),
    ConfigError(toml::de::Error),
}

// IS-IS I/O errors.
#[derive(Debug)]
pub enum IoError {
    SocketError(std::io::Error),
    SocketCloseError(std::io::Error),
    MulticastJoinError(Snpa, std::io::Error),
    RecvError(std::io::Error),
    SendError(std::io::Error),
}

#[derive(Debug)]
pub enum AdjacencyRejectError {
    DuplicateSystemId,
    WrongSystem,
    LevelNotConfigured,
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::IoError(error) => {
                error.log();
            }
            Error::AdjacencyReject(name, source, error) => {
                warn_span!("device", %name, %source).in_scope(|| {
                    error.log();
                })
            }
            Error::DeviceNotFound(name) | Error::DeviceExists(name) => {
                warn!(%name, "{}", self);
            }
            Error::DeviceStartError(name, error)
            | Error::DeviceStopError(name, error) => {
                error!(%name, error = %with_source(error), "{}", self);
            }
            Error::InstanceStopped => {
                warn!("{}", self);
            }
            Error::InvalidSystemId(system_id) => {
                warn!(%system_id, "{}", self);
            }
            Error::ConfigError(error) => {
                error!(error = %with_source(error), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(error) => error.fmt(f),
            Error::AdjacencyReject(_, _, error) => error.fmt(f),
            Error::DeviceNotFound(..) => {
                write!(f, "device not found")
            }
            Error::DeviceExists(..) => {
                write!(f, "device already exists")
            }
            Error::DeviceStartError(..) => {
                write!(f, "failed to start device")
            }
            Error::DeviceStopError(..) => {
                write!(f, "failed to stop device")
            }
            Error::InstanceStopped => {
                write!(f, "instance is not running")
            }
            Error::InvalidSystemId(..) => {
                write!(f, "invalid System-ID")
            }
            Error::ConfigError(..) => {
                write!(f, "invalid configuration")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(error) => Some(error),
            Error::DeviceStartError(_, error)
            | Error::DeviceStopError(_, error) => Some(error),
            Error::ConfigError(error) => Some(error),
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
    pub(crate) fn log(&self) {
        match self {
            IoError::SocketError(error)
            | IoError::SocketCloseError(error)
            | IoError::RecvError(error)
            | IoError::SendError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            IoError::MulticastJoinError(addr, error) => {
                warn!(?addr, error = %with_source(error), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::SocketError(..) => {
                write!(f, "failed to open packet socket")
            }
            IoError::SocketCloseError(..) => {
                write!(f, "failed to close packet socket")
            }
            IoError::MulticastJoinError(..) => {
                write!(f, "failed to join multicast group")
            }
            IoError::RecvError(..) => {
                write!(f, "failed to receive packet")
            }
            IoError::SendError(..) => {
                write!(f, "failed to send packet")
            }
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::SocketError(error)
            | IoError::SocketCloseError(error)
            | IoError::MulticastJoinError(_, error)
            | IoError::RecvError(error)
            | IoError::SendError(error) => Some(error),
        }
    }
}

// ===== impl AdjacencyRejectError =====

impl AdjacencyRejectError {
    pub(crate) fn log(&self) {
        warn!("{}", self);
    }
}

impl std::fmt::Display for AdjacencyRejectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdjacencyRejectError::DuplicateSystemId => {
                write!(f, "duplicate System-ID")
            }
            AdjacencyRejectError::WrongSystem => {
                write!(f, "wrong system")
            }
            AdjacencyRejectError::LevelNotConfigured => {
                write!(f, "level not configured on device")
            }
        }
    }
}

impl std::error::Error for AdjacencyRejectError {}

// ===== helper functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
