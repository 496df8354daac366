//! Setup-time and misuse errors.
//!
//! Configuration problems are fatal and surface before the runtime starts.
//! Probe timeouts are not errors at all; they become Unreachable transitions
//! (see [`crate::ping::ProbeOutcome`]).

use std::{fmt, io};

/// Fatal configuration error, raised during setup and never at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A rotation was built without any items.
    EmptyRotation,
    /// A target address is neither an IPv4 literal nor resolvable to one.
    UnresolvedAddress {
        /// Address as configured.
        address: String,
        /// Resolver diagnostic.
        reason: String,
    },
    /// A duration field that must be positive was zero.
    ZeroDuration(&'static str),
    /// A duration literal could not be parsed.
    InvalidDuration(String),
    /// Two components of the same kind share a name.
    DuplicateName(String),
    /// A target was registered after the aggregator was sealed.
    RegistrationClosed(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRotation => write!(f, "rotation has no items"),
            Self::UnresolvedAddress { address, reason } => {
                write!(f, "{} not resolved: {}", address, reason)
            }
            Self::ZeroDuration(field) => write!(f, "{} must be greater than 0", field),
            Self::InvalidDuration(value) => write!(f, "invalid duration: {:?}", value),
            Self::DuplicateName(name) => write!(f, "duplicate name: {}", name),
            Self::RegistrationClosed(name) => {
                write!(f, "cannot register {} after setup completed", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A `jump` was asked to land outside the ring.
///
/// Callers that want wrapping behaviour must reduce the index themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexError {
    /// Requested index.
    pub index: usize,
    /// Number of items in the ring.
    pub len: usize,
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "index {} out of range for rotation of {} items",
            self.index, self.len
        )
    }
}

impl std::error::Error for IndexError {}

/// A monitor configuration file could not be loaded.
#[derive(Debug)]
pub enum LoadError {
    /// The file could not be read.
    Io(io::Error),
    /// The file is not valid JSON for the expected schema.
    Json(serde_json::Error),
    /// The file parsed but describes an invalid setup.
    Invalid(ConfigError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read configuration: {}", e),
            Self::Json(e) => write!(f, "malformed configuration: {}", e),
            Self::Invalid(e) => write!(f, "invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Invalid(e) => Some(e),
        }
    }
}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<ConfigError> for LoadError {
    fn from(e: ConfigError) -> Self {
        Self::Invalid(e)
    }
}

/// A request to a running monitor failed.
#[derive(Debug)]
pub enum MonitorError {
    /// No target with this name belongs to the monitor.
    UnknownTarget(String),
    /// The monitor task has already exited.
    Stopped,
    /// The monitor task panicked or was aborted.
    Join(tokio::task::JoinError),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTarget(name) => write!(f, "unknown target: {}", name),
            Self::Stopped => write!(f, "monitor stopped"),
            Self::Join(e) => write!(f, "monitor task failed: {}", e),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Join(e) => Some(e),
            _ => None,
        }
    }
}
