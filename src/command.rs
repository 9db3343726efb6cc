//! Lifecycle commands delivered to a service from outside.

use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::Error;

/// An external instruction to a running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceCommand {
    /// Begin collecting and serving.
    StartService,
    /// Stop background work.
    StopService,
    /// Transfer the current batch now.
    Send,
    /// Begin accepting inbound channels.
    Receive,
}

impl ServiceCommand {
    /// Action string for [`ServiceCommand::StartService`].
    pub const START_SERVICE: &'static str = "START_SERVICE";
    /// Action string for [`ServiceCommand::StopService`].
    pub const STOP_SERVICE: &'static str = "STOP_SERVICE";
    /// Action string for [`ServiceCommand::Send`].
    pub const SEND: &'static str = "SEND";
    /// Action string for [`ServiceCommand::Receive`].
    pub const RECEIVE: &'static str = "RECEIVE";

    /// The action string for this command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartService => Self::START_SERVICE,
            Self::StopService => Self::STOP_SERVICE,
            Self::Send => Self::SEND,
            Self::Receive => Self::RECEIVE,
        }
    }

    /// Parse an action string, ignoring unknown actions with a warning.
    pub fn parse(action: &str) -> Option<Self> {
        match action.parse() {
            Ok(command) => Some(command),
            Err(e) => {
                warn!("Ignoring command: {}", e);
                None
            }
        }
    }
}

impl FromStr for ServiceCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::START_SERVICE => Ok(Self::StartService),
            Self::STOP_SERVICE => Ok(Self::StopService),
            Self::SEND => Ok(Self::Send),
            Self::RECEIVE => Ok(Self::Receive),
            other => Err(Error::InvalidParameter {
                name: "command".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ServiceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
