use std::time::Duration;
use thiserror::Error;

use crate::protocol::CharacterId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("We aren't ready yet [{0}].")]
    NotReady(&'static str),
    #[error("{0} is too far away.")]
    OutOfRange(CharacterId),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Rejected(String),
    #[error("{action} timeout ({}ms)", .timeout.as_millis())]
    Timeout {
        action: &'static str,
        timeout: Duration,
    },
    #[error("The outbound command channel was closed")]
    ChannelClosed,
}

impl ActionError {
    /// Raised before anything was sent to the server.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ActionError::NotReady(_) | ActionError::OutOfRange(_) | ActionError::Validation(_)
        )
    }

    /// The server never answered, as opposed to answering "no".
    pub fn is_timeout(&self) -> bool {
        matches!(self, ActionError::Timeout { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("'{0}' is not a trade slot")]
pub struct InvalidTradeSlot(pub String);
