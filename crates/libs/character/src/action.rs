//! Dispatching one command and waiting for the server to confirm it.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::correlate::{Correlator, Verdict};
use crate::error::ActionError;
use crate::protocol::OutboundCommand;
use crate::router::{EventRouter, Subscription};

/// The sending half of the outbound command channel.
pub type CommandSender = mpsc::UnboundedSender<OutboundCommand>;

/// Confirmation deadlines per kind of action.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ActionTimeouts {
    /// Fishing and mining, which channel for several seconds.
    #[serde(with = "millis")]
    pub gathering: Duration,
    /// Listings, inventory swaps, unequips and giveaways.
    #[serde(with = "millis")]
    pub confirmation: Duration,
    /// Instant skills such as mluck.
    #[serde(with = "millis")]
    pub skill: Duration,
}

impl Default for ActionTimeouts {
    fn default() -> Self {
        Self {
            gathering: Duration::from_millis(20_000),
            confirmation: Duration::from_millis(1_000),
            skill: Duration::from_millis(1_000),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Observers are registered; nothing has been sent yet.
    Dispatched,
    /// The command is out and we are waiting on the correlator or the deadline.
    AwaitingConfirmation,
    Resolved,
}

/// An in-flight action: its observers, its correlator and its deadline.
pub struct PendingAction<C> {
    action: &'static str,
    state: ActionState,
    subscription: Subscription,
    correlator: Correlator<C>,
    timeout: Duration,
}

impl<C> PendingAction<C> {
    /// Registers the correlator's observers. This must happen before the
    /// command goes out so a fast reply can't be missed.
    pub fn register(
        router: &EventRouter,
        action: &'static str,
        correlator: Correlator<C>,
        timeout: Duration,
    ) -> Self {
        let subscription = router.subscribe(&correlator.kinds());
        Self {
            action,
            state: ActionState::Dispatched,
            subscription,
            correlator,
            timeout,
        }
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    /// Emits the command. On failure the action is resolved on the spot.
    pub fn dispatch(
        &mut self,
        outbound: &CommandSender,
        command: OutboundCommand,
    ) -> Result<(), ActionError> {
        debug!("[{}] emitting '{}'", self.action, command.event_name());
        if outbound.send(command).is_err() {
            self.resolve();
            return Err(ActionError::ChannelClosed);
        }
        self.state = ActionState::AwaitingConfirmation;
        Ok(())
    }

    /// Waits until the correlator reaches a verdict or the deadline passes,
    /// whichever comes first. Every path goes through the same deregistration.
    pub async fn settle(mut self) -> Result<(), ActionError> {
        let action = self.action;
        let timeout = self.timeout;

        let waited = tokio::time::timeout(timeout, async {
            while let Some(event) = self.subscription.recv().await {
                if let Some(verdict) = self.correlator.observe(&event) {
                    return Some(verdict);
                }
            }
            None
        })
        .await;

        self.resolve();

        match waited {
            Ok(Some(Verdict::Confirmed)) => {
                info!("[{}] confirmed", action);
                Ok(())
            }
            Ok(Some(Verdict::Rejected(reason))) => {
                warn!("[{}] rejected: {}", action, reason);
                Err(ActionError::Rejected(reason))
            }
            Ok(None) => Err(ActionError::ChannelClosed),
            Err(_) => {
                warn!("[{}] timed out after {}ms", action, timeout.as_millis());
                Err(ActionError::Timeout { action, timeout })
            }
        }
    }

    fn resolve(&mut self) {
        if self.state == ActionState::Resolved {
            return;
        }
        self.subscription.close();
        self.state = ActionState::Resolved;
    }
}

/// Register, emit, and await confirmation of a single command.
pub async fn confirm<C>(
    router: &EventRouter,
    outbound: &CommandSender,
    action: &'static str,
    command: OutboundCommand,
    correlator: Correlator<C>,
    timeout: Duration,
) -> Result<(), ActionError> {
    let mut pending = PendingAction::register(router, action, correlator, timeout);
    pending.dispatch(outbound, command)?;
    pending.settle().await
}
