//! Client library for driving a merchant character over the game's event channel.
//!
//! Each action emits one command, then waits for the inbound events that
//! confirm or refuse it (or for its deadline). The transport itself lives
//! outside this crate: it feeds [`InboundEvent`]s into [`Merchant::ingest`]
//! and forwards the [`OutboundCommand`]s it receives from [`Merchant::new`].

pub mod action;
pub mod correlate;
pub mod error;
pub mod filters;
pub mod merchant;
pub mod protocol;
pub mod router;
pub mod rules;
pub mod signals;
pub mod state;

pub use action::{ActionState, ActionTimeouts, PendingAction};
pub use correlate::{BusyTracker, Correlator, Rule, Verdict};
pub use error::ActionError;
pub use filters::{
    GetPlayerFilters, GetPlayersFilters, ItemPick, LocateItemFilters, LocateItemsFilters, PlayerPick,
};
pub use merchant::Merchant;
pub use protocol::{
    CharacterData, EventKind, InboundEvent, ItemData, OutboundCommand, PlayerData, Skill,
    SlotItem, TradeSlot,
};
pub use router::{EventRouter, Subscription};
pub use state::{GameData, GameState, ItemDefinition, SharedState};
