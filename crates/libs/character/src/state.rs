//! Local mirror of the character and the world around it.
//!
//! The transport keeps this current from inbound events; actions only read it
//! to validate their preconditions before dispatch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::protocol::{CharacterData, CharacterId, InboundEvent, PlayerData};

/// How close another player has to be to interact with them.
pub const NPC_INTERACTION_DISTANCE: f64 = 400.0;
pub const NPC_INTERACTION_DISTANCE_SQUARED: f64 =
    NPC_INTERACTION_DISTANCE * NPC_INTERACTION_DISTANCE;
pub const MLUCK_RANGE: f64 = 320.0;

/// Anything with a position on a map.
pub trait Positioned {
    fn map(&self) -> &str;
    fn position(&self) -> (f64, f64);
}

impl Positioned for CharacterData {
    fn map(&self) -> &str {
        &self.map
    }

    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl Positioned for PlayerData {
    fn map(&self) -> &str {
        &self.map
    }

    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// Squared distance between two positions; infinite across maps.
pub fn squared_distance(a: &impl Positioned, b: &impl Positioned) -> f64 {
    if a.map() != b.map() {
        return f64::INFINITY;
    }
    let (ax, ay) = a.position();
    let (bx, by) = b.position();
    (ax - bx).powi(2) + (ay - by).powi(2)
}

#[derive(Debug, Clone, Default)]
pub struct GameState {
    /// Set once the server has sent our full character.
    pub ready: bool,
    /// Whether we were ever ready. Survives disconnects.
    pub started: bool,
    pub character: CharacterData,
    pub players: HashMap<CharacterId, PlayerData>,
}

impl GameState {
    pub fn new(id: &str) -> Self {
        Self {
            character: CharacterData {
                id: id.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Applies the events that carry our own character or the players around
    /// it. Returns whether anything changed.
    pub fn apply(&mut self, event: &InboundEvent) -> bool {
        match event {
            InboundEvent::Start(data) => {
                self.character = data.clone();
                self.ready = true;
                self.started = true;
                true
            }
            InboundEvent::Player(data) => {
                self.character = data.clone();
                true
            }
            InboundEvent::Entities(data) => {
                if data.is_full_update() {
                    self.players.clear();
                }
                for player in &data.players {
                    self.upsert_player(player.clone());
                }
                true
            }
            _ => false,
        }
    }

    pub fn upsert_player(&mut self, player: PlayerData) {
        self.players.insert(player.id.clone(), player);
    }

    pub fn mark_disconnected(&mut self) {
        self.ready = false;
    }
}

/// The shared handle the transport writes and the actions read.
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<RwLock<GameState>>);

impl SharedState {
    pub fn new(state: GameState) -> Self {
        Self(Arc::new(RwLock::new(state)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, GameState> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, GameState> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Static item data needed by the actions.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ItemDefinition {
    /// Stack limit. Absent for items that don't stack.
    #[serde(rename = "s", skip_serializing_if = "Option::is_none")]
    pub stack: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GameData {
    #[serde(default)]
    pub items: HashMap<String, ItemDefinition>,
}

impl GameData {
    pub fn stack_limit(&self, item: &str) -> Option<u32> {
        self.items.get(item).and_then(|definition| definition.stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EntitiesData;

    #[test]
    fn distance_is_infinite_across_maps() {
        let me = CharacterData {
            map: "main".into(),
            x: 0.0,
            y: 0.0,
            ..Default::default()
        };
        let mut other = PlayerData {
            map: "main".into(),
            x: 30.0,
            y: 40.0,
            ..Default::default()
        };
        assert_eq!(squared_distance(&me, &other), 2500.0);

        other.map = "desertland".into();
        assert!(squared_distance(&me, &other).is_infinite());
    }

    #[test]
    fn start_marks_ready_and_player_updates_do_not() {
        let mut state = GameState::new("merchant");
        let data = CharacterData {
            id: "merchant".into(),
            map: "main".into(),
            ..Default::default()
        };

        assert!(state.apply(&InboundEvent::Player(data.clone())));
        assert!(!state.ready);
        assert!(!state.started);

        assert!(state.apply(&InboundEvent::Start(data)));
        assert!(state.ready);
        assert_eq!(state.character.map, "main");

        state.mark_disconnected();
        assert!(!state.ready);
        assert!(state.started);
    }

    #[test]
    fn full_entity_updates_replace_the_players_we_knew() {
        let mut state = GameState::new("merchant");
        let player = |id: &str| PlayerData {
            id: id.into(),
            ..Default::default()
        };

        state.apply(&InboundEvent::Entities(EntitiesData {
            kind: "all".into(),
            players: vec![player("a"), player("b")],
        }));
        state.apply(&InboundEvent::Entities(EntitiesData {
            kind: "xy".into(),
            players: vec![player("c")],
        }));
        assert_eq!(state.players.len(), 3);

        state.apply(&InboundEvent::Entities(EntitiesData {
            kind: "all".into(),
            players: vec![player("c")],
        }));
        assert_eq!(state.players.len(), 1);
        assert!(state.players.contains_key("c"));
    }
}
