use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::InvalidTradeSlot;

/// Character and player ids are their in-game names.
pub type CharacterId = String;

// =================================================================================================
//                                         SLOTS & SKILLS
// =================================================================================================

/// A merchant stand slot (`trade1`, `trade2`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradeSlot(u8);

impl TradeSlot {
    pub const PREFIX: &'static str = "trade";

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u8 {
        self.0
    }

    pub fn name(&self) -> String {
        format!("{}{}", Self::PREFIX, self.0)
    }
}

impl fmt::Display for TradeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

impl FromStr for TradeSlot {
    type Err = InvalidTradeSlot;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(Self::PREFIX)
            .and_then(|index| index.parse::<u8>().ok())
            .map(TradeSlot)
            .ok_or_else(|| InvalidTradeSlot(s.to_string()))
    }
}

impl TryFrom<String> for TradeSlot {
    type Error = InvalidTradeSlot;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TradeSlot> for String {
    fn from(slot: TradeSlot) -> Self {
        slot.name()
    }
}

/// The skills this crate knows how to dispatch and confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Skill {
    #[serde(rename = "fishing")]
    Fishing,
    #[serde(rename = "mining")]
    Mining,
    #[serde(rename = "mluck")]
    MerchantLuck,
    #[serde(rename = "massproduction")]
    MassProduction,
    #[serde(rename = "mcourage")]
    MerchantCourage,
}

impl Skill {
    /// The name the server uses for this skill on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Skill::Fishing => "fishing",
            Skill::Mining => "mining",
            Skill::MerchantLuck => "mluck",
            Skill::MassProduction => "massproduction",
            Skill::MerchantCourage => "mcourage",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =================================================================================================
//                                          ENTITY DATA
// =================================================================================================

/// An item sitting in an inventory position.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ItemData {
    pub name: String,
    /// Stack quantity. Only stackable items carry one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    /// Special property (shiny, glitched, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    /// Lock kind, set on locked and sealed items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l: Option<String>,
    /// Set while the item carries a PvP mark.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat_type: Option<String>,
}

impl ItemData {
    pub fn quantity(&self) -> u32 {
        self.q.unwrap_or(1)
    }
}

/// The contents of an equipment or trade slot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SlotItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
    /// Set on buy orders (wishlist entries).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    /// Minutes left on a giveaway listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub giveaway: Option<u32>,
    /// Giveaway participants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list: Vec<CharacterId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
}

impl SlotItem {
    pub fn quantity(&self) -> u32 {
        self.q.unwrap_or(1)
    }

    pub fn price(&self) -> u64 {
        self.price.unwrap_or(0)
    }

    pub fn is_buy_order(&self) -> bool {
        self.b.unwrap_or(false)
    }

    pub fn is_giveaway(&self) -> bool {
        self.giveaway.is_some()
    }
}

/// A status effect (conditions such as `mluck`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct StatusInfo {
    /// The character that applied the effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f: Option<CharacterId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strong: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ms: Option<f64>,
}

/// Our own character as reported by `start` and `player` events.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CharacterData {
    pub id: CharacterId,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub ctype: String,
    #[serde(default)]
    pub map: String,
    #[serde(rename = "in", default)]
    pub instance: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    /// Channeled activities in progress, keyed by skill name.
    #[serde(default)]
    pub c: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub s: HashMap<String, StatusInfo>,
    #[serde(default)]
    pub items: Vec<Option<ItemData>>,
    /// Equipment and trade slots. A present key with a `null` value is an empty slot.
    #[serde(default)]
    pub slots: HashMap<String, Option<SlotItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    #[serde(default)]
    pub rip: bool,
}

impl CharacterData {
    /// The busy flag for a channeled skill.
    pub fn is_busy(&self, skill: Skill) -> bool {
        self.c.contains_key(skill.name())
    }

    pub fn item(&self, position: usize) -> Option<&ItemData> {
        self.items.get(position).and_then(Option::as_ref)
    }

    pub fn has_slot(&self, slot: TradeSlot) -> bool {
        self.slots.contains_key(&slot.name())
    }

    pub fn listing(&self, slot: TradeSlot) -> Option<&SlotItem> {
        self.slots.get(&slot.name()).and_then(Option::as_ref)
    }

    /// All trade slots in numeric order, with their listing if any.
    pub fn trade_slots(&self) -> Vec<(TradeSlot, Option<&SlotItem>)> {
        let mut slots: Vec<_> = self
            .slots
            .iter()
            .filter_map(|(name, contents)| {
                name.parse::<TradeSlot>()
                    .ok()
                    .map(|slot| (slot, contents.as_ref()))
            })
            .collect();
        slots.sort_by_key(|(slot, _)| *slot);
        slots
    }
}

/// Another player (or NPC player) from the player registry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PlayerData {
    pub id: CharacterId,
    #[serde(default)]
    pub owner: String,
    /// Set for NPC-controlled players.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npc: Option<String>,
    #[serde(default)]
    pub map: String,
    #[serde(rename = "in", default)]
    pub instance: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub ctype: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub hp: f64,
    #[serde(default)]
    pub rip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    /// Whoever this player is attacking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<CharacterId>,
    #[serde(default)]
    pub s: HashMap<String, StatusInfo>,
    #[serde(default)]
    pub slots: HashMap<String, Option<SlotItem>>,
}

impl PlayerData {
    pub fn listing(&self, slot: TradeSlot) -> Option<&SlotItem> {
        self.slots.get(&slot.name()).and_then(Option::as_ref)
    }
}

// =================================================================================================
//                                        INBOUND EVENTS
// =================================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UiData {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<CharacterId>,
}

/// Code the server asks the client to evaluate. Only ever pattern-matched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EvalData {
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum GameResponseData {
    Text(String),
    Structured(GameResponse),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct GameResponse {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    /// Cooldown remaining, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DisappearingTextData {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<CharacterId>,
}

/// Nearby players. `all` replaces what we knew; `xy` only updates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EntitiesData {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub players: Vec<PlayerData>,
}

impl EntitiesData {
    pub fn is_full_update(&self) -> bool {
        self.kind == "all"
    }
}

/// The discriminant of an [`InboundEvent`], used as the routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Player,
    Ui,
    Eval,
    GameResponse,
    DisappearingText,
    Entities,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Player => "player",
            EventKind::Ui => "ui",
            EventKind::Eval => "eval",
            EventKind::GameResponse => "game_response",
            EventKind::DisappearingText => "disappearing_text",
            EventKind::Entities => "entities",
        }
    }
}

/// An event pushed by the game server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    Start(CharacterData),
    Player(CharacterData),
    Ui(UiData),
    Eval(EvalData),
    GameResponse(GameResponseData),
    DisappearingText(DisappearingTextData),
    Entities(EntitiesData),
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::Start(_) => EventKind::Start,
            InboundEvent::Player(_) => EventKind::Player,
            InboundEvent::Ui(_) => EventKind::Ui,
            InboundEvent::Eval(_) => EventKind::Eval,
            InboundEvent::GameResponse(_) => EventKind::GameResponse,
            InboundEvent::DisappearingText(_) => EventKind::DisappearingText,
            InboundEvent::Entities(_) => EventKind::Entities,
        }
    }
}

// =================================================================================================
//                                       OUTBOUND COMMANDS
// =================================================================================================

/// A command emitted to the game server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundCommand {
    Skill {
        name: Skill,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<CharacterId>,
    },
    /// Equips an inventory item into a slot. For trade slots this lists it for sale.
    Equip {
        num: usize,
        price: u64,
        q: u32,
        slot: TradeSlot,
    },
    TradeWishlist {
        name: String,
        price: u64,
        q: u32,
        slot: TradeSlot,
        #[serde(skip_serializing_if = "Option::is_none")]
        level: Option<u32>,
    },
    JoinGiveaway {
        slot: TradeSlot,
        id: CharacterId,
        rid: String,
    },
    /// Swaps two inventory positions.
    Imove { a: usize, b: usize },
    Unequip { slot: TradeSlot },
}

impl OutboundCommand {
    pub fn event_name(&self) -> &'static str {
        match self {
            OutboundCommand::Skill { .. } => "skill",
            OutboundCommand::Equip { .. } => "equip",
            OutboundCommand::TradeWishlist { .. } => "trade_wishlist",
            OutboundCommand::JoinGiveaway { .. } => "join_giveaway",
            OutboundCommand::Imove { .. } => "imove",
            OutboundCommand::Unequip { .. } => "unequip",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trade_slots_parse_and_sort_numerically() {
        assert_eq!("trade7".parse::<TradeSlot>().unwrap(), TradeSlot::new(7));
        assert!("mainhand".parse::<TradeSlot>().is_err());
        assert!("trade".parse::<TradeSlot>().is_err());

        let mut character = CharacterData::default();
        for name in ["trade10", "trade2", "mainhand", "trade1"] {
            character.slots.insert(name.to_string(), None);
        }
        let order: Vec<u8> = character
            .trade_slots()
            .into_iter()
            .map(|(slot, _)| slot.index())
            .collect();
        assert_eq!(order, vec![1, 2, 10]);
    }

    #[test]
    fn game_response_accepts_text_and_cooldown_objects() {
        let text: InboundEvent =
            serde_json::from_value(json!({"event": "game_response", "data": "skill_cant_wtype"}))
                .unwrap();
        assert_eq!(
            text,
            InboundEvent::GameResponse(GameResponseData::Text("skill_cant_wtype".into()))
        );

        let cooldown: InboundEvent = serde_json::from_value(json!({
            "event": "game_response",
            "data": {"response": "cooldown", "place": "fishing", "skill": "fishing", "ms": 1250.0}
        }))
        .unwrap();
        match cooldown {
            InboundEvent::GameResponse(GameResponseData::Structured(response)) => {
                assert_eq!(response.response, "cooldown");
                assert_eq!(response.ms, Some(1250.0));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn player_event_keeps_empty_slots_distinct_from_missing_ones() {
        let event: InboundEvent = serde_json::from_value(json!({
            "event": "player",
            "data": {
                "id": "merchant",
                "map": "main",
                "c": {"fishing": {"ms": 5000}},
                "items": [{"name": "seashell", "q": 12}, null],
                "slots": {"trade1": null, "trade2": {"name": "seashell", "q": 3, "price": 100}}
            }
        }))
        .unwrap();
        let InboundEvent::Player(character) = event else {
            panic!("expected a player event");
        };
        assert!(character.is_busy(Skill::Fishing));
        assert!(!character.is_busy(Skill::Mining));
        assert!(character.has_slot(TradeSlot::new(1)));
        assert!(character.listing(TradeSlot::new(1)).is_none());
        assert!(!character.has_slot(TradeSlot::new(3)));
        assert_eq!(character.listing(TradeSlot::new(2)).map(SlotItem::quantity), Some(3));
        assert_eq!(character.item(0).map(ItemData::quantity), Some(12));
        assert!(character.item(1).is_none());
    }

    #[test]
    fn outbound_commands_use_the_wire_names() {
        let equip = OutboundCommand::Equip {
            num: 3,
            price: 250,
            q: 2,
            slot: TradeSlot::new(4),
        };
        assert_eq!(
            serde_json::to_value(&equip).unwrap(),
            json!({"event": "equip", "data": {"num": 3, "price": 250, "q": 2, "slot": "trade4"}})
        );

        let skill = OutboundCommand::Skill {
            name: Skill::MerchantLuck,
            id: Some("friend".into()),
        };
        assert_eq!(
            serde_json::to_value(&skill).unwrap(),
            json!({"event": "skill", "data": {"name": "mluck", "id": "friend"}})
        );
        assert_eq!(skill.event_name(), "skill");
    }
}
