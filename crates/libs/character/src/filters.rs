//! Queries over our own inventory and the player registry.
//!
//! Every filter field is optional; an empty filter matches everything.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use crate::protocol::{CharacterData, CharacterId, ItemData, PlayerData};
use crate::state::{GameState, squared_distance};

/// Conditions that keep a player from acting.
pub const DISABLING_CONDITIONS: [&str; 4] = ["stunned", "fingered", "deepfreezed", "sleeping"];

// =================================================================================================
//                                          INVENTORY
// =================================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LocateItemsFilters {
    pub level: Option<u32>,
    pub level_greater_than: Option<u32>,
    pub level_less_than: Option<u32>,
    pub locked: Option<bool>,
    pub pvp_marked: Option<bool>,
    pub quantity_greater_than: Option<u32>,
    pub special: Option<bool>,
    pub stat_type: Option<String>,
}

impl LocateItemsFilters {
    /// Items without a level never satisfy a level bound.
    pub fn matches(&self, item: &ItemData) -> bool {
        if self.level.is_some_and(|level| item.level != Some(level)) {
            return false;
        }
        if let Some(bound) = self.level_greater_than {
            if !item.level.is_some_and(|level| level > bound) {
                return false;
            }
        }
        if let Some(bound) = self.level_less_than {
            if !item.level.is_some_and(|level| level < bound) {
                return false;
            }
        }
        if self.locked.is_some_and(|locked| item.l.is_some() != locked) {
            return false;
        }
        if self.pvp_marked.is_some_and(|marked| item.v.is_some() != marked) {
            return false;
        }
        if self
            .quantity_greater_than
            .is_some_and(|bound| item.quantity() <= bound)
        {
            return false;
        }
        if self.special.is_some_and(|special| item.p.is_some() != special) {
            return false;
        }
        if let Some(stat_type) = &self.stat_type {
            if item.stat_type.as_ref() != Some(stat_type) {
                return false;
            }
        }
        true
    }
}

/// Which of several matching items [`CharacterData::locate_item`] returns.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemPick {
    HighestLevel,
    HighestQuantity,
    LowestLevel,
    LowestQuantity,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LocateItemFilters {
    #[serde(flatten)]
    pub filters: LocateItemsFilters,
    /// Without one, the first match in inventory order wins.
    pub pick: Option<ItemPick>,
}

impl CharacterData {
    /// Inventory positions holding `name` that pass the filters, in order.
    pub fn locate_items(&self, name: &str, filters: &LocateItemsFilters) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(position, item)| item.as_ref().map(|item| (position, item)))
            .filter(|(_, item)| item.name == name && filters.matches(item))
            .map(|(position, _)| position)
            .collect()
    }

    /// One inventory position holding `name`. Ties go to the earliest position.
    pub fn locate_item(&self, name: &str, filters: &LocateItemFilters) -> Option<usize> {
        let mut found = self
            .locate_items(name, &filters.filters)
            .into_iter()
            .filter_map(|position| self.item(position).map(|item| (position, item)));

        let level = |item: &ItemData| item.level.unwrap_or(0);
        let best = match filters.pick {
            None => found.next(),
            Some(ItemPick::HighestLevel) => {
                found.max_by_key(|(position, item)| (level(*item), Reverse(*position)))
            }
            Some(ItemPick::HighestQuantity) => {
                found.max_by_key(|(position, item)| (item.quantity(), Reverse(*position)))
            }
            Some(ItemPick::LowestLevel) => found.min_by_key(|(_, item)| level(*item)),
            Some(ItemPick::LowestQuantity) => found.min_by_key(|(_, item)| item.quantity()),
        };
        best.map(|(position, _)| position)
    }
}

// =================================================================================================
//                                           PLAYERS
// =================================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GetPlayersFilters {
    pub ctype: Option<String>,
    pub hp_greater_than: Option<f64>,
    pub hp_less_than: Option<f64>,
    pub ignore_ids: Vec<CharacterId>,
    pub is_dead: Option<bool>,
    pub is_disabled: Option<bool>,
    /// Friendly players share our owner or our party.
    pub is_friendly: Option<bool>,
    pub is_npc: Option<bool>,
    pub is_party_member: Option<bool>,
    pub targeting_me: Option<bool>,
    pub targeting_player: Option<CharacterId>,
    pub within_range: Option<f64>,
    pub level: Option<u32>,
    pub level_greater_than: Option<u32>,
    pub level_less_than: Option<u32>,
}

impl GetPlayersFilters {
    /// Whether `player` passes, as seen from `me`.
    pub fn matches(&self, me: &CharacterData, player: &PlayerData) -> bool {
        if self.ignore_ids.contains(&player.id) {
            return false;
        }
        if let Some(ctype) = &self.ctype {
            if &player.ctype != ctype {
                return false;
            }
        }
        if self.hp_greater_than.is_some_and(|bound| player.hp <= bound) {
            return false;
        }
        if self.hp_less_than.is_some_and(|bound| player.hp >= bound) {
            return false;
        }
        if self.is_dead.is_some_and(|dead| player.rip != dead) {
            return false;
        }
        if self
            .is_disabled
            .is_some_and(|disabled| player.is_disabled() != disabled)
        {
            return false;
        }
        let party_member = me.party.is_some() && player.party == me.party;
        if self
            .is_party_member
            .is_some_and(|member| party_member != member)
        {
            return false;
        }
        let same_owner = !me.owner.is_empty() && player.owner == me.owner;
        if self
            .is_friendly
            .is_some_and(|friendly| (same_owner || party_member) != friendly)
        {
            return false;
        }
        if self.is_npc.is_some_and(|npc| player.npc.is_some() != npc) {
            return false;
        }
        if self
            .targeting_me
            .is_some_and(|targeting| (player.target.as_ref() == Some(&me.id)) != targeting)
        {
            return false;
        }
        if let Some(target) = &self.targeting_player {
            if player.target.as_ref() != Some(target) {
                return false;
            }
        }
        if self
            .within_range
            .is_some_and(|range| squared_distance(me, player) > range * range)
        {
            return false;
        }
        if self.level.is_some_and(|level| player.level != level) {
            return false;
        }
        if self.level_greater_than.is_some_and(|bound| player.level <= bound) {
            return false;
        }
        if self.level_less_than.is_some_and(|bound| player.level >= bound) {
            return false;
        }
        true
    }
}

/// Which of several matching players [`GameState::get_player`] returns.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerPick {
    HighestHp,
    LowestHp,
    Nearest,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GetPlayerFilters {
    #[serde(flatten)]
    pub filters: GetPlayersFilters,
    /// Without one, the first match by id wins.
    pub pick: Option<PlayerPick>,
}

impl PlayerData {
    pub fn is_disabled(&self) -> bool {
        self.rip
            || DISABLING_CONDITIONS
                .iter()
                .any(|condition| self.s.contains_key(*condition))
    }
}

impl GameState {
    /// Players in the registry that pass the filters, ordered by id.
    pub fn get_players(&self, filters: &GetPlayersFilters) -> Vec<&PlayerData> {
        let mut players: Vec<_> = self
            .players
            .values()
            .filter(|player| filters.matches(&self.character, player))
            .collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));
        players
    }

    pub fn get_player(&self, filters: &GetPlayerFilters) -> Option<&PlayerData> {
        let mut players = self.get_players(&filters.filters).into_iter();
        match filters.pick {
            None => players.next(),
            Some(PlayerPick::HighestHp) => players.rev().max_by(|a, b| a.hp.total_cmp(&b.hp)),
            Some(PlayerPick::LowestHp) => players.min_by(|a, b| a.hp.total_cmp(&b.hp)),
            Some(PlayerPick::Nearest) => players.min_by(|a, b| {
                squared_distance(&self.character, *a)
                    .total_cmp(&squared_distance(&self.character, *b))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StatusInfo;

    fn item(name: &str, q: u32, level: Option<u32>) -> Option<ItemData> {
        Some(ItemData {
            name: name.into(),
            q: Some(q),
            level,
            ..Default::default()
        })
    }

    fn inventory() -> CharacterData {
        let mut shiny = item("wbook0", 1, Some(2));
        if let Some(shiny) = shiny.as_mut() {
            shiny.p = Some("shiny".into());
        }
        CharacterData {
            items: vec![
                item("seashell", 5, None),
                None,
                item("wbook0", 1, Some(0)),
                item("seashell", 40, None),
                shiny,
                item("wbook0", 1, Some(3)),
                item("seashell", 40, None),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn locates_items_by_name_level_and_quantity() {
        let character = inventory();

        assert_eq!(
            character.locate_items("seashell", &LocateItemsFilters::default()),
            vec![0, 3, 6]
        );
        let big_stacks = LocateItemsFilters {
            quantity_greater_than: Some(10),
            ..Default::default()
        };
        assert_eq!(character.locate_items("seashell", &big_stacks), vec![3, 6]);

        let upgraded = LocateItemsFilters {
            level_greater_than: Some(0),
            special: Some(false),
            ..Default::default()
        };
        assert_eq!(character.locate_items("wbook0", &upgraded), vec![5]);
        let exact = LocateItemsFilters {
            level: Some(0),
            ..Default::default()
        };
        assert_eq!(character.locate_items("seashell", &exact), Vec::<usize>::new());
        assert_eq!(character.locate_items("wbook0", &exact), vec![2]);
    }

    #[test]
    fn locate_item_picks_one_match() {
        let character = inventory();
        let pick = |pick| LocateItemFilters {
            pick,
            ..Default::default()
        };

        assert_eq!(character.locate_item("seashell", &pick(None)), Some(0));
        assert_eq!(
            character.locate_item("seashell", &pick(Some(ItemPick::HighestQuantity))),
            Some(3)
        );
        assert_eq!(
            character.locate_item("seashell", &pick(Some(ItemPick::LowestQuantity))),
            Some(0)
        );
        assert_eq!(
            character.locate_item("wbook0", &pick(Some(ItemPick::HighestLevel))),
            Some(5)
        );
        assert_eq!(
            character.locate_item("wbook0", &pick(Some(ItemPick::LowestLevel))),
            Some(2)
        );
        assert_eq!(character.locate_item("mpot1", &pick(None)), None);
    }

    #[test]
    fn item_filters_deserialize_flat() {
        let filters: LocateItemFilters = serde_json::from_str(
            r#"{"quantity_greater_than": 1, "pick": "highest_quantity"}"#,
        )
        .unwrap();
        assert_eq!(filters.filters.quantity_greater_than, Some(1));
        assert_eq!(filters.pick, Some(ItemPick::HighestQuantity));
    }

    fn player(id: &str, x: f64) -> PlayerData {
        PlayerData {
            id: id.into(),
            owner: "owner-2".into(),
            ctype: "ranger".into(),
            map: "main".into(),
            x,
            hp: 1000.0,
            level: 60,
            ..Default::default()
        }
    }

    fn crowd() -> GameState {
        let mut state = GameState::new("merchant");
        state.character.owner = "owner-1".into();
        state.character.map = "main".into();
        state.character.party = Some("leader".into());

        let mut alt = player("alt", 300.0);
        alt.owner = "owner-1".into();
        alt.ctype = "priest".into();
        let mut guard = player("guard", 20.0);
        guard.npc = Some("guard".into());
        let mut dead = player("dead", 50.0);
        dead.rip = true;
        let mut stunned = player("stunned", 600.0);
        stunned.s.insert("stunned".into(), StatusInfo::default());
        let mut leader = player("leader", 100.0);
        leader.party = Some("leader".into());
        leader.hp = 250.0;
        leader.target = Some("merchant".into());
        let mut far = player("far", 2000.0);
        far.level = 80;

        for player in [alt, guard, dead, stunned, leader, far] {
            state.upsert_player(player);
        }
        state
    }

    fn ids(players: Vec<&PlayerData>) -> Vec<&str> {
        players.into_iter().map(|player| player.id.as_str()).collect()
    }

    #[test]
    fn filters_players_around_us() {
        let state = crowd();

        let everyone = state.get_players(&GetPlayersFilters::default());
        assert_eq!(
            ids(everyone),
            vec!["alt", "dead", "far", "guard", "leader", "stunned"]
        );

        let nearby_players = GetPlayersFilters {
            is_npc: Some(false),
            within_range: Some(320.0),
            ignore_ids: vec!["dead".into()],
            ..Default::default()
        };
        assert_eq!(ids(state.get_players(&nearby_players)), vec!["alt", "leader"]);

        let friendly = GetPlayersFilters {
            is_friendly: Some(true),
            ..Default::default()
        };
        assert_eq!(ids(state.get_players(&friendly)), vec!["alt", "leader"]);

        let party = GetPlayersFilters {
            is_party_member: Some(true),
            targeting_me: Some(true),
            ..Default::default()
        };
        assert_eq!(ids(state.get_players(&party)), vec!["leader"]);

        let disabled = GetPlayersFilters {
            is_disabled: Some(true),
            ..Default::default()
        };
        assert_eq!(ids(state.get_players(&disabled)), vec!["dead", "stunned"]);

        let priests = GetPlayersFilters {
            ctype: Some("priest".into()),
            ..Default::default()
        };
        assert_eq!(ids(state.get_players(&priests)), vec!["alt"]);

        let veterans = GetPlayersFilters {
            level_greater_than: Some(60),
            is_dead: Some(false),
            ..Default::default()
        };
        assert_eq!(ids(state.get_players(&veterans)), vec!["far"]);
    }

    #[test]
    fn get_player_picks_one_match() {
        let state = crowd();
        let pick = |pick| GetPlayerFilters {
            filters: GetPlayersFilters {
                is_npc: Some(false),
                ..Default::default()
            },
            pick,
        };

        let id = |filters: GetPlayerFilters| state.get_player(&filters).map(|player| player.id.as_str());
        assert_eq!(id(pick(None)), Some("alt"));
        assert_eq!(id(pick(Some(PlayerPick::Nearest))), Some("dead"));
        assert_eq!(id(pick(Some(PlayerPick::LowestHp))), Some("leader"));
        assert_eq!(id(pick(Some(PlayerPick::HighestHp))), Some("alt"));

        let nobody = GetPlayerFilters {
            filters: GetPlayersFilters {
                hp_less_than: Some(100.0),
                ..Default::default()
            },
            pick: Some(PlayerPick::Nearest),
        };
        assert_eq!(state.get_player(&nobody), None);
    }
}
