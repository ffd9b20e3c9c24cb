use log::{debug, info};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::action::{self, ActionTimeouts, CommandSender};
use crate::error::ActionError;
use crate::protocol::{
    CharacterId, InboundEvent, ItemData, OutboundCommand, Skill, SlotItem, TradeSlot,
};
use crate::router::EventRouter;
use crate::rules;
use crate::state::{
    GameData, GameState, MLUCK_RANGE, NPC_INTERACTION_DISTANCE_SQUARED, SharedState,
    squared_distance,
};

/// A merchant character.
///
/// Every action checks its preconditions against the local state, emits one
/// command, and only returns once the server confirmed it, refused it, or the
/// deadline passed. Nothing is retried.
#[derive(Clone)]
pub struct Merchant {
    id: CharacterId,
    state: SharedState,
    router: EventRouter,
    outbound: CommandSender,
    game_data: Arc<GameData>,
    timeouts: ActionTimeouts,
}

/// Where and how an item ends up listed for sale.
struct SalePlan {
    item: ItemData,
    slot: TradeSlot,
    /// Quantity already listed in `slot` that gets merged into the new listing.
    merge_with: Option<u32>,
}

impl Merchant {
    /// Creates the merchant and the receiving end of its outbound commands,
    /// which belongs to the transport.
    pub fn new(
        id: &str,
        game_data: GameData,
        timeouts: ActionTimeouts,
    ) -> (Self, mpsc::UnboundedReceiver<OutboundCommand>) {
        let (outbound, commands) = mpsc::unbounded_channel();
        let merchant = Self {
            id: id.to_string(),
            state: SharedState::new(GameState::new(id)),
            router: EventRouter::new(),
            outbound,
            game_data: Arc::new(game_data),
            timeouts,
        };
        (merchant, commands)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn timeouts(&self) -> ActionTimeouts {
        self.timeouts
    }

    /// Feeds an inbound event: local state first, then any pending actions.
    /// Returns how many pending actions it reached.
    pub fn ingest(&self, event: InboundEvent) -> usize {
        self.state.write().apply(&event);
        self.router.publish(&event)
    }

    pub fn mark_disconnected(&self) {
        self.state.write().mark_disconnected();
    }

    fn with_ready_state<T>(
        &self,
        action: &'static str,
        check: impl FnOnce(&GameState) -> Result<T, ActionError>,
    ) -> Result<T, ActionError> {
        let state = self.state.read();
        if !state.ready {
            return Err(ActionError::NotReady(action));
        }
        check(&state)
    }

    // --- Gathering ---

    pub async fn fish(&self) -> Result<(), ActionError> {
        self.gather(Skill::Fishing, "fish").await
    }

    pub async fn mine(&self) -> Result<(), ActionError> {
        self.gather(Skill::Mining, "mine").await
    }

    async fn gather(&self, skill: Skill, action: &'static str) -> Result<(), ActionError> {
        let busy = self.with_ready_state(action, |state| Ok(state.character.is_busy(skill)))?;
        if busy {
            debug!("[{}] busy flag already set before dispatch", action);
        }

        action::confirm(
            &self.router,
            &self.outbound,
            action,
            OutboundCommand::Skill {
                name: skill,
                id: None,
            },
            rules::gathering(&self.id, skill, busy),
            self.timeouts.gathering,
        )
        .await
    }

    // --- Skills ---

    pub async fn mluck(&self, target: &str) -> Result<(), ActionError> {
        self.with_ready_state("mluck", |state| {
            if target == self.id {
                return Ok(());
            }
            let player = state
                .players
                .get(target)
                .ok_or_else(|| ActionError::OutOfRange(target.to_string()))?;
            if player.npc.is_some() {
                return Err(ActionError::Validation(format!(
                    "{} is an NPC. You can't mluck NPCs.",
                    target
                )));
            }
            if squared_distance(&state.character, player) > MLUCK_RANGE * MLUCK_RANGE {
                return Err(ActionError::OutOfRange(target.to_string()));
            }
            if let Some(mluck) = player.s.get("mluck") {
                let foreign_owner =
                    !player.owner.is_empty() && player.owner != state.character.owner;
                let from_someone_else = mluck.f.as_deref() != Some(self.id.as_str());
                if mluck.strong == Some(true) && (foreign_owner || from_someone_else) {
                    return Err(ActionError::Validation(format!(
                        "{} has a strong mluck from {}.",
                        target,
                        mluck.f.as_deref().unwrap_or("someone else")
                    )));
                }
            }
            Ok(())
        })?;

        action::confirm(
            &self.router,
            &self.outbound,
            "mluck",
            OutboundCommand::Skill {
                name: Skill::MerchantLuck,
                id: Some(target.to_string()),
            },
            rules::skill(Skill::MerchantLuck),
            self.timeouts.skill,
        )
        .await
    }

    pub async fn mass_production(&self) -> Result<(), ActionError> {
        self.with_ready_state("massProduction", |_| Ok(()))?;

        action::confirm(
            &self.router,
            &self.outbound,
            "massProduction",
            OutboundCommand::Skill {
                name: Skill::MassProduction,
                id: None,
            },
            rules::mass_production(&self.id),
            self.timeouts.skill,
        )
        .await
    }

    pub async fn merchant_courage(&self) -> Result<(), ActionError> {
        self.with_ready_state("merchantCourage", |_| Ok(()))?;

        action::confirm(
            &self.router,
            &self.outbound,
            "merchantCourage",
            OutboundCommand::Skill {
                name: Skill::MerchantCourage,
                id: None,
            },
            rules::skill(Skill::MerchantCourage),
            self.timeouts.skill,
        )
        .await
    }

    // --- Trading ---

    /// Lists the item at `item_pos` for sale.
    ///
    /// Without an explicit `trade_slot`, a stackable item is merged into an
    /// identical listing at the same or a lower price when the combined
    /// quantity still fits one stack; otherwise the first empty trade slot is
    /// used. Merging takes a swap, an unequip and a swap back before the final
    /// listing. A failure part way leaves the inventory as it was at that step.
    pub async fn list_for_sale(
        &self,
        item_pos: usize,
        price: u64,
        trade_slot: Option<TradeSlot>,
        quantity: u32,
    ) -> Result<(), ActionError> {
        const ACTION: &str = "listForSale";
        let plan = self.with_ready_state(ACTION, |state| {
            self.plan_sale(state, item_pos, price, trade_slot, quantity)
        })?;

        let mut quantity = quantity;
        if let Some(listed) = plan.merge_with {
            info!(
                "[{}] merging {} x{} into the listing in {}",
                ACTION, plan.item.name, listed, plan.slot
            );
            if item_pos != 0 {
                // Bring the item to the front so the unequipped stack lands on it
                self.swap_items(0, item_pos).await?;
            }
            self.unequip(plan.slot).await?;
            quantity += listed;
            if item_pos != 0 {
                self.swap_items(0, item_pos).await?;
            }
        }

        action::confirm(
            &self.router,
            &self.outbound,
            ACTION,
            OutboundCommand::Equip {
                num: item_pos,
                price,
                q: quantity,
                slot: plan.slot,
            },
            rules::sale_listing(&self.id, plan.slot, &plan.item.name, quantity),
            self.timeouts.confirmation,
        )
        .await
    }

    fn plan_sale(
        &self,
        state: &GameState,
        item_pos: usize,
        price: u64,
        trade_slot: Option<TradeSlot>,
        quantity: u32,
    ) -> Result<SalePlan, ActionError> {
        let character = &state.character;
        let item = character.item(item_pos).cloned().ok_or_else(|| {
            ActionError::Validation(format!("We do not have an item in slot {}", item_pos))
        })?;
        if price == 0 {
            return Err(ActionError::Validation(
                "The lowest you can set the price is 1.".to_string(),
            ));
        }
        if quantity == 0 {
            return Err(ActionError::Validation(
                "The lowest you can set the quantity to is 1.".to_string(),
            ));
        }
        if quantity > item.quantity() {
            return Err(ActionError::Validation(format!(
                "We only have {} {} in slot {}.",
                item.quantity(),
                item.name,
                item_pos
            )));
        }

        let stack_limit = self.game_data.stack_limit(&item.name);
        let mergeable =
            |listing: &SlotItem| can_merge(&item, listing, price, quantity, stack_limit);
        let trade_slots = character.trade_slots();

        let mut slot = trade_slot;
        if slot.is_none() && item.q.is_some() {
            slot = trade_slots
                .iter()
                .find(|(_, listing)| listing.is_some_and(|listing| mergeable(listing)))
                .map(|(slot, _)| *slot);
        }
        let slot = match slot {
            Some(slot) => slot,
            None => trade_slots
                .iter()
                .find(|(_, listing)| listing.is_none())
                .map(|(slot, _)| *slot)
                .ok_or_else(|| {
                    ActionError::Validation(
                        "We don't have an empty trade slot to list the item for sale."
                            .to_string(),
                    )
                })?,
        };
        if !character.has_slot(slot) {
            return Err(ActionError::Validation(format!(
                "We don't have a trade slot '{}'.",
                slot
            )));
        }

        let merge_with = match character.listing(slot) {
            None => None,
            Some(listing) if mergeable(listing) => Some(listing.quantity()),
            Some(_) => {
                return Err(ActionError::Validation(format!(
                    "We are already trading something in {}.",
                    slot
                )));
            }
        };

        Ok(SalePlan {
            item,
            slot,
            merge_with,
        })
    }

    /// Adds a buy order for `item` to the stand. Remove it again with [`Merchant::unequip`].
    pub async fn list_for_purchase(
        &self,
        item: &str,
        price: u64,
        trade_slot: Option<TradeSlot>,
        quantity: u32,
        level: Option<u32>,
    ) -> Result<(), ActionError> {
        const ACTION: &str = "listForPurchase";
        let slot = self.with_ready_state(ACTION, |state| {
            if price == 0 {
                return Err(ActionError::Validation(
                    "The lowest you can set the price is 1.".to_string(),
                ));
            }
            if quantity == 0 {
                return Err(ActionError::Validation(
                    "The lowest you can set the quantity to is 1.".to_string(),
                ));
            }
            let character = &state.character;
            match trade_slot {
                None => character
                    .trade_slots()
                    .into_iter()
                    .find(|(_, listing)| listing.is_none())
                    .map(|(slot, _)| slot)
                    .ok_or_else(|| {
                        ActionError::Validation(
                            "We don't have any empty trade slot to wishlist the item."
                                .to_string(),
                        )
                    }),
                Some(slot) if character.listing(slot).is_some() => Err(ActionError::Validation(
                    format!("We already have something listed in '{}'.", slot),
                )),
                Some(slot) if !character.has_slot(slot) => Err(ActionError::Validation(
                    format!("We don't have a trade slot '{}'.", slot),
                )),
                Some(slot) => Ok(slot),
            }
        })?;

        action::confirm(
            &self.router,
            &self.outbound,
            ACTION,
            OutboundCommand::TradeWishlist {
                name: item.to_string(),
                price,
                q: quantity,
                slot,
                level,
            },
            rules::purchase_listing(slot, item, quantity, price),
            self.timeouts.confirmation,
        )
        .await
    }

    /// Joins another merchant's giveaway. Already being on the list is a success.
    pub async fn join_giveaway(
        &self,
        slot: TradeSlot,
        merchant_id: &str,
        rid: &str,
    ) -> Result<(), ActionError> {
        const ACTION: &str = "joinGiveaway";
        let already_joined = self.with_ready_state(ACTION, |state| {
            let merchant = state
                .players
                .get(merchant_id)
                .filter(|merchant| {
                    squared_distance(&state.character, *merchant)
                        <= NPC_INTERACTION_DISTANCE_SQUARED
                })
                .ok_or_else(|| ActionError::OutOfRange(merchant_id.to_string()))?;
            let listing = merchant
                .listing(slot)
                .filter(|listing| listing.is_giveaway())
                .ok_or_else(|| {
                    ActionError::Validation(format!(
                        "{}'s slot {} is not a giveaway.",
                        merchant_id, slot
                    ))
                })?;
            Ok(listing.list.contains(&self.id))
        })?;
        if already_joined {
            debug!("[{}] already on the list for {}'s {}", ACTION, merchant_id, slot);
            return Ok(());
        }

        action::confirm(
            &self.router,
            &self.outbound,
            ACTION,
            OutboundCommand::JoinGiveaway {
                slot,
                id: merchant_id.to_string(),
                rid: rid.to_string(),
            },
            rules::giveaway(merchant_id, slot),
            self.timeouts.confirmation,
        )
        .await
    }

    // --- Inventory ---

    /// Swaps two inventory positions.
    pub async fn swap_items(&self, a: usize, b: usize) -> Result<(), ActionError> {
        const ACTION: &str = "swapItems";
        let (at_a, at_b) = self.with_ready_state(ACTION, |state| {
            let size = state.character.items.len();
            if a >= size || b >= size {
                return Err(ActionError::Validation(format!(
                    "Inventory positions must be below {}.",
                    size
                )));
            }
            Ok((
                state.character.item(a).cloned(),
                state.character.item(b).cloned(),
            ))
        })?;
        if a == b {
            return Ok(());
        }

        action::confirm(
            &self.router,
            &self.outbound,
            ACTION,
            OutboundCommand::Imove { a, b },
            rules::swap(a, b, at_a, at_b),
            self.timeouts.confirmation,
        )
        .await
    }

    /// Empties a trade slot back into the inventory.
    pub async fn unequip(&self, slot: TradeSlot) -> Result<(), ActionError> {
        const ACTION: &str = "unequip";
        self.with_ready_state(ACTION, |state| {
            if state.character.listing(slot).is_none() {
                return Err(ActionError::Validation(format!(
                    "There is nothing in {} to unequip.",
                    slot
                )));
            }
            Ok(())
        })?;

        action::confirm(
            &self.router,
            &self.outbound,
            ACTION,
            OutboundCommand::Unequip { slot },
            rules::unequip(slot),
            self.timeouts.confirmation,
        )
        .await
    }
}

/// Whether `item` can be stacked onto an existing sell `listing`.
fn can_merge(
    item: &ItemData,
    listing: &SlotItem,
    price: u64,
    quantity: u32,
    stack_limit: Option<u32>,
) -> bool {
    !listing.is_buy_order()
        && listing.name == item.name
        && listing.p == item.p
        && price >= listing.price()
        && stack_limit.is_some_and(|limit| quantity + listing.quantity() <= limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seashell(q: u32) -> ItemData {
        ItemData {
            name: "seashell".into(),
            q: Some(q),
            ..Default::default()
        }
    }

    fn listing(q: u32, price: u64) -> SlotItem {
        SlotItem {
            name: "seashell".into(),
            q: Some(q),
            price: Some(price),
            ..Default::default()
        }
    }

    #[test]
    fn merging_needs_same_item_price_floor_and_stack_room() {
        let item = seashell(5);
        assert!(can_merge(&item, &listing(10, 100), 100, 5, Some(1000)));
        assert!(can_merge(&item, &listing(10, 100), 150, 5, Some(1000)));
        assert!(!can_merge(&item, &listing(10, 100), 99, 5, Some(1000)));
        assert!(!can_merge(&item, &listing(998, 100), 100, 5, Some(1000)));
        assert!(!can_merge(&item, &listing(10, 100), 100, 5, None));

        let mut shiny = listing(10, 100);
        shiny.p = Some("shiny".into());
        assert!(!can_merge(&item, &shiny, 100, 5, Some(1000)));

        let mut buy_order = listing(10, 100);
        buy_order.b = Some(true);
        assert!(!can_merge(&item, &buy_order, 100, 5, Some(1000)));
    }
}
