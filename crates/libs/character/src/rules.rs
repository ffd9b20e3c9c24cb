//! Rule tables for each merchant action.
//!
//! Every predicate checks the actor and payload shape, not just the event
//! kind, since the channel carries plenty of traffic unrelated to the action.

use crate::correlate::{BusyTracker, Correlator, Rule, Verdict};
use crate::protocol::{
    CharacterId, EventKind, GameResponse, GameResponseData, InboundEvent, ItemData, Skill,
    TradeSlot,
};
use crate::signals::cooldown_started;

/// Structured skill responses that mean the server refused the skill.
const SKILL_FAILURES: &[&str] = &[
    "too_far",
    "no_mp",
    "no_level",
    "no_target",
    "disabled",
    "skill_cant_use",
];

fn text_response(event: &InboundEvent) -> Option<&str> {
    match event {
        InboundEvent::GameResponse(GameResponseData::Text(text)) => Some(text),
        _ => None,
    }
}

fn structured_response(event: &InboundEvent) -> Option<&GameResponse> {
    match event {
        InboundEvent::GameResponse(GameResponseData::Structured(response)) => Some(response),
        _ => None,
    }
}

fn on_cooldown(response: &GameResponse, skill: Skill) -> bool {
    response.response == "cooldown" && response.skill.as_deref() == Some(skill.name())
}

fn cooldown_message(label: &str, response: &GameResponse) -> String {
    format!(
        "{} is on cooldown ({}ms remaining)",
        label,
        response.ms.unwrap_or_default()
    )
}

// =================================================================================================
//                                      GATHERING (FISH / MINE)
// =================================================================================================

pub struct GatheringContext {
    me: CharacterId,
    skill: Skill,
    busy: BusyTracker,
}

impl GatheringContext {
    fn label(&self) -> &'static str {
        match self.skill {
            Skill::Fishing => "Fishing",
            Skill::Mining => "Mining",
            _ => "Gathering",
        }
    }

    fn tool(&self) -> &'static str {
        match self.skill {
            Skill::Fishing => "fishing rod",
            Skill::Mining => "pickaxe",
            _ => "tool",
        }
    }

    fn verb(&self) -> &'static str {
        match self.skill {
            Skill::Fishing => "fish",
            Skill::Mining => "mine",
            _ => "gather",
        }
    }
}

/// Fishing and mining: confirmed by the cooldown signal, a `*_none` notice, or
/// the busy flag clearing; rejected for a missing tool, cooldown, or `*_fail`.
pub fn gathering(me: &str, skill: Skill, busy_at_dispatch: bool) -> Correlator<GatheringContext> {
    Correlator::new(
        GatheringContext {
            me: me.to_string(),
            skill,
            busy: BusyTracker::new(busy_at_dispatch),
        },
        vec![
            Rule::new(EventKind::Eval, gathering_cooldown_started),
            Rule::new(EventKind::GameResponse, gathering_refused),
            Rule::new(EventKind::Ui, gathering_notice),
            Rule::new(EventKind::Player, gathering_busy_cleared),
        ],
    )
}

fn gathering_cooldown_started(
    context: &mut GatheringContext,
    event: &InboundEvent,
) -> Option<Verdict> {
    let InboundEvent::Eval(data) = event else {
        return None;
    };
    cooldown_started(&data.code, context.skill).then_some(Verdict::Confirmed)
}

fn gathering_refused(context: &mut GatheringContext, event: &InboundEvent) -> Option<Verdict> {
    if text_response(event) == Some("skill_cant_wtype") {
        return Some(Verdict::Rejected(format!(
            "We don't have a {} equipped",
            context.tool()
        )));
    }
    let response = structured_response(event)?;
    if on_cooldown(response, context.skill)
        && response.place.as_deref() == Some(context.skill.name())
    {
        return Some(Verdict::Rejected(cooldown_message(context.label(), response)));
    }
    None
}

fn gathering_notice(context: &mut GatheringContext, event: &InboundEvent) -> Option<Verdict> {
    let InboundEvent::Ui(data) = event else {
        return None;
    };
    if data.name.as_deref() != Some(context.me.as_str()) {
        return None;
    }
    let kind = data.kind.strip_prefix(context.skill.name())?;
    match kind {
        "_fail" => Some(Verdict::Rejected(format!(
            "We failed to {}.",
            context.verb()
        ))),
        // Gathered, but got nothing
        "_none" => Some(Verdict::Confirmed),
        _ => None,
    }
}

fn gathering_busy_cleared(
    context: &mut GatheringContext,
    event: &InboundEvent,
) -> Option<Verdict> {
    let InboundEvent::Player(data) = event else {
        return None;
    };
    // Either finished with nothing or got interrupted; there is no telling which.
    context
        .busy
        .observe(data.is_busy(context.skill))
        .then_some(Verdict::Confirmed)
}

// =================================================================================================
//                                         TARGETED SKILLS
// =================================================================================================

pub struct SkillContext {
    skill: Skill,
}

/// Skills that only acknowledge themselves by starting their cooldown.
pub fn skill(skill: Skill) -> Correlator<SkillContext> {
    Correlator::new(
        SkillContext { skill },
        vec![
            Rule::new(EventKind::Eval, skill_cooldown_started),
            Rule::new(EventKind::GameResponse, skill_refused),
        ],
    )
}

fn skill_cooldown_started(context: &mut SkillContext, event: &InboundEvent) -> Option<Verdict> {
    let InboundEvent::Eval(data) = event else {
        return None;
    };
    cooldown_started(&data.code, context.skill).then_some(Verdict::Confirmed)
}

fn skill_refused(context: &mut SkillContext, event: &InboundEvent) -> Option<Verdict> {
    let response = structured_response(event)?;
    if on_cooldown(response, context.skill) {
        return Some(Verdict::Rejected(cooldown_message(
            context.skill.name(),
            response,
        )));
    }
    let for_this_skill = response.place.as_deref() == Some(context.skill.name());
    if for_this_skill && SKILL_FAILURES.contains(&response.response.as_str()) {
        return Some(Verdict::Rejected(format!(
            "{} failed ({})",
            context.skill.name(),
            response.response
        )));
    }
    None
}

// =================================================================================================
//                                         MASS PRODUCTION
// =================================================================================================

pub struct MassProductionContext {
    me: CharacterId,
}

pub fn mass_production(me: &str) -> Correlator<MassProductionContext> {
    Correlator::new(
        MassProductionContext { me: me.to_string() },
        vec![
            Rule::new(EventKind::Ui, mass_production_notice),
            Rule::new(EventKind::GameResponse, mass_production_refused),
        ],
    )
}

fn mass_production_notice(
    context: &mut MassProductionContext,
    event: &InboundEvent,
) -> Option<Verdict> {
    let InboundEvent::Ui(data) = event else {
        return None;
    };
    (data.kind == Skill::MassProduction.name() && data.name.as_deref() == Some(context.me.as_str()))
        .then_some(Verdict::Confirmed)
}

fn mass_production_refused(_: &mut MassProductionContext, event: &InboundEvent) -> Option<Verdict> {
    let response = structured_response(event)?;
    on_cooldown(response, Skill::MassProduction)
        .then(|| Verdict::Rejected(cooldown_message("massproduction", response)))
}

// =================================================================================================
//                                          TRADE LISTINGS
// =================================================================================================

pub struct SaleListingContext {
    me: CharacterId,
    slot: TradeSlot,
    item: String,
    quantity: u32,
}

/// Listing an item for sale: confirmed once the slot shows the item with the
/// full quantity.
pub fn sale_listing(
    me: &str,
    slot: TradeSlot,
    item: &str,
    quantity: u32,
) -> Correlator<SaleListingContext> {
    Correlator::new(
        SaleListingContext {
            me: me.to_string(),
            slot,
            item: item.to_string(),
            quantity,
        },
        vec![
            Rule::new(EventKind::GameResponse, sale_slot_occupied),
            Rule::new(EventKind::DisappearingText, sale_cant_equip),
            Rule::new(EventKind::Player, sale_listed),
        ],
    )
}

fn sale_slot_occupied(context: &mut SaleListingContext, event: &InboundEvent) -> Option<Verdict> {
    (text_response(event) == Some("slot_occupied")).then(|| {
        Verdict::Rejected(format!(
            "We are already listing something in {}.",
            context.slot
        ))
    })
}

fn sale_cant_equip(context: &mut SaleListingContext, event: &InboundEvent) -> Option<Verdict> {
    let InboundEvent::DisappearingText(data) = event else {
        return None;
    };
    (data.message == "CAN'T EQUIP" && data.id.as_deref() == Some(context.me.as_str())).then(|| {
        Verdict::Rejected(format!(
            "We failed listing the item in {}.",
            context.slot
        ))
    })
}

fn sale_listed(context: &mut SaleListingContext, event: &InboundEvent) -> Option<Verdict> {
    let InboundEvent::Player(data) = event else {
        return None;
    };
    let listing = data.listing(context.slot)?;
    (listing.name == context.item && listing.quantity() == context.quantity)
        .then_some(Verdict::Confirmed)
}

pub struct PurchaseListingContext {
    slot: TradeSlot,
    item: String,
    quantity: u32,
    price: u64,
}

/// Wishlisting an item: confirmed once the slot holds a matching buy order.
pub fn purchase_listing(
    slot: TradeSlot,
    item: &str,
    quantity: u32,
    price: u64,
) -> Correlator<PurchaseListingContext> {
    Correlator::new(
        PurchaseListingContext {
            slot,
            item: item.to_string(),
            quantity,
            price,
        },
        vec![
            Rule::new(EventKind::Player, purchase_listed),
            Rule::new(EventKind::GameResponse, purchase_slot_occupied),
        ],
    )
}

fn purchase_listed(context: &mut PurchaseListingContext, event: &InboundEvent) -> Option<Verdict> {
    let InboundEvent::Player(data) = event else {
        return None;
    };
    let listing = data.listing(context.slot)?;
    (listing.is_buy_order()
        && listing.name == context.item
        && listing.quantity() == context.quantity
        && listing.price() == context.price)
        .then_some(Verdict::Confirmed)
}

fn purchase_slot_occupied(
    context: &mut PurchaseListingContext,
    event: &InboundEvent,
) -> Option<Verdict> {
    (text_response(event) == Some("slot_occupied")).then(|| {
        Verdict::Rejected(format!(
            "We already have something listed in '{}'.",
            context.slot
        ))
    })
}

// =================================================================================================
//                                        INVENTORY & SLOTS
// =================================================================================================

pub struct SwapContext {
    a: usize,
    b: usize,
    was_at_a: Option<ItemData>,
    was_at_b: Option<ItemData>,
}

/// Swapping two inventory positions: confirmed once their contents traded places.
pub fn swap(
    a: usize,
    b: usize,
    was_at_a: Option<ItemData>,
    was_at_b: Option<ItemData>,
) -> Correlator<SwapContext> {
    Correlator::new(
        SwapContext {
            a,
            b,
            was_at_a,
            was_at_b,
        },
        vec![Rule::new(EventKind::Player, swapped)],
    )
}

fn swapped(context: &mut SwapContext, event: &InboundEvent) -> Option<Verdict> {
    let InboundEvent::Player(data) = event else {
        return None;
    };
    (data.item(context.a) == context.was_at_b.as_ref()
        && data.item(context.b) == context.was_at_a.as_ref())
    .then_some(Verdict::Confirmed)
}

pub struct UnequipContext {
    slot: TradeSlot,
}

pub fn unequip(slot: TradeSlot) -> Correlator<UnequipContext> {
    Correlator::new(
        UnequipContext { slot },
        vec![Rule::new(EventKind::Player, slot_emptied)],
    )
}

fn slot_emptied(context: &mut UnequipContext, event: &InboundEvent) -> Option<Verdict> {
    let InboundEvent::Player(data) = event else {
        return None;
    };
    data.listing(context.slot)
        .is_none()
        .then_some(Verdict::Confirmed)
}

// =================================================================================================
//                                            GIVEAWAYS
// =================================================================================================

pub struct GiveawayContext {
    merchant: CharacterId,
    slot: TradeSlot,
}

pub fn giveaway(merchant: &str, slot: TradeSlot) -> Correlator<GiveawayContext> {
    Correlator::new(
        GiveawayContext {
            merchant: merchant.to_string(),
            slot,
        },
        vec![Rule::new(EventKind::GameResponse, giveaway_joined)],
    )
}

fn giveaway_joined(context: &mut GiveawayContext, event: &InboundEvent) -> Option<Verdict> {
    let response = structured_response(event)?;
    let ours = response.id.as_deref() == Some(context.merchant.as_str())
        && response.slot.as_deref() == Some(context.slot.name().as_str());
    (response.response == "giveaway_join" && ours).then_some(Verdict::Confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CharacterData, DisappearingTextData, EvalData, SlotItem, UiData};

    fn ui(kind: &str, name: &str) -> InboundEvent {
        InboundEvent::Ui(UiData {
            kind: kind.into(),
            name: Some(name.into()),
        })
    }

    fn busy(skill: Skill, busy: bool) -> InboundEvent {
        let mut data = CharacterData {
            id: "merchant".into(),
            ..Default::default()
        };
        if busy {
            data.c.insert(skill.name().into(), serde_json::json!({"ms": 5000}));
        }
        InboundEvent::Player(data)
    }

    #[test]
    fn gathering_ignores_other_actors() {
        let mut correlator = gathering("merchant", Skill::Mining, false);
        assert_eq!(correlator.observe(&ui("mining_none", "someone_else")), None);
        assert_eq!(correlator.observe(&ui("fishing_none", "merchant")), None);
        assert_eq!(
            correlator.observe(&ui("mining_none", "merchant")),
            Some(Verdict::Confirmed)
        );
    }

    #[test]
    fn gathering_reports_cooldown_and_missing_tool() {
        let mut correlator = gathering("merchant", Skill::Fishing, false);
        let cooldown = InboundEvent::GameResponse(GameResponseData::Structured(GameResponse {
            response: "cooldown".into(),
            place: Some("fishing".into()),
            skill: Some("fishing".into()),
            ms: Some(4200.0),
            ..Default::default()
        }));
        assert_eq!(
            correlator.observe(&cooldown),
            Some(Verdict::Rejected(
                "Fishing is on cooldown (4200ms remaining)".into()
            ))
        );

        let mut correlator = gathering("merchant", Skill::Mining, false);
        let wrong_tool =
            InboundEvent::GameResponse(GameResponseData::Text("skill_cant_wtype".into()));
        assert_eq!(
            correlator.observe(&wrong_tool),
            Some(Verdict::Rejected("We don't have a pickaxe equipped".into()))
        );
    }

    #[test]
    fn gathering_confirms_on_cooldown_signal_and_busy_flag() {
        let mut correlator = gathering("merchant", Skill::Fishing, false);
        let signal = InboundEvent::Eval(EvalData {
            code: "skill_timeout('fishing', 10000)".into(),
        });
        assert_eq!(correlator.observe(&signal), Some(Verdict::Confirmed));

        let mut correlator = gathering("merchant", Skill::Fishing, false);
        assert_eq!(correlator.observe(&busy(Skill::Fishing, true)), None);
        assert_eq!(
            correlator.observe(&busy(Skill::Fishing, false)),
            Some(Verdict::Confirmed)
        );
    }

    #[test]
    fn sale_listing_waits_for_the_full_quantity() {
        let slot = TradeSlot::new(1);
        let mut correlator = sale_listing("merchant", slot, "seashell", 5);

        let mut data = CharacterData::default();
        data.slots.insert(
            slot.name(),
            Some(SlotItem {
                name: "seashell".into(),
                q: Some(2),
                price: Some(10),
                ..Default::default()
            }),
        );
        assert_eq!(correlator.observe(&InboundEvent::Player(data.clone())), None);

        data.slots.insert(
            slot.name(),
            Some(SlotItem {
                name: "seashell".into(),
                q: Some(5),
                price: Some(10),
                ..Default::default()
            }),
        );
        assert_eq!(
            correlator.observe(&InboundEvent::Player(data)),
            Some(Verdict::Confirmed)
        );
    }

    #[test]
    fn sale_listing_only_fails_on_our_cant_equip() {
        let mut correlator = sale_listing("merchant", TradeSlot::new(3), "seashell", 1);
        let theirs = InboundEvent::DisappearingText(DisappearingTextData {
            message: "CAN'T EQUIP".into(),
            id: Some("other".into()),
        });
        let ours = InboundEvent::DisappearingText(DisappearingTextData {
            message: "CAN'T EQUIP".into(),
            id: Some("merchant".into()),
        });
        assert_eq!(correlator.observe(&theirs), None);
        assert_eq!(
            correlator.observe(&ours),
            Some(Verdict::Rejected(
                "We failed listing the item in trade3.".into()
            ))
        );
    }

    #[test]
    fn targeted_skill_rejections_are_scoped_to_the_skill() {
        let mut correlator = skill(Skill::MerchantLuck);
        let other = InboundEvent::GameResponse(GameResponseData::Structured(GameResponse {
            response: "too_far".into(),
            place: Some("attack".into()),
            ..Default::default()
        }));
        assert_eq!(correlator.observe(&other), None);

        let ours = InboundEvent::GameResponse(GameResponseData::Structured(GameResponse {
            response: "too_far".into(),
            place: Some("mluck".into()),
            ..Default::default()
        }));
        assert_eq!(
            correlator.observe(&ours),
            Some(Verdict::Rejected("mluck failed (too_far)".into()))
        );
    }
}
