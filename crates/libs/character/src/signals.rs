//! The evaluated-code channel.
//!
//! The server starts a skill's cooldown by asking the client to evaluate
//! `skill_timeout('<skill>', <ms>)`. That is the only signal some skills give
//! that they actually went off, so it is parsed here and nowhere else.

use regex::Regex;
use std::sync::LazyLock;

use crate::protocol::Skill;

static SKILL_TIMEOUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"skill_timeout\s*\(\s*['"]([a-z_]+)['"]\s*,?\s*(\d+(?:\.\d+)?)?\s*\)"#)
        .expect("valid skill_timeout regex")
});

/// A `skill_timeout(...)` call found in an eval payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CooldownSignal {
    pub skill: String,
    pub ms: Option<f64>,
}

impl CooldownSignal {
    /// Every cooldown started by one eval payload, in order.
    pub fn parse_all(code: &str) -> Vec<CooldownSignal> {
        SKILL_TIMEOUT_RE
            .captures_iter(code)
            .map(|captures| CooldownSignal {
                skill: captures[1].to_string(),
                ms: captures.get(2).and_then(|ms| ms.as_str().parse().ok()),
            })
            .collect()
    }
}

/// Whether the eval payload starts the cooldown of `skill`.
pub fn cooldown_started(code: &str, skill: Skill) -> bool {
    CooldownSignal::parse_all(code)
        .iter()
        .any(|signal| signal.skill == skill.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_named_skill_only() {
        assert!(cooldown_started("skill_timeout('fishing', 12000)", Skill::Fishing));
        assert!(cooldown_started("skill_timeout(\"mining\")", Skill::Mining));
        assert!(!cooldown_started("skill_timeout('fishing', 12000)", Skill::Mining));
        assert!(!cooldown_started("pcs(); draw_trigger('fishing')", Skill::Fishing));
    }

    #[test]
    fn extracts_the_cooldown_length() {
        let signals = CooldownSignal::parse_all(
            "skill_timeout ( 'mluck' , 100.5 ); skill_timeout('mcourage')",
        );
        assert_eq!(
            signals,
            vec![
                CooldownSignal {
                    skill: "mluck".into(),
                    ms: Some(100.5)
                },
                CooldownSignal {
                    skill: "mcourage".into(),
                    ms: None
                },
            ]
        );
    }
}
