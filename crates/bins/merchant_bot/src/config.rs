use bot_config::BotConfig;
use character::ActionTimeouts;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Represents the top-level configuration from the TOML file.
#[derive(Debug, Serialize, Deserialize)]
pub struct MerchantBotConfig {
    /// Corresponds to the `[bot_config]` table in the TOML file.
    pub bot_config: BotConfig,

    /// Corresponds to the `[merchant_bot_config]` table in the TOML file.
    pub merchant_bot_config: MerchantBotSpecificConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MerchantBotSpecificConfig {
    #[serde(default = "default_database_uri")]
    pub database_uri: String,

    /// Steps repeated in order for as long as the bot runs.
    pub routine: Vec<RoutineStep>,

    /// Pause between two routine steps.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,

    /// Minimum time between two snapshots of our character.
    #[serde(default = "default_persist_interval_ms")]
    pub persist_interval_ms: u64,

    /// JSON file with the item definitions (stack sizes). Without it, listings
    /// are never merged.
    #[serde(default)]
    pub game_data: Option<PathBuf>,

    #[serde(default)]
    pub timeouts: ActionTimeouts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineStep {
    Fish,
    Mine,
    MassProduction,
    MerchantCourage,
    /// Mluck the nearest player in range, or ourselves.
    MluckNearby,
    /// List our biggest stack of `item` at `price` each.
    Sell { item: String, price: u64 },
}

fn default_database_uri() -> String {
    database::DEFAULT_URI.to_string()
}

fn default_step_delay_ms() -> u64 {
    1_000
}

fn default_persist_interval_ms() -> u64 {
    60_000
}
