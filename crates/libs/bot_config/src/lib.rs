use serde::{Deserialize, Serialize};

/// Where to reach the game bridge and which character to drive through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub host: String,
    pub port: u16,

    pub character: String,
    pub owner: String,

    pub server_region: String,
    pub server_identifier: String,
}

impl BotConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// e.g. `US I`
    pub fn server(&self) -> String {
        format!("{} {}", self.server_region, self.server_identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_from_a_toml_table() {
        let config: BotConfig = toml::from_str(
            r#"
            host = "127.0.0.1"
            port = 8022
            character = "Seller"
            owner = "1234"
            server_region = "EU"
            server_identifier = "II"
            "#,
        )
        .unwrap();
        assert_eq!(config.address(), "127.0.0.1:8022");
        assert_eq!(config.server(), "EU II");
    }
}
