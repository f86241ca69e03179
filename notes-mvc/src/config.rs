use std::sync::OnceLock;

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,

    // validation
    #[serde(default = "default_title_max_length")]
    pub title_max_length: u64,
    #[serde(default = "default_content_max_length")]
    pub content_max_length: u64,

    #[serde(default)]
    pub log_json: bool,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4000
}

fn default_database_url() -> String {
    "sqlite.db".into()
}

fn default_title_max_length() -> u64 {
    10
}

fn default_content_max_length() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            title_max_length: default_title_max_length(),
            content_max_length: default_content_max_length(),
            log_json: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Self>()
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Loads the configuration once. Later calls return the already loaded value.
pub fn init_config() -> Result<&'static Config, envy::Error> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.port, 4000);
        assert_eq!(config.title_max_length, 10);
        assert_eq!(config.content_max_length, 1000);
        assert!(!config.log_json);
    }

    #[test]
    fn reads_overrides_from_vars() {
        let vars = vec![
            ("PORT".to_string(), "8080".to_string()),
            ("TITLE_MAX_LENGTH".to_string(), "20".to_string()),
            ("LOG_JSON".to_string(), "true".to_string()),
        ];
        let config = envy::from_iter::<_, Config>(vars).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.title_max_length, 20);
        assert_eq!(config.content_max_length, 1000);
        assert!(config.log_json);
    }
}
