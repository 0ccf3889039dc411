use std::num::NonZeroU64;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// Process configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    pub mongodb_uri: String,
    pub database_name: String,
    pub bind_address: String,
    pub discord: DiscordConfig,
    pub smtp: SmtpConfig,
    pub notify_interval: Duration,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub token: String,
    pub guild_id: String,
    pub bot_user_id: String,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Config, Error> {
        let _ = dotenvy::dotenv();
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, Error> {
        let optional = |key: &'static str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(Error::MissingConfig { key })
        };

        Ok(Config {
            mongodb_uri: optional("MONGODB_URI", "mongodb://localhost:27017"),
            database_name: optional("DATABASE_NAME", "campaigns"),
            bind_address: optional("BIND_ADDRESS", "127.0.0.1:8080"),
            discord: DiscordConfig {
                token: required("DISCORD_TOKEN")?,
                guild_id: required("DISCORD_GUILD_ID")?,
                bot_user_id: required("DISCORD_BOT_USER_ID")?,
            },
            smtp: SmtpConfig {
                host: optional("SMTP_HOST", "smtp.gmail.com"),
                port: parse("SMTP_PORT", &optional("SMTP_PORT", "465"))?,
                username: required("UPDATES_EMAIL")?,
                password: required("UPDATES_EMAIL_PASSWORD")?,
            },
            notify_interval: Duration::from_secs(
                parse::<NonZeroU64>(
                    "NOTIFY_INTERVAL_SECS",
                    &optional("NOTIFY_INTERVAL_SECS", "86400"),
                )?
                .get(),
            ),
        })
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::MissingConfig { key })
}
