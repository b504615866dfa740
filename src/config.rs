use std::path::PathBuf;
use std::str::FromStr;

use poise::serenity_prelude::{ChannelId, GuildId, RoleId, UserId};

use crate::auth::ModeratorPolicy;
use crate::error::ConfigError;
use crate::lottery::DrawPool;

const DEFAULT_PREFIX: &str = "m!";
const DEFAULT_MODERATORS: [u64; 2] = [259532984909168659, 212687824816701441];
const DEFAULT_TOKEN_FILE: &str = "token.txt";

const DEFAULT_LOTTERY_GUILD: u64 = 259533308512174081;
const DEFAULT_ANNOUNCE_CHANNEL: u64 = 335460607279235072;
const DEFAULT_SUITE_CHANNEL: u64 = 434092857415041024;
const DEFAULT_LOTTERY_ROLE: u64 = 411281455331672064;
const DEFAULT_WINNER_ROLE: u64 = 335456437352529921;
const SUITE_BITRATE: u64 = 64000;

pub(crate) struct Config {
    pub prefix: String,
    pub moderators: ModeratorPolicy,
    pub token_path: PathBuf,
    pub lottery: LotteryConfig,
}

/// The fixed guild objects the role lottery works on.
#[derive(Debug, Clone)]
pub(crate) struct LotteryConfig {
    pub guild: GuildId,
    pub announce_channel: ChannelId,
    pub suite_channel: ChannelId,
    pub lottery_role: RoleId,
    pub winner_role: RoleId,
    pub suite_bitrate: u64,
    pub draw_pool: DrawPool,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup`, falling back to defaults for unset keys.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let prefix = lookup("BOT_PREFIX")
            .filter(|prefix| !prefix.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        let moderators = match lookup("BOT_MODERATORS") {
            Some(list) => parse_id_list("BOT_MODERATORS", &list)?,
            None => DEFAULT_MODERATORS.to_vec(),
        };

        let token_path = match lookup("TOKEN_FILE") {
            Some(path) => PathBuf::from(path),
            None => default_token_path(),
        };

        let lottery = LotteryConfig {
            guild: GuildId(parse_or(&lookup, "LOTTERY_GUILD_ID", DEFAULT_LOTTERY_GUILD)?),
            announce_channel: ChannelId(parse_or(
                &lookup,
                "LOTTERY_ANNOUNCE_CHANNEL_ID",
                DEFAULT_ANNOUNCE_CHANNEL,
            )?),
            suite_channel: ChannelId(parse_or(
                &lookup,
                "LOTTERY_SUITE_CHANNEL_ID",
                DEFAULT_SUITE_CHANNEL,
            )?),
            lottery_role: RoleId(parse_or(&lookup, "LOTTERY_ROLE_ID", DEFAULT_LOTTERY_ROLE)?),
            winner_role: RoleId(parse_or(
                &lookup,
                "LOTTERY_WINNER_ROLE_ID",
                DEFAULT_WINNER_ROLE,
            )?),
            suite_bitrate: SUITE_BITRATE,
            draw_pool: parse_or(&lookup, "LOTTERY_DRAW_POOL", DrawPool::default())?,
        };

        Ok(Self {
            prefix,
            moderators: ModeratorPolicy::new(moderators.into_iter().map(UserId)),
            token_path,
            lottery,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

fn parse_id_list(key: &'static str, list: &str) -> Result<Vec<u64>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse().map_err(|_| ConfigError::InvalidValue {
                key,
                value: id.to_string(),
            })
        })
        .collect()
}

// The token lives next to the executable unless told otherwise.
fn default_token_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_TOKEN_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE))
}
