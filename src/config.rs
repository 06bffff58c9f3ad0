use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::constants::DEFAULT_SESSION_TTL_HOURS;
use crate::srs::SchedulerSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub cors_origin: String,
    pub session_ttl_hours: i64,
    pub worker: WorkerConfig,
    /// Process-wide scheduler defaults; requests may override per call.
    pub scheduler: SchedulerSettings,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/lingo.sled"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            session_ttl_hours: env_or_parse("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS),
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
                enable_store_flush: env_or_bool("ENABLE_STORE_FLUSH", true),
            },
            scheduler: scheduler_from_env(),
        }
    }
}

/// Only one process per sled directory should run the background jobs.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
    pub enable_store_flush: bool,
}

fn scheduler_from_env() -> SchedulerSettings {
    let defaults = SchedulerSettings::default();
    let settings = SchedulerSettings {
        max_new_cards_per_day: env_or_parse(
            "SRS_MAX_NEW_CARDS_PER_DAY",
            defaults.max_new_cards_per_day,
        ),
        max_reviews_per_day: env_or_parse("SRS_MAX_REVIEWS_PER_DAY", defaults.max_reviews_per_day),
        easy_bonus: env_or_parse("SRS_EASY_BONUS", defaults.easy_bonus),
        hard_penalty: env_or_parse("SRS_HARD_PENALTY", defaults.hard_penalty),
        graduating_interval: env_or_parse("SRS_GRADUATING_INTERVAL", defaults.graduating_interval),
        easy_interval: env_or_parse("SRS_EASY_INTERVAL", defaults.easy_interval),
        maximum_interval: env_or_parse("SRS_MAXIMUM_INTERVAL", defaults.maximum_interval),
        minimum_interval: env_or_parse("SRS_MINIMUM_INTERVAL", defaults.minimum_interval),
    };

    match settings.validate() {
        Ok(()) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid SRS_* settings, using defaults");
            defaults
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
