use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::datetime;

use crate::auth::PasskeyVerifier;
use crate::slack::DEFAULT_API_BASE_URL;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where the archive and session live (default: ~/.chatarchive/data)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Channel opened when none is named
    #[serde(default = "default_preferred_channel")]
    pub preferred_channel: String,

    /// Session lifetime in hours
    #[serde(default = "default_auth_ttl_hours")]
    pub auth_ttl_hours: u64,

    /// SHA-256 hex of the admin passkey (ADMIN_PASSKEY_HASH overrides)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_passkey_hash: Option<String>,

    /// SHA-256 hex of the club passkey (CLUB_PASSKEY_HASH overrides)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_passkey_hash: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Pause between per-channel history requests
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Scheduled imports run hourly before this instant and daily afterwards
    #[serde(default = "default_hourly_until", with = "time::serde::rfc3339")]
    pub hourly_until: OffsetDateTime,

    /// Lookback of a manual full fetch
    #[serde(default = "default_full_export_days")]
    pub full_export_days: u32,
}

fn default_preferred_channel() -> String {
    "general".to_string()
}

/// Longest session a config may ask for: one year.
pub const MAX_AUTH_TTL_HOURS: u64 = 24 * 365;

fn default_auth_ttl_hours() -> u64 {
    24
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_delay_ms() -> u64 {
    100
}

fn default_hourly_until() -> OffsetDateTime {
    datetime!(2025-09-15 00:00 UTC)
}

fn default_full_export_days() -> u32 {
    30
}

/// Config and data root: $CHATARCHIVE_HOME or ~/.chatarchive
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("CHATARCHIVE_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME not set")?;
    Ok(PathBuf::from(home).join(".chatarchive"))
}

fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

fn env_hash(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_hash(value: String) -> Result<Option<String>> {
    let Some(hash) = optional(value) else {
        return Ok(None);
    };
    if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("invalid passkey hash: expected 64 hex characters (sha256)");
    }
    Ok(Some(hash.to_ascii_lowercase()))
}

impl Config {
    /// Load config from ~/.chatarchive/config.toml, returning defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save config to ~/.chatarchive/config.toml
    pub fn save(&self) -> Result<PathBuf> {
        let path = config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(config_dir()?.join("data")),
        }
    }

    /// Passkey digests, environment first.
    pub fn verifier(&self) -> PasskeyVerifier {
        PasskeyVerifier::new(
            env_hash("ADMIN_PASSKEY_HASH").or_else(|| self.admin_passkey_hash.clone()),
            env_hash("CLUB_PASSKEY_HASH").or_else(|| self.club_passkey_hash.clone()),
        )
    }

    pub fn auth_ttl(&self) -> time::Duration {
        let hours = self.auth_ttl_hours.min(MAX_AUTH_TTL_HOURS);
        time::Duration::hours(hours as i64)
    }

    pub fn request_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_delay_ms)
    }

    /// Set a key from its string form, as given on the command line.
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        match key {
            "data_dir" => {
                self.data_dir = optional(value).map(PathBuf::from);
            }
            "preferred_channel" | "channel" => {
                let name = value.trim().trim_start_matches('#');
                if name.is_empty() {
                    bail!("invalid preferred_channel: must not be empty");
                }
                self.preferred_channel = name.to_string();
            }
            "auth_ttl_hours" | "ttl" => {
                let hours: u64 = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid auth_ttl_hours: must be a number"))?;
                if !(1..=MAX_AUTH_TTL_HOURS).contains(&hours) {
                    bail!("invalid auth_ttl_hours: must be between 1 and {MAX_AUTH_TTL_HOURS}");
                }
                self.auth_ttl_hours = hours;
            }
            "admin_passkey_hash" => {
                self.admin_passkey_hash = parse_hash(value)?;
            }
            "club_passkey_hash" => {
                self.club_passkey_hash = parse_hash(value)?;
            }
            "api_base_url" | "url" => {
                let url = value.trim();
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    bail!("invalid api_base_url: must start with http:// or https://");
                }
                self.api_base_url = url.trim_end_matches('/').to_string();
            }
            "request_delay_ms" | "delay" => {
                self.request_delay_ms = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid request_delay_ms: must be a number"))?;
            }
            "hourly_until" => {
                self.hourly_until = OffsetDateTime::parse(value.trim(), &Rfc3339)
                    .map_err(|_| anyhow::anyhow!("invalid hourly_until: expected RFC 3339"))?;
            }
            "full_export_days" | "days" => {
                let days: u32 = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid full_export_days: must be a number"))?;
                if days == 0 {
                    bail!("invalid full_export_days: must be at least 1");
                }
                self.full_export_days = days;
            }
            _ => bail!("unknown config key: {key}"),
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            preferred_channel: default_preferred_channel(),
            auth_ttl_hours: default_auth_ttl_hours(),
            admin_passkey_hash: None,
            club_passkey_hash: None,
            api_base_url: default_api_base_url(),
            request_delay_ms: default_request_delay_ms(),
            hourly_until: default_hourly_until(),
            full_export_days: default_full_export_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, hash_passkey};
    use crate::test_utils::{EnvGuard, TempHome, env_lock};

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.preferred_channel, "general");
        assert_eq!(config.auth_ttl_hours, 24);
        assert_eq!(config.api_base_url, "https://slack.com/api");
        assert_eq!(config.request_delay_ms, 100);
        assert_eq!(config.hourly_until.unix_timestamp(), 1_757_894_400);
        assert_eq!(config.full_export_days, 30);
    }

    #[test]
    fn config_partial_parse() {
        let content = "preferred_channel = \"random\"\nhourly_until = \"2026-01-01T00:00:00Z\"\n";
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.preferred_channel, "random");
        assert_eq!(config.hourly_until.year(), 2026);
        assert_eq!(config.auth_ttl_hours, 24);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn config_roundtrip_via_home() {
        let tmp = TempHome::new();

        assert_eq!(Config::load().unwrap(), Config::default());

        let mut config = Config::default();
        config.set("channel", "#dev".to_string()).unwrap();
        config.set("ttl", "48".to_string()).unwrap();
        let path = config.save().unwrap();
        assert_eq!(path, tmp.path().join("config.toml"));

        let loaded = Config::load().unwrap();
        assert_eq!(loaded.preferred_channel, "dev");
        assert_eq!(loaded.auth_ttl_hours, 48);
        assert_eq!(loaded.data_dir().unwrap(), tmp.path().join("data"));
    }

    #[test]
    fn set_validates_values() {
        let mut config = Config::default();
        assert!(config.set("ttl", "0".to_string()).is_err());
        assert!(config.set("admin_passkey_hash", "abc".to_string()).is_err());
        assert!(config.set("api_base_url", "slack.com".to_string()).is_err());
        assert!(config.set("hourly_until", "tomorrow".to_string()).is_err());
        assert!(config.set("nope", "1".to_string()).is_err());

        let hash = hash_passkey("secret").to_ascii_uppercase();
        config.set("admin_passkey_hash", hash.clone()).unwrap();
        assert_eq!(config.admin_passkey_hash, Some(hash.to_ascii_lowercase()));
        config.set("admin_passkey_hash", String::new()).unwrap();
        assert!(config.admin_passkey_hash.is_none());
    }

    #[test]
    fn auth_ttl_is_bounded() {
        let mut config = Config::default();
        assert!(config.set("ttl", "9999999999999999".to_string()).is_err());
        assert!(config.set("ttl", "99999999999999999999999".to_string()).is_err());
        assert_eq!(config.auth_ttl_hours, 24);
        config.set("ttl", MAX_AUTH_TTL_HOURS.to_string()).unwrap();
        assert_eq!(config.auth_ttl(), time::Duration::hours(24 * 365));

        // A hand-edited file is clamped rather than trusted
        let loaded: Config = toml::from_str("auth_ttl_hours = 9999999999999999").unwrap();
        assert_eq!(loaded.auth_ttl(), time::Duration::hours(MAX_AUTH_TTL_HOURS as i64));
    }

    #[test]
    fn env_hashes_override_file() {
        let _lock = env_lock();
        let _admin = EnvGuard::set("ADMIN_PASSKEY_HASH", &hash_passkey("from-env"));
        let _club = EnvGuard::set("CLUB_PASSKEY_HASH", "");
        let config = Config {
            admin_passkey_hash: Some(hash_passkey("from-file")),
            club_passkey_hash: Some(hash_passkey("club")),
            ..Config::default()
        };
        let verifier = config.verifier();
        assert_eq!(verifier.verify("from-env"), Some(Role::Admin));
        assert_eq!(verifier.verify("from-file"), None);
        assert_eq!(verifier.verify("club"), Some(Role::Club));
    }
}
