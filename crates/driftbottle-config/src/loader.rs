// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./driftbottle.toml` > `~/.config/driftbottle/driftbottle.toml`
//! > `/etc/driftbottle/driftbottle.toml` with environment variable overrides via
//! the `DRIFTBOTTLE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::{DriftbottleConfig, KEYS};

pub(crate) const LOCAL_CONFIG: &str = "driftbottle.toml";
pub(crate) const SYSTEM_CONFIG: &str = "/etc/driftbottle/driftbottle.toml";

/// Path of the per-user config file, if the platform has a config dir.
pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("driftbottle").join(LOCAL_CONFIG))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/driftbottle/driftbottle.toml` (system-wide)
/// 3. `~/.config/driftbottle/driftbottle.toml` (user XDG config)
/// 4. `./driftbottle.toml` (local directory)
/// 5. `DRIFTBOTTLE_*` environment variables
pub fn load_config() -> Result<DriftbottleConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<DriftbottleConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DriftbottleConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DriftbottleConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DriftbottleConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(DriftbottleConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `DRIFTBOTTLE_MAILBOX_COOLDOWN_SECS` must become
/// `mailbox.cooldown_secs`, not `mailbox.cooldown.secs`.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("DRIFTBOTTLE_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for (section, _) in KEYS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
