// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every violation instead of stopping at the first one.

use crate::diagnostic::ConfigError;
use crate::model::DriftbottleConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Ten years.
pub const MAX_COOLDOWN_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &DriftbottleConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.service.log_level.to_ascii_lowercase().as_str()) {
        fail(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if let Some(path) = &config.service.log_file
        && path.trim().is_empty()
    {
        fail("service.log_file must not be empty when set".to_string());
    }

    let storage = &config.storage;
    if storage.data_dir.trim().is_empty() {
        fail("storage.data_dir must not be empty".to_string());
    }
    for (key, value) in [
        ("storage.users_file", &storage.users_file),
        ("storage.letters_file", &storage.letters_file),
    ] {
        if value.trim().is_empty() {
            fail(format!("{key} must not be empty"));
        } else if value.contains('/') || value.contains('\\') {
            fail(format!("{key} `{value}` must be a bare file name"));
        }
    }
    if storage.users_file.trim() == storage.letters_file.trim() {
        fail(format!(
            "storage.users_file and storage.letters_file must differ, both are `{}`",
            storage.users_file
        ));
    }

    if config.mailbox.cooldown_secs > MAX_COOLDOWN_SECS {
        fail(format!(
            "mailbox.cooldown_secs `{}` must be at most {MAX_COOLDOWN_SECS}",
            config.mailbox.cooldown_secs
        ));
    }

    if config.routing.queue_capacity < 1 {
        fail("routing.queue_capacity must be at least 1".to_string());
    }

    if config.anthropic.max_tokens < 1 {
        fail("anthropic.max_tokens must be at least 1".to_string());
    }
    if config.anthropic.model.trim().is_empty() {
        fail("anthropic.model must not be empty".to_string());
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        fail("gateway.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
