// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `driftbottle pending` and `driftbottle config`.

use driftbottle_config::DriftbottleConfig;
use driftbottle_core::DriftbottleError;
use driftbottle_store::UnresolvedLetter;

use crate::serve::open_registry;

/// Prints letters still waiting for routing or that reached nobody.
pub async fn run_pending(config: &DriftbottleConfig) -> Result<(), DriftbottleError> {
    let registry = open_registry(config, false).await?;
    let pending = registry.unresolved_letters().await;

    if pending.is_empty() {
        println!("no unresolved letters");
        return Ok(());
    }
    for letter in &pending {
        println!("{}", format_unresolved(letter));
    }
    println!("{} unresolved letter(s)", pending.len());
    Ok(())
}

fn format_unresolved(letter: &UnresolvedLetter) -> String {
    let reason = if letter.reason.is_empty() {
        "-"
    } else {
        letter.reason.as_str()
    };
    format!(
        "{}  {}  {:<26}  from={}  {}",
        letter.date_sent.format("%Y-%m-%d %H:%M:%S"),
        letter.letter_id,
        letter.state.as_token(),
        letter.sender_id,
        reason
    )
}

/// Prints the effective configuration with secrets redacted.
pub fn run_config(config: &DriftbottleConfig) -> Result<(), DriftbottleError> {
    print!("{}", render_config(config)?);
    Ok(())
}

fn render_config(config: &DriftbottleConfig) -> Result<String, DriftbottleError> {
    let mut shown = config.clone();
    if shown.anthropic.api_key.is_some() {
        shown.anthropic.api_key = Some("[redacted]".to_string());
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| DriftbottleError::Internal(format!("failed to render config: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use driftbottle_core::{LetterId, RecipientState, UserId};

    use super::*;

    #[test]
    fn config_output_redacts_api_key() {
        let mut config = DriftbottleConfig::default();
        config.anthropic.api_key = Some("sk-secret".to_string());
        let rendered = render_config(&config).unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[redacted]"));
        assert!(rendered.contains("[routing]"));
    }

    #[test]
    fn unresolved_line_shows_state_and_sender() {
        let letter = UnresolvedLetter {
            letter_id: LetterId::from("l-1"),
            sender_id: UserId::from("alice"),
            state: RecipientState::NoSuitableRecipient,
            date_sent: Utc::now(),
            reason: String::new(),
        };
        let line = format_unresolved(&letter);
        assert!(line.contains("l-1"));
        assert!(line.contains("no_suitable_recipient"));
        assert!(line.contains("from=alice"));
        assert!(line.ends_with('-'));
    }
}
