// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment extraction failures into miette diagnostics.
//!
//! Unknown keys are checked against [`KEYS`], so a key written under the
//! wrong section points at the section that owns it, and near misses get a
//! Jaro-Winkler "did you mean".

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::Diagnostic;
use thiserror::Error;

use crate::model::{KEYS, section_keys};

/// Minimum Jaro-Winkler similarity score to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key or section the relay does not know.
    #[error("unknown configuration key `{}` ({})", dotted(section.as_deref(), key), origin)]
    #[diagnostic(
        code(driftbottle::config::unknown_key),
        help("{}", unknown_key_help(section.as_deref(), suggestion.as_deref()))
    )]
    UnknownKey {
        key: String,
        /// `None` for a top-level entry, which can only be a section.
        section: Option<String>,
        /// Full dotted path of the closest valid key.
        suggestion: Option<String>,
        /// File or environment the key came from.
        origin: String,
    },

    /// A configuration value has the wrong type.
    #[error("invalid type for key `{key}` ({origin}): {detail}")]
    #[diagnostic(
        code(driftbottle::config::invalid_type),
        help("expected {}, or set {}", expected, env_var(key))
    )]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        origin: String,
    },

    /// A value has the right type but is out of range or not a known variant,
    /// e.g. `mode = "eventually"`.
    #[error("unsupported value for key `{key}` ({origin}): {detail}")]
    #[diagnostic(code(driftbottle::config::invalid_value))]
    InvalidValue {
        key: String,
        detail: String,
        origin: String,
    },

    /// A semantic validation failure.
    #[error("validation error: {message}")]
    #[diagnostic(code(driftbottle::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(driftbottle::config::other))]
    Other(String),
}

fn dotted(section: Option<&str>, key: &str) -> String {
    match section {
        Some(section) => format!("{section}.{key}"),
        None => key.to_string(),
    }
}

/// Environment variable the loader maps onto `key`.
pub fn env_var(key: &str) -> String {
    format!("DRIFTBOTTLE_{}", key.replace('.', "_").to_ascii_uppercase())
}

fn unknown_key_help(section: Option<&str>, suggestion: Option<&str>) -> String {
    let valid = match section {
        None => format!(
            "sections are {}",
            KEYS.iter()
                .map(|(name, _)| format!("[{name}]"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Some(section) => format!(
            "[{section}] accepts {}",
            section_keys(section).unwrap_or_default().join(", ")
        ),
    };
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {valid}"),
        None => valid,
    }
}

/// Closest valid dotted key for `field` written under `section`.
///
/// An exact key owned by another section wins over a fuzzy match in the
/// section it was written under.
pub fn suggest_key(section: Option<&str>, field: &str) -> Option<String> {
    let Some(section) = section else {
        return closest(field, KEYS.iter().map(|(name, _)| *name));
    };

    if let Some((owner, _)) = KEYS
        .iter()
        .find(|(name, keys)| *name != section && keys.contains(&field))
    {
        return Some(format!("{owner}.{field}"));
    }

    let keys = section_keys(section)?;
    closest(field, keys.iter().copied()).map(|key| format!("{section}.{key}"))
}

fn closest<'a>(field: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    candidates
        .map(|candidate| (strsim::jaro_winkler(field, candidate), candidate))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

fn origin(error: &figment::error::Error) -> String {
    match &error.metadata {
        Some(metadata) => match &metadata.source {
            Some(source) => source.to_string(),
            None => metadata.name.to_string(),
        },
        None => "defaults".to_string(),
    }
}

/// Convert a `figment::Error` into a list of `ConfigError` diagnostics.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<&str> = error.path.iter().map(String::as_str).collect();
            let key = path.join(".");
            let origin = origin(&error);

            match &error.kind {
                Kind::UnknownField(field, _) => {
                    let section = path.first().map(|s| s.to_string());
                    ConfigError::UnknownKey {
                        suggestion: suggest_key(section.as_deref(), field),
                        key: field.clone(),
                        section,
                        origin,
                    }
                }
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    detail: format!("found {actual}, expected {expected}"),
                    expected: expected.clone(),
                    key,
                    origin,
                },
                Kind::InvalidValue(actual, expected) => ConfigError::InvalidValue {
                    detail: format!("found {actual}, expected {expected}"),
                    key,
                    origin,
                },
                Kind::UnknownVariant(variant, expected) => ConfigError::InvalidValue {
                    detail: format!("`{variant}` is not one of {}", expected.join(", ")),
                    key,
                    origin,
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
