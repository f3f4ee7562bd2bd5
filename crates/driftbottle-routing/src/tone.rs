// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lexicon heuristics for the emotional register of text.
//!
//! Zero-cost signals: no model call, no network. Used to read the tone of a
//! letter, the tone a recipient asks for in their `custom` preference, and
//! the mood they declare in `emotion`.

use std::collections::BTreeSet;

use driftbottle_core::Tone;

/// Upbeat stems. A trailing `*` marks a bare prefix; other ASCII stems
/// match only with an inflectional ending. CJK stems match anywhere.
const UPBEAT: &[&str] = &[
    "happy", "glad", "joy", "excit*", "grateful", "thank", "love", "lovely", "wonderful",
    "great", "fun", "funny", "hope", "smile", "laugh", "laughter", "celebrat*", "proud",
    "cheer", "uplift*", "bright", "positive", "light-hearted", "嬉し", "楽し", "ありがと",
    "幸せ", "元気",
];

/// Somber stems, matched like [`UPBEAT`].
const SOMBER: &[&str] = &[
    "sad", "lonel*", "alone", "hopeless", "funeral", "tired", "miss", "lost", "grief",
    "griev*", "cry", "hurt", "afraid", "anxious", "worr*", "depress*", "sorrow", "melanchol*",
    "heavy", "serious", "somber", "sombre", "dark", "悲し", "寂し", "辛い", "つらい", "疲れ",
    "不安",
];

/// Endings a whole-word stem may carry.
const INFLECTIONS: &[&str] = &[
    "", "s", "es", "ed", "ing", "er", "ers", "est", "ly", "y", "ful", "fully", "ness",
];

/// Endings that replace a stem's final `y`.
const Y_INFLECTIONS: &[&str] = &["ies", "ied", "ier", "iest", "ily", "iness"];

/// Words that flip a following tone word into something to avoid.
const NEGATIONS: &[&str] = &[
    "no", "not", "nothing", "avoid", "without", "don't", "dont", "never", "none",
];

/// Words too common to count as content keywords.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "you", "your", "with", "that", "this", "are", "was", "but", "have",
    "has", "had", "not", "all", "any", "can", "will", "just", "from", "they", "them", "what",
    "about", "would", "there", "their", "been", "were", "some", "more", "very", "into",
    "letter", "letters", "want", "like", "unset",
];

/// Tone a recipient asks for, read from free text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DesiredTone {
    pub want: Option<Tone>,
    pub avoid: Option<Tone>,
}

/// How badly a letter's tone clashes with what a recipient asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Conflict {
    None,
    /// Asked for a register the letter does not have, but not its opposite.
    Mild,
    /// The letter has the opposite register, or one the recipient asked to avoid.
    Severe,
}

fn stem_matches(word: &str, stem: &str) -> bool {
    if let Some(prefix) = stem.strip_suffix('*') {
        return word.starts_with(prefix);
    }
    if !stem.is_ascii() {
        return word.contains(stem);
    }
    if let Some(rest) = word.strip_prefix(stem) {
        if INFLECTIONS.contains(&rest) {
            return true;
        }
        // "loved", "hoped"
        if rest == "d" && stem.ends_with('e') {
            return true;
        }
        // "sadder", "crying"
        if let Some(last) = stem.chars().last()
            && let Some(doubled) = rest.strip_prefix(last)
            && !doubled.is_empty()
        {
            return INFLECTIONS.contains(&doubled);
        }
        return false;
    }
    // "happiness", "loving"
    let swapped = |ending: char, endings: &[&str]| {
        stem.strip_suffix(ending)
            .and_then(|base| word.strip_prefix(base))
            .is_some_and(|rest| endings.contains(&rest))
    };
    swapped('y', Y_INFLECTIONS) || swapped('e', &["ing"])
}

fn tone_of_word(word: &str) -> Option<Tone> {
    if SOMBER.iter().any(|stem| stem_matches(word, stem)) {
        Some(Tone::Somber)
    } else if UPBEAT.iter().any(|stem| stem_matches(word, stem)) {
        Some(Tone::Upbeat)
    } else {
        None
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// Infers the dominant tone of `text`.
pub fn infer_tone(text: &str) -> Tone {
    let (mut upbeat, mut somber) = (0usize, 0usize);
    let mut previous: Option<String> = None;

    for word in words(text) {
        let negated = previous
            .as_deref()
            .is_some_and(|p| NEGATIONS.contains(&p));
        match (tone_of_word(&word), negated) {
            (Some(Tone::Upbeat), false) | (Some(Tone::Somber), true) => upbeat += 1,
            (Some(Tone::Somber), false) | (Some(Tone::Upbeat), true) => somber += 1,
            _ => {}
        }
        previous = Some(word);
    }

    match upbeat.cmp(&somber) {
        std::cmp::Ordering::Greater => Tone::Upbeat,
        std::cmp::Ordering::Less => Tone::Somber,
        std::cmp::Ordering::Equal => Tone::Neutral,
    }
}

/// Reads a wanted and an avoided tone from a preference description.
///
/// "something cheerful, nothing sad" wants upbeat and avoids somber.
pub fn desired_tone(text: &str) -> DesiredTone {
    let mut desired = DesiredTone::default();
    let mut window: Vec<String> = Vec::new();

    for word in words(text) {
        if let Some(tone) = tone_of_word(&word) {
            let negated = window.iter().any(|w| NEGATIONS.contains(&w.as_str()));
            if negated {
                desired.avoid.get_or_insert(tone);
            } else {
                desired.want.get_or_insert(tone);
            }
        }
        window.push(word);
        if window.len() > 2 {
            window.remove(0);
        }
    }

    if desired.want.is_some() && desired.want == desired.avoid {
        desired.want = None;
    }
    desired
}

/// Content keywords: lowercased words of three or more characters, minus stopwords.
pub fn keywords(text: &str) -> BTreeSet<String> {
    words(text)
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Classifies the clash between a letter tone and a desired tone.
pub fn conflict(letter: Tone, desired: DesiredTone) -> Conflict {
    if desired.avoid == Some(letter) {
        return Conflict::Severe;
    }
    match (desired.want, letter) {
        (Some(Tone::Upbeat), Tone::Somber) | (Some(Tone::Somber), Tone::Upbeat) => {
            Conflict::Severe
        }
        (Some(want), letter) if want != letter && want != Tone::Neutral => Conflict::Mild,
        _ => Conflict::None,
    }
}
