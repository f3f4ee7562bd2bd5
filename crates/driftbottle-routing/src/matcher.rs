// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient matcher.
//!
//! Heuristic mode scores every candidate locally. Oracle mode narrows the
//! pool the same way and lets the classifier choose among the fairest tier.
//! Neither mode validates the pick; the dispatcher does that under the lock.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use driftbottle_core::{Candidate, Tone, UserId};

use crate::oracle::{Oracle, OracleVerdict};
use crate::tone::{self, Conflict};

/// Score given to a candidate who accepts anything.
const UNIVERSAL_BASELINE: i32 = 2;
/// Bonus when the recipient asked for exactly the letter's tone.
const TONE_MATCH: i32 = 3;
/// Bonus per shared content keyword, counted up to `MAX_KEYWORD_HITS`.
const KEYWORD_HIT: i32 = 2;
const MAX_KEYWORD_HITS: usize = 3;
/// Bonus when the declared mood shares the letter's tone.
const MOOD_COLOUR: i32 = 1;
const MILD_PENALTY: i32 = 1;
const SEVERE_PENALTY: i32 = 5;

/// The text being matched.
#[derive(Debug, Clone, Copy)]
pub struct LetterText<'a> {
    pub title: &'a str,
    pub content: &'a str,
}

impl LetterText<'_> {
    pub fn joined(&self) -> String {
        format!("{}\n{}", self.title, self.content)
    }
}

/// What the matcher decided, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub pick: Option<UserId>,
    pub reason: String,
    pub tone: Tone,
}

/// Per-candidate scoring detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scored {
    pub candidate: Candidate,
    pub alignment: i32,
    pub conflict: Conflict,
}

impl Scored {
    fn severe(&self) -> bool {
        self.conflict == Conflict::Severe
    }
}

/// How candidates are chosen.
#[derive(Clone, Default)]
pub enum RecipientMatcher {
    #[default]
    Heuristic,
    Oracle(Arc<Oracle>),
}

/// Scores one candidate against a letter's tone and keywords.
pub fn score(candidate: &Candidate, letter_tone: Tone, letter_keywords: &BTreeSet<String>) -> Scored {
    let prefs = &candidate.preferences;
    let mood_bonus = if !prefs.emotion_unset()
        && letter_tone != Tone::Neutral
        && tone::infer_tone(&prefs.emotion) == letter_tone
    {
        MOOD_COLOUR
    } else {
        0
    };

    if prefs.accepts_anything() {
        return Scored {
            candidate: candidate.clone(),
            alignment: UNIVERSAL_BASELINE + mood_bonus,
            conflict: Conflict::None,
        };
    }

    let desired = tone::desired_tone(&prefs.custom);
    let conflict = tone::conflict(letter_tone, desired);
    let shared = tone::keywords(&prefs.custom)
        .intersection(letter_keywords)
        .count()
        .min(MAX_KEYWORD_HITS);

    let mut alignment = mood_bonus + KEYWORD_HIT * shared as i32;
    if desired.want == Some(letter_tone) {
        alignment += TONE_MATCH;
    }
    alignment -= match conflict {
        Conflict::None => 0,
        Conflict::Mild => MILD_PENALTY,
        Conflict::Severe => SEVERE_PENALTY,
    };

    Scored {
        candidate: candidate.clone(),
        alignment,
        conflict,
    }
}

/// Scores, filters, and ranks the pool.
///
/// Returns the ranked list and whether the conflict filter had to be
/// abandoned because it removed everyone.
pub fn rank(letter: LetterText<'_>, candidates: &[Candidate]) -> (Tone, Vec<Scored>, bool) {
    let text = letter.joined();
    let letter_tone = tone::infer_tone(&text);
    let letter_keywords = tone::keywords(&text);

    let scored: Vec<Scored> = candidates
        .iter()
        .map(|c| score(c, letter_tone, &letter_keywords))
        .collect();

    let filtered: Vec<Scored> = scored.iter().filter(|s| !s.severe()).cloned().collect();
    let (mut pool, fell_back) = if filtered.is_empty() {
        (scored, true)
    } else {
        (filtered, false)
    };

    pool.sort_by(|a, b| {
        let key = |s: &Scored| {
            (
                s.severe(),
                s.candidate.received_count,
                Reverse(s.alignment),
            )
        };
        key(a)
            .cmp(&key(b))
            .then_with(|| a.candidate.user_id.cmp(&b.candidate.user_id))
    });

    (letter_tone, pool, fell_back)
}

impl RecipientMatcher {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::Oracle(_) => "oracle",
        }
    }

    /// Picks at most one recipient for the letter.
    pub async fn match_letter(&self, letter: LetterText<'_>, candidates: &[Candidate]) -> MatchOutcome {
        if candidates.is_empty() {
            return MatchOutcome {
                pick: None,
                reason: "no other users registered".to_string(),
                tone: tone::infer_tone(&letter.joined()),
            };
        }

        let (letter_tone, ranked, fell_back) = rank(letter, candidates);
        let fallback_note = if fell_back {
            "; every candidate conflicted, filter relaxed"
        } else {
            ""
        };

        match self {
            Self::Heuristic => {
                let Some(best) = ranked.first() else {
                    return MatchOutcome {
                        pick: None,
                        reason: "no candidate qualified".to_string(),
                        tone: letter_tone,
                    };
                };
                debug!(
                    pick = %best.candidate.user_id,
                    alignment = best.alignment,
                    received = best.candidate.received_count,
                    "heuristic match"
                );
                MatchOutcome {
                    pick: Some(best.candidate.user_id.clone()),
                    reason: format!(
                        "{letter_tone} letter; fewest received ({}), alignment {}{fallback_note}",
                        best.candidate.received_count, best.alignment
                    ),
                    tone: letter_tone,
                }
            }
            Self::Oracle(oracle) => {
                let shortlist = fairest_tier(&ranked);
                match oracle.pick_recipient(&letter.joined(), &shortlist).await {
                    OracleVerdict::Matched { id, reason } => MatchOutcome {
                        pick: Some(id),
                        reason: format!("{reason}{fallback_note}"),
                        tone: letter_tone,
                    },
                    OracleVerdict::NoMatch { reason } => MatchOutcome {
                        pick: None,
                        reason,
                        tone: letter_tone,
                    },
                    OracleVerdict::Blocked { reason } | OracleVerdict::Unavailable { reason } => {
                        warn!(%reason, "oracle matcher produced no pick");
                        MatchOutcome {
                            pick: None,
                            reason: format!("matcher unavailable: {reason}"),
                            tone: letter_tone,
                        }
                    }
                }
            }
        }
    }
}

/// Candidates sharing the best (severity, received count) key.
fn fairest_tier(ranked: &[Scored]) -> Vec<Candidate> {
    let Some(head) = ranked.first() else {
        return Vec::new();
    };
    ranked
        .iter()
        .take_while(|s| {
            s.severe() == head.severe() && s.candidate.received_count == head.candidate.received_count
        })
        .map(|s| s.candidate.clone())
        .collect()
}
