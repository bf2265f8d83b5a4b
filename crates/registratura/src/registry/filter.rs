//! Spam and duplicate detection for inbound messages.

use std::collections::HashSet;

use crate::db::{claim_repo, registry_repo, Database, DatabaseError};

/// Single words typical of promotional or scam mail (diacritics folded).
/// Matched against whole words, so each entry is one inflection.
const SPAM_KEYWORDS: &[&str] = &[
    "gratuit",
    "castiga",
    "premiu",
    "oferta",
    "reducere",
    "promotie",
    "loterie",
    "bonus",
    "casino",
    "pariuri",
    "viagra",
    "bitcoin",
    "crypto",
    "investitie",
    "imprumut",
    "lottery",
    "winner",
    "prize",
    "free",
    "discount",
    "unsubscribe",
    "dezabonare",
];

/// Multi-word phrases; each match weighs more than a keyword.
const SPAM_PHRASES: &[&str] = &[
    "click aici",
    "click here",
    "oferta limitata",
    "oferta speciala",
    "ai castigat",
    "castiga acum",
    "bani rapid",
    "credit rapid",
    "fara obligatii",
    "100% gratuit",
    "you have won",
    "act now",
    "limited time",
    "make money",
    "risk free",
];

const KEYWORD_THRESHOLD: usize = 3;
const PHRASE_THRESHOLD: usize = 2;
const CAPS_RATIO_THRESHOLD: f64 = 0.5;
const CAPS_MIN_SUBJECT_LEN: usize = 10;
const EXCLAMATION_THRESHOLD: usize = 3;

/// Lowercases and strips Romanian diacritics so "Câștigă" matches "castiga".
fn fold(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'ă' | 'â' => 'a',
            'î' => 'i',
            'ș' | 'ş' => 's',
            'ț' | 'ţ' => 't',
            other => other,
        })
        .collect()
}

/// Share of uppercase characters in `subject`, over all characters.
fn caps_ratio(subject: &str) -> f64 {
    let total = subject.chars().count();
    if total == 0 {
        return 0.0;
    }
    let upper = subject.chars().filter(|c| c.is_uppercase()).count();
    upper as f64 / total as f64
}

/// Classifies a message as spam from its subject and body.
///
/// Spam when any holds: three or more keywords, two or more phrases, a
/// mostly-uppercase subject longer than ten characters, or three or more
/// exclamation marks in the subject. Pure and deterministic.
pub fn is_spam(subject: &str, body: &str) -> bool {
    let text = fold(&format!("{} {}", subject, body));

    let words: HashSet<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let keyword_hits = SPAM_KEYWORDS.iter().filter(|k| words.contains(*k)).count();
    if keyword_hits >= KEYWORD_THRESHOLD {
        return true;
    }

    let phrase_hits = SPAM_PHRASES.iter().filter(|p| text.contains(*p)).count();
    if phrase_hits >= PHRASE_THRESHOLD {
        return true;
    }

    let subject_len = subject.chars().count();
    if subject_len > CAPS_MIN_SUBJECT_LEN && caps_ratio(subject) > CAPS_RATIO_THRESHOLD {
        return true;
    }

    subject.matches('!').count() >= EXCLAMATION_THRESHOLD
}

/// Returns true if a message with this id already produced a record. A
/// claim still in flight is not a duplicate. An empty id is never one.
pub fn is_duplicate(db: &Database, message_id: &str) -> Result<bool, DatabaseError> {
    let message_id = message_id.trim();
    if message_id.is_empty() {
        return Ok(false);
    }
    if registry_repo::exists_by_message_id(db, message_id)? {
        return Ok(true);
    }
    Ok(claim_repo::find(db, message_id)?.is_some_and(|claim| claim.record_id.is_some()))
}
