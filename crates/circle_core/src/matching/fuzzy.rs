//! Weighted fuzzy scoring of two candidate identities.
//!
//! Score composition:
//! - exact email (trimmed, case-insensitive): `+0.5`
//! - equal normalized phone numbers: `+0.4`
//! - name similarity: up to `+0.5`
//!
//! The total is capped at `1.0`. Every contributing rule adds a reason string.

use crate::matching::nicknames::NicknameTable;
use serde::Serialize;
use strsim::normalized_levenshtein;

/// Minimum confidence for a candidate to count as a match.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

const EMAIL_WEIGHT: f64 = 0.5;
const PHONE_WEIGHT: f64 = 0.4;
const NAME_SCORE_MAX: f64 = 0.5;
const LAST_NAME_WEIGHT: f64 = 0.25;
const FIRST_NAME_STRONG_WEIGHT: f64 = 0.25;
const FIRST_NAME_WEAK_WEIGHT: f64 = 0.15;
const TOKEN_SUBSET_FLOOR: f64 = 0.2;
const WHOLE_NAME_FLOOR: f64 = 0.3;
const SIMILARITY_CUTOFF: f64 = 0.8;
const MIN_PREFIX_CHARS: usize = 3;

/// Identity fields compared by the matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCandidate {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl MatchCandidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            phone: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Confidence in `[0, 1]` plus the rules that contributed to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchResult {
    pub confidence: f64,
    pub reasons: Vec<String>,
}

/// One ranked candidate with its caller-supplied key.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedMatch<K> {
    pub key: K,
    pub result: MatchResult,
}

/// Strips non-digits and drops a leading US country code from 11-digit numbers.
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        return digits[1..].to_string();
    }
    digits
}

/// Whether two phone numbers are equal after normalization and non-empty.
pub fn phones_match(a: &str, b: &str) -> bool {
    let a = normalize_phone(a);
    !a.is_empty() && a == normalize_phone(b)
}

/// Fuzzy identity matcher over an injected nickname table.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    nicknames: NicknameTable,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(NicknameTable::standard())
    }
}

impl FuzzyMatcher {
    pub fn new(nicknames: NicknameTable) -> Self {
        Self { nicknames }
    }

    /// Scores how likely `a` and `b` describe the same person.
    pub fn calculate_match_score(&self, a: &MatchCandidate, b: &MatchCandidate) -> MatchResult {
        let mut confidence = 0.0;
        let mut reasons = Vec::new();

        if let (Some(left), Some(right)) = (normalized_email(&a.email), normalized_email(&b.email))
        {
            if left == right {
                confidence += EMAIL_WEIGHT;
                reasons.push("email match".to_string());
            }
        }

        if let (Some(left), Some(right)) = (a.phone.as_deref(), b.phone.as_deref()) {
            if phones_match(left, right) {
                confidence += PHONE_WEIGHT;
                reasons.push("phone match".to_string());
            }
        }

        let (name_score, name_reasons) = self.name_score(&a.name, &b.name);
        if name_score > 0.0 {
            confidence += name_score;
            reasons.extend(name_reasons);
        }

        MatchResult {
            confidence: confidence.min(1.0),
            reasons,
        }
    }

    /// Name similarity bounded to `[0, 0.5]` with the contributing reasons.
    ///
    /// A blank name on either side scores 0, even when both are blank; two
    /// nameless candidates are only matched through email or phone.
    pub fn name_score(&self, a: &str, b: &str) -> (f64, Vec<String>) {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();
        if a.is_empty() || b.is_empty() {
            return (0.0, Vec::new());
        }
        if a == b {
            return (NAME_SCORE_MAX, vec!["exact name match".to_string()]);
        }

        let tokens_a: Vec<&str> = a.split_whitespace().collect();
        let tokens_b: Vec<&str> = b.split_whitespace().collect();
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if let (Some(last_a), Some(last_b)) = (last_name(&tokens_a), last_name(&tokens_b)) {
            if last_a == last_b {
                score += LAST_NAME_WEIGHT;
                reasons.push("last name match".to_string());
            }
        }

        if let (Some(first_a), Some(first_b)) = (tokens_a.first(), tokens_b.first()) {
            if let Some((weight, reason)) = self.first_name_rule(first_a, first_b) {
                score += weight;
                reasons.push(reason.to_string());
            }
        }

        if tokens_a.len() != tokens_b.len() && score < TOKEN_SUBSET_FLOOR {
            let (shorter, longer) = if tokens_a.len() < tokens_b.len() {
                (&tokens_a, &tokens_b)
            } else {
                (&tokens_b, &tokens_a)
            };
            if shorter.iter().all(|token| longer.contains(token)) {
                score = TOKEN_SUBSET_FLOOR;
                reasons.push("name tokens contained".to_string());
            }
        }

        if score < WHOLE_NAME_FLOOR && normalized_levenshtein(&a, &b) > SIMILARITY_CUTOFF {
            score = WHOLE_NAME_FLOOR;
            reasons.push("similar full name".to_string());
        }

        (score.min(NAME_SCORE_MAX), reasons)
    }

    /// Scores every candidate against `target`, keeping those at or above
    /// `threshold`, sorted by descending confidence with stable ties.
    pub fn find_matches_for_friend<K: Clone>(
        &self,
        target: &MatchCandidate,
        candidates: &[(K, MatchCandidate)],
        threshold: f64,
    ) -> Vec<RankedMatch<K>> {
        let mut matches: Vec<RankedMatch<K>> = candidates
            .iter()
            .map(|(key, candidate)| RankedMatch {
                key: key.clone(),
                result: self.calculate_match_score(target, candidate),
            })
            .filter(|ranked| ranked.result.confidence >= threshold)
            .collect();
        matches.sort_by(|left, right| right.result.confidence.total_cmp(&left.result.confidence));
        matches
    }

    /// First applicable first-name rule: exact, nickname, prefix, similarity.
    fn first_name_rule(&self, a: &str, b: &str) -> Option<(f64, &'static str)> {
        if a == b {
            return Some((FIRST_NAME_STRONG_WEIGHT, "first name match"));
        }
        if self.nicknames.are_equivalent(a, b) {
            return Some((FIRST_NAME_STRONG_WEIGHT, "nickname match"));
        }
        if is_prefix_match(a, b) {
            return Some((FIRST_NAME_WEAK_WEIGHT, "first name prefix match"));
        }
        if normalized_levenshtein(a, b) > SIMILARITY_CUTOFF {
            return Some((FIRST_NAME_WEAK_WEIGHT, "similar first name"));
        }
        None
    }
}

fn last_name<'a>(tokens: &[&'a str]) -> Option<&'a str> {
    if tokens.len() > 1 {
        tokens.last().copied()
    } else {
        None
    }
}

fn is_prefix_match(a: &str, b: &str) -> bool {
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    shorter.chars().count() >= MIN_PREFIX_CHARS && longer.starts_with(shorter)
}

fn normalized_email(email: &Option<String>) -> Option<String> {
    email
        .as_deref()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
}
