use itertools::Itertools;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::datastructures::RosterMember;

/// Lowercase, strip diacritics and collapse whitespace. Idempotent, so
/// already-normalized strings pass through unchanged.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .split_whitespace()
        .join(" ")
}

/// A name cell from an ErgRace results file, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub last_name: String,
    pub first_name: String,
    pub license_number: Option<String>,
}

/// Knobs for name parsing. ErgRace operators type license numbers with a
/// fixed digit count; a leading all-digit token of any other length is taken
/// for a bib or lane number. Six digits is the FFA default but federations
/// differ, so the length is configurable rather than hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    pub license_length: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig { license_length: 6 }
    }
}

lazy_static! {
    static ref LICENSE_PATTERN: Regex = Regex::new(r"\((\d+)\)").unwrap();
    // Age qualifiers sometimes appended to names in exports, e.g.
    // "dupont jean junior h". The qualifier and its trailing token go.
    static ref QUALIFIER_PATTERN: Regex = RegexBuilder::new(
        r"\b(junior|senior|cadet|minime|benjamin|poussin|espoir)\b(\s+\S+)?"
    )
    .case_insensitive(true)
    .build()
    .unwrap();
}

/// Split a raw ErgRace name cell into last name, first name and an optional
/// license number.
///
/// Handles the formats seen in real exports: "FIRSTNAME LASTNAME",
/// "LASTNAME, FIRSTNAME", "NUM LASTNAME FIRSTNAME" (bib-prefixed) and a
/// parenthesized license anywhere in the cell.
pub fn parse_erg_race_name(raw: &str, config: &ParseConfig) -> ParsedName {
    let mut working = normalize_name(raw);

    let license_number = LICENSE_PATTERN
        .captures(&working)
        .map(|captures| captures[1].to_string());
    if license_number.is_some() {
        working = LICENSE_PATTERN.replace(&working, " ").into_owned();
    }

    working = QUALIFIER_PATTERN.replace_all(&working, " ").into_owned();
    working = working.split_whitespace().join(" ");

    // A leading all-digit token of non-license length is a bib or lane
    // number; a license-length one is kept as a name-part ambiguity.
    let mut has_leading_number = false;
    if let Some(first_token) = working.split_whitespace().next() {
        if first_token.chars().all(|c| c.is_ascii_digit())
            && first_token.len() != config.license_length
        {
            has_leading_number = true;
            working = working[first_token.len()..].trim_start().to_string();
        }
    }

    let (last_name, first_name) = if let Some((last, first)) = working.split_once(',') {
        (last.trim().to_string(), first.trim().to_string())
    } else {
        let tokens = working.split_whitespace().collect_vec();
        match tokens.as_slice() {
            [] => (String::new(), String::new()),
            [only] => ((*only).to_string(), String::new()),
            tokens if has_leading_number => (tokens[0].to_string(), tokens[1..].join(" ")),
            tokens => (
                tokens[tokens.len() - 1].to_string(),
                tokens[..tokens.len() - 1].join(" "),
            ),
        }
    };

    ParsedName {
        last_name,
        first_name,
        license_number,
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct NameRelation {
    last_exact: bool,
    first_exact: bool,
    first_prefix: bool,
    first_contains: bool,
    last_contains: bool,
}

struct ScoreRule {
    applies: fn(&NameRelation) -> bool,
    score: u8,
}

// Evaluated top-down, first match wins. The order is the contract: a rule
// only fires when every rule above it failed. A matching license never
// reaches this table; it is settled by the short-circuit in
// compute_match_score.
const SCORE_RULES: &[ScoreRule] = &[
    ScoreRule {
        applies: |r| r.last_exact && r.first_exact,
        score: 100,
    },
    ScoreRule {
        applies: |r| r.last_exact && r.first_prefix,
        score: 85,
    },
    ScoreRule {
        applies: |r| r.last_exact && r.first_contains,
        score: 75,
    },
    ScoreRule {
        applies: |r| r.last_exact,
        score: 70,
    },
    ScoreRule {
        applies: |r| r.last_contains,
        score: 50,
    },
];

fn one_is_prefix(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.starts_with(b) || b.starts_with(a))
}

fn one_contains(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Confidence (0-100) that an imported name cell identifies a roster member.
///
/// Never panics; a missing or empty name scores 0 rather than erroring, and
/// absent candidate fields simply degrade the score.
pub fn compute_match_score(
    name: Option<&str>,
    affiliation: Option<&str>,
    candidate: &RosterMember,
    config: &ParseConfig,
) -> u8 {
    let raw = match name {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return 0,
    };
    let parsed = parse_erg_race_name(raw, config);

    let candidate_last = normalize_name(&candidate.last_name);
    let candidate_first = normalize_name(&candidate.first_name);
    let candidate_license = candidate
        .license_number
        .as_deref()
        .map(normalize_name)
        .unwrap_or_default();
    let parsed_license = parsed.license_number.clone().unwrap_or_default();

    let license_match = !parsed_license.is_empty()
        && !candidate_license.is_empty()
        && parsed_license == candidate_license;

    let last_exact = !parsed.last_name.is_empty() && parsed.last_name == candidate_last;
    let first_exact = parsed.first_name == candidate_first;

    // A matching license is near-conclusive on its own; the name only
    // decides between the top tiers.
    if license_match {
        if last_exact && first_exact {
            return 100;
        }
        if last_exact {
            return 95;
        }
        return 90;
    }

    let relation = NameRelation {
        last_exact,
        first_exact,
        first_prefix: one_is_prefix(&parsed.first_name, &candidate_first),
        first_contains: one_contains(&parsed.first_name, &candidate_first),
        last_contains: one_contains(&parsed.last_name, &candidate_last),
    };

    let mut score = match SCORE_RULES.iter().find(|rule| (rule.applies)(&relation)) {
        Some(rule) => rule.score,
        // No last-name relation at all: no match, and no club bonus either.
        None => return 0,
    };

    if let Some(affiliation) = affiliation {
        if score >= 40 {
            let club = normalize_name(affiliation);
            let candidate_club = candidate
                .club_name
                .as_deref()
                .map(normalize_name)
                .unwrap_or_default();
            if one_contains(&club, &candidate_club) {
                score = (score + 10).min(100);
            }
        }
    }

    score
}

/// Thresholds for accepting the best-scoring candidate without review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPolicy {
    pub accept_score: u8,
    pub review_score: u8,
    pub margin: u8,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        MatchPolicy {
            accept_score: 60,
            review_score: 40,
            margin: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub index: usize,
    pub score: u8,
}

/// All candidates scored against one name cell, best first.
pub fn rank_candidates(
    name: Option<&str>,
    affiliation: Option<&str>,
    roster: &[RosterMember],
    config: &ParseConfig,
) -> Vec<(usize, u8)> {
    roster
        .iter()
        .enumerate()
        .map(|(index, candidate)| (index, compute_match_score(name, affiliation, candidate, config)))
        .sorted_by(|a, b| b.1.cmp(&a.1))
        .collect_vec()
}

impl MatchPolicy {
    /// Accept the leader of a ranking when it clears the acceptance score, or
    /// the review score with a sufficient lead over the runner-up.
    pub fn evaluate(&self, ranked: &[(usize, u8)]) -> Option<MatchOutcome> {
        let (index, best) = *ranked.first()?;
        let second = ranked.get(1).map(|(_, score)| *score).unwrap_or(0);
        if best >= self.accept_score
            || (best >= self.review_score && best.saturating_sub(second) >= self.margin)
        {
            Some(MatchOutcome { index, score: best })
        } else {
            None
        }
    }
}

/// Score every roster member and apply the acceptance policy. `None` means
/// the row stays unmatched for manual assignment.
pub fn pick_best_match(
    name: Option<&str>,
    affiliation: Option<&str>,
    roster: &[RosterMember],
    policy: &MatchPolicy,
    config: &ParseConfig,
) -> Option<MatchOutcome> {
    policy.evaluate(&rank_candidates(name, affiliation, roster, config))
}

#[cfg(test)]
mod test {
    use super::*;

    fn member(first: &str, last: &str, license: Option<&str>, club: Option<&str>) -> RosterMember {
        RosterMember {
            first_name: first.to_string(),
            last_name: last.to_string(),
            license_number: license.map(|s| s.to_string()),
            club_name: club.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_normalize_name_is_idempotent() {
        for raw in ["  Émilie   DUBOIS ", "LACÔFFRETTE", "jean-noël", "÷ 42"] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once);
        }
        assert_eq!(normalize_name("  Émilie   DUBOIS "), "emilie dubois");
    }

    #[test]
    fn test_parse_leading_bib_number() {
        let parsed = parse_erg_race_name("362 LACOFFRETTE EMMA", &ParseConfig::default());
        assert_eq!(
            parsed,
            ParsedName {
                last_name: "lacoffrette".to_string(),
                first_name: "emma".to_string(),
                license_number: None,
            }
        );
    }

    #[test]
    fn test_parse_parenthesized_license() {
        let parsed = parse_erg_race_name("DUPONT (613571)", &ParseConfig::default());
        assert_eq!(
            parsed,
            ParsedName {
                last_name: "dupont".to_string(),
                first_name: "".to_string(),
                license_number: Some("613571".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_first_last_order_and_comma_form() {
        let parsed = parse_erg_race_name("Jean Marc DUPONT", &ParseConfig::default());
        assert_eq!(parsed.last_name, "dupont");
        assert_eq!(parsed.first_name, "jean marc");

        let parsed = parse_erg_race_name("DUPONT, Jean", &ParseConfig::default());
        assert_eq!(parsed.last_name, "dupont");
        assert_eq!(parsed.first_name, "jean");
    }

    #[test]
    fn test_parse_strips_age_qualifier_and_trailing_token() {
        let parsed = parse_erg_race_name("EMMA LACOFFRETTE junior F", &ParseConfig::default());
        assert_eq!(parsed.last_name, "lacoffrette");
        assert_eq!(parsed.first_name, "emma");
    }

    #[test]
    fn test_parse_license_length_is_configurable() {
        // With a 5-digit federation, "36255" up front is a license-length
        // token and stays part of the name.
        let config = ParseConfig { license_length: 5 };
        let parsed = parse_erg_race_name("36255 DUPONT", &config);
        assert_eq!(parsed.last_name, "dupont");
        assert_eq!(parsed.first_name, "36255");

        let parsed = parse_erg_race_name("362 DUPONT JEAN", &config);
        assert_eq!(parsed.last_name, "dupont");
        assert_eq!(parsed.first_name, "jean");
    }

    #[test]
    fn test_six_digit_leading_token_is_preserved() {
        let parsed = parse_erg_race_name("613571 DUPONT", &ParseConfig::default());
        // Assumed to already be the license, so it stays in the name parts.
        assert_eq!(parsed.last_name, "dupont");
        assert_eq!(parsed.first_name, "613571");
    }

    #[test]
    fn test_missing_name_scores_zero() {
        let candidate = member("Jean", "Dupont", None, None);
        let config = ParseConfig::default();
        assert_eq!(compute_match_score(None, None, &candidate, &config), 0);
        assert_eq!(compute_match_score(Some("  "), None, &candidate, &config), 0);
    }

    #[test]
    fn test_exact_full_name_scores_100() {
        let candidate = member("Jean", "Dupont", None, None);
        let score = compute_match_score(
            Some("Jean DUPONT"),
            None,
            &candidate,
            &ParseConfig::default(),
        );
        assert_eq!(score, 100);
    }

    #[test]
    fn test_license_match_with_different_names_scores_90() {
        let candidate = member("Marie", "Martin", Some("613571"), None);
        let score = compute_match_score(
            Some("DUPONT (613571)"),
            None,
            &candidate,
            &ParseConfig::default(),
        );
        assert_eq!(score, 90);
    }

    #[test]
    fn test_license_match_with_same_last_name_scores_95() {
        let candidate = member("Marie", "Dupont", Some("613571"), None);
        let score = compute_match_score(
            Some("DUPONT (613571)"),
            None,
            &candidate,
            &ParseConfig::default(),
        );
        assert_eq!(score, 95);
    }

    #[test]
    fn test_name_rule_ladder() {
        let config = ParseConfig::default();

        // Prefix first name.
        let candidate = member("Jean-Marc", "Dupont", None, None);
        assert_eq!(
            compute_match_score(Some("Jean DUPONT"), None, &candidate, &config),
            85
        );

        // Substring (not prefix) first name.
        let candidate = member("Marc", "Dupont", None, None);
        assert_eq!(
            compute_match_score(Some("Jean-Marc DUPONT"), None, &candidate, &config),
            75
        );

        // Last name only.
        let candidate = member("Pierre", "Dupont", None, None);
        assert_eq!(
            compute_match_score(Some("Jean DUPONT"), None, &candidate, &config),
            70
        );

        // Last name substring.
        let candidate = member("Jean", "Dupont-Morel", None, None);
        assert_eq!(
            compute_match_score(Some("Jean DUPONT"), None, &candidate, &config),
            50
        );

        // Unrelated.
        let candidate = member("Jean", "Martin", None, None);
        assert_eq!(
            compute_match_score(Some("Jean DUPONT"), None, &candidate, &config),
            0
        );
    }

    #[test]
    fn test_club_bonus_applies_above_threshold_and_caps() {
        let config = ParseConfig::default();

        let candidate = member("Pierre", "Dupont", None, Some("CN Versailles"));
        assert_eq!(
            compute_match_score(
                Some("Jean DUPONT"),
                Some("cn versailles"),
                &candidate,
                &config
            ),
            80
        );

        // Already at 100, stays capped.
        let candidate = member("Jean", "Dupont", None, Some("CN Versailles"));
        assert_eq!(
            compute_match_score(
                Some("Jean DUPONT"),
                Some("CN Versailles"),
                &candidate,
                &config
            ),
            100
        );

        // No last-name relation: bonus never applies.
        let candidate = member("Jean", "Martin", None, Some("CN Versailles"));
        assert_eq!(
            compute_match_score(
                Some("Jean DUPONT"),
                Some("CN Versailles"),
                &candidate,
                &config
            ),
            0
        );
    }

    #[test]
    fn test_acceptance_policy() {
        let policy = MatchPolicy::default();

        // Clear winner above the acceptance score.
        assert_eq!(
            policy.evaluate(&[(2, 85), (0, 70)]),
            Some(MatchOutcome { index: 2, score: 85 })
        );

        // Mid-range score with a wide enough margin.
        assert_eq!(
            policy.evaluate(&[(1, 50), (0, 30)]),
            Some(MatchOutcome { index: 1, score: 50 })
        );

        // Mid-range score with a too-close runner-up.
        assert_eq!(policy.evaluate(&[(1, 50), (0, 45)]), None);

        // Below the review score entirely.
        assert_eq!(policy.evaluate(&[(1, 35)]), None);

        assert_eq!(policy.evaluate(&[]), None);
    }

    #[test]
    fn test_pick_best_match_over_roster() {
        let roster = vec![
            member("Marie", "Martin", None, None),
            member("Emma", "Lacoffrette", None, None),
            member("Jean", "Dupont", None, None),
        ];
        let outcome = pick_best_match(
            Some("362 LACOFFRETTE EMMA"),
            None,
            &roster,
            &MatchPolicy::default(),
            &ParseConfig::default(),
        );
        assert_eq!(
            outcome,
            Some(MatchOutcome {
                index: 1,
                score: 100
            })
        );
    }
}
