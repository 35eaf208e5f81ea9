use serde::{Deserialize, Serialize};

use super::name_match::MatchOutcome;

/// A known roster member imported results are linked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    pub first_name: String,
    pub last_name: String,
    pub license_number: Option<String>,
    pub club_name: Option<String>,
}

/// One result line from an ErgRace export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedRow {
    pub raw_name: String,
    pub affiliation: Option<String>,
    pub result: Option<String>,
    pub place: Option<u32>,
}

/// An imported row linked (or not) to the roster. `best_score` is kept even
/// when no match was accepted, so the review screen can sort rows by how
/// close they came.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMatch {
    pub row: ImportedRow,
    pub matched: Option<MatchOutcome>,
    pub best_score: u8,
}
