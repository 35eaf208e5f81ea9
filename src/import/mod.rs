pub mod datastructures;
pub mod erg_reader;
pub mod name_match;

pub use datastructures::{ImportedRow, RosterMember, RowMatch};
pub use erg_reader::{ErgReaderConfig, ErgReaderError, ParseResult, ParseWarning, match_rows};
pub use name_match::{
    compute_match_score, normalize_name, parse_erg_race_name, pick_best_match, MatchOutcome,
    MatchPolicy, ParseConfig, ParsedName,
};
