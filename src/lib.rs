pub mod import;
pub mod series;
pub mod schema;

pub use import::{
    compute_match_score, normalize_name, parse_erg_race_name, pick_best_match, MatchPolicy,
    ParseConfig, RosterMember,
};
pub use series::{Category, Distance, PackingError, Series, SeriesPlan};
