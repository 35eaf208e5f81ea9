use std::collections::HashMap;

use lazy_static::lazy_static;
use log::debug;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::datastructures::{ImportedRow, RosterMember, RowMatch};
use super::name_match::{rank_candidates, MatchPolicy, ParseConfig};

#[derive(Error, Debug)]
pub enum ErgReaderError {
    #[error("malformed results file: {0}")]
    ParseError(#[from] csv::Error),
    #[error("could not read results file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("column {index} is missing from a row")]
    IndexOutOfBounds { index: usize },
    #[error("reader configuration is incomplete")]
    BadConfig,
}

/// Column layout of an ErgRace results export. ErgRace versions and operator
/// settings shuffle the columns around, so the layout is proposed from the
/// headers and can be corrected by the user before parsing.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ErgReaderConfig {
    name_column: Option<usize>,
    affiliation_column: Option<usize>,
    result_column: Option<usize>,
    place_column: Option<usize>,
    delimiter: Option<u8>,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
enum ErgField {
    Name,
    Affiliation,
    Result,
    Place,
}

pub struct ParseResult {
    pub rows: Vec<ImportedRow>,
    pub warnings: Vec<ParseWarning>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseWarning {
    SkippedRowEmptyName { index: usize },
}

impl ErgReaderConfig {
    /// Sniff the delimiter and propose a column layout from the header row.
    pub fn default_from_file<R>(mut reader: R) -> Result<ErgReaderConfig, ErgReaderError>
    where
        R: std::io::Read,
    {
        let delimiter_candidates = [b',', b';', b'\t'];
        let mut delimiter_counts = [0; 3];
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;

        for char in buffer.iter() {
            for (i, delimiter) in delimiter_candidates.iter().enumerate() {
                if char == delimiter {
                    delimiter_counts[i] += 1;
                }
            }
        }

        let delimiter = delimiter_counts
            .into_iter()
            .enumerate()
            .max_by_key(|(_, c)| *c)
            .map(|(i, _)| delimiter_candidates[i])
            .unwrap_or(b',');
        debug!("sniffed delimiter {:?}", delimiter as char);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_reader(&buffer[..]);
        let headers = reader.headers().map_err(ErgReaderError::ParseError)?;

        let mut config = Self::propose_config_from_headers(headers.into_iter());
        config.delimiter = Some(delimiter);
        Ok(config)
    }

    fn propose_config_from_headers<'a, I>(headers: I) -> ErgReaderConfig
    where
        I: Iterator<Item = &'a str>,
    {
        lazy_static! {
            static ref FIELD_HEADER_PATTERNS: HashMap<ErgField, Regex> = {
                let name_patterns: Vec<&str> = vec!["name", "nom", "participant", "rameur"];
                let affiliation_patterns: Vec<&str> = vec!["club", "affiliation", "team"];
                let result_patterns: Vec<&str> = vec!["time", "temps", "result", "score"];
                let place_patterns: Vec<&str> = vec!["place", "pos", "rang", "classement"];

                let mut m = HashMap::new();
                m.insert(ErgField::Name, name_patterns);
                m.insert(ErgField::Affiliation, affiliation_patterns);
                m.insert(ErgField::Result, result_patterns);
                m.insert(ErgField::Place, place_patterns);

                m.into_iter()
                    .map(|(key, patterns)| {
                        (
                            key,
                            RegexBuilder::new(&patterns.join("|"))
                                .case_insensitive(true)
                                .build()
                                .unwrap(),
                        )
                    })
                    .collect()
            };
        }

        let mut proposed_column_assignment = HashMap::new();
        for (header_idx, header) in headers.enumerate() {
            for (field, pattern) in FIELD_HEADER_PATTERNS.iter() {
                if pattern.is_match(header) && proposed_column_assignment.get(field).is_none() {
                    proposed_column_assignment.insert(*field, header_idx);
                }
            }
        }

        ErgReaderConfig {
            name_column: proposed_column_assignment.remove(&ErgField::Name),
            affiliation_column: proposed_column_assignment.remove(&ErgField::Affiliation),
            result_column: proposed_column_assignment.remove(&ErgField::Result),
            place_column: proposed_column_assignment.remove(&ErgField::Place),
            delimiter: None,
        }
    }

    pub fn parse<R>(&self, reader: R) -> Result<ParseResult, ErgReaderError>
    where
        R: std::io::Read,
    {
        let delimiter = self.delimiter.ok_or(ErgReaderError::BadConfig)?;
        let name_idx = self.name_column.ok_or(ErgReaderError::BadConfig)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = vec![];
        let mut warnings = vec![];

        for (row_idx, row) in reader.records().enumerate() {
            let row = row.map_err(ErgReaderError::ParseError)?;

            let raw_name = row
                .get(name_idx)
                .ok_or(ErgReaderError::IndexOutOfBounds { index: name_idx })?
                .to_string();
            if raw_name.is_empty() {
                warnings.push(ParseWarning::SkippedRowEmptyName { index: row_idx });
                continue;
            }

            let affiliation = self
                .affiliation_column
                .and_then(|index| row.get(index))
                .filter(|cell| !cell.is_empty())
                .map(|cell| cell.to_string());
            let result = self
                .result_column
                .and_then(|index| row.get(index))
                .filter(|cell| !cell.is_empty())
                .map(|cell| cell.to_string());
            let place = self
                .place_column
                .and_then(|index| row.get(index))
                .and_then(|cell| cell.parse::<u32>().ok());

            rows.push(ImportedRow {
                raw_name,
                affiliation,
                result,
                place,
            });
        }

        Ok(ParseResult { rows, warnings })
    }
}

/// Link every imported row to the roster via the match scorer and acceptance
/// policy. Rows the policy declines stay unmatched but keep their best score
/// for the review screen.
pub fn match_rows(
    rows: Vec<ImportedRow>,
    roster: &[RosterMember],
    policy: &MatchPolicy,
    config: &ParseConfig,
) -> Vec<RowMatch> {
    rows.into_iter()
        .map(|row| {
            let ranked = rank_candidates(
                Some(&row.raw_name),
                row.affiliation.as_deref(),
                roster,
                config,
            );
            let best_score = ranked.first().map(|(_, score)| *score).unwrap_or(0);
            let matched = policy.evaluate(&ranked);
            if matched.is_none() {
                debug!(
                    "no automatic match for {:?} (best score {})",
                    row.raw_name, best_score
                );
            }
            RowMatch {
                row,
                matched,
                best_score,
            }
        })
        .collect()
}
