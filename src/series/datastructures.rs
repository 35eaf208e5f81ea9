use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// The distance a category races over. Indoor events are either rowed over a
/// fixed number of meters or for a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum Distance {
    Meters { meters: u32 },
    TimeBased { seconds: u32 },
}

impl Distance {
    /// Two distances can share a start iff they are of the same kind and
    /// equal in value.
    pub fn is_compatible_with(&self, other: &Distance) -> bool {
        match (self, other) {
            (Distance::Meters { meters: a }, Distance::Meters { meters: b }) => a == b,
            (Distance::TimeBased { seconds: a }, Distance::TimeBased { seconds: b }) => a == b,
            _ => false,
        }
    }
}

impl Display for Distance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Distance::Meters { meters } => write!(f, "{}m", meters),
            Distance::TimeBased { seconds } => write!(f, "{}s", seconds),
        }
    }
}

/// The effective distance used for series packing. Time-based distances are
/// never packed against a meter value, so they count as flexible, as does a
/// category with no distance at all.
pub fn effective_meters(distance: Option<&Distance>) -> Option<u32> {
    match distance {
        Some(Distance::Meters { meters }) => Some(*meters),
        _ => None,
    }
}

/// A flexible (None) effective distance fits anywhere.
pub fn distances_compatible(a: Option<u32>, b: Option<u32>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub code: String,
    pub label: String,
    pub crew_count: u32,
    pub distance: Option<Distance>,
}

/// A single heat under construction, mapping category codes to the number of
/// crews of that category assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: String,
    pub categories: BTreeMap<String, u32>,
}

impl Series {
    pub fn total(&self) -> u32 {
        self.categories.values().sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_distance_compatibility() {
        let two_k = Distance::Meters { meters: 2000 };
        let five_hundred = Distance::Meters { meters: 500 };
        let twenty_min = Distance::TimeBased { seconds: 1200 };

        assert!(two_k.is_compatible_with(&Distance::Meters { meters: 2000 }));
        assert!(!two_k.is_compatible_with(&five_hundred));
        assert!(!two_k.is_compatible_with(&twenty_min));
        assert!(twenty_min.is_compatible_with(&Distance::TimeBased { seconds: 1200 }));
        assert!(!twenty_min.is_compatible_with(&Distance::TimeBased { seconds: 2400 }));
    }

    #[test]
    fn test_effective_meters_treats_time_based_as_flexible() {
        assert_eq!(
            effective_meters(Some(&Distance::Meters { meters: 2000 })),
            Some(2000)
        );
        assert_eq!(
            effective_meters(Some(&Distance::TimeBased { seconds: 1200 })),
            None
        );
        assert_eq!(effective_meters(None), None);

        assert!(distances_compatible(None, Some(2000)));
        assert!(distances_compatible(Some(2000), None));
        assert!(distances_compatible(Some(2000), Some(2000)));
        assert!(!distances_compatible(Some(2000), Some(500)));
    }
}
