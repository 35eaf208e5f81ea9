use std::collections::BTreeMap;

use itertools::Itertools;
use log::debug;
use thiserror::Error;

use super::datastructures::{distances_compatible, effective_meters, Category, Series};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackingError {
    #[error("unknown category {0}")]
    UnknownCategory(String),
    #[error("unknown series {0}")]
    UnknownSeries(String),
    #[error("lane count must be at least 1")]
    NoLanes,
    #[error("category {code} has no unassigned crews left ({assigned} of {total} already placed)")]
    NoAvailableCrews {
        code: String,
        total: u32,
        assigned: u32,
    },
    #[error("category {code} races over {requested}m, which conflicts with {existing:?}m already in series {series_id}")]
    IncompatibleDistance {
        code: String,
        series_id: String,
        requested: u32,
        existing: Vec<u32>,
    },
    #[error("series {series_id} is full (all {lane_count} lanes in use)")]
    SeriesFull { series_id: String, lane_count: u32 },
    #[error("series {series_id} mixes incompatible distances: {distances:?}")]
    ConflictingDistances {
        series_id: String,
        distances: Vec<u32>,
    },
    #[error("category {code} is not part of series {series_id}")]
    NotInSeries { code: String, series_id: String },
    #[error("count adjustments must be +1 or -1, got {0}")]
    BadAdjustment(i32),
}

/// Submission-time validation finding. Unlike [`PackingError`] these are
/// accumulated across the whole plan rather than stopping at the first.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("series {series_id} holds {total} crews but only has {lane_count} lanes")]
    SeriesOverCapacity {
        series_id: String,
        total: u32,
        lane_count: u32,
    },
    #[error("series {series_id} mixes incompatible distances: {distances:?}")]
    ConflictingDistances {
        series_id: String,
        distances: Vec<u32>,
    },
    #[error("category {code} is assigned {assigned} crews but only {total} are registered")]
    CategoryOverAssigned {
        code: String,
        assigned: u32,
        total: u32,
    },
    #[error("series {series_id} references unknown category {code}")]
    UnknownCategory { series_id: String, code: String },
}

/// How an add operation placed crews. `remaining > 0` means the placement was
/// partial and the rest of the category is still available for another
/// series; callers surface this as a non-blocking notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub series_ids: Vec<String>,
    pub placed: u32,
    pub remaining: u32,
}

impl Placement {
    pub fn is_partial(&self) -> bool {
        self.remaining > 0
    }
}

/// The interactive series plan for one race phase. Operations never mutate in
/// place: each returns a fresh plan, so callers get undo for free and a
/// returned plan always satisfies the capacity and distance invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesPlan {
    pub(crate) lane_count: u32,
    pub(crate) categories: BTreeMap<String, Category>,
    pub(crate) series: Vec<Series>,
    pub(crate) next_series_ord: u32,
}

impl SeriesPlan {
    pub fn new(lane_count: u32, categories: impl IntoIterator<Item = Category>) -> SeriesPlan {
        SeriesPlan {
            lane_count,
            categories: categories
                .into_iter()
                .map(|c| (c.code.clone(), c))
                .collect(),
            series: Vec::new(),
            next_series_ord: 1,
        }
    }

    pub fn lane_count(&self) -> u32 {
        self.lane_count
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn category(&self, code: &str) -> Option<&Category> {
        self.categories.get(code)
    }

    /// Total crews of a category assigned across all series.
    pub fn assigned_count(&self, code: &str) -> u32 {
        self.series
            .iter()
            .filter_map(|s| s.categories.get(code))
            .sum()
    }

    /// Crews of a category not yet placed in any series.
    pub fn available_crews(&self, code: &str) -> Result<u32, PackingError> {
        let category = self
            .categories
            .get(code)
            .ok_or_else(|| PackingError::UnknownCategory(code.to_string()))?;
        Ok(category.crew_count.saturating_sub(self.assigned_count(code)))
    }

    fn series_index(&self, series_id: &str) -> Result<usize, PackingError> {
        self.series
            .iter()
            .position(|s| s.id == series_id)
            .ok_or_else(|| PackingError::UnknownSeries(series_id.to_string()))
    }

    /// Effective distances of the categories already in a series that clash
    /// with `requested`.
    fn conflicting_distances(&self, series: &Series, requested: u32) -> Vec<u32> {
        series
            .categories
            .keys()
            .filter_map(|code| self.categories.get(code))
            .filter_map(|c| effective_meters(c.distance.as_ref()))
            .filter(|m| *m != requested)
            .unique()
            .sorted()
            .collect_vec()
    }

    /// Place as many crews of a category as fit into an existing series.
    ///
    /// Rejections carry the exact shortfall so the UI can report requested vs.
    /// available numbers. A partial fill is not a rejection; the returned
    /// [`Placement`] reports the remainder.
    pub fn add_to_series(
        &self,
        series_id: &str,
        code: &str,
    ) -> Result<(SeriesPlan, Placement), PackingError> {
        let category = self
            .categories
            .get(code)
            .ok_or_else(|| PackingError::UnknownCategory(code.to_string()))?;
        let series_idx = self.series_index(series_id)?;

        let assigned = self.assigned_count(code);
        let available = category.crew_count.saturating_sub(assigned);
        if available == 0 {
            return Err(PackingError::NoAvailableCrews {
                code: code.to_string(),
                total: category.crew_count,
                assigned,
            });
        }

        if let Some(requested) = effective_meters(category.distance.as_ref()) {
            let existing = self.conflicting_distances(&self.series[series_idx], requested);
            if !existing.is_empty() {
                return Err(PackingError::IncompatibleDistance {
                    code: code.to_string(),
                    series_id: series_id.to_string(),
                    requested,
                    existing,
                });
            }
        }

        let spare = self
            .lane_count
            .saturating_sub(self.series[series_idx].total());
        if spare == 0 {
            return Err(PackingError::SeriesFull {
                series_id: series_id.to_string(),
                lane_count: self.lane_count,
            });
        }

        let to_add = available.min(spare);
        debug!(
            "placing {} of {} available {} crews into {}",
            to_add, available, code, series_id
        );

        let mut next = self.clone();
        *next.series[series_idx]
            .categories
            .entry(code.to_string())
            .or_insert(0) += to_add;

        Ok((
            next,
            Placement {
                series_ids: vec![series_id.to_string()],
                placed: to_add,
                remaining: available - to_add,
            },
        ))
    }

    /// Place a category without an explicit target series.
    ///
    /// Unless `force_new` is set, an existing series is reused when one has
    /// spare lanes, all its categories sit at a single distance, and that
    /// distance fits the category. Otherwise the category's remaining crews
    /// are split into `ceil(available / lane_count)` new series of at most
    /// `lane_count` crews each.
    pub fn add_category(
        &self,
        code: &str,
        force_new: bool,
    ) -> Result<(SeriesPlan, Placement), PackingError> {
        let category = self
            .categories
            .get(code)
            .ok_or_else(|| PackingError::UnknownCategory(code.to_string()))?;
        if self.lane_count == 0 {
            return Err(PackingError::NoLanes);
        }

        if !force_new {
            if let Some(series_id) = self.find_reusable_series(category) {
                return self.add_to_series(&series_id, code);
            }
        }

        let assigned = self.assigned_count(code);
        let available = category.crew_count.saturating_sub(assigned);
        if available == 0 {
            return Err(PackingError::NoAvailableCrews {
                code: code.to_string(),
                total: category.crew_count,
                assigned,
            });
        }

        let mut next = self.clone();
        let mut created = Vec::new();
        let mut remaining = available;
        while remaining > 0 {
            let chunk = remaining.min(self.lane_count);
            let id = format!("series-{}", next.next_series_ord);
            next.next_series_ord += 1;
            next.series.push(Series {
                id: id.clone(),
                categories: BTreeMap::from([(code.to_string(), chunk)]),
            });
            created.push(id);
            remaining -= chunk;
        }
        debug!(
            "created {} new series for {} ({} crews)",
            created.len(),
            code,
            available
        );

        Ok((
            next,
            Placement {
                series_ids: created,
                placed: available,
                remaining: 0,
            },
        ))
    }

    fn find_reusable_series(&self, category: &Category) -> Option<String> {
        let wanted = effective_meters(category.distance.as_ref());
        self.series
            .iter()
            .find(|s| {
                if s.categories.is_empty() || s.total() >= self.lane_count {
                    return false;
                }
                let member_distances = s
                    .categories
                    .keys()
                    .filter_map(|code| self.categories.get(code))
                    .map(|c| effective_meters(c.distance.as_ref()))
                    .collect_vec();
                let Some(first) = member_distances.first().copied() else {
                    return false;
                };
                member_distances.iter().all(|d| *d == first)
                    && distances_compatible(first, wanted)
            })
            .map(|s| s.id.clone())
    }

    /// Remove a category from a series entirely; a series left empty is
    /// dropped from the plan.
    pub fn remove_from_series(
        &self,
        series_id: &str,
        code: &str,
    ) -> Result<SeriesPlan, PackingError> {
        let series_idx = self.series_index(series_id)?;
        if !self.series[series_idx].categories.contains_key(code) {
            return Err(PackingError::NotInSeries {
                code: code.to_string(),
                series_id: series_id.to_string(),
            });
        }
        let mut next = self.clone();
        next.series[series_idx].categories.remove(code);
        if next.series[series_idx].categories.is_empty() {
            next.series.remove(series_idx);
        }
        Ok(next)
    }

    /// Stepper control: change a category's count in a series by exactly one.
    /// An entry that reaches 0 is removed from the series.
    pub fn adjust_count(
        &self,
        series_id: &str,
        code: &str,
        delta: i32,
    ) -> Result<SeriesPlan, PackingError> {
        if delta != 1 && delta != -1 {
            return Err(PackingError::BadAdjustment(delta));
        }
        let series_idx = self.series_index(series_id)?;
        let current = *self.series[series_idx].categories.get(code).ok_or_else(|| {
            PackingError::NotInSeries {
                code: code.to_string(),
                series_id: series_id.to_string(),
            }
        })?;

        let mut next = self.clone();
        if delta == 1 {
            if self.series[series_idx].total() >= self.lane_count {
                return Err(PackingError::SeriesFull {
                    series_id: series_id.to_string(),
                    lane_count: self.lane_count,
                });
            }
            let category = self
                .categories
                .get(code)
                .ok_or_else(|| PackingError::UnknownCategory(code.to_string()))?;
            let assigned = self.assigned_count(code);
            if assigned >= category.crew_count {
                return Err(PackingError::NoAvailableCrews {
                    code: code.to_string(),
                    total: category.crew_count,
                    assigned,
                });
            }
            next.series[series_idx]
                .categories
                .insert(code.to_string(), current + 1);
        } else if current <= 1 {
            next.series[series_idx].categories.remove(code);
        } else {
            next.series[series_idx]
                .categories
                .insert(code.to_string(), current - 1);
        }
        Ok(next)
    }

    /// The single meter distance shared by every member of a series, for
    /// display. `Ok(None)` means the series is entirely flexible.
    pub fn series_distance(&self, series_id: &str) -> Result<Option<u32>, PackingError> {
        let series_idx = self.series_index(series_id)?;
        let distinct = self.series[series_idx]
            .categories
            .keys()
            .filter_map(|code| self.categories.get(code))
            .filter_map(|c| effective_meters(c.distance.as_ref()))
            .unique()
            .sorted()
            .collect_vec();
        match distinct.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            _ => Err(PackingError::ConflictingDistances {
                series_id: series_id.to_string(),
                distances: distinct,
            }),
        }
    }

    /// Re-check the whole plan before submission. Every violation is
    /// collected, not just the first, so the user sees the complete list.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for series in &self.series {
            let total = series.total();
            if total > self.lane_count {
                issues.push(ValidationIssue::SeriesOverCapacity {
                    series_id: series.id.clone(),
                    total,
                    lane_count: self.lane_count,
                });
            }
            let distinct = series
                .categories
                .keys()
                .filter_map(|code| self.categories.get(code))
                .filter_map(|c| effective_meters(c.distance.as_ref()))
                .unique()
                .sorted()
                .collect_vec();
            if distinct.len() > 1 {
                issues.push(ValidationIssue::ConflictingDistances {
                    series_id: series.id.clone(),
                    distances: distinct,
                });
            }
            for code in series.categories.keys() {
                if !self.categories.contains_key(code) {
                    issues.push(ValidationIssue::UnknownCategory {
                        series_id: series.id.clone(),
                        code: code.clone(),
                    });
                }
            }
        }
        for (code, category) in &self.categories {
            let assigned = self.assigned_count(code);
            if assigned > category.crew_count {
                issues.push(ValidationIssue::CategoryOverAssigned {
                    code: code.clone(),
                    assigned,
                    total: category.crew_count,
                });
            }
        }
        issues
    }
}
