//! Row filtering applied between enrichment and classification.

use std::collections::HashSet;

use serde::Serialize;

use crate::category::Category;
use crate::row::Row;

/// Why a row was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Duplicate,
    NoEvidence,
    LocationIsSuburb,
    ExcludedCategory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    pub duplicate: usize,
    pub no_evidence: usize,
    pub location_is_suburb: usize,
    pub excluded_category: usize,
}

impl DropCounts {
    fn bump(&mut self, reason: DropReason) {
        match reason {
            DropReason::Duplicate => self.duplicate += 1,
            DropReason::NoEvidence => self.no_evidence += 1,
            DropReason::LocationIsSuburb => self.location_is_suburb += 1,
            DropReason::ExcludedCategory => self.excluded_category += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.duplicate + self.no_evidence + self.location_is_suburb + self.excluded_category
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prepared {
    pub rows: Vec<Row>,
    pub dropped: DropCounts,
}

impl Prepared {
    pub fn retained(&self) -> usize {
        self.rows.len()
    }
}

/// Drops, in order: duplicates of (location, truth, country, state, suburb),
/// rows without any evidence, rows whose location just repeats the suburb,
/// and rows whose truth is an excluded category.
#[derive(Debug, Clone)]
pub struct DatasetPreparer {
    excluded: Vec<Category>,
}

impl Default for DatasetPreparer {
    fn default() -> Self {
        Self::new(Category::UNRELIABLE.to_vec())
    }
}

impl DatasetPreparer {
    pub fn new(excluded: Vec<Category>) -> Self {
        Self { excluded }
    }

    fn check(&self, row: &Row) -> Option<DropReason> {
        if row.evidence.is_empty() {
            Some(DropReason::NoEvidence)
        } else if row.location == row.suburb {
            Some(DropReason::LocationIsSuburb)
        } else if row.truth.is_some_and(|t| self.excluded.contains(&t)) {
            Some(DropReason::ExcludedCategory)
        } else {
            None
        }
    }

    pub fn prepare(&self, rows: Vec<Row>) -> Prepared {
        let mut seen = HashSet::new();
        let mut dropped = DropCounts::default();
        let mut kept = Vec::with_capacity(rows.len());

        for row in rows {
            let identity = (
                row.location.clone(),
                row.truth,
                row.country.clone(),
                row.state.clone(),
                row.suburb.clone(),
            );
            let reason = if seen.insert(identity) {
                self.check(&row)
            } else {
                Some(DropReason::Duplicate)
            };
            match reason {
                Some(reason) => {
                    tracing::trace!(row = %row.row_key(), ?reason, "dropped");
                    dropped.bump(reason);
                }
                None => kept.push(row),
            }
        }

        tracing::info!(retained = kept.len(), dropped = dropped.total(), "dataset prepared");
        Prepared { rows: kept, dropped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::place::RawPlace;
    use chrono::NaiveDate;
    use serde_json::json;

    fn row(location: &str, suburb: &str, truth: Option<Category>, with_evidence: bool) -> Row {
        let mut r = Row::new(location, suburb, "Victoria", "Australia", NaiveDate::from_ymd_opt(2022, 5, 1).unwrap(), truth);
        if with_evidence {
            r.evidence.osm = Some(RawPlace::new(json!({"tags": {"amenity": "cafe"}})));
        }
        r
    }

    #[test]
    fn test_duplicates_collapse_to_first() {
        let mut second = row("Cafe X", "Fitzroy", Some(Category::Cafe), true);
        second.date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let out = DatasetPreparer::default().prepare(vec![row("Cafe X", "Fitzroy", Some(Category::Cafe), true), second]);
        assert_eq!(out.retained(), 1);
        assert_eq!(out.rows[0].date, NaiveDate::from_ymd_opt(2022, 5, 1).unwrap());
        assert_eq!(out.dropped.duplicate, 1);
    }

    #[test]
    fn test_same_place_different_truth_kept() {
        let out = DatasetPreparer::default().prepare(vec![
            row("Cafe X", "Fitzroy", Some(Category::Cafe), true),
            row("Cafe X", "Fitzroy", Some(Category::Bakery), true),
        ]);
        assert_eq!(out.retained(), 2);
    }

    #[test]
    fn test_no_evidence_dropped() {
        let out = DatasetPreparer::default().prepare(vec![row("Cafe X", "Fitzroy", Some(Category::Cafe), false)]);
        assert_eq!(out.retained(), 0);
        assert_eq!(out.dropped.no_evidence, 1);
    }

    #[test]
    fn test_location_equal_to_suburb_dropped() {
        let out = DatasetPreparer::default().prepare(vec![row("Fitzroy", "Fitzroy", Some(Category::Cafe), true)]);
        assert_eq!(out.dropped.location_is_suburb, 1);
    }

    #[test]
    fn test_excluded_categories_dropped() {
        let rows = Category::UNRELIABLE
            .iter()
            .map(|c| row(&format!("Spot {}", c), "Fitzroy", Some(*c), true))
            .chain(std::iter::once(row("Spot", "Fitzroy", None, true)))
            .collect();
        let out = DatasetPreparer::default().prepare(rows);
        assert_eq!(out.dropped.excluded_category, 3);
        assert_eq!(out.retained(), 1);
        assert_eq!(out.dropped.total(), 3);
    }
}
