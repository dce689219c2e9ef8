//! Turning per-row evidence into predictions and scoring them against truth.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::category::Category;
use crate::place::Prediction;
use crate::provider::Provider;
use crate::row::Row;
use crate::rules;

/// Predictions grouped by the provider that produced them.
pub type ProviderGroups<T> = BTreeMap<Provider, Vec<T>>;

/// Every prediction for `row`, providers in the fixed order.
pub fn predict_row(row: &Row, cutoff: NaiveDate) -> Vec<Prediction> {
    row.evidence
        .present()
        .flat_map(|(provider, raw)| rules::classify(provider, raw, row.date, cutoff))
        .collect()
}

/// First-match-wins selection against `truth`.
///
/// Returns the predicted category and, on a hit, the prediction that produced
/// it. With predictions but no hit, the first prediction's category stands;
/// with no predictions at all, the fallback.
pub fn select(predictions: &[Prediction], truth: Category) -> (Category, Option<&Prediction>) {
    if let Some(hit) = predictions.iter().find(|p| p.category == truth) {
        return (hit.category, Some(hit));
    }
    let category = predictions.first().map_or(Category::FALLBACK, |p| p.category);
    (category, None)
}

pub fn group_by_provider(predictions: Vec<Prediction>) -> ProviderGroups<Prediction> {
    let mut groups = ProviderGroups::new();
    for p in predictions {
        groups.entry(p.provider).or_insert_with(Vec::new).push(p);
    }
    groups
}

/// How often each (provider, native label) pair produced a correct prediction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagUsage(BTreeMap<Provider, BTreeMap<String, u32>>);

impl TagUsage {
    pub fn record(&mut self, provider: Provider, label: &str) {
        *self.0.entry(provider).or_default().entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, provider: Provider, label: &str) -> u32 {
        self.0.get(&provider).and_then(|m| m.get(label)).copied().unwrap_or(0)
    }

    /// Hits attributed to `provider`.
    pub fn total(&self, provider: Provider) -> u32 {
        self.0.get(&provider).map_or(0, |m| m.values().sum())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Provider, &BTreeMap<String, u32>)> {
        self.0.iter().map(|(p, m)| (*p, m))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-provider evidence counts over a set of rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub rows: usize,
    /// Rows with evidence from the provider.
    pub with_evidence: BTreeMap<Provider, usize>,
    /// Rows with evidence from that provider and no other.
    pub only: BTreeMap<Provider, usize>,
}

impl Coverage {
    pub fn of(rows: &[Row]) -> Self {
        let mut coverage = Self {
            rows: rows.len(),
            ..Self::default()
        };
        for provider in Provider::ORDER {
            coverage.with_evidence.insert(provider, 0);
            coverage.only.insert(provider, 0);
        }
        for row in rows {
            let present: Vec<Provider> = row.evidence.present().map(|(p, _)| p).collect();
            for p in &present {
                *coverage.with_evidence.entry(*p).or_default() += 1;
            }
            if let [single] = present.as_slice() {
                *coverage.only.entry(*single).or_default() += 1;
            }
        }
        coverage
    }

    /// Share of rows with evidence from `provider`, in percent.
    pub fn percent(&self, provider: Provider) -> f64 {
        if self.rows == 0 {
            return 0.0;
        }
        let n = self.with_evidence.get(&provider).copied().unwrap_or(0);
        n as f64 * 100.0 / self.rows as f64
    }
}

/// The classification outcome for one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRow {
    pub row_key: String,
    pub truth: Option<Category>,
    /// Selected category; absent when there was no truth to select against.
    pub predicted: Option<Category>,
    /// The prediction that matched the truth.
    pub matched: Option<Prediction>,
    pub by_provider: ProviderGroups<Prediction>,
}

impl ScoredRow {
    pub fn is_hit(&self) -> bool {
        self.matched.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    pub rows: Vec<ScoredRow>,
    pub usage: TagUsage,
    pub coverage: Coverage,
}

impl Reconciliation {
    /// Rows that had a truth to score against.
    pub fn scored(&self) -> impl Iterator<Item = &ScoredRow> {
        self.rows.iter().filter(|r| r.truth.is_some())
    }

    pub fn hits(&self) -> usize {
        self.rows.iter().filter(|r| r.is_hit()).count()
    }

    /// Hits over scored rows.
    pub fn accuracy(&self) -> f64 {
        let scored = self.scored().count();
        if scored == 0 {
            return 0.0;
        }
        self.hits() as f64 / scored as f64
    }
}

/// Score every row. Deterministic for a given input: providers are visited
/// in the fixed order and the first matching prediction wins.
pub fn reconcile(rows: &[Row], cutoff: NaiveDate) -> Reconciliation {
    let mut usage = TagUsage::default();
    let mut scored = Vec::with_capacity(rows.len());

    for row in rows {
        let predictions = predict_row(row, cutoff);
        let (predicted, matched) = match row.truth {
            Some(truth) => {
                let (category, hit) = select(&predictions, truth);
                if let Some(hit) = hit {
                    usage.record(hit.provider, &hit.label);
                } else if truth != Category::FALLBACK {
                    tracing::debug!(
                        row = %row.row_key(),
                        %truth,
                        predicted = %category,
                        candidates = predictions.len(),
                        evidence = ?row.evidence.present().map(|(p, raw)| (p, raw.as_value())).collect::<Vec<_>>(),
                        "no prediction matched"
                    );
                }
                (Some(category), hit.cloned())
            }
            None => (None, None),
        };
        scored.push(ScoredRow {
            row_key: row.row_key(),
            truth: row.truth,
            predicted,
            matched,
            by_provider: group_by_provider(predictions),
        });
    }

    let result = Reconciliation {
        rows: scored,
        usage,
        coverage: Coverage::of(rows),
    };
    tracing::info!(
        rows = result.rows.len(),
        hits = result.hits(),
        accuracy = result.accuracy(),
        "reconciliation complete"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::place::RawPlace;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(truth: Option<Category>, observed: NaiveDate) -> Row {
        Row::new("Burger Barn", "Fitzroy", "Victoria", "Australia", observed, truth)
    }

    fn cutoff() -> NaiveDate {
        rules::default_cutoff()
    }

    #[test]
    fn test_second_provider_hit_wins() {
        let mut r = row(Some(Category::BurgerPlace), date(2022, 1, 5));
        r.evidence.osm = Some(RawPlace::new(json!({"tags": {"amenity": "restaurant"}})));
        r.evidence.yelp = Some(RawPlace::new(json!({"categories": [{"alias": "burgers"}]})));

        let out = reconcile(&[r], cutoff());
        let scored = &out.rows[0];
        assert_eq!(scored.predicted, Some(Category::BurgerPlace));
        assert_eq!(scored.matched.as_ref().map(|p| p.provider), Some(Provider::Yelp));
        assert_eq!(out.usage.get(Provider::Yelp, "burgers"), 1);
        assert_eq!(out.usage.total(Provider::Osm), 0);
    }

    #[test]
    fn test_fast_food_reading_changes_at_cutoff() {
        let mut before = row(None, date(2021, 12, 17));
        before.evidence.osm = Some(RawPlace::new(json!({"tags": {"amenity": "fast_food"}})));
        let mut after = before.clone();
        after.date = date(2021, 12, 18);

        assert_eq!(
            predict_row(&before, cutoff()),
            vec![Prediction::new(Category::Restaurant, Provider::Osm, "fast_food")]
        );
        assert_eq!(
            predict_row(&after, cutoff()),
            vec![Prediction::new(Category::BurgerPlace, Provider::Osm, "fast_food")]
        );
    }

    #[test]
    fn test_select_fallbacks() {
        let preds = vec![Prediction::new(Category::Cafe, Provider::Osm, "cafe")];
        assert_eq!(select(&preds, Category::Bakery), (Category::Cafe, None));
        assert_eq!(select(&[], Category::Bakery), (Category::Roadside, None));
    }

    #[test]
    fn test_deterministic_across_runs() {
        let mut r = row(Some(Category::Cafe), date(2022, 1, 1));
        r.evidence.osm = Some(RawPlace::new(json!({"tags": {"amenity": "cafe"}})));
        r.evidence.google_places = Some(RawPlace::new(json!({"types": ["cafe", "food"]})));
        let rows = vec![r.clone(), r];
        let a = reconcile(&rows, cutoff());
        let b = reconcile(&rows, cutoff());
        assert_eq!(a, b);
        assert_eq!(a.usage.get(Provider::Osm, "cafe"), 2);
        assert_eq!(a.usage.total(Provider::GooglePlaces), 0);
    }

    #[test]
    fn test_without_truth_groups_by_provider() {
        let mut r = row(None, date(2022, 1, 1));
        r.evidence.osm = Some(RawPlace::new(json!({"tags": {"amenity": "cafe"}})));
        r.evidence.google_places = Some(RawPlace::new(json!({"types": ["cafe"]})));
        let out = reconcile(&[r], cutoff());
        let scored = &out.rows[0];
        assert_eq!(scored.predicted, None);
        assert_eq!(scored.by_provider.len(), 2);
        assert!(out.usage.is_empty());
        assert_relative_eq!(out.accuracy(), 0.0);
    }

    #[test]
    fn test_coverage_counts() {
        let mut a = row(None, date(2022, 1, 1));
        a.evidence.osm = Some(RawPlace::new(json!({})));
        let mut b = a.clone();
        b.evidence.yelp = Some(RawPlace::new(json!({})));
        let c = row(None, date(2022, 1, 1));

        let cov = Coverage::of(&[a, b, c]);
        assert_eq!(cov.rows, 3);
        assert_eq!(cov.with_evidence[&Provider::Osm], 2);
        assert_eq!(cov.only[&Provider::Osm], 1);
        assert_eq!(cov.only[&Provider::Yelp], 0);
        assert_relative_eq!(cov.percent(Provider::Osm), 200.0 / 3.0);
    }

    #[test]
    fn test_accuracy() {
        let mut hit = row(Some(Category::Cafe), date(2022, 1, 1));
        hit.evidence.osm = Some(RawPlace::new(json!({"tags": {"amenity": "cafe"}})));
        let miss = row(Some(Category::Bakery), date(2022, 1, 1));
        let out = reconcile(&[hit, miss], cutoff());
        assert_eq!(out.rows[1].predicted, Some(Category::Roadside));
        assert_relative_eq!(out.accuracy(), 0.5);
    }
}
