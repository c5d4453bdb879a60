use crate::models::{Delta, ListingSet};

/// Result of comparing two snapshots of the same query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// There was no previous snapshot, so nothing can be called new yet.
    Baseline,
    NewItems(Delta),
}

impl DiffOutcome {
    pub fn is_baseline(&self) -> bool {
        matches!(self, DiffOutcome::Baseline)
    }

    /// The new listings. Always empty for a baseline.
    pub fn into_delta(self) -> Delta {
        match self {
            DiffOutcome::Baseline => Delta::new(),
            DiffOutcome::NewItems(delta) => delta,
        }
    }
}

/// Listings in `current` that are absent from `previous` and flagged fresh by the source.
///
/// An id that shows up without the fresh flag is usually an older listing that
/// shifted onto the first page, so it is left out. Records already known by id
/// are never new, whatever their fields changed to.
pub fn diff(previous: &ListingSet, current: &ListingSet) -> DiffOutcome {
    if previous.is_empty() {
        return DiffOutcome::Baseline;
    }

    let delta = current
        .iter()
        .filter(|record| record.is_fresh && !previous.contains(&record.id))
        .cloned()
        .collect();

    DiffOutcome::NewItems(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListingRecord;
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn record(id: &str, price: i64, is_fresh: bool) -> ListingRecord {
        ListingRecord::new(
            id,
            format!("Item {}", id),
            Decimal::from(price),
            format!("https://www.vinted.pl/items/{}", id),
            is_fresh,
        )
    }

    fn set(records: &[ListingRecord]) -> ListingSet {
        records.iter().cloned().collect()
    }

    #[test]
    fn test_first_observation_is_baseline() {
        let current = set(&[ListingRecord::new("1", "Shoe", Decimal::from(50), "u1", true)]);

        let outcome = diff(&ListingSet::new(), &current);
        assert!(outcome.is_baseline());
        assert!(outcome.into_delta().is_empty());
    }

    #[test]
    fn test_empty_previous_and_current_is_baseline() {
        assert_eq!(diff(&ListingSet::new(), &ListingSet::new()), DiffOutcome::Baseline);
    }

    #[rstest]
    #[case::fresh_new_id(true, &["2"])]
    #[case::stale_new_id(false, &[])]
    fn test_new_id_is_gated_on_freshness(#[case] is_fresh: bool, #[case] expected: &[&str]) {
        let previous = set(&[record("1", 50, true)]);
        let current = set(&[record("1", 50, true), record("2", 70, is_fresh)]);

        let delta = diff(&previous, &current).into_delta();
        assert_eq!(delta.ids().collect::<Vec<_>>(), expected);
    }

    #[rstest]
    #[case::price_change(record("1", 45, true))]
    #[case::stale_flag(record("1", 50, false))]
    #[case::title_change(ListingRecord::new("1", "Renamed", Decimal::from(50), "u1", true))]
    fn test_known_id_is_never_new(#[case] changed: ListingRecord) {
        let previous = set(&[record("1", 50, false)]);
        let current = set(&[changed]);

        assert!(diff(&previous, &current).into_delta().is_empty());
    }

    #[test]
    fn test_empty_current_yields_empty_delta() {
        let previous = set(&[record("1", 50, true)]);

        let outcome = diff(&previous, &ListingSet::new());
        assert_eq!(outcome, DiffOutcome::NewItems(ListingSet::new()));
    }

    #[test]
    fn test_delta_keeps_full_records() {
        let previous = set(&[record("1", 50, true)]);
        let fresh = record("7", 120, true).with_currency("PLN");
        let current = set(&[record("1", 50, true), fresh.clone(), record("8", 10, false)]);

        let delta = diff(&previous, &current).into_delta();
        assert_eq!(delta.len(), 1);
        assert_eq!(delta.get("7"), Some(&fresh));
    }

    #[test]
    fn test_diff_is_idempotent() {
        let previous = set(&[record("1", 50, true), record("2", 60, false)]);
        let current = set(&[
            record("2", 65, true),
            record("3", 70, true),
            record("4", 80, false),
            record("5", 90, true),
        ]);

        let first = diff(&previous, &current);
        let second = diff(&previous, &current);
        assert_eq!(first, second);
        assert_eq!(first.into_delta().ids().collect::<Vec<_>>(), vec!["3", "5"]);
    }
}
