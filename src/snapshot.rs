use crate::query::Indicator;
use crate::types::{RegionKey, RiskCategory, ScaledRow, SnapshotRow};
use crate::util::months_before;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Latest date present, the default reference date.
pub fn latest_date(rows: &[ScaledRow]) -> Option<NaiveDate> {
    rows.iter().map(ScaledRow::date).max()
}

/// The largest distinct date strictly before `date`, if any.
///
/// Gaps in the data are not filled: with no row at `date - 1 month` this is
/// whatever earlier month is present.
pub fn preceding_date(rows: &[ScaledRow], date: NaiveDate) -> Option<NaiveDate> {
    rows.iter().map(ScaledRow::date).filter(|d| *d < date).max()
}

/// One row per region present at `date`, with MoM / YoY deltas of
/// `scaled_0_100` and the risk bucket.
///
/// YoY compares against exactly twelve calendar months earlier and is
/// missing when that month has no row for the region.
pub fn snapshot(rows: &[ScaledRow], date: NaiveDate, indicator: Indicator) -> Vec<SnapshotRow> {
    let scaled: HashMap<(&RegionKey, NaiveDate), Option<f64>> = rows
        .iter()
        .map(|r| ((r.region(), r.date()), r.scaled_0_100))
        .collect();
    let previous = preceding_date(rows, date);
    let year_ago = months_before(date, 12);

    let mut out: Vec<SnapshotRow> = rows
        .iter()
        .filter(|r| r.date() == date)
        .map(|r| SnapshotRow {
            region: r.region().clone(),
            date,
            value: indicator.value(r),
            scaled_0_100: r.scaled_0_100,
            mom: delta(&scaled, r.region(), r.scaled_0_100, previous),
            yoy: delta(&scaled, r.region(), r.scaled_0_100, year_ago),
            category: RiskCategory::from_scaled(r.scaled_0_100),
        })
        .collect();
    out.sort_by(|a, b| a.region.cmp(&b.region));
    out
}

fn delta<'a>(
    scaled: &HashMap<(&'a RegionKey, NaiveDate), Option<f64>>,
    region: &'a RegionKey,
    current: Option<f64>,
    other: Option<NaiveDate>,
) -> Option<f64> {
    let before = scaled.get(&(region, other?)).copied().flatten()?;
    Some(current? - before)
}

/// Region count per category among snapshot rows, in category order.
pub fn category_counts(rows: &[SnapshotRow]) -> Vec<(RiskCategory, usize)> {
    RiskCategory::ALL
        .iter()
        .map(|c| (*c, rows.iter().filter(|r| r.category == *c).count()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CompositeRow;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn row(area: &str, date: NaiveDate, scaled: Option<f64>) -> ScaledRow {
        let mut composite = CompositeRow::empty(RegionKey::admin("Kenya", area), date);
        composite.risk_index_smoothed = scaled.map(|s| s / 100.0);
        ScaledRow {
            composite,
            scaled_0_100: scaled,
            iso3_code: None,
            continent: None,
        }
    }

    #[test]
    fn mom_uses_preceding_present_date_across_gaps() {
        let rows = vec![
            row("Turkana", d(2020, 1), Some(40.0)),
            row("Turkana", d(2020, 4), Some(70.0)),
        ];
        assert_eq!(preceding_date(&rows, d(2020, 4)), Some(d(2020, 1)));
        let snap = snapshot(&rows, d(2020, 4), Indicator::Scaled);
        assert_eq!(snap.len(), 1);
        assert_relative_eq!(snap[0].mom.unwrap(), 30.0);
        assert_eq!(snap[0].category, RiskCategory::Extreme);
    }

    #[test]
    fn yoy_missing_without_twelve_months_of_history() {
        let rows: Vec<ScaledRow> = (1..=6)
            .map(|m| row("Turkana", d(2020, m), Some(10.0 * m as f64)))
            .collect();
        let snap = snapshot(&rows, d(2020, 6), Indicator::Scaled);
        assert_relative_eq!(snap[0].mom.unwrap(), 10.0);
        assert_eq!(snap[0].yoy, None);
    }

    #[test]
    fn yoy_requires_exact_month_twelve_back() {
        let rows = vec![
            row("Turkana", d(2019, 2), Some(90.0)),
            row("Turkana", d(2019, 3), Some(20.0)),
            row("Turkana", d(2020, 3), Some(50.0)),
        ];
        let snap = snapshot(&rows, d(2020, 3), Indicator::Scaled);
        assert_relative_eq!(snap[0].yoy.unwrap(), 30.0);

        let gapped = vec![
            row("Turkana", d(2019, 2), Some(90.0)),
            row("Turkana", d(2020, 3), Some(50.0)),
        ];
        let snap = snapshot(&gapped, d(2020, 3), Indicator::Scaled);
        assert_eq!(snap[0].yoy, None);
        assert_relative_eq!(snap[0].mom.unwrap(), -40.0);
    }

    #[test]
    fn missing_score_gives_no_data_and_no_deltas() {
        let rows = vec![
            row("Turkana", d(2020, 1), Some(40.0)),
            row("Turkana", d(2020, 2), None),
            row("Wajir", d(2020, 1), None),
            row("Wajir", d(2020, 2), Some(55.0)),
        ];
        let snap = snapshot(&rows, d(2020, 2), Indicator::Scaled);
        assert_eq!(snap[0].category, RiskCategory::NoData);
        assert_eq!(snap[0].mom, None);
        assert_eq!(snap[1].category, RiskCategory::High);
        assert_eq!(snap[1].mom, None);
    }

    #[test]
    fn first_date_has_no_mom() {
        let rows = vec![row("Turkana", d(2020, 1), Some(40.0))];
        assert_eq!(latest_date(&rows), Some(d(2020, 1)));
        let snap = snapshot(&rows, d(2020, 1), Indicator::Scaled);
        assert_eq!(snap[0].mom, None);
    }

    #[test]
    fn counts_cover_every_category() {
        let rows = vec![
            row("A", d(2020, 1), Some(5.0)),
            row("B", d(2020, 1), Some(75.0)),
            row("C", d(2020, 1), None),
        ];
        let counts = category_counts(&snapshot(&rows, d(2020, 1), Indicator::Scaled));
        assert_eq!(counts.len(), 5);
        assert_eq!(counts[0], (RiskCategory::Low, 1));
        assert_eq!(counts[3], (RiskCategory::Extreme, 1));
        assert_eq!(counts[4], (RiskCategory::NoData, 1));
    }
}
