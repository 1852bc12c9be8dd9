use crate::query::{Indicator, TrendPoint};
use crate::snapshot::{category_counts, latest_date, snapshot};
use crate::types::{
    CategoryCount, RunSummary, ScaledRow, SnapshotRow, SnapshotTableRow, TrendTableRow,
};
use crate::util::{format_delta, format_opt};
use std::collections::HashSet;

pub fn generate_summary(rows: &[ScaledRow]) -> RunSummary {
    let regions: HashSet<_> = rows.iter().map(ScaledRow::region).collect();
    let latest = latest_date(rows);
    let latest_categories = latest
        .map(|d| category_counts(&snapshot(rows, d, Indicator::Scaled)))
        .unwrap_or_default()
        .into_iter()
        .map(|(category, regions)| CategoryCount { category, regions })
        .collect();
    RunSummary {
        total_rows: rows.len(),
        total_regions: regions.len(),
        first_date: rows.iter().map(ScaledRow::date).min(),
        latest_date: latest,
        latest_categories,
    }
}

pub fn snapshot_table(rows: &[SnapshotRow]) -> Vec<SnapshotTableRow> {
    rows.iter()
        .map(|r| SnapshotTableRow {
            region: r.region.to_string(),
            value: format_opt(r.value, 3),
            score: format_opt(r.scaled_0_100, 1),
            mom: format_delta(r.mom),
            yoy: format_delta(r.yoy),
            category: r.category.to_string(),
        })
        .collect()
}

pub fn trend_table(points: &[TrendPoint]) -> Vec<TrendTableRow> {
    points
        .iter()
        .map(|p| TrendTableRow {
            month: p.date.format("%Y-%m").to_string(),
            regions: p.regions,
            mean: format_opt(p.mean, 3),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompositeRow, RegionKey, RiskCategory};
    use chrono::NaiveDate;

    fn row(area: &str, m: u32, scaled: Option<f64>) -> ScaledRow {
        ScaledRow {
            composite: CompositeRow::empty(
                RegionKey::admin("Kenya", area),
                NaiveDate::from_ymd_opt(2022, m, 1).unwrap(),
            ),
            scaled_0_100: scaled,
            iso3_code: None,
            continent: None,
        }
    }

    #[test]
    fn summary_counts_latest_categories() {
        let rows = vec![
            row("Turkana", 1, Some(10.0)),
            row("Turkana", 2, Some(80.0)),
            row("Wajir", 2, Some(45.0)),
        ];
        let s = generate_summary(&rows);
        assert_eq!(s.total_rows, 3);
        assert_eq!(s.total_regions, 2);
        assert_eq!(s.first_date, NaiveDate::from_ymd_opt(2022, 1, 1));
        assert_eq!(s.latest_date, NaiveDate::from_ymd_opt(2022, 2, 1));
        let extreme = s
            .latest_categories
            .iter()
            .find(|c| c.category == RiskCategory::Extreme)
            .unwrap();
        assert_eq!(extreme.regions, 1);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"latest_date\":\"2022-02-01\""));
    }

    #[test]
    fn empty_table_summary() {
        let s = generate_summary(&[]);
        assert_eq!(s.total_rows, 0);
        assert!(s.latest_date.is_none());
        assert!(s.latest_categories.is_empty());
    }

    #[test]
    fn snapshot_table_formats_missing_as_dash() {
        let date = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let rows = snapshot(&[row("Turkana", 1, None)], date, Indicator::Scaled);
        let table = snapshot_table(&rows);
        assert_eq!(table[0].score, "-");
        assert_eq!(table[0].category, "No data");
        assert_eq!(table[0].region, "Kenya / Turkana");
    }
}
