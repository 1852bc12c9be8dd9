//! Read-side helpers for the dashboard: region filters, indicator selection,
//! ranked snapshots and portfolio trends over a computed indicator table.

use crate::snapshot::snapshot;
use crate::types::{RegionKey, ScaledRow, SnapshotRow};
use crate::util::mean_of_present;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A column of the indicator table that can be mapped or charted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Indicator {
    #[default]
    Smoothed,
    RiskIndex,
    NdviStress,
    RainDeficit,
    SoilDryness,
    Scaled,
}

impl Indicator {
    pub const ALL: [Indicator; 6] = [
        Indicator::Smoothed,
        Indicator::RiskIndex,
        Indicator::NdviStress,
        Indicator::RainDeficit,
        Indicator::SoilDryness,
        Indicator::Scaled,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Indicator::Smoothed => "risk_index_sm3",
            Indicator::RiskIndex => "risk_index",
            Indicator::NdviStress => "ndvi_stress",
            Indicator::RainDeficit => "rain_deficit",
            Indicator::SoilDryness => "soil_dryness",
            Indicator::Scaled => "scaled_0_100",
        }
    }

    pub fn value(self, row: &ScaledRow) -> Option<f64> {
        let c = &row.composite;
        match self {
            Indicator::Smoothed => c.risk_index_smoothed,
            Indicator::RiskIndex => c.risk_index,
            Indicator::NdviStress => c.ndvi_stress,
            Indicator::RainDeficit => c.rain_deficit,
            Indicator::SoilDryness => c.soil_dryness,
            Indicator::Scaled => row.scaled_0_100,
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Indicator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "risk_index_smoothed" {
            return Ok(Indicator::Smoothed);
        }
        Indicator::ALL
            .into_iter()
            .find(|i| i.column() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Indicator::ALL.iter().map(|i| i.column()).collect();
                format!("unknown indicator '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// What the dashboard is currently looking at.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Countries to keep; empty keeps all. Grid cells have no country and
    /// are only kept when this is empty.
    pub countries: Vec<String>,
    pub indicator: Indicator,
    /// Reference date; `None` means the latest date after filtering.
    pub date: Option<NaiveDate>,
}

impl Filter {
    pub fn matches(&self, row: &ScaledRow) -> bool {
        self.matches_region(row.region())
    }

    pub fn matches_region(&self, region: &RegionKey) -> bool {
        self.countries.is_empty()
            || region
                .country()
                .is_some_and(|c| self.countries.iter().any(|s| s == c))
    }

    pub fn apply(&self, rows: &[ScaledRow]) -> Vec<ScaledRow> {
        rows.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

/// Distinct countries, sorted, for the region selector.
pub fn countries(rows: &[ScaledRow]) -> Vec<String> {
    let mut out: Vec<String> = rows
        .iter()
        .filter_map(|r| r.region().country().map(str::to_string))
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Snapshot of the selected regions at the filter's date, or at the latest
/// date among them.
///
/// Deltas are computed against the whole table before the country subset is
/// applied, so they do not depend on which countries are selected.
pub fn filtered_snapshot(
    rows: &[ScaledRow],
    filter: &Filter,
) -> Option<(NaiveDate, Vec<SnapshotRow>)> {
    let date = filter.date.or_else(|| {
        rows.iter()
            .filter(|r| filter.matches(r))
            .map(ScaledRow::date)
            .max()
    })?;
    let snap = snapshot(rows, date, filter.indicator)
        .into_iter()
        .filter(|r| filter.matches_region(&r.region))
        .collect();
    Some((date, snap))
}

/// Snapshot rows ordered by value, highest first; missing values last.
pub fn rank_descending(mut rows: Vec<SnapshotRow>) -> Vec<SnapshotRow> {
    rows.sort_by(|a, b| match (a.value, b.value) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.region.cmp(&b.region),
    });
    rows
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub regions: usize,
    pub mean: Option<f64>,
}

/// Mean of the indicator across regions for every date, ascending.
pub fn portfolio_trend(rows: &[ScaledRow], indicator: Indicator) -> Vec<TrendPoint> {
    let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    for r in rows {
        by_date.entry(r.date()).or_default().push(indicator.value(r));
    }
    by_date
        .into_iter()
        .map(|(date, values)| TrendPoint {
            date,
            regions: values.len(),
            mean: mean_of_present(values),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompositeRow, RegionKey, RiskCategory};

    fn d(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, m, 1).unwrap()
    }

    fn row(country: &str, area: &str, date: NaiveDate, risk: Option<f64>) -> ScaledRow {
        let mut composite = CompositeRow::empty(RegionKey::admin(country, area), date);
        composite.risk_index = risk;
        composite.risk_index_smoothed = risk;
        ScaledRow {
            composite,
            scaled_0_100: None,
            iso3_code: None,
            continent: None,
        }
    }

    #[test]
    fn indicator_names_round_trip() {
        for i in Indicator::ALL {
            assert_eq!(i.column().parse::<Indicator>().unwrap(), i);
        }
        assert_eq!(
            "risk_index_smoothed".parse::<Indicator>().unwrap(),
            Indicator::Smoothed
        );
        assert!("rainfall".parse::<Indicator>().is_err());
    }

    #[test]
    fn filter_by_country_subset() {
        let rows = vec![
            row("Kenya", "Turkana", d(1), Some(1.0)),
            row("Somalia", "Bay", d(1), Some(2.0)),
            row("Ethiopia", "Afar", d(1), Some(3.0)),
        ];
        let filter = Filter {
            countries: vec!["Kenya".into(), "Ethiopia".into()],
            ..Filter::default()
        };
        let kept = filter.apply(&rows);
        assert_eq!(kept.len(), 2);
        assert_eq!(Filter::default().apply(&rows).len(), 3);
        assert_eq!(countries(&rows), vec!["Ethiopia", "Kenya", "Somalia"]);
    }

    #[test]
    fn trend_averages_present_values_per_date() {
        let rows = vec![
            row("Kenya", "Turkana", d(1), Some(1.0)),
            row("Kenya", "Wajir", d(1), Some(3.0)),
            row("Kenya", "Turkana", d(2), None),
            row("Kenya", "Wajir", d(2), Some(-1.0)),
        ];
        let trend = portfolio_trend(&rows, Indicator::RiskIndex);
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].mean, Some(2.0));
        assert_eq!(trend[1].mean, Some(-1.0));
        assert_eq!(trend[1].regions, 2);
    }

    #[test]
    fn filtered_snapshot_deltas_ignore_country_subset() {
        let scaled = |mut r: ScaledRow, v: f64| {
            r.scaled_0_100 = Some(v);
            r
        };
        // Kenya skips February; Ethiopia reports it.
        let rows = vec![
            scaled(row("Kenya", "Turkana", d(1), Some(1.0)), 40.0),
            scaled(row("Ethiopia", "Afar", d(2), Some(1.0)), 50.0),
            scaled(row("Kenya", "Turkana", d(3), Some(2.0)), 60.0),
            scaled(row("Ethiopia", "Afar", d(3), Some(1.0)), 30.0),
        ];
        let kenya = Filter {
            countries: vec!["Kenya".into()],
            ..Filter::default()
        };
        let (date, snap) = filtered_snapshot(&rows, &kenya).unwrap();
        assert_eq!(date, d(3));
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].mom, None);

        let (_, all) = filtered_snapshot(&rows, &Filter::default()).unwrap();
        assert_eq!(all.len(), 2);
        let turkana = all.iter().find(|r| r.region.area() == Some("Turkana")).unwrap();
        assert_eq!(turkana.mom, snap[0].mom);

        let pinned = Filter {
            date: Some(d(2)),
            ..kenya
        };
        let (_, empty) = filtered_snapshot(&rows, &pinned).unwrap();
        assert!(empty.is_empty());
        assert!(filtered_snapshot(&[], &Filter::default()).is_none());
    }

    #[test]
    fn ranking_puts_missing_last() {
        let snap = |area: &str, v: Option<f64>| SnapshotRow {
            region: RegionKey::admin("Kenya", area),
            date: d(1),
            value: v,
            scaled_0_100: None,
            mom: None,
            yoy: None,
            category: RiskCategory::NoData,
        };
        let ranked = rank_descending(vec![
            snap("A", Some(0.5)),
            snap("B", None),
            snap("C", Some(2.0)),
        ]);
        let order: Vec<Option<&str>> = ranked.iter().map(|r| r.region.area()).collect();
        assert_eq!(order, vec![Some("C"), Some("A"), Some("B")]);
    }
}
