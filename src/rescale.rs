// Cross-sectional percentile rescaling.
//
// Every date is ranked on its own; a region's score never depends on its
// history, only on the other regions reporting that month.
use crate::types::{CompositeRow, ScaledRow};
use crate::util::round_to;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Percentile ranks (0-100, one decimal) for a slice of values.
///
/// Rank is `average_rank / n * 100` where `n` counts present values and
/// ties share their average rank. Missing values get `None`.
pub fn percentile_ranks(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
        .collect();
    present.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let n = present.len() as f64;
    let mut out = vec![None; values.len()];
    let mut i = 0;
    while i < present.len() {
        let mut j = i;
        while j + 1 < present.len() && present[j + 1].1 == present[i].1 {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 share their mean.
        let avg_rank = (i + j + 2) as f64 / 2.0;
        let pct = round_to(avg_rank / n * 100.0, 1);
        for (idx, _) in &present[i..=j] {
            out[*idx] = Some(pct);
        }
        i = j + 1;
    }
    out
}

/// Attach `scaled_0_100` to every row, ranking `risk_index_smoothed` within
/// each date. Row order is preserved.
pub fn rescale_by_date(rows: Vec<CompositeRow>) -> Vec<ScaledRow> {
    let mut by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        by_date.entry(row.date).or_default().push(i);
    }

    let mut scaled = vec![None; rows.len()];
    for indices in by_date.values() {
        let values: Vec<Option<f64>> = indices
            .iter()
            .map(|&i| rows[i].risk_index_smoothed)
            .collect();
        for (&i, pct) in indices.iter().zip(percentile_ranks(&values)) {
            scaled[i] = pct;
        }
    }

    rows.into_iter()
        .zip(scaled)
        .map(|(composite, scaled_0_100)| ScaledRow {
            composite,
            scaled_0_100,
            iso3_code: None,
            continent: None,
        })
        .collect()
}
