// Composite risk index and its trailing 3-month smoothing.
use crate::types::{CompositeRow, RegionKey, RiskComponent, Variable};
use crate::util::mean_of_present;
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub const SMOOTHING_WINDOW: usize = 3;

/// Full outer join of the component series on (region, date).
///
/// A pair present in any input appears once in the output; components that
/// the pair lacks stay `None`. `risk_index` is the mean of the present
/// components. Rows come back sorted by (region, date).
pub fn merge_components(components: Vec<(Variable, Vec<RiskComponent>)>) -> Vec<CompositeRow> {
    let mut table: BTreeMap<(RegionKey, NaiveDate), CompositeRow> = BTreeMap::new();
    for (variable, series) in components {
        for c in series {
            table
                .entry((c.region.clone(), c.date))
                .or_insert_with(|| CompositeRow::empty(c.region, c.date))
                .set_component(variable, c.risk_value);
        }
    }

    table
        .into_values()
        .map(|mut row| {
            row.risk_index = mean_of_present(Variable::ALL.iter().map(|v| row.component(*v)));
            row
        })
        .collect()
}

/// Trailing mean of `risk_index` over up to `SMOOTHING_WINDOW` rows per region.
///
/// Expects rows sorted by (region, date) as produced by `merge_components`.
/// The window counts rows, so a region's first row averages only itself.
/// Missing values inside the window are skipped, not counted as zero.
pub fn smooth(rows: &mut [CompositeRow]) {
    let mut start = 0;
    while start < rows.len() {
        let mut end = start + 1;
        while end < rows.len() && rows[end].region == rows[start].region {
            end += 1;
        }
        smooth_region(&mut rows[start..end]);
        start = end;
    }
}

fn smooth_region(rows: &mut [CompositeRow]) {
    let raw: Vec<Option<f64>> = rows.iter().map(|r| r.risk_index).collect();
    for (i, row) in rows.iter_mut().enumerate() {
        let lo = (i + 1).saturating_sub(SMOOTHING_WINDOW);
        row.risk_index_smoothed = mean_of_present(raw[lo..=i].iter().copied());
    }
}
