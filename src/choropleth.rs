//! Joins a snapshot onto admin-boundary GeoJSON for map rendering.
//!
//! Features are matched on their `ADM0_NAME` / `ADM1_NAME` properties (or
//! `region_country` / `region_area`). Matched features get the indicator
//! value and risk category; unmatched ones get `null` and "No data".

use crate::error::{PipelineError, Result};
use crate::types::{RegionKey, RiskCategory, SnapshotRow};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

const COUNTRY_PROPS: [&str; 2] = ["ADM0_NAME", "region_country"];
const AREA_PROPS: [&str; 2] = ["ADM1_NAME", "region_area"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub features: usize,
    pub matched: usize,
}

fn prop<'a>(props: &'a Map<String, Value>, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|n| props.get(*n).and_then(Value::as_str))
}

/// Write `indicator` and `risk_category` into each feature's properties.
pub fn join(geojson: &mut Value, indicator: &str, snapshot: &[SnapshotRow]) -> JoinReport {
    let by_key: HashMap<(String, String), &SnapshotRow> = snapshot
        .iter()
        .filter_map(|r| match &r.region {
            RegionKey::Admin { country, area } => Some(((country.clone(), area.clone()), r)),
            RegionKey::Cell(_) => None,
        })
        .collect();

    let mut report = JoinReport::default();
    let Some(features) = geojson.get_mut("features").and_then(Value::as_array_mut) else {
        return report;
    };
    for feature in features.iter_mut() {
        report.features += 1;
        let Some(props) = feature.get_mut("properties").and_then(Value::as_object_mut) else {
            continue;
        };
        let row = match (prop(props, &COUNTRY_PROPS), prop(props, &AREA_PROPS)) {
            (Some(c), Some(a)) => by_key.get(&(c.to_string(), a.to_string())).copied(),
            _ => None,
        };
        if row.is_some() {
            report.matched += 1;
        }
        let value = row
            .and_then(|r| r.value)
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        let category = row.map(|r| r.category).unwrap_or(RiskCategory::NoData);
        props.insert(indicator.to_string(), value);
        props.insert(
            "risk_category".to_string(),
            Value::String(category.label().to_string()),
        );
    }
    report
}

pub fn read_geojson(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::io(path.display().to_string(), e))?;
    Ok(serde_json::from_str(&text)?)
}
