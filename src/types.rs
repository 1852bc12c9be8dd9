use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;
use tabled::Tabled;

/// The three remote-sensing series feeding the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variable {
    Ndvi,
    Rainfall,
    SoilMoisture,
}

impl Variable {
    pub const ALL: [Variable; 3] = [Variable::Ndvi, Variable::Rainfall, Variable::SoilMoisture];

    pub fn name(self) -> &'static str {
        match self {
            Variable::Ndvi => "ndvi",
            Variable::Rainfall => "rain_mm",
            Variable::SoilMoisture => "rzsm",
        }
    }

    /// Output column holding this variable's risk-direction score.
    pub fn component_column(self) -> &'static str {
        match self {
            Variable::Ndvi => "ndvi_stress",
            Variable::Rainfall => "rain_deficit",
            Variable::SoilMoisture => "soil_dryness",
        }
    }

    /// True when a higher raw value means lower drought risk.
    pub fn higher_is_safer(self) -> bool {
        match self {
            Variable::Ndvi | Variable::Rainfall | Variable::SoilMoisture => true,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifier of a spatial reporting unit.
///
/// All rows of one pipeline run use the same variant, so the derived
/// ordering is the (country, area) or cell-id ordering used for output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegionKey {
    Admin { country: String, area: String },
    Cell(String),
}

impl RegionKey {
    pub fn admin(country: impl Into<String>, area: impl Into<String>) -> Self {
        RegionKey::Admin {
            country: country.into(),
            area: area.into(),
        }
    }

    pub fn country(&self) -> Option<&str> {
        match self {
            RegionKey::Admin { country, .. } => Some(country),
            RegionKey::Cell(_) => None,
        }
    }

    pub fn area(&self) -> Option<&str> {
        match self {
            RegionKey::Admin { area, .. } => Some(area),
            RegionKey::Cell(_) => None,
        }
    }

    /// Key components in output-column order.
    pub fn parts(&self) -> Vec<&str> {
        match self {
            RegionKey::Admin { country, area } => vec![country, area],
            RegionKey::Cell(id) => vec![id],
        }
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKey::Admin { country, area } => write!(f, "{} / {}", country, area),
            RegionKey::Cell(id) => f.write_str(id),
        }
    }
}

/// One raw monthly measurement of a single variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub region: RegionKey,
    /// Always the first day of the month.
    pub date: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedObservation {
    pub region: RegionKey,
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub month: u32,
    /// Seasonal z-score; `None` only when `value` is absent.
    pub z: Option<f64>,
}

impl NormalizedObservation {
    pub fn from_observation(obs: Observation, z: Option<f64>) -> Self {
        let month = obs.date.month();
        Self {
            region: obs.region,
            date: obs.date,
            value: obs.value,
            month,
            z,
        }
    }
}

/// A normalized observation with sign aligned so that higher means worse.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskComponent {
    pub region: RegionKey,
    pub date: NaiveDate,
    pub risk_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeRow {
    pub region: RegionKey,
    pub date: NaiveDate,
    pub ndvi_stress: Option<f64>,
    pub rain_deficit: Option<f64>,
    pub soil_dryness: Option<f64>,
    pub risk_index: Option<f64>,
    pub risk_index_smoothed: Option<f64>,
}

impl CompositeRow {
    pub fn empty(region: RegionKey, date: NaiveDate) -> Self {
        Self {
            region,
            date,
            ndvi_stress: None,
            rain_deficit: None,
            soil_dryness: None,
            risk_index: None,
            risk_index_smoothed: None,
        }
    }

    pub fn component(&self, variable: Variable) -> Option<f64> {
        match variable {
            Variable::Ndvi => self.ndvi_stress,
            Variable::Rainfall => self.rain_deficit,
            Variable::SoilMoisture => self.soil_dryness,
        }
    }

    pub fn set_component(&mut self, variable: Variable, value: Option<f64>) {
        match variable {
            Variable::Ndvi => self.ndvi_stress = value,
            Variable::Rainfall => self.rain_deficit = value,
            Variable::SoilMoisture => self.soil_dryness = value,
        }
    }
}

/// Final row of the indicator table.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledRow {
    pub composite: CompositeRow,
    /// Percentile of `risk_index_smoothed` among regions on the same date.
    pub scaled_0_100: Option<f64>,
    pub iso3_code: Option<String>,
    pub continent: Option<String>,
}

impl ScaledRow {
    pub fn region(&self) -> &RegionKey {
        &self.composite.region
    }

    pub fn date(&self) -> NaiveDate {
        self.composite.date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
    Extreme,
    #[serde(rename = "No data")]
    NoData,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 5] = [
        RiskCategory::Low,
        RiskCategory::Medium,
        RiskCategory::High,
        RiskCategory::Extreme,
        RiskCategory::NoData,
    ];

    /// Bucket a 0-100 score; lower bounds inclusive.
    pub fn from_scaled(scaled: Option<f64>) -> Self {
        match scaled {
            Some(v) if v.is_finite() => {
                if v < 20.0 {
                    RiskCategory::Low
                } else if v < 40.0 {
                    RiskCategory::Medium
                } else if v < 70.0 {
                    RiskCategory::High
                } else {
                    RiskCategory::Extreme
                }
            }
            _ => RiskCategory::NoData,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskCategory::Low => "Low",
            RiskCategory::Medium => "Medium",
            RiskCategory::High => "High",
            RiskCategory::Extreme => "Extreme",
            RiskCategory::NoData => "No data",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One region at the reference date, with change versus earlier dates.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub region: RegionKey,
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub scaled_0_100: Option<f64>,
    pub mom: Option<f64>,
    pub yoy: Option<f64>,
    pub category: RiskCategory,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SnapshotTableRow {
    #[serde(rename = "Region")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
    #[serde(rename = "Score")]
    #[tabled(rename = "Score")]
    pub score: String,
    #[serde(rename = "MoM")]
    #[tabled(rename = "MoM")]
    pub mom: String,
    #[serde(rename = "YoY")]
    #[tabled(rename = "YoY")]
    pub yoy: String,
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TrendTableRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Regions")]
    #[tabled(rename = "Regions")]
    pub regions: usize,
    #[serde(rename = "Mean")]
    #[tabled(rename = "Mean")]
    pub mean: String,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub total_rows: usize,
    pub total_regions: usize,
    pub first_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
    pub latest_categories: Vec<CategoryCount>,
}

#[derive(Debug, Serialize)]
pub struct CategoryCount {
    pub category: RiskCategory,
    pub regions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_boundaries() {
        assert_eq!(RiskCategory::from_scaled(Some(0.0)), RiskCategory::Low);
        assert_eq!(RiskCategory::from_scaled(Some(19.9)), RiskCategory::Low);
        assert_eq!(RiskCategory::from_scaled(Some(20.0)), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_scaled(Some(39.9)), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_scaled(Some(40.0)), RiskCategory::High);
        assert_eq!(RiskCategory::from_scaled(Some(69.9)), RiskCategory::High);
        assert_eq!(RiskCategory::from_scaled(Some(70.0)), RiskCategory::Extreme);
        assert_eq!(RiskCategory::from_scaled(Some(100.0)), RiskCategory::Extreme);
        assert_eq!(RiskCategory::from_scaled(None), RiskCategory::NoData);
        assert_eq!(RiskCategory::from_scaled(Some(f64::NAN)), RiskCategory::NoData);
    }

    #[test]
    fn admin_keys_order_by_country_then_area() {
        let mut keys = vec![
            RegionKey::admin("Kenya", "Turkana"),
            RegionKey::admin("Ethiopia", "Somali"),
            RegionKey::admin("Kenya", "Marsabit"),
        ];
        keys.sort();
        assert_eq!(keys[0].country(), Some("Ethiopia"));
        assert_eq!(keys[1].area(), Some("Marsabit"));
        assert_eq!(keys[2].to_string(), "Kenya / Turkana");
    }

    #[test]
    fn no_data_label_has_a_space() {
        assert_eq!(RiskCategory::NoData.to_string(), "No data");
        assert_eq!(
            serde_json::to_string(&RiskCategory::NoData).unwrap(),
            "\"No data\""
        );
    }
}
