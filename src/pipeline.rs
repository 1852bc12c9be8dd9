// End-to-end transform: observations -> seasonal z -> risk direction ->
// composite -> 3-month smoothing -> per-date percentile.
use crate::composite::{merge_components, smooth};
use crate::config::PipelineConfig;
use crate::enrich::CountryLookup;
use crate::error::Result;
use crate::loader::{CsvSource, ObservationSource};
use crate::normalize::{seasonal_zscores, to_risk_direction};
use crate::rescale::rescale_by_date;
use crate::types::{CompositeRow, Observation, RiskComponent, ScaledRow, Variable};
use tracing::{debug, info};

/// Runs the transform for one configuration. Holds no state between runs.
pub struct Pipeline<S: ObservationSource> {
    config: PipelineConfig,
    source: S,
}

impl Pipeline<CsvSource> {
    /// Pipeline reading the CSV exports named in the configuration.
    pub fn from_config(config: PipelineConfig) -> Self {
        let source = CsvSource::new(config.inputs.clone(), config.region.clone());
        Self { config, source }
    }
}

impl<S: ObservationSource> Pipeline<S> {
    pub fn new(config: PipelineConfig, source: S) -> Self {
        Self { config, source }
    }

    /// Load, normalize, combine and rescale. Any malformed input aborts.
    #[tracing::instrument(skip(self), fields(start = %self.config.date_range.start, end = %self.config.date_range.end))]
    pub fn run(&self) -> Result<Vec<ScaledRow>> {
        let mut components = Vec::with_capacity(Variable::ALL.len());
        for variable in Variable::ALL {
            let observations = self.source.fetch(variable, &self.config.date_range)?;
            components.push((variable, risk_components(variable, observations)));
        }

        let composite = build_composite(components);
        let mut scaled = rescale_by_date(composite);

        let lookup = CountryLookup::load_optional(self.config.country_lookup.as_deref());
        lookup.enrich(&mut scaled);

        info!(rows = scaled.len(), "Indicator table built");
        Ok(scaled)
    }
}

/// Seasonal z-scores of one variable, sign-aligned to risk.
pub fn risk_components(variable: Variable, observations: Vec<Observation>) -> Vec<RiskComponent> {
    let rows = observations.len();
    let normalized = seasonal_zscores(observations);
    debug!(%variable, rows, "Normalized variable");
    to_risk_direction(variable, normalized)
}

/// Outer-join the components, average them, and smooth per region.
pub fn build_composite(components: Vec<(Variable, Vec<RiskComponent>)>) -> Vec<CompositeRow> {
    let mut rows = merge_components(components);
    smooth(&mut rows);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DateRange;
    use crate::types::RegionKey;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    struct InMemory(HashMap<Variable, Vec<Observation>>);

    impl ObservationSource for InMemory {
        fn fetch(&self, variable: Variable, range: &DateRange) -> Result<Vec<Observation>> {
            Ok(self
                .0
                .get(&variable)
                .map(|v| v.iter().filter(|o| range.contains(o.date)).cloned().collect())
                .unwrap_or_default())
        }
    }

    fn obs(area: &str, m: u32, v: f64) -> Observation {
        Observation {
            region: RegionKey::admin("Kenya", area),
            date: NaiveDate::from_ymd_opt(2020, m, 1).unwrap(),
            value: Some(v),
        }
    }

    #[test]
    fn soil_moisture_gap_is_ordinary_missingness() {
        let mut data = HashMap::new();
        data.insert(Variable::Ndvi, vec![obs("Turkana", 1, 0.2), obs("Turkana", 2, 0.3)]);
        data.insert(Variable::Rainfall, vec![obs("Turkana", 1, 10.0), obs("Turkana", 2, 30.0)]);
        data.insert(Variable::SoilMoisture, vec![obs("Turkana", 2, 0.1)]);

        let mut config = PipelineConfig::from_data_dir("/nonexistent");
        config.country_lookup = None;
        let rows = Pipeline::new(config, InMemory(data)).run().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].composite.soil_dryness, None);
        // Single-observation groups everywhere, so every z is 0.
        assert_eq!(rows[0].composite.risk_index, Some(0.0));
        assert_eq!(rows[1].composite.soil_dryness, Some(0.0));
        assert_eq!(rows[1].scaled_0_100, Some(100.0));
    }
}
