// Seasonal z-scores and risk-direction alignment.
//
// Each observation is compared against its own region's history for the
// same calendar month, which removes the seasonal cycle before the three
// variables are combined.
use crate::types::{NormalizedObservation, Observation, RegionKey, RiskComponent, Variable};
use crate::util::mean_and_pop_std;
use chrono::Datelike;
use std::collections::HashMap;

/// Per-(region, calendar month) z-score using the population std (ddof = 0).
///
/// A group whose std is zero or not finite (a single observation, or no
/// present value at all) yields `z = 0.0` for every row in it, absent values
/// included. Otherwise absent values stay absent. Absent values never
/// contribute to the group statistics. Output order matches input order.
pub fn seasonal_zscores(observations: Vec<Observation>) -> Vec<NormalizedObservation> {
    let mut groups: HashMap<(RegionKey, u32), Vec<f64>> = HashMap::new();
    for obs in &observations {
        if let Some(v) = obs.value {
            groups
                .entry((obs.region.clone(), obs.date.month()))
                .or_default()
                .push(v);
        }
    }

    let stats: HashMap<(RegionKey, u32), (f64, f64)> = groups
        .into_iter()
        .map(|(key, values)| (key, mean_and_pop_std(&values)))
        .collect();

    observations
        .into_iter()
        .map(|obs| {
            let z = match stats.get(&(obs.region.clone(), obs.date.month())) {
                Some(&(mean, sd)) if sd.is_finite() && sd != 0.0 => {
                    obs.value.map(|v| (v - mean) / sd)
                }
                _ => Some(0.0),
            };
            NormalizedObservation::from_observation(obs, z)
        })
        .collect()
}

/// Flip signs so that a higher score always means more drought stress.
pub fn to_risk_direction(variable: Variable, rows: Vec<NormalizedObservation>) -> Vec<RiskComponent> {
    rows.into_iter()
        .map(|row| RiskComponent {
            region: row.region,
            date: row.date,
            risk_value: row.z.map(|z| risk_value(variable, z)),
        })
        .collect()
}

pub fn risk_value(variable: Variable, z: f64) -> f64 {
    if variable.higher_is_safer() {
        -z
    } else {
        z
    }
}
