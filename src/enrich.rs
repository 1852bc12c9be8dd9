use crate::error::{PipelineError, Result};
use crate::types::ScaledRow;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone)]
pub struct CountryCode {
    pub country_name: String,
    pub iso3_code: Option<String>,
    pub continent: Option<String>,
}

/// Country name -> (ISO3, continent).
#[derive(Debug, Default, Clone)]
pub struct CountryLookup {
    by_name: HashMap<String, CountryCode>,
}

impl CountryLookup {
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut by_name = HashMap::new();
        for rec in rdr.deserialize::<CountryCode>() {
            let rec = rec?;
            by_name.insert(rec.country_name.trim().to_string(), rec);
        }
        Ok(Self { by_name })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| PipelineError::io(path.display().to_string(), e))?;
        Self::from_reader(file)
    }

    /// Load when configured and readable; otherwise an empty lookup.
    pub fn load_optional(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        if !path.exists() {
            info!(path = %path.display(), "No country lookup, skipping ISO enrichment");
            return Self::default();
        }
        match Self::load(path) {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable country lookup, skipping ISO enrichment");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Fill `iso3_code` / `continent` on rows whose country is known.
    pub fn enrich(&self, rows: &mut [ScaledRow]) {
        if self.is_empty() {
            return;
        }
        for row in rows.iter_mut() {
            let Some(code) = row.region().country().and_then(|c| self.by_name.get(c)) else {
                continue;
            };
            row.iso3_code = code.iso3_code.clone().filter(|s| !s.is_empty());
            row.continent = code.continent.clone().filter(|s| !s.is_empty());
        }
    }
}
