// Pipeline configuration.
//
// Every path and date bound the pipeline touches lives in `PipelineConfig`,
// which is built once by the caller and passed down explicitly.
use crate::types::Variable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const NDVI_FILE: &str = "EA_admin1_monthly_NDVI.csv";
pub const CHIRPS_FILE: &str = "EA_admin1_monthly_CHIRPS.csv";
pub const SMAP_FILE: &str = "EA_admin1_monthly_SMAP_RZSM.csv";
pub const ARTIFACT_PARQUET: &str = "admin_monthly_indicators.parquet";
pub const ARTIFACT_CSV: &str = "admin_monthly_indicators.csv";
pub const ARTIFACT_PARAMS: &str = "admin_monthly_indicators.params.json";
pub const COUNTRY_LOOKUP: &str = "country_codes.csv";

/// Half-open month range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2001, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap_or(NaiveDate::MAX),
        }
    }
}

/// How rows of an input file are keyed to a reporting unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionDefinition {
    /// Country + first-level administrative area names.
    #[default]
    Admin,
    /// A single spatial cell identifier column.
    Grid { id_column: String },
}

#[derive(Debug, Clone)]
pub struct InputPaths {
    pub ndvi: PathBuf,
    pub rainfall: PathBuf,
    pub soil_moisture: PathBuf,
}

impl InputPaths {
    pub fn for_variable(&self, variable: Variable) -> &Path {
        match variable {
            Variable::Ndvi => &self.ndvi,
            Variable::Rainfall => &self.rainfall,
            Variable::SoilMoisture => &self.soil_moisture,
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.ndvi, &self.rainfall, &self.soil_moisture]
    }

    /// Directory the inputs are expected in (used in user-facing errors).
    pub fn directory(&self) -> PathBuf {
        self.ndvi
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub parquet: PathBuf,
    pub csv: PathBuf,
    /// Parameters the persisted table was built with.
    pub params: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub inputs: InputPaths,
    pub output: OutputPaths,
    pub region: RegionDefinition,
    pub date_range: DateRange,
    pub country_lookup: Option<PathBuf>,
}

impl PipelineConfig {
    /// Conventional layout under a data directory:
    /// `<dir>/gee_monthly/*.csv` in, `<dir>/admin_monthly_indicators.*` out.
    pub fn from_data_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let raw = dir.join("gee_monthly");
        Self {
            inputs: InputPaths {
                ndvi: raw.join(NDVI_FILE),
                rainfall: raw.join(CHIRPS_FILE),
                soil_moisture: raw.join(SMAP_FILE),
            },
            output: OutputPaths {
                parquet: dir.join(ARTIFACT_PARQUET),
                csv: dir.join(ARTIFACT_CSV),
                params: dir.join(ARTIFACT_PARAMS),
            },
            region: RegionDefinition::default(),
            date_range: DateRange::default(),
            country_lookup: Some(dir.join(COUNTRY_LOOKUP)),
        }
    }

    pub fn with_date_range(mut self, date_range: DateRange) -> Self {
        self.date_range = date_range;
        self
    }

    pub fn with_region(mut self, region: RegionDefinition) -> Self {
        self.region = region;
        self
    }
}
