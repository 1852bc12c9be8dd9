//! Persisted indicator table and its freshness against the raw inputs.
//!
//! The table is computed once and reused until one of the inputs changes or
//! it is requested with a different date range, region definition or
//! country lookup than it was built with.
//! Writes replace the whole file, so a concurrent reader sees either the
//! previous table or the complete new one.

use crate::config::{DateRange, PipelineConfig, RegionDefinition};
use crate::error::{PipelineError, Result};
use crate::output::{read_parquet, read_table_csv, write_json, write_parquet, write_table_csv};
use crate::pipeline::Pipeline;
use crate::types::ScaledRow;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Artifact exists and no input is newer.
    Fresh,
    /// Artifact exists but at least one input was modified after it, or it
    /// was built with other parameters.
    Stale,
    /// No artifact on disk.
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Reused,
    Rebuilt,
}

/// What a persisted table was built from, stored next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildParams {
    pub date_range: DateRange,
    pub region: RegionDefinition,
    pub country_lookup: Option<PathBuf>,
}

impl BuildParams {
    pub fn of(config: &PipelineConfig) -> Self {
        Self {
            date_range: config.date_range,
            region: config.region.clone(),
            country_lookup: config.country_lookup.clone(),
        }
    }
}

/// Parameters recorded for the persisted table; `None` when absent or
/// unreadable.
pub fn recorded_params(config: &PipelineConfig) -> Option<BuildParams> {
    let text = std::fs::read_to_string(&config.output.params).ok()?;
    serde_json::from_str(&text).ok()
}

fn params_match(config: &PipelineConfig) -> bool {
    recorded_params(config).is_some_and(|p| p == BuildParams::of(config))
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

pub fn missing_inputs(config: &PipelineConfig) -> Vec<PathBuf> {
    config
        .inputs
        .all()
        .iter()
        .filter(|p| !p.exists())
        .map(|p| p.to_path_buf())
        .collect()
}

/// Compare the parquet artifact's mtime with the present inputs, and its
/// recorded build parameters with `config`.
pub fn assess(config: &PipelineConfig) -> Freshness {
    let Some(artifact) = modified(&config.output.parquet) else {
        return Freshness::Absent;
    };
    if !params_match(config) {
        return Freshness::Stale;
    }
    let newer = config
        .inputs
        .all()
        .iter()
        .filter_map(|p| modified(p))
        .any(|t| t > artifact);
    if newer {
        Freshness::Stale
    } else {
        Freshness::Fresh
    }
}

/// Write the parquet artifact, its CSV fallback and the build parameters.
///
/// The parameters go last, so an interrupted write leaves a table that is
/// assessed as stale.
pub fn persist(config: &PipelineConfig, rows: &[ScaledRow]) -> Result<()> {
    write_parquet(&config.output.parquet, rows)?;
    write_table_csv(&config.output.csv, rows)?;
    write_json(&config.output.params, &BuildParams::of(config))?;
    info!(
        parquet = %config.output.parquet.display(),
        csv = %config.output.csv.display(),
        rows = rows.len(),
        "Persisted indicator table"
    );
    Ok(())
}

/// Reload a persisted table, parquet or CSV by extension.
pub fn read_artifact(path: &Path) -> Result<Vec<ScaledRow>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => read_table_csv(path),
        _ => read_parquet(path),
    }
}

/// Run the pipeline and persist, or fail naming every missing input.
pub fn rebuild(config: &PipelineConfig) -> Result<Vec<ScaledRow>> {
    let missing = missing_inputs(config);
    if !missing.is_empty() {
        return Err(PipelineError::MissingSource {
            expected: missing,
            directory: config.inputs.directory(),
        });
    }
    let rows = Pipeline::from_config(config.clone()).run()?;
    persist(config, &rows)?;
    Ok(rows)
}

/// Reuse the persisted table when fresh, otherwise rebuild it.
///
/// A stale table whose inputs are no longer all present is still served,
/// with a warning, rather than failing, as long as it was built with the
/// same parameters.
pub fn load_or_build(config: &PipelineConfig, force: bool) -> Result<(Vec<ScaledRow>, Origin)> {
    let freshness = assess(config);
    let inputs_complete = missing_inputs(config).is_empty();
    match (freshness, force) {
        (Freshness::Fresh, false) => {
            info!(path = %config.output.parquet.display(), "Reusing persisted indicator table");
            Ok((read_parquet(&config.output.parquet)?, Origin::Reused))
        }
        (Freshness::Stale, false) if !inputs_complete && params_match(config) => {
            warn!(
                path = %config.output.parquet.display(),
                "Persisted table is older than its inputs, but some inputs are missing; reusing it"
            );
            Ok((read_parquet(&config.output.parquet)?, Origin::Reused))
        }
        (Freshness::Stale, _) => {
            warn!(
                path = %config.output.parquet.display(),
                "Persisted table is older than its inputs or was built with other parameters; recomputing"
            );
            Ok((rebuild(config)?, Origin::Rebuilt))
        }
        _ => Ok((rebuild(config)?, Origin::Rebuilt)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn scratch(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("drought_risk_store_{}_{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("gee_monthly")).unwrap();
        dir
    }

    fn write_inputs(config: &PipelineConfig) {
        let body = "ADM0_NAME,ADM1_NAME,date,value\n\
                    Kenya,Turkana,2020-01-01,1.0\n\
                    Kenya,Wajir,2020-01-01,2.0\n";
        for p in config.inputs.all() {
            fs::write(p, body).unwrap();
        }
    }

    #[test]
    fn absent_inputs_and_artifact_is_missing_source() {
        let dir = scratch("missing");
        let config = PipelineConfig::from_data_dir(&dir);
        assert_eq!(assess(&config), Freshness::Absent);
        let err = load_or_build(&config, false).unwrap_err();
        match err {
            PipelineError::MissingSource { expected, directory } => {
                assert_eq!(expected.len(), 3);
                assert_eq!(directory, dir.join("gee_monthly"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn builds_then_reuses() {
        let dir = scratch("reuse");
        let config = PipelineConfig::from_data_dir(&dir);
        write_inputs(&config);

        let (rows, origin) = load_or_build(&config, false).unwrap();
        assert_eq!(origin, Origin::Rebuilt);
        assert_eq!(rows.len(), 2);
        assert!(config.output.parquet.exists());
        assert!(config.output.csv.exists());
        assert_eq!(assess(&config), Freshness::Fresh);

        let (again, origin) = load_or_build(&config, false).unwrap();
        assert_eq!(origin, Origin::Reused);
        assert_eq!(again, rows);
        assert_eq!(read_artifact(&config.output.csv).unwrap(), rows);

        let (_, origin) = load_or_build(&config, true).unwrap();
        assert_eq!(origin, Origin::Rebuilt);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn other_date_range_or_region_is_stale() {
        let dir = scratch("params");
        let config = PipelineConfig::from_data_dir(&dir);
        write_inputs(&config);
        rebuild(&config).unwrap();
        assert_eq!(recorded_params(&config), Some(BuildParams::of(&config)));
        assert_eq!(assess(&config), Freshness::Fresh);

        let later = config.clone().with_date_range(DateRange::new(
            chrono::NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        ));
        assert_eq!(assess(&later), Freshness::Stale);
        let (rows, origin) = load_or_build(&later, false).unwrap();
        assert_eq!(origin, Origin::Rebuilt);
        assert!(rows.is_empty());
        assert_eq!(assess(&later), Freshness::Fresh);
        assert_eq!(assess(&config), Freshness::Stale);

        let grid = config.clone().with_region(RegionDefinition::Grid {
            id_column: "cell_id".to_string(),
        });
        assert_eq!(assess(&grid), Freshness::Stale);
        let err = load_or_build(&grid, false).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_params_sidecar_is_stale() {
        let dir = scratch("sidecar");
        let config = PipelineConfig::from_data_dir(&dir);
        write_inputs(&config);
        rebuild(&config).unwrap();
        fs::remove_file(&config.output.params).unwrap();
        assert_eq!(assess(&config), Freshness::Stale);
        let (_, origin) = load_or_build(&config, false).unwrap();
        assert_eq!(origin, Origin::Rebuilt);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn stale_artifact_without_inputs_is_reused() {
        let dir = scratch("stale");
        let config = PipelineConfig::from_data_dir(&dir);
        write_inputs(&config);
        rebuild(&config).unwrap();

        // Make one input newer than the artifact, then drop another.
        let later = SystemTime::now() + std::time::Duration::from_secs(3600);
        let f = fs::OpenOptions::new()
            .write(true)
            .open(&config.inputs.ndvi)
            .unwrap();
        f.set_modified(later).unwrap();
        assert_eq!(assess(&config), Freshness::Stale);

        fs::remove_file(&config.inputs.soil_moisture).unwrap();
        let (rows, origin) = load_or_build(&config, false).unwrap();
        assert_eq!(origin, Origin::Reused);
        assert_eq!(rows.len(), 2);
        fs::remove_dir_all(&dir).unwrap();
    }
}
