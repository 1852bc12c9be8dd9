use crate::error::{PipelineError, Result};
use crate::types::{CompositeRow, RegionKey, RiskCategory, ScaledRow, SnapshotRow};
use crate::util::parse_month;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::debug;

const ADMIN_KEY: [&str; 2] = ["region_country", "region_area"];
const CELL_KEY: [&str; 1] = ["cell_id"];
const VALUE_COLUMNS: [&str; 6] = [
    "ndvi_stress",
    "rain_deficit",
    "soil_dryness",
    "risk_index",
    "risk_index_smoothed",
    "scaled_0_100",
];
const DATE_FORMAT: &str = "%Y-%m-%d";

fn key_columns(rows: &[ScaledRow]) -> &'static [&'static str] {
    match rows.first().map(ScaledRow::region) {
        Some(RegionKey::Cell(_)) => &CELL_KEY,
        _ => &ADMIN_KEY,
    }
}

fn values(row: &ScaledRow) -> [Option<f64>; 6] {
    let c = &row.composite;
    [
        c.ndvi_stress,
        c.rain_deficit,
        c.soil_dryness,
        c.risk_index,
        c.risk_index_smoothed,
        row.scaled_0_100,
    ]
}

fn set_values(row: &mut ScaledRow, v: [Option<f64>; 6]) {
    let c = &mut row.composite;
    c.ndvi_stress = v[0];
    c.rain_deficit = v[1];
    c.soil_dryness = v[2];
    c.risk_index = v[3];
    c.risk_index_smoothed = v[4];
    row.scaled_0_100 = v[5];
}

/// Sibling temp path used for whole-file replacement.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write through `f` into a temp file, then rename over `path`, so readers
/// only ever see the previous or the complete new file.
fn replace_file<F>(path: &Path, f: F) -> Result<()>
where
    F: FnOnce(std::fs::File) -> Result<()>,
{
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir.display().to_string(), e))?;
    }
    let tmp = temp_path(path);
    let file =
        std::fs::File::create(&tmp).map_err(|e| PipelineError::io(tmp.display().to_string(), e))?;
    if let Err(e) = f(file) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, path).map_err(|e| PipelineError::io(path.display().to_string(), e))
}

/// Columnar frame of the indicator table.
pub fn to_frame(rows: &[ScaledRow]) -> Result<DataFrame> {
    let keys = key_columns(rows);
    let mut columns: Vec<Column> = Vec::with_capacity(keys.len() + VALUE_COLUMNS.len() + 3);
    for (i, name) in keys.iter().enumerate() {
        let parts: Vec<String> = rows
            .iter()
            .map(|r| r.region().parts().get(i).copied().unwrap_or("").to_string())
            .collect();
        columns.push(Column::new((*name).into(), parts));
    }
    let dates: Vec<String> = rows
        .iter()
        .map(|r| r.date().format(DATE_FORMAT).to_string())
        .collect();
    columns.push(Column::new("date".into(), dates));
    for (i, name) in VALUE_COLUMNS.iter().enumerate() {
        let col: Vec<Option<f64>> = rows.iter().map(|r| values(r)[i]).collect();
        columns.push(Column::new((*name).into(), col));
    }
    let iso: Vec<Option<String>> = rows.iter().map(|r| r.iso3_code.clone()).collect();
    let continent: Vec<Option<String>> = rows.iter().map(|r| r.continent.clone()).collect();
    columns.push(Column::new("iso3_code".into(), iso));
    columns.push(Column::new("continent".into(), continent));
    Ok(DataFrame::new(columns)?)
}

/// Rebuild rows from a frame written by [`to_frame`].
pub fn from_frame(df: &DataFrame) -> Result<Vec<ScaledRow>> {
    let is_grid = df.column(CELL_KEY[0]).is_ok();
    let keys: &[&str] = if is_grid { &CELL_KEY } else { &ADMIN_KEY };
    let schema_err = |column: &str| PipelineError::Schema {
        file: "indicator table".to_string(),
        column: column.to_string(),
    };

    let key_cols = keys
        .iter()
        .map(|k| df.column(k).map_err(|_| schema_err(*k))?.str().cloned().map_err(Into::into))
        .collect::<Result<Vec<StringChunked>>>()?;
    let dates = df
        .column("date")
        .map_err(|_| schema_err("date"))?
        .str()?
        .clone();
    let value_cols = VALUE_COLUMNS
        .iter()
        .map(|k| df.column(k).map_err(|_| schema_err(*k))?.f64().cloned().map_err(Into::into))
        .collect::<Result<Vec<Float64Chunked>>>()?;
    let optional_str = |name: &str| -> Option<StringChunked> {
        df.column(name).ok().and_then(|c| c.str().ok().cloned())
    };
    let iso = optional_str("iso3_code");
    let continent = optional_str("continent");

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let part = |k: usize| key_cols[k].get(i).unwrap_or("").to_string();
        let region = if is_grid {
            RegionKey::Cell(part(0))
        } else {
            RegionKey::admin(part(0), part(1))
        };
        let raw_date = dates.get(i).unwrap_or("");
        let date = parse_month(raw_date).ok_or_else(|| PipelineError::Parse {
            file: "indicator table".to_string(),
            line: i as u64 + 1,
            message: format!("malformed date {:?}", raw_date),
        })?;
        let mut row = ScaledRow {
            composite: CompositeRow::empty(region, date),
            scaled_0_100: None,
            iso3_code: iso.as_ref().and_then(|c| c.get(i)).map(str::to_string),
            continent: continent.as_ref().and_then(|c| c.get(i)).map(str::to_string),
        };
        let mut v = [None; 6];
        for (slot, col) in v.iter_mut().zip(&value_cols) {
            *slot = col.get(i);
        }
        set_values(&mut row, v);
        rows.push(row);
    }
    Ok(rows)
}

pub fn write_parquet(path: &Path, rows: &[ScaledRow]) -> Result<()> {
    let mut df = to_frame(rows)?;
    replace_file(path, |file| {
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Zstd(None))
            .finish(&mut df)?;
        Ok(())
    })?;
    debug!(path = %path.display(), rows = rows.len(), "Wrote parquet");
    Ok(())
}

pub fn read_parquet(path: &Path) -> Result<Vec<ScaledRow>> {
    let file =
        std::fs::File::open(path).map_err(|e| PipelineError::io(path.display().to_string(), e))?;
    let df = ParquetReader::new(file).finish()?;
    from_frame(&df)
}

fn opt_cell(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// Plain-text form of the indicator table.
pub fn write_table_csv(path: &Path, rows: &[ScaledRow]) -> Result<()> {
    let keys = key_columns(rows);
    replace_file(path, |file| {
        let mut wtr = csv::Writer::from_writer(file);
        let mut header: Vec<&str> = keys.to_vec();
        header.push("date");
        header.extend(VALUE_COLUMNS);
        header.extend(["iso3_code", "continent"]);
        wtr.write_record(&header)?;
        for r in rows {
            let mut record: Vec<String> = r.region().parts().iter().map(|s| s.to_string()).collect();
            record.push(r.date().format(DATE_FORMAT).to_string());
            record.extend(values(r).into_iter().map(opt_cell));
            record.push(r.iso3_code.clone().unwrap_or_default());
            record.push(r.continent.clone().unwrap_or_default());
            wtr.write_record(&record)?;
        }
        wtr.flush().map_err(|e| PipelineError::io(path.display().to_string(), e))?;
        Ok(())
    })
}

/// Read the CSV form back, e.g. when no parquet artifact is present.
pub fn read_table_csv(path: &Path) -> Result<Vec<ScaledRow>> {
    let file_name = path.display().to_string();
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();
    let find = |name: &str| headers.iter().position(|h| h == name);
    let require = |name: &str| {
        find(name).ok_or_else(|| PipelineError::Schema {
            file: file_name.clone(),
            column: name.to_string(),
        })
    };
    let is_grid = find(CELL_KEY[0]).is_some();
    let keys: &[&str] = if is_grid { &CELL_KEY } else { &ADMIN_KEY };
    let key_idx = keys.iter().map(|k| require(*k)).collect::<Result<Vec<_>>>()?;
    let date_idx = require("date")?;
    let value_idx = VALUE_COLUMNS.iter().map(|k| require(*k)).collect::<Result<Vec<_>>>()?;
    let iso_idx = find("iso3_code");
    let continent_idx = find("continent");

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let parse_err = |message: String| PipelineError::Parse {
            file: file_name.clone(),
            line,
            message,
        };
        let field = |i: usize| record.get(i).unwrap_or("");
        let region = if is_grid {
            RegionKey::Cell(field(key_idx[0]).to_string())
        } else {
            RegionKey::admin(field(key_idx[0]), field(key_idx[1]))
        };
        let date: NaiveDate = parse_month(field(date_idx))
            .ok_or_else(|| parse_err(format!("malformed date {:?}", field(date_idx))))?;
        let mut v = [None; 6];
        for (slot, &i) in v.iter_mut().zip(&value_idx) {
            *slot = crate::util::parse_value(field(i))
                .map_err(|_| parse_err(format!("malformed value {:?}", field(i))))?;
        }
        let text = |idx: Option<usize>| {
            idx.map(field)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let mut row = ScaledRow {
            composite: CompositeRow::empty(region, date),
            scaled_0_100: None,
            iso3_code: text(iso_idx),
            continent: text(continent_idx),
        };
        set_values(&mut row, v);
        rows.push(row);
    }
    Ok(rows)
}

#[derive(Debug, Serialize)]
struct SnapshotRecord<'a> {
    region_country: Option<&'a str>,
    region_area: Option<&'a str>,
    cell_id: Option<&'a str>,
    date: String,
    indicator: &'a str,
    value: Option<f64>,
    scaled_0_100: Option<f64>,
    mom: Option<f64>,
    yoy: Option<f64>,
    category: RiskCategory,
}

/// Flat export of a dashboard snapshot.
pub fn write_snapshot_csv(path: &Path, indicator: &str, rows: &[SnapshotRow]) -> Result<()> {
    replace_file(path, |file| {
        let mut wtr = csv::Writer::from_writer(file);
        for r in rows {
            let cell_id = match &r.region {
                RegionKey::Cell(id) => Some(id.as_str()),
                RegionKey::Admin { .. } => None,
            };
            wtr.serialize(SnapshotRecord {
                region_country: r.region.country(),
                region_area: r.region.area(),
                cell_id,
                date: r.date.format(DATE_FORMAT).to_string(),
                indicator,
                value: r.value,
                scaled_0_100: r.scaled_0_100,
                mom: r.mom,
                yoy: r.yoy,
                category: r.category,
            })?;
        }
        wtr.flush().map_err(|e| PipelineError::io(path.display().to_string(), e))?;
        Ok(())
    })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    replace_file(path, |mut file| {
        use std::io::Write;
        file.write_all(s.as_bytes())
            .map_err(|e| PipelineError::io(path.display().to_string(), e))
    })
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
