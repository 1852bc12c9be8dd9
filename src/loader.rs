use crate::config::{DateRange, InputPaths, RegionDefinition};
use crate::error::{PipelineError, Result};
use crate::types::{Observation, RegionKey, Variable};
use crate::util::{parse_month, parse_value};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

const COUNTRY_COLUMNS: [&str; 2] = ["region_country", "ADM0_NAME"];
const AREA_COLUMNS: [&str; 2] = ["region_area", "ADM1_NAME"];

/// Anything that can hand the pipeline one variable's monthly observations.
///
/// Remote portals sit behind this trait; the pipeline itself only ever sees
/// the resulting observations.
pub trait ObservationSource {
    fn fetch(&self, variable: Variable, date_range: &DateRange) -> Result<Vec<Observation>>;
}

/// Reads each variable from its own CSV export on disk.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub paths: InputPaths,
    pub region: RegionDefinition,
}

impl CsvSource {
    pub fn new(paths: InputPaths, region: RegionDefinition) -> Self {
        Self { paths, region }
    }
}

impl ObservationSource for CsvSource {
    fn fetch(&self, variable: Variable, date_range: &DateRange) -> Result<Vec<Observation>> {
        let path = self.paths.for_variable(variable);
        load_observations(path, &self.region, date_range)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub missing_values: usize,
    pub out_of_range: usize,
}

/// Column positions resolved once from the header row.
#[derive(Debug)]
struct Layout {
    key: Vec<usize>,
    date: usize,
    value: usize,
}

impl Layout {
    fn resolve(headers: &StringRecord, region: &RegionDefinition, file: &str) -> Result<Self> {
        let find = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| headers.iter().position(|h| h.trim() == *n))
                .ok_or_else(|| PipelineError::Schema {
                    file: file.to_string(),
                    column: names[0].to_string(),
                })
        };
        let key = match region {
            RegionDefinition::Admin => vec![find(&COUNTRY_COLUMNS)?, find(&AREA_COLUMNS)?],
            RegionDefinition::Grid { id_column } => vec![find(&[id_column.as_str()])?],
        };
        Ok(Layout {
            key,
            date: find(&["date"])?,
            value: find(&["value"])?,
        })
    }

    fn region(&self, record: &StringRecord, region: &RegionDefinition) -> RegionKey {
        let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();
        match region {
            RegionDefinition::Admin => RegionKey::Admin {
                country: field(self.key[0]),
                area: field(self.key[1]),
            },
            RegionDefinition::Grid { .. } => RegionKey::Cell(field(self.key[0])),
        }
    }
}

/// A short or long row is reported as a parse error on its line.
fn row_error(file: &str, e: csv::Error) -> PipelineError {
    let short = match e.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => Some((pos.as_ref().map(|p| p.line()).unwrap_or(0), *expected_len, *len)),
        _ => None,
    };
    match short {
        Some((line, expected, found)) => PipelineError::Parse {
            file: file.to_string(),
            line,
            message: format!("expected {} fields, found {}", expected, found),
        },
        None => e.into(),
    }
}

/// Load a single variable's observations from a CSV file.
pub fn load_observations(
    path: &Path,
    region: &RegionDefinition,
    date_range: &DateRange,
) -> Result<Vec<Observation>> {
    let file = std::fs::File::open(path)
        .map_err(|e| PipelineError::io(path.display().to_string(), e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let (observations, report) = read_observations(file, &name, region, date_range)?;
    info!(
        file = %name,
        rows = report.total_rows,
        kept = report.kept_rows,
        missing = report.missing_values,
        out_of_range = report.out_of_range,
        "Loaded observations"
    );
    Ok(observations)
}

/// Parse observations from any reader; `file` is only used in error messages.
///
/// Fails on the first malformed row: a bad date, an unparseable value, or a
/// second row for an already-seen (region, month).
pub fn read_observations<R: Read>(
    reader: R,
    file: &str,
    region: &RegionDefinition,
    date_range: &DateRange,
) -> Result<(Vec<Observation>, LoadReport)> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let headers = rdr.headers()?.clone();
    let layout = Layout::resolve(&headers, region, file)?;

    let mut report = LoadReport::default();
    let mut seen: HashSet<(RegionKey, chrono::NaiveDate)> = HashSet::new();
    let mut out = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| row_error(file, e))?;
        report.total_rows += 1;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let parse_err = |message: String| PipelineError::Parse {
            file: file.to_string(),
            line,
            message,
        };

        let raw_date = record.get(layout.date).unwrap_or("");
        let date = parse_month(raw_date)
            .ok_or_else(|| parse_err(format!("malformed date {:?}", raw_date)))?;
        if !date_range.contains(date) {
            report.out_of_range += 1;
            continue;
        }

        let raw_value = record.get(layout.value).unwrap_or("");
        let value = parse_value(raw_value)
            .map_err(|_| parse_err(format!("malformed value {:?}", raw_value)))?;
        if value.is_none() {
            report.missing_values += 1;
        }

        let key = layout.region(&record, region);
        if key.parts().iter().any(|p| p.is_empty()) {
            return Err(parse_err("empty region name".to_string()));
        }
        if !seen.insert((key.clone(), date)) {
            return Err(parse_err(format!(
                "duplicate row for {} at {}",
                key,
                date.format("%Y-%m")
            )));
        }

        out.push(Observation {
            region: key,
            date,
            value,
        });
    }
    report.kept_rows = out.len();
    debug!(file, ?report, "Parsed observation rows");
    Ok((out, report))
}
