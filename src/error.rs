use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every failure that aborts a pipeline run.
///
/// Missing values are not errors; they travel through the pipeline as `None`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{file} missing required column: {column}")]
    Schema { file: String, column: String },

    #[error("{file}, line {line}: {message}")]
    Parse {
        file: String,
        line: u64,
        message: String,
    },

    #[error("missing required input file(s):\n  {}\nCopy the monthly exports into {}.", display_paths(.expected), .directory.display())]
    MissingSource {
        expected: Vec<PathBuf>,
        directory: PathBuf,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] polars::error::PolarsError),
}

impl PipelineError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n  ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_source_lists_every_file() {
        let err = PipelineError::MissingSource {
            expected: vec![PathBuf::from("a/NDVI.csv"), PathBuf::from("a/SMAP.csv")],
            directory: PathBuf::from("a"),
        };
        let msg = err.to_string();
        assert!(msg.contains("a/NDVI.csv"));
        assert!(msg.contains("a/SMAP.csv"));
        assert!(msg.contains("Copy the monthly exports into a."));
    }

    #[test]
    fn schema_error_names_file_and_column() {
        let err = PipelineError::Schema {
            file: "EA_admin1_monthly_NDVI.csv".to_string(),
            column: "date".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "EA_admin1_monthly_NDVI.csv missing required column: date"
        );
    }
}
