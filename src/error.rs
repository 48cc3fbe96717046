use thiserror::Error;

/// Structural problem with the roster as a whole. Aborts the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("roster has no identifiable id or name column (headers: {headers:?})")]
    MissingKeyColumn { headers: Vec<String> },
    #[error("roster has no header row")]
    EmptyHeader,
}

/// A single record that cannot be scored. Reported, never fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("student {id} has no usable subject scores")]
pub struct InsufficientDataError {
    pub id: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("table has no columns")]
    EmptySchema,
    #[error("row {row} has {found} cells, expected {expected}")]
    ColumnMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("page geometry leaves no room for content ({0})")]
    InvalidGeometry(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("threshold {0} is outside the accepted range 0..=200")]
    ThresholdOutOfRange(u32),
    #[error("test fraction {0} must lie strictly between 0 and 1")]
    TestFraction(f64),
    #[error("evaluation needs at least one tree")]
    NoTrees,
    #[error("subject list is empty")]
    NoSubjects,
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
