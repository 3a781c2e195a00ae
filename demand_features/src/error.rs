//! Error taxonomy for the demand/climate pipeline.
//!
//! Library functions return `anyhow::Result`; the variants below are raised
//! through it so callers can `downcast_ref::<PipelineError>()` when they need
//! to tell failures apart.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No file matched an input glob.
    #[error("no input files match {pattern}")]
    MissingInput { pattern: String },

    /// A loaded file lacks a required column or has an unusable layout.
    #[error("schema error in {file}: {message}")]
    Schema { file: String, message: String },

    /// A climate filename does not follow the `<Region>Climate.csv` convention.
    #[error("cannot extract a region name from {file}")]
    RegionExtraction { file: String },

    /// The merge changed the row count of the demand side.
    #[error("join integrity violated: expected {expected} rows, got {actual}")]
    JoinIntegrity { expected: usize, actual: usize },

    /// A lag column still holds nulls after the lag builder ran.
    #[error("lag column {column} has {nulls} missing values")]
    IncompleteLag { column: String, nulls: usize },

    /// A cell could not be interpreted (dates, hours, timestamps, numbers).
    #[error("parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// A key that must be unique appears more than once.
    #[error("duplicate key in {table}: {key}")]
    DuplicateKey { table: String, key: String },

    #[error("{table} is not sorted by its key")]
    Unsorted { table: String },

    /// Consecutive rows of a series are not exactly one hour apart.
    #[error("series {group} is not hourly contiguous: {after} is followed by {next}")]
    NonContiguous {
        group: String,
        after: String,
        next: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}
