// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Errors raised while turning a CSV file into a population.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    /// The input file could not be opened or read
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not well-formed delimited text
    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// One or more required columns are absent from the header row
    #[error("dataset {path} is missing required column(s): {}", missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },
}

impl DatasetError {
    /// True for schema-validation failures, as opposed to load failures
    pub fn is_schema_error(&self) -> bool {
        matches!(self, DatasetError::MissingColumns { .. })
    }
}
