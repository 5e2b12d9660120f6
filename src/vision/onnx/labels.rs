// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Class label tables for the ONNX backends

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Label used for class ids outside the table
pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Failed to read labels file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Labels file {0} contains no labels")]
    Empty(String),
}

/// Ordered class names, one per model output index
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Build a table from lines, skipping blank ones
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self { labels }
    }

    /// Load a labels file with one class name per line
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LabelError> {
        let path = path.as_ref();
        let read_err = |source| LabelError::Read {
            path: path.display().to_string(),
            source,
        };

        let file = File::open(path).map_err(read_err)?;
        let mut lines = Vec::new();
        for line in BufReader::new(file).lines() {
            lines.push(line.map_err(read_err)?);
        }

        let table = Self::from_lines(lines);
        if table.is_empty() {
            return Err(LabelError::Empty(path.display().to_string()));
        }

        debug!("Loaded {} labels from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label for a 0-based output index
    pub fn get(&self, index: usize) -> &str {
        self.labels
            .get(index)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL)
    }

    /// Label for a 1-based class id (COCO detection convention, 0 = background)
    pub fn get_one_based(&self, class_id: usize) -> &str {
        match class_id.checked_sub(1) {
            Some(index) => self.get(index),
            None => UNKNOWN_LABEL,
        }
    }
}
