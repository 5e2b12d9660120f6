// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the photo inference pipeline
//!
//! Each variant maps to one failure class of a pipeline run:
//! - `Io`: the image source could not be read (or its transport is corrupt)
//! - `Decode`: the bytes are not a decodable JPEG, or the pixel layout is inconsistent
//! - `ModelLoad`: the inference capability failed to initialize (fatal for the process)
//! - `Inference`: the loaded capability failed while running
//!
//! An empty prediction list is not an error; see `vision::Outcome::NoPrediction`.

use thiserror::Error;

/// Errors that can occur while running the photo inference pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Image source unreadable or handle stale
    #[error("Failed to read image source {source_id}: {reason}")]
    Io { source_id: String, reason: String },

    /// Malformed byte stream or shape mismatch
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Model capability failed to initialize
    #[error("Failed to load {backend} model: {reason}")]
    ModelLoad { backend: String, reason: String },

    /// Model capability failed during inference
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl PipelineError {
    pub fn io(source_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Io {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn model_load(backend: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ModelLoad {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this failure only aborts the current run
    ///
    /// `ModelLoad` is the one failure that poisons every later run.
    pub fn is_run_local(&self) -> bool {
        !matches!(self, Self::ModelLoad { .. })
    }

    /// Short machine-readable kind, used in logs and JSON snapshots
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Decode(_) => "decode",
            Self::ModelLoad { .. } => "model_load",
            Self::Inference(_) => "inference",
        }
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err.to_string())
    }
}
