// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model backend adapter
//!
//! Classifier and detector capabilities produce differently-shaped outputs.
//! `ModelCapability` wraps either one and maps its native output into the
//! canonical `Prediction` list, keeping the backend's own ranking.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::decoder::{DecodeMode, ImageTensor};
use crate::config::BackendKind;
use crate::errors::PipelineError;

/// One ranked class from a classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub class_name: String,
    /// Probability (0.0-1.0)
    pub probability: f32,
}

/// Bounding box for a detected object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One ranked object from a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub class: String,
    /// Detection score (0.0-1.0)
    pub score: f32,
    pub bbox: BoundingBox,
}

/// Canonical prediction shared by both backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Probability for the classifier path, detection score for the detector path
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

impl From<ClassScore> for Prediction {
    fn from(score: ClassScore) -> Self {
        Self {
            label: score.class_name,
            confidence: score.probability,
        }
    }
}

impl From<DetectedObject> for Prediction {
    fn from(object: DetectedObject) -> Self {
        // Box geometry is not displayed
        Self {
            label: object.class,
            confidence: object.score,
        }
    }
}

/// Image classification capability
///
/// Results must be ordered by probability, highest first.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, tensor: &ImageTensor) -> Result<Vec<ClassScore>, PipelineError>;

    /// Model name for logging
    fn name(&self) -> &str;
}

/// Object detection capability
///
/// Results must be ordered by score, highest first.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, tensor: &ImageTensor) -> Result<Vec<DetectedObject>, PipelineError>;

    /// Model name for logging
    fn name(&self) -> &str;
}

/// A loaded inference capability
#[derive(Clone)]
pub enum ModelCapability {
    Classifier(Arc<dyn Classifier>),
    Detector(Arc<dyn Detector>),
}

impl fmt::Debug for ModelCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCapability")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

impl ModelCapability {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Classifier(_) => BackendKind::Classifier,
            Self::Detector(_) => BackendKind::Detector,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Classifier(model) => model.name(),
            Self::Detector(model) => model.name(),
        }
    }

    /// Decode mode whose tensor layout this backend is fed with
    pub fn decode_mode(&self) -> DecodeMode {
        match self {
            Self::Classifier(_) => DecodeMode::Rgb,
            Self::Detector(_) => DecodeMode::RgbaStrip,
        }
    }

    /// Run the capability and map its output to canonical predictions
    ///
    /// The backend's order is kept as-is. An empty list is a valid outcome.
    pub async fn infer(&self, tensor: &ImageTensor) -> Result<Vec<Prediction>, PipelineError> {
        let start = Instant::now();

        let predictions: Vec<Prediction> = match self {
            Self::Classifier(model) => model
                .classify(tensor)
                .await?
                .into_iter()
                .map(Prediction::from)
                .collect(),
            Self::Detector(model) => model
                .detect(tensor)
                .await?
                .into_iter()
                .map(Prediction::from)
                .collect(),
        };

        debug!(
            "{} ({}) returned {} predictions in {:?}",
            self.name(),
            self.kind(),
            predictions.len(),
            start.elapsed()
        );

        Ok(predictions)
    }
}
