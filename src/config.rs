// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the photo inference pipeline

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

/// Maximum image size (10MB)
pub const DEFAULT_MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Which model backend serves the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Single-label image classification (MobileNet-style)
    Classifier,
    /// Object detection (SSD-style)
    Detector,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classifier => "classifier",
            Self::Detector => "detector",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classifier" | "mobilenet" | "classify" => Ok(Self::Classifier),
            "detector" | "coco-ssd" | "cocossd" | "detect" => Ok(Self::Detector),
            other => Err(format!("Unknown backend: {}", other)),
        }
    }
}

/// Configuration for the photo inference pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Backend used for every run
    pub backend: BackendKind,
    /// Path to the classifier ONNX model
    pub classifier_model_path: String,
    /// Path to the classifier labels file (one label per line)
    pub classifier_labels_path: String,
    /// Path to the detector ONNX model
    pub detector_model_path: String,
    /// Path to the detector labels file (one label per line, class id 1 first)
    pub detector_labels_path: String,
    /// Largest encoded image accepted by the loader, in bytes
    pub max_image_size: usize,
    /// Detections scoring below this are dropped
    pub detector_min_score: f32,
    /// Maximum detections returned per image
    pub detector_max_detections: usize,
    /// Number of classes returned by the classifier
    pub classifier_top_k: usize,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: env::var("PHOTOLENS_BACKEND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.backend),
            classifier_model_path: env::var("CLASSIFIER_MODEL_PATH")
                .unwrap_or(defaults.classifier_model_path),
            classifier_labels_path: env::var("CLASSIFIER_LABELS_PATH")
                .unwrap_or(defaults.classifier_labels_path),
            detector_model_path: env::var("DETECTOR_MODEL_PATH")
                .unwrap_or(defaults.detector_model_path),
            detector_labels_path: env::var("DETECTOR_LABELS_PATH")
                .unwrap_or(defaults.detector_labels_path),
            max_image_size: env::var("MAX_IMAGE_SIZE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_image_size),
            detector_min_score: env::var("DETECTOR_MIN_SCORE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.detector_min_score),
            detector_max_detections: env::var("DETECTOR_MAX_DETECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.detector_max_detections),
            classifier_top_k: env::var("CLASSIFIER_TOP_K")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.classifier_top_k),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_image_size == 0 {
            return Err("Max image size must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.detector_min_score) {
            return Err(format!(
                "Detector min score must be within [0, 1], got {}",
                self.detector_min_score
            ));
        }
        if self.detector_max_detections == 0 {
            return Err("Detector max detections must be greater than 0".to_string());
        }
        if self.classifier_top_k == 0 {
            return Err("Classifier top-k must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            // The detector path is the one the app runs on every selection
            backend: BackendKind::Detector,
            classifier_model_path: "./models/mobilenet-onnx/model.onnx".to_string(),
            classifier_labels_path: "./models/mobilenet-onnx/labels.txt".to_string(),
            detector_model_path: "./models/coco-ssd-onnx/model.onnx".to_string(),
            detector_labels_path: "./models/coco-ssd-onnx/labels.txt".to_string(),
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
            detector_min_score: 0.5,
            detector_max_detections: 20,
            classifier_top_k: 3,
        }
    }
}
