// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Builds the ONNX backends from pipeline configuration

use async_trait::async_trait;
use std::sync::Arc;

use super::classifier::OnnxClassifier;
use super::detector::OnnxDetector;
use crate::config::{BackendKind, PipelineConfig};
use crate::errors::PipelineError;
use crate::vision::backend::{Classifier, Detector};
use crate::vision::model_manager::ModelFactory;

/// `ModelFactory` backed by ONNX Runtime models on disk
#[derive(Debug, Clone)]
pub struct OnnxModelFactory {
    config: PipelineConfig,
}

impl OnnxModelFactory {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ModelFactory for OnnxModelFactory {
    async fn load_classifier(&self) -> Result<Arc<dyn Classifier>, PipelineError> {
        let model = OnnxClassifier::new(
            &self.config.classifier_model_path,
            &self.config.classifier_labels_path,
        )
        .await
        .map_err(|e| PipelineError::model_load(BackendKind::Classifier.as_str(), format!("{:#}", e)))?
        .with_top_k(self.config.classifier_top_k);

        Ok(Arc::new(model))
    }

    async fn load_detector(&self) -> Result<Arc<dyn Detector>, PipelineError> {
        let model = OnnxDetector::new(
            &self.config.detector_model_path,
            &self.config.detector_labels_path,
        )
        .await
        .map_err(|e| PipelineError::model_load(BackendKind::Detector.as_str(), format!("{:#}", e)))?
        .with_min_score(self.config.detector_min_score)
        .with_max_detections(self.config.detector_max_detections);

        Ok(Arc::new(model))
    }
}
