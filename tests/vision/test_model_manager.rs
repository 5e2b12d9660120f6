// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model manager tests
//!
//! These tests verify that the ModelManager:
//! - Loads the configured backend lazily and exactly once
//! - Shares one in-flight load between concurrent callers
//! - Remembers a failed load and never retries it
//! - Surfaces missing ONNX files as ModelLoad errors

use async_trait::async_trait;
use photolens::config::{BackendKind, PipelineConfig};
use photolens::errors::PipelineError;
use photolens::vision::backend::{BoundingBox, DetectedObject, Detector};
use photolens::vision::onnx::OnnxModelFactory;
use photolens::vision::{Classifier, DecodeMode, ImageTensor, ModelFactory, ModelManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Detector that always sees one cat
struct CatDetector;

#[async_trait]
impl Detector for CatDetector {
    async fn detect(&self, _tensor: &ImageTensor) -> Result<Vec<DetectedObject>, PipelineError> {
        Ok(vec![DetectedObject {
            class: "cat".to_string(),
            score: 0.77,
            bbox: BoundingBox {
                x: 1.0,
                y: 2.0,
                width: 3.0,
                height: 4.0,
            },
        }])
    }

    fn name(&self) -> &str {
        "cat-detector"
    }
}

/// Factory that counts loads and takes a while to finish each one
struct SlowFactory {
    loads: AtomicUsize,
    fail: bool,
}

impl SlowFactory {
    fn new(fail: bool) -> Self {
        Self {
            loads: AtomicUsize::new(0),
            fail,
        }
    }
}

#[async_trait]
impl ModelFactory for SlowFactory {
    async fn load_classifier(&self) -> Result<Arc<dyn Classifier>, PipelineError> {
        Err(PipelineError::model_load("classifier", "not configured"))
    }

    async fn load_detector(&self) -> Result<Arc<dyn Detector>, PipelineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.fail {
            return Err(PipelineError::model_load("detector", "weights corrupt"));
        }
        Ok(Arc::new(CatDetector))
    }
}

#[cfg(test)]
mod model_manager_tests {
    use super::*;

    /// Test 1: nothing loads until the first request
    #[tokio::test]
    async fn test_lazy_load() {
        let factory = Arc::new(SlowFactory::new(false));
        let manager = ModelManager::new(BackendKind::Detector, factory.clone());

        assert!(!manager.is_loaded());
        assert_eq!(factory.loads.load(Ordering::SeqCst), 0);

        let capability = manager.get_or_load().await.unwrap();
        assert_eq!(capability.kind(), BackendKind::Detector);
        assert_eq!(capability.decode_mode(), DecodeMode::RgbaStrip);
        assert!(manager.is_loaded());
    }

    /// Test 2: concurrent callers share one load
    #[tokio::test]
    async fn test_concurrent_callers_share_one_load() {
        let factory = Arc::new(SlowFactory::new(false));
        let manager = Arc::new(ModelManager::new(BackendKind::Detector, factory.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_or_load().await.map(|c| c.name().to_string()) })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "cat-detector");
        }
        assert_eq!(factory.loads.load(Ordering::SeqCst), 1);
        assert_eq!(manager.load_attempts(), 1);
    }

    /// Test 3: a failed load is returned to every caller without retrying
    #[tokio::test]
    async fn test_failed_load_is_not_retried() {
        let factory = Arc::new(SlowFactory::new(true));
        let manager = Arc::new(ModelManager::new(BackendKind::Detector, factory.clone()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_or_load().await.map(|_| ()) })
            })
            .collect();
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(err.to_string().contains("weights corrupt"));
        }

        assert!(manager.get_or_load().await.is_err());
        assert_eq!(factory.loads.load(Ordering::SeqCst), 1);
        assert!(manager.load_error().is_some());
    }

    /// Test 4: the loaded capability maps detections to predictions
    #[tokio::test]
    async fn test_capability_infers_predictions() {
        let manager = ModelManager::new(BackendKind::Detector, Arc::new(SlowFactory::new(false)));
        let capability = manager.get_or_load().await.unwrap();

        let tensor = ImageTensor::from_raw(2, 2, vec![0; 12]).unwrap();
        let predictions = capability.infer(&tensor).await.unwrap();

        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].label, "cat");
        assert_eq!(predictions[0].confidence, 0.77);
    }

    /// Test 5: ONNX factory with missing files yields a sticky ModelLoad error
    #[tokio::test]
    async fn test_onnx_factory_missing_model() {
        let config = PipelineConfig {
            backend: BackendKind::Classifier,
            classifier_model_path: "/nonexistent/model.onnx".to_string(),
            ..Default::default()
        };
        let manager = ModelManager::new(
            config.backend,
            Arc::new(OnnxModelFactory::new(config)),
        );

        let err = manager.get_or_load().await.unwrap_err();
        assert!(matches!(err, PipelineError::ModelLoad { .. }));
        assert!(!err.is_run_local());
        assert_eq!(manager.get_or_load().await.unwrap_err(), err);
        assert_eq!(manager.load_attempts(), 1);
    }
}
