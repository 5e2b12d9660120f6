// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Overlapping selections
//!
//! A slow run that finishes after a newer one must not overwrite the newer
//! run's outcome or error.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, RgbImage};
use photolens::config::BackendKind;
use photolens::errors::PipelineError;
use photolens::pipeline::{PathPicker, PipelineController, PipelineState, RunOutcome};
use photolens::vision::backend::ClassScore;
use photolens::vision::{Classifier, Detector, FileSource, ImageTensor, ModelFactory, ModelManager};
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::Notify;

fn jpeg_base64(width: u32, height: u32) -> String {
    let image = RgbImage::from_pixel(width, height, image::Rgb([10, 200, 10]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    STANDARD.encode(bytes)
}

/// File source that holds reads of `slow*` URIs until released
///
/// `slow.jpg` is 8 pixels wide, `slow-missing.jpg` fails, everything else is
/// 16 pixels wide.
struct GatedFiles {
    entered: Notify,
    release: Notify,
}

impl GatedFiles {
    fn new() -> Self {
        Self {
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl FileSource for GatedFiles {
    async fn read_bytes_as_base64(&self, uri: &str) -> Result<String, PipelineError> {
        if uri.starts_with("slow") {
            self.entered.notify_one();
            self.release.notified().await;
            if uri == "slow-missing.jpg" {
                return Err(PipelineError::io(uri, "handle is stale"));
            }
            return Ok(jpeg_base64(8, 8));
        }
        Ok(jpeg_base64(16, 16))
    }
}

/// Labels each image by its width
struct WidthClassifier;

#[async_trait]
impl Classifier for WidthClassifier {
    async fn classify(&self, tensor: &ImageTensor) -> Result<Vec<ClassScore>, PipelineError> {
        Ok(vec![ClassScore {
            class_name: format!("w{}", tensor.width()),
            probability: 0.9,
        }])
    }

    fn name(&self) -> &str {
        "width"
    }
}

struct WidthFactory;

#[async_trait]
impl ModelFactory for WidthFactory {
    async fn load_classifier(&self) -> Result<Arc<dyn Classifier>, PipelineError> {
        Ok(Arc::new(WidthClassifier))
    }

    async fn load_detector(&self) -> Result<Arc<dyn Detector>, PipelineError> {
        Err(PipelineError::model_load("detector", "not used"))
    }
}

/// Factory whose load waits until released
struct GatedFactory {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl ModelFactory for GatedFactory {
    async fn load_classifier(&self) -> Result<Arc<dyn Classifier>, PipelineError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Arc::new(WidthClassifier))
    }

    async fn load_detector(&self) -> Result<Arc<dyn Detector>, PipelineError> {
        Err(PipelineError::model_load("detector", "not used"))
    }
}

async fn setup() -> (Arc<PipelineController>, Arc<GatedFiles>) {
    let files = Arc::new(GatedFiles::new());
    let models = ModelManager::new(BackendKind::Classifier, Arc::new(WidthFactory));
    let controller = PipelineController::new(
        Arc::new(PathPicker::new(Vec::<String>::new())),
        files.clone(),
        Arc::new(models),
    );
    // Load the model up front so both runs go straight to inference
    controller.models().get_or_load().await.unwrap();
    (Arc::new(controller), files)
}

#[cfg(test)]
mod run_token_tests {
    use super::*;

    /// Test 1: the older run finishing last is discarded
    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let (controller, files) = setup().await;

        let slow = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.run_source("slow.jpg").await })
        };
        files.entered.notified().await;

        let fast = controller.run_source("fast.jpg").await.unwrap();
        assert!(matches!(fast, RunOutcome::Committed(ref o) if o.text() == "w16 (0.900)"));

        files.release.notify_one();
        assert_eq!(slow.await.unwrap().unwrap(), RunOutcome::Stale);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.display_text(), "w16 (0.900)");
        assert_eq!(snapshot.current_image_source.as_deref(), Some("fast.jpg"));
        assert_eq!(snapshot.latest_run, 2);
    }

    /// Test 2: a stale failure does not replace the newer outcome or set an error
    #[tokio::test]
    async fn test_stale_failure_is_discarded() {
        let (controller, files) = setup().await;

        let slow = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.run_source("slow-missing.jpg").await })
        };
        files.entered.notified().await;

        controller.run_source("fast.jpg").await.unwrap();
        files.release.notify_one();

        assert_eq!(slow.await.unwrap().unwrap(), RunOutcome::Stale);
        let snapshot = controller.snapshot();
        assert!(snapshot.last_error.is_none());
        assert!(matches!(snapshot.state, PipelineState::Ready(_)));
    }

    /// Test 3: a selection made during the model load supersedes the first one
    #[tokio::test]
    async fn test_selection_during_model_load() {
        let factory = Arc::new(GatedFactory {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let models = ModelManager::new(BackendKind::Classifier, factory.clone());
        let controller = Arc::new(PipelineController::new(
            Arc::new(PathPicker::new(Vec::<String>::new())),
            Arc::new(GatedFiles::new()),
            Arc::new(models),
        ));
        let mut rx = controller.subscribe();

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.run_source("a.jpg").await })
        };
        factory.entered.notified().await;
        assert_eq!(controller.snapshot().state, PipelineState::ModelLoading);

        let second = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.run_source("b.jpg").await })
        };
        rx.wait_for(|s| s.latest_run == 2).await.unwrap();
        factory.release.notify_one();

        assert_eq!(first.await.unwrap().unwrap(), RunOutcome::Stale);
        let outcome = second.await.unwrap().unwrap();
        assert!(matches!(outcome, RunOutcome::Committed(ref o) if o.text() == "w16 (0.900)"));

        let snapshot = controller.snapshot();
        assert!(matches!(snapshot.state, PipelineState::Ready(_)));
        assert_eq!(snapshot.current_image_source.as_deref(), Some("b.jpg"));
        assert_eq!(controller.models().load_attempts(), 1);
    }

    /// Test 4: the newer run shows as in flight while it waits
    #[tokio::test]
    async fn test_newest_run_drives_inferring_state() {
        let (controller, files) = setup().await;

        let slow = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.run_source("slow.jpg").await })
        };
        files.entered.notified().await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state, PipelineState::Inferring);
        assert_eq!(snapshot.current_image_source.as_deref(), Some("slow.jpg"));

        files.release.notify_one();
        let outcome = slow.await.unwrap().unwrap();
        assert!(matches!(outcome, RunOutcome::Committed(ref o) if o.text() == "w8 (0.900)"));
    }
}
