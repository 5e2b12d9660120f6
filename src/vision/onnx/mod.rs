// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime model backends
//!
//! Both models run on CPU via `ort`.
//!
//! Components:
//! - `classifier` - MobileNet-style single-label classifier
//! - `detector` - SSD-style COCO object detector
//! - `labels` - Class label tables
//! - `preprocessing` - Input tensors and score post-processing
//! - `factory` - `ModelFactory` wiring from `PipelineConfig`

pub mod classifier;
pub mod detector;
pub mod factory;
pub mod labels;
pub mod preprocessing;

pub use classifier::OnnxClassifier;
pub use detector::{OnnxDetector, RawDetections};
pub use factory::OnnxModelFactory;
pub use labels::{LabelError, LabelTable};

use crate::errors::PipelineError;

/// Run a synchronous ONNX session call on the blocking pool
///
/// `Session::run` holds the CPU for the whole forward pass, so it must not
/// run on a runtime worker. A panicking call becomes `Inference`.
pub(crate) async fn run_blocking<T, F>(model: &str, call: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| PipelineError::Inference(format!("{} task failed: {}", model, e)))?
}
