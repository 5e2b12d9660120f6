// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! SSD-style object detector on ONNX Runtime
//!
//! Targets TensorFlow Object Detection API exports (the COCO-SSD family):
//! - input: `u8` image tensor `[1, H, W, 3]`, fed as decoded
//! - outputs: `detection_boxes` `[1, N, 4]` (normalized ymin, xmin, ymax, xmax),
//!   `detection_classes` `[1, N]` (1-based COCO ids), `detection_scores` `[1, N]`,
//!   `num_detections` `[1]`

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::labels::LabelTable;
use super::run_blocking;
use crate::errors::PipelineError;
use crate::vision::backend::{BoundingBox, DetectedObject, Detector};
use crate::vision::decoder::ImageTensor;

/// Default minimum detection score
pub const DEFAULT_MIN_SCORE: f32 = 0.5;

/// Default maximum number of detections
pub const DEFAULT_MAX_DETECTIONS: usize = 20;

/// Positions of the four SSD outputs in the session's output list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputIndices {
    pub boxes: usize,
    pub classes: usize,
    pub scores: usize,
    pub count: usize,
}

impl OutputIndices {
    /// Resolve output positions by name, falling back to export order
    pub fn resolve(names: &[String]) -> Self {
        let find = |needle: &str, fallback: usize| {
            names
                .iter()
                .position(|name| name.contains(needle))
                .unwrap_or(fallback)
        };

        Self {
            boxes: find("detection_boxes", 0),
            classes: find("detection_classes", 1),
            scores: find("detection_scores", 2),
            count: find("num_detections", 3),
        }
    }
}

/// ONNX SSD object detector
#[derive(Clone)]
pub struct OnnxDetector {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    input_name: String,
    outputs: OutputIndices,
    labels: Arc<LabelTable>,
    name: String,
    min_score: f32,
    max_detections: usize,
}

impl std::fmt::Debug for OnnxDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxDetector")
            .field("name", &self.name)
            .field("input_name", &self.input_name)
            .field("outputs", &self.outputs)
            .field("min_score", &self.min_score)
            .field("max_detections", &self.max_detections)
            .finish_non_exhaustive()
    }
}

impl OnnxDetector {
    /// Load the detector and its labels
    ///
    /// # Errors
    /// Returns error if either file is missing, ONNX Runtime initialization
    /// fails, or the model does not expose the four SSD outputs.
    pub async fn new<P: AsRef<Path>>(model_path: P, labels_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let labels_path = labels_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Detector model not found: {}", model_path.display());
        }

        info!("Loading detector model from {}", model_path.display());

        let labels = LabelTable::from_file(labels_path)?;

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load detector model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("Detector model has no inputs")?;

        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();
        if output_names.len() < 4 {
            anyhow::bail!(
                "Detector model exposes {} outputs, expected 4 (boxes, classes, scores, count)",
                output_names.len()
            );
        }
        let outputs = OutputIndices::resolve(&output_names);

        let name = model_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "detector".to_string());

        debug!(
            "Detector loaded - input: {}, outputs: {:?} {:?}",
            input_name, output_names, outputs
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            outputs,
            labels: Arc::new(labels),
            name,
            min_score: DEFAULT_MIN_SCORE,
            max_detections: DEFAULT_MAX_DETECTIONS,
        })
    }

    /// Set the minimum score for detections
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score.clamp(0.0, 1.0);
        self
    }

    /// Set the maximum number of detections returned
    pub fn with_max_detections(mut self, max_detections: usize) -> Self {
        self.max_detections = max_detections.max(1);
        self
    }

    fn run(&self, tensor: &ImageTensor) -> Result<RawDetections, PipelineError> {
        let input = tensor.to_nhwc_batch()?;
        let input_value = Value::from_array(input)
            .map_err(|e| PipelineError::Inference(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PipelineError::Inference("detector session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| PipelineError::Inference(format!("Detection failed: {}", e)))?;

        let extract = |index: usize, what: &str| -> Result<Vec<f32>, PipelineError> {
            outputs[index]
                .try_extract_array::<f32>()
                .map(|array| array.iter().copied().collect())
                .map_err(|e| PipelineError::Inference(format!("Failed to extract {}: {}", what, e)))
        };

        let boxes = extract(self.outputs.boxes, "detection_boxes")?;
        let classes = extract(self.outputs.classes, "detection_classes")?;
        let scores = extract(self.outputs.scores, "detection_scores")?;
        let count = extract(self.outputs.count, "num_detections")?
            .first()
            .map(|&n| n.max(0.0) as usize)
            .unwrap_or(scores.len());

        Ok(RawDetections {
            boxes,
            classes,
            scores,
            count,
        })
    }
}

/// Flattened SSD outputs for one image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDetections {
    /// `count * 4` normalized coordinates: ymin, xmin, ymax, xmax
    pub boxes: Vec<f32>,
    pub classes: Vec<f32>,
    pub scores: Vec<f32>,
    pub count: usize,
}

/// Filter, label, and rank raw SSD outputs
///
/// Boxes are converted to pixel `[x, y, width, height]` for an image of
/// `width` x `height`.
pub fn postprocess_detections(
    raw: &RawDetections,
    labels: &LabelTable,
    width: usize,
    height: usize,
    min_score: f32,
    max_detections: usize,
) -> Vec<DetectedObject> {
    let count = raw
        .count
        .min(raw.scores.len())
        .min(raw.classes.len())
        .min(raw.boxes.len() / 4);
    if count < raw.count {
        warn!(
            "num_detections is {} but outputs only hold {} entries",
            raw.count, count
        );
    }

    let (w, h) = (width as f32, height as f32);
    let mut objects: Vec<DetectedObject> = (0..count)
        .filter(|&i| raw.scores[i] >= min_score)
        .map(|i| {
            let b = &raw.boxes[i * 4..i * 4 + 4];
            let (ymin, xmin, ymax, xmax) = (
                b[0].clamp(0.0, 1.0),
                b[1].clamp(0.0, 1.0),
                b[2].clamp(0.0, 1.0),
                b[3].clamp(0.0, 1.0),
            );
            DetectedObject {
                class: labels.get_one_based(raw.classes[i].round() as usize).to_string(),
                score: raw.scores[i],
                bbox: BoundingBox {
                    x: xmin * w,
                    y: ymin * h,
                    width: (xmax - xmin).max(0.0) * w,
                    height: (ymax - ymin).max(0.0) * h,
                },
            }
        })
        .collect();

    objects.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    objects.truncate(max_detections);
    objects
}

#[async_trait]
impl Detector for OnnxDetector {
    async fn detect(&self, tensor: &ImageTensor) -> Result<Vec<DetectedObject>, PipelineError> {
        let model = self.clone();
        let input = tensor.clone();
        let raw = run_blocking("detector", move || model.run(&input)).await?;
        Ok(postprocess_detections(
            &raw,
            &self.labels,
            tensor.width(),
            tensor.height(),
            self.min_score,
            self.max_detections,
        ))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
