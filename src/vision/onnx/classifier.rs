// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! MobileNet-style image classifier on ONNX Runtime

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::labels::LabelTable;
use super::run_blocking;
use super::preprocessing::{
    is_probability_distribution, preprocess_for_classifier, softmax, top_k, CLASSIFIER_INPUT_SIZE,
};
use crate::errors::PipelineError;
use crate::vision::backend::{ClassScore, Classifier};
use crate::vision::decoder::ImageTensor;

/// ONNX image classifier
///
/// Expects an NCHW `f32` input of `CLASSIFIER_INPUT_SIZE` pixels scaled to
/// [-1, 1] and a single `[1, classes]` output of logits or probabilities.
#[derive(Clone)]
pub struct OnnxClassifier {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    input_name: String,
    labels: Arc<LabelTable>,
    name: String,
    input_size: u32,
    top_k: usize,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("name", &self.name)
            .field("input_name", &self.input_name)
            .field("labels", &self.labels.len())
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl OnnxClassifier {
    /// Load the classifier and its labels
    ///
    /// # Errors
    /// Returns error if either file is missing or ONNX Runtime initialization fails.
    pub async fn new<P: AsRef<Path>>(model_path: P, labels_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let labels_path = labels_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Classifier model not found: {}", model_path.display());
        }

        info!("Loading classifier model from {}", model_path.display());

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
                "Failed to load classifier model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("Classifier model has no inputs")?;

        let name = model_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "classifier".to_string());

        debug!(
            "Classifier loaded - input: {}, labels: {}",
            input_name,
            labels.len()
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            labels: Arc::new(labels),
            name,
            input_size: CLASSIFIER_INPUT_SIZE,
            top_k: 3,
        })
    }

    /// Set how many classes `classify` returns
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    fn run(&self, tensor: &ImageTensor) -> Result<Vec<f32>, PipelineError> {
        let input = preprocess_for_classifier(tensor, self.input_size)?;
        let input_value = Value::from_array(input)
            .map_err(|e| PipelineError::Inference(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PipelineError::Inference("classifier session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| PipelineError::Inference(format!("Classification failed: {}", e)))?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| PipelineError::Inference(format!("Failed to extract output: {}", e)))?;

        Ok(output.iter().copied().collect())
    }
}

/// Turn raw classifier scores into ranked class scores
///
/// Models exported with a leading background class (labels + 1 outputs) have
/// index 0 dropped before ranking.
pub fn rank_classes(raw: &[f32], labels: &LabelTable, k: usize) -> Vec<ClassScore> {
    let raw = if raw.len() == labels.len() + 1 {
        &raw[1..]
    } else {
        raw
    };

    let probabilities = if is_probability_distribution(raw) {
        raw.to_vec()
    } else {
        softmax(raw)
    };

    top_k(&probabilities, k)
        .into_iter()
        .map(|(index, probability)| ClassScore {
            class_name: labels.get(index).to_string(),
            probability,
        })
        .collect()
}

#[async_trait]
impl Classifier for OnnxClassifier {
    async fn classify(&self, tensor: &ImageTensor) -> Result<Vec<ClassScore>, PipelineError> {
        let model = self.clone();
        let tensor = tensor.clone();
        let raw = run_blocking("classifier", move || model.run(&tensor)).await?;
        Ok(rank_classes(&raw, &self.labels, self.top_k))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
