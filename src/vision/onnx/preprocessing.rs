// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tensor preparation and score post-processing for the ONNX backends

use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;

use crate::errors::PipelineError;
use crate::vision::decoder::ImageTensor;

/// Input size for MobileNet-style classifiers
pub const CLASSIFIER_INPUT_SIZE: u32 = 224;

/// Preprocess a decoded tensor for the classifier
///
/// Steps:
/// 1. Resize to `size` x `size` (bilinear)
/// 2. Scale pixels to [-1, 1]: pixel / 127.5 - 1 (MobileNet convention)
/// 3. Convert to NCHW tensor format [1, 3, size, size]
pub fn preprocess_for_classifier(
    tensor: &ImageTensor,
    size: u32,
) -> Result<Array4<f32>, PipelineError> {
    let image = RgbImage::from_raw(
        tensor.width() as u32,
        tensor.height() as u32,
        tensor.data().to_vec(),
    )
    .ok_or_else(|| PipelineError::Inference("tensor does not fit an RGB image".to_string()))?;

    let resized = image::imageops::resize(&image, size, size, FilterType::Triangle);

    let size = size as usize;
    let mut input = Array4::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let pixel = resized.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                input[[0, c, y, x]] = pixel[c] as f32 / 127.5 - 1.0;
            }
        }
    }

    Ok(input)
}

/// Softmax over raw logits
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

/// Whether `scores` already look like a probability distribution
pub fn is_probability_distribution(scores: &[f32]) -> bool {
    let sum: f32 = scores.iter().sum();
    scores.iter().all(|&v| (0.0..=1.0).contains(&v)) && (sum - 1.0).abs() < 1e-3
}

/// Indices and values of the `k` largest scores, highest first
pub fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(k);
    indexed
}
