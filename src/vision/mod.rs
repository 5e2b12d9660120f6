// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for photo classification and detection
//!
//! This module provides:
//! - Image loading over a base64 transport
//! - JPEG decoding into HWC RGB tensors
//! - Classifier and detector backends behind one capability type
//! - Reduction of ranked predictions to a display outcome
//!
//! Models run on CPU via ONNX Runtime.

pub mod backend;
pub mod decoder;
pub mod loader;
pub mod model_manager;
pub mod normalizer;
pub mod onnx;

pub use backend::{
    BoundingBox, ClassScore, Classifier, DetectedObject, Detector, ModelCapability, Prediction,
};
pub use decoder::{decode_jpeg, detect_format, strip_alpha, DecodeMode, ImageTensor};
pub use loader::{load_image, EncodedImage, FileSource, LocalFileSource};
pub use model_manager::{ModelFactory, ModelManager};
pub use normalizer::{format_prediction, normalize, Outcome, NO_RESULT_TEXT};
