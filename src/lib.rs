// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cli;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod vision;

pub use config::{BackendKind, PipelineConfig};
pub use errors::PipelineError;
pub use pipeline::{
    ImagePicker, PathPicker, PickResult, PipelineController, PipelineSnapshot, PipelineState,
    RunOutcome,
};
pub use vision::{
    DecodeMode, EncodedImage, FileSource, ImageTensor, LocalFileSource, ModelCapability,
    ModelFactory, ModelManager, Outcome, Prediction,
};
