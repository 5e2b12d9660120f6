// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Selection-driven pipeline: picker, state machine and controller

pub mod controller;
pub mod picker;
pub mod state;

pub use controller::{PipelineController, RunOutcome};
pub use picker::{ImagePicker, PathPicker, PickResult};
pub use state::{PipelineSnapshot, PipelineState};
