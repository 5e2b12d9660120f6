// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pipeline state and the display snapshot

use serde::{Serialize, Serializer};

use crate::errors::PipelineError;
use crate::vision::normalizer::Outcome;

/// Shown while the model capability loads
pub const MODEL_LOADING_TEXT: &str = "Loading model...";

/// Shown while a selection is being processed
pub const INFERRING_TEXT: &str = "Loading...";

/// Shown before the first selection completes
pub const PROMPT_TEXT: &str = "Choose an image to classify!";

/// Controller state machine
///
/// `Uninitialized -> ModelLoading -> Idle <-> Inferring -> Ready(outcome)`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "outcome", rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing loaded, nothing selected
    Uninitialized,
    /// The capability is loading (or failed to load)
    ModelLoading,
    /// Capability loaded, nothing in flight
    Idle,
    /// A selection is running load, decode, infer, normalize
    Inferring,
    /// Last committed outcome
    Ready(Outcome),
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::ModelLoading => "model_loading",
            Self::Idle => "idle",
            Self::Inferring => "inferring",
            Self::Ready(_) => "ready",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a display needs, published after every change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub state: PipelineState,
    /// Last committed outcome, kept visible across failed runs
    pub result: Option<Outcome>,
    /// Source of the most recent selection
    pub current_image_source: Option<String>,
    /// Failure of the most recent run, cleared by the next commit
    #[serde(serialize_with = "serialize_error")]
    pub last_error: Option<PipelineError>,
    /// Model load failure; set once and never cleared
    #[serde(serialize_with = "serialize_error")]
    pub model_error: Option<PipelineError>,
    /// Token of the most recently started run
    pub latest_run: u64,
}

impl Default for PipelineSnapshot {
    fn default() -> Self {
        Self {
            state: PipelineState::Uninitialized,
            result: None,
            current_image_source: None,
            last_error: None,
            model_error: None,
            latest_run: 0,
        }
    }
}

impl PipelineSnapshot {
    /// The line a user sees for this snapshot
    pub fn display_text(&self) -> String {
        if let Some(err) = &self.model_error {
            return format!("Model unavailable: {}", err);
        }

        match &self.state {
            PipelineState::ModelLoading => MODEL_LOADING_TEXT.to_string(),
            PipelineState::Inferring => INFERRING_TEXT.to_string(),
            PipelineState::Ready(outcome) => match &self.last_error {
                Some(err) => format!("{} (could not process image: {})", outcome.text(), err),
                None => outcome.text().to_string(),
            },
            PipelineState::Uninitialized | PipelineState::Idle => match &self.last_error {
                Some(err) => format!("Could not process image: {}", err),
                None => PROMPT_TEXT.to_string(),
            },
        }
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<PipelineError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct ErrorReport<'a> {
        kind: &'a str,
        message: String,
    }

    error
        .as_ref()
        .map(|err| ErrorReport {
            kind: err.kind(),
            message: err.to_string(),
        })
        .serialize(serializer)
}
