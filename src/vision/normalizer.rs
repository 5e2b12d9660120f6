// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Reduces a ranked prediction list to one displayable outcome

use serde::{Deserialize, Serialize};
use std::fmt;

use super::backend::Prediction;

/// Text shown when a run produced no prediction
pub const NO_RESULT_TEXT: &str = "No result";

/// Result of a completed pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Top-ranked prediction and its display text
    Labelled {
        label: String,
        confidence: f32,
        text: String,
    },
    /// The backend returned nothing
    NoPrediction,
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Labelled { text, .. } => text,
            Self::NoPrediction => NO_RESULT_TEXT,
        }
    }

    pub fn is_no_prediction(&self) -> bool {
        matches!(self, Self::NoPrediction)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Format a prediction as `"<label> (<confidence to 3 decimals>)"`
pub fn format_prediction(prediction: &Prediction) -> String {
    format!("{} ({:.3})", prediction.label, prediction.confidence)
}

/// Pick element 0 of the backend-ranked list
pub fn normalize(predictions: &[Prediction]) -> Outcome {
    match predictions.first() {
        Some(top) => Outcome::Labelled {
            label: top.label.clone(),
            confidence: top.confidence,
            text: format_prediction(top),
        },
        None => Outcome::NoPrediction,
    }
}
