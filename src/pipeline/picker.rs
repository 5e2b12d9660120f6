// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image selection boundary

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::PipelineError;

/// Result of one pick request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PickResult {
    pub cancelled: bool,
    pub uri: Option<String>,
}

impl PickResult {
    pub fn selected(uri: impl Into<String>) -> Self {
        Self {
            cancelled: false,
            uri: Some(uri.into()),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            uri: None,
        }
    }

    /// The chosen URI, or `None` when the pick should be ignored
    pub fn into_selection(self) -> Option<String> {
        if self.cancelled {
            return None;
        }
        self.uri.filter(|uri| !uri.is_empty())
    }
}

/// Asks the user for an image
#[async_trait]
pub trait ImagePicker: Send + Sync {
    async fn pick(&self) -> Result<PickResult, PipelineError>;
}

/// Picks from a fixed queue of paths; cancels once the queue is empty
#[derive(Debug, Default)]
pub struct PathPicker {
    queue: Mutex<VecDeque<String>>,
}

impl PathPicker {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: Mutex::new(paths.into_iter().map(Into::into).collect()),
        }
    }

    pub async fn remaining(&self) -> usize {
        self.queue.lock().await.len()
    }
}

#[async_trait]
impl ImagePicker for PathPicker {
    async fn pick(&self) -> Result<PickResult, PipelineError> {
        match self.queue.lock().await.pop_front() {
            Some(path) => {
                debug!("Picked {}", path);
                Ok(PickResult::selected(path))
            }
            None => Ok(PickResult::cancelled()),
        }
    }
}
