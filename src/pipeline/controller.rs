// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pipeline controller
//!
//! Drives one selection through load, decode, infer and normalize, and owns
//! the only mutable shared state. Every run gets a token when it starts; a
//! run commits only while its token is still the latest one issued.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::picker::ImagePicker;
use super::state::{PipelineSnapshot, PipelineState};
use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::vision::backend::ModelCapability;
use crate::vision::decoder::decode_jpeg;
use crate::vision::loader::{load_image, FileSource, LocalFileSource};
use crate::vision::model_manager::ModelManager;
use crate::vision::normalizer::{normalize, Outcome};
use crate::vision::onnx::OnnxModelFactory;

/// Capacity of the state transition feed
const TRANSITION_CAPACITY: usize = 64;

/// How a `select_image` call ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The run was still the latest when it finished; its outcome is displayed
    Committed(Outcome),
    /// A newer run started before this one finished; its result was dropped
    Stale,
    /// The picker was cancelled; nothing changed
    Cancelled,
}

pub struct PipelineController {
    picker: Arc<dyn ImagePicker>,
    files: Arc<dyn FileSource>,
    models: Arc<ModelManager>,
    state: watch::Sender<PipelineSnapshot>,
    transitions: broadcast::Sender<PipelineState>,
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("models", &self.models)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl PipelineController {
    pub fn new(
        picker: Arc<dyn ImagePicker>,
        files: Arc<dyn FileSource>,
        models: Arc<ModelManager>,
    ) -> Self {
        let (state, _) = watch::channel(PipelineSnapshot::default());
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            picker,
            files,
            models,
            state,
            transitions,
        }
    }

    /// Controller over local files and the ONNX backends named in `config`
    pub fn from_config(config: &PipelineConfig, picker: Arc<dyn ImagePicker>) -> Self {
        let files = LocalFileSource::new().with_max_image_size(config.max_image_size);
        let factory = OnnxModelFactory::new(config.clone());
        let models = ModelManager::new(config.backend, Arc::new(factory));
        Self::new(picker, Arc::new(files), Arc::new(models))
    }

    /// Current display snapshot
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.state.borrow().clone()
    }

    /// Change notification; the receiver always sees the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.state.subscribe()
    }

    /// Every state the controller enters, in order
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<PipelineState> {
        self.transitions.subscribe()
    }

    pub fn models(&self) -> &ModelManager {
        &self.models
    }

    /// Ask the picker for an image and run the pipeline on it
    ///
    /// A cancelled pick returns `RunOutcome::Cancelled` and leaves the
    /// snapshot untouched.
    ///
    /// # Errors
    /// Returns the run's `PipelineError` when the run was still current, or
    /// `ModelLoad` when the capability failed to load (now or earlier).
    pub async fn select_image(&self) -> Result<RunOutcome, PipelineError> {
        let pick = self.picker.pick().await?;
        match pick.into_selection() {
            Some(uri) => self.run_source(&uri).await,
            None => {
                debug!("Image selection cancelled");
                Ok(RunOutcome::Cancelled)
            }
        }
    }

    /// Run the pipeline on `uri` as a new selection
    pub async fn run_source(&self, uri: &str) -> Result<RunOutcome, PipelineError> {
        let needs_model = !self.models.is_loaded();
        let token = self.begin_run(uri, needs_model);
        info!("Run {} started for {}", token, uri);

        let capability = match self.models.get_or_load().await {
            Ok(capability) => capability,
            Err(err) => {
                self.record_model_error(&err);
                return Err(err);
            }
        };

        if !self.modify_if_current(token, |s| s.state = PipelineState::Inferring) {
            debug!("Run {} superseded before inference", token);
            return Ok(RunOutcome::Stale);
        }

        let start = Instant::now();
        let result = self.execute(&capability, uri).await;
        debug!("Run {} finished in {:?}", token, start.elapsed());

        self.commit(token, result)
    }

    async fn execute(
        &self,
        capability: &ModelCapability,
        uri: &str,
    ) -> Result<Outcome, PipelineError> {
        let encoded = load_image(self.files.as_ref(), uri).await?;

        let mode = capability.decode_mode();
        let bytes = encoded.into_bytes();
        let tensor = tokio::task::spawn_blocking(move || decode_jpeg(&bytes, mode))
            .await
            .map_err(|e| PipelineError::Decode(format!("decode task failed: {}", e)))??;

        let predictions = capability.infer(&tensor).await?;
        Ok(normalize(&predictions))
    }

    fn begin_run(&self, uri: &str, needs_model: bool) -> u64 {
        let mut token = 0;
        let transitions = &self.transitions;
        self.state.send_modify(|s| {
            s.latest_run += 1;
            token = s.latest_run;
            s.current_image_source = Some(uri.to_string());
            if needs_model && s.state != PipelineState::ModelLoading {
                s.state = PipelineState::ModelLoading;
                let _ = transitions.send(s.state.clone());
            }
        });
        token
    }

    fn record_model_error(&self, err: &PipelineError) {
        let transitions = &self.transitions;
        self.state.send_if_modified(|s| {
            let changed = s.model_error.as_ref() != Some(err);
            if changed {
                error!("Model unavailable: {}", err);
                s.model_error = Some(err.clone());
            }
            if s.state != PipelineState::ModelLoading {
                s.state = PipelineState::ModelLoading;
                let _ = transitions.send(s.state.clone());
                return true;
            }
            changed
        });
    }

    fn commit(
        &self,
        token: u64,
        result: Result<Outcome, PipelineError>,
    ) -> Result<RunOutcome, PipelineError> {
        match result {
            Ok(outcome) => {
                let committed = self.modify_if_current(token, |s| {
                    s.result = Some(outcome.clone());
                    s.last_error = None;
                    s.state = PipelineState::Ready(outcome.clone());
                });
                if committed {
                    info!("Run {} committed: {}", token, outcome);
                    Ok(RunOutcome::Committed(outcome))
                } else {
                    warn!("Discarding stale result of run {}: {}", token, outcome);
                    Ok(RunOutcome::Stale)
                }
            }
            Err(err) => {
                let committed = self.modify_if_current(token, |s| {
                    s.last_error = Some(err.clone());
                    s.state = match &s.result {
                        Some(previous) => PipelineState::Ready(previous.clone()),
                        None => PipelineState::Idle,
                    };
                });
                if committed {
                    warn!("Run {} failed ({}): {}", token, err.kind(), err);
                    Err(err)
                } else {
                    warn!("Discarding stale failure of run {}: {}", token, err);
                    Ok(RunOutcome::Stale)
                }
            }
        }
    }

    /// Apply `apply` only while `token` is the latest run
    fn modify_if_current<F>(&self, token: u64, apply: F) -> bool
    where
        F: FnOnce(&mut PipelineSnapshot),
    {
        let transitions = &self.transitions;
        self.state.send_if_modified(|s| {
            if s.latest_run != token {
                return false;
            }
            let before = s.state.clone();
            apply(s);
            if s.state != before {
                let _ = transitions.send(s.state.clone());
            }
            true
        })
    }
}
