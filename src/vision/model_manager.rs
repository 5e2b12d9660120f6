// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Lazy loading and caching of the active model capability
//!
//! Loading is expensive and happens at most once per process. A failed load is
//! remembered and returned to every later caller without retrying.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{error, info};

use super::backend::{Classifier, Detector, ModelCapability};
use crate::config::BackendKind;
use crate::errors::PipelineError;

/// Factories for the two inference capabilities
#[async_trait]
pub trait ModelFactory: Send + Sync {
    async fn load_classifier(&self) -> Result<Arc<dyn Classifier>, PipelineError>;
    async fn load_detector(&self) -> Result<Arc<dyn Detector>, PipelineError>;
}

/// Owns the single cached capability for the configured backend
pub struct ModelManager {
    backend: BackendKind,
    factory: Arc<dyn ModelFactory>,
    capability: OnceCell<ModelCapability>,
    failure: OnceLock<PipelineError>,
    load_attempts: AtomicUsize,
}

impl std::fmt::Debug for ModelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelManager")
            .field("backend", &self.backend)
            .field("loaded", &self.is_loaded())
            .field("failure", &self.failure.get())
            .finish_non_exhaustive()
    }
}

impl ModelManager {
    pub fn new(backend: BackendKind, factory: Arc<dyn ModelFactory>) -> Self {
        Self {
            backend,
            factory,
            capability: OnceCell::new(),
            failure: OnceLock::new(),
            load_attempts: AtomicUsize::new(0),
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Whether the capability is loaded and cached
    pub fn is_loaded(&self) -> bool {
        self.capability.initialized()
    }

    /// The load failure, if loading already failed
    pub fn load_error(&self) -> Option<&PipelineError> {
        self.failure.get()
    }

    /// Number of times the factory has been asked to load
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }

    /// Return the cached capability, loading it on first use
    ///
    /// Concurrent callers share a single in-flight load.
    ///
    /// # Errors
    /// Returns `PipelineError::ModelLoad` if loading fails now or failed before.
    pub async fn get_or_load(&self) -> Result<ModelCapability, PipelineError> {
        if let Some(err) = self.failure.get() {
            return Err(err.clone());
        }

        let capability = self
            .capability
            .get_or_try_init(|| async {
                // A waiter queued behind a failed load must not retry it
                if let Some(err) = self.failure.get() {
                    return Err(err.clone());
                }
                self.load().await.map_err(|err| {
                    let _ = self.failure.set(err.clone());
                    err
                })
            })
            .await?;

        Ok(capability.clone())
    }

    async fn load(&self) -> Result<ModelCapability, PipelineError> {
        self.load_attempts.fetch_add(1, Ordering::SeqCst);
        info!("Loading {} model", self.backend);
        let start = Instant::now();

        let result = match self.backend {
            BackendKind::Classifier => self
                .factory
                .load_classifier()
                .await
                .map(ModelCapability::Classifier),
            BackendKind::Detector => self
                .factory
                .load_detector()
                .await
                .map(ModelCapability::Detector),
        };

        match &result {
            Ok(capability) => info!(
                "✅ {} model {} loaded in {:?}",
                self.backend,
                capability.name(),
                start.elapsed()
            ),
            Err(e) => error!("❌ Failed to load {} model: {}", self.backend, e),
        }

        result
    }
}
