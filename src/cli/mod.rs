// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{BackendKind, PipelineConfig};
use crate::pipeline::{PathPicker, PipelineController, RunOutcome};

/// Photolens CLI
#[derive(Parser, Debug)]
#[command(name = "photolens")]
#[command(version = "0.1.0")]
#[command(about = "Classify or detect objects in JPEG photos", long_about = None)]
pub struct Cli {
    /// Images to process, in order (plain paths or file:// URLs)
    #[arg(long = "image", short = 'i', required = true)]
    pub images: Vec<String>,

    /// Model backend (classifier or detector)
    #[arg(long, env = "PHOTOLENS_BACKEND")]
    pub backend: Option<BackendKind>,

    /// Classifier ONNX model path
    #[arg(long)]
    pub classifier_model: Option<String>,

    /// Classifier labels file
    #[arg(long)]
    pub classifier_labels: Option<String>,

    /// Detector ONNX model path
    #[arg(long)]
    pub detector_model: Option<String>,

    /// Detector labels file
    #[arg(long)]
    pub detector_labels: Option<String>,

    /// Print each snapshot as JSON instead of display text
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Environment configuration with command-line overrides applied
    pub fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::from_env();
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(path) = &self.classifier_model {
            config.classifier_model_path = path.clone();
        }
        if let Some(path) = &self.classifier_labels {
            config.classifier_labels_path = path.clone();
        }
        if let Some(path) = &self.detector_model {
            config.detector_model_path = path.clone();
        }
        if let Some(path) = &self.detector_labels {
            config.detector_labels_path = path.clone();
        }
        config
    }
}

/// Run every image through the pipeline, printing one line per selection
///
/// Run failures are reported and processing continues; a model load failure
/// stops the loop since every later selection would fail the same way.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.config();
    config.validate().map_err(|e| anyhow!(e))?;
    info!(
        "Using {} backend ({} image(s))",
        config.backend,
        cli.images.len()
    );

    let picker = Arc::new(PathPicker::new(cli.images.clone()));
    let controller = PipelineController::from_config(&config, picker);

    loop {
        match controller.select_image().await {
            Ok(RunOutcome::Cancelled) => break,
            Ok(_) => {}
            Err(e) if e.is_run_local() => warn!("Skipping image: {}", e),
            Err(e) => {
                print_snapshot(&controller, cli.json)?;
                return Err(e.into());
            }
        }
        print_snapshot(&controller, cli.json)?;
    }

    Ok(())
}

fn print_snapshot(controller: &PipelineController, json: bool) -> Result<()> {
    let snapshot = controller.snapshot();
    if json {
        println!("{}", serde_json::to_string(&snapshot)?);
    } else {
        let source = snapshot.current_image_source.as_deref().unwrap_or("-");
        println!("{}: {}", source, snapshot.display_text());
    }
    Ok(())
}
