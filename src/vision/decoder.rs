// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! JPEG decoding into `[height, width, 3]` u8 tensors
//!
//! Two decode modes exist because the two backends are fed differently:
//! - `DecodeMode::Rgb` decodes straight to packed RGB (classifier path)
//! - `DecodeMode::RgbaStrip` decodes to RGBA and repacks it as RGB by dropping
//!   every 4th byte (detector path)
//!
//! Pixel values are left untouched (0-255). Scaling and mean/std normalization
//! belong to the model backends.

use image::ImageFormat;
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PipelineError;

/// Number of channels in an `ImageTensor`
pub const RGB_CHANNELS: usize = 3;

/// Number of interleaved channels produced by an RGBA decode
pub const RGBA_CHANNELS: usize = 4;

/// How encoded bytes are turned into an RGB tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeMode {
    /// Mode A: decode directly to 3-channel RGB
    Rgb,
    /// Mode B: decode to 4-channel RGBA, then strip alpha
    RgbaStrip,
}

/// Decoded image as a `[height, width, 3]` array of u8
///
/// Always holds exactly `height * width * 3` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTensor {
    height: usize,
    width: usize,
    data: Box<[u8]>,
}

impl ImageTensor {
    /// Wrap a packed RGB buffer
    ///
    /// # Errors
    /// Returns `PipelineError::Decode` if `data.len() != height * width * 3`.
    pub fn from_raw(height: usize, width: usize, data: Vec<u8>) -> Result<Self, PipelineError> {
        let expected = height * width * RGB_CHANNELS;
        if data.len() != expected {
            return Err(PipelineError::Decode(format!(
                "tensor data length {} does not match shape [{}, {}, {}] (expected {})",
                data.len(),
                height,
                width,
                RGB_CHANNELS,
                expected
            )));
        }

        Ok(Self {
            height,
            width,
            data: data.into_boxed_slice(),
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        RGB_CHANNELS
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, RGB_CHANNELS]
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// RGB value at row `y`, column `x`
    pub fn pixel(&self, y: usize, x: usize) -> Option<[u8; 3]> {
        if y >= self.height || x >= self.width {
            return None;
        }
        let idx = (y * self.width + x) * RGB_CHANNELS;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Copy into a batched `[1, H, W, 3]` array
    pub fn to_nhwc_batch(&self) -> Result<Array4<u8>, PipelineError> {
        Array4::from_shape_vec(
            (1, self.height, self.width, RGB_CHANNELS),
            self.data.to_vec(),
        )
        .map_err(|e| PipelineError::Decode(e.to_string()))
    }
}

/// Detect image format from magic bytes
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.len() < 4 {
        return None;
    }

    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),

        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(ImageFormat::Png),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Some(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Some(ImageFormat::Bmp),

        _ => None,
    }
}

/// Decode a JPEG byte stream into an `ImageTensor`
///
/// # Errors
/// Returns `PipelineError::Decode` if the stream is empty, is not a JPEG,
/// fails to decode, or yields a pixel buffer inconsistent with its dimensions.
pub fn decode_jpeg(bytes: &[u8], mode: DecodeMode) -> Result<ImageTensor, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::Decode("image data is empty".to_string()));
    }

    match detect_format(bytes) {
        Some(ImageFormat::Jpeg) => {}
        Some(other) => {
            return Err(PipelineError::Decode(format!(
                "unsupported image format: {:?} (expected JPEG)",
                other
            )))
        }
        None => return Err(PipelineError::Decode("unsupported image format".to_string())),
    }

    let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?;
    let width = image.width() as usize;
    let height = image.height() as usize;

    let data = match mode {
        DecodeMode::Rgb => image.to_rgb8().into_raw(),
        DecodeMode::RgbaStrip => {
            let rgba = image.to_rgba8();
            strip_alpha(rgba.as_raw(), width, height)?
        }
    };

    debug!("Decoded {}x{} JPEG ({:?})", width, height, mode);

    ImageTensor::from_raw(height, width, data)
}

/// Repack an interleaved RGBA buffer as RGB
///
/// Walks the output in strides of 3 while the read offset into `rgba`
/// advances in strides of 4, so every 4th input byte (alpha) is skipped.
///
/// # Errors
/// Returns `PipelineError::Decode` unless `rgba.len() == width * height * 4`.
pub fn strip_alpha(rgba: &[u8], width: usize, height: usize) -> Result<Vec<u8>, PipelineError> {
    let mut buffer = vec![0u8; width * height * RGB_CHANNELS];

    if rgba.len() != buffer.len() / RGB_CHANNELS * RGBA_CHANNELS {
        return Err(PipelineError::Decode(format!(
            "RGBA buffer length {} does not match {}x{} image (expected {})",
            rgba.len(),
            width,
            height,
            buffer.len() / RGB_CHANNELS * RGBA_CHANNELS
        )));
    }

    let mut offset = 0;
    for i in (0..buffer.len()).step_by(RGB_CHANNELS) {
        buffer[i] = rgba[offset];
        buffer[i + 1] = rgba[offset + 1];
        buffer[i + 2] = rgba[offset + 2];
        offset += RGBA_CHANNELS;
    }

    Ok(buffer)
}
