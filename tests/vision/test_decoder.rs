// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Loader and decoder tests against real files on disk
//!
//! Covers:
//! - Reading a JPEG through LocalFileSource and the base64 transport
//! - Both decode modes producing the same RGB tensor
//! - Rejection of non-JPEG, truncated and oversized inputs

use image::{DynamicImage, ImageFormat, RgbImage};
use photolens::errors::PipelineError;
use photolens::vision::loader::resolve_path;
use photolens::vision::{decode_jpeg, load_image, DecodeMode, LocalFileSource};
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 2) as u8, (y * 2) as u8, 128])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

#[cfg(test)]
mod decoder_tests {
    use super::*;

    /// Test 1: a 100x100 JPEG on disk decodes to 100*100*3 bytes in both modes
    #[tokio::test]
    async fn test_jpeg_on_disk_decodes_in_both_modes() {
        let file = write_temp(&encode(100, 100, ImageFormat::Jpeg));
        let source_id = file.path().to_string_lossy().into_owned();

        let encoded = load_image(&LocalFileSource::new(), &source_id)
            .await
            .unwrap();
        assert_eq!(encoded.source_id(), source_id);

        let rgb = decode_jpeg(encoded.bytes(), DecodeMode::Rgb).unwrap();
        let stripped = decode_jpeg(encoded.bytes(), DecodeMode::RgbaStrip).unwrap();

        assert_eq!(rgb.shape(), [100, 100, 3]);
        assert_eq!(rgb.data().len(), 100 * 100 * 3);
        assert_eq!(rgb, stripped);
    }

    /// Test 2: decoding the same stream twice is deterministic
    #[test]
    fn test_decode_is_deterministic() {
        let bytes = encode(37, 21, ImageFormat::Jpeg);
        let first = decode_jpeg(&bytes, DecodeMode::RgbaStrip).unwrap();
        let second = decode_jpeg(&bytes, DecodeMode::RgbaStrip).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.height(), 21);
        assert_eq!(first.width(), 37);
    }

    /// Test 3: file:// URLs resolve to the same file
    #[tokio::test]
    async fn test_file_url_source() {
        let file = write_temp(&encode(8, 8, ImageFormat::Jpeg));
        let url = url::Url::from_file_path(file.path()).unwrap().to_string();

        assert_eq!(resolve_path(&url).unwrap(), file.path());
        let encoded = load_image(&LocalFileSource::new(), &url).await.unwrap();
        assert!(!encoded.is_empty());
    }

    /// Test 4: PNG bytes are a decode failure, not an I/O failure
    #[test]
    fn test_png_is_rejected() {
        let bytes = encode(8, 8, ImageFormat::Png);
        let err = decode_jpeg(&bytes, DecodeMode::Rgb).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
        assert!(err.to_string().contains("unsupported image format"));
    }

    /// Test 5: a truncated JPEG stream fails to decode
    #[test]
    fn test_truncated_jpeg_fails() {
        let bytes = encode(64, 64, ImageFormat::Jpeg);
        let err = decode_jpeg(&bytes[..bytes.len() / 4], DecodeMode::Rgb).unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    /// Test 6: files over the size limit are refused before reading
    #[tokio::test]
    async fn test_oversized_file_is_io_error() {
        let file = write_temp(&encode(32, 32, ImageFormat::Jpeg));
        let source_id = file.path().to_string_lossy().into_owned();

        let files = LocalFileSource::new().with_max_image_size(16);
        let err = load_image(&files, &source_id).await.unwrap_err();

        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(err.to_string().contains("too large"));
    }

    /// Test 7: a missing file is an I/O failure naming the source
    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = load_image(&LocalFileSource::new(), "/no/such/photo.jpg")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/no/such/photo.jpg"));
        assert!(err.is_run_local());
    }
}
