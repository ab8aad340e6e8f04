//! Copy images and media into the build, optionally re-encoding them.

use super::{read_source, relative, sources, write_output, StageOutput, StageResult};
use crate::build::error::{ErrorOrigin, StageError};
use crate::build::BuildContext;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::ImageEncoder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

const ORIGIN: ErrorOrigin = ErrorOrigin::Assets;

/// Copy every configured asset from the image source tree to `assets`.
///
/// Files are processed in parallel. With `minify`, JPEG and PNG files are
/// re-encoded and the smaller of the two encodings is written.
pub fn run(ctx: &BuildContext) -> StageResult {
    let images = ctx.config().images.clone();
    let source_dir = ctx.paths().images();
    let dest_dir = ctx.paths().assets();
    let files = sources(ORIGIN, source_dir, &images.extensions)?;

    if files.is_empty() {
        return Ok(StageOutput::unchanged());
    }

    let minify = ctx.minify();
    let outputs = files
        .par_iter()
        .map(|file| {
            let dest = dest_dir.join(relative(ORIGIN, source_dir, file)?);
            let original = read_source(ORIGIN, file)?;
            let bytes = if minify {
                optimise(file, &original, images.jpeg_quality)
                    .map_err(|e| StageError::new(ORIGIN, e).in_file(file))?
            } else {
                original
            };
            write_output(ORIGIN, &dest, &bytes)?;
            Ok(dest)
        })
        .collect::<Result<Vec<PathBuf>, StageError>>()?;

    tracing::debug!(count = outputs.len(), "copied assets");
    Ok(StageOutput::written(outputs))
}

/// Re-encode an image and keep whichever encoding is smaller.
///
/// Formats other than JPEG and PNG are returned untouched.
pub fn optimise(path: &Path, original: &[u8], jpeg_quality: u8) -> Result<Vec<u8>, String> {
    let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
    let encoded = match ext.as_deref() {
        Some("jpg") | Some("jpeg") => encode_jpeg(original, jpeg_quality)?,
        Some("png") => encode_png(original)?,
        _ => return Ok(original.to_vec()),
    };

    if encoded.len() < original.len() {
        Ok(encoded)
    } else {
        Ok(original.to_vec())
    }
}

fn encode_jpeg(original: &[u8], quality: u8) -> Result<Vec<u8>, String> {
    let image = image::load_from_memory(original).map_err(|e| e.to_string())?.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .write_image(image.as_raw(), image.width(), image.height(), image::ColorType::Rgb8)
        .map_err(|e| e.to_string())?;
    Ok(out)
}

fn encode_png(original: &[u8]) -> Result<Vec<u8>, String> {
    let image = image::load_from_memory(original).map_err(|e| e.to_string())?.to_rgba8();
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive)
        .write_image(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8)
        .map_err(|e| e.to_string())?;
    Ok(out)
}
