//! PNG export of composed scenes.
//!
//! Export either writes a complete file or nothing: every precondition is
//! checked while rendering, before a sink sees any bytes, and
//! [`DirectorySink`] only renames a fully written temporary into place.

use std::path::{Path, PathBuf};

use image::ImageEncoder;
use maymay_core::Scene;

use crate::compositor::{Compositor, RenderedImage};
use crate::error::{RenderError, RenderResult};
use crate::resolve::ResolvedImages;

/// Prefix of every exported file name.
pub const PRODUCT_TAG: &str = "maymay";

/// Encode a rendered image as a lossless PNG.
///
/// # Errors
///
/// Returns [`RenderError::Export`] if encoding fails.
pub fn encode_png(image: &RenderedImage) -> RenderResult<Vec<u8>> {
    let rgba = image.to_rgba_image();
    let mut buf = std::io::Cursor::new(Vec::new());
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            image::ColorType::Rgba8.into(),
        )
        .map_err(|e| RenderError::Export(format!("PNG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

/// File name for an export of `template_name`: `maymay-<name>.png` with
/// everything outside ASCII letters and digits replaced by `_`.
#[must_use]
pub fn export_filename(template_name: &str) -> String {
    let safe: String = template_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{PRODUCT_TAG}-{safe}.png")
}

/// Destination for finished exports.
pub trait ExportSink {
    /// Store `bytes` under `filename` and return where they went.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes could not be stored. Nothing partial
    /// may remain behind on failure.
    fn save(&self, filename: &str, bytes: &[u8]) -> RenderResult<PathBuf>;
}

/// Saves exports into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Sink writing into `dir` (created on first save).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ExportSink for DirectorySink {
    fn save(&self, filename: &str, bytes: &[u8]) -> RenderResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let target = self.dir.join(filename);
        let partial = self.dir.join(format!("{filename}.partial"));

        let written =
            std::fs::write(&partial, bytes).and_then(|()| std::fs::rename(&partial, &target));
        if let Err(e) = written {
            match std::fs::remove_file(&partial) {
                Ok(()) => tracing::debug!("Removed partial file {}", partial.display()),
                Err(cleanup) if cleanup.kind() == std::io::ErrorKind::NotFound => {}
                Err(cleanup) => {
                    tracing::warn!("Could not remove {}: {cleanup}", partial.display());
                }
            }
            return Err(RenderError::Export(format!(
                "could not save {}: {e}",
                target.display()
            )));
        }

        tracing::info!("Exported {} ({} bytes)", target.display(), bytes.len());
        Ok(target)
    }
}

/// Render, encode and save a scene in one step.
#[derive(Debug)]
pub struct SceneExporter<S> {
    compositor: Compositor,
    sink: S,
}

impl<S: ExportSink> SceneExporter<S> {
    /// Exporter rendering with `compositor` into `sink`.
    #[must_use]
    pub fn new(compositor: Compositor, sink: S) -> Self {
        Self { compositor, sink }
    }

    /// The compositor used for rendering.
    #[must_use]
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Export `scene` as `maymay-<template_name>.png`.
    ///
    /// # Errors
    ///
    /// Returns the render error if the base image is unavailable or no
    /// buffer could be allocated (the sink is not touched), or an export
    /// error if encoding or saving fails.
    pub fn export(
        &self,
        scene: &Scene,
        images: &ResolvedImages,
        template_name: &str,
    ) -> RenderResult<PathBuf> {
        let rendered = self.compositor.render(scene, images)?;
        let png = encode_png(&rendered)?;
        self.sink.save(&export_filename(template_name), &png)
    }
}
