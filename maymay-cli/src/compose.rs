//! The `compose` pipeline: build a scene, resolve its images, export a PNG.

use std::path::{Path, PathBuf};

use maymay_core::{CanvasError, Scene, TextPatch};
use maymay_renderer::image::load_image_from_bytes;
use maymay_renderer::{
    resolve_scene, Compositor, DirectorySink, ImageFetcher, RenderError, SceneExporter,
    SessionGuard,
};
use thiserror::Error;

use crate::templates::{TemplateClient, TemplateError};
use crate::ComposeArgs;

/// Shown when the base image could not be drawn.
pub const BASE_IMAGE_HINT: &str = "Failed to generate image. This may be caused by cross-origin \
restrictions on the source image. Try using an image served with CORS enabled.";

/// Name used for exports whose base has no usable name.
const FALLBACK_NAME: &str = "meme";

/// Errors from the compose pipeline.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Neither a scene file, a base image nor a template id was given.
    #[error("nothing to compose: pass --scene, --base or --template-id")]
    MissingBase,
    /// The template lookup failed.
    #[error("template lookup failed: {0}")]
    Template(#[from] TemplateError),
    /// The scene file or an edit was invalid.
    #[error(transparent)]
    Scene(#[from] CanvasError),
    /// An input file could not be read.
    #[error("could not read {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Resolving, rendering or saving failed.
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ComposeError {
    /// Whether the failure was the base image being unavailable.
    #[must_use]
    pub fn is_base_unavailable(&self) -> bool {
        matches!(self, Self::Render(RenderError::BaseImageUnavailable(_)))
    }
}

/// A scene ready to render, with the name its export will carry.
#[derive(Debug)]
pub struct Draft {
    /// Scene to render.
    pub scene: Scene,
    /// Template name used for the export file name.
    pub name: String,
}

async fn read(path: &Path) -> Result<Vec<u8>, ComposeError> {
    tokio::fs::read(path).await.map_err(|source| ComposeError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn name_from_location(location: &str) -> String {
    let trimmed = location.split(['?', '#']).next().unwrap_or_default();
    Path::new(trimmed)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_NAME)
        .to_string()
}

/// Set the caption at `index`, adding captions until it exists.
fn set_caption(scene: &mut Scene, index: usize, content: &str) -> Result<(), CanvasError> {
    while scene.text_layers().len() <= index {
        scene.add_text();
    }
    let id = scene.text_layers()[index].id;
    scene.update_text(id, &TextPatch::content(content))
}

/// Build the scene described by `args`.
///
/// # Errors
///
/// Returns an error if no base was given, the template or scene file cannot
/// be loaded, or an overlay file cannot be read or decoded.
pub async fn build_scene(
    args: &ComposeArgs,
    client: &TemplateClient,
) -> Result<Draft, ComposeError> {
    let (mut scene, name) = if let Some(path) = &args.scene {
        let json = String::from_utf8_lossy(&read(path).await?).into_owned();
        let scene = Scene::from_json(&json)?;
        let name = name_from_location(&path.display().to_string());
        (scene, name)
    } else if let Some(id) = args.template_id {
        let template = client.get(id).await?;
        tracing::info!("Using template {} ({})", template.id, template.name);
        (Scene::with_default_captions(template.url), template.name)
    } else if let Some(base) = &args.base {
        (Scene::with_default_captions(base.clone()), name_from_location(base))
    } else {
        return Err(ComposeError::MissingBase);
    };

    if let Some(top) = &args.top {
        set_caption(&mut scene, 0, top)?;
    }
    if let Some(bottom) = &args.bottom {
        set_caption(&mut scene, 1, bottom)?;
    }
    for text in &args.texts {
        let id = scene.add_text().id;
        scene.update_text(id, &TextPatch::content(text.as_str()))?;
    }

    for path in &args.overlays {
        let bytes = read(path).await?;
        let aspect = load_image_from_bytes(&bytes)?.aspect();
        let id = scene.add_local_image(bytes, aspect).id;
        tracing::debug!("Overlay {} added as {id}", path.display());
    }

    Ok(Draft { scene, name })
}

/// Resolve, render and export `draft` into `out_dir`.
///
/// The draft's local resources are released afterwards, on success or not.
///
/// # Errors
///
/// Returns the render error if the base image is unavailable or the file
/// cannot be written. No file is left behind on failure.
pub async fn export_draft(
    mut draft: Draft,
    fetcher: &dyn ImageFetcher,
    compositor: Compositor,
    out_dir: &Path,
) -> Result<PathBuf, ComposeError> {
    let guard = SessionGuard::new();
    let result = async {
        let images = resolve_scene(&draft.scene, fetcher, &guard).await?;
        if !images.failures().is_empty() {
            tracing::warn!("{} image source(s) could not be resolved", images.failures().len());
        }
        let exporter = SceneExporter::new(compositor, DirectorySink::new(out_dir));
        exporter.export(&draft.scene, &images, &draft.name)
    }
    .await;

    let released = draft.scene.teardown();
    tracing::debug!("Released {released} local resource(s)");
    result.map_err(ComposeError::from)
}

/// Run the whole `compose` command.
///
/// # Errors
///
/// See [`build_scene`] and [`export_draft`].
pub async fn run(
    args: &ComposeArgs,
    client: &TemplateClient,
    fetcher: &dyn ImageFetcher,
    compositor: Compositor,
    out_dir: &Path,
) -> Result<PathBuf, ComposeError> {
    let draft = build_scene(args, client).await?;
    tracing::info!(
        "Composing \"{}\" with {} caption(s) and {} overlay(s)",
        draft.name,
        draft.scene.text_layers().len(),
        draft.scene.image_layers().len()
    );
    export_draft(draft, fetcher, compositor, out_dir).await
}
