//! Authoritative flattening of a scene into pixels.
//!
//! Paint order is fixed: base image, image layers in insertion order, then
//! text layers in insertion order. Image layers go through tiny-skia with the
//! same [`LayerRect`](maymay_core::LayerRect) transform the preview uses; each
//! caption is written as a small SVG document and rasterized with resvg so
//! text shaping, letter spacing and the drop shadow come from one place.

use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

use maymay_core::geometry::{image_layer_rect, text_anchor};
use maymay_core::{ImageLayer, LayerId, Scene, TextLayer};
use tiny_skia::{FilterQuality, IntSize, Pixmap, PixmapPaint, Transform};
use usvg::fontdb::{Database, Family, Query};

use crate::error::{RenderError, RenderResult};
use crate::image::{create_placeholder, DecodedImage};
use crate::resolve::ResolvedImages;

/// Drop shadow applied to captions with `shadow` set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowStyle {
    /// Horizontal offset in pixels.
    pub dx: f32,
    /// Vertical offset in pixels.
    pub dy: f32,
    /// Gaussian standard deviation (half the CSS blur radius).
    pub std_deviation: f32,
    /// Opacity of the black shadow.
    pub opacity: f32,
}

impl Default for ShadowStyle {
    fn default() -> Self {
        Self {
            dx: 2.0,
            dy: 2.0,
            std_deviation: 3.0,
            opacity: 0.7,
        }
    }
}

/// Compositor settings.
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// CSS font-family stack for captions.
    pub font_family: String,
    /// Letter spacing in pixels.
    pub letter_spacing: f32,
    /// Caption drop shadow.
    pub shadow: ShadowStyle,
    /// Canvas size used when the scene has no base image.
    pub placeholder_size: (u32, u32),
    /// Load the fonts installed on the host.
    pub load_system_fonts: bool,
    /// Extra directories to load fonts from.
    pub font_dirs: Vec<PathBuf>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            font_family: "Impact, 'Arial Black', sans-serif".to_string(),
            letter_spacing: 1.0,
            shadow: ShadowStyle::default(),
            placeholder_size: (500, 400),
            load_system_fonts: true,
            font_dirs: Vec::new(),
        }
    }
}

/// One step of the paint order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintStep {
    /// The base image (or placeholder canvas).
    Base,
    /// An image layer.
    Image(LayerId),
    /// A non-blank text layer.
    Text(LayerId),
}

/// Paint order for `scene`. Blank captions are left out.
#[must_use]
pub fn paint_plan(scene: &Scene) -> Vec<PaintStep> {
    let mut plan = Vec::with_capacity(1 + scene.image_layers().len() + scene.text_layers().len());
    plan.push(PaintStep::Base);
    plan.extend(scene.image_layers().iter().map(|l| PaintStep::Image(l.id)));
    plan.extend(
        scene
            .text_layers()
            .iter()
            .filter(|l| !l.is_blank())
            .map(|l| PaintStep::Text(l.id)),
    );
    plan
}

/// A flattened composite at the base image's natural size.
#[derive(Clone)]
pub struct RenderedImage {
    pixmap: Pixmap,
}

impl std::fmt::Debug for RenderedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

impl RenderedImage {
    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Straight-alpha RGBA of one pixel.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some([c.red(), c.green(), c.blue(), c.alpha()])
    }

    /// Raw premultiplied RGBA bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Straight-alpha copy as an [`image::RgbaImage`].
    #[must_use]
    pub fn to_rgba_image(&self) -> image::RgbaImage {
        let data = self
            .pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        // buffer length always matches width * height * 4
        image::RgbaImage::from_raw(self.width(), self.height(), data)
            .unwrap_or_else(|| image::RgbaImage::new(self.width(), self.height()))
    }
}

/// Renders scenes into [`RenderedImage`]s.
pub struct Compositor {
    config: CompositorConfig,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("config", &self.config)
            .field("fonts", &self.fontdb.len())
            .finish()
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(CompositorConfig::default())
    }
}

impl Compositor {
    /// Create a compositor, loading its fonts once.
    #[must_use]
    pub fn new(config: CompositorConfig) -> Self {
        let mut fontdb = Database::new();
        if config.load_system_fonts {
            fontdb.load_system_fonts();
        }
        for dir in &config.font_dirs {
            fontdb.load_fonts_dir(dir);
        }
        tracing::debug!("Compositor loaded {} font faces", fontdb.len());
        install_generic_fallbacks(&mut fontdb);

        Self {
            config,
            fontdb: Arc::new(fontdb),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Number of font faces available to captions.
    #[must_use]
    pub fn font_faces(&self) -> usize {
        self.fontdb.len()
    }

    /// Flatten `scene` using already-resolved images.
    ///
    /// Image layers whose source did not resolve are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::BaseImageUnavailable`] if the scene names a base
    /// image that did not resolve, or [`RenderError::Surface`] if no output
    /// buffer could be allocated.
    pub fn render(&self, scene: &Scene, images: &ResolvedImages) -> RenderResult<RenderedImage> {
        let mut pixmap = self.base_pixmap(scene, images)?;
        #[allow(clippy::cast_precision_loss)]
        let (width, height) = (pixmap.width() as f32, pixmap.height() as f32);

        for step in paint_plan(scene) {
            match step {
                PaintStep::Base => {}
                PaintStep::Image(id) => {
                    if let Some(layer) = scene.image_layer(id) {
                        draw_image_layer(&mut pixmap, layer, images, width, height);
                    }
                }
                PaintStep::Text(id) => {
                    if let Some(layer) = scene.text_layer(id) {
                        self.draw_text_layer(&mut pixmap, layer, width, height);
                    }
                }
            }
        }

        Ok(RenderedImage { pixmap })
    }

    fn base_pixmap(&self, scene: &Scene, images: &ResolvedImages) -> RenderResult<Pixmap> {
        if scene.base_image.is_empty() {
            let (w, h) = self.config.placeholder_size;
            return pixmap_from_image(&create_placeholder(w, h));
        }

        let base = images.get(&scene.base_image).ok_or_else(|| {
            let reason = images
                .failure(&scene.base_image)
                .unwrap_or("not resolved");
            RenderError::BaseImageUnavailable(format!("{}: {reason}", scene.base_image))
        })?;
        pixmap_from_image(base)
    }

    fn draw_text_layer(&self, pixmap: &mut Pixmap, layer: &TextLayer, width: f32, height: f32) {
        let svg = self.text_svg(layer, width, height);

        let mut options = usvg::Options::default();
        options.fontdb = Arc::clone(&self.fontdb);

        match usvg::Tree::from_str(&svg, &options) {
            Ok(tree) => resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut()),
            Err(e) => tracing::warn!("Skipping text layer {}: {e}", layer.id),
        }
    }

    /// Standalone SVG document drawing one caption on a `width`×`height` canvas.
    #[must_use]
    pub fn text_svg(&self, layer: &TextLayer, width: f32, height: f32) -> String {
        let (x, y) = text_anchor(layer, width, height);
        let mut svg = String::with_capacity(512);

        let _ = write!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
             viewBox=\"0 0 {width} {height}\">",
        );

        let filter = if layer.shadow {
            let s = &self.config.shadow;
            let _ = write!(
                svg,
                "<defs><filter id=\"shadow\" x=\"-50%\" y=\"-50%\" width=\"200%\" \
                 height=\"200%\"><feDropShadow dx=\"{}\" dy=\"{}\" stdDeviation=\"{}\" \
                 flood-color=\"#000000\" flood-opacity=\"{}\"/></filter></defs>",
                s.dx, s.dy, s.std_deviation, s.opacity,
            );
            " filter=\"url(#shadow)\""
        } else {
            ""
        };

        let _ = write!(
            svg,
            "<text x=\"{x}\" y=\"{y}\" font-family=\"{}\" font-size=\"{}\" \
             font-weight=\"{}\" letter-spacing=\"{}\" fill=\"{}\" text-anchor=\"middle\" \
             dominant-baseline=\"central\"{filter}>{}</text>",
            escape_xml(&self.config.font_family),
            layer.font_size,
            layer.weight.as_css(),
            self.config.letter_spacing,
            layer.color,
            escape_xml(&layer.display_text()),
        );

        svg.push_str("</svg>");
        svg
    }
}

/// Point the generic `sans-serif` and `serif` families at installed faces.
///
/// fontdb maps them to fixed names ("Arial", "Times New Roman") that many
/// hosts lack, which would leave the end of the caption font stack empty.
fn install_generic_fallbacks(fontdb: &mut Database) {
    if fontdb.is_empty() {
        tracing::warn!("No font faces loaded, captions will not be drawn");
        return;
    }

    let fallback = {
        let names: BTreeSet<&str> = fontdb
            .faces()
            .flat_map(|face| face.families.iter().map(|(name, _)| name.as_str()))
            .collect();
        names
            .iter()
            .find(|name| name.contains("Sans") && !name.contains("Mono"))
            .or_else(|| names.iter().next())
            .map(|name| (*name).to_string())
    };
    let Some(fallback) = fallback else {
        return;
    };

    let resolves = |db: &Database, family: Family<'_>| {
        db.query(&Query {
            families: &[family],
            ..Query::default()
        })
        .is_some()
    };
    if !resolves(&*fontdb, Family::SansSerif) {
        tracing::debug!("Generic sans-serif now resolves to {fallback}");
        fontdb.set_sans_serif_family(fallback.clone());
    }
    if !resolves(&*fontdb, Family::Serif) {
        fontdb.set_serif_family(fallback);
    }
}

fn draw_image_layer(
    pixmap: &mut Pixmap,
    layer: &ImageLayer,
    images: &ResolvedImages,
    width: f32,
    height: f32,
) {
    let Some(source) = images.for_source(&layer.source) else {
        tracing::warn!(
            "Skipping image layer {}: {} did not resolve",
            layer.id,
            layer.source.cache_key()
        );
        return;
    };

    let rect = image_layer_rect(layer, width, height);
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return;
    }

    let src = match pixmap_from_image(source) {
        Ok(src) => src,
        Err(e) => {
            tracing::warn!("Skipping image layer {}: {e}", layer.id);
            return;
        }
    };

    #[allow(clippy::cast_precision_loss)]
    let m = rect.affine(source.width as f32, source.height as f32);
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };

    pixmap.draw_pixmap(
        0,
        0,
        src.as_ref(),
        &paint,
        Transform::from_row(m.sx, m.ky, m.kx, m.sy, m.tx, m.ty),
        None,
    );
}

/// Premultiply straight-alpha RGBA into a tiny-skia pixmap.
fn pixmap_from_image(image: &DecodedImage) -> RenderResult<Pixmap> {
    let size = IntSize::from_wh(image.width, image.height).ok_or_else(|| {
        RenderError::Surface(format!(
            "invalid buffer size {}x{}",
            image.width, image.height
        ))
    })?;

    let mut data = image.data.clone();
    for px in data.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a < 255 {
            for c in &mut px[..3] {
                // rounded c * a / 255
                let v = u16::from(*c) * a + 128;
                *c = u8::try_from((v + (v >> 8)) >> 8).unwrap_or(u8::MAX);
            }
        }
    }

    Pixmap::from_vec(data, size).ok_or_else(|| {
        RenderError::Surface(format!(
            "could not allocate {}x{} buffer",
            image.width, image.height
        ))
    })
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::create_solid_color;
    use maymay_core::{ImagePatch, ImageSource, TextPatch};

    fn compositor() -> Compositor {
        Compositor::new(CompositorConfig {
            load_system_fonts: false,
            ..CompositorConfig::default()
        })
    }

    #[test]
    fn test_paint_plan_order_skips_blank_text() {
        let mut scene = Scene::new("base.png");
        let t1 = scene.add_text().id;
        let blank = scene.add_text().id;
        let i1 = scene.add_image(ImageSource::Remote("a.png".into()), 1.0).id;
        scene.update_text(t1, &TextPatch::content("hi")).expect("update");

        let plan = paint_plan(&scene);
        assert_eq!(
            plan,
            vec![PaintStep::Base, PaintStep::Image(i1), PaintStep::Text(t1)]
        );
        assert!(!plan.contains(&PaintStep::Text(blank)));
    }

    #[test]
    fn test_empty_base_gives_placeholder() {
        let scene = Scene::new("");
        let out = compositor().render(&scene, &ResolvedImages::new()).expect("render");
        assert_eq!((out.width(), out.height()), (500, 400));
        assert_eq!(out.pixel(0, 0), Some([200, 200, 200, 255]));
    }

    #[test]
    fn test_unresolved_base_is_error() {
        let scene = Scene::new("missing.png");
        let mut images = ResolvedImages::new();
        images.insert_failure("missing.png", "HTTP 403 Forbidden");

        let err = compositor().render(&scene, &images).expect_err("no base");
        match err {
            RenderError::BaseImageUnavailable(msg) => assert!(msg.contains("403")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_image_layer_lands_on_its_rect() {
        let mut scene = Scene::new("base");
        let id = scene.add_image(ImageSource::Remote("red".into()), 1.0).id;
        scene
            .update_image(
                id,
                &ImagePatch {
                    x: Some(25.0),
                    y: Some(25.0),
                    width: Some(50.0),
                    ..ImagePatch::default()
                },
            )
            .expect("update");

        let mut images = ResolvedImages::new();
        images.insert("base", create_solid_color(100, 100, 0, 0, 255, 255));
        images.insert("red", create_solid_color(10, 10, 255, 0, 0, 255));

        let out = compositor().render(&scene, &images).expect("render");
        // layer covers 0..50 x 0..50
        assert_eq!(out.pixel(25, 25), Some([255, 0, 0, 255]));
        assert_eq!(out.pixel(75, 75), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_text_svg_contents() {
        let mut layer = TextLayer::new(LayerId::new());
        layer.content = "a <b> & c".to_string();
        layer.y = 12.0;

        let svg = compositor().text_svg(&layer, 800.0, 600.0);
        assert!(svg.contains("A &lt;B&gt; &amp; C"));
        assert!(svg.contains("x=\"400\" y=\"72\""));
        assert!(svg.contains("text-anchor=\"middle\""));
        assert!(svg.contains("dominant-baseline=\"central\""));
        assert!(svg.contains("feDropShadow"));
        assert!(svg.contains("fill=\"#ffffff\""));

        layer.shadow = false;
        let plain = compositor().text_svg(&layer, 800.0, 600.0);
        assert!(!plain.contains("filter"));
    }

    #[test]
    fn test_generic_families_resolve_to_installed_faces() {
        let compositor = Compositor::default();
        if compositor.font_faces() == 0 {
            eprintln!("no system fonts installed, skipping");
            return;
        }
        for generic in [Family::SansSerif, Family::Serif] {
            let query = Query {
                families: &[generic],
                ..Query::default()
            };
            assert!(compositor.fontdb.query(&query).is_some());
        }
    }

    #[test]
    fn test_no_fonts_is_not_fatal() {
        let compositor = compositor();
        assert_eq!(compositor.font_faces(), 0);

        let mut scene = Scene::new("");
        let id = scene.add_text().id;
        scene.update_text(id, &TextPatch::content("hi")).expect("update");
        let out = compositor.render(&scene, &ResolvedImages::new()).expect("render");
        assert_eq!((out.width(), out.height()), (500, 400));
    }

    #[test]
    fn test_premultiply() {
        let half_red = create_solid_color(1, 1, 255, 0, 0, 128);
        let pixmap = pixmap_from_image(&half_red).expect("pixmap");
        assert_eq!(&pixmap.data()[..4], &[128, 0, 0, 128]);
    }
}
