//! Integration tests for compositing and export (maymay-renderer).
//!
//! Scenes are built with maymay-core, resolved from in-memory images, and
//! checked pixel by pixel. Caption rasterization uses the host's fonts and
//! is skipped on hosts that have none.

use maymay_core::geometry::{image_layer_rect, text_anchor};
use maymay_core::{ImagePatch, ImageSource, LayerId, Scene, ScenePreview, TextPatch};
use maymay_renderer::image::create_solid_color;
use maymay_renderer::{
    paint_plan, Compositor, CompositorConfig, DirectorySink, PaintStep, RenderError,
    ResolvedImages, SceneExporter,
};

const BLUE: [u8; 4] = [0, 0, 255, 255];
const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const GREY: [u8; 4] = [128, 128, 128, 255];

fn compositor() -> Compositor {
    Compositor::new(CompositorConfig {
        load_system_fonts: false,
        ..CompositorConfig::default()
    })
}

fn solid(width: u32, height: u32, rgba: [u8; 4]) -> maymay_renderer::DecodedImage {
    create_solid_color(width, height, rgba[0], rgba[1], rgba[2], rgba[3])
}

fn place(scene: &mut Scene, id: LayerId, patch: ImagePatch) {
    scene.update_image(id, &patch).expect("update image");
}

// ==========================================================================
// Paint order
// ==========================================================================

#[test]
fn test_later_images_paint_over_earlier_ones() {
    let mut scene = Scene::new("base");
    let below = scene.add_image(ImageSource::Remote("red".into()), 1.0).id;
    let above = scene.add_image(ImageSource::Remote("green".into()), 1.0).id;
    place(&mut scene, below, ImagePatch { width: Some(60.0), ..ImagePatch::default() });
    place(&mut scene, above, ImagePatch { width: Some(20.0), ..ImagePatch::default() });

    let mut images = ResolvedImages::new();
    images.insert("base", solid(100, 100, BLUE));
    images.insert("red", solid(4, 4, RED));
    images.insert("green", solid(4, 4, GREEN));

    let out = compositor().render(&scene, &images).expect("render");
    assert_eq!(out.pixel(50, 50), Some(GREEN));
    assert_eq!(out.pixel(30, 50), Some(RED));
    assert_eq!(out.pixel(5, 5), Some(BLUE));
}

#[test]
fn test_text_always_follows_images_in_plan() {
    let mut scene = Scene::with_default_captions("base");
    let first_image = scene.add_image(ImageSource::Remote("a".into()), 1.0).id;
    let extra_text = scene.add_text().id;
    scene
        .update_text(extra_text, &TextPatch::content("later caption"))
        .expect("update");
    let last_image = scene.add_image(ImageSource::Remote("b".into()), 1.0).id;

    let plan = paint_plan(&scene);
    assert_eq!(plan[0], PaintStep::Base);
    assert_eq!(plan[1], PaintStep::Image(first_image));
    assert_eq!(plan[2], PaintStep::Image(last_image));
    assert!(plan[3..].iter().all(|s| matches!(s, PaintStep::Text(_))));
    assert_eq!(plan.last(), Some(&PaintStep::Text(extra_text)));
}

// ==========================================================================
// Geometry on the output buffer
// ==========================================================================

#[test]
fn test_auto_height_preserves_aspect() {
    let mut scene = Scene::new("base");
    scene.add_image(ImageSource::Remote("wide".into()), 0.5);

    let mut images = ResolvedImages::new();
    images.insert("base", solid(800, 600, BLUE));
    images.insert("wide", solid(20, 10, RED));

    let out = compositor().render(&scene, &images).expect("render");
    assert_eq!((out.width(), out.height()), (800, 600));
    // 240x120 box centred on (400, 300)
    assert_eq!(out.pixel(400 + 115, 300), Some(RED));
    assert_eq!(out.pixel(400, 300 + 55), Some(RED));
    assert_eq!(out.pixel(400, 300 + 65), Some(BLUE));
    assert_eq!(out.pixel(400 + 125, 300), Some(BLUE));
}

#[test]
fn test_rotation_turns_the_footprint() {
    let mut scene = Scene::new("base");
    let id = scene.add_image(ImageSource::Remote("bar".into()), 1.0).id;
    place(
        &mut scene,
        id,
        ImagePatch {
            width: Some(60.0),
            height: Some(20.0),
            rotation: Some(90.0),
            ..ImagePatch::default()
        },
    );

    let mut images = ResolvedImages::new();
    images.insert("base", solid(100, 100, BLUE));
    images.insert("bar", solid(6, 2, RED));

    let out = compositor().render(&scene, &images).expect("render");
    assert_eq!(out.pixel(50, 25), Some(RED));
    assert_eq!(out.pixel(50, 75), Some(RED));
    assert_eq!(out.pixel(25, 50), Some(BLUE));
    assert_eq!(out.pixel(75, 50), Some(BLUE));
}

#[test]
fn test_preview_boxes_match_the_export() {
    let mut scene = Scene::new("base");
    let text = scene.add_text().id;
    let text_patch = TextPatch {
        content: Some("caption".into()),
        font_size: Some(40.0),
        ..TextPatch::position(30.0, 20.0)
    };
    scene.update_text(text, &text_patch).expect("update text");
    let id = scene.add_image(ImageSource::Remote("red".into()), 0.75).id;
    place(
        &mut scene,
        id,
        ImagePatch {
            x: Some(30.0),
            y: Some(60.0),
            width: Some(20.0),
            ..ImagePatch::default()
        },
    );

    let preview = ScenePreview::layout(&scene, 400.0, 300.0, 800.0);
    let scaled = preview.images[0].rect.scaled(2.0, 2.0);
    let layer = scene.image_layer(id).expect("layer");
    let exact = image_layer_rect(layer, 800.0, 600.0);
    assert!((scaled.left() - exact.left()).abs() < 1e-3);
    assert!((scaled.top() - exact.top()).abs() < 1e-3);
    assert!((scaled.width - exact.width).abs() < 1e-3);
    assert!((scaled.height - exact.height).abs() < 1e-3);

    let label = scene.text_layer(text).expect("caption");
    let (ax, ay) = text_anchor(label, 800.0, 600.0);
    let shown = &preview.texts[0];
    assert!((shown.anchor.0 * 2.0 - ax).abs() < 1e-3);
    assert!((shown.anchor.1 * 2.0 - ay).abs() < 1e-3);
    assert!((shown.font_size * 2.0 - label.font_size).abs() < 1e-3);

    let mut images = ResolvedImages::new();
    images.insert("base", solid(800, 600, BLUE));
    images.insert("red", solid(8, 6, RED));
    let out = compositor().render(&scene, &images).expect("render");

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (cx, cy) = (scaled.cx as u32, scaled.cy as u32);
    assert_eq!(out.pixel(cx, cy), Some(RED));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let outside = (scaled.left() - 4.0) as u32;
    assert_eq!(out.pixel(outside, cy), Some(BLUE));
}

// ==========================================================================
// Captions on the output buffer
// ==========================================================================

/// Compositor with the host's fonts, or `None` when the host has none.
fn text_compositor() -> Option<Compositor> {
    let compositor = Compositor::default();
    if compositor.font_faces() == 0 {
        eprintln!("no system fonts installed, skipping caption raster test");
        return None;
    }
    Some(compositor)
}

fn caption(scene: &mut Scene, content: &str, y: f32, shadow: bool) -> LayerId {
    let id = scene.add_text().id;
    let patch = TextPatch {
        content: Some(content.to_string()),
        y: Some(y),
        font_size: Some(60.0),
        shadow: Some(shadow),
        ..TextPatch::default()
    };
    scene.update_text(id, &patch).expect("update text");
    id
}

fn matching(
    out: &maymay_renderer::RenderedImage,
    keep: impl Fn([u8; 4]) -> bool,
) -> Vec<(u32, u32)> {
    let mut hits = Vec::new();
    for y in 0..out.height() {
        for x in 0..out.width() {
            if out.pixel(x, y).is_some_and(&keep) {
                hits.push((x, y));
            }
        }
    }
    hits
}

#[allow(clippy::cast_precision_loss)]
fn centroid(points: &[(u32, u32)]) -> (f32, f32) {
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x as f32, ay + y as f32));
    (sx / n, sy / n)
}

#[test]
fn test_caption_is_centred_on_its_anchor() {
    let Some(compositor) = text_compositor() else {
        return;
    };
    let mut scene = Scene::new("base");
    caption(&mut scene, "hello world", 12.0, false);

    let mut images = ResolvedImages::new();
    images.insert("base", solid(800, 600, [0, 0, 0, 255]));
    let out = compositor.render(&scene, &images).expect("render");

    let lit = matching(&out, |p| p[0] > 128);
    assert!(!lit.is_empty(), "caption drew no pixels");

    let min_x = lit.iter().map(|p| p.0).min().unwrap_or_default();
    let max_x = lit.iter().map(|p| p.0).max().unwrap_or_default();
    let min_y = lit.iter().map(|p| p.1).min().unwrap_or_default();
    let max_y = lit.iter().map(|p| p.1).max().unwrap_or_default();
    let centre = ((min_x + max_x) / 2, (min_y + max_y) / 2);

    // anchor is (400, 72) on 800x600
    assert!(centre.0.abs_diff(400) <= 12, "horizontal centre {centre:?}");
    assert!(centre.1.abs_diff(72) <= 12, "vertical centre {centre:?}");
}

#[test]
fn test_caption_paints_over_image_layers() {
    let Some(compositor) = text_compositor() else {
        return;
    };
    let mut scene = Scene::new("base");
    let id = scene.add_image(ImageSource::Remote("red".into()), 1.0).id;
    place(&mut scene, id, ImagePatch { width: Some(100.0), ..ImagePatch::default() });
    caption(&mut scene, "over", 50.0, false);

    let mut images = ResolvedImages::new();
    images.insert("base", solid(400, 300, BLUE));
    images.insert("red", solid(4, 4, RED));
    let out = compositor.render(&scene, &images).expect("render");

    assert_eq!(out.pixel(5, 5), Some(RED));
    let white = matching(&out, |p| p[0] > 200 && p[1] > 200 && p[2] > 200);
    assert!(!white.is_empty(), "caption hidden under the image layer");
}

#[test]
fn test_caption_shadow_falls_down_and_right() {
    let Some(compositor) = text_compositor() else {
        return;
    };
    let mut images = ResolvedImages::new();
    images.insert("base", solid(400, 200, GREY));

    let mut plain = Scene::new("base");
    caption(&mut plain, "shadow", 50.0, false);
    let out = compositor.render(&plain, &images).expect("render");
    assert!(matching(&out, |p| p[0] < 100).is_empty());

    let mut shaded = Scene::new("base");
    caption(&mut shaded, "shadow", 50.0, true);
    let out = compositor.render(&shaded, &images).expect("render");

    let lit = matching(&out, |p| p[0] > 200);
    let dark = matching(&out, |p| p[0] < 100);
    assert!(!lit.is_empty());
    assert!(!dark.is_empty(), "shadow did not darken the base");

    let (lit_x, lit_y) = centroid(&lit);
    let (dark_x, dark_y) = centroid(&dark);
    assert!(dark_x > lit_x, "shadow x {dark_x} vs text {lit_x}");
    assert!(dark_y > lit_y, "shadow y {dark_y} vs text {lit_y}");
}

// ==========================================================================
// Failure handling
// ==========================================================================

#[test]
fn test_unresolved_layer_is_skipped() {
    let mut scene = Scene::new("base");
    let first = scene.add_image(ImageSource::Remote("red".into()), 1.0).id;
    let second = scene.add_image(ImageSource::Remote("cors-blocked".into()), 1.0).id;
    place(&mut scene, first, ImagePatch { width: Some(20.0), ..ImagePatch::position(20.0, 50.0) });
    place(&mut scene, second, ImagePatch { width: Some(20.0), ..ImagePatch::position(80.0, 50.0) });

    let mut images = ResolvedImages::new();
    images.insert("base", solid(100, 100, BLUE));
    images.insert("red", solid(2, 2, RED));
    images.insert_failure("cors-blocked", "HTTP 403 Forbidden");

    let out = compositor().render(&scene, &images).expect("partial failure still renders");
    assert_eq!(out.pixel(20, 50), Some(RED));
    assert_eq!(out.pixel(80, 50), Some(BLUE));
}

#[test]
fn test_render_is_deterministic() {
    let mut scene = Scene::with_default_captions("base");
    let id = scene.add_image(ImageSource::Remote("red".into()), 1.0).id;
    place(&mut scene, id, ImagePatch { rotation: Some(33.0), ..ImagePatch::default() });

    let mut images = ResolvedImages::new();
    images.insert("base", solid(120, 90, BLUE));
    images.insert("red", solid(7, 5, RED));

    let compositor = compositor();
    let first = compositor.render(&scene, &images).expect("render");
    let second = compositor.render(&scene, &images).expect("render");
    assert_eq!(first.data(), second.data());
}

// ==========================================================================
// Export
// ==========================================================================

#[test]
fn test_export_writes_one_complete_png() {
    let dir = tempfile::tempdir().expect("tempdir");
    let exporter = SceneExporter::new(compositor(), DirectorySink::new(dir.path()));

    let mut scene = Scene::new("base");
    scene.add_image(ImageSource::Remote("red".into()), 1.0);
    let mut images = ResolvedImages::new();
    images.insert("base", solid(64, 48, BLUE));
    images.insert("red", solid(2, 2, RED));

    let path = exporter
        .export(&scene, &images, "Two Buttons")
        .expect("export");
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("maymay-Two_Buttons.png"));

    let decoded = image::open(&path).expect("decode export").to_rgba8();
    assert_eq!(decoded.dimensions(), (64, 48));
    assert_eq!(decoded.get_pixel(32, 24).0, RED);
    assert_eq!(decoded.get_pixel(1, 1).0, BLUE);

    let entries = std::fs::read_dir(dir.path()).expect("read dir").count();
    assert_eq!(entries, 1);
}

#[test]
fn test_export_without_base_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let exporter = SceneExporter::new(compositor(), DirectorySink::new(dir.path()));

    let mut images = ResolvedImages::new();
    images.insert_failure("https://example.com/meme.jpg", "HTTP 403 Forbidden");

    let err = exporter
        .export(&Scene::new("https://example.com/meme.jpg"), &images, "meme")
        .expect_err("base unavailable");
    assert!(matches!(err, RenderError::BaseImageUnavailable(_)));
    assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
}
