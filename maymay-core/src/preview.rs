//! Cheap on-screen layout of a scene.
//!
//! The preview positions layers as absolutely placed boxes over a displayed
//! copy of the base image. It is approximate (the presentation layer does the
//! actual drawing) but uses the same [`geometry`](crate::geometry) as the
//! compositor, so boxes scale exactly onto the exported image.

use serde::{Deserialize, Serialize};

use crate::geometry::{image_layer_rect, text_anchor};
use crate::{LayerId, LayerRect, Rgb, Scene};

/// Label shown in place of an empty caption; never exported.
pub const EMPTY_TEXT_LABEL: &str = "EDIT ME";

/// CSS text-shadow equivalent of the exported drop shadow.
pub const SHADOW_CSS: &str = "2px 2px 6px rgba(0,0,0,0.7)";

/// Preview placement of an image layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImagePreview {
    /// Layer shown.
    pub id: LayerId,
    /// Box in display pixels, rotated about its center.
    pub rect: LayerRect,
    /// Whether this is the active image (draw resize handles).
    pub active: bool,
}

/// Preview placement of a caption.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextPreview {
    /// Layer shown.
    pub id: LayerId,
    /// Anchor in display pixels; text is centered on it.
    pub anchor: (f32, f32),
    /// Uppercased label, or [`EMPTY_TEXT_LABEL`] for blank captions.
    pub label: String,
    /// Font size in display pixels.
    pub font_size: f32,
    /// Fill color.
    pub color: Rgb,
    /// CSS `font-weight`.
    pub weight: &'static str,
    /// CSS `text-shadow`, when enabled.
    pub shadow: Option<&'static str>,
    /// Whether this is the active caption.
    pub active: bool,
}

/// Layout of a whole scene at one display size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenePreview {
    /// Display width in pixels.
    pub width: f32,
    /// Display height in pixels.
    pub height: f32,
    /// Display pixels per natural base-image pixel.
    pub scale: f32,
    /// Image overlays in paint order.
    pub images: Vec<ImagePreview>,
    /// Captions in paint order (always above images).
    pub texts: Vec<TextPreview>,
}

impl ScenePreview {
    /// Lay out `scene` for a base image displayed at `width`×`height`
    /// whose natural width is `natural_width`.
    ///
    /// Caption sizes are natural pixels, so they shrink with the display.
    #[must_use]
    pub fn layout(scene: &Scene, width: f32, height: f32, natural_width: f32) -> Self {
        let scale = if natural_width.is_finite() && natural_width > 0.0 {
            width / natural_width
        } else {
            1.0
        };
        let active_image = scene.active_image_id();
        let active_text = scene.active_text_id();

        let images = scene
            .image_layers()
            .iter()
            .map(|layer| ImagePreview {
                id: layer.id,
                rect: image_layer_rect(layer, width, height),
                active: active_image == Some(layer.id),
            })
            .collect();

        let texts = scene
            .text_layers()
            .iter()
            .map(|layer| TextPreview {
                id: layer.id,
                anchor: text_anchor(layer, width, height),
                label: if layer.is_blank() {
                    EMPTY_TEXT_LABEL.to_string()
                } else {
                    layer.display_text()
                },
                font_size: layer.font_size * scale,
                color: layer.color,
                weight: layer.weight.as_css(),
                shadow: layer.shadow.then_some(SHADOW_CSS),
                active: active_text == Some(layer.id),
            })
            .collect();

        Self {
            width,
            height,
            scale,
            images,
            texts,
        }
    }

    /// Topmost image overlay whose rotated box contains the display point.
    #[must_use]
    pub fn image_at(&self, x: f32, y: f32) -> Option<LayerId> {
        self.images
            .iter()
            .rev()
            .find(|preview| contains_rotated(&preview.rect, x, y))
            .map(|preview| preview.id)
    }
}

fn contains_rotated(rect: &LayerRect, x: f32, y: f32) -> bool {
    // undo the rotation about the center, then test the axis-aligned box
    let (sin, cos) = (-rect.rotation.to_radians()).sin_cos();
    let (dx, dy) = (x - rect.cx, y - rect.cy);
    let local_x = dx * cos - dy * sin;
    let local_y = dx * sin + dy * cos;
    local_x.abs() <= rect.width / 2.0 && local_y.abs() <= rect.height / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImagePatch, ImageSource, TextPatch};

    #[test]
    fn test_blank_caption_shows_label() {
        let mut scene = Scene::new("base.png");
        scene.add_text();
        let preview = ScenePreview::layout(&scene, 400.0, 300.0, 800.0);
        assert_eq!(preview.texts[0].label, EMPTY_TEXT_LABEL);
        assert!(preview.texts[0].active);
    }

    #[test]
    fn test_caption_uppercased_and_anchored() {
        let mut scene = Scene::new("base.png");
        let id = scene.add_text().id;
        scene
            .update_text(
                id,
                &TextPatch {
                    content: Some("hello".into()),
                    shadow: Some(false),
                    ..TextPatch::position(25.0, 10.0)
                },
            )
            .expect("update");

        let preview = ScenePreview::layout(&scene, 400.0, 300.0, 800.0);
        let text = &preview.texts[0];
        assert_eq!(text.label, "HELLO");
        assert!((text.anchor.0 - 100.0).abs() < 1e-3);
        assert!((text.anchor.1 - 30.0).abs() < 1e-3);
        assert!(text.shadow.is_none());
    }

    #[test]
    fn test_caption_size_follows_display_scale() {
        let mut scene = Scene::new("base.png");
        let id = scene.add_text().id;
        scene
            .update_text(
                id,
                &TextPatch {
                    font_size: Some(48.0),
                    ..TextPatch::default()
                },
            )
            .expect("update");

        let half = ScenePreview::layout(&scene, 400.0, 300.0, 800.0);
        assert!((half.scale - 0.5).abs() < f32::EPSILON);
        assert!((half.texts[0].font_size - 24.0).abs() < 1e-3);

        let natural = ScenePreview::layout(&scene, 800.0, 600.0, 800.0);
        assert!((natural.texts[0].font_size - 48.0).abs() < 1e-3);

        // unknown natural size leaves sizes as they are
        let unknown = ScenePreview::layout(&scene, 400.0, 300.0, 0.0);
        assert!((unknown.texts[0].font_size - 48.0).abs() < 1e-3);
    }

    #[test]
    fn test_preview_scales_to_export() {
        let mut scene = Scene::new("base.png");
        let id = scene.add_image(ImageSource::Remote("a.png".into()), 0.8).id;
        scene
            .update_image(
                id,
                &ImagePatch {
                    x: Some(30.0),
                    y: Some(70.0),
                    rotation: Some(33.0),
                    ..ImagePatch::default()
                },
            )
            .expect("update");

        let small = ScenePreview::layout(&scene, 400.0, 300.0, 800.0);
        let full = ScenePreview::layout(&scene, 800.0, 600.0, 800.0);
        let scaled = small.images[0].rect.scaled(2.0, 2.0);
        let exact = full.images[0].rect;

        assert!((scaled.cx - exact.cx).abs() < 1e-3);
        assert!((scaled.cy - exact.cy).abs() < 1e-3);
        assert!((scaled.width - exact.width).abs() < 1e-3);
        assert!((scaled.height - exact.height).abs() < 1e-3);
        assert!((scaled.rotation - exact.rotation).abs() < f32::EPSILON);
    }

    #[test]
    fn test_image_hit_testing_prefers_topmost() {
        let mut scene = Scene::new("base.png");
        let below = scene.add_image(ImageSource::Remote("a.png".into()), 1.0).id;
        let above = scene.add_image(ImageSource::Remote("b.png".into()), 1.0).id;

        let preview = ScenePreview::layout(&scene, 100.0, 100.0, 100.0);
        assert_eq!(preview.image_at(50.0, 50.0), Some(above));
        assert_eq!(preview.image_at(1.0, 1.0), None);
        assert_ne!(preview.image_at(50.0, 50.0), Some(below));
    }
}
