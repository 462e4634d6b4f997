//! Coordinate math shared by the preview and the compositor.
//!
//! Both renderers place layers exclusively through these functions so the
//! on-screen preview and the exported image cannot drift apart.

use serde::{Deserialize, Serialize};

use crate::{ImageLayer, TextLayer};

/// Convert a percentage of `dimension` into pixels.
#[must_use]
pub fn to_pixels(normalized: f32, dimension: f32) -> f32 {
    (normalized / 100.0) * dimension
}

/// Convert pixels into a percentage of `dimension` (`0` for an empty dimension).
#[must_use]
pub fn to_normalized(pixels: f32, dimension: f32) -> f32 {
    if dimension <= 0.0 {
        return 0.0;
    }
    pixels / dimension * 100.0
}

/// Height that preserves `aspect` (height / width) at `width_px`.
#[must_use]
pub fn auto_height(width_px: f32, aspect: f32) -> f32 {
    width_px * aspect
}

/// Top-left corner of a `w`×`h` box centered on (`cx`, `cy`).
#[must_use]
pub fn centered_bounds(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32) {
    (cx - w / 2.0, cy - h / 2.0)
}

/// Clamp a percentage into `[0, 100]`; NaN becomes `0`.
#[must_use]
pub fn clamp_percent(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// 2D affine transform in row form:
/// `x' = sx·x + kx·y + tx`, `y' = ky·x + sy·y + ty`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Affine {
    pub sx: f32,
    pub ky: f32,
    pub kx: f32,
    pub sy: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Affine {
    /// Map a point through the transform.
    #[must_use]
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.sx * x + self.kx * y + self.tx,
            self.ky * x + self.sy * y + self.ty,
        )
    }
}

/// A layer's placement in pixel space: center, size, and rotation.
///
/// `cx`/`cy` are the unrotated center; rotation is applied about it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerRect {
    /// Center X in pixels.
    pub cx: f32,
    /// Center Y in pixels.
    pub cy: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Rotation in degrees, clockwise in screen space.
    pub rotation: f32,
}

impl LayerRect {
    /// Left edge before rotation.
    #[must_use]
    pub fn left(&self) -> f32 {
        centered_bounds(self.cx, self.cy, self.width, self.height).0
    }

    /// Top edge before rotation.
    #[must_use]
    pub fn top(&self) -> f32 {
        centered_bounds(self.cx, self.cy, self.width, self.height).1
    }

    /// Uniformly scale position and size, e.g. from preview to export resolution.
    #[must_use]
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            cx: self.cx * sx,
            cy: self.cy * sy,
            width: self.width * sx,
            height: self.height * sy,
            rotation: self.rotation,
        }
    }

    /// Transform that draws a `src_w`×`src_h` image into this rect:
    /// scale to the layer size, rotate about the layer center, translate.
    #[must_use]
    pub fn affine(&self, src_w: f32, src_h: f32) -> Affine {
        let scale_x = if src_w > 0.0 { self.width / src_w } else { 0.0 };
        let scale_y = if src_h > 0.0 { self.height / src_h } else { 0.0 };
        let radians = self.rotation.to_radians();
        let (sin, cos) = radians.sin_cos();

        let sx = cos * scale_x;
        let ky = sin * scale_x;
        let kx = -sin * scale_y;
        let sy = cos * scale_y;

        let half_w = self.width * 0.5;
        let half_h = self.height * 0.5;

        Affine {
            sx,
            ky,
            kx,
            sy,
            tx: self.cx - (cos * half_w - sin * half_h),
            ty: self.cy - (sin * half_w + cos * half_h),
        }
    }

    /// Corners after rotation, clockwise from top-left.
    #[must_use]
    pub fn corners(&self) -> [(f32, f32); 4] {
        let m = self.affine(self.width, self.height);
        [
            m.apply(0.0, 0.0),
            m.apply(self.width, 0.0),
            m.apply(self.width, self.height),
            m.apply(0.0, self.height),
        ]
    }
}

/// Pixel placement of an image layer on a `canvas_w`×`canvas_h` canvas.
///
/// Height is explicit when non-zero, otherwise derived from the aspect ratio.
#[must_use]
pub fn image_layer_rect(layer: &ImageLayer, canvas_w: f32, canvas_h: f32) -> LayerRect {
    let width = to_pixels(layer.width, canvas_w);
    let height = if layer.is_auto_height() {
        auto_height(width, layer.aspect)
    } else {
        to_pixels(layer.height, canvas_h)
    };
    LayerRect {
        cx: to_pixels(layer.x, canvas_w),
        cy: to_pixels(layer.y, canvas_h),
        width,
        height,
        rotation: layer.rotation,
    }
}

/// Pixel anchor (center point) of a text layer.
#[must_use]
pub fn text_anchor(layer: &TextLayer, canvas_w: f32, canvas_h: f32) -> (f32, f32) {
    (to_pixels(layer.x, canvas_w), to_pixels(layer.y, canvas_h))
}
