//! Text and image layers - the overlays of a composition.
//!
//! Positions and sizes are normalized percentages of the canvas, so a layer
//! means the same thing at preview scale and at export resolution.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::clamp_percent;
use crate::{CanvasError, ResourceKey};

/// Smallest allowed text size in pixels.
pub const FONT_SIZE_MIN: f32 = 12.0;
/// Largest allowed text size in pixels.
pub const FONT_SIZE_MAX: f32 = 96.0;
/// Smallest allowed image width, percent of canvas width.
pub const IMAGE_WIDTH_MIN: f32 = 5.0;
/// Width given to newly added image layers.
pub const IMAGE_WIDTH_DEFAULT: f32 = 30.0;
/// Rotation limit in degrees (both directions).
pub const ROTATION_LIMIT: f32 = 180.0;

/// Unique identifier for a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(Uuid);

impl LayerId {
    /// Create a new unique layer ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque RGB color, serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// White, the default caption color.
    pub const WHITE: Self = Self::new(255, 255, 255);
    /// Black.
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// Create a color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for Rgb {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CanvasError::InvalidOperation(format!("invalid color: {s:?}"));
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            6 => Ok(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            // #rgb shorthand: each digit is doubled
            3 => {
                let r = channel(&hex[0..1])?;
                let g = channel(&hex[1..2])?;
                let b = channel(&hex[2..3])?;
                Ok(Self::new(r * 17, g * 17, b * 17))
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Rgb {
    type Error = CanvasError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_string()
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Font weight of a text layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    /// Regular weight.
    Normal,
    /// Bold weight.
    #[default]
    Bold,
}

impl FontWeight {
    /// CSS/SVG keyword for this weight.
    #[must_use]
    pub fn as_css(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Bold => "bold",
        }
    }
}

/// A caption drawn over the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLayer {
    /// Unique identifier.
    pub id: LayerId,
    /// Raw content; rendered uppercased.
    pub content: String,
    /// Horizontal center, percent of canvas width.
    pub x: f32,
    /// Vertical center, percent of canvas height.
    pub y: f32,
    /// Font size in pixels.
    pub font_size: f32,
    /// Fill color.
    pub color: Rgb,
    /// Font weight.
    pub weight: FontWeight,
    /// Whether the fixed drop shadow is applied.
    pub shadow: bool,
}

impl TextLayer {
    /// Create an empty, centered caption with default styling.
    #[must_use]
    pub fn new(id: LayerId) -> Self {
        Self {
            id,
            content: String::new(),
            x: 50.0,
            y: 50.0,
            font_size: 28.0,
            color: Rgb::WHITE,
            weight: FontWeight::Bold,
            shadow: true,
        }
    }

    /// Whether this layer produces any output in the composite.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Content as it appears in the export.
    #[must_use]
    pub fn display_text(&self) -> String {
        self.content.to_uppercase()
    }

    /// Merge a patch into this layer, clamping every value into range.
    pub fn apply(&mut self, patch: &TextPatch) {
        if let Some(content) = &patch.content {
            self.content.clone_from(content);
        }
        if let Some(x) = finite(patch.x) {
            self.x = clamp_percent(x);
        }
        if let Some(y) = finite(patch.y) {
            self.y = clamp_percent(y);
        }
        if let Some(size) = finite(patch.font_size) {
            self.font_size = size.clamp(FONT_SIZE_MIN, FONT_SIZE_MAX);
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(weight) = patch.weight {
            self.weight = weight;
        }
        if let Some(shadow) = patch.shadow {
            self.shadow = shadow;
        }
    }

    /// Clamp values that were set without going through [`apply`](Self::apply).
    pub fn normalize(&mut self) {
        let patch = TextPatch {
            x: Some(self.x),
            y: Some(self.y),
            font_size: Some(self.font_size),
            ..TextPatch::default()
        };
        self.apply(&patch);
    }
}

/// Partial update of a [`TextLayer`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextPatch {
    /// New content.
    pub content: Option<String>,
    /// New horizontal center.
    pub x: Option<f32>,
    /// New vertical center.
    pub y: Option<f32>,
    /// New font size.
    pub font_size: Option<f32>,
    /// New color.
    pub color: Option<Rgb>,
    /// New weight.
    pub weight: Option<FontWeight>,
    /// New shadow flag.
    pub shadow: Option<bool>,
}

impl TextPatch {
    /// Patch that only replaces the content.
    #[must_use]
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Patch that only moves the layer.
    #[must_use]
    pub fn position(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }
}

/// Where the pixels of an image layer come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref", rename_all = "lowercase")]
pub enum ImageSource {
    /// URL, data URI, or filesystem path.
    Remote(String),
    /// Bytes held in the scene's resource store.
    Local(ResourceKey),
}

impl ImageSource {
    /// Key under which the resolved pixels of this source are stored.
    #[must_use]
    pub fn cache_key(&self) -> String {
        match self {
            Self::Remote(url) => url.clone(),
            Self::Local(key) => key.to_string(),
        }
    }

    /// The resource key, when this source is a local upload.
    #[must_use]
    pub fn local_key(&self) -> Option<ResourceKey> {
        match self {
            Self::Remote(_) => None,
            Self::Local(key) => Some(*key),
        }
    }
}

/// An additional picture placed over the base image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLayer {
    /// Unique identifier.
    pub id: LayerId,
    /// Pixel source.
    pub source: ImageSource,
    /// Horizontal center, percent of canvas width.
    pub x: f32,
    /// Vertical center, percent of canvas height.
    pub y: f32,
    /// Width, percent of canvas width.
    pub width: f32,
    /// Height, percent of canvas height; `0` means derived from `aspect`.
    pub height: f32,
    /// Natural height / width of the source.
    pub aspect: f32,
    /// Rotation in degrees about the layer center.
    pub rotation: f32,
}

impl ImageLayer {
    /// Create a centered layer at default width with auto height.
    #[must_use]
    pub fn new(id: LayerId, source: ImageSource, aspect: f32) -> Self {
        Self {
            id,
            source,
            x: 50.0,
            y: 50.0,
            width: IMAGE_WIDTH_DEFAULT,
            height: 0.0,
            aspect: sanitize_aspect(aspect),
            rotation: 0.0,
        }
    }

    /// Whether height is derived from the aspect ratio.
    #[must_use]
    pub fn is_auto_height(&self) -> bool {
        self.height <= 0.0
    }

    /// Merge a patch into this layer, clamping every value into range.
    pub fn apply(&mut self, patch: &ImagePatch) {
        if let Some(x) = finite(patch.x) {
            self.x = clamp_percent(x);
        }
        if let Some(y) = finite(patch.y) {
            self.y = clamp_percent(y);
        }
        if let Some(width) = finite(patch.width) {
            self.width = width.clamp(IMAGE_WIDTH_MIN, 100.0);
        }
        if let Some(height) = finite(patch.height) {
            self.height = clamp_percent(height);
        }
        if let Some(rotation) = finite(patch.rotation) {
            self.rotation = rotation.clamp(-ROTATION_LIMIT, ROTATION_LIMIT);
        }
    }

    /// Clamp values that were set without going through [`apply`](Self::apply).
    pub fn normalize(&mut self) {
        self.aspect = sanitize_aspect(self.aspect);
        let patch = ImagePatch {
            x: Some(self.x),
            y: Some(self.y),
            width: Some(self.width),
            height: Some(self.height),
            rotation: Some(self.rotation),
        };
        self.apply(&patch);
    }
}

/// Partial update of an [`ImageLayer`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePatch {
    /// New horizontal center.
    pub x: Option<f32>,
    /// New vertical center.
    pub y: Option<f32>,
    /// New width.
    pub width: Option<f32>,
    /// New height (`0` switches to auto).
    pub height: Option<f32>,
    /// New rotation.
    pub rotation: Option<f32>,
}

impl ImagePatch {
    /// Patch that only moves the layer.
    #[must_use]
    pub fn position(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }
}

fn finite(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite())
}

fn sanitize_aspect(aspect: f32) -> f32 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        tracing::warn!("Invalid aspect ratio {aspect}, using 1.0");
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse_and_display() {
        let color: Rgb = "#FF8000".parse().expect("hex color");
        assert_eq!(color, Rgb::new(255, 128, 0));
        assert_eq!(color.to_string(), "#ff8000");

        let short: Rgb = "#fff".parse().expect("short hex");
        assert_eq!(short, Rgb::WHITE);

        assert!("ff8000".parse::<Rgb>().is_err());
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_color_serde() {
        let json = serde_json::to_string(&Rgb::new(1, 2, 3)).expect("serialize");
        assert_eq!(json, "\"#010203\"");
        let back: Rgb = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Rgb::new(1, 2, 3));
        assert!(serde_json::from_str::<Rgb>("\"red\"").is_err());
    }

    #[test]
    fn test_text_defaults() {
        let layer = TextLayer::new(LayerId::new());
        assert_eq!(layer.content, "");
        assert!((layer.x - 50.0).abs() < f32::EPSILON);
        assert!((layer.y - 50.0).abs() < f32::EPSILON);
        assert!(layer.is_blank());
        assert!(layer.shadow);
    }

    #[test]
    fn test_text_patch_clamps() {
        let mut layer = TextLayer::new(LayerId::new());
        layer.apply(&TextPatch {
            x: Some(140.0),
            y: Some(-3.0),
            font_size: Some(400.0),
            ..TextPatch::default()
        });
        assert!((layer.x - 100.0).abs() < f32::EPSILON);
        assert!(layer.y.abs() < f32::EPSILON);
        assert!((layer.font_size - FONT_SIZE_MAX).abs() < f32::EPSILON);

        layer.apply(&TextPatch {
            font_size: Some(1.0),
            x: Some(f32::NAN),
            ..TextPatch::default()
        });
        assert!((layer.font_size - FONT_SIZE_MIN).abs() < f32::EPSILON);
        assert!((layer.x - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_display_text_uppercases() {
        let mut layer = TextLayer::new(LayerId::new());
        layer.apply(&TextPatch::content("hello"));
        assert_eq!(layer.display_text(), "HELLO");
        layer.apply(&TextPatch::content("   "));
        assert!(layer.is_blank());
    }

    #[test]
    fn test_image_patch_clamps() {
        let mut layer = ImageLayer::new(LayerId::new(), ImageSource::Remote("a.png".into()), 0.5);
        assert!(layer.is_auto_height());

        layer.apply(&ImagePatch {
            width: Some(1.0),
            rotation: Some(270.0),
            height: Some(120.0),
            ..ImagePatch::default()
        });
        assert!((layer.width - IMAGE_WIDTH_MIN).abs() < f32::EPSILON);
        assert!((layer.rotation - ROTATION_LIMIT).abs() < f32::EPSILON);
        assert!((layer.height - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_invalid_aspect_falls_back() {
        let layer = ImageLayer::new(LayerId::new(), ImageSource::Remote("a.png".into()), 0.0);
        assert!((layer.aspect - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_source_cache_key() {
        let key = ResourceKey::new();
        assert_eq!(ImageSource::Local(key).cache_key(), key.to_string());
        assert_eq!(ImageSource::Remote("x.png".into()).cache_key(), "x.png");
        assert_eq!(ImageSource::Local(key).local_key(), Some(key));
    }
}
