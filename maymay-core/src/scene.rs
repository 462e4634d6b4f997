//! Scene model: one composition of a base template and its overlays.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::geometry::{image_layer_rect, to_normalized};
use crate::{
    CanvasError, CanvasResult, ImageLayer, ImagePatch, ImageSource, LayerId, ResourceStore,
    TextLayer, TextPatch,
};

/// A composition: base image plus ordered text and image layers.
///
/// Paint order is fixed: base, then image layers, then text layers, each in
/// insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    /// Template image reference. Empty means "no template": a placeholder canvas.
    pub base_image: String,
    /// Captions in paint order.
    text_layers: Vec<TextLayer>,
    /// Overlay images in paint order.
    image_layers: Vec<ImageLayer>,
    /// Caption targeted by style controls.
    active_text: Option<LayerId>,
    /// Image targeted by resize/rotate controls.
    active_image: Option<LayerId>,
    /// Bytes of locally uploaded images.
    #[serde(skip)]
    resources: ResourceStore,
}

impl Scene {
    /// Create an empty scene over the given template image.
    #[must_use]
    pub fn new(base_image: impl Into<String>) -> Self {
        Self {
            base_image: base_image.into(),
            ..Self::default()
        }
    }

    /// Create a scene with the classic top and bottom captions.
    #[must_use]
    pub fn with_default_captions(base_image: impl Into<String>) -> Self {
        let mut scene = Self::new(base_image);
        for (content, y) in [("TOP TEXT", 12.0), ("BOTTOM TEXT", 88.0)] {
            let id = scene.fresh_id();
            let mut layer = TextLayer::new(id);
            layer.apply(&TextPatch {
                content: Some(content.to_string()),
                y: Some(y),
                font_size: Some(36.0),
                ..TextPatch::default()
            });
            scene.text_layers.push(layer);
        }
        scene.active_text = scene.text_layers.first().map(|t| t.id);
        scene
    }

    fn fresh_id(&self) -> LayerId {
        let mut id = LayerId::new();
        while self.contains_layer(id) {
            id = LayerId::new();
        }
        id
    }

    fn contains_layer(&self, id: LayerId) -> bool {
        self.text_layers.iter().any(|t| t.id == id) || self.image_layers.iter().any(|i| i.id == id)
    }

    // -- text layers ---------------------------------------------------------

    /// Append an empty, centered caption and make it active.
    pub fn add_text(&mut self) -> &TextLayer {
        let id = self.fresh_id();
        self.text_layers.push(TextLayer::new(id));
        self.active_text = Some(id);
        tracing::debug!("Added text layer {id}");
        &self.text_layers[self.text_layers.len() - 1]
    }

    /// Merge `patch` into the caption with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::LayerNotFound`] if no caption has this id; the
    /// scene is left untouched.
    pub fn update_text(&mut self, id: LayerId, patch: &TextPatch) -> CanvasResult<()> {
        let layer = self
            .text_layers
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| CanvasError::LayerNotFound(id.to_string()))?;
        layer.apply(patch);
        Ok(())
    }

    /// Select the caption targeted by style controls.
    ///
    /// # Errors
    ///
    /// Returns an error if the caption is not found.
    pub fn set_active_text(&mut self, id: LayerId) -> CanvasResult<()> {
        if self.text_layer(id).is_none() {
            return Err(CanvasError::LayerNotFound(id.to_string()));
        }
        self.active_text = Some(id);
        Ok(())
    }

    /// Get a caption by ID.
    #[must_use]
    pub fn text_layer(&self, id: LayerId) -> Option<&TextLayer> {
        self.text_layers.iter().find(|t| t.id == id)
    }

    /// All captions in paint order.
    #[must_use]
    pub fn text_layers(&self) -> &[TextLayer] {
        &self.text_layers
    }

    /// ID of the active caption.
    #[must_use]
    pub fn active_text_id(&self) -> Option<LayerId> {
        self.active_text
    }

    /// The active caption.
    #[must_use]
    pub fn active_text(&self) -> Option<&TextLayer> {
        self.active_text.and_then(|id| self.text_layer(id))
    }

    // -- image layers --------------------------------------------------------

    /// Append an image layer (centered, 30% wide, auto height) and make it active.
    pub fn add_image(&mut self, source: ImageSource, aspect: f32) -> &ImageLayer {
        let id = self.fresh_id();
        self.image_layers.push(ImageLayer::new(id, source, aspect));
        self.active_image = Some(id);
        tracing::debug!("Added image layer {id}");
        &self.image_layers[self.image_layers.len() - 1]
    }

    /// Store uploaded bytes as a local resource and add a layer showing them.
    pub fn add_local_image(&mut self, bytes: Vec<u8>, aspect: f32) -> &ImageLayer {
        let key = self.resources.allocate(bytes);
        self.add_image(ImageSource::Local(key), aspect)
    }

    /// Merge `patch` into the image layer with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::LayerNotFound`] if no image layer has this id.
    pub fn update_image(&mut self, id: LayerId, patch: &ImagePatch) -> CanvasResult<()> {
        let layer = self
            .image_layer_mut(id)
            .ok_or_else(|| CanvasError::LayerNotFound(id.to_string()))?;
        layer.apply(patch);
        Ok(())
    }

    /// Switch an image layer between auto and fixed height.
    ///
    /// Leaving auto mode snapshots the height currently rendered on a
    /// `canvas_w`×`canvas_h` canvas; entering it discards the fixed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer is not found.
    pub fn set_auto_height(
        &mut self,
        id: LayerId,
        auto: bool,
        canvas_w: f32,
        canvas_h: f32,
    ) -> CanvasResult<()> {
        let layer = self
            .image_layer_mut(id)
            .ok_or_else(|| CanvasError::LayerNotFound(id.to_string()))?;
        if auto {
            layer.height = 0.0;
        } else if layer.is_auto_height() {
            let rendered = image_layer_rect(layer, canvas_w, canvas_h).height;
            // a zero snapshot would silently flip back to auto
            let fixed = to_normalized(rendered, canvas_h).clamp(f32::MIN_POSITIVE, 100.0);
            layer.apply(&ImagePatch {
                height: Some(fixed),
                ..ImagePatch::default()
            });
        }
        Ok(())
    }

    /// Delete an image layer, releasing its local resource if it owns one.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer is not found.
    pub fn remove_image(&mut self, id: LayerId) -> CanvasResult<ImageLayer> {
        let index = self
            .image_layers
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| CanvasError::LayerNotFound(id.to_string()))?;
        let layer = self.image_layers.remove(index);
        if let Some(key) = layer.source.local_key() {
            self.resources.release(&key);
        }
        if self.active_image == Some(id) {
            self.active_image = None;
        }
        tracing::debug!("Removed image layer {id}");
        Ok(layer)
    }

    /// Select the image targeted by resize/rotate controls, or clear it.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is given but not found.
    pub fn set_active_image(&mut self, id: Option<LayerId>) -> CanvasResult<()> {
        if let Some(id) = id {
            if self.image_layer(id).is_none() {
                return Err(CanvasError::LayerNotFound(id.to_string()));
            }
        }
        self.active_image = id;
        Ok(())
    }

    /// Get an image layer by ID.
    #[must_use]
    pub fn image_layer(&self, id: LayerId) -> Option<&ImageLayer> {
        self.image_layers.iter().find(|i| i.id == id)
    }

    fn image_layer_mut(&mut self, id: LayerId) -> Option<&mut ImageLayer> {
        self.image_layers.iter_mut().find(|i| i.id == id)
    }

    /// All image layers in paint order.
    #[must_use]
    pub fn image_layers(&self) -> &[ImageLayer] {
        &self.image_layers
    }

    /// ID of the active image layer.
    #[must_use]
    pub fn active_image_id(&self) -> Option<LayerId> {
        self.active_image
    }

    /// The active image layer.
    #[must_use]
    pub fn active_image(&self) -> Option<&ImageLayer> {
        self.active_image.and_then(|id| self.image_layer(id))
    }

    // -- resources & lifecycle ----------------------------------------------

    /// Local resources owned by this scene.
    #[must_use]
    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    /// Discard every layer and release every local resource.
    ///
    /// Returns the number of resources released.
    pub fn teardown(&mut self) -> usize {
        self.text_layers.clear();
        self.image_layers.clear();
        self.active_text = None;
        self.active_image = None;
        let released = self.resources.release_all();
        tracing::debug!("Scene torn down, {released} resources released");
        released
    }

    /// Check if the scene has no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text_layers.is_empty() && self.image_layers.is_empty()
    }

    /// Serialize the scene to JSON.
    ///
    /// Local resources are not serialized.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CanvasResult<String> {
        serde_json::to_string_pretty(self).map_err(CanvasError::Serialization)
    }

    /// Deserialize a scene from JSON.
    ///
    /// Values are clamped into the same ranges the update operations enforce
    /// and selections naming missing layers are cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or two layers share an id.
    pub fn from_json(json: &str) -> CanvasResult<Self> {
        let mut scene: Self = serde_json::from_str(json)?;
        scene.normalize()?;
        Ok(scene)
    }

    fn normalize(&mut self) -> CanvasResult<()> {
        let mut seen = HashSet::new();
        let ids = self
            .text_layers
            .iter()
            .map(|t| t.id)
            .chain(self.image_layers.iter().map(|i| i.id));
        for id in ids {
            if !seen.insert(id) {
                return Err(CanvasError::InvalidOperation(format!(
                    "duplicate layer id {id}"
                )));
            }
        }

        self.text_layers.iter_mut().for_each(TextLayer::normalize);
        self.image_layers.iter_mut().for_each(ImageLayer::normalize);

        if let Some(id) = self.active_text.filter(|id| self.text_layer(*id).is_none()) {
            tracing::debug!("Dropping selection of missing caption {id}");
            self.active_text = None;
        }
        if let Some(id) = self.active_image.filter(|id| self.image_layer(*id).is_none()) {
            tracing::debug!("Dropping selection of missing image layer {id}");
            self.active_image = None;
        }
        Ok(())
    }
}
