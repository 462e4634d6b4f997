//! Editor state: the scene plus the interaction that mutates it.

use crate::{
    CanvasResult, ContainerBounds, DragController, ImagePatch, ImageSource, LayerId,
    PointerEvent, Scene, TextPatch,
};

/// The complete editing state behind one canvas.
///
/// Presentation layers poll [`EditorState::revision`] to learn when their
/// preview is stale; the compositor only ever sees the [`Scene`].
#[derive(Debug, Clone)]
pub struct EditorState {
    scene: Scene,
    drag: DragController,
    bounds: ContainerBounds,
    revision: u64,
}

impl EditorState {
    /// Create editor state for a scene shown in a container of `bounds`.
    #[must_use]
    pub fn new(scene: Scene, bounds: ContainerBounds) -> Self {
        Self {
            scene,
            drag: DragController::new(),
            bounds,
            revision: 0,
        }
    }

    /// The scene being edited.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The drag state machine.
    #[must_use]
    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    /// Counter bumped on every effective scene mutation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Update the container bounds used for future drags.
    pub fn set_bounds(&mut self, bounds: ContainerBounds) {
        self.bounds = bounds;
    }

    fn touch(&mut self, changed: bool) -> bool {
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Process a pointer event. Returns `true` if the scene changed.
    pub fn process_event(&mut self, event: &PointerEvent) -> bool {
        let changed = self.drag.handle_event(&mut self.scene, event, self.bounds);
        self.touch(changed)
    }

    /// Replace the scene (e.g. a new template was picked).
    ///
    /// Cancels any drag and tears down the old scene, releasing its
    /// resources. Returns the number of resources released.
    pub fn replace_scene(&mut self, scene: Scene) -> usize {
        self.drag.cancel();
        let mut old = std::mem::replace(&mut self.scene, scene);
        self.touch(true);
        old.teardown()
    }

    // -- text --------------------------------------------------------------

    /// Add an empty caption and select it.
    pub fn add_text(&mut self) -> LayerId {
        let id = self.scene.add_text().id;
        self.touch(true);
        id
    }

    /// Select a caption.
    ///
    /// # Errors
    ///
    /// Returns an error if the caption is not found.
    pub fn select_text(&mut self, id: LayerId) -> CanvasResult<()> {
        self.scene.set_active_text(id)?;
        self.touch(true);
        Ok(())
    }

    /// Apply a style/content patch to the active caption.
    pub fn update_active_text(&mut self, patch: &TextPatch) -> bool {
        let Some(id) = self.scene.active_text_id() else {
            return false;
        };
        let changed = self.scene.update_text(id, patch).is_ok();
        self.touch(changed)
    }

    /// Replace the active caption's content.
    pub fn set_active_text_content(&mut self, content: &str) -> bool {
        self.update_active_text(&TextPatch::content(content))
    }

    // -- images ------------------------------------------------------------

    /// Add an image overlay from a remote source and select it.
    pub fn add_image(&mut self, source: ImageSource, aspect: f32) -> LayerId {
        let id = self.scene.add_image(source, aspect).id;
        self.touch(true);
        id
    }

    /// Add an uploaded image overlay and select it.
    pub fn add_local_image(&mut self, bytes: Vec<u8>, aspect: f32) -> LayerId {
        let id = self.scene.add_local_image(bytes, aspect).id;
        self.touch(true);
        id
    }

    /// Select an image overlay, or clear the selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer is not found.
    pub fn select_image(&mut self, id: Option<LayerId>) -> CanvasResult<()> {
        self.scene.set_active_image(id)?;
        self.touch(true);
        Ok(())
    }

    fn patch_active_image(&mut self, patch: &ImagePatch) -> bool {
        let Some(id) = self.scene.active_image_id() else {
            tracing::debug!("No active image, control ignored");
            return false;
        };
        let changed = self.scene.update_image(id, patch).is_ok();
        self.touch(changed)
    }

    /// Set the active image's width (percent of canvas width).
    pub fn resize_active_image(&mut self, width: f32) -> bool {
        self.patch_active_image(&ImagePatch {
            width: Some(width),
            ..ImagePatch::default()
        })
    }

    /// Set the active image's fixed height (percent of canvas height).
    pub fn set_active_image_height(&mut self, height: f32) -> bool {
        self.patch_active_image(&ImagePatch {
            height: Some(height),
            ..ImagePatch::default()
        })
    }

    /// Set the active image's rotation in degrees.
    pub fn rotate_active_image(&mut self, degrees: f32) -> bool {
        self.patch_active_image(&ImagePatch {
            rotation: Some(degrees),
            ..ImagePatch::default()
        })
    }

    /// Flip the active image between auto and fixed height, snapshotting the
    /// height rendered on a `canvas_w`×`canvas_h` canvas.
    pub fn toggle_active_auto_height(&mut self, canvas_w: f32, canvas_h: f32) -> bool {
        let Some(layer) = self.scene.active_image() else {
            return false;
        };
        let (id, auto) = (layer.id, !layer.is_auto_height());
        let changed = self
            .scene
            .set_auto_height(id, auto, canvas_w, canvas_h)
            .is_ok();
        self.touch(changed)
    }

    /// Delete the active image overlay.
    pub fn remove_active_image(&mut self) -> bool {
        let Some(id) = self.scene.active_image_id() else {
            return false;
        };
        if self.drag.session().is_some_and(|s| s.layer_id == id) {
            self.drag.cancel();
        }
        let changed = self.scene.remove_image(id).is_ok();
        self.touch(changed)
    }
}
