//! Drag interaction for image layers.
//!
//! A single drag session exists at a time: `Idle -> Dragging -> Idle`.
//! Container bounds are captured when the drag begins and never re-queried
//! mid-gesture, which matches a fixed-size canvas.

use crate::geometry::{clamp_percent, to_normalized};
use crate::{ContainerBounds, ImagePatch, LayerId, PointerEvent, PointerPhase, Scene};

/// State captured for the gesture in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    /// Pointer that owns the gesture.
    pub pointer_id: u32,
    /// Layer being dragged.
    pub layer_id: LayerId,
    /// Pointer position when the drag began.
    pub start_pointer: (f32, f32),
    /// Normalized layer position when the drag began.
    pub start_position: (f32, f32),
    /// Container bounds captured when the drag began.
    pub bounds: ContainerBounds,
}

/// Single-pointer drag state machine.
#[derive(Debug, Clone, Default)]
pub struct DragController {
    session: Option<DragSession>,
}

impl DragController {
    /// Create an idle controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a drag is in progress.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    /// The drag in progress.
    #[must_use]
    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Start dragging `layer_id` with `pointer_id`.
    ///
    /// Rejected (returns `false`) while another drag is active, for unknown
    /// layers, or when `bounds` cannot be used for conversion. On success the
    /// layer becomes the active image.
    pub fn begin_drag(
        &mut self,
        scene: &mut Scene,
        pointer_id: u32,
        layer_id: LayerId,
        pointer: (f32, f32),
        bounds: ContainerBounds,
    ) -> bool {
        if let Some(session) = &self.session {
            tracing::debug!(
                "Drag of {} ignored: {} is already being dragged",
                layer_id,
                session.layer_id
            );
            return false;
        }
        if !bounds.is_usable() || !pointer.0.is_finite() || !pointer.1.is_finite() {
            tracing::debug!("Drag of {layer_id} ignored: unusable bounds or pointer");
            return false;
        }
        let Some(layer) = scene.image_layer(layer_id) else {
            return false;
        };
        let start_position = (layer.x, layer.y);
        if scene.set_active_image(Some(layer_id)).is_err() {
            return false;
        }

        self.session = Some(DragSession {
            pointer_id,
            layer_id,
            start_pointer: pointer,
            start_position,
            bounds,
        });
        tracing::debug!("Drag started on {layer_id} with pointer {pointer_id}");
        true
    }

    /// Move the dragged layer to follow the pointer.
    ///
    /// Ignored unless dragging with the same `pointer_id`. Both axes are
    /// clamped to `[0, 100]`. Returns `true` if the scene changed.
    pub fn on_pointer_move(
        &mut self,
        scene: &mut Scene,
        pointer_id: u32,
        pointer: (f32, f32),
    ) -> bool {
        let Some(session) = self.session else {
            return false;
        };
        if session.pointer_id != pointer_id || !pointer.0.is_finite() || !pointer.1.is_finite() {
            return false;
        }

        let dx = to_normalized(pointer.0 - session.start_pointer.0, session.bounds.width);
        let dy = to_normalized(pointer.1 - session.start_pointer.1, session.bounds.height);
        let x = clamp_percent(session.start_position.0 + dx);
        let y = clamp_percent(session.start_position.1 + dy);

        if scene
            .update_image(session.layer_id, &ImagePatch::position(x, y))
            .is_err()
        {
            tracing::debug!("Dragged layer {} vanished, ending drag", session.layer_id);
            self.session = None;
            return false;
        }
        true
    }

    /// Finish the drag owned by `pointer_id`.
    ///
    /// Returns `false` if no drag was active for this pointer.
    pub fn end_drag(&mut self, pointer_id: u32) -> bool {
        match self.session {
            Some(session) if session.pointer_id == pointer_id => {
                self.session = None;
                tracing::debug!("Drag of {} finished", session.layer_id);
                true
            }
            _ => false,
        }
    }

    /// Abort the drag after losing pointer capture.
    ///
    /// The layer keeps the last position processed; nothing is committed.
    pub fn cancel(&mut self) -> bool {
        self.session.take().is_some()
    }

    /// Route a pointer event into the state machine.
    ///
    /// `Down` only starts a drag when the event targets an image layer.
    /// Returns `true` if the scene changed.
    pub fn handle_event(
        &mut self,
        scene: &mut Scene,
        event: &PointerEvent,
        bounds: ContainerBounds,
    ) -> bool {
        let pointer = (event.x, event.y);
        match event.phase {
            PointerPhase::Down => {
                let Some(layer_id) = event.target_layer else {
                    return false;
                };
                let previous = scene.active_image_id();
                self.begin_drag(scene, event.pointer_id, layer_id, pointer, bounds)
                    && previous != Some(layer_id)
            }
            PointerPhase::Move => self.on_pointer_move(scene, event.pointer_id, pointer),
            PointerPhase::Up => {
                self.end_drag(event.pointer_id);
                false
            }
            PointerPhase::Cancel => {
                self.cancel();
                false
            }
        }
    }
}
