//! Pointer input for canvas interaction.

use serde::{Deserialize, Serialize};

use crate::LayerId;

/// Phase of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    /// Button pressed / finger down.
    Down,
    /// Pointer moved.
    Move,
    /// Button released / finger up.
    Up,
    /// Pointer capture lost (surface removed, gesture stolen, ...).
    Cancel,
}

/// A single pointer event in client (page) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Phase of this event.
    pub phase: PointerPhase,
    /// Pointer identifier, stable for one press-move-release sequence.
    pub pointer_id: u32,
    /// X position in pixels.
    pub x: f32,
    /// Y position in pixels.
    pub y: f32,
    /// Layer under the pointer, if any.
    pub target_layer: Option<LayerId>,
}

impl PointerEvent {
    /// Create a pointer event without a target layer.
    #[must_use]
    pub fn new(phase: PointerPhase, pointer_id: u32, x: f32, y: f32) -> Self {
        Self {
            phase,
            pointer_id,
            x,
            y,
            target_layer: None,
        }
    }

    /// Set the layer under the pointer.
    #[must_use]
    pub fn on_layer(mut self, layer: LayerId) -> Self {
        self.target_layer = Some(layer);
        self
    }
}

/// Pixel bounding box of the canvas container, in the same coordinate
/// space as [`PointerEvent`] positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerBounds {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl ContainerBounds {
    /// Create bounds anchored at the origin.
    #[must_use]
    pub fn sized(width: f32, height: f32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width,
            height,
        }
    }

    /// Whether the bounds can be used to convert pixel deltas.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}
