//! # MayMay Canvas Core
//!
//! The in-memory model of a meme composition and everything that manipulates
//! it without touching pixels or the network.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                maymay-core                  │
//! ├─────────────────────────────────────────────┤
//! │  Scene Model     │  Interaction             │
//! │  - Text layers   │  - Pointer events        │
//! │  - Image layers  │  - Drag sessions         │
//! │  - Resources     │  - Editor state          │
//! ├─────────────────────────────────────────────┤
//! │  Geometry        │  Preview                 │
//! │  - % <-> pixels  │  - On-screen layout      │
//! │  - Layer affine  │  - Same math as export   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Pixel rendering lives in `maymay-renderer`; it consumes a [`Scene`] and
//! the same [`geometry`] functions the preview uses.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod editor;
pub mod error;
pub mod event;
pub mod geometry;
pub mod interaction;
pub mod layer;
pub mod preview;
pub mod resource;
pub mod scene;
pub mod template;

pub use editor::EditorState;
pub use error::{CanvasError, CanvasResult};
pub use event::{ContainerBounds, PointerEvent, PointerPhase};
pub use geometry::{Affine, LayerRect};
pub use interaction::{DragController, DragSession};
pub use layer::{
    FontWeight, ImageLayer, ImagePatch, ImageSource, LayerId, Rgb, TextLayer, TextPatch,
};
pub use preview::{ImagePreview, ScenePreview, TextPreview};
pub use resource::{ResourceKey, ResourceStore};
pub use scene::Scene;
pub use template::Template;

/// Canvas core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
