//! # MayMay Renderer
//!
//! Turns a [`maymay_core::Scene`] into a finished raster image.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌────────────┐   ┌─────────────┐
//! │ resolve      │──▶│ compositor     │──▶│ encode_png │──▶│ ExportSink  │
//! │ fetch+decode │   │ tiny-skia/resvg│   │ (image)    │   │ (directory) │
//! └──────────────┘   └────────────────┘   └────────────┘   └─────────────┘
//! ```
//!
//! Resolution is the only asynchronous step. Everything after it is a pure
//! function of the scene and the resolved pixels.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod compositor;
pub mod error;
pub mod export;
pub mod image;
pub mod resolve;

pub use compositor::{
    paint_plan, Compositor, CompositorConfig, PaintStep, RenderedImage, ShadowStyle,
};
pub use error::{RenderError, RenderResult};
pub use export::{encode_png, export_filename, DirectorySink, ExportSink, SceneExporter};
pub use self::image::{DecodedImage, ImageFormat};
pub use resolve::{
    resolve_scene, HttpFetcher, ImageFetcher, ResolvedImages, SessionGuard, SessionTicket,
};
