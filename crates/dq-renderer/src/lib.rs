//! Drawqueue Renderer
//!
//! Canvas-style execution backend for drawqueue command queues.
//!
//! # Architecture
//!
//! - [`surface::Surface`] - Trait for a canvas-like drawing backend
//! - [`handler::RenderHandler`] - Style/transform state-stack machine that
//!   implements the drawing commands on top of a surface
//! - [`image::ImageCache`] - URI-keyed memo of in-flight and finished image
//!   loads, with placeholder fallback
//! - [`config::RendererConfig`] - Base style, base transform and grid settings
//!
//! # Module Structure
//!
//! ```text
//! dq-renderer/
//! ├── config.rs     # RON-loadable configuration
//! ├── surface.rs    # Surface trait
//! ├── image.rs      # Image loading and memoization
//! └── handler.rs    # RenderHandler
//! ```

pub mod config;
pub mod handler;
pub mod image;
pub mod surface;

// Re-exports for convenience
pub use config::{GridConfig, RendererConfig, StyleConfig};
pub use handler::RenderHandler;
pub use image::{Image, ImageCache, ImageLoader, PLACEHOLDER_IMAGE_URI};
pub use surface::Surface;
