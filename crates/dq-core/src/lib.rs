//! Deferred 2D Drawing Command Queue
//!
//! This crate provides:
//! - Argument objects with literal, referenced (`@id.property`) and computed fields
//! - Lazy point views over flat, paired and object point encodings
//! - Capability composition giving command kinds geometry and interaction behavior
//! - The command queue builder (scopes, truncation, instancing, injection)
//! - The handler contract and the recursive execution dispatcher

pub mod args;
pub mod capability;
pub mod dispatch;
pub mod error;
pub mod kinds;
pub mod points;
pub mod queue;
pub mod registry;
pub mod state;
pub mod style;
pub mod value;

// Re-exports for convenience
pub use args::{ArgObject, Args, Computed, Field, Reference};
pub use capability::{
    Accessor, Anchor, Behavior, Capability, DragDelta, Draggable, DrawContext, Hittable, Locator,
    Outline, ParametricPath, Producer,
};
pub use dispatch::{Applied, Handler};
pub use error::{DrawError, DrawResult};
pub use points::{IndexedPoints, RawPoints, SharedPoints, point_view};
pub use queue::{Command, GroupRef, Queue, View};
pub use registry::{HandlerFactory, Registry, Symbol};
pub use style::{Style, StyleKey};
pub use value::{Value, ValueMap};
