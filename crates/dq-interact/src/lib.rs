//! Drawqueue Interaction
//!
//! Pointer-driven selection and the shared frame loop for drawqueue
//! surfaces.
//!
//! # Architecture
//!
//! - [`interactor::Interactor`] - Per-surface pointer event record, view and
//!   observable signals
//! - [`selector::Selector`] - Handler that hit-tests a queue and drives the
//!   `NONE / OVER / DRAG` state of its elements
//! - [`scheduler::Scheduler`] - Ticks every registered interactor once per
//!   animation frame and estimates the frame rate
//!
//! # Module Structure
//!
//! ```text
//! dq-interact/
//! ├── config.rs      # RON-loadable interactor settings
//! ├── state.rs       # Selection state bits
//! ├── interactor.rs  # Pointer events and signals
//! ├── selector.rs    # Selection handler
//! └── scheduler.rs   # Frame loop
//! ```

pub mod config;
pub mod interactor;
pub mod scheduler;
pub mod selector;
pub mod state;

// Re-exports for convenience
pub use config::InteractorConfig;
pub use interactor::{
    Interactor, ListenerId, PointerEvent, PointerInput, PointerKind, SharedEvent, Signal, Tick,
    Topic,
};
pub use scheduler::{Scheduler, SharedInteractor};
pub use selector::Selector;
