//! Selection state bits
//!
//! `OVER` and `DRAG` form the selection state machine. `EDIT` is an
//! orthogonal bit the selector never touches.

pub use dq_core::state::{DRAG, EDIT, NONE, OVER};

/// Pointer is over the element
pub fn is_over(state: u8) -> bool {
    state & OVER != 0
}

/// Element is being dragged
pub fn is_drag(state: u8) -> bool {
    state & DRAG != 0
}

/// Element is being edited
pub fn is_edit(state: u8) -> bool {
    state & EDIT != 0
}

/// Readable name of a state combination
pub fn describe(state: u8) -> &'static str {
    match state & (OVER | DRAG | EDIT) {
        NONE => "NONE",
        OVER => "OVER",
        DRAG => "DRAG",
        s if s == OVER | DRAG => "OVER+DRAG",
        EDIT => "EDIT",
        s if s == OVER | EDIT => "OVER+EDIT",
        _ => "MIXED",
    }
}
