//! Selection state bits carried by argument objects

/// Not selected
pub const NONE: u8 = 0x0;
/// Pointer is over the element
pub const OVER: u8 = 0x1;
/// Element is being dragged
pub const DRAG: u8 = 0x2;
/// Element is being edited
pub const EDIT: u8 = 0x4;
