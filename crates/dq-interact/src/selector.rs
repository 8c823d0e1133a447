//! Selection handler
//!
//! The [`Selector`] is a [`Handler`] that hit-tests a queue instead of
//! drawing it. It scans the command list from the end, so the topmost
//! element wins, and keeps one current selection. Per element the state
//! moves `NONE -> OVER -> OVER|DRAG -> NONE`, driven by the shared
//! [`PointerEvent`](crate::interactor::PointerEvent).

use async_trait::async_trait;
use dq_core::{Applied, Args, Command, DrawResult, Handler};
use tracing::trace;

use crate::interactor::SharedEvent;
use crate::state::{DRAG, NONE, OVER};

/// Hit-testing handler with a single current selection
#[derive(Debug)]
pub struct Selector {
    evt: SharedEvent,
    selection: Option<Args>,
}

impl Selector {
    /// Selector reading pointer state from `evt`
    pub fn new(evt: SharedEvent) -> Self {
        Self {
            evt,
            selection: None,
        }
    }

    /// The shared event record
    pub fn event(&self) -> &SharedEvent {
        &self.evt
    }

    /// Element currently OVER or DRAG
    pub fn selection(&self) -> Option<&Args> {
        self.selection.as_ref()
    }

    fn is_selectable(elm: &Args) -> bool {
        elm.flag("draggable") && elm.is_hittable()
    }

    /// Advance `elm`'s state against the current pointer. Returns true when
    /// the element ends up selected.
    pub fn hit(&mut self, elm: &Args) -> bool {
        let (inside, pos, eps, btn) = {
            let e = self.evt.read();
            (e.inside, e.usr(), e.eps, e.btn)
        };
        if !inside || !Self::is_selectable(elm) {
            return false;
        }

        let state = elm.state();
        if state & (OVER | DRAG) == NONE {
            if elm.hit(pos, eps) && !self.is_dragging() {
                self.over_begin(elm);
            }
        } else if state & DRAG != 0 {
            if btn == 0 {
                self.drag_end(elm);
            }
        } else if !elm.hit(pos, eps) {
            self.over_end(elm);
        } else if btn != 0 {
            self.drag_begin(elm);
        }
        elm.state() & (OVER | DRAG) != NONE
    }

    fn is_dragging(&self) -> bool {
        self.selection
            .as_ref()
            .is_some_and(|s| s.state() & DRAG != 0)
    }

    fn over_begin(&mut self, elm: &Args) {
        if let Some(prev) = self.selection.take() {
            prev.set_state(prev.state() & !OVER);
        }
        elm.set_state(elm.state() | OVER);
        self.selection = Some(elm.clone());
        self.evt.write().hit = true;
        trace!(id = ?elm.id(), "over");
    }

    fn over_end(&mut self, elm: &Args) {
        elm.set_state(elm.state() & !OVER);
        self.evt.write().hit = false;
        self.selection = None;
        trace!(id = ?elm.id(), "over ended");
    }

    fn drag_begin(&mut self, elm: &Args) {
        elm.set_state(elm.state() | DRAG);
        if let Some(draggable) = elm.behavior().and_then(|b| b.draggable().cloned()) {
            draggable.drag_begin(elm);
        }
        trace!(id = ?elm.id(), "drag");
    }

    fn drag_end(&mut self, elm: &Args) {
        elm.set_state(elm.state() & !(OVER | DRAG));
        self.evt.write().hit = false;
        self.selection = None;
        if let Some(draggable) = elm.behavior().and_then(|b| b.draggable().cloned()) {
            draggable.drag_end(elm);
        }
        trace!(id = ?elm.id(), "drag ended");
    }

    /// Move the selection by the current drag step. Returns false when
    /// nothing is being dragged.
    pub fn drag_selection(&self) -> bool {
        match &self.selection {
            Some(selection) if selection.state() & DRAG != 0 => {
                let delta = self.evt.read().drag_delta();
                selection.drag(&delta)
            }
            _ => false,
        }
    }
}

#[async_trait(?Send)]
impl Handler for Selector {
    fn execute_all(&mut self, commands: &[Command]) -> Option<DrawResult<()>> {
        for args in commands.iter().rev().filter_map(|cmd| cmd.args.as_ref()) {
            if self.hit(args) {
                break;
            }
        }
        Some(Ok(()))
    }

    async fn apply(&mut self, _name: &str, _args: Option<&Args>) -> DrawResult<Applied> {
        Ok(Applied::Unsupported)
    }
}
